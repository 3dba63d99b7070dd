//! The module responsible for writing output data to disk.
use crate::simulation::{HourlyResult, RunDiagnostics};
use anyhow::{Context, Result};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "linerisk_results";

/// The output file name for the hourly result table
const RESULTS_FILE_NAME: &str = "hourly_results.csv";

/// The output file name for the run diagnostics
const DIAGNOSTICS_FILE_NAME: &str = "diagnostics.toml";

/// Get the default output folder for the model specified at `model_dir`.
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted
    // because we need to check for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;
    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create the output directory, with parents, if it does not already exist.
pub fn create_output_directory(output_dir: &Path) -> Result<()> {
    if output_dir.is_dir() {
        // already exists
        return Ok(());
    }

    fs::create_dir_all(output_dir)?;
    Ok(())
}

/// An object for writing the result table and diagnostics to disk.
pub struct DataWriter {
    output_path: PathBuf,
    results: csv::Writer<File>,
}

impl DataWriter {
    /// Open the output files in `output_path`.
    pub fn create(output_path: &Path) -> Result<Self> {
        let file_path = output_path.join(RESULTS_FILE_NAME);
        let results = csv::Writer::from_path(&file_path)
            .with_context(|| format!("Could not create {}", file_path.display()))?;
        Ok(Self {
            output_path: output_path.to_owned(),
            results,
        })
    }

    /// Append one row to the result table.
    pub fn write_result(&mut self, row: &HourlyResult) -> Result<()> {
        self.results.serialize(row)?;
        Ok(())
    }

    /// Write the run diagnostics.
    pub fn write_diagnostics(&self, diagnostics: &RunDiagnostics) -> Result<()> {
        let file_path = self.output_path.join(DIAGNOSTICS_FILE_NAME);
        let contents = toml::to_string(diagnostics)?;
        fs::write(&file_path, contents)
            .with_context(|| format!("Could not write {}", file_path.display()))?;
        Ok(())
    }

    /// Flush the result table to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.results.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs::read_to_string;
    use tempfile::tempdir;

    fn example_row() -> HourlyResult {
        HourlyResult {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            point_id: 0,
            progressive_m: 0.0,
            t_c_mean: 47.3,
            t_c_p90: 52.1,
            t_c_p95: 53.8,
            risk: 0.02,
            risk_class: "moderate".into(),
            degraded: false,
            t_a_mean: 27.1,
            q_s_mean: 812.0,
            w_s_mean: 2.4,
            attack_angle_mean: 63.0,
            current_a: 500.0,
            iterations_used: 10_000,
            ampacity_a: None,
        }
    }

    #[test]
    fn test_write_results() {
        let dir = tempdir().unwrap();
        let mut writer = DataWriter::create(dir.path()).unwrap();
        writer.write_result(&example_row()).unwrap();
        writer.flush().unwrap();

        let contents = read_to_string(dir.path().join(RESULTS_FILE_NAME)).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,point_id,progressive_m,t_c_mean,t_c_p90,t_c_p95,risk,risk_class,\
             degraded,t_a_mean,q_s_mean,w_s_mean,attack_angle_mean,current_a,\
             iterations_used,ampacity_a"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("2024-01-15T12:00:00,0,0.0,47.3,"));
        // No ampacity requested: trailing field left empty
        assert!(row.ends_with(",500.0,10000,"));
    }

    #[test]
    fn test_write_diagnostics() {
        let dir = tempdir().unwrap();
        let writer = DataWriter::create(dir.path()).unwrap();
        writer
            .write_diagnostics(&RunDiagnostics {
                hours_analysed: 3,
                hours_dropped_incomplete: 1,
                ..Default::default()
            })
            .unwrap();

        let contents = read_to_string(dir.path().join(DIAGNOSTICS_FILE_NAME)).unwrap();
        assert!(contents.contains("hours_analysed = 3"));
        assert!(contents.contains("hours_dropped_incomplete = 1"));
    }

    #[test]
    fn test_get_output_dir() {
        let dir = tempdir().unwrap();
        let model_dir = dir.path().join("my_model");
        fs::create_dir(&model_dir).unwrap();

        let output_dir = get_output_dir(&model_dir).unwrap();
        assert!(output_dir.ends_with(Path::new(OUTPUT_DIRECTORY_ROOT).join("my_model")));
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("output");
        create_output_directory(&path).unwrap();
        assert!(path.is_dir());

        // Idempotent
        create_output_directory(&path).unwrap();
    }
}
