//! Code for reading the current schedule.
use super::{input_err_msg, read_csv};
use anyhow::{ensure, Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const CURRENT_SCHEDULE_FILE_NAME: &str = "current_schedule.csv";

/// The current flowing through the line at each analysis hour.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentSchedule {
    /// The same current at every hour
    Constant(f64),
    /// An explicit hourly schedule; hours absent from it are excluded from
    /// the analysis
    Hourly(HashMap<NaiveDateTime, f64>),
}

impl CurrentSchedule {
    /// The current for an hour, or `None` when the schedule does not cover
    /// it.
    pub fn current_at(&self, timestamp: NaiveDateTime) -> Option<f64> {
        match self {
            Self::Constant(current) => Some(*current),
            Self::Hourly(schedule) => schedule.get(&timestamp).copied(),
        }
    }
}

/// A schedule record retrieved from the current schedule CSV file
#[derive(Debug, Deserialize)]
struct CurrentRecord {
    timestamp: NaiveDateTime,
    current_a: f64,
}

/// Read the current schedule from the model directory.
///
/// The schedule file is optional; without it the constant current from the
/// model file applies to every hour.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `constant` - Fallback constant current (A)
pub fn read_current_schedule(model_dir: &Path, constant: f64) -> Result<CurrentSchedule> {
    let file_path = model_dir.join(CURRENT_SCHEDULE_FILE_NAME);
    if !file_path.exists() {
        return Ok(CurrentSchedule::Constant(constant));
    }

    let records: Vec<CurrentRecord> = read_csv(&file_path)?.collect();
    let mut schedule = HashMap::with_capacity(records.len());
    let mut build = || -> Result<()> {
        for record in &records {
            ensure!(
                record.current_a.is_finite() && record.current_a >= 0.0,
                "Invalid current {} at {}",
                record.current_a,
                record.timestamp
            );
            ensure!(
                schedule.insert(record.timestamp, record.current_a).is_none(),
                "Duplicate schedule entry for {}",
                record.timestamp
            );
        }
        Ok(())
    };
    build().with_context(|| input_err_msg(&file_path))?;

    Ok(CurrentSchedule::Hourly(schedule))
}
