//! Code for reading the line route file.
use super::{input_err_msg, is_sorted_and_unique, read_csv};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::Path;

const ROUTE_FILE_NAME: &str = "route.csv";

/// A vertex of the line route as provided by the user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RouteVertex {
    /// Arc length along the route from its origin (m)
    #[serde(rename = "progressive_m")]
    pub progressive: f64,
    /// Bearing of the outgoing segment, degrees clockwise from north
    #[serde(rename = "azimuth_deg")]
    pub azimuth: f64,
    /// Geographic latitude (SIRGAS 2000)
    pub latitude: f64,
    /// Geographic longitude (SIRGAS 2000)
    pub longitude: f64,
}

/// Read the route vertices from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn read_route(model_dir: &Path) -> Result<Vec<RouteVertex>> {
    let file_path = model_dir.join(ROUTE_FILE_NAME);
    let vertices: Vec<RouteVertex> = read_csv(&file_path)?.collect();
    validate_route(&vertices).with_context(|| input_err_msg(&file_path))?;
    Ok(vertices)
}

fn validate_route(vertices: &[RouteVertex]) -> Result<()> {
    ensure!(
        vertices.len() >= 2,
        "Route must have at least two vertices ({} found)",
        vertices.len()
    );
    ensure!(
        is_sorted_and_unique(vertices.iter().map(|v| v.progressive)),
        "Route progressives must be strictly increasing"
    );
    for vertex in vertices {
        ensure!(
            (0.0..360.0).contains(&vertex.azimuth),
            "Azimuth {} out of range [0, 360)",
            vertex.azimuth
        );
        ensure!(
            (-90.0..=90.0).contains(&vertex.latitude)
                && (-180.0..=180.0).contains(&vertex.longitude),
            "Coordinates ({}, {}) out of range",
            vertex.latitude,
            vertex.longitude
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Create an example route file in dir_path
    fn create_route_file(dir_path: &Path, contents: &str) {
        let file_path = dir_path.join(ROUTE_FILE_NAME);
        let mut file = File::create(file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
    }

    #[test]
    fn test_read_route() {
        let dir = tempdir().unwrap();
        create_route_file(
            dir.path(),
            "progressive_m,azimuth_deg,latitude,longitude
0.0,45.0,-23.5505,-46.6333
1500.0,50.0,-23.5415,-46.6243
3000.0,48.0,-23.5325,-46.6153",
        );

        let vertices = read_route(dir.path()).unwrap();
        assert_eq!(vertices.len(), 3);
        assert_eq!(
            vertices[0],
            RouteVertex {
                progressive: 0.0,
                azimuth: 45.0,
                latitude: -23.5505,
                longitude: -46.6333,
            }
        );
    }

    #[test]
    fn test_read_route_unsorted_progressives() {
        let dir = tempdir().unwrap();
        create_route_file(
            dir.path(),
            "progressive_m,azimuth_deg,latitude,longitude
1500.0,50.0,-23.5415,-46.6243
0.0,45.0,-23.5505,-46.6333",
        );
        assert!(read_route(dir.path()).is_err());
    }

    #[test]
    fn test_read_route_bad_azimuth() {
        let dir = tempdir().unwrap();
        create_route_file(
            dir.path(),
            "progressive_m,azimuth_deg,latitude,longitude
0.0,360.0,-23.5505,-46.6333
1500.0,50.0,-23.5415,-46.6243",
        );
        assert!(read_route(dir.path()).is_err());
    }

    #[test]
    fn test_read_route_single_vertex() {
        let dir = tempdir().unwrap();
        create_route_file(
            dir.path(),
            "progressive_m,azimuth_deg,latitude,longitude
0.0,45.0,-23.5505,-46.6333",
        );
        assert!(read_route(dir.path()).is_err());
    }

    #[test]
    fn test_read_route_missing_column() {
        let dir = tempdir().unwrap();
        create_route_file(
            dir.path(),
            "progressive_m,azimuth_deg,latitude
0.0,45.0,-23.5505",
        );
        assert!(read_route(dir.path()).is_err());
    }
}
