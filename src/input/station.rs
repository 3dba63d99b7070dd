//! Code for reading weather stations and their hourly observations.
//!
//! Observations are regrouped into columnar per-hour arrays on a common time
//! index: an hour is kept only when every station has a complete, physically
//! valid record for it. Wind is decomposed into U/V components here, once,
//! so that the kriging stage only ever sees scalar fields.
use super::{input_err_msg, read_csv};
use crate::geodesy::project_to_polyconic;
use crate::wind;
use anyhow::{bail, ensure, Context, Result};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const STATIONS_FILE_NAME: &str = "stations.csv";
const OBSERVATIONS_FILE_NAME: &str = "observations.csv";

/// Historical no-data sentinel still found in station exports.
const MISSING_SENTINEL: f64 = -9999.0;

/// Two stations closer than this are treated as the same site (m).
const COINCIDENT_STATION_TOLERANCE: f64 = 1.0;

/// A weather station with projected coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Station identifier
    pub id: String,
    /// Geographic latitude (SIRGAS 2000)
    pub latitude: f64,
    /// Geographic longitude (SIRGAS 2000)
    pub longitude: f64,
    /// Projected easting (m)
    pub x: f64,
    /// Projected northing (m)
    pub y: f64,
}

/// Observed values for one hour, one entry per station.
#[derive(Debug, Clone, PartialEq)]
pub struct HourObservations {
    /// Air temperature (°C)
    pub air_temperature: Vec<f64>,
    /// Global solar irradiance (W/m²)
    pub solar_radiation: Vec<f64>,
    /// Wind U component (m/s)
    pub wind_u: Vec<f64>,
    /// Wind V component (m/s)
    pub wind_v: Vec<f64>,
}

/// All stations and their hourly observations on a common valid time index.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSet {
    /// The stations, in input order
    pub stations: Vec<Station>,
    /// Per-hour columnar observations, hours ascending
    pub observations: IndexMap<NaiveDateTime, HourObservations>,
    /// Hours discarded because some station record was missing or invalid
    pub hours_dropped: usize,
}

impl StationSet {
    /// Projected station coordinates, in station order.
    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        self.stations.iter().map(|s| (s.x, s.y)).collect()
    }
}

/// A station record retrieved from the stations CSV file
#[derive(Debug, Deserialize)]
struct StationRecord {
    id: String,
    latitude: f64,
    longitude: f64,
}

/// An observation record retrieved from the observations CSV file
#[derive(Debug, Deserialize)]
struct ObservationRecord {
    station_id: String,
    timestamp: NaiveDateTime,
    air_temperature_c: Option<f64>,
    global_radiation_wm2: Option<f64>,
    wind_speed_ms: Option<f64>,
    wind_direction_deg: Option<f64>,
}

impl ObservationRecord {
    /// The four observed values, if the record is complete and physically
    /// valid.
    fn values(&self) -> Option<(f64, f64, f64, f64)> {
        let air = present(self.air_temperature_c)?;
        let sun = present(self.global_radiation_wm2)?;
        let speed = present(self.wind_speed_ms)?;
        let direction = present(self.wind_direction_deg)?;

        if sun < 0.0 || speed < 0.0 || !(0.0..=360.0).contains(&direction) {
            return None;
        }
        Some((air, sun, speed, direction))
    }
}

/// Treat absent, non-finite and sentinel values as missing.
fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != MISSING_SENTINEL)
}

/// Read stations and observations from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn read_stations(model_dir: &Path) -> Result<StationSet> {
    let stations = read_station_records(model_dir)?;

    let file_path = model_dir.join(OBSERVATIONS_FILE_NAME);
    let records: Vec<ObservationRecord> = read_csv(&file_path)?.collect();
    build_station_set(stations, &records).with_context(|| input_err_msg(&file_path))
}

fn read_station_records(model_dir: &Path) -> Result<Vec<Station>> {
    let file_path = model_dir.join(STATIONS_FILE_NAME);
    let records: Vec<StationRecord> = read_csv(&file_path)?.collect();

    let validate = || -> Result<Vec<Station>> {
        ensure!(
            records.len() >= 2,
            "At least two stations are required ({} found)",
            records.len()
        );
        ensure!(
            records.iter().map(|r| &r.id).all_unique(),
            "Duplicate station IDs"
        );

        let stations: Vec<Station> = records
            .iter()
            .map(|record| {
                ensure!(
                    (-90.0..=90.0).contains(&record.latitude)
                        && (-180.0..=180.0).contains(&record.longitude),
                    "Station {} coordinates ({}, {}) out of range",
                    record.id,
                    record.latitude,
                    record.longitude
                );
                let (x, y) = project_to_polyconic(record.latitude, record.longitude);
                Ok(Station {
                    id: record.id.clone(),
                    latitude: record.latitude,
                    longitude: record.longitude,
                    x,
                    y,
                })
            })
            .try_collect()?;

        for (a, b) in stations.iter().tuple_combinations() {
            let distance = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
            ensure!(
                distance > COINCIDENT_STATION_TOLERANCE,
                "Stations {} and {} are at the same location",
                a.id,
                b.id
            );
        }
        Ok(stations)
    };

    validate().with_context(|| input_err_msg(&file_path))
}

fn build_station_set(stations: Vec<Station>, records: &[ObservationRecord]) -> Result<StationSet> {
    let station_index: HashMap<&str, usize> = stations
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    // Gather records per hour, one optional slot per station
    let mut by_hour: HashMap<NaiveDateTime, Vec<Option<(f64, f64, f64, f64)>>> = HashMap::new();
    let mut seen = HashSet::new();
    for record in records {
        let Some(&station) = station_index.get(record.station_id.as_str()) else {
            bail!("Observation for unknown station {}", record.station_id);
        };
        ensure!(
            seen.insert((record.timestamp, station)),
            "Duplicate observation for station {} at {}",
            record.station_id,
            record.timestamp
        );
        by_hour
            .entry(record.timestamp)
            .or_insert_with(|| vec![None; stations.len()])[station] = record.values();
    }

    // Keep only hours with a complete record for every station
    let mut observations = IndexMap::new();
    let mut hours_dropped = 0;
    for (timestamp, slots) in by_hour.into_iter().sorted_by_key(|&(t, _)| t) {
        let Some(complete) = slots.into_iter().collect::<Option<Vec<_>>>() else {
            hours_dropped += 1;
            continue;
        };

        let mut hour = HourObservations {
            air_temperature: Vec::with_capacity(stations.len()),
            solar_radiation: Vec::with_capacity(stations.len()),
            wind_u: Vec::with_capacity(stations.len()),
            wind_v: Vec::with_capacity(stations.len()),
        };
        for (air, sun, speed, direction) in complete {
            let (u, v) = wind::components(speed, direction);
            hour.air_temperature.push(air);
            hour.solar_radiation.push(sun);
            hour.wind_u.push(u);
            hour.wind_v.push(v);
        }
        observations.insert(timestamp, hour);
    }

    ensure!(
        !observations.is_empty(),
        "No hour has complete observations for every station"
    );

    Ok(StationSet {
        stations,
        observations,
        hours_dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const STATIONS_CSV: &str = "id,latitude,longitude
A001,-23.5505,-46.6333
A002,-23.4505,-46.5333";

    fn write_model_files(dir_path: &Path, observations: &str) {
        let mut file = File::create(dir_path.join(STATIONS_FILE_NAME)).unwrap();
        writeln!(file, "{STATIONS_CSV}").unwrap();
        let mut file = File::create(dir_path.join(OBSERVATIONS_FILE_NAME)).unwrap();
        writeln!(file, "{observations}").unwrap();
    }

    const OBSERVATIONS_HEADER: &str = "station_id,timestamp,air_temperature_c,\
global_radiation_wm2,wind_speed_ms,wind_direction_deg";

    #[test]
    fn test_read_stations() {
        let dir = tempdir().unwrap();
        write_model_files(
            dir.path(),
            &format!(
                "{OBSERVATIONS_HEADER}
A001,2024-01-15T12:00:00,25.0,800.0,2.0,0.0
A002,2024-01-15T12:00:00,26.5,750.0,3.0,90.0
A001,2024-01-15T13:00:00,26.0,820.0,2.5,10.0
A002,2024-01-15T13:00:00,27.0,760.0,2.8,95.0"
            ),
        );

        let set = read_stations(dir.path()).unwrap();
        assert_eq!(set.stations.len(), 2);
        assert_eq!(set.observations.len(), 2);
        assert_eq!(set.hours_dropped, 0);

        let first = &set.observations[0];
        assert_eq!(first.air_temperature, &[25.0, 26.5]);
        // Wind from the north decomposes to pure V; from the east to pure U
        assert_approx_eq!(f64, first.wind_u[0], 0.0, epsilon = 1e-9);
        assert_approx_eq!(f64, first.wind_v[0], 2.0, epsilon = 1e-9);
        assert_approx_eq!(f64, first.wind_u[1], 3.0, epsilon = 1e-9);
        assert_approx_eq!(f64, first.wind_v[1], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_incomplete_hours_dropped() {
        let dir = tempdir().unwrap();
        write_model_files(
            dir.path(),
            &format!(
                "{OBSERVATIONS_HEADER}
A001,2024-01-15T12:00:00,25.0,800.0,2.0,0.0
A002,2024-01-15T12:00:00,26.5,750.0,3.0,90.0
A001,2024-01-15T13:00:00,26.0,820.0,2.5,10.0
A001,2024-01-15T14:00:00,26.0,,2.5,10.0
A002,2024-01-15T14:00:00,27.0,760.0,2.8,95.0
A001,2024-01-15T15:00:00,-9999,810.0,2.5,10.0
A002,2024-01-15T15:00:00,27.0,760.0,2.8,95.0"
            ),
        );

        let set = read_stations(dir.path()).unwrap();
        // 13:00 misses a station, 14:00 has an empty field, 15:00 a sentinel
        assert_eq!(set.observations.len(), 1);
        assert_eq!(set.hours_dropped, 3);
    }

    #[test]
    fn test_hours_sorted() {
        let dir = tempdir().unwrap();
        write_model_files(
            dir.path(),
            &format!(
                "{OBSERVATIONS_HEADER}
A001,2024-01-15T14:00:00,27.0,600.0,2.0,0.0
A002,2024-01-15T14:00:00,28.0,650.0,3.0,90.0
A001,2024-01-15T12:00:00,25.0,800.0,2.0,0.0
A002,2024-01-15T12:00:00,26.5,750.0,3.0,90.0"
            ),
        );

        let set = read_stations(dir.path()).unwrap();
        let hours: Vec<_> = set.observations.keys().collect();
        assert!(hours[0] < hours[1]);
    }

    #[test]
    fn test_unknown_station_rejected() {
        let dir = tempdir().unwrap();
        write_model_files(
            dir.path(),
            &format!(
                "{OBSERVATIONS_HEADER}
A999,2024-01-15T12:00:00,25.0,800.0,2.0,0.0"
            ),
        );
        assert!(read_stations(dir.path()).is_err());
    }

    #[test]
    fn test_duplicate_observation_rejected() {
        let dir = tempdir().unwrap();
        write_model_files(
            dir.path(),
            &format!(
                "{OBSERVATIONS_HEADER}
A001,2024-01-15T12:00:00,25.0,800.0,2.0,0.0
A001,2024-01-15T12:00:00,25.5,810.0,2.0,0.0
A002,2024-01-15T12:00:00,26.5,750.0,3.0,90.0"
            ),
        );
        assert!(read_stations(dir.path()).is_err());
    }

    #[test]
    fn test_no_valid_hours_rejected() {
        let dir = tempdir().unwrap();
        write_model_files(
            dir.path(),
            &format!(
                "{OBSERVATIONS_HEADER}
A001,2024-01-15T12:00:00,25.0,800.0,2.0,0.0"
            ),
        );
        assert!(read_stations(dir.path()).is_err());
    }

    #[test]
    fn test_coincident_stations_rejected() {
        let dir = tempdir().unwrap();
        let mut file = File::create(dir.path().join(STATIONS_FILE_NAME)).unwrap();
        writeln!(
            file,
            "id,latitude,longitude
A001,-23.5505,-46.6333
A002,-23.5505,-46.6333"
        )
        .unwrap();
        let mut file = File::create(dir.path().join(OBSERVATIONS_FILE_NAME)).unwrap();
        writeln!(
            file,
            "{OBSERVATIONS_HEADER}
A001,2024-01-15T12:00:00,25.0,800.0,2.0,0.0"
        )
        .unwrap();
        assert!(read_stations(dir.path()).is_err());
    }
}
