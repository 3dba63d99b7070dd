//! Fixtures for tests
use crate::kriging::Estimate;
use crate::montecarlo::FieldEstimates;
use crate::thermal::ConductorParameters;
use rstest::fixture;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// ACSR 795 MCM "Drake", the conductor used throughout the test suite.
#[fixture]
pub fn drake_conductor() -> ConductorParameters {
    ConductorParameters {
        diameter: 0.02814,
        resistance_ac_25: 7.28e-5,
        resistance_ac_75: 9.09e-5,
        emissivity: 0.8,
        absorptivity: 0.8,
        max_temperature: 75.0,
    }
}

/// Deterministic field estimates: 25 °C air, no sun, 0.5 m/s wind from due
/// east, all with zero spread.
#[fixture]
pub fn zero_std_estimates() -> FieldEstimates {
    FieldEstimates {
        air_temperature: Estimate {
            mean: 25.0,
            std: 0.0,
        },
        solar_radiation: Estimate { mean: 0.0, std: 0.0 },
        wind_u: Estimate { mean: 0.5, std: 0.0 },
        wind_v: Estimate { mean: 0.0, std: 0.0 },
    }
}

/// Write a small but complete model directory: a 3 km route, two stations
/// and three fully observed hours.
pub fn write_example_model(dir_path: &Path) {
    let mut file = File::create(dir_path.join("model.toml")).unwrap();
    writeln!(
        file,
        "[simulation]
mc_iterations = 200
rng_master_seed = 42

[conductor]
diameter = 0.02814
resistance_ac_25 = 7.28e-5
resistance_ac_75 = 9.09e-5
emissivity = 0.8
absorptivity = 0.8
max_temperature = 75.0

[current]
constant_a = 500.0"
    )
    .unwrap();

    let mut file = File::create(dir_path.join("route.csv")).unwrap();
    writeln!(
        file,
        "progressive_m,azimuth_deg,latitude,longitude
0.0,30.0,-23.5505,-46.6333
1500.0,35.0,-23.5390,-46.6270
3000.0,40.0,-23.5280,-46.6200"
    )
    .unwrap();

    let mut file = File::create(dir_path.join("stations.csv")).unwrap();
    writeln!(
        file,
        "id,latitude,longitude
A701,-23.5000,-46.6200
A755,-23.5900,-46.6500"
    )
    .unwrap();

    let mut file = File::create(dir_path.join("observations.csv")).unwrap();
    writeln!(
        file,
        "station_id,timestamp,air_temperature_c,global_radiation_wm2,wind_speed_ms,wind_direction_deg
A701,2024-01-15T12:00:00,27.0,820.0,2.1,140.0
A755,2024-01-15T12:00:00,25.8,780.0,2.9,155.0
A701,2024-01-15T13:00:00,28.2,870.0,2.4,150.0
A755,2024-01-15T13:00:00,26.9,845.0,3.1,160.0
A701,2024-01-15T14:00:00,28.9,790.0,2.7,150.0
A755,2024-01-15T14:00:00,27.5,760.0,3.4,165.0
A701,2024-01-15T15:00:00,29.1,,2.5,155.0
A755,2024-01-15T15:00:00,27.8,700.0,3.2,160.0"
    )
    .unwrap();
}
