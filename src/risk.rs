//! Reduction of a conductor-temperature distribution into risk figures.
//!
//! The thermal risk classification bands follow NBR 5422 by default and can
//! be overridden from the model file.
use crate::numerics::percentile_sorted;
use anyhow::{ensure, Result};
use serde::Deserialize;

/// One classification band: probabilities strictly below `limit` get
/// `label`. The final band omits the limit and catches everything else.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RiskBand {
    /// Qualitative label, e.g. "low"
    pub label: String,
    /// Exclusive upper probability bound; absent on the catch-all band
    pub limit: Option<f64>,
}

/// Ordered risk classification table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RiskBands(Vec<RiskBand>);

impl Default for RiskBands {
    /// The NBR 5422 thermal risk bands.
    fn default() -> Self {
        Self(vec![
            RiskBand {
                label: "low".into(),
                limit: Some(0.01),
            },
            RiskBand {
                label: "moderate".into(),
                limit: Some(0.05),
            },
            RiskBand {
                label: "high".into(),
                limit: Some(0.10),
            },
            RiskBand {
                label: "critical".into(),
                limit: None,
            },
        ])
    }
}

impl RiskBands {
    /// Check band ordering: ascending limits, exactly one trailing
    /// catch-all.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.0.len() >= 2, "At least two risk bands are required");
        let (last, bounded) = self.0.split_last().unwrap();
        ensure!(
            last.limit.is_none(),
            "The last risk band must have no limit (catch-all)"
        );

        let mut previous = 0.0;
        for band in bounded {
            let limit = band
                .limit
                .ok_or_else(|| anyhow::anyhow!("Only the last risk band may omit its limit"))?;
            ensure!(
                limit > previous && limit <= 1.0,
                "Risk band limits must be ascending probabilities in (0, 1]"
            );
            previous = limit;
        }
        Ok(())
    }

    /// The label for an exceedance probability.
    pub fn classify(&self, probability: f64) -> &str {
        for band in &self.0 {
            match band.limit {
                Some(limit) if probability < limit => return &band.label,
                Some(_) => continue,
                None => return &band.label,
            }
        }
        // validate() guarantees a catch-all band
        unreachable!("risk bands have no catch-all")
    }
}

/// Risk figures for one (point, hour).
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// Sample mean conductor temperature (°C)
    pub mean: f64,
    /// 90th percentile (°C)
    pub p90: f64,
    /// 95th percentile (°C)
    pub p95: f64,
    /// Probability of exceeding the design temperature
    pub probability: f64,
    /// Qualitative class from the band table
    pub class: String,
}

/// Reduce a temperature sample into percentiles, exceedance probability and
/// qualitative class.
///
/// # Errors
///
/// Fails on an empty sample.
pub fn assess(
    mut temperatures: Vec<f64>,
    max_temperature: f64,
    bands: &RiskBands,
) -> Result<RiskAssessment> {
    ensure!(!temperatures.is_empty(), "Empty temperature sample");

    let count = temperatures.len();
    let mean = temperatures.iter().sum::<f64>() / count as f64;
    let exceedances = temperatures
        .iter()
        .filter(|&&t| t > max_temperature)
        .count();
    let probability = exceedances as f64 / count as f64;

    temperatures.sort_unstable_by(f64::total_cmp);
    let p90 = percentile_sorted(&temperatures, 90.0);
    let p95 = percentile_sorted(&temperatures, 95.0);

    Ok(RiskAssessment {
        mean,
        p90,
        p95,
        probability,
        class: bands.classify(probability).to_string(),
    })
}
