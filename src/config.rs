use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, InvalidParameter};

/// A rival whose growth erodes our acquisition. Rates are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    /// Monthly compounding growth of the competitor's client base (%).
    pub growth_rate: f64,
    /// Share of the competitor's market weight that is taken out of our growth (%).
    pub aggressiveness: f64,
}

/// Immutable inputs for one run-set of trials.
///
/// All rates are percentages (20.0 = 20 %). Missing fields in a JSON parameter
/// file fall back to the canonical scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    pub seed: u64,
    pub initial_cash: f64,
    pub burn_rate: f64,
    pub growth_rate: f64,
    pub retention_rate: f64,
    pub shock_probability: f64,
    pub event_probability: f64,
    pub horizon_months: u32,
    pub num_trials: u32,
    pub competitors: Vec<CompetitorProfile>,
}

impl SimulationParameters {
    pub fn canonical() -> Self {
        SimulationParameters {
            seed: 42,
            initial_cash: 20_000.0,
            burn_rate: 5_000.0,
            growth_rate: 20.0,
            retention_rate: 80.0,
            shock_probability: 10.0,
            event_probability: 20.0,
            horizon_months: 12,
            num_trials: 1_000,
            competitors: Vec::new(),
        }
    }

    /// Wargame mode: at least one competitor is eroding our growth.
    pub fn wargame(&self) -> bool {
        !self.competitors.is_empty()
    }

    /// Reject the parameter set if any field is outside its documented range.
    /// The first offending field is reported.
    pub fn validate(&self) -> Result<(), InvalidParameter> {
        finite("initial_cash", self.initial_cash)?;
        finite("burn_rate", self.burn_rate)?;
        if self.burn_rate < 0.0 {
            return Err(InvalidParameter::new("burn_rate", self.burn_rate, "must not be negative"));
        }
        finite("growth_rate", self.growth_rate)?;
        percent("retention_rate", self.retention_rate)?;
        percent("shock_probability", self.shock_probability)?;
        percent("event_probability", self.event_probability)?;
        if self.horizon_months < 1 {
            return Err(InvalidParameter::new(
                "horizon_months",
                self.horizon_months,
                "must be at least 1",
            ));
        }
        if self.num_trials < 1 {
            return Err(InvalidParameter::new("num_trials", self.num_trials, "must be at least 1"));
        }
        for (i, c) in self.competitors.iter().enumerate() {
            finite(&format!("competitors[{i}].growth_rate"), c.growth_rate)?;
            percent(&format!("competitors[{i}].aggressiveness"), c.aggressiveness)?;
        }
        Ok(())
    }

    /// Read a JSON parameter file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let params = Self::from_json_str(&text)?;
        log::debug!("loaded parameters from {}", path.display());
        Ok(params)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let params: SimulationParameters = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self::canonical()
    }
}

fn finite(name: &str, value: f64) -> Result<(), InvalidParameter> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InvalidParameter::new(name, value, "must be a finite number"))
    }
}

fn percent(name: &str, value: f64) -> Result<(), InvalidParameter> {
    // NaN fails both comparisons.
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(InvalidParameter::new(name, value, "must lie in [0, 100]"))
    }
}
