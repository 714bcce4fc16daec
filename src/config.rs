//! Run and sampler settings.
//!
//! Every struct deserializes with defaults for missing fields, so a partial JSON
//! document such as `{"num_warmup": 200}` is a valid [`SampleConfig`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Iteration counts and output cadence of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub num_warmup: usize,
    pub num_samples: usize,
    /// Keep every `num_thin`-th iteration.
    pub num_thin: usize,
    /// Report progress every `refresh` iterations; `<= 0` disables reporting.
    pub refresh: i64,
    /// Also send warm-up iterations to the sample writer.
    pub save_warmup: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            num_warmup: 1000,
            num_samples: 1000,
            num_thin: 1,
            refresh: 100,
            save_warmup: false,
        }
    }
}

impl SampleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_thin == 0 {
            return Err(Error::Config("num_thin must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn num_iterations(&self) -> usize {
        self.num_warmup + self.num_samples
    }
}

/// Which Euclidean metric the sampler uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    Unit,
    Diag,
}

/// Dual averaging and window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptConfig {
    pub engaged: bool,
    /// Target acceptance statistic.
    pub delta: f64,
    pub gamma: f64,
    pub kappa: f64,
    pub t0: f64,
    pub init_buffer: usize,
    pub term_buffer: usize,
    pub base_window: usize,
}

impl Default for AdaptConfig {
    fn default() -> Self {
        Self {
            engaged: true,
            delta: 0.8,
            gamma: 0.05,
            kappa: 0.75,
            t0: 10.0,
            init_buffer: 75,
            term_buffer: 50,
            base_window: 25,
        }
    }
}

impl AdaptConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.delta > 0.0 && self.delta < 1.0) {
            return Err(Error::Config(format!(
                "adapt delta must be in (0, 1), got {}",
                self.delta
            )));
        }
        if !(self.gamma > 0.0 && self.kappa > 0.0 && self.t0 > 0.0) {
            return Err(Error::Config(
                "adapt gamma, kappa and t0 must be positive".to_string(),
            ));
        }
        if self.base_window == 0 {
            return Err(Error::Config(
                "adapt base_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Static HMC settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmcConfig {
    /// Initial (nominal) leapfrog step size.
    pub step_size: f64,
    /// Uniform jitter of the step size as a fraction in `[0, 1]`.
    pub step_size_jitter: f64,
    /// Integration time `T`; the leapfrog count is `max(1, ⌊T / ε⌋)`.
    pub int_time: f64,
    pub metric: MetricKind,
    /// RNG seed; entropy-seeded when absent.
    pub seed: Option<u64>,
    pub adapt: AdaptConfig,
}

impl Default for HmcConfig {
    fn default() -> Self {
        Self {
            step_size: 1.0,
            step_size_jitter: 0.0,
            int_time: 2.0 * std::f64::consts::PI,
            metric: MetricKind::Unit,
            seed: None,
            adapt: AdaptConfig::default(),
        }
    }
}

impl HmcConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err(Error::Config(format!(
                "step_size must be positive and finite, got {}",
                self.step_size
            )));
        }
        if !(0.0..=1.0).contains(&self.step_size_jitter) {
            return Err(Error::Config(format!(
                "step_size_jitter must be in [0, 1], got {}",
                self.step_size_jitter
            )));
        }
        if !(self.int_time > 0.0 && self.int_time.is_finite()) {
            return Err(Error::Config(format!(
                "int_time must be positive and finite, got {}",
                self.int_time
            )));
        }
        self.adapt.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: SampleConfig = serde_json::from_str(r#"{"num_warmup": 200}"#).unwrap();
        assert_eq!(config.num_warmup, 200);
        assert_eq!(config.num_samples, 1000);
        assert_eq!(config.num_thin, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn hmc_config_round_trips_through_json() {
        let config = HmcConfig {
            metric: MetricKind::Diag,
            seed: Some(42),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""metric":"diag""#));
        let back: HmcConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let thin = SampleConfig {
            num_thin: 0,
            ..Default::default()
        };
        assert!(matches!(thin.validate(), Err(Error::Config(_))));

        let step = HmcConfig {
            step_size: -1.0,
            ..Default::default()
        };
        assert!(step.validate().is_err());

        let jitter = HmcConfig {
            step_size_jitter: 1.5,
            ..Default::default()
        };
        assert!(jitter.validate().is_err());

        let mut delta = HmcConfig::default();
        delta.adapt.delta = 1.0;
        assert!(delta.validate().is_err());
    }
}
