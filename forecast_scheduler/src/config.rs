use crate::error::Result;
use demand_forecast::{EngineConfig, ForecastError, HoldoutPolicy};
use serde::Deserialize;
use std::path::Path;

/// Tunables of the batch orchestrator
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Fewest observations an entity needs before the engine is called
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
    /// A stored forecast younger than this is reused
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: i64,
    /// Delay between consecutive entities of a batch
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
    #[serde(default = "default_min_holdout")]
    pub min_holdout: usize,
    /// Horizon used by the batch CLI when none is given
    #[serde(default = "default_horizon")]
    pub default_horizon: usize,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_min_data_points() -> usize {
    7
}
fn default_cache_ttl_hours() -> i64 {
    24
}
fn default_pacing_delay_ms() -> u64 {
    500
}
fn default_holdout_fraction() -> f64 {
    0.2
}
fn default_min_holdout() -> usize {
    2
}
fn default_horizon() -> usize {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_data_points: default_min_data_points(),
            cache_ttl_hours: default_cache_ttl_hours(),
            pacing_delay_ms: default_pacing_delay_ms(),
            holdout_fraction: default_holdout_fraction(),
            min_holdout: default_min_holdout(),
            default_horizon: default_horizon(),
            engine: EngineConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Layer an optional config file and `HEALTH_FORECAST__*` environment
    /// variables over the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("HEALTH_FORECAST").separator("__"))
            .build()?;

        let scheduler_config: SchedulerConfig = config.try_deserialize()?;
        scheduler_config.validate()?;
        Ok(scheduler_config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.holdout_policy()?;
        if self.cache_ttl_hours < 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "cache_ttl_hours must not be negative, got {}",
                self.cache_ttl_hours
            ))
            .into());
        }
        Ok(())
    }

    pub fn holdout_policy(&self) -> Result<HoldoutPolicy> {
        Ok(HoldoutPolicy::new(self.holdout_fraction, self.min_holdout)?)
    }
}
