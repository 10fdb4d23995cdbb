//! Batch forecast generation
//!
//! Entities are processed one at a time. For each entity the orchestrator
//! reuses a stored forecast younger than the cache window, skips entities
//! with too little history, and otherwise formats the history, forecasts,
//! backtests and replaces the stored record. A failure is recorded on the
//! entity's outcome and the batch moves on.

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::entity::{Entity, EntityKey};
use crate::error::{Result, SchedulerError};
use crate::record::{DataQuality, ForecastRecord};
use crate::store::{ForecastStore, ObservationSource, UpsertOutcome};
use demand_forecast::severity::classify;
use demand_forecast::{
    backtest, format_observations, AccuracyReport, ForecastEngine, SeasonalForecastEngine,
    SeverityLabel,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// How an entity left the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// A new forecast was generated and stored
    Generated,
    /// A fresh stored forecast was reused
    Cached,
    /// Too little history; the engine was not called
    Skipped,
    Failed,
}

/// Result for one entity of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityOutcome {
    pub entity_key: EntityKey,
    pub status: OutcomeStatus,
    pub cached: bool,
    /// Age of the reused record, for cached outcomes
    pub cache_age_hours: Option<f64>,
    pub data_quality: Option<DataQuality>,
    pub data_points_count: usize,
    pub record: Option<ForecastRecord>,
    /// Severity of the peak point forecast
    pub projected_severity: Option<SeverityLabel>,
    pub error: Option<String>,
}

impl EntityOutcome {
    fn with_record(
        entity: &Entity,
        status: OutcomeStatus,
        record: ForecastRecord,
        cache_age_hours: Option<f64>,
    ) -> Self {
        let peak = record.peak().round() as u64;
        Self {
            entity_key: entity.key.clone(),
            status,
            cached: status == OutcomeStatus::Cached,
            cache_age_hours,
            data_quality: Some(record.data_quality),
            data_points_count: record.data_points_count,
            projected_severity: Some(classify(peak, entity.population)),
            record: Some(record),
            error: None,
        }
    }

    fn skipped(entity: &Entity, data_points_count: usize, message: String) -> Self {
        Self {
            entity_key: entity.key.clone(),
            status: OutcomeStatus::Skipped,
            cached: false,
            cache_age_hours: None,
            data_quality: Some(DataQuality::Insufficient),
            data_points_count,
            record: None,
            projected_severity: None,
            error: Some(message),
        }
    }

    fn failed(entity: &Entity, error: &SchedulerError) -> Self {
        Self {
            entity_key: entity.key.clone(),
            status: OutcomeStatus::Failed,
            cached: false,
            cache_age_hours: None,
            data_quality: None,
            data_points_count: 0,
            record: None,
            projected_severity: None,
            error: Some(error.to_string()),
        }
    }

    /// Generated or served from cache
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Generated | OutcomeStatus::Cached)
    }

    pub fn accuracy(&self) -> Option<&AccuracyReport> {
        self.record.as_ref().and_then(|r| r.accuracy.as_ref())
    }

    pub fn forecast_points(&self) -> usize {
        self.record.as_ref().map_or(0, |r| r.points.len())
    }
}

/// Totals over a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub requested: usize,
    /// Generated plus cached
    pub succeeded: usize,
    pub cached: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_forecast_points: usize,
    /// Mean backtest R² over successes that have one
    pub average_r_squared: Option<f64>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[EntityOutcome]) -> Self {
        let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
        let successes: Vec<&EntityOutcome> = outcomes.iter().filter(|o| o.is_success()).collect();

        let r_squared: Vec<f64> = successes
            .iter()
            .filter_map(|o| o.accuracy().map(|a| a.r_squared))
            .collect();
        let average_r_squared = if r_squared.is_empty() {
            None
        } else {
            Some(r_squared.iter().sum::<f64>() / r_squared.len() as f64)
        };

        Self {
            requested: outcomes.len(),
            succeeded: successes.len(),
            cached: count(OutcomeStatus::Cached),
            skipped: count(OutcomeStatus::Skipped),
            failed: count(OutcomeStatus::Failed),
            total_forecast_points: successes.iter().map(|o| o.forecast_points()).sum(),
            average_r_squared,
        }
    }
}

/// Outcomes in request order plus their summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<EntityOutcome>,
    pub summary: BatchSummary,
}

/// Drives the forecasting engine over batches of entities
pub struct ForecastOrchestrator {
    config: SchedulerConfig,
    engine: Arc<dyn ForecastEngine>,
    source: Arc<dyn ObservationSource>,
    store: Arc<dyn ForecastStore>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<EntityKey, Arc<Mutex<()>>>>,
}

impl ForecastOrchestrator {
    /// Orchestrator with the seasonal engine built from `config.engine` and the system clock
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn ObservationSource>,
        store: Arc<dyn ForecastStore>,
    ) -> Result<Self> {
        config.validate()?;
        let engine = SeasonalForecastEngine::new(config.engine.clone())?;

        Ok(Self {
            config,
            engine: Arc::new(engine),
            source,
            store,
            clock: Arc::new(SystemClock),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_engine(mut self, engine: Arc<dyn ForecastEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Forecast every entity in order, pacing between entities.
    ///
    /// Never fails as a whole: each entity's failure lands on its outcome.
    pub async fn generate_batch(&self, entities: &[Entity], horizon: usize) -> BatchReport {
        let mut outcomes = Vec::with_capacity(entities.len());

        for (index, entity) in entities.iter().enumerate() {
            if index > 0 && self.config.pacing_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.pacing_delay_ms)).await;
            }
            outcomes.push(self.generate(entity, horizon).await);
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        info!(
            requested = summary.requested,
            succeeded = summary.succeeded,
            cached = summary.cached,
            skipped = summary.skipped,
            failed = summary.failed,
            total_forecast_points = summary.total_forecast_points,
            "forecast batch complete"
        );

        BatchReport { outcomes, summary }
    }

    /// Forecast a single entity
    pub async fn generate(&self, entity: &Entity, horizon: usize) -> EntityOutcome {
        let lock = self.lock_for(&entity.key).await;
        let result = {
            // Freshness check, generation and replacement run under the entity's lock
            let _guard = lock.lock().await;
            self.generate_entity(entity, horizon).await
        };
        self.release_lock(&entity.key, lock).await;

        match result {
            Ok(outcome) => outcome,
            Err(e @ SchedulerError::Store(_)) => {
                warn!(entity = %entity.key, error = %e, "persistence call failed");
                EntityOutcome::failed(entity, &e)
            }
            Err(e) => {
                error!(entity = %entity.key, error = %e, "forecast generation failed");
                EntityOutcome::failed(entity, &e)
            }
        }
    }

    async fn lock_for(&self, key: &EntityKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Drop the entity's lock entry once no other call holds it
    async fn release_lock(&self, key: &EntityKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        let unshared = locks
            .get(key)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
        if unshared {
            locks.remove(key);
        }
    }

    async fn generate_entity(&self, entity: &Entity, horizon: usize) -> Result<EntityOutcome> {
        let key = &entity.key;
        let now = self.clock.now();
        if let Some(existing) = self.store.latest(key).await? {
            if existing.is_fresh(now, self.config.cache_ttl_hours) {
                let age = existing.age_hours(now);
                info!(entity = %key, age_hours = age, "reusing cached forecast");
                return Ok(EntityOutcome::with_record(
                    entity,
                    OutcomeStatus::Cached,
                    existing,
                    Some(age),
                ));
            }
        }

        let rows = self.source.fetch(key).await?;
        let series = format_observations(&rows)?;
        if series.len() < self.config.min_data_points {
            info!(entity = %key, data_points = series.len(), "not enough history to forecast");
            return Ok(EntityOutcome::skipped(
                entity,
                series.len(),
                format!(
                    "Insufficient data: need at least {} points, got {}",
                    self.config.min_data_points,
                    series.len()
                ),
            ));
        }

        let label = key.to_string();
        let forecast = self.engine.forecast(&series, horizon, &label)?;

        let policy = self.config.holdout_policy()?;
        let accuracy = match backtest(self.engine.as_ref(), &series, horizon, &policy, &label) {
            Ok(result) => Some(result.report),
            Err(e) => {
                warn!(entity = %key, error = %e, "backtest unavailable");
                None
            }
        };

        let record = ForecastRecord::from_forecast(key.clone(), forecast, accuracy, self.clock.now());
        let record = match self.store.upsert(record.clone()).await? {
            UpsertOutcome::KeptNewer => {
                warn!(entity = %key, "store kept a newer forecast");
                self.store.latest(key).await?.unwrap_or(record)
            }
            upsert => {
                debug!(entity = %key, outcome = ?upsert, "stored forecast");
                record
            }
        };

        info!(
            entity = %key,
            points = record.points.len(),
            data_quality = %record.data_quality,
            model = %record.model_version,
            "generated forecast"
        );

        Ok(EntityOutcome::with_record(
            entity,
            OutcomeStatus::Generated,
            record,
            None,
        ))
    }
}
