//! # Forecast Scheduler
//!
//! Batch orchestration around the `demand_forecast` engine. For each entity
//! (a disease or a health service, optionally scoped to a locality) the
//! orchestrator reuses a stored forecast younger than the cache window,
//! skips entities with too little history, and otherwise generates,
//! backtests and stores a fresh forecast, replacing the previous one.
//!
//! Persistence and time are behind traits ([`ObservationSource`],
//! [`ForecastStore`], [`Clock`]) so batches run against in-memory stores in
//! tests and in the `forecast-batch` binary.

pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod loader;
pub mod orchestrator;
pub mod record;
pub mod store;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::SchedulerConfig;
pub use crate::entity::{Entity, EntityKey, EntityKind};
pub use crate::error::{Result, SchedulerError, StoreError};
pub use crate::orchestrator::{
    BatchReport, BatchSummary, EntityOutcome, ForecastOrchestrator, OutcomeStatus,
};
pub use crate::record::{DataQuality, ForecastRecord};
pub use crate::store::{
    ForecastStore, InMemoryForecastStore, InMemoryObservationSource, ObservationSource,
    UpsertOutcome,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
