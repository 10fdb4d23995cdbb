//! Persistence seams of the orchestrator and their in-memory implementations

use crate::entity::EntityKey;
use crate::error::StoreError;
use crate::record::ForecastRecord;
use async_trait::async_trait;
use demand_forecast::RawObservation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Supplies historical rows for an entity
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn fetch(&self, key: &EntityKey) -> Result<Vec<RawObservation>, StoreError>;
}

/// What an upsert did to the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// The stored record was newer and stayed in place
    KeptNewer,
}

/// Holds at most one forecast record per entity key
#[async_trait]
pub trait ForecastStore: Send + Sync {
    async fn latest(&self, key: &EntityKey) -> Result<Option<ForecastRecord>, StoreError>;

    /// Store `record` unless a record with a later `generated_at` is present
    async fn upsert(&self, record: ForecastRecord) -> Result<UpsertOutcome, StoreError>;

    async fn remove(&self, key: &EntityKey) -> Result<Option<ForecastRecord>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}

/// In-memory observation source keyed by entity
#[derive(Debug, Default)]
pub struct InMemoryObservationSource {
    rows: RwLock<HashMap<EntityKey, Vec<RawObservation>>>,
}

impl InMemoryObservationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = (EntityKey, Vec<RawObservation>)>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().collect()),
        }
    }

    /// Append rows for `key`
    pub async fn extend(&self, key: EntityKey, rows: impl IntoIterator<Item = RawObservation>) {
        self.rows.write().await.entry(key).or_default().extend(rows);
    }

    pub async fn keys(&self) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = self.rows.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObservationSource for InMemoryObservationSource {
    async fn fetch(&self, key: &EntityKey) -> Result<Vec<RawObservation>, StoreError> {
        Ok(self.rows.read().await.get(key).cloned().unwrap_or_default())
    }
}

/// In-memory forecast store
#[derive(Debug, Default)]
pub struct InMemoryForecastStore {
    records: RwLock<HashMap<EntityKey, ForecastRecord>>,
}

impl InMemoryForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records, ordered by key
    pub async fn snapshot(&self) -> Vec<ForecastRecord> {
        let mut records: Vec<ForecastRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.entity_key.cmp(&b.entity_key));
        records
    }
}

#[async_trait]
impl ForecastStore for InMemoryForecastStore {
    async fn latest(&self, key: &EntityKey) -> Result<Option<ForecastRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn upsert(&self, record: ForecastRecord) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records.write().await;
        match records.get(&record.entity_key) {
            Some(existing) if existing.generated_at > record.generated_at => {
                Ok(UpsertOutcome::KeptNewer)
            }
            Some(_) => {
                records.insert(record.entity_key.clone(), record);
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                records.insert(record.entity_key.clone(), record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn remove(&self, key: &EntityKey) -> Result<Option<ForecastRecord>, StoreError> {
        Ok(self.records.write().await.remove(key))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}
