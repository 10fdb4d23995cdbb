use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use demand_forecast::{
    ForecastEngine, ObservationSeries, RawForecast, RawObservation, SeasonalForecastEngine,
    SeverityLabel,
};
use forecast_scheduler::{
    DataQuality, Entity, EntityKey, ForecastOrchestrator, ForecastRecord, ForecastStore,
    InMemoryForecastStore, InMemoryObservationSource, ManualClock, ObservationSource,
    OutcomeStatus, SchedulerConfig, StoreError, UpsertOutcome,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Seasonal engine that counts its calls
#[derive(Default)]
struct CountingEngine {
    inner: SeasonalForecastEngine,
    calls: AtomicUsize,
}

impl CountingEngine {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ForecastEngine for CountingEngine {
    fn name(&self) -> &str {
        "counting"
    }

    fn forecast(
        &self,
        series: &ObservationSeries,
        horizon: usize,
        label: &str,
    ) -> demand_forecast::Result<RawForecast> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.forecast(series, horizon, label)
    }
}

/// Store whose writes always fail
struct BrokenStore;

#[async_trait]
impl ForecastStore for BrokenStore {
    async fn latest(&self, _key: &EntityKey) -> Result<Option<ForecastRecord>, StoreError> {
        Ok(None)
    }

    async fn upsert(&self, _record: ForecastRecord) -> Result<UpsertOutcome, StoreError> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn remove(&self, _key: &EntityKey) -> Result<Option<ForecastRecord>, StoreError> {
        Ok(None)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Store where another writer always lands a newer record first
#[derive(Default)]
struct OutpacedStore {
    record: tokio::sync::Mutex<Option<ForecastRecord>>,
}

#[async_trait]
impl ForecastStore for OutpacedStore {
    async fn latest(&self, _key: &EntityKey) -> Result<Option<ForecastRecord>, StoreError> {
        Ok(self.record.lock().await.clone())
    }

    async fn upsert(&self, mut record: ForecastRecord) -> Result<UpsertOutcome, StoreError> {
        record.generated_at += Duration::minutes(10);
        record.model_version = "other-writer".to_string();
        *self.record.lock().await = Some(record);
        Ok(UpsertOutcome::KeptNewer)
    }

    async fn remove(&self, _key: &EntityKey) -> Result<Option<ForecastRecord>, StoreError> {
        Ok(self.record.lock().await.take())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(usize::from(self.record.lock().await.is_some()))
    }
}

/// Observation source that takes a while to answer
struct SlowSource(InMemoryObservationSource);

#[async_trait]
impl ObservationSource for SlowSource {
    async fn fetch(&self, key: &EntityKey) -> Result<Vec<RawObservation>, StoreError> {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.0.fetch(key).await
    }
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        pacing_delay_ms: 0,
        ..SchedulerConfig::default()
    }
}

fn daily_rows(counts: &[i64]) -> Vec<RawObservation> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| RawObservation::new(start + chrono::Days::new(i as u64), count))
        .collect()
}

fn weekly_counts(weeks: usize) -> Vec<i64> {
    let pattern = [30, 34, 36, 33, 31, 12, 9];
    (0..weeks * 7).map(|t| pattern[t % 7] + (t as i64 % 3)).collect()
}

async fn source_with(entries: Vec<(EntityKey, Vec<RawObservation>)>) -> Arc<InMemoryObservationSource> {
    let source = InMemoryObservationSource::new();
    for (key, rows) in entries {
        source.extend(key, rows).await;
    }
    Arc::new(source)
}

#[tokio::test]
async fn test_fresh_forecast_is_served_from_cache() {
    let key = EntityKey::disease("influenza");
    let source = source_with(vec![(key.clone(), daily_rows(&weekly_counts(6)))]).await;
    let store = Arc::new(InMemoryForecastStore::new());
    let engine = Arc::new(CountingEngine::default());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()));

    let orchestrator = ForecastOrchestrator::new(config(), source, store.clone())
        .unwrap()
        .with_engine(engine.clone())
        .with_clock(clock.clone());
    let entities = vec![Entity::new(key.clone())];

    let first = orchestrator.generate_batch(&entities, 14).await;
    assert_eq!(first.outcomes[0].status, OutcomeStatus::Generated);
    let calls_after_first = engine.calls();
    assert!(calls_after_first >= 1);

    clock.advance(Duration::hours(3));
    let second = orchestrator.generate_batch(&entities, 14).await;
    let outcome = &second.outcomes[0];

    assert_eq!(outcome.status, OutcomeStatus::Cached);
    assert!(outcome.cached);
    assert_eq!(outcome.cache_age_hours, Some(3.0));
    assert_eq!(engine.calls(), calls_after_first);
    assert_eq!(outcome.record, first.outcomes[0].record);
    assert_eq!(second.summary.cached, 1);
    assert_eq!(second.summary.succeeded, 1);

    // Past the cache window the forecast is regenerated and replaced
    clock.advance(Duration::hours(22));
    let third = orchestrator.generate_batch(&entities, 14).await;
    assert_eq!(third.outcomes[0].status, OutcomeStatus::Generated);
    assert!(engine.calls() > calls_after_first);
    assert_eq!(store.len().await, Ok(1));
}

#[tokio::test]
async fn test_record_from_ahead_clock_has_zero_age() {
    let key = EntityKey::disease("influenza");
    let source = source_with(vec![(key.clone(), daily_rows(&weekly_counts(6)))]).await;
    let engine = Arc::new(CountingEngine::default());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()));
    let orchestrator = ForecastOrchestrator::new(config(), source, Arc::new(InMemoryForecastStore::new()))
        .unwrap()
        .with_engine(engine.clone())
        .with_clock(clock.clone());
    let entities = vec![Entity::new(key)];

    orchestrator.generate_batch(&entities, 14).await;
    let calls_after_first = engine.calls();

    clock.advance(Duration::hours(-5));
    let report = orchestrator.generate_batch(&entities, 14).await;
    let outcome = &report.outcomes[0];

    assert_eq!(outcome.status, OutcomeStatus::Cached);
    assert_eq!(outcome.cache_age_hours, Some(0.0));
    assert_eq!(engine.calls(), calls_after_first);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_batches_generate_once() {
    let key = EntityKey::disease("influenza");
    let source = InMemoryObservationSource::new();
    source.extend(key.clone(), daily_rows(&weekly_counts(6))).await;
    let engine = Arc::new(CountingEngine::default());
    let orchestrator = Arc::new(
        ForecastOrchestrator::new(
            config(),
            Arc::new(SlowSource(source)),
            Arc::new(InMemoryForecastStore::new()),
        )
        .unwrap()
        .with_engine(engine.clone()),
    );
    let entities = vec![Entity::new(key)];

    let run = |orchestrator: Arc<ForecastOrchestrator>, entities: Vec<Entity>| {
        tokio::spawn(async move { orchestrator.generate_batch(&entities, 14).await })
    };
    let first = run(orchestrator.clone(), entities.clone());
    let second = run(orchestrator.clone(), entities.clone());
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    let statuses = [first.outcomes[0].status, second.outcomes[0].status];
    let generated = statuses.iter().filter(|s| **s == OutcomeStatus::Generated).count();
    let cached = statuses.iter().filter(|s| **s == OutcomeStatus::Cached).count();
    assert_eq!(generated, 1);
    assert_eq!(cached, 1);
    // One forecast plus one backtest fit
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_newer_stored_record_is_reported() {
    let key = EntityKey::service("radiology");
    let source = source_with(vec![(key.clone(), daily_rows(&weekly_counts(4)))]).await;
    let store = Arc::new(OutpacedStore::default());
    let orchestrator = ForecastOrchestrator::new(config(), source, store.clone()).unwrap();

    let report = orchestrator.generate_batch(&[Entity::new(key)], 7).await;
    let outcome = &report.outcomes[0];

    assert_eq!(outcome.status, OutcomeStatus::Generated);
    let record = outcome.record.as_ref().unwrap();
    assert_eq!(record.model_version, "other-writer");
    assert_eq!(Some(record), store.latest(&record.entity_key).await.unwrap().as_ref());
}

#[tokio::test]
async fn test_short_history_skips_the_engine() {
    let key = EntityKey::service("physiotherapy");
    let source = source_with(vec![(key.clone(), daily_rows(&[4, 5, 3, 6, 5]))]).await;
    let store = Arc::new(InMemoryForecastStore::new());
    let engine = Arc::new(CountingEngine::default());

    let orchestrator = ForecastOrchestrator::new(config(), source, store.clone())
        .unwrap()
        .with_engine(engine.clone());
    let report = orchestrator.generate_batch(&[Entity::new(key)], 7).await;
    let outcome = &report.outcomes[0];

    assert_eq!(outcome.status, OutcomeStatus::Skipped);
    assert_eq!(outcome.data_quality, Some(DataQuality::Insufficient));
    assert_eq!(outcome.data_points_count, 5);
    assert!(outcome.error.as_deref().unwrap_or("").contains("at least 7"));
    assert_eq!(engine.calls(), 0);
    assert_eq!(store.len().await, Ok(0));

    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.succeeded, 0);
    assert_eq!(report.summary.failed, 0);
}

#[tokio::test]
async fn test_one_bad_entity_does_not_stop_the_batch() {
    let good_a = EntityKey::disease("dengue").in_locality("east");
    let broken = EntityKey::disease("cholera").in_locality("east");
    let good_b = EntityKey::service("maternity");

    let mut bad_rows = daily_rows(&weekly_counts(2));
    bad_rows.push(RawObservation::new("not a date", 3));

    let source = source_with(vec![
        (good_a.clone(), daily_rows(&weekly_counts(5))),
        (broken.clone(), bad_rows),
        (good_b.clone(), daily_rows(&weekly_counts(3))),
    ])
    .await;
    let store = Arc::new(InMemoryForecastStore::new());
    let orchestrator = ForecastOrchestrator::new(config(), source, store.clone()).unwrap();

    let entities = vec![
        Entity::new(good_a).with_population(50),
        Entity::new(broken),
        Entity::new(good_b),
    ];
    let report = orchestrator.generate_batch(&entities, 10).await;

    let statuses: Vec<OutcomeStatus> = report.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![OutcomeStatus::Generated, OutcomeStatus::Failed, OutcomeStatus::Generated]
    );
    assert!(report.outcomes[1]
        .error
        .as_deref()
        .unwrap_or("")
        .contains("Malformed input"));

    // A weekday peak in the thirties against 50 people is at least severe
    assert!(report.outcomes[0].projected_severity >= Some(SeverityLabel::Severe));
    assert_eq!(report.outcomes[2].data_quality, Some(DataQuality::Medium));

    assert_eq!(report.summary.requested, 3);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.total_forecast_points, 20);
    let average = report.summary.average_r_squared.unwrap();
    assert!((0.0..=1.0).contains(&average));
    assert_eq!(store.len().await, Ok(2));
}

#[tokio::test]
async fn test_persistence_failure_is_isolated() {
    let key = EntityKey::disease("measles");
    let source = source_with(vec![(key.clone(), daily_rows(&weekly_counts(4)))]).await;
    let orchestrator = ForecastOrchestrator::new(config(), source, Arc::new(BrokenStore)).unwrap();

    let report = orchestrator.generate_batch(&[Entity::new(key)], 5).await;

    assert_eq!(report.outcomes[0].status, OutcomeStatus::Failed);
    assert!(report.outcomes[0]
        .error
        .as_deref()
        .unwrap_or("")
        .contains("connection reset"));
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.average_r_squared, None);
}

#[tokio::test]
async fn test_regeneration_replaces_the_record() {
    let key = EntityKey::disease("typhoid");
    let source = source_with(vec![(key.clone(), daily_rows(&weekly_counts(4)))]).await;
    let store = Arc::new(InMemoryForecastStore::new());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
    let orchestrator = ForecastOrchestrator::new(config(), source.clone(), store.clone())
        .unwrap()
        .with_clock(clock.clone());
    let entities = vec![Entity::new(key.clone())];

    orchestrator.generate_batch(&entities, 7).await;
    source.extend(key.clone(), daily_rows(&[0; 35]).split_off(28)).await;
    clock.advance(Duration::hours(30));
    orchestrator.generate_batch(&entities, 7).await;

    assert_eq!(store.len().await, Ok(1));
    let stored = store.latest(&key).await.unwrap().unwrap();
    assert_eq!(stored.generated_at, clock_time(30));
    assert_eq!(stored.points.len(), 7);
}

fn clock_time(hours: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

#[tokio::test(start_paused = true)]
async fn test_entities_are_paced() {
    let keys: Vec<EntityKey> = ["a", "b", "c"].iter().map(|n| EntityKey::disease(*n)).collect();
    let source = source_with(
        keys.iter()
            .map(|k| (k.clone(), daily_rows(&[1, 2])))
            .collect(),
    )
    .await;
    let config = SchedulerConfig {
        pacing_delay_ms: 250,
        ..SchedulerConfig::default()
    };
    let orchestrator =
        ForecastOrchestrator::new(config, source, Arc::new(InMemoryForecastStore::new())).unwrap();
    let entities: Vec<Entity> = keys.into_iter().map(Entity::new).collect();

    let started = tokio::time::Instant::now();
    let report = orchestrator.generate_batch(&entities, 3).await;

    assert_eq!(report.summary.skipped, 3);
    assert!(started.elapsed() >= std::time::Duration::from_millis(500));
    assert!(started.elapsed() < std::time::Duration::from_millis(750));
}
