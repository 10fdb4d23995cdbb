//! CSV input for batch runs
//!
//! Each row is one observation: `kind,name,locality,date,count`, with an
//! optional trailing `population` column. Empty localities mean "all regions".

use crate::entity::{Entity, EntityKey, EntityKind};
use crate::error::Result;
use crate::store::InMemoryObservationSource;
use demand_forecast::{ForecastError, RawObservation};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRow {
    kind: String,
    name: String,
    #[serde(default)]
    locality: Option<String>,
    date: String,
    count: String,
    #[serde(default)]
    population: Option<i64>,
}

/// Entities and their history read from one CSV file
#[derive(Debug, Default)]
pub struct BatchInput {
    /// Entities in key order
    pub entities: Vec<Entity>,
    pub rows: BTreeMap<EntityKey, Vec<RawObservation>>,
}

impl BatchInput {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut populations: BTreeMap<EntityKey, Option<i64>> = BTreeMap::new();
        let mut rows: BTreeMap<EntityKey, Vec<RawObservation>> = BTreeMap::new();

        for (line, record) in csv_reader.deserialize::<CsvRow>().enumerate() {
            let row = record?;
            let kind: EntityKind = row.kind.parse().map_err(|e: String| {
                ForecastError::MalformedInput(format!("Row {}: {}", line + 1, e))
            })?;
            let locality = row.locality.filter(|l| !l.is_empty());
            let key = EntityKey::new(kind, row.name, locality);

            let population = populations.entry(key.clone()).or_insert(None);
            if row.population.is_some() {
                *population = row.population;
            }
            rows.entry(key)
                .or_default()
                .push(RawObservation::new(row.date, row.count.as_str()));
        }

        let entities = populations
            .into_iter()
            .map(|(key, population)| Entity { key, population })
            .collect();

        Ok(Self { entities, rows })
    }

    /// Observation source serving the loaded rows
    pub fn into_source(self) -> (Vec<Entity>, InMemoryObservationSource) {
        (self.entities, InMemoryObservationSource::from_rows(self.rows))
    }
}
