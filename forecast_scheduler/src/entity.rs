use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of count an entity tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Reported cases of a disease
    Disease,
    /// Demand for a health service
    Service,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Disease => "disease",
            EntityKind::Service => "service",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disease" => Ok(EntityKind::Disease),
            "service" => Ok(EntityKind::Service),
            other => Err(format!("Unknown entity kind: {}", other)),
        }
    }
}

/// Identity of a forecast: at most one live record exists per key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub name: String,
    /// Region the counts are scoped to, `None` for all regions
    pub locality: Option<String>,
}

impl EntityKey {
    pub fn new(kind: EntityKind, name: impl Into<String>, locality: Option<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            locality,
        }
    }

    pub fn disease(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Disease, name, None)
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Service, name, None)
    }

    pub fn in_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.name)?;
        if let Some(locality) = &self.locality {
            write!(f, "@{}", locality)?;
        }
        Ok(())
    }
}

/// An entity to forecast in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    /// Population at risk, used to grade projected severity
    pub population: Option<i64>,
}

impl Entity {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            population: None,
        }
    }

    pub fn with_population(mut self, population: i64) -> Self {
        self.population = Some(population);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(EntityKey::disease("dengue").to_string(), "disease:dengue");
        assert_eq!(
            EntityKey::service("dental").in_locality("north").to_string(),
            "service:dental@north"
        );
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Disease".parse::<EntityKind>(), Ok(EntityKind::Disease));
        assert_eq!(" service ".parse::<EntityKind>(), Ok(EntityKind::Service));
        assert!("clinic".parse::<EntityKind>().is_err());
    }
}
