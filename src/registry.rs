//! Standard blocking configurations per entity type.
//!
//! Each list pairs exact keys on high-precision identifiers with phonetic or
//! prefix keys on noisy text fields. The lists are advisory; any caller may
//! pass its own configs instead.

use crate::models::{BlockingKeyConfig, BlockingMethod};
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Company,
    Address,
    Product,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Person,
        EntityType::Company,
        EntityType::Address,
        EntityType::Product,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Company => "company",
            Self::Address => "address",
            Self::Product => "product",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "person" => Ok(Self::Person),
            "company" => Ok(Self::Company),
            "address" => Ok(Self::Address),
            "product" => Ok(Self::Product),
            other => bail!(
                "Unknown entity type '{}' (expected person, company, address or product)",
                other
            ),
        }
    }
}

fn person_configs() -> Vec<BlockingKeyConfig> {
    vec![
        BlockingKeyConfig::new(["email"], BlockingMethod::Exact),
        BlockingKeyConfig::new(["phone"], BlockingMethod::Exact),
        BlockingKeyConfig::new(["lastName"], BlockingMethod::ColognePhonetic),
        BlockingKeyConfig::new(["lastName"], BlockingMethod::Soundex),
        BlockingKeyConfig::new(["firstName"], BlockingMethod::Prefix).with_length(3),
        BlockingKeyConfig::new(["dateOfBirth"], BlockingMethod::Exact),
    ]
}

fn company_configs() -> Vec<BlockingKeyConfig> {
    vec![
        BlockingKeyConfig::new(["vatId"], BlockingMethod::Exact),
        BlockingKeyConfig::new(["registrationNumber"], BlockingMethod::Exact),
        BlockingKeyConfig::new(["name"], BlockingMethod::ColognePhonetic),
        BlockingKeyConfig::new(["name"], BlockingMethod::Prefix).with_length(4),
        BlockingKeyConfig::new(["name"], BlockingMethod::Metaphone),
    ]
}

fn address_configs() -> Vec<BlockingKeyConfig> {
    vec![
        BlockingKeyConfig::new(["postalCode"], BlockingMethod::Exact),
        BlockingKeyConfig::new(["street"], BlockingMethod::ColognePhonetic),
        BlockingKeyConfig::new(["city"], BlockingMethod::ColognePhonetic),
        BlockingKeyConfig::new(["street"], BlockingMethod::Prefix).with_length(5),
    ]
}

fn product_configs() -> Vec<BlockingKeyConfig> {
    vec![
        BlockingKeyConfig::new(["sku"], BlockingMethod::Exact),
        BlockingKeyConfig::new(["ean"], BlockingMethod::Exact),
        BlockingKeyConfig::new(["manufacturerPartNumber"], BlockingMethod::Exact),
        BlockingKeyConfig::new(["name"], BlockingMethod::Prefix).with_length(5),
    ]
}

/// Read-only standard configs, built once on first use.
pub static STANDARD_BLOCKING_CONFIGS: Lazy<BTreeMap<EntityType, Vec<BlockingKeyConfig>>> =
    Lazy::new(|| {
        EntityType::ALL
            .into_iter()
            .map(|entity| {
                let configs = match entity {
                    EntityType::Person => person_configs(),
                    EntityType::Company => company_configs(),
                    EntityType::Address => address_configs(),
                    EntityType::Product => product_configs(),
                };
                (entity, configs)
            })
            .collect()
    });

pub fn standard_configs(entity: EntityType) -> &'static [BlockingKeyConfig] {
    STANDARD_BLOCKING_CONFIGS
        .get(&entity)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_type_has_configs() {
        for entity in EntityType::ALL {
            assert!(!standard_configs(entity).is_empty(), "{entity} has no configs");
        }
        assert_eq!(STANDARD_BLOCKING_CONFIGS.len(), EntityType::ALL.len());
    }

    #[test]
    fn every_list_mixes_exact_and_fuzzy_keys() {
        for entity in EntityType::ALL {
            let configs = standard_configs(entity);
            assert!(configs.iter().any(|c| c.method == BlockingMethod::Exact));
            assert!(configs.iter().any(|c| c.method != BlockingMethod::Exact));
        }
    }

    #[test]
    fn person_uses_cologne_phonetic_on_last_name() {
        let configs = standard_configs(EntityType::Person);
        assert!(configs.iter().any(|c| {
            c.method == BlockingMethod::ColognePhonetic && c.fields == vec!["lastName".to_string()]
        }));
    }

    #[test]
    fn entity_type_parsing() {
        assert_eq!("Person".parse::<EntityType>().unwrap(), EntityType::Person);
        assert_eq!(" product ".parse::<EntityType>().unwrap(), EntityType::Product);
        assert!("vehicle".parse::<EntityType>().is_err());
        for entity in EntityType::ALL {
            assert_eq!(entity.as_str().parse::<EntityType>().unwrap(), entity);
        }
    }
}
