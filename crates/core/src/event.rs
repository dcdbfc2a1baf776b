use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::attribute::Attribute;
use crate::period::ValidityInterval;

/// Namespace for the name-based (v5) identifiers of everything the pipeline emits.
const SALDO_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_3a52_9d0e_4b7a_8e21_54f0_c3d9_a7b1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Deterministic identifier derived from `key`; the same key always yields
    /// the same id, which lets re-ingestion overwrite instead of duplicate.
    pub fn derive(key: &str) -> Self {
        EventId(Uuid::new_v5(&SALDO_NAMESPACE, key.as_bytes()))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsertionType {
    #[serde(rename = "INSERT_and_ERASE")]
    InsertAndErase,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gauge {
    pub name: String,
    pub system: String,
    pub insertion_type: InsertionType,
}

impl Gauge {
    pub fn new(name: impl Into<String>, system: impl Into<String>) -> Self {
        Gauge {
            name: name.into(),
            system: system.into(),
            insertion_type: InsertionType::InsertAndErase,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    ByUuid,
}

/// Back-link from a derived event to one of the events it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub link: EventId,
    pub link_mode: LinkMode,
    pub name: String,
    pub back_ref: String,
}

impl Link {
    pub fn by_uuid(target: EventId, name: impl Into<String>, back_ref: impl Into<String>) -> Self {
        Link {
            link: target,
            link_mode: LinkMode::ByUuid,
            name: name.into(),
            back_ref: back_ref.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub gauge: Gauge,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub values: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl Event {
    pub fn validity(&self) -> ValidityInterval {
        ValidityInterval::new(self.start, self.stop)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.values.iter().find(|a| a.name == name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(Attribute::as_text)
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        self.attribute(name).and_then(Attribute::as_double)
    }

    pub fn timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        self.attribute(name).and_then(Attribute::as_timestamp)
    }

    /// Text attributes named `<prefix><n>`, ordered by `n`.
    pub fn indexed_texts(&self, prefix: &str) -> Vec<&str> {
        let mut indexed: Vec<(usize, &str)> = self
            .values
            .iter()
            .filter_map(|a| {
                let index = a.name.strip_prefix(prefix)?.parse::<usize>().ok()?;
                Some((index, a.as_text()?))
            })
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, v)| v).collect()
    }
}
