use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::period::ValidityInterval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace every prior event of the stream overlapping the validity window.
    InsertAndErase,
}

/// Names the logical stream an operation writes to and the processor that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimSignature {
    pub name: String,
    pub exec: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completeness {
    pub check: bool,
    pub message: String,
}

impl Default for Completeness {
    fn default() -> Self {
        Completeness { check: true, message: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub name: String,
    pub reception_time: NaiveDateTime,
    pub generation_time: NaiveDateTime,
    pub reported_validity_start: NaiveDateTime,
    pub reported_validity_stop: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_start: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_stop: Option<NaiveDateTime>,
    pub ingestion_completeness: Completeness,
}

impl SourceMetadata {
    pub fn validity(&self) -> Option<ValidityInterval> {
        Some(ValidityInterval::new(self.validity_start?, self.validity_stop?))
    }

    pub fn with_validity(&self, validity: ValidityInterval) -> Self {
        SourceMetadata {
            validity_start: Some(validity.start),
            validity_stop: Some(validity.stop),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOperation {
    pub mode: WriteMode,
    pub dim_signature: DimSignature,
    pub source: SourceMetadata,
    pub events: Vec<Event>,
}

impl WriteOperation {
    pub fn stream(&self) -> &str {
        &self.dim_signature.name
    }

    /// The window this operation supersedes. Operations built by the pipeline
    /// always carry one.
    pub fn validity(&self) -> Option<ValidityInterval> {
        self.source.validity()
    }
}
