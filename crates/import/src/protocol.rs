//! Packaging of movements, aggregates and update markers as insert-and-erase
//! operations, one stream per kind of event.

use saldo_core::{
    DimSignature, Event, Granularity, MarkerStatus, Movement, Period, SourceMetadata,
    UpdateMarker, ValidityInterval, WriteMode, WriteOperation,
};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateBucket;
use crate::movement;

pub const STATEMENT_EXEC: &str = "ingest_statement";
pub const AGGREGATION_EXEC: &str = "aggregate_movements";

/// Which bank a statement comes from and how its streams are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Stored as `bank` on every event and as the gauge system.
    pub bank: String,
    /// Suffix of every stream name, e.g. `MOVEMENTS_SANTANDER`.
    pub signature: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Aggregates of one granularity together with the windows they were computed for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSet {
    pub granularity: Granularity,
    pub windows: Vec<Period>,
    pub buckets: Vec<AggregateBucket>,
}

impl AggregateSet {
    pub fn validity(&self) -> Option<ValidityInterval> {
        ValidityInterval::span(self.windows.iter().map(|w| ValidityInterval::from(*w)))
    }
}

pub struct ReplaceWriteProtocol<'a> {
    settings: &'a SourceSettings,
}

impl<'a> ReplaceWriteProtocol<'a> {
    pub fn new(settings: &'a SourceSettings) -> Self {
        Self { settings }
    }

    pub fn movements_stream(&self) -> String {
        format!("MOVEMENTS_{}", self.settings.signature)
    }

    pub fn markers_stream(&self, granularity: Granularity) -> String {
        format!("UPDATE_{granularity}S_{}", self.settings.signature)
    }

    pub fn aggregates_stream(&self, granularity: Granularity) -> String {
        format!("AGGREGATED_MOVEMENTS_{granularity}_{}", self.settings.signature)
    }

    fn operation(
        &self,
        stream: String,
        exec: &str,
        source: &SourceMetadata,
        validity: ValidityInterval,
        events: Vec<Event>,
    ) -> WriteOperation {
        WriteOperation {
            mode: WriteMode::InsertAndErase,
            dim_signature: DimSignature {
                name: stream,
                exec: exec.to_string(),
                version: self.settings.version.clone(),
            },
            source: source.with_validity(validity),
            events,
        }
    }

    /// Movements first, then `UPDATE` markers for months and years. Empty
    /// when there are no movements.
    pub fn statement_operations(
        &self,
        movements: &[Movement],
        months: &[Period],
        years: &[Period],
        source: &SourceMetadata,
    ) -> Vec<WriteOperation> {
        let Some(validity) = ValidityInterval::span(movements.iter().map(|m| m.validity)) else {
            return Vec::new();
        };
        let bank = self.settings.bank.as_str();
        let mut operations = vec![self.operation(
            self.movements_stream(),
            STATEMENT_EXEC,
            source,
            validity,
            movements.iter().map(|m| movement::to_event(m, bank)).collect(),
        )];
        operations.extend(self.marker_operation(months, MarkerStatus::Update, STATEMENT_EXEC, source));
        operations.extend(self.marker_operation(years, MarkerStatus::Update, STATEMENT_EXEC, source));
        operations
    }

    /// Aggregates of every set, then the `UPDATED` markers of the windows
    /// they cover. A set without buckets still yields its operation so that
    /// stale aggregates in its windows are erased.
    pub fn to_operations(&self, sets: &[AggregateSet], source: &SourceMetadata) -> Vec<WriteOperation> {
        let bank = self.settings.bank.as_str();
        let mut operations = Vec::new();
        for set in sets {
            let Some(validity) = set.validity() else { continue };
            operations.push(self.operation(
                self.aggregates_stream(set.granularity),
                AGGREGATION_EXEC,
                source,
                validity,
                set.buckets.iter().map(|b| b.to_event(bank)).collect(),
            ));
        }
        for set in sets {
            operations.extend(self.marker_operation(
                &set.windows,
                MarkerStatus::Updated,
                AGGREGATION_EXEC,
                source,
            ));
        }
        operations
    }

    fn marker_operation(
        &self,
        windows: &[Period],
        status: MarkerStatus,
        exec: &str,
        source: &SourceMetadata,
    ) -> Option<WriteOperation> {
        let first = windows.first()?;
        let validity = ValidityInterval::span(windows.iter().map(|w| ValidityInterval::from(*w)))?;
        let bank = self.settings.bank.as_str();
        Some(self.operation(
            self.markers_stream(first.granularity),
            exec,
            source,
            validity,
            windows
                .iter()
                .map(|w| UpdateMarker::new(*w, status).to_event(bank))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Dimension;
    use chrono::{NaiveDate, NaiveDateTime};
    use saldo_core::{plan_windows, Completeness, EventId, Money};

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn settings() -> SourceSettings {
        SourceSettings {
            bank: "BANCO".to_string(),
            signature: "SAN".to_string(),
            version: "1.0".to_string(),
        }
    }

    fn source() -> SourceMetadata {
        SourceMetadata {
            name: "file.csv".to_string(),
            reception_time: ts(2024, 4, 2),
            generation_time: ts(2024, 4, 1),
            reported_validity_start: ts(2024, 3, 1),
            reported_validity_stop: ts(2024, 4, 1),
            validity_start: None,
            validity_stop: None,
            ingestion_completeness: Completeness::default(),
        }
    }

    #[test]
    fn stream_names() {
        let settings = settings();
        let protocol = ReplaceWriteProtocol::new(&settings);
        assert_eq!(protocol.movements_stream(), "MOVEMENTS_SAN");
        assert_eq!(protocol.markers_stream(Granularity::Month), "UPDATE_MONTHS_SAN");
        assert_eq!(protocol.markers_stream(Granularity::Year), "UPDATE_YEARS_SAN");
        assert_eq!(
            protocol.aggregates_stream(Granularity::Year),
            "AGGREGATED_MOVEMENTS_YEAR_SAN"
        );
    }

    #[test]
    fn nothing_to_write_without_movements() {
        let settings = settings();
        let protocol = ReplaceWriteProtocol::new(&settings);
        assert!(protocol.statement_operations(&[], &[], &[], &source()).is_empty());
    }

    #[test]
    fn aggregates_precede_markers_and_cover_their_windows() {
        let settings = settings();
        let protocol = ReplaceWriteProtocol::new(&settings);
        let months = plan_windows(ts(2024, 1, 10), ts(2024, 3, 2), Granularity::Month).unwrap();
        let set = AggregateSet {
            granularity: Granularity::Month,
            windows: months.clone(),
            buckets: vec![AggregateBucket {
                dimension: Dimension::Group,
                value: "Groceries".to_string(),
                period: months[1],
                amount: Money::from_cents(-100),
                links: vec![EventId::derive("m")],
            }],
        };

        let ops = protocol.to_operations(&[set], &source());
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].stream(), "AGGREGATED_MOVEMENTS_MONTH_SAN");
        assert_eq!(ops[0].dim_signature.exec, AGGREGATION_EXEC);
        assert_eq!(ops[0].validity(), Some(ValidityInterval::new(ts(2024, 1, 1), ts(2024, 4, 1))));
        assert_eq!(ops[1].stream(), "UPDATE_MONTHS_SAN");
        assert_eq!(ops[1].events.len(), 3);
        assert!(ops[1].events.iter().all(|e| e.text("status") == Some("UPDATED")));
        assert!(ops.iter().all(|op| op.mode == WriteMode::InsertAndErase));
    }

    #[test]
    fn empty_set_still_erases_its_windows() {
        let settings = settings();
        let protocol = ReplaceWriteProtocol::new(&settings);
        let years = plan_windows(ts(2024, 1, 1), ts(2024, 1, 1), Granularity::Year).unwrap();
        let set = AggregateSet { granularity: Granularity::Year, windows: years, buckets: vec![] };
        let ops = protocol.to_operations(&[set], &source());
        assert_eq!(ops[0].stream(), "AGGREGATED_MOVEMENTS_YEAR_SAN");
        assert!(ops[0].events.is_empty());
        assert_eq!(ops[0].source.validity_start, Some(ts(2024, 1, 1)));
    }
}
