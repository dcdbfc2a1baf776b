//! The two passes of an ingestion run.
//!
//! The statement pass turns one statement file into movements plus `UPDATE`
//! markers for every month and year it touches. The aggregation pass reads
//! the pending markers back from the store, recomputes the aggregates of the
//! marked windows from the stored movements and flips the markers to
//! `UPDATED`. Neither pass writes: both return an [`IngestionBatch`] whose
//! operations the caller applies in one go.

use chrono::{Duration, NaiveDateTime};
use saldo_core::{
    plan_windows, EventQuery, EventStore, Granularity, MarkerStatus, Movement, NameMatch,
    OrderBy, Period, SourceMetadata, StoreError, UpdateMarker, ValidityInterval, Value,
    WindowPlanningError, WriteOperation,
};
use serde::Serialize;
use std::io::Read;
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregate::{AggregateBucket, Dimension, PeriodAggregator};
use crate::classify::{MalformedRowError, TransactionClassifier};
use crate::filename::{FileNameError, FileNameMetadata};
use crate::movement::{self, MOVEMENT};
use crate::protocol::{AggregateSet, ReplaceWriteProtocol, SourceSettings};
use crate::report::CompletenessReport;
use crate::rules::RuleCatalog;
use crate::statement::{read_statement, StatementError, StatementLayout};

const GRANULARITIES: [Granularity; 2] = [Granularity::Month, Granularity::Year];

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    FileName(#[from] FileNameError),
    #[error("{file}: {source}")]
    Statement { file: String, source: StatementError },
    #[error("{file}: none of {failures} rows could be classified; first failure: {first}")]
    NothingClassified { file: String, failures: usize, first: MalformedRowError },
    #[error("{file}: {source}")]
    Planning { file: String, source: WindowPlanningError },
    #[error("{file}: generation time cannot be advanced")]
    GenerationOverflow { file: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything one run produced for one file. The operations are ordered and
/// meant to be applied together.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionBatch {
    pub source: SourceMetadata,
    pub movements: Vec<Movement>,
    pub operations: Vec<WriteOperation>,
    pub report: CompletenessReport,
}

impl IngestionBatch {
    fn open(
        name: &str,
        reception_time: NaiveDateTime,
        generation_offset: Duration,
    ) -> Result<Self, PipelineError> {
        let meta = FileNameMetadata::parse(name)?;
        let generation_time = meta
            .generation_time
            .checked_add_signed(generation_offset)
            .ok_or_else(|| PipelineError::GenerationOverflow { file: name.to_string() })?;
        Ok(Self {
            source: SourceMetadata {
                name: name.to_string(),
                reception_time,
                generation_time,
                reported_validity_start: meta.reported_validity_start,
                reported_validity_stop: meta.reported_validity_stop,
                validity_start: None,
                validity_stop: None,
                ingestion_completeness: Default::default(),
            },
            movements: Vec::new(),
            operations: Vec::new(),
            report: CompletenessReport::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn is_complete(&self) -> bool {
        self.report.is_complete()
    }

    /// The window the batch covers, once anything was produced.
    pub fn validity(&self) -> Option<ValidityInterval> {
        self.source.validity()
    }

    fn seal(&mut self, validity: Option<ValidityInterval>) {
        self.source.ingestion_completeness = self.report.completeness();
        if let Some(validity) = validity {
            self.source = self.source.with_validity(validity);
        }
    }
}

/// Result of classifying and aggregating a statement without touching a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementPreview {
    pub file: String,
    pub movements: usize,
    pub problems: Vec<String>,
    pub months: Vec<AggregateBucket>,
    pub years: Vec<AggregateBucket>,
}

pub struct Pipeline<'a> {
    catalog: &'a RuleCatalog,
    settings: &'a SourceSettings,
    layout: &'a StatementLayout,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        catalog: &'a RuleCatalog,
        settings: &'a SourceSettings,
        layout: &'a StatementLayout,
    ) -> Self {
        Self { catalog, settings, layout }
    }

    fn classify<R: Read>(
        &self,
        name: &str,
        data: R,
        report: &mut CompletenessReport,
    ) -> Result<Vec<Movement>, PipelineError> {
        let rows = read_statement(data, self.layout).map_err(|source| PipelineError::Statement {
            file: name.to_string(),
            source,
        })?;

        let classifier = TransactionClassifier::new(self.catalog, name, self.layout.decimal_comma);
        let mut movements = Vec::with_capacity(rows.len());
        let mut first_failure = None;
        let mut failures = 0;
        for row in &rows {
            match classifier.classify(row) {
                Ok(m) => movements.push(m),
                Err(e) => {
                    warn!(file = name, row = e.row(), "Skipping malformed row: {e}");
                    report.record(format_args!("{name}: {e}"));
                    failures += 1;
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            Some(first) if movements.is_empty() => Err(PipelineError::NothingClassified {
                file: name.to_string(),
                failures,
                first,
            }),
            _ => Ok(movements),
        }
    }

    /// Statement pass: classify every row of `data`, then package the
    /// movements and the `UPDATE` markers of every touched month and year.
    pub fn ingest_statement<R: Read>(
        &self,
        name: &str,
        data: R,
        reception_time: NaiveDateTime,
    ) -> Result<IngestionBatch, PipelineError> {
        let mut batch = IngestionBatch::open(name, reception_time, Duration::zero())?;
        let movements = self.classify(name, data, &mut batch.report)?;

        let Some(validity) = ValidityInterval::span(movements.iter().map(|m| m.validity)) else {
            info!(file = name, "Statement holds no movements");
            batch.seal(None);
            return Ok(batch);
        };

        let planning = |source| PipelineError::Planning { file: name.to_string(), source };
        let months = plan_windows(validity.start, validity.stop, Granularity::Month).map_err(planning)?;
        let years = plan_windows(validity.start, validity.stop, Granularity::Year).map_err(planning)?;

        batch.seal(Some(validity));
        batch.operations = ReplaceWriteProtocol::new(self.settings).statement_operations(
            &movements,
            &months,
            &years,
            &batch.source,
        );
        info!(
            file = name,
            movements = movements.len(),
            months = months.len(),
            years = years.len(),
            complete = batch.is_complete(),
            "Classified statement"
        );
        batch.movements = movements;
        Ok(batch)
    }

    /// Aggregation pass triggered by the file `trigger`. Its source metadata
    /// carries a generation time one microsecond after the trigger's, which
    /// tells the two passes of one file apart downstream. The stores apply
    /// operations in call order and never compare generation times.
    pub fn reaggregate<S: EventStore + ?Sized>(
        &self,
        store: &S,
        trigger: &str,
        reception_time: NaiveDateTime,
    ) -> Result<IngestionBatch, PipelineError> {
        let mut batch = IngestionBatch::open(trigger, reception_time, Duration::microseconds(1))?;
        let aggregator = PeriodAggregator::new(self.catalog);

        let mut sets = Vec::new();
        for granularity in GRANULARITIES {
            let markers = self.pending_markers(store, granularity, &mut batch.report)?;
            let (Some(first), Some(stop)) = (
                markers.first().map(|m| m.period.start),
                markers.iter().map(|m| m.period.stop).max(),
            ) else {
                info!(file = trigger, %granularity, "No periods pending aggregation");
                continue;
            };

            let windows = plan_windows(first, stop, granularity).map_err(|source| {
                PipelineError::Planning { file: trigger.to_string(), source }
            })?;
            let movements = self.stored_movements(store, &windows, &mut batch.report)?;

            let mut buckets = aggregator.aggregate(&movements, Dimension::Group, &windows);
            buckets.extend(aggregator.aggregate(&movements, Dimension::Entity, &windows));
            info!(
                file = trigger,
                %granularity,
                windows = windows.len(),
                movements = movements.len(),
                buckets = buckets.len(),
                "Aggregated pending periods"
            );
            sets.push(AggregateSet { granularity, windows, buckets });
        }

        let validity = ValidityInterval::span(sets.iter().filter_map(AggregateSet::validity));
        batch.seal(validity);
        batch.operations = ReplaceWriteProtocol::new(self.settings).to_operations(&sets, &batch.source);
        Ok(batch)
    }

    /// Direct path: classify one statement and aggregate it on its own.
    pub fn preview_statement<R: Read>(
        &self,
        name: &str,
        data: R,
    ) -> Result<StatementPreview, PipelineError> {
        let mut report = CompletenessReport::new();
        let movements = self.classify(name, data, &mut report)?;
        let aggregator = PeriodAggregator::new(self.catalog);

        let mut preview = StatementPreview {
            file: name.to_string(),
            movements: movements.len(),
            problems: report.problems().to_vec(),
            months: Vec::new(),
            years: Vec::new(),
        };
        let Some(validity) = ValidityInterval::span(movements.iter().map(|m| m.validity)) else {
            return Ok(preview);
        };
        for granularity in GRANULARITIES {
            let windows = plan_windows(validity.start, validity.stop, granularity).map_err(|source| {
                PipelineError::Planning { file: name.to_string(), source }
            })?;
            let mut buckets = aggregator.aggregate(&movements, Dimension::Group, &windows);
            buckets.extend(aggregator.aggregate(&movements, Dimension::Entity, &windows));
            match granularity {
                Granularity::Month => preview.months = buckets,
                Granularity::Year => preview.years = buckets,
            }
        }
        Ok(preview)
    }

    fn pending_markers<S: EventStore + ?Sized>(
        &self,
        store: &S,
        granularity: Granularity,
        report: &mut CompletenessReport,
    ) -> Result<Vec<UpdateMarker>, PipelineError> {
        let query = EventQuery::gauge(UpdateMarker::gauge_name(granularity))
            .from_system(self.settings.bank.as_str())
            .with_value(
                NameMatch::Exact("status".to_string()),
                Value::Text(MarkerStatus::Update.as_str().to_string()),
            )
            .ordered(OrderBy::StartAscending);

        let mut markers = Vec::new();
        for event in store.get_events(&query)? {
            match UpdateMarker::from_event(&event) {
                Ok(marker) => markers.push(marker),
                Err(e) => {
                    warn!("Ignoring marker: {e}");
                    report.record(e);
                }
            }
        }
        Ok(markers)
    }

    fn stored_movements<S: EventStore + ?Sized>(
        &self,
        store: &S,
        windows: &[Period],
        report: &mut CompletenessReport,
    ) -> Result<Vec<Movement>, PipelineError> {
        let (Some(first), Some(last)) = (windows.first(), windows.last()) else {
            return Ok(Vec::new());
        };
        let query = EventQuery::gauge(MOVEMENT)
            .from_system(self.settings.bank.as_str())
            .starting_within(first.start, last.stop)
            .ordered(OrderBy::StartAscending);

        let mut movements = Vec::new();
        for event in store.get_events(&query)? {
            match movement::from_event(&event) {
                Ok(m) => movements.push(m),
                Err(e) => {
                    warn!("Ignoring stored movement: {e}");
                    report.record(e);
                }
            }
        }
        Ok(movements)
    }
}
