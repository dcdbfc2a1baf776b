use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use saldo_import::{IngestionBatch, Pipeline, StatementPreview};
use saldo_storage::DbPool;
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;

/// What a command wrote, printed once it is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub file: String,
    pub movements: usize,
    pub operations: usize,
    pub events: usize,
    pub problems: Vec<String>,
}

impl RunSummary {
    fn add(&mut self, batch: &IngestionBatch) {
        self.movements += batch.movements.len();
        self.operations += batch.operations.len();
        self.events += batch.operations.iter().map(|op| op.events.len()).sum::<usize>();
        self.problems.extend(batch.report.problems().iter().cloned());
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} movements, {} operations, {} events written",
            self.file, self.movements, self.operations, self.events
        )?;
        if self.problems.is_empty() {
            write!(f, " (complete)")
        } else {
            write!(f, " ({} problems)", self.problems.len())?;
            for problem in &self.problems {
                write!(f, "\n  {problem}")?;
            }
            Ok(())
        }
    }
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))
}

/// Statement pass and aggregation pass, each committed as one transaction.
pub async fn ingest(
    config: &Config,
    pool: &DbPool,
    statement: &Path,
    reception_time: NaiveDateTime,
) -> Result<RunSummary> {
    let catalog = config.catalog()?;
    let pipeline = Pipeline::new(&catalog, &config.source, &config.statement);
    let name = file_name(statement)?;
    let data = File::open(statement).with_context(|| format!("Cannot open {}", statement.display()))?;

    info!(file = name, "Ingesting statement");
    let batch = pipeline.ingest_statement(name, data, reception_time)?;
    if !batch.is_complete() {
        warn!(file = name, problems = batch.report.len(), "Statement ingested partially");
    }
    saldo_storage::apply_operations(pool, &batch.operations).await?;

    let mut summary = RunSummary {
        file: name.to_string(),
        movements: 0,
        operations: 0,
        events: 0,
        problems: Vec::new(),
    };
    summary.add(&batch);
    summary.add(&reaggregate(&pipeline, pool, name, reception_time).await?);
    Ok(summary)
}

pub async fn aggregate(
    config: &Config,
    pool: &DbPool,
    trigger: &str,
    reception_time: NaiveDateTime,
) -> Result<RunSummary> {
    let catalog = config.catalog()?;
    let pipeline = Pipeline::new(&catalog, &config.source, &config.statement);
    let batch = reaggregate(&pipeline, pool, trigger, reception_time).await?;

    let mut summary = RunSummary {
        file: trigger.to_string(),
        movements: 0,
        operations: 0,
        events: 0,
        problems: Vec::new(),
    };
    summary.add(&batch);
    Ok(summary)
}

async fn reaggregate(
    pipeline: &Pipeline<'_>,
    pool: &DbPool,
    trigger: &str,
    reception_time: NaiveDateTime,
) -> Result<IngestionBatch> {
    let store = saldo_storage::load_events(pool).await?;
    let batch = pipeline.reaggregate(&store, trigger, reception_time)?;
    saldo_storage::apply_operations(pool, &batch.operations).await?;
    Ok(batch)
}

pub fn preview(config: &Config, statement: &Path) -> Result<StatementPreview> {
    let catalog = config.catalog()?;
    let pipeline = Pipeline::new(&catalog, &config.source, &config.statement);
    let data = File::open(statement).with_context(|| format!("Cannot open {}", statement.display()))?;
    Ok(pipeline.preview_statement(file_name(statement)?, data)?)
}
