pub mod aggregate;
pub mod classify;
pub mod filename;
pub mod movement;
pub mod pipeline;
pub mod protocol;
pub mod report;
pub mod rules;
pub mod statement;

pub use aggregate::{aggregate_gauge, AggregateBucket, Dimension, PeriodAggregator};
pub use classify::{MalformedRowError, ParsedRow, TransactionClassifier};
pub use filename::{FileNameError, FileNameMetadata};
pub use movement::{DecodeError, MovementBuilder, MOVEMENT};
pub use pipeline::{IngestionBatch, Pipeline, PipelineError, StatementPreview};
pub use protocol::{AggregateSet, ReplaceWriteProtocol, SourceSettings, AGGREGATION_EXEC, STATEMENT_EXEC};
pub use report::CompletenessReport;
pub use rules::{ConfigError, EntityRule, GroupPattern, GroupRule, RuleCatalog, RuleSet, SignConstraint};
pub use statement::{read_statement, StatementError, StatementLayout, StatementRow};
