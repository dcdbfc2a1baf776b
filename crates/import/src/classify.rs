use chrono::NaiveDate;
use saldo_core::{Money, Movement, Tag};
use std::str::FromStr;
use thiserror::Error;

use crate::movement::MovementBuilder;
use crate::rules::RuleCatalog;
use crate::statement::StatementRow;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRowError {
    #[error("Row {row}: missing {field}")]
    MissingField { row: usize, field: &'static str },
    #[error("Row {row}: {field} is not valid UTF-8")]
    Undecodable { row: usize, field: &'static str },
    #[error("Row {row}: invalid {field} date '{value}'")]
    InvalidDate { row: usize, field: &'static str, value: String },
    #[error("Row {row}: invalid {field} '{value}'")]
    InvalidAmount { row: usize, field: &'static str, value: String },
    #[error("Row {row}: value date {value} is out of range")]
    OutOfRange { row: usize, value: NaiveDate },
}

impl MalformedRowError {
    pub fn row(&self) -> usize {
        match self {
            MalformedRowError::MissingField { row, .. }
            | MalformedRowError::Undecodable { row, .. }
            | MalformedRowError::InvalidDate { row, .. }
            | MalformedRowError::InvalidAmount { row, .. }
            | MalformedRowError::OutOfRange { row, .. } => *row,
        }
    }
}

/// A statement row whose fields all parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub position: usize,
    pub concept: String,
    pub amount: Money,
    pub balance: Money,
    pub operation_date: NaiveDate,
    pub value_date: NaiveDate,
}

impl ParsedRow {
    pub fn parse(row: &StatementRow, decimal_comma: bool) -> Result<Self, MalformedRowError> {
        let at = row.position;
        if let Some(field) = row.undecodable {
            return Err(MalformedRowError::Undecodable { row: at, field });
        }
        let required = |value: &Option<String>, field: &'static str| {
            value
                .clone()
                .ok_or(MalformedRowError::MissingField { row: at, field })
        };

        let concept = required(&row.concept, "concept")?;
        let amount = parse_amount(&required(&row.amount, "amount")?, decimal_comma)
            .ok_or_else(|| invalid_amount(row, "amount"))?;
        let balance = parse_amount(&required(&row.balance, "balance")?, decimal_comma)
            .ok_or_else(|| invalid_amount(row, "balance"))?;
        let operation_date = parse_day_first(&required(&row.operation_date, "operation date")?)
            .ok_or_else(|| invalid_date(row, "operation", &row.operation_date))?;
        let value_date = parse_day_first(&required(&row.value_date, "value date")?)
            .ok_or_else(|| invalid_date(row, "value", &row.value_date))?;

        Ok(Self { position: at, concept, amount, balance, operation_date, value_date })
    }
}

fn invalid_amount(row: &StatementRow, field: &'static str) -> MalformedRowError {
    let value = match field {
        "amount" => row.amount.clone(),
        _ => row.balance.clone(),
    };
    MalformedRowError::InvalidAmount {
        row: row.position,
        field,
        value: value.unwrap_or_default(),
    }
}

fn invalid_date(row: &StatementRow, field: &'static str, value: &Option<String>) -> MalformedRowError {
    MalformedRowError::InvalidDate {
        row: row.position,
        field,
        value: value.clone().unwrap_or_default(),
    }
}

/// Applies the rule catalog to statement rows.
pub struct TransactionClassifier<'a> {
    catalog: &'a RuleCatalog,
    builder: MovementBuilder<'a>,
    decimal_comma: bool,
}

impl<'a> TransactionClassifier<'a> {
    pub fn new(catalog: &'a RuleCatalog, source_name: &'a str, decimal_comma: bool) -> Self {
        Self { catalog, builder: MovementBuilder::new(source_name), decimal_comma }
    }

    /// Classifies one row. A movement always leaves with at least one group:
    /// when no group rule matches it gets `Spending no group` (amount < 0) or
    /// `Income no group` (amount >= 0). Entities get no such fallback.
    pub fn classify(&self, row: &StatementRow) -> Result<Movement, MalformedRowError> {
        let parsed = ParsedRow::parse(row, self.decimal_comma)?;

        let mut groups: Vec<Tag> = self
            .catalog
            .match_groups(&parsed.concept, parsed.amount)
            .into_iter()
            .map(Tag::rule)
            .collect();
        if groups.is_empty() {
            groups.push(Tag::fallback_group(parsed.amount));
        }
        let entities: Vec<Tag> = self
            .catalog
            .match_entities(&parsed.concept)
            .into_iter()
            .map(Tag::rule)
            .collect();

        let value_date = parsed.value_date;
        self.builder
            .build(parsed, groups, entities)
            .ok_or(MalformedRowError::OutOfRange { row: row.position, value: value_date })
    }
}

/// Parses a day-first date (`05/03/2024`, `05-03-2024`, `05.03.24`), falling
/// back to ISO `2024-03-05`. A trailing time part is ignored.
pub fn parse_day_first(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split_whitespace().next().unwrap_or(s);
    let date_part = date_part.split('T').next().unwrap_or(date_part);

    [
        "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%y", "%d-%m-%y", "%d.%m.%y", "%Y-%m-%d",
    ]
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Parses an amount cell. Thousands separators, currency symbols and
/// accounting parentheses are accepted.
pub fn parse_amount(s: &str, decimal_comma: bool) -> Option<Money> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let mut cleaned = s.replace(['$', '€', ' ', '\u{a0}'], "");
    cleaned = if decimal_comma {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.replace(',', "")
    };
    let money = Money::from_str(&cleaned).ok()?;
    Some(if negative { -money } else { money })
}
