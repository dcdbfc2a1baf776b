use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use thiserror::Error;

/// Where the columns of a statement export live and how its numbers are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementLayout {
    /// Preamble lines above the header row.
    pub skip_rows: usize,
    pub delimiter: String,
    /// `1.234,56` instead of `1,234.56`.
    pub decimal_comma: bool,
    pub operation_date: String,
    pub value_date: String,
    pub concept: String,
    pub amount: String,
    pub balance: String,
}

impl Default for StatementLayout {
    fn default() -> Self {
        Self {
            skip_rows: 7,
            delimiter: ",".to_string(),
            decimal_comma: false,
            operation_date: "FECHA OPERACIÓN".to_string(),
            value_date: "FECHA VALOR".to_string(),
            concept: "CONCEPTO".to_string(),
            amount: "IMPORTE EUR".to_string(),
            balance: "SALDO".to_string(),
        }
    }
}

/// One data row with its fields still as text. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementRow {
    /// Zero-based index among the data rows of the file.
    pub position: usize,
    pub operation_date: Option<String>,
    pub value_date: Option<String>,
    pub concept: Option<String>,
    pub amount: Option<String>,
    pub balance: Option<String>,
    /// First mapped field whose bytes are not valid UTF-8.
    pub undecodable: Option<&'static str>,
}

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
}

struct ColumnIndex {
    operation_date: usize,
    value_date: usize,
    concept: usize,
    amount: usize,
    balance: usize,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, layout: &StatementLayout) -> Result<Self, StatementError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name.trim())
                .ok_or_else(|| StatementError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            operation_date: find(&layout.operation_date)?,
            value_date: find(&layout.value_date)?,
            concept: find(&layout.concept)?,
            amount: find(&layout.amount)?,
            balance: find(&layout.balance)?,
        })
    }
}

fn cell(record: &csv::ByteRecord, col: usize) -> Result<Option<String>, std::str::Utf8Error> {
    let Some(bytes) = record.get(col) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(bytes)?.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Reads every data row of a statement export. Row-level problems, including
/// cells that are not valid UTF-8, are left to the classifier; only
/// structural problems (unreadable file, missing header column) fail here.
pub fn read_statement<R: Read>(
    data: R,
    layout: &StatementLayout,
) -> Result<Vec<StatementRow>, StatementError> {
    let mut buffered = BufReader::new(data);
    let mut discard = String::new();
    for _ in 0..layout.skip_rows {
        discard.clear();
        if buffered.read_line(&mut discard)? == 0 {
            break;
        }
    }

    let delimiter = layout.delimiter.as_bytes().first().copied().unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(buffered);

    let columns = ColumnIndex::resolve(reader.headers()?, layout)?;

    let mut rows = Vec::new();
    for (position, result) in reader.byte_records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.iter().all(u8::is_ascii_whitespace)) {
            continue;
        }
        let mut undecodable = None;
        let mut text = |col: usize, field: &'static str| {
            cell(&record, col).unwrap_or_else(|_| {
                undecodable.get_or_insert(field);
                None
            })
        };
        let operation_date = text(columns.operation_date, "operation date");
        let value_date = text(columns.value_date, "value date");
        let concept = text(columns.concept, "concept");
        let amount = text(columns.amount, "amount");
        let balance = text(columns.balance, "balance");
        rows.push(StatementRow {
            position,
            operation_date,
            value_date,
            concept,
            amount,
            balance,
            undecodable,
        });
    }

    Ok(rows)
}
