//! Metadata encoded at fixed character positions of a statement file name,
//! e.g. `BANKSAN_MOVEMENTS__20250703T120000_20230602T000000_20250703T000000_0001.xls`.

use chrono::NaiveDateTime;
use std::ops::Range;
use thiserror::Error;

const GENERATION_TIME: Range<usize> = 19..34;
const VALIDITY_START: Range<usize> = 35..50;
const VALIDITY_STOP: Range<usize> = 51..66;
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileNameError {
    #[error("File name '{name}' is too short to carry {field} at {start}..{end}")]
    TooShort { name: String, field: &'static str, start: usize, end: usize },
    #[error("File name '{name}' has an invalid {field}: '{text}'")]
    InvalidTimestamp { name: String, field: &'static str, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileNameMetadata {
    pub generation_time: NaiveDateTime,
    pub reported_validity_start: NaiveDateTime,
    pub reported_validity_stop: NaiveDateTime,
}

impl FileNameMetadata {
    pub fn parse(name: &str) -> Result<Self, FileNameError> {
        Ok(Self {
            generation_time: stamp(name, GENERATION_TIME, "generation time")?,
            reported_validity_start: stamp(name, VALIDITY_START, "validity start")?,
            reported_validity_stop: stamp(name, VALIDITY_STOP, "validity stop")?,
        })
    }
}

fn stamp(name: &str, range: Range<usize>, field: &'static str) -> Result<NaiveDateTime, FileNameError> {
    let text = name.get(range.clone()).ok_or_else(|| FileNameError::TooShort {
        name: name.to_string(),
        field,
        start: range.start,
        end: range.end,
    })?;
    NaiveDateTime::parse_from_str(text, STAMP_FORMAT).map_err(|_| FileNameError::InvalidTimestamp {
        name: name.to_string(),
        field,
        text: text.to_string(),
    })
}
