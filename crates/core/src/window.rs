//! Planning of the contiguous calendar windows that an ingestion run marks
//! for (re)aggregation.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::period::{iso, Granularity, Period};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowPlanningError {
    #[error("Cannot resolve '{0}' to a period start")]
    Unresolvable(String),
    #[error("Affected range is inverted: {earliest} is after {latest}")]
    Inverted { earliest: String, latest: String },
    #[error("Period after {0} is out of the supported date range")]
    OutOfRange(String),
}

/// Plans the periods covering `[earliest, latest]`, where `latest` is the
/// exclusive high-water mark of the affected range (the stop of the last
/// affected event). The first period always contains `earliest`; when both
/// bounds coincide exactly one period is produced.
pub fn plan_windows(
    earliest: NaiveDateTime,
    latest: NaiveDateTime,
    granularity: Granularity,
) -> Result<Vec<Period>, WindowPlanningError> {
    if earliest > latest {
        return Err(WindowPlanningError::Inverted {
            earliest: iso(earliest),
            latest: iso(latest),
        });
    }
    plan_windows_from_str(&iso(earliest), latest, granularity)
}

/// Same as [`plan_windows`] but anchors on a (possibly partial) ISO date
/// string, e.g. `"2024-03"` or `"2024"`.
pub fn plan_windows_from_str(
    earliest: &str,
    latest: NaiveDateTime,
    granularity: Granularity,
) -> Result<Vec<Period>, WindowPlanningError> {
    let start = granularity
        .anchor(earliest)
        .ok_or_else(|| WindowPlanningError::Unresolvable(earliest.to_string()))?;
    if start > latest {
        return Err(WindowPlanningError::Inverted {
            earliest: earliest.to_string(),
            latest: iso(latest),
        });
    }

    let mut period = Period::starting_at(granularity, start)
        .ok_or_else(|| WindowPlanningError::OutOfRange(iso(start)))?;
    let mut windows = Vec::new();
    loop {
        let reached = period.stop >= latest;
        let stop = period.stop;
        windows.push(period);
        if reached {
            break;
        }
        period = period
            .next()
            .ok_or_else(|| WindowPlanningError::OutOfRange(iso(stop)))?;
    }

    Ok(windows)
}
