use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout used for every start/stop written to the store.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fields missing from a partial date string are taken from this date.
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub fn iso(ts: NaiveDateTime) -> String {
    ts.format(ISO_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Month,
    Year,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Month => write!(f, "MONTH"),
            Granularity::Year => write!(f, "YEAR"),
        }
    }
}

impl Granularity {
    /// Number of leading characters of an ISO timestamp that identify the
    /// period: `YYYY-MM` for months, `YYYY` for years.
    pub fn anchor_width(self) -> usize {
        match self {
            Granularity::Month => 7,
            Granularity::Year => 4,
        }
    }

    fn months(self) -> Months {
        match self {
            Granularity::Month => Months::new(1),
            Granularity::Year => Months::new(12),
        }
    }

    pub fn advance(self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        ts.checked_add_months(self.months())
    }

    /// Calendar-aligned start of the period that contains `ts`.
    pub fn floor(self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = ts.date();
        let first = match self {
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }?;
        first.and_hms_opt(0, 0, 0)
    }

    /// Resolves the leading [`anchor_width`](Self::anchor_width) characters of
    /// `text` to the period start, filling missing fields from [`epoch`].
    /// Returns `None` when the prefix is not a date.
    pub fn anchor(self, text: &str) -> Option<NaiveDateTime> {
        let prefix: String = text.trim().chars().take(self.anchor_width()).collect();
        let mut parts = prefix.split('-');

        let year_text = parts.next()?;
        if year_text.len() != 4 || !year_text.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let year: i32 = year_text.parse().ok()?;
        let month = match parts.next() {
            Some(m) if !m.is_empty() => m.parse::<u32>().ok()?,
            Some(_) => return None,
            None => epoch().month(),
        };
        if parts.next().is_some() {
            return None;
        }

        NaiveDate::from_ymd_opt(year, month, epoch().day())?.and_hms_opt(0, 0, 0)
    }
}

/// One calendar month or year, `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub granularity: Granularity,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {})", self.granularity, iso(self.start), iso(self.stop))
    }
}

impl Period {
    /// Period of the given granularity starting exactly at `start`.
    pub fn starting_at(granularity: Granularity, start: NaiveDateTime) -> Option<Self> {
        let stop = granularity.advance(start)?;
        Some(Period { granularity, start, stop })
    }

    pub fn containing(granularity: Granularity, ts: NaiveDateTime) -> Option<Self> {
        Self::starting_at(granularity, granularity.floor(ts)?)
    }

    pub fn next(&self) -> Option<Self> {
        Self::starting_at(self.granularity, self.stop)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts < self.stop
    }
}

/// Half-open validity window of a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidityInterval {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl fmt::Display for ValidityInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", iso(self.start), iso(self.stop))
    }
}

impl ValidityInterval {
    pub fn new(start: NaiveDateTime, stop: NaiveDateTime) -> Self {
        ValidityInterval { start, stop }
    }

    /// The one-day window a movement lives in: `[value_date, value_date + 1 day)`.
    pub fn for_value_date(value_date: NaiveDate) -> Option<Self> {
        let start = value_date.and_hms_opt(0, 0, 0)?;
        let stop = value_date.checked_add_days(Days::new(1))?.and_hms_opt(0, 0, 0)?;
        Some(ValidityInterval { start, stop })
    }

    pub fn overlaps(&self, other: &ValidityInterval) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    /// Smallest interval covering every item, or `None` for an empty input.
    pub fn span<I: IntoIterator<Item = ValidityInterval>>(items: I) -> Option<Self> {
        items.into_iter().reduce(|acc, v| ValidityInterval {
            start: acc.start.min(v.start),
            stop: acc.stop.max(v.stop),
        })
    }
}

impl From<Period> for ValidityInterval {
    fn from(period: Period) -> Self {
        ValidityInterval::new(period.start, period.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn month_anchor_reads_seven_characters() {
        assert_eq!(Granularity::Month.anchor("2024-03-20T00:00:00"), Some(ts(2024, 3, 1)));
    }

    #[test]
    fn year_anchor_reads_four_characters() {
        // The month in the text is ignored; January comes from the epoch.
        assert_eq!(Granularity::Year.anchor("2024-03-20T00:00:00"), Some(ts(2024, 1, 1)));
    }

    #[test]
    fn anchor_fills_missing_month_from_epoch() {
        assert_eq!(Granularity::Month.anchor("2024"), Some(ts(2024, 1, 1)));
    }

    #[test]
    fn anchor_rejects_garbage() {
        assert_eq!(Granularity::Month.anchor("not a date"), None);
        assert_eq!(Granularity::Month.anchor("2024-13-01"), None);
        assert_eq!(Granularity::Year.anchor(""), None);
        assert_eq!(Granularity::Year.anchor("24-01-01"), None);
    }

    #[test]
    fn month_period_handles_short_months() {
        let p = Period::containing(Granularity::Month, ts(2024, 2, 29)).unwrap();
        assert_eq!(p.start, ts(2024, 2, 1));
        assert_eq!(p.stop, ts(2024, 3, 1));
        assert!(p.contains(ts(2024, 2, 29)));
        assert!(!p.contains(ts(2024, 3, 1)));
    }

    #[test]
    fn year_period_next_is_contiguous() {
        let p = Period::containing(Granularity::Year, ts(2023, 7, 4)).unwrap();
        let n = p.next().unwrap();
        assert_eq!(p.stop, n.start);
        assert_eq!(n.stop, ts(2025, 1, 1));
    }

    #[test]
    fn validity_is_one_day() {
        let v = ValidityInterval::for_value_date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
            .unwrap();
        assert_eq!(v.start, ts(2024, 12, 31));
        assert_eq!(v.stop, ts(2025, 1, 1));
    }

    #[test]
    fn span_and_overlap() {
        let a = ValidityInterval::new(ts(2024, 1, 1), ts(2024, 1, 2));
        let b = ValidityInterval::new(ts(2024, 3, 1), ts(2024, 3, 2));
        let span = ValidityInterval::span([b, a]).unwrap();
        assert_eq!(span, ValidityInterval::new(ts(2024, 1, 1), ts(2024, 3, 2)));
        assert!(!a.overlaps(&b));
        assert!(span.overlaps(&a));
        assert!(ValidityInterval::span(Vec::new()).is_none());
    }

    #[test]
    fn iso_format() {
        assert_eq!(iso(ts(2024, 3, 1)), "2024-03-01T00:00:00");
    }
}
