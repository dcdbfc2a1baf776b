//! The narrow read/write contract the pipeline needs from an event store.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::attribute::Value;
use crate::event::Event;
use crate::operation::WriteOperation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl TimeOp {
    pub fn holds(self, lhs: NaiveDateTime, rhs: NaiveDateTime) -> bool {
        match self {
            TimeOp::Lt => lhs < rhs,
            TimeOp::Le => lhs <= rhs,
            TimeOp::Gt => lhs > rhs,
            TimeOp::Ge => lhs >= rhs,
            TimeOp::Eq => lhs == rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFilter {
    pub date: NaiveDateTime,
    pub op: TimeOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Exact(String),
    /// Any attribute whose name starts with the prefix (`group` matches `group0`, `group1`, ...).
    Prefix(String),
}

impl NameMatch {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatch::Exact(n) => name == n,
            NameMatch::Prefix(p) => name.starts_with(p.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueFilter {
    pub name: NameMatch,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    StartAscending,
    StartDescending,
}

/// Selects stored events. Every populated filter must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub gauge_name: Option<String>,
    /// Producing system, i.e. the bank.
    pub gauge_system: Option<String>,
    pub start_filters: Vec<TimeFilter>,
    pub value_filters: Vec<ValueFilter>,
    pub order_by: Option<OrderBy>,
}

impl EventQuery {
    pub fn gauge(name: impl Into<String>) -> Self {
        EventQuery { gauge_name: Some(name.into()), ..Default::default() }
    }

    pub fn from_system(mut self, system: impl Into<String>) -> Self {
        self.gauge_system = Some(system.into());
        self
    }

    /// Restricts to events whose start lies in `[from, to)`.
    pub fn starting_within(mut self, from: NaiveDateTime, to: NaiveDateTime) -> Self {
        self.start_filters.push(TimeFilter { date: from, op: TimeOp::Ge });
        self.start_filters.push(TimeFilter { date: to, op: TimeOp::Lt });
        self
    }

    pub fn with_value(mut self, name: NameMatch, value: Value) -> Self {
        self.value_filters.push(ValueFilter { name, value });
        self
    }

    pub fn ordered(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(gauge) = &self.gauge_name {
            if &event.gauge.name != gauge {
                return false;
            }
        }
        if let Some(system) = &self.gauge_system {
            if &event.gauge.system != system {
                return false;
            }
        }
        if !self.start_filters.iter().all(|f| f.op.holds(event.start, f.date)) {
            return false;
        }
        self.value_filters.iter().all(|f| {
            event
                .values
                .iter()
                .any(|a| f.name.matches(&a.name) && a.value == f.value)
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Operation on stream '{0}' carries no validity window")]
    MissingValidity(String),
}

pub trait EventStore {
    /// Events matching `query`. Without an ordering, insertion order is kept.
    fn get_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError>;

    /// Applies one insert-and-erase operation atomically.
    fn apply(&mut self, operation: &WriteOperation) -> Result<(), StoreError>;

    fn apply_all(&mut self, operations: &[WriteOperation]) -> Result<(), StoreError> {
        operations.iter().try_for_each(|op| self.apply(op))
    }
}
