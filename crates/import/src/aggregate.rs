//! Per-period sums of movement amounts by group or entity.

use saldo_core::{
    iso, Attribute, Event, EventId, Gauge, Granularity, Link, Money, Movement, Period,
};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::movement::MOVEMENT;
use crate::rules::RuleCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Group,
    Entity,
}

impl Dimension {
    pub fn attribute(self) -> &'static str {
        match self {
            Dimension::Group => "group",
            Dimension::Entity => "entity",
        }
    }

    fn carried_by(self, movement: &Movement, value: &str) -> bool {
        match self {
            Dimension::Group => movement.has_group(value),
            Dimension::Entity => movement.has_entity(value),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Group => write!(f, "GROUP"),
            Dimension::Entity => write!(f, "ENTITY"),
        }
    }
}

/// Gauge name of an aggregate, e.g. `AGGREGATED_MOVEMENTS_GROUP_MONTH`.
pub fn aggregate_gauge(dimension: Dimension, granularity: Granularity) -> String {
    format!("AGGREGATED_MOVEMENTS_{dimension}_{granularity}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateBucket {
    pub dimension: Dimension,
    pub value: String,
    pub period: Period,
    pub amount: Money,
    /// Contributing movements, in the order they were aggregated.
    pub links: Vec<EventId>,
}

impl AggregateBucket {
    pub fn gauge_name(&self) -> String {
        aggregate_gauge(self.dimension, self.period.granularity)
    }

    pub fn to_event(&self, bank: &str) -> Event {
        let gauge = self.gauge_name();
        let id = EventId::derive(&format!(
            "{gauge}:{bank}:{}:{}",
            self.value,
            iso(self.period.start)
        ));
        Event {
            id,
            gauge: Gauge::new(gauge.as_str(), bank),
            start: self.period.start,
            stop: self.period.stop,
            values: vec![
                Attribute::text("bank", bank),
                Attribute::text(self.dimension.attribute(), self.value.as_str()),
                Attribute::double("amount", self.amount),
            ],
            links: self
                .links
                .iter()
                .map(|&target| Link::by_uuid(target, gauge.as_str(), MOVEMENT))
                .collect(),
        }
    }
}

pub struct PeriodAggregator<'a> {
    catalog: &'a RuleCatalog,
}

impl<'a> PeriodAggregator<'a> {
    pub fn new(catalog: &'a RuleCatalog) -> Self {
        Self { catalog }
    }

    /// One bucket per (window, dimension value) that at least one movement
    /// falls into. A movement falls into a window when its validity starts
    /// inside it; a movement with several tags counts fully in each. Amounts
    /// are added left to right in the order `movements` are given.
    pub fn aggregate(
        &self,
        movements: &[Movement],
        dimension: Dimension,
        windows: &[Period],
    ) -> Vec<AggregateBucket> {
        let universe: Vec<&str> = match dimension {
            Dimension::Group => self.catalog.group_universe().collect(),
            Dimension::Entity => self.catalog.entity_universe().collect(),
        };

        let mut buckets = Vec::new();
        for window in windows {
            let in_window: Vec<&Movement> = movements
                .iter()
                .filter(|m| window.contains(m.validity.start))
                .collect();
            for value in &universe {
                let selected: Vec<&Movement> = in_window
                    .iter()
                    .copied()
                    .filter(|m| dimension.carried_by(m, value))
                    .collect();
                if selected.is_empty() {
                    continue;
                }
                let amount = selected
                    .iter()
                    .fold(Money::zero(), |acc, m| acc + m.amount);
                buckets.push(AggregateBucket {
                    dimension,
                    value: value.to_string(),
                    period: *window,
                    amount,
                    links: selected.iter().map(|m| m.id).collect(),
                });
            }
            debug!(
                window = %iso(window.start),
                dimension = %dimension,
                movements = in_window.len(),
                "Aggregated window"
            );
        }
        buckets
    }
}
