//! Canonical movement records: identity, validity and the event encoding
//! shared by the statement pass (writes) and the aggregation pass (reads).

use chrono::NaiveDate;
use saldo_core::{
    iso, Attribute, Event, EventId, Gauge, Money, Movement, Tag, ValidityInterval,
    INCOME_NO_GROUP, SPENDING_NO_GROUP,
};
use thiserror::Error;

use crate::classify::ParsedRow;

pub const MOVEMENT: &str = "MOVEMENT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Event {id} is not a movement")]
    NotAMovement { id: EventId },
    #[error("Movement {id} lacks attribute '{name}'")]
    MissingAttribute { id: EventId, name: &'static str },
    #[error("Movement {id} carries no group")]
    NoGroups { id: EventId },
}

/// The one-day window a movement belongs to; the operation date plays no part.
pub fn validity(value_date: NaiveDate) -> Option<ValidityInterval> {
    ValidityInterval::for_value_date(value_date)
}

/// Builds movements for one source file.
#[derive(Debug, Clone, Copy)]
pub struct MovementBuilder<'a> {
    source_name: &'a str,
}

impl<'a> MovementBuilder<'a> {
    pub fn new(source_name: &'a str) -> Self {
        Self { source_name }
    }

    pub fn identity(&self, position: usize, validity: ValidityInterval) -> EventId {
        EventId::derive(&format!(
            "{MOVEMENT}:{}:{position}:{}:{}",
            self.source_name,
            iso(validity.start),
            iso(validity.stop)
        ))
    }

    /// Returns `None` only when the value date has no following day.
    pub fn build(&self, row: ParsedRow, groups: Vec<Tag>, entities: Vec<Tag>) -> Option<Movement> {
        let validity = validity(row.value_date)?;
        Some(Movement {
            id: self.identity(row.position, validity),
            position: row.position,
            concept: row.concept,
            amount: row.amount,
            balance: row.balance,
            operation_date: row.operation_date,
            value_date: row.value_date,
            groups,
            entities,
            validity,
        })
    }
}

pub fn to_event(movement: &Movement, bank: &str) -> Event {
    let mut values = vec![
        Attribute::text("bank", bank),
        Attribute::text("concept", movement.concept.as_str()),
        Attribute::double("amount", movement.amount),
        Attribute::double("balance", movement.balance),
        Attribute::timestamp("value_date", movement.validity.start),
        Attribute::timestamp("operation_date", date_time(movement.operation_date)),
        Attribute::double("position", movement.position as f64),
    ];
    for (i, tag) in movement.groups.iter().enumerate() {
        values.push(Attribute::text(format!("group{i}"), tag.name.as_str()));
    }
    values.push(Attribute::double("number_of_groups", movement.number_of_groups() as f64));
    for (i, tag) in movement.entities.iter().enumerate() {
        values.push(Attribute::text(format!("entity{i}"), tag.name.as_str()));
    }
    values.push(Attribute::double("number_of_entities", movement.number_of_entities() as f64));

    Event {
        id: movement.id,
        gauge: Gauge::new(MOVEMENT, bank),
        start: movement.validity.start,
        stop: movement.validity.stop,
        values,
        links: Vec::new(),
    }
}

pub fn from_event(event: &Event) -> Result<Movement, DecodeError> {
    let id = event.id;
    if event.gauge.name != MOVEMENT {
        return Err(DecodeError::NotAMovement { id });
    }
    let missing = |name: &'static str| DecodeError::MissingAttribute { id, name };

    let concept = event.text("concept").ok_or_else(|| missing("concept"))?;
    let amount = event.double("amount").ok_or_else(|| missing("amount"))?;
    let balance = event.double("balance").ok_or_else(|| missing("balance"))?;
    let operation_date = event
        .timestamp("operation_date")
        .ok_or_else(|| missing("operation_date"))?
        .date();
    let position = event
        .double("position")
        .filter(|p| p.fract() == 0.0 && *p >= 0.0 && *p <= u32::MAX as f64)
        .map(|p| p as usize)
        .ok_or_else(|| missing("position"))?;

    let groups: Vec<Tag> = event.indexed_texts("group").into_iter().map(group_tag).collect();
    if groups.is_empty() {
        return Err(DecodeError::NoGroups { id });
    }
    let entities = event.indexed_texts("entity").into_iter().map(Tag::rule).collect();

    Ok(Movement {
        id,
        position,
        concept: concept.to_string(),
        amount: Money::new(amount),
        balance: Money::new(balance),
        operation_date,
        value_date: event.start.date(),
        groups,
        entities,
        validity: event.validity(),
    })
}

fn group_tag(name: &str) -> Tag {
    if name == SPENDING_NO_GROUP || name == INCOME_NO_GROUP {
        Tag::fallback(name)
    } else {
        Tag::rule(name)
    }
}

fn date_time(date: NaiveDate) -> chrono::NaiveDateTime {
    date.and_time(chrono::NaiveTime::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(position: usize, value_date: NaiveDate) -> ParsedRow {
        ParsedRow {
            position,
            concept: "SUPERMART".to_string(),
            amount: Money::from_cents(-5000),
            balance: Money::from_cents(95000),
            operation_date: date(2024, 3, 4),
            value_date,
        }
    }

    #[test]
    fn validity_uses_value_date_only() {
        let m = MovementBuilder::new("file.csv")
            .build(row(0, date(2024, 3, 5)), vec![Tag::rule("Groceries")], vec![])
            .unwrap();
        assert_eq!(m.validity.start.date(), date(2024, 3, 5));
        assert_eq!(m.validity.stop.date(), date(2024, 3, 6));
        assert_eq!(m.operation_date, date(2024, 3, 4));
    }

    #[test]
    fn identity_depends_on_source_position_and_validity() {
        let builder = MovementBuilder::new("file.csv");
        let v = validity(date(2024, 3, 5)).unwrap();
        assert_eq!(builder.identity(3, v), builder.identity(3, v));
        assert_ne!(builder.identity(3, v), builder.identity(4, v));
        assert_ne!(builder.identity(3, v), MovementBuilder::new("other.csv").identity(3, v));
        let w = validity(date(2024, 3, 6)).unwrap();
        assert_ne!(builder.identity(3, v), builder.identity(3, w));
    }

    #[test]
    fn event_encoding_numbers_tags_in_order() {
        let m = MovementBuilder::new("file.csv")
            .build(
                row(0, date(2024, 3, 5)),
                vec![Tag::rule("Home"), Tag::rule("Furniture")],
                vec![Tag::rule("Ikea")],
            )
            .unwrap();
        let event = to_event(&m, "BANK");
        assert_eq!(event.text("group0"), Some("Home"));
        assert_eq!(event.text("group1"), Some("Furniture"));
        assert_eq!(event.double("number_of_groups"), Some(2.0));
        assert_eq!(event.text("entity0"), Some("Ikea"));
        assert_eq!(event.double("number_of_entities"), Some(1.0));
        assert_eq!(event.text("bank"), Some("BANK"));
    }

    #[test]
    fn decode_restores_the_movement() {
        let m = MovementBuilder::new("file.csv")
            .build(row(7, date(2024, 3, 5)), vec![Tag::fallback(SPENDING_NO_GROUP)], vec![])
            .unwrap();
        let back = from_event(&to_event(&m, "BANK")).unwrap();
        assert_eq!(back, m);
        assert!(back.groups[0].is_fallback());
    }

    #[test]
    fn decode_rejects_movement_without_groups() {
        let m = MovementBuilder::new("file.csv")
            .build(row(0, date(2024, 3, 5)), vec![Tag::rule("G")], vec![])
            .unwrap();
        let mut event = to_event(&m, "BANK");
        event.values.retain(|a| a.name != "group0");
        assert!(matches!(from_event(&event), Err(DecodeError::NoGroups { .. })));

        event.values.retain(|a| a.name != "amount");
        assert!(matches!(
            from_event(&event),
            Err(DecodeError::MissingAttribute { name: "amount", .. })
        ));
    }
}
