use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::event::EventId;
use crate::money::Money;
use crate::period::ValidityInterval;

pub const SPENDING_NO_GROUP: &str = "Spending no group";
pub const INCOME_NO_GROUP: &str = "Income no group";
pub const NO_ENTITY: &str = "No entity";

/// Where a classification tag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSource {
    Rule,
    Fallback,
}

/// A group or entity name assigned to a movement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub source: TagSource,
}

impl Tag {
    pub fn rule(name: impl Into<String>) -> Self {
        Tag { name: name.into(), source: TagSource::Rule }
    }

    pub fn fallback(name: impl Into<String>) -> Self {
        Tag { name: name.into(), source: TagSource::Fallback }
    }

    /// Synthetic group for a movement no group rule matched.
    pub fn fallback_group(amount: Money) -> Self {
        if amount.is_negative() {
            Tag::fallback(SPENDING_NO_GROUP)
        } else {
            Tag::fallback(INCOME_NO_GROUP)
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == TagSource::Fallback
    }
}

/// One classified bank transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: EventId,
    /// Zero-based row position inside the source file.
    pub position: usize,
    pub concept: String,
    pub amount: Money,
    pub balance: Money,
    pub operation_date: NaiveDate,
    pub value_date: NaiveDate,
    /// Never empty; catalog order.
    pub groups: Vec<Tag>,
    /// Catalog order; may be empty.
    pub entities: Vec<Tag>,
    pub validity: ValidityInterval,
}

impl Movement {
    pub fn number_of_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn number_of_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.iter().any(|t| t.name == name)
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.iter().any(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_group_by_sign() {
        assert_eq!(Tag::fallback_group(Money::from_cents(-1)).name, SPENDING_NO_GROUP);
        assert_eq!(Tag::fallback_group(Money::from_cents(1)).name, INCOME_NO_GROUP);
    }

    #[test]
    fn zero_amount_is_income() {
        let tag = Tag::fallback_group(Money::zero());
        assert_eq!(tag.name, INCOME_NO_GROUP);
        assert!(tag.is_fallback());
    }
}
