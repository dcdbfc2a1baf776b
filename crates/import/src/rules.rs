use saldo_core::{Money, INCOME_NO_GROUP, NO_ENTITY, SPENDING_NO_GROUP};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Which amounts a group pattern accepts. Configuration may spell it
/// `>0`/`positive`, `<0`/`negative` or `any`/`either`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum SignConstraint {
    #[serde(rename = ">0")]
    Positive,
    #[serde(rename = "<0")]
    Negative,
    #[default]
    #[serde(rename = "any")]
    Either,
}

impl SignConstraint {
    /// Zero satisfies only [`SignConstraint::Either`].
    pub fn accepts(self, amount: Money) -> bool {
        match self {
            SignConstraint::Positive => amount.is_positive(),
            SignConstraint::Negative => amount.is_negative(),
            SignConstraint::Either => true,
        }
    }
}

impl std::str::FromStr for SignConstraint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            ">0" | "positive" => Ok(SignConstraint::Positive),
            "<0" | "negative" => Ok(SignConstraint::Negative),
            "any" | "either" => Ok(SignConstraint::Either),
            other => Err(format!("Unknown sign constraint: '{other}'")),
        }
    }
}

impl TryFrom<String> for SignConstraint {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPattern {
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(rename = "amount", default)]
    pub sign: SignConstraint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<GroupPattern>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub strings: Vec<String>,
}

/// Rule definitions as they appear in configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(rename = "group", default)]
    pub groups: Vec<GroupRule>,
    #[serde(rename = "entity", default)]
    pub entities: Vec<EntityRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Group,
    Entity,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Group => write!(f, "group"),
            RuleKind::Entity => write!(f, "entity"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse rules: {0}")]
    Parse(String),
    #[error("{kind} rule #{index} has no name")]
    MissingName { kind: RuleKind, index: usize },
    #[error("{kind} rule '{name}' has no patterns")]
    NoPatterns { kind: RuleKind, name: String },
    #[error("{kind} rule '{name}' has an empty pattern")]
    EmptyPattern { kind: RuleKind, name: String },
    #[error("{kind} rule '{name}' is defined twice")]
    Duplicate { kind: RuleKind, name: String },
    #[error("'{0}' is reserved for unmatched movements")]
    ReservedName(String),
}

/// Immutable, validated group and entity rules in configuration order.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    groups: Vec<GroupRule>,
    entities: Vec<EntityRule>,
}

impl RuleCatalog {
    pub fn load(groups: Vec<GroupRule>, entities: Vec<EntityRule>) -> Result<Self, ConfigError> {
        validate(
            RuleKind::Group,
            groups.iter().map(|g| {
                (g.name.as_str(), g.rules.iter().map(|r| r.pattern.as_str()).collect())
            }),
            &[SPENDING_NO_GROUP, INCOME_NO_GROUP],
        )?;
        validate(
            RuleKind::Entity,
            entities.iter().map(|e| {
                (e.name.as_str(), e.strings.iter().map(String::as_str).collect())
            }),
            &[NO_ENTITY],
        )?;
        Ok(Self { groups, entities })
    }

    pub fn from_rule_set(rules: RuleSet) -> Result<Self, ConfigError> {
        Self::load(rules.groups, rules.entities)
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let rules: RuleSet =
            toml::from_str(toml_content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_rule_set(rules)
    }

    /// Names of every group with at least one pattern contained in `concept`
    /// whose sign constraint accepts `amount`, in catalog order.
    pub fn match_groups(&self, concept: &str, amount: Money) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| {
                g.rules
                    .iter()
                    .any(|r| concept.contains(r.pattern.as_str()) && r.sign.accepts(amount))
            })
            .map(|g| g.name.as_str())
            .collect()
    }

    pub fn match_entities(&self, concept: &str) -> Vec<&str> {
        self.entities
            .iter()
            .filter(|e| e.strings.iter().any(|s| concept.contains(s.as_str())))
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// Every value a group bucket can carry: configured groups, then both fallbacks.
    pub fn group_universe(&self) -> impl Iterator<Item = &str> {
        self.group_names().chain([SPENDING_NO_GROUP, INCOME_NO_GROUP])
    }

    /// Configured entities, then the `No entity` catch-all.
    pub fn entity_universe(&self) -> impl Iterator<Item = &str> {
        self.entity_names().chain([NO_ENTITY])
    }
}

fn validate<'a>(
    kind: RuleKind,
    rules: impl Iterator<Item = (&'a str, Vec<&'a str>)>,
    reserved: &[&str],
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (index, (name, patterns)) in rules.enumerate() {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::MissingName { kind, index });
        }
        if reserved.contains(&name) {
            return Err(ConfigError::ReservedName(name.to_string()));
        }
        if !seen.insert(name) {
            return Err(ConfigError::Duplicate { kind, name: name.to_string() });
        }
        if patterns.is_empty() {
            return Err(ConfigError::NoPatterns { kind, name: name.to_string() });
        }
        if patterns.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::EmptyPattern { kind, name: name.to_string() });
        }
    }
    Ok(())
}
