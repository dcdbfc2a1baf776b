use anyhow::{Context, Result};
use saldo_import::{RuleCatalog, RuleSet, SourceSettings, StatementLayout};
use serde::Deserialize;
use std::path::Path;

/// Contents of `saldo.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceSettings,
    #[serde(default)]
    pub statement: StatementLayout,
    #[serde(flatten)]
    pub rules: RuleSet,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read configuration {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("In {}", path.display()))
    }

    /// Validated rules; fails before any statement row is read.
    pub fn catalog(&self) -> Result<RuleCatalog> {
        RuleCatalog::from_rule_set(self.rules.clone()).context("Invalid classification rules")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[source]
bank = "BANCO SANTANDER"
signature = "SANTANDER"

[statement]
skip_rows = 3
decimal_comma = true

[[group]]
name = "Groceries"
rules = [{ match = "SUPERMART", amount = "<0" }, { match = "MERCADO" }]

[[entity]]
name = "Supermart"
strings = ["SUPERMART"]
"#;

    #[test]
    fn parses_every_section() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.source.signature, "SANTANDER");
        assert_eq!(config.source.version, "1.0");
        assert_eq!(config.statement.skip_rows, 3);
        assert!(config.statement.decimal_comma);
        assert_eq!(config.statement.concept, "CONCEPTO");
        assert_eq!(config.rules.groups[0].rules.len(), 2);

        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.group_names().collect::<Vec<_>>(), vec!["Groceries"]);
        assert_eq!(catalog.entity_names().collect::<Vec<_>>(), vec!["Supermart"]);
    }

    #[test]
    fn missing_source_is_rejected() {
        assert!(Config::from_toml("[[group]]\nname = \"A\"\nrules = [{ match = \"A\" }]\n").is_err());
    }

    #[test]
    fn rule_without_patterns_is_rejected() {
        let content = "[source]\nbank = \"B\"\nsignature = \"S\"\n\n[[group]]\nname = \"Empty\"\n";
        let config = Config::from_toml(content).unwrap();
        assert!(config.catalog().is_err());
    }

    #[test]
    fn shipped_example_is_valid() {
        let config = Config::from_toml(include_str!("../../../saldo.toml")).unwrap();
        config.catalog().unwrap();
    }
}
