use saldo_core::Completeness;
use serde::Serialize;
use std::fmt::Display;

/// Collects the non-fatal problems of one run. Nothing here is global: the
/// report lives in the batch it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    problems: Vec<String>,
}

impl CompletenessReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, problem: impl Display) {
        self.problems.push(problem.to_string());
    }

    pub fn is_complete(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    pub fn completeness(&self) -> Completeness {
        Completeness {
            check: self.is_complete(),
            message: self.problems.join("\n"),
        }
    }
}
