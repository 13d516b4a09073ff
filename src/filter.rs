use serde::{Deserialize, Serialize};

use crate::types::Alert;

/// Case-insensitive substring criteria. An alert passes only when every
/// field contains its criterion; an empty criterion matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertFilter {
    pub plate: String,
    pub operator: String,
    pub contract: String,
}

impl AlertFilter {
    pub fn new(plate: impl Into<String>, operator: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            plate: plate.into(),
            operator: operator.into(),
            contract: contract.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plate.is_empty() && self.operator.is_empty() && self.contract.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        contains_ignore_case(&alert.plate, &self.plate)
            && contains_ignore_case(&alert.operator, &self.operator)
            && contains_ignore_case(&alert.contract, &self.contract)
    }

    /// Matching alerts, input order preserved
    pub fn apply<'a, I>(&self, alerts: I) -> Vec<Alert>
    where
        I: IntoIterator<Item = &'a Alert>,
    {
        alerts.into_iter().filter(|a| self.matches(a)).cloned().collect()
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}
