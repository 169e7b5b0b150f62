use std::collections::HashMap;

use anyhow::{Result, bail};

/// Price id of the yearly subscription in the live Stripe account.
pub const ANNUAL_PRICE_ID: &str = "price_1S5LtFKRu7M7maFSTqnqvPh0";
pub const ANNUAL_PLAN_LABEL: &str = "Annual";
pub const MONTHLY_PLAN_LABEL: &str = "Monthly";

/// Maps Stripe price ids to the human plan label stored on profiles.
///
/// Unknown price ids fall back to `default_label`, so adding a plan is a
/// configuration change rather than a code change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCatalog {
    labels: HashMap<String, String>,
    default_label: String,
}

impl PlanCatalog {
    pub fn new(default_label: impl Into<String>) -> Self {
        Self {
            labels: HashMap::new(),
            default_label: default_label.into(),
        }
    }

    pub fn with_label(mut self, price_id: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(price_id.into(), label.into());
        self
    }

    pub fn label_for(&self, price_id: &str) -> &str {
        self.labels
            .get(price_id)
            .map(String::as_str)
            .unwrap_or(&self.default_label)
    }

    /// Parses `price_a=Label A,price_b=Label B`. Blank entries are skipped.
    pub fn parse_labels(raw: &str) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let Some((price_id, label)) = entry.split_once('=') else {
                bail!("plan label entry `{entry}` is not in `price_id=Label` form");
            };

            let (price_id, label) = (price_id.trim(), label.trim());
            if price_id.is_empty() || label.is_empty() {
                bail!("plan label entry `{entry}` has an empty price id or label");
            }

            pairs.push((price_id.to_string(), label.to_string()));
        }

        Ok(pairs)
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new(MONTHLY_PLAN_LABEL).with_label(ANNUAL_PRICE_ID, ANNUAL_PLAN_LABEL)
    }
}
