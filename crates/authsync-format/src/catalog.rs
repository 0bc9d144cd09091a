//! Static price-id → plan-name table.

use std::collections::HashMap;

use authsync_provider::PlanLookup;
use serde::{Deserialize, Serialize};

/// A fixed mapping from billing price ids to plan names.
///
/// Deserializes from a plain JSON object:
///
/// ```json
/// { "price_1Nabc": "pro", "price_1Nxyz": "team" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanCatalog {
    plans: HashMap<String, String>,
}

impl PlanCatalog {
    /// Creates an empty catalog. Every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from `(price_id, plan_name)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            plans: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Adds or replaces one entry.
    pub fn insert(&mut self, price_id: impl Into<String>, plan: impl Into<String>) {
        self.plans.insert(price_id.into(), plan.into());
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl PlanLookup for PlanCatalog {
    fn friendly_name(&self, price_id: &str) -> Option<String> {
        self.plans.get(price_id).cloned()
    }
}
