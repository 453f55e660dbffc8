//! Search configuration and run statistics.
//!
//! `SearchParams` gathers the bounds that keep the otherwise-unbounded
//! searches finite; provers expose their counters through `Statistics`.

use std::collections::HashMap;

/// Bounds and thresholds shared by the search procedures.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchParams {
    /// Splits allowed per unification derivation.
    pub unify_depth_limit: usize,
    /// Total rule weight a backward proof may spend.
    pub weight_limit: f64,
    /// Rule-expansion depth cap for the backward prover; guards against
    /// zero-weight rules that the weight budget alone cannot bound.
    pub max_proof_depth: usize,
    /// Largest anti-unification middle still enumerated exhaustively.
    pub exhaustive_middle_limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            unify_depth_limit: 4,
            weight_limit: 3.0,
            max_proof_depth: 12,
            exhaustive_middle_limit: 6,
        }
    }
}

/// String-keyed counters recording what a search did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    counters: HashMap<String, u64>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: u64) {
        self.counters.insert(name.into(), value);
    }

    pub fn increment(&mut self, name: impl Into<String>) -> u64 {
        self.increment_by(name, 1)
    }

    pub fn increment_by(&mut self, name: impl Into<String>, amount: u64) -> u64 {
        let entry = self.counters.entry(name.into()).or_insert(0);
        *entry += amount;
        *entry
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }

    pub fn reset(&mut self, name: &str) {
        self.counters.remove(name);
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }

    /// Counters in name order, for stable reporting.
    pub fn sorted(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|(name, &value)| (name.clone(), value))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::{SearchParams, Statistics};

    #[test]
    fn counters_increment() {
        let mut stats = Statistics::new();
        assert_eq!(stats.increment("goal_expansions"), 1);
        assert_eq!(stats.increment_by("goal_expansions", 4), 5);
        assert_eq!(stats.get("goal_expansions"), Some(5));
        stats.reset("goal_expansions");
        assert!(stats.get("goal_expansions").is_none());
    }

    #[test]
    fn sorted_reporting_is_stable() {
        let mut stats = Statistics::new();
        stats.set("wmes", 2);
        stats.set("activations", 7);
        assert_eq!(
            stats.sorted(),
            vec![("activations".to_string(), 7), ("wmes".to_string(), 2)]
        );
    }

    #[test]
    fn default_bounds_are_positive() {
        let params = SearchParams::default();
        assert!(params.unify_depth_limit > 0);
        assert!(params.weight_limit > 0.0);
        assert!(params.max_proof_depth > 0);
        assert!(params.exhaustive_middle_limit > 0);
    }
}
