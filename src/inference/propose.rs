//! Contracts for rule proposers.
//!
//! Proposers are experiment-specific collaborators: given a dataset and
//! an example index they suggest candidate rules, and they veto rules
//! their domain considers ill-formed.  The core only consumes this
//! interface; the one proposer shipped here is the trivial goal-fact
//! proposal used by the backward prover's `on_the_fly_proposal` flag.

use crate::data::{Rule, Sentence};

/// An external source of candidate rules over some dataset type.
pub trait RuleProposer<D: ?Sized> {
    /// Candidate rules for one example of the dataset.
    fn propose(&self, dataset: &D, example_index: usize) -> Vec<Rule>;

    /// Domain veto over candidate rules; defaults to the structural rule
    /// invariants.
    fn is_valid(&self, rule: &Rule) -> bool {
        rule.is_valid()
    }
}

/// Propose a concrete goal as a premise-free rule asserting itself.
/// Returns `None` for goals that still contain variables.
pub fn propose_fact(goal: &Sentence) -> Option<Rule> {
    goal.is_concrete().then(|| Rule::fact(goal.clone()))
}
