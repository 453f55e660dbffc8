//! Inference engines and the operations they are built from: matching,
//! unification, anti-unification, indexed rule sets, proof graphs, and
//! the backward and forward provers.

pub mod anti_unify;
pub mod backward;
pub mod matching;
pub mod naive;
pub mod proof;
pub mod propose;
pub mod rete;
pub mod ruleset;
pub mod unify;

pub use anti_unify::{
    anti_unify, anti_unify_rules, anti_unify_rules_with, anti_unify_with, AntiUnifier,
    AntiUnifyOptions, BiSubstitution, RuleAntiUnifier,
};
pub use backward::{BackwardConfig, BackwardProver, Derivation, ProofPath};
pub use matching::{match_rules, match_sentences, Matchable};
pub use naive::NaiveForwardProver;
pub use proof::{FactId, Proof, ProofError, StepId};
pub use propose::{propose_fact, RuleProposer};
pub use rete::{ForwardOutcome, ReteNetwork};
pub use ruleset::{IndexedRuleSet, RuleId};
pub use unify::{unify, unify_lists};
