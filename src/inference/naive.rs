//! Reference forward prover: a saturating loop over a proved-fact map.
//!
//! Deliberately simple so its conclusion set can cross-check the Rete
//! network.  Each pass tries every rule against every simultaneous
//! premise match; a pass without progress terminates the run.

use indexmap::IndexMap;

use crate::data::{Rule, Sentence, Substitution};

use super::rete::ForwardOutcome;

const WEIGHT_EPSILON: f64 = 1e-9;

/// Saturating forward prover used as a correctness oracle.
#[derive(Debug, Default)]
pub struct NaiveForwardProver {
    rules: Vec<(Rule, f64)>,
}

impl NaiveForwardProver {
    pub fn new(rules: Vec<(Rule, f64)>) -> Self {
        Self { rules }
    }

    /// Run to saturation; callback contract as in the Rete prover.
    pub fn run<F>(&self, assumptions: &[Sentence], mut on_fact: F) -> ForwardOutcome
    where
        F: FnMut(&Sentence, Option<&Rule>) -> bool,
    {
        let mut facts: IndexMap<Sentence, f64> = IndexMap::new();
        for assumption in assumptions {
            if !on_fact(assumption, None) {
                return ForwardOutcome::Cancelled { facts: facts.len() };
            }
            let entry = facts.entry(assumption.clone()).or_insert(1.0);
            *entry = entry.max(1.0);
        }
        loop {
            let mut progress = false;
            for (rule, rule_weight) in &self.rules {
                let mut instantiations = Vec::new();
                match_premises(
                    rule.premises(),
                    &facts,
                    Substitution::new(),
                    f64::INFINITY,
                    &mut instantiations,
                );
                for (subst, join_weight) in instantiations {
                    let concrete = rule.apply(&subst);
                    if !concrete.is_concrete() {
                        continue;
                    }
                    let conclusion_weight = join_weight.min(1.0) - rule_weight;
                    if conclusion_weight <= WEIGHT_EPSILON {
                        continue;
                    }
                    let conclusion = concrete.conclusion().clone();
                    let known = facts.get(&conclusion).copied();
                    let improved = known.map_or(true, |old| conclusion_weight > old);
                    if !improved {
                        continue;
                    }
                    if known.is_none() && !on_fact(&conclusion, Some(&concrete)) {
                        return ForwardOutcome::Cancelled { facts: facts.len() };
                    }
                    facts.insert(conclusion, conclusion_weight);
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
        ForwardOutcome::Saturated { facts: facts.len() }
    }
}

/// All ways to match every premise simultaneously against proved facts,
/// with the minimum fact weight of each way.
fn match_premises(
    premises: &[Sentence],
    facts: &IndexMap<Sentence, f64>,
    subst: Substitution,
    weight: f64,
    out: &mut Vec<(Substitution, f64)>,
) {
    let Some(first) = premises.first() else {
        out.push((subst, weight));
        return;
    };
    let pattern = subst.apply(first);
    for (fact, &fact_weight) in facts {
        for delta in super::matching::match_sentences(&pattern, fact) {
            match_premises(
                &premises[1..],
                facts,
                subst.compose(&delta),
                weight.min(fact_weight),
                out,
            );
        }
    }
}
