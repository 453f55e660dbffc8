//! Goal-directed backward chaining under a rule-weight budget.
//!
//! The prover answers a goal with an ordered map from answer
//! substitutions to proof paths (sets of concrete rule applications),
//! following the OR/AND scheme: a goal is satisfied by an assumption
//! match (which short-circuits rule expansion), or by unifying a rule's
//! conclusion with the goal and proving its premises under the budget
//! that remains after the rule's weight is spent.  Exhausting the budget
//! is not an error; the result set is simply smaller.

use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::config::Statistics;
use crate::data::{AlphaConversion, Lexicon, Rule, Sentence, Substitution};

use super::matching::match_sentences;
use super::propose::propose_fact;
use super::unify::unify;

const WEIGHT_EPSILON: f64 = 1e-9;

/// Weight an on-the-fly proposal spends: the maximum admissible rule
/// weight.
const PROPOSAL_WEIGHT: f64 = 1.0;

/// Knobs of one backward search.
#[derive(Clone, Debug)]
pub struct BackwardConfig {
    /// Total rule weight a single proof may spend.
    pub weight_limit: f64,
    /// Split budget handed to each conclusion/goal unification.
    pub unify_depth: usize,
    /// Rule-expansion depth cap; keeps zero-weight rules terminating.
    pub max_depth: usize,
    /// Propose a premise-free rule from a concrete goal that neither
    /// assumptions nor rules can reach.
    pub on_the_fly_proposal: bool,
}

impl Default for BackwardConfig {
    fn default() -> Self {
        Self {
            weight_limit: 3.0,
            unify_depth: 4,
            max_depth: 12,
            on_the_fly_proposal: false,
        }
    }
}

/// A set of concrete rules that, together with the assumptions, derives
/// a goal.  Insertion-ordered with set semantics.
#[derive(Clone, Debug, Default)]
pub struct ProofPath {
    rules: Vec<Rule>,
}

impl ProofPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(rule: Rule) -> Self {
        Self { rules: vec![rule] }
    }

    pub fn insert(&mut self, rule: Rule) {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }

    pub fn union(&self, other: &ProofPath) -> ProofPath {
        let mut out = self.clone();
        for rule in &other.rules {
            out.insert(rule.clone());
        }
        out
    }

    pub fn extended(&self, rule: Rule) -> ProofPath {
        let mut out = self.clone();
        out.insert(rule);
        out
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, rule: &Rule) -> bool {
        self.rules.contains(rule)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl PartialEq for ProofPath {
    fn eq(&self, other: &Self) -> bool {
        self.rules.len() == other.rules.len()
            && self.rules.iter().all(|rule| other.rules.contains(rule))
    }
}

impl Eq for ProofPath {}

impl Hash for ProofPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let combined = self
            .rules
            .iter()
            .fold(0u64, |acc, rule| acc ^ rule.alpha_hash());
        state.write_u64(combined);
    }
}

/// Everything proved for one answer substitution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Derivation {
    /// Fewest rule expansions over all known paths.
    pub depth: usize,
    pub paths: IndexSet<ProofPath>,
}

/// Weight-budgeted goal-directed prover.
#[derive(Debug, Default)]
pub struct BackwardProver {
    rules: Vec<(Rule, f64)>,
    assumptions: Vec<Sentence>,
    config: BackwardConfig,
    stats: Statistics,
}

impl BackwardProver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BackwardConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Register a weighted rule; weights are clamped into `[0, 1]`.
    pub fn add_rule(&mut self, rule: Rule, weight: f64) {
        self.rules.push((rule, weight.clamp(0.0, 1.0)));
    }

    /// Register a concrete assumption sentence.
    pub fn add_assumption(&mut self, assumption: Sentence) {
        self.assumptions.push(assumption);
    }

    pub fn config(&self) -> &BackwardConfig {
        &self.config
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Prove `goal`, returning answer substitutions with their proof
    /// paths, ordered by minimum depth and then discovery order.
    pub fn prove(
        &mut self,
        goal: &Sentence,
        lexicon: &Lexicon,
    ) -> Vec<(Substitution, Derivation)> {
        let mut stats = std::mem::take(&mut self.stats);
        let results = solve(
            &self.rules,
            &self.assumptions,
            &self.config,
            lexicon,
            &mut stats,
            goal,
            self.config.weight_limit,
            0,
        );
        self.stats = stats;
        let mut ordered: Vec<(Substitution, Derivation)> = results.into_iter().collect();
        ordered.sort_by_key(|(_, derivation)| derivation.depth);
        debug!(
            answers = ordered.len(),
            expansions = self.stats.get("rule_expansions").unwrap_or(0),
            "backward search finished"
        );
        ordered
    }
}

fn merge_answer(
    results: &mut IndexMap<Substitution, Derivation>,
    subst: Substitution,
    depth: usize,
    paths: IndexSet<ProofPath>,
) {
    let entry = results.entry(subst).or_insert_with(|| Derivation {
        depth,
        paths: IndexSet::new(),
    });
    entry.depth = entry.depth.min(depth);
    entry.paths.extend(paths);
}

/// OR node: satisfy one goal within `budget`.
#[allow(clippy::too_many_arguments)]
fn solve(
    rules: &[(Rule, f64)],
    assumptions: &[Sentence],
    config: &BackwardConfig,
    lexicon: &Lexicon,
    stats: &mut Statistics,
    goal: &Sentence,
    budget: f64,
    depth: usize,
) -> IndexMap<Substitution, Derivation> {
    let mut results = IndexMap::new();
    if depth >= config.max_depth {
        return results;
    }

    // Assumption matches close the goal outright: the path set collapses
    // to the empty path and no rule expansion happens for this goal.
    for assumption in assumptions {
        for subst in match_sentences(goal, assumption) {
            let mut paths = IndexSet::new();
            paths.insert(ProofPath::new());
            merge_answer(&mut results, subst, 0, paths);
        }
    }
    if !results.is_empty() {
        return results;
    }

    if config.on_the_fly_proposal && budget + WEIGHT_EPSILON >= PROPOSAL_WEIGHT {
        if let Some(proposed) = propose_fact(goal) {
            trace!(goal = ?goal, "proposing goal as a premise-free rule");
            let mut paths = IndexSet::new();
            paths.insert(ProofPath::singleton(proposed));
            merge_answer(&mut results, Substitution::new(), 1, paths);
        }
    }

    let goal_vars = goal.variables();
    for (rule, weight) in rules {
        if *weight > budget + WEIGHT_EPSILON {
            continue;
        }
        stats.increment("rule_expansions");
        // Rename the goal's variables disjoint from the rule before
        // unifying its conclusion with the goal.
        let conversion = AlphaConversion::disjoint(&goal_vars, &rule.variables(), lexicon);
        let renamed_goal = conversion.rename(goal);
        let inverse = conversion.invert();
        for subst in unify(rule.conclusion(), &renamed_goal, config.unify_depth) {
            let premises: Vec<Sentence> =
                rule.premises().iter().map(|p| subst.apply(p)).collect();
            let subgoals = solve_all(
                rules,
                assumptions,
                config,
                lexicon,
                stats,
                &premises,
                budget - weight,
                depth + 1,
            );
            for (premise_subst, derivation) in subgoals {
                let total = subst.compose(&premise_subst);
                let concrete = rule.apply(&total);
                if !concrete.is_concrete() {
                    continue;
                }
                let Some(answer) = answer_for_goal(&goal_vars, &conversion, &inverse, &total)
                else {
                    continue;
                };
                let paths: IndexSet<ProofPath> = derivation
                    .paths
                    .iter()
                    .map(|path| path.extended(concrete.clone()))
                    .collect();
                merge_answer(&mut results, answer, derivation.depth + 1, paths);
            }
        }
    }
    results
}

/// Restrict a solution to the original goal variables, mapping the
/// renamed variables back.  Answers must be concrete.
fn answer_for_goal(
    goal_vars: &[crate::data::Token],
    conversion: &AlphaConversion,
    inverse: &AlphaConversion,
    total: &Substitution,
) -> Option<Substitution> {
    let mut answer = Substitution::new();
    for &var in goal_vars {
        let renamed = conversion.get(var).unwrap_or(var);
        let value = total.get(renamed)?;
        let value = inverse.rename(value);
        if !value.is_concrete() {
            return None;
        }
        answer.insert_unchecked(var, value);
    }
    Some(answer)
}

/// AND node: satisfy every goal of a premise list, threading partial
/// substitutions left-to-right and combining proof paths by Cartesian
/// product.
#[allow(clippy::too_many_arguments)]
fn solve_all(
    rules: &[(Rule, f64)],
    assumptions: &[Sentence],
    config: &BackwardConfig,
    lexicon: &Lexicon,
    stats: &mut Statistics,
    goals: &[Sentence],
    budget: f64,
    depth: usize,
) -> IndexMap<Substitution, Derivation> {
    let mut results = IndexMap::new();
    let Some(first) = goals.first() else {
        let mut paths = IndexSet::new();
        paths.insert(ProofPath::new());
        merge_answer(&mut results, Substitution::new(), 0, paths);
        return results;
    };
    let heads = solve(rules, assumptions, config, lexicon, stats, first, budget, depth);
    for (head_subst, head_derivation) in heads {
        let rest: Vec<Sentence> =
            goals[1..].iter().map(|goal| head_subst.apply(goal)).collect();
        let tails = solve_all(
            rules,
            assumptions,
            config,
            lexicon,
            stats,
            &rest,
            budget,
            depth,
        );
        for (tail_subst, tail_derivation) in tails {
            let combined_subst = head_subst.compose(&tail_subst);
            let mut paths = IndexSet::new();
            for head_path in &head_derivation.paths {
                for tail_path in &tail_derivation.paths {
                    paths.insert(head_path.union(tail_path));
                }
            }
            merge_answer(
                &mut results,
                combined_subst,
                head_derivation.depth + tail_derivation.depth,
                paths,
            );
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::{BackwardConfig, BackwardProver};
    use crate::data::{Lexicon, Rule, Sentence};
    use crate::parser::{parse_rule, parse_sentence};

    fn sentence(lexicon: &Lexicon, text: &str) -> Sentence {
        parse_sentence(text, lexicon).expect("well-formed sentence")
    }

    fn rule(lexicon: &Lexicon, text: &str) -> Rule {
        parse_rule(text, lexicon).expect("well-formed rule")
    }

    /// The seven MiniSCAN ground-truth rules.
    fn miniscan(lexicon: &Lexicon) -> Vec<Rule> {
        vec![
            rule(lexicon, "---\ndax $MAPS_TO$ RED"),
            rule(lexicon, "---\nlug $MAPS_TO$ BLUE"),
            rule(lexicon, "---\nwif $MAPS_TO$ GREEN"),
            rule(lexicon, "---\nzup $MAPS_TO$ YELLOW"),
            rule(
                lexicon,
                "[A] $MAPS_TO$ [B]\n---\n[A] fep $MAPS_TO$ [B] [B] [B]",
            ),
            rule(
                lexicon,
                "[A] $MAPS_TO$ [B]\n[C] $MAPS_TO$ [D]\n---\n[A] blicket [C] $MAPS_TO$ [B] [D] [B]",
            ),
            rule(
                lexicon,
                "[A] $MAPS_TO$ [B]\n[C] $MAPS_TO$ [D]\n---\n[A] kiki [C] $MAPS_TO$ [D] [B]",
            ),
        ]
    }

    #[test]
    fn assumptions_short_circuit() {
        let lexicon = Lexicon::new();
        let mut prover = BackwardProver::new();
        prover.add_assumption(sentence(&lexicon, "harry is rough"));
        prover.add_rule(rule(&lexicon, "[A] is rough\n---\n[A] is tough"), 0.5);

        let results = prover.prove(&sentence(&lexicon, "harry is rough"), &lexicon);
        assert_eq!(results.len(), 1);
        let (subst, derivation) = &results[0];
        assert!(subst.is_empty());
        assert_eq!(derivation.depth, 0);
        assert_eq!(derivation.paths.len(), 1);
        assert!(derivation.paths.first().expect("one path").is_empty());
    }

    #[test]
    fn single_rule_expansion() {
        let lexicon = Lexicon::new();
        let mut prover = BackwardProver::new();
        prover.add_assumption(sentence(&lexicon, "harry is rough"));
        prover.add_rule(rule(&lexicon, "[A] is rough\n---\n[A] is tough"), 0.5);

        let results = prover.prove(&sentence(&lexicon, "harry is tough"), &lexicon);
        assert_eq!(results.len(), 1);
        let (_, derivation) = &results[0];
        assert_eq!(derivation.depth, 1);
        let path = derivation.paths.first().expect("one path");
        assert_eq!(path.len(), 1);
        assert!(path.rules()[0].is_concrete());
    }

    #[test]
    fn miniscan_goal_ranks_correct_answer_first() {
        let lexicon = Lexicon::new();
        let mut prover = BackwardProver::new();
        for ground_truth in miniscan(&lexicon) {
            prover.add_rule(ground_truth, 1.0);
        }

        let goal = sentence(&lexicon, "zup fep $MAPS_TO$ [X]");
        let results = prover.prove(&goal, &lexicon);
        assert!(!results.is_empty());
        let (best, derivation) = &results[0];
        let x = lexicon.variable("X").expect("interned");
        assert_eq!(
            best.get(x),
            Some(&sentence(&lexicon, "YELLOW YELLOW YELLOW"))
        );
        assert_eq!(derivation.depth, 2, "fep expansion plus one primitive");
    }

    #[test]
    fn miniscan_composite_goal() {
        let lexicon = Lexicon::new();
        let mut prover = BackwardProver::new();
        for ground_truth in miniscan(&lexicon) {
            prover.add_rule(ground_truth, 1.0);
        }

        let goal = sentence(&lexicon, "wif kiki dax $MAPS_TO$ [X]");
        let results = prover.prove(&goal, &lexicon);
        assert!(!results.is_empty());
        let x = lexicon.variable("X").expect("interned");
        assert_eq!(results[0].0.get(x), Some(&sentence(&lexicon, "RED GREEN")));
    }

    #[test]
    fn budget_exhaustion_is_silent() {
        let lexicon = Lexicon::new();
        let mut config = BackwardConfig::default();
        config.weight_limit = 1.5;
        let mut prover = BackwardProver::with_config(config);
        for ground_truth in miniscan(&lexicon) {
            prover.add_rule(ground_truth, 1.0);
        }

        // `zup fep` needs two rule uses totalling 2.0.
        let goal = sentence(&lexicon, "zup fep $MAPS_TO$ [X]");
        assert!(prover.prove(&goal, &lexicon).is_empty());

        // A single primitive still fits.
        let primitive = sentence(&lexicon, "zup $MAPS_TO$ [X]");
        assert_eq!(prover.prove(&primitive, &lexicon).len(), 1);
    }

    #[test]
    fn on_the_fly_proposal_covers_unreachable_goals() {
        let lexicon = Lexicon::new();
        let goal = sentence(&lexicon, "novel $MAPS_TO$ PURPLE");

        let mut silent = BackwardProver::new();
        assert!(silent.prove(&goal, &lexicon).is_empty());

        let mut config = BackwardConfig::default();
        config.on_the_fly_proposal = true;
        let mut proposing = BackwardProver::with_config(config);
        let results = proposing.prove(&goal, &lexicon);
        assert_eq!(results.len(), 1);
        let path = results[0].1.paths.first().expect("one path");
        assert_eq!(path.len(), 1);
        assert!(path.rules()[0].premises().is_empty());
        assert_eq!(*path.rules()[0].conclusion(), goal);
    }

    #[test]
    fn answers_are_restricted_to_goal_variables() {
        let lexicon = Lexicon::new();
        let mut prover = BackwardProver::new();
        for ground_truth in miniscan(&lexicon) {
            prover.add_rule(ground_truth, 1.0);
        }
        let goal = sentence(&lexicon, "dax $MAPS_TO$ [X]");
        let results = prover.prove(&goal, &lexicon);
        assert_eq!(results.len(), 1);
        let x = lexicon.variable("X").expect("interned");
        let subst = &results[0].0;
        assert_eq!(subst.len(), 1);
        assert_eq!(subst.get(x), Some(&sentence(&lexicon, "RED")));
    }
}
