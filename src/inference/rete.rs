//! Data-driven forward chaining over a Rete-style discrimination
//! network.
//!
//! The network shares one α-node per De-Bruijn-canonical premise and one
//! β-node per premise-list prefix, so rules with common prefixes share
//! join work.  Facts carry weights; joins keep the minimum of their
//! parents' weights, and a rule firing gives its conclusion the weight
//! `min(join, 1) − rule_weight`.  Only positive-weight, not-yet-proved
//! conclusions reach the activation queue, and each concrete rule is
//! applied at most once per run.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::config::Statistics;
use crate::data::{Rule, Sentence, Substitution, Token};

use super::matching::match_sentences;

const WEIGHT_EPSILON: f64 = 1e-9;

/// Outcome of a forward-chaining run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The activation queue drained with no rule left to apply.
    Saturated { facts: usize },
    /// The callback returned `false`; not an error.
    Cancelled { facts: usize },
}

/// How one α-binding extends the left parent's joined binding vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Slot {
    /// Must equal the existing entry at this position.
    Shared(usize),
    /// Appends as the entry at this position.
    New(usize),
}

/// One condition node: a canonical premise with its accumulated
/// single-premise instantiations.
#[derive(Debug)]
struct AlphaNode {
    pattern: Sentence,
    variable_count: usize,
    memory: IndexMap<Vec<Sentence>, f64>,
    /// Right-activated children, deepest first.
    successors: Vec<usize>,
}

/// One join node: the binding vectors covering a premise-list prefix.
#[derive(Debug)]
struct BetaNode {
    /// Left parent; the dummy node is its own parent.
    left: usize,
    /// Right parent α-node; `None` only for the dummy node.
    right: Option<usize>,
    mapping: Vec<Slot>,
    depth: usize,
    memory: IndexMap<Vec<Sentence>, f64>,
    children: Vec<usize>,
    /// Rules whose whole premise list this node covers.
    productions: Vec<usize>,
}

enum Activation {
    Right { beta: usize, binding: Vec<Sentence>, weight: f64 },
    Left { beta: usize, binding: Vec<Sentence>, weight: f64 },
}

const DUMMY: usize = 0;

/// The discrimination network plus working memory.
#[derive(Debug)]
pub struct ReteNetwork {
    rules: Vec<(Rule, f64)>,
    /// Per rule: its variables in rule-level first-occurrence order,
    /// matching the positions of the full binding vector.
    rule_variables: Vec<Vec<Token>>,
    alphas: Vec<AlphaNode>,
    betas: Vec<BetaNode>,
    working_memory: IndexMap<Sentence, f64>,
    /// Activated concrete rules awaiting application.
    agenda: IndexMap<Rule, f64>,
    stats: Statistics,
}

impl ReteNetwork {
    /// Compile a network from weighted rules.
    pub fn new(rules: Vec<(Rule, f64)>) -> Self {
        let mut network = Self {
            rules: Vec::new(),
            rule_variables: Vec::new(),
            alphas: Vec::new(),
            betas: vec![BetaNode {
                left: DUMMY,
                right: None,
                mapping: Vec::new(),
                depth: 0,
                memory: IndexMap::new(),
                children: Vec::new(),
                productions: Vec::new(),
            }],
            working_memory: IndexMap::new(),
            agenda: IndexMap::new(),
            stats: Statistics::new(),
        };
        for (rule, weight) in rules {
            network.compile(rule, weight);
        }
        // Right activation visits descendants before ancestors.
        let depths: Vec<usize> = network.betas.iter().map(|beta| beta.depth).collect();
        for alpha in &mut network.alphas {
            alpha.successors.sort_by(|&a, &b| depths[b].cmp(&depths[a]));
        }
        debug!(
            rules = network.rules.len(),
            alphas = network.alphas.len(),
            betas = network.betas.len(),
            "rete network compiled"
        );
        network
    }

    fn compile(&mut self, rule: Rule, weight: f64) {
        let rule_index = self.rules.len();
        let mut seen: Vec<Token> = Vec::new();
        let mut current = DUMMY;
        for premise in rule.premises() {
            let local_vars = premise.variables();
            let pattern = premise.de_bruijn();
            let alpha = self.alpha_for(pattern, local_vars.len());
            let mut mapping = Vec::with_capacity(local_vars.len());
            for var in &local_vars {
                match seen.iter().position(|known| known == var) {
                    Some(position) => mapping.push(Slot::Shared(position)),
                    None => {
                        mapping.push(Slot::New(seen.len()));
                        seen.push(*var);
                    }
                }
            }
            current = self.beta_for(current, alpha, mapping);
        }
        self.betas[current].productions.push(rule_index);
        self.rule_variables.push(seen);
        self.rules.push((rule, weight));
    }

    fn alpha_for(&mut self, pattern: Sentence, variable_count: usize) -> usize {
        if let Some(existing) = self.alphas.iter().position(|alpha| alpha.pattern == pattern)
        {
            return existing;
        }
        self.alphas.push(AlphaNode {
            pattern,
            variable_count,
            memory: IndexMap::new(),
            successors: Vec::new(),
        });
        self.alphas.len() - 1
    }

    fn beta_for(&mut self, left: usize, alpha: usize, mapping: Vec<Slot>) -> usize {
        if let Some(existing) = self.betas.iter().position(|beta| {
            beta.left == left && beta.right == Some(alpha) && beta.mapping == mapping
        }) {
            return existing;
        }
        let depth = self.betas[left].depth + 1;
        let index = self.betas.len();
        self.betas.push(BetaNode {
            left,
            right: Some(alpha),
            mapping,
            depth,
            memory: IndexMap::new(),
            children: Vec::new(),
            productions: Vec::new(),
        });
        self.betas[left].children.push(index);
        self.alphas[alpha].successors.push(index);
        index
    }

    pub fn working_memory(&self) -> &IndexMap<Sentence, f64> {
        &self.working_memory
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    fn clear(&mut self) {
        for alpha in &mut self.alphas {
            alpha.memory.clear();
        }
        for beta in &mut self.betas {
            beta.memory.clear();
        }
        self.working_memory.clear();
        self.agenda.clear();
        self.stats.clear();
        // The dummy node carries the identity binding with infinite
        // weight so first premises join unconditionally.
        self.betas[DUMMY].memory.insert(Vec::new(), f64::INFINITY);
    }

    /// Add a weighted fact to working memory and propagate its matches
    /// through the network.
    pub fn add_wme(&mut self, fact: &Sentence, weight: f64) {
        if let Some(&existing) = self.working_memory.get(fact) {
            if existing >= weight {
                return;
            }
        }
        self.working_memory.insert(fact.clone(), weight);
        self.stats.increment("wmes_added");
        trace!(weight, "wme added");

        let mut pending: VecDeque<Activation> = VecDeque::new();
        for alpha_index in 0..self.alphas.len() {
            let substs = match_sentences(&self.alphas[alpha_index].pattern, fact);
            for subst in substs {
                let binding = binding_vector(&subst, self.alphas[alpha_index].variable_count);
                if !improves(&self.alphas[alpha_index].memory, &binding, weight) {
                    continue;
                }
                self.alphas[alpha_index].memory.insert(binding.clone(), weight);
                for &beta in &self.alphas[alpha_index].successors {
                    pending.push_back(Activation::Right {
                        beta,
                        binding: binding.clone(),
                        weight,
                    });
                }
            }
        }
        self.drain(pending);
    }

    fn drain(&mut self, mut pending: VecDeque<Activation>) {
        while let Some(activation) = pending.pop_front() {
            match activation {
                Activation::Right { beta, binding, weight } => {
                    let left = self.betas[beta].left;
                    let joins: Vec<(Vec<Sentence>, f64)> = self.betas[left]
                        .memory
                        .iter()
                        .filter_map(|(left_binding, &left_weight)| {
                            join(&self.betas[beta].mapping, left_binding, &binding)
                                .map(|joined| (joined, left_weight.min(weight)))
                        })
                        .collect();
                    for (joined, joined_weight) in joins {
                        self.store(beta, joined, joined_weight, &mut pending);
                    }
                }
                Activation::Left { beta, binding, weight } => {
                    let Some(alpha) = self.betas[beta].right else {
                        continue;
                    };
                    let joins: Vec<(Vec<Sentence>, f64)> = self.alphas[alpha]
                        .memory
                        .iter()
                        .filter_map(|(alpha_binding, &alpha_weight)| {
                            join(&self.betas[beta].mapping, &binding, alpha_binding)
                                .map(|joined| (joined, alpha_weight.min(weight)))
                        })
                        .collect();
                    for (joined, joined_weight) in joins {
                        self.store(beta, joined, joined_weight, &mut pending);
                    }
                }
            }
        }
    }

    fn store(
        &mut self,
        beta: usize,
        binding: Vec<Sentence>,
        weight: f64,
        pending: &mut VecDeque<Activation>,
    ) {
        if !improves(&self.betas[beta].memory, &binding, weight) {
            return;
        }
        self.betas[beta].memory.insert(binding.clone(), weight);
        self.stats.increment("beta_joins");
        let productions = self.betas[beta].productions.clone();
        for rule_index in productions {
            self.activate(rule_index, &binding, weight);
        }
        for &child in &self.betas[beta].children {
            pending.push_back(Activation::Left {
                beta: child,
                binding: binding.clone(),
                weight,
            });
        }
    }

    /// Instantiate a production: positive-weight, not-yet-proved
    /// conclusions enter the agenda as activated concrete rules.
    fn activate(&mut self, rule_index: usize, binding: &[Sentence], weight: f64) {
        let (rule, rule_weight) = &self.rules[rule_index];
        let mut subst = Substitution::new();
        for (variable, value) in self.rule_variables[rule_index].iter().zip(binding.iter()) {
            subst.insert_unchecked(*variable, value.clone());
        }
        let concrete = rule.apply(&subst);
        if !concrete.is_concrete() {
            return;
        }
        let conclusion_weight = weight.min(1.0) - rule_weight;
        if conclusion_weight <= WEIGHT_EPSILON {
            return;
        }
        if let Some(&known) = self.working_memory.get(concrete.conclusion()) {
            // Re-deriving a proved conclusion only matters when it
            // improves the recorded weight.
            if conclusion_weight <= known + WEIGHT_EPSILON {
                return;
            }
        }
        self.stats.increment("activations");
        let entry = self.agenda.entry(concrete).or_insert(conclusion_weight);
        if *entry < conclusion_weight {
            *entry = conclusion_weight;
        }
    }

    /// Run to saturation from the given assumptions.  The callback sees
    /// every assumption (with no rule) and every derived conclusion
    /// (with the concrete rule that produced it); returning `false`
    /// cancels the run immediately.
    pub fn run<F>(&mut self, assumptions: &[Sentence], mut on_fact: F) -> ForwardOutcome
    where
        F: FnMut(&Sentence, Option<&Rule>) -> bool,
    {
        self.clear();
        // Premise-free rules fire off the dummy node's identity binding.
        let seeded = self.betas[DUMMY].productions.clone();
        for rule_index in seeded {
            self.activate(rule_index, &[], f64::INFINITY);
        }
        for assumption in assumptions {
            if !on_fact(assumption, None) {
                return ForwardOutcome::Cancelled { facts: self.working_memory.len() };
            }
            self.add_wme(assumption, 1.0);
        }
        let mut applied: IndexSet<Rule> = IndexSet::new();
        while let Some((rule, weight)) = self.agenda.shift_remove_index(0) {
            let conclusion = rule.conclusion().clone();
            if applied.contains(&rule) {
                // A better join re-activated an applied rule: record the
                // improved weight without re-announcing the conclusion.
                self.add_wme(&conclusion, weight);
                continue;
            }
            trace!(weight, "applying activated rule");
            self.stats.increment("rules_applied");
            if !on_fact(&conclusion, Some(&rule)) {
                return ForwardOutcome::Cancelled { facts: self.working_memory.len() };
            }
            applied.insert(rule);
            self.add_wme(&conclusion, weight);
        }
        ForwardOutcome::Saturated { facts: self.working_memory.len() }
    }
}

/// Order the matched segments by De-Bruijn index.
fn binding_vector(subst: &Substitution, variable_count: usize) -> Vec<Sentence> {
    (1..=variable_count as u32)
        .map(|index| {
            subst
                .get(Token::de_bruijn(index))
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

fn improves(memory: &IndexMap<Vec<Sentence>, f64>, binding: &[Sentence], weight: f64) -> bool {
    match memory.get(binding) {
        Some(&existing) => weight > existing,
        None => true,
    }
}

/// Join a left binding vector with one α-binding; `None` on a conflict
/// at a shared slot.
fn join(mapping: &[Slot], left: &[Sentence], right: &[Sentence]) -> Option<Vec<Sentence>> {
    let mut joined = left.to_vec();
    for (index, slot) in mapping.iter().enumerate() {
        match slot {
            Slot::Shared(position) => {
                if joined.get(*position) != right.get(index) {
                    return None;
                }
            }
            Slot::New(position) => {
                debug_assert_eq!(*position, joined.len());
                joined.push(right.get(index)?.clone());
            }
        }
    }
    Some(joined)
}
