//! Proof graphs: bipartite DAGs of concrete sentences and concrete rule
//! applications.
//!
//! Facts and steps live in arenas and reference each other by index.
//! Every step points from its premise facts to its conclusion fact; a
//! valid proof is acyclic, gives every fact at most one producing step,
//! and has exactly one sink sentence (the goal).

use indexmap::IndexMap;
use std::collections::VecDeque;
use thiserror::Error;

use crate::data::{Lexicon, Rule, Sentence};

/// Index of a sentence vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactId(pub u32);

/// Index of a rule-application vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub u32);

/// Violations of the proof-graph contract.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("rule premise `{0}` is not present in the proof")]
    MissingPremise(String),
    #[error("applying the rule would create a cycle")]
    CycleDetected,
    #[error("rules and sentences in a proof must be concrete")]
    NotConcrete,
    #[error("goal sentence is not present in the proof")]
    GoalAbsent,
}

#[derive(Clone, Debug)]
struct FactNode {
    sentence: Sentence,
    /// Steps concluding this fact.  Valid proofs keep at most one.
    produced_by: Vec<StepId>,
    consumed_by: Vec<StepId>,
}

#[derive(Clone, Debug)]
struct StepNode {
    rule: Rule,
    premises: Vec<FactId>,
    conclusion: FactId,
}

/// A bipartite proof DAG.
#[derive(Clone, Debug, Default)]
pub struct Proof {
    facts: Vec<FactNode>,
    steps: Vec<StepNode>,
    index: IndexMap<Sentence, FactId>,
}

impl Proof {
    pub fn new() -> Self {
        Self::default()
    }

    /// A proof whose only vertices are the given assumption sentences.
    pub fn from_assumptions<I>(assumptions: I) -> Result<Self, ProofError>
    where
        I: IntoIterator<Item = Sentence>,
    {
        let mut proof = Self::new();
        for assumption in assumptions {
            proof.add_sentence(assumption)?;
        }
        Ok(proof)
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn contains(&self, sentence: &Sentence) -> bool {
        self.index.contains_key(sentence)
    }

    pub fn fact_id(&self, sentence: &Sentence) -> Option<FactId> {
        self.index.get(sentence).copied()
    }

    pub fn sentence(&self, id: FactId) -> Option<&Sentence> {
        self.facts.get(id.0 as usize).map(|fact| &fact.sentence)
    }

    pub fn sentences(&self) -> impl Iterator<Item = &Sentence> {
        self.facts.iter().map(|fact| &fact.sentence)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.steps.iter().map(|step| &step.rule)
    }

    /// Insert a concrete sentence vertex, deduplicating by identity.
    pub fn add_sentence(&mut self, sentence: Sentence) -> Result<FactId, ProofError> {
        if !sentence.is_concrete() {
            return Err(ProofError::NotConcrete);
        }
        if let Some(&id) = self.index.get(&sentence) {
            return Ok(id);
        }
        let id = FactId(self.facts.len() as u32);
        self.index.insert(sentence.clone(), id);
        self.facts.push(FactNode {
            sentence,
            produced_by: Vec::new(),
            consumed_by: Vec::new(),
        });
        Ok(id)
    }

    /// Apply a concrete rule whose premises are already vertices: a new
    /// step vertex is wired from each premise to the (possibly new)
    /// conclusion.  Fails if a premise is missing or a cycle would form.
    pub fn apply(&mut self, rule: &Rule) -> Result<StepId, ProofError> {
        self.apply_rendered(rule, None)
    }

    /// `apply` with a lexicon for readable error messages.
    pub fn apply_with(&mut self, rule: &Rule, lexicon: &Lexicon) -> Result<StepId, ProofError> {
        self.apply_rendered(rule, Some(lexicon))
    }

    fn apply_rendered(
        &mut self,
        rule: &Rule,
        lexicon: Option<&Lexicon>,
    ) -> Result<StepId, ProofError> {
        if !rule.is_concrete() {
            return Err(ProofError::NotConcrete);
        }
        let mut premise_ids = Vec::with_capacity(rule.premises().len());
        for premise in rule.premises() {
            let id = self.index.get(premise).copied().ok_or_else(|| {
                ProofError::MissingPremise(match lexicon {
                    Some(lexicon) => premise.render(lexicon),
                    None => format!("{premise:?}"),
                })
            })?;
            premise_ids.push(id);
        }
        // A cycle forms exactly when some premise is already reachable
        // from the conclusion.
        if let Some(&conclusion_id) = self.index.get(rule.conclusion()) {
            if premise_ids.contains(&conclusion_id)
                || self.reaches_any(conclusion_id, &premise_ids)
            {
                return Err(ProofError::CycleDetected);
            }
        }
        let conclusion_id = self.add_sentence(rule.conclusion().clone())?;
        let step_id = StepId(self.steps.len() as u32);
        self.steps.push(StepNode {
            rule: rule.clone(),
            premises: premise_ids.clone(),
            conclusion: conclusion_id,
        });
        for premise_id in premise_ids {
            self.facts[premise_id.0 as usize].consumed_by.push(step_id);
        }
        self.facts[conclusion_id.0 as usize].produced_by.push(step_id);
        Ok(step_id)
    }

    /// Forward reachability from `start` to any of `targets`.
    fn reaches_any(&self, start: FactId, targets: &[FactId]) -> bool {
        let mut queue = VecDeque::from([start]);
        let mut seen = vec![false; self.facts.len()];
        while let Some(current) = queue.pop_front() {
            if seen[current.0 as usize] {
                continue;
            }
            seen[current.0 as usize] = true;
            if targets.contains(&current) && current != start {
                return true;
            }
            for &step_id in &self.facts[current.0 as usize].consumed_by {
                let next = self.steps[step_id.0 as usize].conclusion;
                if targets.contains(&next) {
                    return true;
                }
                queue.push_back(next);
            }
        }
        false
    }

    /// Copy `other` into `self`, deduplicating sentences but not rule
    /// applications, then re-verify acyclicity.
    pub fn merge(&mut self, other: &Proof) -> Result<(), ProofError> {
        let mut translation = Vec::with_capacity(other.facts.len());
        for fact in &other.facts {
            translation.push(self.add_sentence(fact.sentence.clone())?);
        }
        for step in &other.steps {
            let step_id = StepId(self.steps.len() as u32);
            let premises: Vec<FactId> = step
                .premises
                .iter()
                .map(|&id| translation[id.0 as usize])
                .collect();
            let conclusion = translation[step.conclusion.0 as usize];
            for &premise_id in &premises {
                self.facts[premise_id.0 as usize].consumed_by.push(step_id);
            }
            self.facts[conclusion.0 as usize].produced_by.push(step_id);
            self.steps.push(StepNode { rule: step.rule.clone(), premises, conclusion });
        }
        if self.has_cycle() {
            return Err(ProofError::CycleDetected);
        }
        Ok(())
    }

    /// The sub-proof reachable backwards from `goal`.
    pub fn trim(&self, goal: &Sentence) -> Result<Proof, ProofError> {
        let goal_id = self.index.get(goal).copied().ok_or(ProofError::GoalAbsent)?;
        let mut keep_facts = vec![false; self.facts.len()];
        let mut keep_steps = vec![false; self.steps.len()];
        let mut queue = VecDeque::from([goal_id]);
        while let Some(current) = queue.pop_front() {
            if keep_facts[current.0 as usize] {
                continue;
            }
            keep_facts[current.0 as usize] = true;
            for &step_id in &self.facts[current.0 as usize].produced_by {
                if !keep_steps[step_id.0 as usize] {
                    keep_steps[step_id.0 as usize] = true;
                    queue.extend(self.steps[step_id.0 as usize].premises.iter().copied());
                }
            }
        }
        let mut trimmed = Proof::new();
        for (index, fact) in self.facts.iter().enumerate() {
            if keep_facts[index] {
                trimmed.add_sentence(fact.sentence.clone())?;
            }
        }
        for (index, step) in self.steps.iter().enumerate() {
            if keep_steps[index] {
                trimmed.apply(&step.rule)?;
            }
        }
        Ok(trimmed)
    }

    /// Sentence vertices no step consumes.
    pub fn sinks(&self) -> Vec<&Sentence> {
        self.facts
            .iter()
            .filter(|fact| fact.consumed_by.is_empty())
            .map(|fact| &fact.sentence)
            .collect()
    }

    /// A valid proof is acyclic, concludes every fact at most once, and
    /// has exactly one sink.
    pub fn is_valid(&self) -> bool {
        if self.facts.iter().any(|fact| fact.produced_by.len() > 1) {
            return false;
        }
        if self.sinks().len() != 1 {
            return false;
        }
        !self.has_cycle()
    }

    fn has_cycle(&self) -> bool {
        // Kahn's algorithm over fact vertices; steps are edges from
        // premises to conclusion.
        let mut pending: Vec<usize> = self
            .facts
            .iter()
            .map(|fact| {
                fact.produced_by
                    .iter()
                    .map(|&step_id| self.steps[step_id.0 as usize].premises.len())
                    .sum()
            })
            .collect();
        let mut queue: VecDeque<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(index, _)| index)
            .collect();
        let mut visited = 0usize;
        while let Some(current) = queue.pop_front() {
            visited += 1;
            for &step_id in &self.facts[current].consumed_by {
                let conclusion = self.steps[step_id.0 as usize].conclusion.0 as usize;
                pending[conclusion] -= 1;
                if pending[conclusion] == 0 {
                    queue.push_back(conclusion);
                }
            }
        }
        visited != self.facts.len()
    }
}
