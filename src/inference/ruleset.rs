//! Template-indexed rule sets with a generality DAG, incrementally
//! closed under anti-unification.
//!
//! Rules live in an arena and are referenced by index; generality edges
//! (`g` is more general than `s`) connect rules of the same template
//! bucket.  Every insertion anti-unifies the newcomer against its bucket
//! peers and keeps inserting valid generalizations until a fixed point.

use indexmap::IndexMap;
use std::collections::VecDeque;
use tracing::debug;

use crate::data::{Lexicon, Rule, RuleTemplate};

use super::anti_unify::{anti_unify_rules_with, AntiUnifyOptions};
use super::matching::Matchable;

/// Index of a rule inside an [`IndexedRuleSet`].
pub type RuleId = usize;

#[derive(Debug, Default)]
pub struct IndexedRuleSet {
    rules: Vec<Rule>,
    buckets: IndexMap<RuleTemplate, Vec<RuleId>>,
    /// `more_general_of[x]` lists the rules strictly more general than `x`.
    more_general_of: Vec<Vec<RuleId>>,
    /// `more_specific_of[g]` lists the rules `g` generalizes.
    more_specific_of: Vec<Vec<RuleId>>,
    options: AntiUnifyOptions,
}

impl IndexedRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: AntiUnifyOptions) -> Self {
        Self { options, ..Self::default() }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter().enumerate()
    }

    /// The id of a rule equivalent to `rule`, if present.
    pub fn find(&self, rule: &Rule) -> Option<RuleId> {
        let template = RuleTemplate::of(rule);
        self.buckets
            .get(&template)?
            .iter()
            .copied()
            .find(|&id| self.rules[id] == *rule)
    }

    pub fn contains(&self, rule: &Rule) -> bool {
        self.find(rule).is_some()
    }

    /// Rules sharing a template bucket with `rule`.
    pub fn bucket(&self, template: &RuleTemplate) -> &[RuleId] {
        self.buckets
            .get(template)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Insert a rule and propagate: the newcomer is anti-unified against
    /// every bucket peer, and each anti-unifier accepted by `is_valid`
    /// is inserted and queued in turn, until the worklist drains.
    pub fn insert(
        &mut self,
        rule: Rule,
        lexicon: &Lexicon,
        is_valid: &dyn Fn(&Rule) -> bool,
    ) -> RuleId {
        if let Some(existing) = self.find(&rule) {
            return existing;
        }
        let id = self.insert_plain(rule);
        let mut queue: VecDeque<RuleId> = VecDeque::from([id]);
        let mut rounds = 0usize;
        while let Some(current) = queue.pop_front() {
            rounds += 1;
            let template = RuleTemplate::of(&self.rules[current]);
            let peers: Vec<RuleId> = self
                .bucket(&template)
                .iter()
                .copied()
                .filter(|&peer| peer != current)
                .collect();
            for peer in peers {
                if self.rules[peer].is_more_general(&self.rules[current]) {
                    self.add_edge(peer, current);
                }
                if self.rules[current].is_more_general(&self.rules[peer]) {
                    self.add_edge(current, peer);
                }
                let anti_unifiers = anti_unify_rules_with(
                    &self.rules[current],
                    &self.rules[peer],
                    lexicon,
                    self.options,
                );
                for found in anti_unifiers {
                    if !is_valid(&found.general) {
                        continue;
                    }
                    let general_id = match self.find(&found.general) {
                        Some(existing) => existing,
                        None => {
                            let fresh = self.insert_plain(found.general);
                            queue.push_back(fresh);
                            fresh
                        }
                    };
                    self.add_edge(general_id, current);
                    self.add_edge(general_id, peer);
                }
            }
        }
        debug!(rounds, rules = self.rules.len(), "rule-set propagation settled");
        id
    }

    fn insert_plain(&mut self, rule: Rule) -> RuleId {
        let template = RuleTemplate::of(&rule);
        let id = self.rules.len();
        self.rules.push(rule);
        self.more_general_of.push(Vec::new());
        self.more_specific_of.push(Vec::new());
        self.buckets.entry(template).or_default().push(id);
        id
    }

    fn add_edge(&mut self, general: RuleId, specific: RuleId) {
        if general == specific {
            return;
        }
        if !self.more_specific_of[general].contains(&specific) {
            self.more_specific_of[general].push(specific);
            self.more_general_of[specific].push(general);
        }
    }

    /// Generalizations of `id` in breadth-first order.
    pub fn ancestors(&self, id: RuleId) -> Vec<RuleId> {
        self.traverse(id, &self.more_general_of)
    }

    /// Specializations of `id` in breadth-first order.
    pub fn descendants(&self, id: RuleId) -> Vec<RuleId> {
        self.traverse(id, &self.more_specific_of)
    }

    /// Is `ancestor` a (transitive) generalization of `id`?
    pub fn is_ancestor(&self, ancestor: RuleId, id: RuleId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    pub fn is_descendant(&self, descendant: RuleId, id: RuleId) -> bool {
        self.is_ancestor(id, descendant)
    }

    fn traverse(&self, start: RuleId, edges: &[Vec<RuleId>]) -> Vec<RuleId> {
        let mut queue: VecDeque<RuleId> = edges
            .get(start)
            .map(|next| next.iter().copied().collect())
            .unwrap_or_default();
        let mut seen = Vec::new();
        while let Some(current) = queue.pop_front() {
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            queue.extend(edges[current].iter().copied());
        }
        seen
    }
}
