//! Matching: substitutions sending a pattern onto a concrete instance.
//!
//! A variable may bind any contiguous non-empty special-free segment; the
//! same variable occurring again must reproduce its segment; words and
//! special symbols match literally.  Matching never errors: failure is
//! the empty result list, and repeated calls enumerate results in the
//! same order.

use crate::data::rule::permutations;
use crate::data::template::decompose;
use crate::data::{Rule, Sentence, Substitution, Token};

/// Capability shared by sentences and rules: enumerate the substitutions
/// sending `self` onto `other`.
pub trait Matchable {
    fn match_onto(&self, other: &Self) -> Vec<Substitution>;

    /// `self` is at least as general as `other`.
    fn is_more_general(&self, other: &Self) -> bool {
        !self.match_onto(other).is_empty()
    }
}

impl Matchable for Sentence {
    fn match_onto(&self, other: &Self) -> Vec<Substitution> {
        match_sentences(self, other)
    }
}

impl Matchable for Rule {
    fn match_onto(&self, other: &Self) -> Vec<Substitution> {
        match_rules(self, other)
    }
}

/// All substitutions σ with `σ(pattern)` identical to `instance`.
/// Variables of `instance` are treated as inert tokens, so matching a
/// pattern onto a non-concrete sentence decides generality.
pub fn match_sentences(pattern: &Sentence, instance: &Sentence) -> Vec<Substitution> {
    if pattern.is_empty() && instance.is_empty() {
        return vec![Substitution::new()];
    }
    let (pattern_template, pattern_segments) = decompose(pattern);
    let (instance_template, instance_segments) = decompose(instance);
    if pattern_template != instance_template {
        return Vec::new();
    }
    // Anchor pre-filter: a segment's leading and trailing non-variable
    // tokens must agree literally before any splits are attempted.
    for (p, i) in pattern_segments.iter().zip(instance_segments.iter()) {
        if let (Some(a), Some(b)) = (p.first(), i.first()) {
            if !a.is_variable() && a != b {
                return Vec::new();
            }
        }
        if let (Some(a), Some(b)) = (p.last(), i.last()) {
            if !a.is_variable() && a != b {
                return Vec::new();
            }
        }
    }
    let mut partial = vec![Substitution::new()];
    for (p, i) in pattern_segments.iter().zip(instance_segments.iter()) {
        let mut next = Vec::new();
        for subst in &partial {
            match_segment(p.tokens(), i.tokens(), subst.clone(), &mut next);
        }
        if next.is_empty() {
            return Vec::new();
        }
        partial = next;
    }
    partial
}

/// Backtracking enumeration of segment splits, shortest bindings first.
fn match_segment(
    pattern: &[Token],
    instance: &[Token],
    subst: Substitution,
    out: &mut Vec<Substitution>,
) {
    let Some(&head) = pattern.first() else {
        if instance.is_empty() {
            out.push(subst);
        }
        return;
    };
    // Every remaining pattern token consumes at least one instance token.
    if instance.len() < pattern.len() {
        return;
    }
    if !head.is_variable() {
        if instance.first() == Some(&head) {
            match_segment(&pattern[1..], &instance[1..], subst, out);
        }
        return;
    }
    if let Some(bound) = subst.get(head).cloned() {
        if instance.starts_with(bound.tokens()) {
            match_segment(&pattern[1..], &instance[bound.len()..], subst, out);
        }
        return;
    }
    let longest = instance.len() - (pattern.len() - 1);
    for take in 1..=longest {
        let mut extended = subst.clone();
        extended.insert_unchecked(head, Sentence::from_slice(&instance[..take]));
        match_segment(&pattern[1..], &instance[take..], extended, out);
    }
}

/// Rule-level matching: the conclusion plus every permutation of
/// `instance`'s premises is joined into one delimiter-separated sentence
/// and matched against `pattern`'s joined form; duplicate substitutions
/// are dropped.
pub fn match_rules(pattern: &Rule, instance: &Rule) -> Vec<Substitution> {
    if pattern.premises().len() != instance.premises().len() {
        return Vec::new();
    }
    let joined = pattern.joined();
    let mut out: Vec<Substitution> = Vec::new();
    for order in permutations(instance.premises().len()) {
        for subst in match_sentences(&joined, &instance.joined_ordered(&order)) {
            if !out.contains(&subst) {
                out.push(subst);
            }
        }
    }
    out
}
