//! Rules: ordered premises and one conclusion.
//!
//! Rule identity compares premise lists in order; rule *equality* (`==`)
//! is invariant under premise permutation and a joint renaming of
//! variables, and `Hash` agrees with it: the per-premise α-invariant
//! hashes are combined commutatively and XOR-ed with the conclusion hash.

use std::hash::{Hash, Hasher};

use super::sentence::Sentence;
use super::substitution::{AlphaConversion, Substitution};
use super::token::Token;
use super::vocab::Lexicon;

#[derive(Clone, Debug)]
pub struct Rule {
    premises: Vec<Sentence>,
    conclusion: Sentence,
}

impl Rule {
    pub fn new(premises: Vec<Sentence>, conclusion: Sentence) -> Self {
        Self { premises, conclusion }
    }

    /// A premise-free rule asserting its conclusion.
    pub fn fact(conclusion: Sentence) -> Self {
        Self { premises: Vec::new(), conclusion }
    }

    pub fn premises(&self) -> &[Sentence] {
        &self.premises
    }

    pub fn conclusion(&self) -> &Sentence {
        &self.conclusion
    }

    pub fn sentences(&self) -> impl Iterator<Item = &Sentence> {
        self.premises.iter().chain(std::iter::once(&self.conclusion))
    }

    pub fn is_concrete(&self) -> bool {
        self.sentences().all(Sentence::is_concrete)
    }

    /// Distinct variables in first-occurrence order, premises first.
    pub fn variables(&self) -> Vec<Token> {
        let mut seen = Vec::new();
        for sentence in self.sentences() {
            for token in sentence.iter() {
                if token.is_variable() && !seen.contains(&token) {
                    seen.push(token);
                }
            }
        }
        seen
    }

    /// Total occurrences of a token across premises and conclusion.
    pub fn occurrences(&self, token: Token) -> usize {
        self.sentences().map(|s| s.occurrences(token)).sum()
    }

    /// Variables that occur exactly once in the whole rule.
    pub fn free_variables(&self) -> Vec<Token> {
        self.variables()
            .into_iter()
            .filter(|&var| self.occurrences(var) == 1)
            .collect()
    }

    pub fn apply(&self, subst: &Substitution) -> Rule {
        Rule {
            premises: self.premises.iter().map(|p| subst.apply(p)).collect(),
            conclusion: subst.apply(&self.conclusion),
        }
    }

    pub fn rename(&self, conversion: &AlphaConversion) -> Rule {
        Rule {
            premises: self.premises.iter().map(|p| conversion.rename(p)).collect(),
            conclusion: conversion.rename(&self.conclusion),
        }
    }

    /// Strict identity: premise lists equal in order, conclusions equal.
    pub fn is_identical(&self, other: &Rule) -> bool {
        self.premises == other.premises && self.conclusion == other.conclusion
    }

    /// The conclusion and premises joined into one sentence by the
    /// reserved delimiter, so that rule-level comparisons reduce to
    /// sentence-level ones.
    pub(crate) fn joined(&self) -> Sentence {
        let order: Vec<usize> = (0..self.premises.len()).collect();
        self.joined_ordered(&order)
    }

    /// Delimiter-joined form with premises taken in `order`.
    pub(crate) fn joined_ordered(&self, order: &[usize]) -> Sentence {
        let mut tokens: Vec<Token> = self.conclusion.iter().collect();
        for &index in order {
            tokens.push(Token::RULE_DELIMITER);
            tokens.extend(self.premises[index].iter());
        }
        Sentence::new(tokens)
    }

    /// Equality under premise permutation and a single joint renaming.
    pub fn is_equivalent(&self, other: &Rule) -> bool {
        if self.premises.len() != other.premises.len() {
            return false;
        }
        let joined = self.joined();
        permutations(other.premises.len())
            .into_iter()
            .any(|order| joined.is_equivalent(&other.joined_ordered(&order)))
    }

    /// Hash agreeing with `is_equivalent`.
    pub fn alpha_hash(&self) -> u64 {
        let premises = self
            .premises
            .iter()
            .fold(0u64, |acc, premise| acc ^ premise.alpha_hash());
        premises ^ self.conclusion.alpha_hash()
    }

    /// Canonical form with redundant variable pairs merged: whenever two
    /// variables appear adjacent in the same order through every
    /// occurrence, the second is dropped.
    pub fn normalize(&self) -> Rule {
        let mut rule = self.clone();
        while let Some((keep, drop)) = redundant_pair(&rule) {
            rule = merge_adjacent_pair(&rule, keep, drop);
        }
        rule
    }

    /// The rule invariants:
    /// - every conclusion variable occurs in some premise;
    /// - no premise is a single free variable;
    /// - no redundant always-adjacent variable pair remains;
    /// - at most one free variable in the whole rule.
    pub fn is_valid(&self) -> bool {
        let premise_vars: Vec<Token> = {
            let mut seen = Vec::new();
            for premise in &self.premises {
                for var in premise.variables() {
                    if !seen.contains(&var) {
                        seen.push(var);
                    }
                }
            }
            seen
        };
        for var in self.conclusion.variables() {
            if !premise_vars.contains(&var) {
                return false;
            }
        }
        for premise in &self.premises {
            if premise.len() == 1 {
                if let Some(token) = premise.first() {
                    if token.is_variable() && self.occurrences(token) == 1 {
                        return false;
                    }
                }
            }
        }
        if redundant_pair(self).is_some() {
            return false;
        }
        self.free_variables().len() <= 1
    }

    pub fn render(&self, lexicon: &Lexicon) -> String {
        let mut lines: Vec<String> =
            self.premises.iter().map(|p| p.render(lexicon)).collect();
        lines.push("---".to_string());
        lines.push(self.conclusion.render(lexicon));
        lines.join("\n")
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.is_equivalent(other)
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.alpha_hash());
    }
}

/// All index permutations of `0..n` in lexicographic order.
pub(crate) fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(n);
    let mut used = vec![false; n];
    fn recurse(
        n: usize,
        current: &mut Vec<usize>,
        used: &mut Vec<bool>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if current.len() == n {
            out.push(current.clone());
            return;
        }
        for index in 0..n {
            if !used[index] {
                used[index] = true;
                current.push(index);
                recurse(n, current, used, out);
                current.pop();
                used[index] = false;
            }
        }
    }
    recurse(n, &mut current, &mut used, &mut out);
    out
}

/// A pair of variables `(x, y)` such that every occurrence of `x` is
/// immediately followed by `y` and every occurrence of `y` immediately
/// preceded by `x`.
pub(crate) fn redundant_pair(rule: &Rule) -> Option<(Token, Token)> {
    let vars = rule.variables();
    for &x in &vars {
        for &y in &vars {
            if x != y && always_adjacent(rule, x, y) {
                return Some((x, y));
            }
        }
    }
    None
}

fn always_adjacent(rule: &Rule, x: Token, y: Token) -> bool {
    let mut seen_any = false;
    for sentence in rule.sentences() {
        let tokens = sentence.tokens();
        for (index, &token) in tokens.iter().enumerate() {
            if token == x {
                if tokens.get(index + 1) != Some(&y) {
                    return false;
                }
                seen_any = true;
            } else if token == y && (index == 0 || tokens[index - 1] != x) {
                return false;
            }
        }
    }
    seen_any
}

/// Rewrite every `x y` occurrence to `x`, dropping the redundant `y`.
pub(crate) fn merge_adjacent_pair(rule: &Rule, x: Token, y: Token) -> Rule {
    let rewrite = |sentence: &Sentence| {
        let mut out = Vec::with_capacity(sentence.len());
        let tokens = sentence.tokens();
        let mut index = 0;
        while index < tokens.len() {
            out.push(tokens[index]);
            if tokens[index] == x && tokens.get(index + 1) == Some(&y) {
                index += 2;
            } else {
                index += 1;
            }
        }
        Sentence::new(out)
    };
    Rule {
        premises: rule.premises.iter().map(rewrite).collect(),
        conclusion: rewrite(&rule.conclusion),
    }
}

#[cfg(test)]
mod tests {
    use super::{permutations, Rule};
    use crate::data::vocab::Lexicon;
    use crate::parser::{parse_rule, parse_sentence};

    fn rule(lexicon: &Lexicon, text: &str) -> Rule {
        parse_rule(text, lexicon).expect("well-formed rule")
    }

    #[test]
    fn equality_ignores_premise_order_and_renaming() {
        let lexicon = Lexicon::new();
        let r1 = rule(&lexicon, "[A] is red\n[A] is round\n---\n[A] is apple");
        let r2 = rule(&lexicon, "[B] is round\n[B] is red\n---\n[B] is apple");
        assert!(!r1.is_identical(&r2));
        assert_eq!(r1, r2);
        assert_eq!(r1.alpha_hash(), r2.alpha_hash());

        let r3 = rule(&lexicon, "[A] is red\n[B] is round\n---\n[A] is apple");
        assert_ne!(r1, r3);
    }

    #[test]
    fn joint_renaming_is_required() {
        let lexicon = Lexicon::new();
        // Premise and conclusion share [A]; renaming must stay consistent
        // across both sentences.
        let r1 = rule(&lexicon, "[A] wug\n---\n[A] dax");
        let r2 = rule(&lexicon, "[B] wug\n---\n[C] dax");
        assert_ne!(r1, r2);
    }

    #[test]
    fn validity_invariants() {
        let lexicon = Lexicon::new();
        let ok = rule(&lexicon, "[A] $MAPS_TO$ [B]\n---\n[A] fep $MAPS_TO$ [B] [B] [B]");
        assert!(ok.is_valid());

        // Conclusion variable missing from the premises.
        let dangling = rule(&lexicon, "[A] wug\n---\n[A] [B]");
        assert!(!dangling.is_valid());

        // A premise that is one variable occurring nowhere else.
        let bare = rule(&lexicon, "[B]\n[A] wug\n---\n[A] dax");
        assert!(!bare.is_valid());

        // Two free variables.
        let loose = rule(&lexicon, "[A] wug [B] zup [C]\n---\nwug [A]");
        assert!(!loose.is_valid());
    }

    #[test]
    fn normalize_merges_always_adjacent_pairs() {
        let lexicon = Lexicon::new();
        let redundant = rule(&lexicon, "[A] [B] wug\n---\n[A] [B] dax");
        assert!(!redundant.is_valid());
        let normalized = redundant.normalize();
        let expected = rule(&lexicon, "[A] wug\n---\n[A] dax");
        assert!(normalized.is_identical(&expected));
        assert!(normalized.is_valid());

        // Not always adjacent: [B] also occurs alone.
        let kept = rule(&lexicon, "[A] [B] wug [B]\n---\n[A] dax");
        assert!(kept.normalize().is_identical(&kept));
    }

    #[test]
    fn concrete_rules_and_facts() {
        let lexicon = Lexicon::new();
        let fact = Rule::fact(parse_sentence("dax $MAPS_TO$ RED", &lexicon).expect("parse"));
        assert!(fact.is_concrete());
        assert!(fact.premises().is_empty());
        assert!(fact.is_valid());
    }

    #[test]
    fn permutation_enumeration() {
        assert_eq!(permutations(0), vec![Vec::<usize>::new()]);
        assert_eq!(permutations(3).len(), 6);
        assert_eq!(permutations(3)[0], vec![0, 1, 2]);
    }
}
