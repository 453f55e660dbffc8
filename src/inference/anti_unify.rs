//! Anti-unification: least-general generalizations of two sentences or
//! rules.
//!
//! A generalization is reported together with its *bi-substitution*,
//! mapping every introduced variable to the pair of segments it replaced;
//! projecting the bi-substitution left or right recovers the inputs.
//! Repeated segment pairs reuse the same variable, which is what lets a
//! generalization capture cross-positional structure (`RED RED RED` vs
//! `BLUE BLUE BLUE` becomes `[B] [B] [B]`).
//!
//! Moderate-sized middles are generalized by exhaustive prefix-pair
//! enumeration; long middles by pairing the tokens of a longest common
//! subsequence and abstracting the gaps.

use indexmap::IndexMap;

use crate::config::SearchParams;
use crate::data::rule::{merge_adjacent_pair, permutations, redundant_pair};
use crate::data::template::{compose, decompose};
use crate::data::{
    common_prefix_len, common_suffix_len, subslice_occurrences, Lexicon, Rule, Sentence,
    Substitution, Token,
};

/// How a single anti-unification call explores the search space.
#[derive(Copy, Clone, Debug)]
pub struct AntiUnifyOptions {
    /// Permit bindings whose both sides occur nowhere else in the inputs.
    pub allow_free: bool,
    /// Largest middle (per side) still generalized by exhaustive
    /// prefix-pair enumeration; longer middles fall back to the
    /// LCS-guided path.
    pub exhaustive_middle_limit: usize,
}

impl Default for AntiUnifyOptions {
    fn default() -> Self {
        Self { allow_free: true, exhaustive_middle_limit: 6 }
    }
}

impl AntiUnifyOptions {
    pub fn from_params(params: &SearchParams) -> Self {
        Self {
            allow_free: true,
            exhaustive_middle_limit: params.exhaustive_middle_limit,
        }
    }
}

/// Map from introduced variables to the segment pairs they replaced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BiSubstitution {
    pairs: IndexMap<Token, (Sentence, Sentence)>,
}

impl BiSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, var: Token) -> Option<&(Sentence, Sentence)> {
        self.pairs.get(&var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, &(Sentence, Sentence))> {
        self.pairs.iter().map(|(&var, pair)| (var, pair))
    }

    pub fn variables(&self) -> impl Iterator<Item = Token> + '_ {
        self.pairs.keys().copied()
    }

    /// The variable already covering exactly this segment pair, if any.
    pub fn var_for(&self, left: &[Token], right: &[Token]) -> Option<Token> {
        self.pairs.iter().find_map(|(&var, (l, r))| {
            (l.tokens() == left && r.tokens() == right).then_some(var)
        })
    }

    fn insert(&mut self, var: Token, left: Sentence, right: Sentence) {
        self.pairs.insert(var, (left, right));
    }

    /// Projection recovering the first input.
    pub fn left(&self) -> Substitution {
        let mut subst = Substitution::new();
        for (var, (l, _)) in self.iter() {
            subst.insert_unchecked(var, l.clone());
        }
        subst
    }

    /// Projection recovering the second input.
    pub fn right(&self) -> Substitution {
        let mut subst = Substitution::new();
        for (var, (_, r)) in self.iter() {
            subst.insert_unchecked(var, r.clone());
        }
        subst
    }

    /// Fold `drop`'s pair into `keep`'s after an adjacent-pair merge.
    fn merge_pair(mut self, keep: Token, drop: Token) -> Self {
        let dropped = self.pairs.shift_remove(&drop);
        if let (Some((dl, dr)), Some((kl, kr))) = (dropped, self.pairs.get(&keep).cloned())
        {
            self.pairs.insert(keep, (kl.concat(&dl), kr.concat(&dr)));
        }
        self
    }

    /// Keep only the variables that still occur in `rule`.
    fn restrict_to_rule(mut self, rule: &Rule) -> Self {
        let used = rule.variables();
        self.pairs.retain(|var, _| used.contains(var));
        self
    }
}

/// One generalization of a sentence pair.
#[derive(Clone, Debug, PartialEq)]
pub struct AntiUnifier {
    pub general: Sentence,
    pub bindings: BiSubstitution,
}

/// One generalization of a rule pair.
#[derive(Clone, Debug)]
pub struct RuleAntiUnifier {
    pub general: Rule,
    pub bindings: BiSubstitution,
}

struct AuCtx<'a> {
    lexicon: &'a Lexicon,
    allow_free: bool,
    exhaustive_middle_limit: usize,
    /// Variables the fresh mints must not collide with.
    base_avoid: Vec<Token>,
    /// Material consulted by the free-binding check, per side.
    remaining1: Vec<Sentence>,
    remaining2: Vec<Sentence>,
}

impl AuCtx<'_> {
    /// A segment is free on its side when the occurrence being
    /// generalized is its only occurrence anywhere in the inputs.
    fn binding_is_free(&self, left: &[Token], right: &[Token]) -> bool {
        let left_occurrences: usize = self
            .remaining1
            .iter()
            .map(|s| subslice_occurrences(s.tokens(), left))
            .sum();
        let right_occurrences: usize = self
            .remaining2
            .iter()
            .map(|s| subslice_occurrences(s.tokens(), right))
            .sum();
        left_occurrences <= 1 && right_occurrences <= 1
    }
}

/// Reuse, mint, or refuse the variable for a segment pair.  Returns
/// `None` when the binding would be free and free bindings are disabled,
/// pruning the branch.
fn var_for_pair(
    bisub: &mut BiSubstitution,
    ctx: &AuCtx<'_>,
    left: &[Token],
    right: &[Token],
) -> Option<Token> {
    if let Some(var) = bisub.var_for(left, right) {
        return Some(var);
    }
    if !ctx.allow_free && ctx.binding_is_free(left, right) {
        return None;
    }
    let mut avoid = ctx.base_avoid.clone();
    avoid.extend(bisub.variables());
    let var = ctx.lexicon.fresh_variable(&avoid);
    bisub.insert(var, Sentence::from_slice(left), Sentence::from_slice(right));
    Some(var)
}

/// Generalizations of one special-free segment pair.
fn gen_segment(
    a: &[Token],
    b: &[Token],
    bisub: &BiSubstitution,
    ctx: &AuCtx<'_>,
) -> Vec<(Vec<Token>, BiSubstitution)> {
    let p = common_prefix_len(a, b);
    let s = common_suffix_len(&a[p..], &b[p..]);
    let middle_a = &a[p..a.len() - s];
    let middle_b = &b[p..b.len() - s];

    if middle_a.is_empty() && middle_b.is_empty() {
        return vec![(a.to_vec(), bisub.clone())];
    }

    if middle_a.is_empty() || middle_b.is_empty() {
        // One input is a prefix/suffix/infix of the other: absorb an
        // adjacent shared token so that neither side of the pair is
        // empty, yielding the single trivial generalization.
        let mut state = bisub.clone();
        if p > 0 {
            let left = &a[p - 1..a.len() - s];
            let right = &b[p - 1..b.len() - s];
            let Some(var) = var_for_pair(&mut state, ctx, left, right) else {
                return Vec::new();
            };
            let mut tokens = a[..p - 1].to_vec();
            tokens.push(var);
            tokens.extend_from_slice(&a[a.len() - s..]);
            return vec![(tokens, state)];
        }
        if s > 0 {
            let left = &a[..a.len() - s + 1];
            let right = &b[..b.len() - s + 1];
            let Some(var) = var_for_pair(&mut state, ctx, left, right) else {
                return Vec::new();
            };
            let mut tokens = vec![var];
            tokens.extend_from_slice(&a[a.len() - s + 1..]);
            return vec![(tokens, state)];
        }
        // The whole of one side is empty; bindings must be non-empty.
        return Vec::new();
    }

    let mut out: Vec<(Vec<Token>, BiSubstitution)> = Vec::new();
    if middle_a.len().max(middle_b.len()) <= ctx.exhaustive_middle_limit {
        for take_a in 1..=middle_a.len() {
            for take_b in 1..=middle_b.len() {
                let mut state = bisub.clone();
                let Some(var) =
                    var_for_pair(&mut state, ctx, &middle_a[..take_a], &middle_b[..take_b])
                else {
                    continue;
                };
                for (tail, tail_bisub) in
                    gen_segment(&middle_a[take_a..], &middle_b[take_b..], &state, ctx)
                {
                    let mut tokens = a[..p].to_vec();
                    tokens.push(var);
                    tokens.extend_from_slice(&tail);
                    tokens.extend_from_slice(&a[a.len() - s..]);
                    out.push((tokens, tail_bisub));
                }
            }
        }
    } else if let Some((middle, state)) = lcs_generalize(middle_a, middle_b, bisub, ctx) {
        let mut tokens = a[..p].to_vec();
        tokens.extend_from_slice(&middle);
        tokens.extend_from_slice(&a[a.len() - s..]);
        out.push((tokens, state));
    }

    if out.is_empty() {
        // Degenerate generalization: a single variable over the middles.
        let mut state = bisub.clone();
        if let Some(var) = var_for_pair(&mut state, ctx, middle_a, middle_b) {
            let mut tokens = a[..p].to_vec();
            tokens.push(var);
            tokens.extend_from_slice(&a[a.len() - s..]);
            out.push((tokens, state));
        }
    }
    out
}

/// Index pairs of one longest common subsequence, ascending.
fn lcs_pairs(a: &[Token], b: &[Token]) -> Vec<(usize, usize)> {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            table[i][j] = if a[i] == b[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }
    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Generalize long middles along their longest common subsequence: each
/// maximal unmatched gap becomes one variable, absorbing the adjacent
/// matched token whenever a gap is empty on one side only.
fn lcs_generalize(
    a: &[Token],
    b: &[Token],
    bisub: &BiSubstitution,
    ctx: &AuCtx<'_>,
) -> Option<(Vec<Token>, BiSubstitution)> {
    let matches = lcs_pairs(a, b);
    if matches.is_empty() {
        return None;
    }
    let mut state = bisub.clone();
    let mut tokens: Vec<Token> = Vec::new();
    let (mut ai, mut bi) = (0usize, 0usize);
    let mut last_match_standalone = false;
    let (mut last_i, mut last_j) = (0usize, 0usize);
    for &(i, j) in &matches {
        let gap_a = &a[ai..i];
        let gap_b = &b[bi..j];
        if gap_a.is_empty() && gap_b.is_empty() {
            tokens.push(a[i]);
            last_match_standalone = true;
        } else if gap_a.is_empty() || gap_b.is_empty() {
            let var = var_for_pair(&mut state, ctx, &a[ai..=i], &b[bi..=j])?;
            tokens.push(var);
            last_match_standalone = false;
        } else {
            let var = var_for_pair(&mut state, ctx, gap_a, gap_b)?;
            tokens.push(var);
            tokens.push(a[i]);
            last_match_standalone = true;
        }
        ai = i + 1;
        bi = j + 1;
        last_i = i;
        last_j = j;
    }
    let tail_a = &a[ai..];
    let tail_b = &b[bi..];
    if !(tail_a.is_empty() && tail_b.is_empty()) {
        if tail_a.is_empty() || tail_b.is_empty() {
            // Absorb the final matched token into the trailing variable.
            if !last_match_standalone {
                return None;
            }
            tokens.pop();
            let var = var_for_pair(&mut state, ctx, &a[last_i..], &b[last_j..])?;
            tokens.push(var);
        } else {
            let var = var_for_pair(&mut state, ctx, tail_a, tail_b)?;
            tokens.push(var);
        }
    }
    Some((tokens, state))
}

/// Generalize two sentences starting from an existing bi-substitution,
/// decomposing by template and threading the state across segments.
fn anti_unify_inner(
    s1: &Sentence,
    s2: &Sentence,
    seed: &BiSubstitution,
    ctx: &AuCtx<'_>,
) -> Vec<(Sentence, BiSubstitution)> {
    let (template1, segments1) = decompose(s1);
    let (template2, segments2) = decompose(s2);
    if template1 != template2 {
        return Vec::new();
    }
    let mut states: Vec<(Vec<Sentence>, BiSubstitution)> = vec![(Vec::new(), seed.clone())];
    for (a, b) in segments1.iter().zip(segments2.iter()) {
        let mut next = Vec::new();
        for (built, bisub) in &states {
            for (tokens, new_bisub) in gen_segment(a.tokens(), b.tokens(), bisub, ctx) {
                let mut segments = built.clone();
                segments.push(Sentence::new(tokens));
                next.push((segments, new_bisub));
            }
        }
        if next.is_empty() {
            return Vec::new();
        }
        states = next;
    }
    let mut out = Vec::new();
    for (segments, bisub) in states {
        if let Some(general) = compose(&template1, &segments) {
            if !out.iter().any(|(g, b): &(Sentence, BiSubstitution)| {
                *g == general && *b == bisub
            }) {
                out.push((general, bisub));
            }
        }
    }
    out
}

fn collect_variables(sentences: &[&Sentence]) -> Vec<Token> {
    let mut seen = Vec::new();
    for sentence in sentences {
        for var in sentence.variables() {
            if !seen.contains(&var) {
                seen.push(var);
            }
        }
    }
    seen
}

/// Least-general generalizations of two sentences.
pub fn anti_unify(s1: &Sentence, s2: &Sentence, lexicon: &Lexicon) -> Vec<AntiUnifier> {
    anti_unify_with(s1, s2, &[], &[], lexicon, AntiUnifyOptions::default())
}

/// Anti-unification with explicit context sentences (consulted by the
/// free-binding check) and options.
pub fn anti_unify_with(
    s1: &Sentence,
    s2: &Sentence,
    context1: &[Sentence],
    context2: &[Sentence],
    lexicon: &Lexicon,
    options: AntiUnifyOptions,
) -> Vec<AntiUnifier> {
    let mut sides1: Vec<&Sentence> = vec![s1];
    sides1.extend(context1.iter());
    let mut sides2: Vec<&Sentence> = vec![s2];
    sides2.extend(context2.iter());
    let mut base_avoid = collect_variables(&sides1);
    for var in collect_variables(&sides2) {
        if !base_avoid.contains(&var) {
            base_avoid.push(var);
        }
    }
    let ctx = AuCtx {
        lexicon,
        allow_free: options.allow_free,
        exhaustive_middle_limit: options.exhaustive_middle_limit,
        base_avoid,
        remaining1: sides1.into_iter().cloned().collect(),
        remaining2: sides2.into_iter().cloned().collect(),
    };
    anti_unify_inner(s1, s2, &BiSubstitution::new(), &ctx)
        .into_iter()
        .map(|(general, bindings)| AntiUnifier { general, bindings })
        .collect()
}

/// Least-general generalizations of two rules: conclusions are
/// generalized with free bindings disabled, then the premise lists are
/// generalized pointwise under every permutation of the second rule's
/// premises, sharing the bi-substitution throughout.  Candidates are
/// normalized and filtered by rule validity, deduplicating up to
/// equivalence.
pub fn anti_unify_rules(r1: &Rule, r2: &Rule, lexicon: &Lexicon) -> Vec<RuleAntiUnifier> {
    anti_unify_rules_with(r1, r2, lexicon, AntiUnifyOptions::default())
}

pub fn anti_unify_rules_with(
    r1: &Rule,
    r2: &Rule,
    lexicon: &Lexicon,
    options: AntiUnifyOptions,
) -> Vec<RuleAntiUnifier> {
    if r1.premises().len() != r2.premises().len() {
        return Vec::new();
    }
    let count = r1.premises().len();
    let base_avoid = {
        let mut avoid = r1.variables();
        for var in r2.variables() {
            if !avoid.contains(&var) {
                avoid.push(var);
            }
        }
        avoid
    };
    let remaining1: Vec<Sentence> = r1.sentences().cloned().collect();
    let remaining2: Vec<Sentence> = r2.sentences().cloned().collect();
    let conclusion_ctx = AuCtx {
        lexicon,
        allow_free: false,
        exhaustive_middle_limit: options.exhaustive_middle_limit,
        base_avoid: base_avoid.clone(),
        remaining1: remaining1.clone(),
        remaining2: remaining2.clone(),
    };
    let premise_ctx = AuCtx {
        lexicon,
        allow_free: true,
        exhaustive_middle_limit: options.exhaustive_middle_limit,
        base_avoid,
        remaining1,
        remaining2,
    };

    let mut out: Vec<RuleAntiUnifier> = Vec::new();
    let conclusions = anti_unify_inner(
        r1.conclusion(),
        r2.conclusion(),
        &BiSubstitution::new(),
        &conclusion_ctx,
    );
    for (general_conclusion, conclusion_bisub) in conclusions {
        for order in permutations(count) {
            let mut states: Vec<(Vec<Sentence>, BiSubstitution)> =
                vec![(Vec::new(), conclusion_bisub.clone())];
            for (index, premise) in r1.premises().iter().enumerate() {
                let other = &r2.premises()[order[index]];
                let mut next = Vec::new();
                for (built, bisub) in &states {
                    for (general, new_bisub) in
                        anti_unify_inner(premise, other, bisub, &premise_ctx)
                    {
                        let mut premises = built.clone();
                        premises.push(general);
                        next.push((premises, new_bisub));
                    }
                }
                states = next;
                if states.is_empty() {
                    break;
                }
            }
            for (premises, bisub) in states {
                let candidate = Rule::new(premises, general_conclusion.clone());
                let (normalized, bindings) = normalize_with_bindings(candidate, bisub);
                if !normalized.is_valid() {
                    continue;
                }
                if out.iter().any(|existing| existing.general == normalized) {
                    continue;
                }
                out.push(RuleAntiUnifier { general: normalized, bindings });
            }
        }
    }
    out
}

/// Normalize a candidate rule, folding merged variables' segment pairs
/// together so the bi-substitution keeps recovering the inputs.
fn normalize_with_bindings(rule: Rule, bisub: BiSubstitution) -> (Rule, BiSubstitution) {
    let mut rule = rule;
    let mut bisub = bisub;
    while let Some((keep, drop)) = redundant_pair(&rule) {
        rule = merge_adjacent_pair(&rule, keep, drop);
        bisub = bisub.merge_pair(keep, drop);
    }
    let bisub = bisub.restrict_to_rule(&rule);
    (rule, bisub)
}

#[cfg(test)]
mod tests {
    use super::{anti_unify, anti_unify_rules, AntiUnifier};
    use crate::inference::matching::Matchable;
    use crate::data::{Lexicon, Sentence};
    use crate::parser::{parse_rule, parse_sentence};

    fn sentence(lexicon: &Lexicon, text: &str) -> Sentence {
        parse_sentence(text, lexicon).expect("well-formed sentence")
    }

    fn assert_sound(au: &AntiUnifier, s1: &Sentence, s2: &Sentence) {
        assert!(
            au.general.is_more_general(s1),
            "generalization must cover the first input"
        );
        assert!(
            au.general.is_more_general(s2),
            "generalization must cover the second input"
        );
        assert_eq!(au.bindings.left().apply(&au.general), *s1, "left roundtrip");
        assert_eq!(au.bindings.right().apply(&au.general), *s2, "right roundtrip");
    }

    #[test]
    fn identical_inputs_generalize_to_themselves() {
        let lexicon = Lexicon::new();
        let s = sentence(&lexicon, "dax $MAPS_TO$ RED");
        let results = anti_unify(&s, &s, &lexicon);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].general, s);
        assert!(results[0].bindings.is_empty());
    }

    #[test]
    fn single_difference_becomes_one_variable() {
        let lexicon = Lexicon::new();
        let s1 = sentence(&lexicon, "dax $MAPS_TO$ RED");
        let s2 = sentence(&lexicon, "lug $MAPS_TO$ RED");
        let results = anti_unify(&s1, &s2, &lexicon);
        assert!(!results.is_empty());
        for au in &results {
            assert_sound(au, &s1, &s2);
        }
        let best = &results[0];
        assert_eq!(best.bindings.len(), 1);
        assert_eq!(best.general.len(), 3);
    }

    #[test]
    fn repeated_pairs_share_a_variable() {
        let lexicon = Lexicon::new();
        let s1 = sentence(&lexicon, "RED RED RED");
        let s2 = sentence(&lexicon, "BLUE BLUE BLUE");
        let results = anti_unify(&s1, &s2, &lexicon);
        for au in &results {
            assert_sound(au, &s1, &s2);
        }
        assert!(
            results.iter().any(|au| {
                au.general.len() == 3 && au.general.variables().len() == 1
            }),
            "the shared-variable generalization [X] [X] [X] must be found"
        );
    }

    #[test]
    fn prefix_inputs_absorb_a_shared_token() {
        let lexicon = Lexicon::new();
        let s1 = sentence(&lexicon, "w1 w2");
        let s2 = sentence(&lexicon, "w1 w2 w3");
        let results = anti_unify(&s1, &s2, &lexicon);
        assert_eq!(results.len(), 1);
        assert_sound(&results[0], &s1, &s2);
        // The generalization is `w1 [X]` with X covering (`w2`, `w2 w3`).
        assert_eq!(results[0].general.len(), 2);
        assert_eq!(results[0].bindings.len(), 1);
    }

    #[test]
    fn template_mismatch_yields_nothing() {
        let lexicon = Lexicon::new();
        let s1 = sentence(&lexicon, "dax $MAPS_TO$ RED");
        let s2 = sentence(&lexicon, "dax RED");
        assert!(anti_unify(&s1, &s2, &lexicon).is_empty());
    }

    #[test]
    fn long_middles_follow_the_common_subsequence() {
        let lexicon = Lexicon::new();
        let s1 = sentence(&lexicon, "a1 k w1 w2 w3 w4 w5 w6 k b1");
        let s2 = sentence(&lexicon, "a2 k w1 w2 w3 w4 w5 w6 k b2");
        let results = anti_unify(&s1, &s2, &lexicon);
        assert!(!results.is_empty());
        for au in &results {
            assert_sound(au, &s1, &s2);
        }
        // The shared k-delimited middle must survive in some result.
        let shared = sentence(&lexicon, "w1 w2 w3 w4 w5 w6");
        assert!(results.iter().any(|au| {
            crate::data::subslice_occurrences(au.general.tokens(), shared.tokens()) == 1
        }));
    }

    #[test]
    fn miniscan_fep_rule_generalizes() {
        let lexicon = Lexicon::new();
        let r1 = parse_rule(
            "dax $MAPS_TO$ RED\n---\ndax fep $MAPS_TO$ RED RED RED",
            &lexicon,
        )
        .expect("parse");
        let r2 = parse_rule(
            "lug $MAPS_TO$ BLUE\n---\nlug fep $MAPS_TO$ BLUE BLUE BLUE",
            &lexicon,
        )
        .expect("parse");
        let results = anti_unify_rules(&r1, &r2, &lexicon);
        assert_eq!(results.len(), 1, "exactly one valid generalization");
        let expected = parse_rule(
            "[A] $MAPS_TO$ [B]\n---\n[A] fep $MAPS_TO$ [B] [B] [B]",
            &lexicon,
        )
        .expect("parse");
        assert_eq!(results[0].general, expected);

        // The bi-substitution recovers both concrete rules.
        let left = results[0].bindings.left();
        assert_eq!(left.apply(results[0].general.conclusion()), *r1.conclusion());
        let right = results[0].bindings.right();
        assert_eq!(right.apply(&results[0].general.premises()[0]), r2.premises()[0]);
    }

    #[test]
    fn rule_anti_unification_requires_matching_arity() {
        let lexicon = Lexicon::new();
        let r1 = parse_rule("p\n---\nc", &lexicon).expect("parse");
        let r2 = parse_rule("p\nq\n---\nc", &lexicon).expect("parse");
        assert!(anti_unify_rules(&r1, &r2, &lexicon).is_empty());
    }
}
