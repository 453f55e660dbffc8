//! Unification: substitutions making two variable-bearing sentences
//! identical.
//!
//! Word-level unification is unification modulo concatenation, which has
//! infinite solution families; the search is therefore depth-bounded.  A
//! breadth-first queue of subproblems applies the classic three-way
//! rewriting of leading variables; raising `depth_limit` yields more (and
//! longer) unifiers, in queue order.

use std::collections::VecDeque;

use crate::data::template::decompose;
use crate::data::{
    common_prefix_len, common_suffix_len, Sentence, Substitution, Token, VariableBinding,
};

use super::matching::match_sentences;

struct Subproblem {
    left: Sentence,
    right: Sentence,
    subst: Substitution,
    depth: usize,
}

/// All substitutions σ with `σ(s1)` identical to `σ(s2)`, up to
/// `depth_limit` variable splits per derivation.
pub fn unify(s1: &Sentence, s2: &Sentence, depth_limit: usize) -> Vec<Substitution> {
    if s1.is_concrete() && s2.is_concrete() {
        if s1 == s2 {
            return vec![Substitution::new()];
        }
        return Vec::new();
    }
    if s2.is_concrete() {
        return match_sentences(s1, s2);
    }
    if s1.is_concrete() {
        return match_sentences(s2, s1);
    }
    let (template1, segments1) = decompose(s1);
    let (template2, segments2) = decompose(s2);
    if template1 != template2 {
        return Vec::new();
    }
    let mut partial = vec![Substitution::new()];
    for (a, b) in segments1.iter().zip(segments2.iter()) {
        let mut next = Vec::new();
        for subst in &partial {
            for delta in unify_segments(&subst.apply(a), &subst.apply(b), depth_limit) {
                next.push(subst.compose(&delta));
            }
        }
        if next.is_empty() {
            return Vec::new();
        }
        partial = next;
    }
    partial
}

/// Unify two sentence lists pairwise left-to-right, applying each partial
/// substitution to the remaining tails before recursing.
pub fn unify_lists(xs: &[Sentence], ys: &[Sentence], depth_limit: usize) -> Vec<Substitution> {
    if xs.len() != ys.len() {
        return Vec::new();
    }
    let (Some(x), Some(y)) = (xs.first(), ys.first()) else {
        return vec![Substitution::new()];
    };
    let mut out = Vec::new();
    for head in unify(x, y, depth_limit) {
        let rest_xs: Vec<Sentence> = xs[1..].iter().map(|s| head.apply(s)).collect();
        let rest_ys: Vec<Sentence> = ys[1..].iter().map(|s| head.apply(s)).collect();
        for tail in unify_lists(&rest_xs, &rest_ys, depth_limit) {
            out.push(head.compose(&tail));
        }
    }
    out
}

/// Breadth-first subproblem search over special-free segments.
fn unify_segments(a: &Sentence, b: &Sentence, depth_limit: usize) -> Vec<Substitution> {
    let mut results = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(Subproblem {
        left: a.clone(),
        right: b.clone(),
        subst: Substitution::new(),
        depth: 0,
    });
    while let Some(problem) = queue.pop_front() {
        let (left, right) = strip_common(problem.left.tokens(), problem.right.tokens());
        if left.is_empty() && right.is_empty() {
            results.push(problem.subst);
            continue;
        }
        if left.is_empty() || right.is_empty() {
            // Bindings are non-empty, so an exhausted side is a dead end.
            continue;
        }
        // A lone variable absent from the other side binds to all of it.
        if left.len() == 1 && left[0].is_variable() && !right.contains(&left[0]) {
            let binding =
                VariableBinding::new_unchecked(left[0], Sentence::from_slice(right));
            results.push(problem.subst.compose(&binding.into_substitution()));
            continue;
        }
        if right.len() == 1 && right[0].is_variable() && !left.contains(&right[0]) {
            let binding =
                VariableBinding::new_unchecked(right[0], Sentence::from_slice(left));
            results.push(problem.subst.compose(&binding.into_substitution()));
            continue;
        }
        if problem.depth >= depth_limit {
            continue;
        }
        let head_left = left[0];
        let head_right = right[0];
        // The three-way rewriting of leading tokens.  Stripping already
        // removed equal heads, so two non-variables here cannot agree.
        let successors: Vec<VariableBinding> = match (
            head_left.is_variable(),
            head_right.is_variable(),
        ) {
            (true, true) => vec![
                VariableBinding::new_unchecked(
                    head_left,
                    Sentence::new([head_right]),
                ),
                VariableBinding::new_unchecked(
                    head_left,
                    Sentence::new([head_right, head_left]),
                ),
                VariableBinding::new_unchecked(
                    head_right,
                    Sentence::new([head_left, head_right]),
                ),
            ],
            (true, false) => vec![
                VariableBinding::new_unchecked(head_left, Sentence::new([head_right])),
                VariableBinding::new_unchecked(
                    head_left,
                    Sentence::new([head_right, head_left]),
                ),
            ],
            (false, true) => vec![
                VariableBinding::new_unchecked(head_right, Sentence::new([head_left])),
                VariableBinding::new_unchecked(
                    head_right,
                    Sentence::new([head_left, head_right]),
                ),
            ],
            (false, false) => Vec::new(),
        };
        for binding in successors {
            queue.push_back(Subproblem {
                left: binding.apply_slice(left),
                right: binding.apply_slice(right),
                subst: problem.subst.compose(&binding.into_substitution()),
                depth: problem.depth + 1,
            });
        }
    }
    results
}

fn strip_common<'a>(a: &'a [Token], b: &'a [Token]) -> (&'a [Token], &'a [Token]) {
    let prefix = common_prefix_len(a, b);
    let suffix = common_suffix_len(&a[prefix..], &b[prefix..]);
    (&a[prefix..a.len() - suffix], &b[prefix..b.len() - suffix])
}

#[cfg(test)]
mod tests {
    use super::{unify, unify_lists};
    use crate::data::{Lexicon, Sentence};
    use crate::parser::parse_sentence;

    fn sentence(lexicon: &Lexicon, text: &str) -> Sentence {
        parse_sentence(text, lexicon).expect("well-formed sentence")
    }

    #[test]
    fn soundness_on_every_result() {
        let lexicon = Lexicon::new();
        let a = sentence(&lexicon, "[A] kiki dax");
        let b = sentence(&lexicon, "wug [B]");
        for subst in unify(&a, &b, 6) {
            assert_eq!(subst.apply(&a), subst.apply(&b));
        }
    }

    #[test]
    fn concrete_sides_reduce_to_matching() {
        let lexicon = Lexicon::new();
        let open = sentence(&lexicon, "[A] kiki [B]");
        let ground = sentence(&lexicon, "dax kiki lug wug");
        let results = unify(&open, &ground, 4);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].apply(&open), ground);

        let mirrored = unify(&ground, &open, 4);
        assert_eq!(mirrored, results);
    }

    #[test]
    fn infinite_family_is_depth_bounded() {
        let lexicon = Lexicon::new();
        let a = sentence(&lexicon, "hello [X]");
        let b = sentence(&lexicon, "[X] hello");
        let x = lexicon.variable("X").expect("interned");

        let results = unify(&a, &b, 10);
        assert_eq!(results.len(), 10);
        for (index, subst) in results.iter().enumerate() {
            let value = subst.get(x).expect("bound");
            assert_eq!(value.len(), index + 1, "n-th unifier has n hellos");
            assert_eq!(subst.apply(&a), subst.apply(&b));
        }

        assert_eq!(unify(&a, &b, 3).len(), 3, "budget controls family size");
    }

    #[test]
    fn template_mismatch_fails_fast() {
        let lexicon = Lexicon::new();
        let a = sentence(&lexicon, "[A] $MAPS_TO$ [B]");
        let b = sentence(&lexicon, "[A] [B]");
        assert!(unify(&a, &b, 8).is_empty());
    }

    #[test]
    fn shared_variables_constrain_segments() {
        let lexicon = Lexicon::new();
        let a = sentence(&lexicon, "[A] $MAPS_TO$ [A]");
        let b = sentence(&lexicon, "dax $MAPS_TO$ [B]");
        let results = unify(&a, &b, 4);
        assert!(!results.is_empty());
        for subst in &results {
            assert_eq!(subst.apply(&a), subst.apply(&b));
        }
    }

    #[test]
    fn list_unification_threads_partial_substitutions() {
        let lexicon = Lexicon::new();
        let xs = vec![
            sentence(&lexicon, "[A] wug"),
            sentence(&lexicon, "[A] zug"),
        ];
        let ys = vec![
            sentence(&lexicon, "dax wug"),
            sentence(&lexicon, "[B] zug"),
        ];
        let results = unify_lists(&xs, &ys, 4);
        assert!(!results.is_empty());
        for subst in &results {
            for (x, y) in xs.iter().zip(ys.iter()) {
                assert_eq!(subst.apply(x), subst.apply(y));
            }
        }
        assert!(unify_lists(&xs, &ys[..1], 4).is_empty(), "length mismatch");
    }
}
