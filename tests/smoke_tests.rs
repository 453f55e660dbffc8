//! End-to-end scenarios exercising the public surface: matching
//! multiplicity, bounded unification, rule generalization, both provers,
//! and proof-graph validity.

use glossa::{
    anti_unify_rules, match_sentences, parse_rule, parse_sentence, unify, BackwardProver,
    ForwardOutcome, Lexicon, NaiveForwardProver, Proof, ProofError, ReteNetwork, Rule,
    Sentence,
};
use indexmap::IndexSet;

fn sentence(lexicon: &Lexicon, text: &str) -> Sentence {
    parse_sentence(text, lexicon).expect("well-formed sentence")
}

fn rule(lexicon: &Lexicon, text: &str) -> Rule {
    parse_rule(text, lexicon).expect("well-formed rule")
}

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
fn match_multiplicity() {
    let lexicon = Lexicon::new();
    let pattern = sentence(&lexicon, "[A] kiki [C] $MAPS_TO$ [D] [B]");
    let instance = sentence(
        &lexicon,
        "wif kiki dax blicket lug $MAPS_TO$ RED BLUE RED GREEN",
    );
    let results = match_sentences(&pattern, &instance);
    assert_eq!(results.len(), 3);
    for subst in &results {
        assert_eq!(subst.apply(&pattern), instance, "match soundness");
    }
    // The three results differ exactly in the [D]/[B] split.
    let d = lexicon.variable("D").expect("seeded");
    let splits: Vec<usize> = results
        .iter()
        .map(|subst| subst.get(d).expect("bound").len())
        .collect();
    assert_eq!(splits, vec![1, 2, 3]);
}

#[test]
fn unify_infinite_family_bounded() {
    let lexicon = Lexicon::new();
    let left = sentence(&lexicon, "hello [X]");
    let right = sentence(&lexicon, "[X] hello");
    let x = lexicon.variable("X").expect("seeded");

    let results = unify(&left, &right, 10);
    assert_eq!(results.len(), 10);
    let hello = lexicon.word("hello").expect("interned");
    for (index, subst) in results.iter().enumerate() {
        let value = subst.get(x).expect("bound");
        assert_eq!(value.len(), index + 1);
        assert!(value.iter().all(|token| token == hello));
        assert_eq!(subst.apply(&left), subst.apply(&right), "unify soundness");
    }
}

#[test]
fn anti_unify_miniscan_fep() {
    let lexicon = Lexicon::new();
    let r1 = rule(
        &lexicon,
        "dax $MAPS_TO$ RED\n---\ndax fep $MAPS_TO$ RED RED RED",
    );
    let r2 = rule(
        &lexicon,
        "lug $MAPS_TO$ BLUE\n---\nlug fep $MAPS_TO$ BLUE BLUE BLUE",
    );
    let results = anti_unify_rules(&r1, &r2, &lexicon);
    assert_eq!(results.len(), 1);
    let expected = rule(
        &lexicon,
        "[A] $MAPS_TO$ [B]\n---\n[A] fep $MAPS_TO$ [B] [B] [B]",
    );
    assert_eq!(results[0].general, expected);
}

#[test]
fn backward_prover_miniscan_ground_truth() {
    let lexicon = Lexicon::new();
    let mut prover = BackwardProver::new();
    for ground_truth in miniscan(&lexicon) {
        prover.add_rule(ground_truth, 1.0);
    }
    let goal = sentence(&lexicon, "zup fep $MAPS_TO$ [X]");
    let answers = prover.prove(&goal, &lexicon);
    assert!(!answers.is_empty());
    let x = lexicon.variable("X").expect("seeded");
    assert_eq!(
        answers[0].0.get(x),
        Some(&sentence(&lexicon, "YELLOW YELLOW YELLOW")),
        "top-ranked substitution binds [X] to YELLOW YELLOW YELLOW"
    );
}

#[test]
fn rete_forward_correctness() {
    let lexicon = Lexicon::new();
    let rules = vec![
        (rule(&lexicon, "[A] is [B]\n---\n[A] be [B]"), 0.1),
        (rule(&lexicon, "---\nrough people be nice"), 0.1),
        (
            rule(
                &lexicon,
                "[A] be rough\nrough people be nice\n---\n[A] be nice",
            ),
            0.1,
        ),
    ];
    let mut network = ReteNetwork::new(rules);
    let assumptions = vec![sentence(&lexicon, "harry is rough")];
    let mut facts = IndexSet::new();
    let outcome = network.run(&assumptions, |fact, _| {
        facts.insert(fact.clone());
        true
    });
    assert!(matches!(outcome, ForwardOutcome::Saturated { .. }));
    assert!(facts.contains(&sentence(&lexicon, "harry be nice")));
}

#[test]
fn rete_agrees_with_naive_reference() {
    let lexicon = Lexicon::new();
    let rules = vec![
        (rule(&lexicon, "[A] is [B]\n---\n[A] be [B]"), 0.2),
        (rule(&lexicon, "---\nrough people be nice"), 0.1),
        (
            rule(
                &lexicon,
                "[A] be rough\nrough people be nice\n---\n[A] be nice",
            ),
            0.15,
        ),
        (rule(&lexicon, "[A] be nice\n---\neveryone likes [A]"), 0.3),
    ];
    let assumptions = vec![
        sentence(&lexicon, "harry is rough"),
        sentence(&lexicon, "sally is rough"),
    ];

    let mut rete_facts = IndexSet::new();
    ReteNetwork::new(rules.clone()).run(&assumptions, |fact, _| {
        rete_facts.insert(fact.clone());
        true
    });

    let mut naive_facts = IndexSet::new();
    NaiveForwardProver::new(rules).run(&assumptions, |fact, _| {
        naive_facts.insert(fact.clone());
        true
    });

    let rete_set: IndexSet<Sentence> = rete_facts;
    assert_eq!(
        rete_set.len(),
        naive_facts.len(),
        "both provers emit the same number of facts"
    );
    for fact in &naive_facts {
        assert!(rete_set.contains(fact), "missing {fact:?}");
    }
}

#[test]
fn proof_validity_and_missing_premise() {
    let lexicon = Lexicon::new();
    let sent1 = sentence(&lexicon, "harry is rough");
    let sent2 = sentence(&lexicon, "rough people be nice");
    let sent3 = sentence(&lexicon, "harry be nice");
    let step = Rule::new(vec![sent1.clone(), sent2.clone()], sent3.clone());

    let mut proof = Proof::from_assumptions([sent1, sent2]).expect("concrete");
    proof.apply(&step).expect("premises present");
    assert!(proof.is_valid());
    assert_eq!(proof.sinks(), vec![&sent3]);

    let mut partial = Proof::from_assumptions([sentence(&lexicon, "harry is rough")])
        .expect("concrete");
    assert!(matches!(
        partial.apply(&step),
        Err(ProofError::MissingPremise(_))
    ));
}

#[test]
fn cancellation_short_circuits_on_goal() {
    let lexicon = Lexicon::new();
    let rules = vec![
        (rule(&lexicon, "[A] is [B]\n---\n[A] be [B]"), 0.1),
        (rule(&lexicon, "[A] be [B]\n---\n[B] describes [A]"), 0.1),
    ];
    let goal = sentence(&lexicon, "harry be rough");
    let mut network = ReteNetwork::new(rules);
    let assumptions = vec![sentence(&lexicon, "harry is rough")];
    let mut seen_after_goal = 0usize;
    let mut reached = false;
    let outcome = network.run(&assumptions, |fact, _| {
        if reached {
            seen_after_goal += 1;
        }
        if fact == &goal {
            reached = true;
            return false;
        }
        true
    });
    assert!(reached);
    assert_eq!(seen_after_goal, 0, "nothing is derived past the cancellation");
    assert!(matches!(outcome, ForwardOutcome::Cancelled { .. }));
}
