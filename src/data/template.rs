//! Sentence and rule templates: the special-symbol skeleton used as a
//! cheap pre-filter before matching, unification, and anti-unification.
//!
//! A template records the special symbols of a sentence in order, with
//! every maximal run of words and variables collapsed to a `Gap`.  Equal
//! templates are a necessary condition for two sentences to match or
//! unify.

use super::rule::Rule;
use super::sentence::Sentence;
use super::token::Token;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateSlot {
    Special(i32),
    Gap,
}

/// Structural skeleton of a sentence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SentenceTemplate {
    slots: Vec<TemplateSlot>,
}

impl SentenceTemplate {
    pub fn of(sentence: &Sentence) -> Self {
        let mut slots = Vec::new();
        let mut in_gap = false;
        for token in sentence.iter() {
            if token.is_special() {
                slots.push(TemplateSlot::Special(token.id()));
                in_gap = false;
            } else if !in_gap {
                slots.push(TemplateSlot::Gap);
                in_gap = true;
            }
        }
        Self { slots }
    }

    pub fn slots(&self) -> &[TemplateSlot] {
        &self.slots
    }

    pub fn gap_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, TemplateSlot::Gap))
            .count()
    }
}

/// Split a sentence into its template and the word/variable segments
/// between special symbols, one segment per `Gap` slot.
pub fn decompose(sentence: &Sentence) -> (SentenceTemplate, Vec<Sentence>) {
    let template = SentenceTemplate::of(sentence);
    let mut segments = Vec::with_capacity(template.gap_count());
    let mut current: Vec<Token> = Vec::new();
    for token in sentence.iter() {
        if token.is_special() {
            if !current.is_empty() {
                segments.push(Sentence::new(current.drain(..)));
            }
        } else {
            current.push(token);
        }
    }
    if !current.is_empty() {
        segments.push(Sentence::new(current));
    }
    (template, segments)
}

/// Rebuild a sentence from a template and one segment per gap.  Returns
/// `None` when the segment count does not fit the template.
pub fn compose(template: &SentenceTemplate, segments: &[Sentence]) -> Option<Sentence> {
    if template.gap_count() != segments.len() {
        return None;
    }
    let mut tokens = Vec::new();
    let mut next_segment = segments.iter();
    for slot in template.slots() {
        match slot {
            TemplateSlot::Special(id) => tokens.push(Token::special(*id)),
            TemplateSlot::Gap => {
                let segment = next_segment.next()?;
                tokens.extend(segment.iter());
            }
        }
    }
    Some(Sentence::new(tokens))
}

/// Template of a rule: the multiset of premise templates plus the
/// conclusion template.  Premise templates are kept sorted so that rules
/// differing only in premise order share a template.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RuleTemplate {
    premises: Vec<SentenceTemplate>,
    conclusion: SentenceTemplate,
}

impl RuleTemplate {
    pub fn of(rule: &Rule) -> Self {
        let mut premises: Vec<SentenceTemplate> =
            rule.premises().iter().map(SentenceTemplate::of).collect();
        premises.sort();
        Self { premises, conclusion: SentenceTemplate::of(rule.conclusion()) }
    }

    pub fn premise_templates(&self) -> &[SentenceTemplate] {
        &self.premises
    }

    pub fn conclusion_template(&self) -> &SentenceTemplate {
        &self.conclusion
    }
}

#[cfg(test)]
mod tests {
    use super::{compose, decompose, RuleTemplate, SentenceTemplate, TemplateSlot};
    use crate::data::rule::Rule;
    use crate::data::vocab::Lexicon;
    use crate::parser::{parse_rule, parse_sentence};

    #[test]
    fn runs_collapse_to_one_gap() {
        let lexicon = Lexicon::new();
        let s = parse_sentence("dax [A] fep $MAPS_TO$ RED RED", &lexicon).expect("parse");
        let template = SentenceTemplate::of(&s);
        let maps_to = lexicon.special("MAPS_TO").expect("interned");
        assert_eq!(
            template.slots(),
            &[
                TemplateSlot::Gap,
                TemplateSlot::Special(maps_to.id()),
                TemplateSlot::Gap,
            ]
        );
    }

    #[test]
    fn decompose_compose_roundtrip() {
        let lexicon = Lexicon::new();
        let s = parse_sentence("$IF$ [A] is red $THEN$ [A] glows", &lexicon).expect("parse");
        let (template, segments) = decompose(&s);
        assert_eq!(segments.len(), 2);
        assert_eq!(compose(&template, &segments), Some(s));
    }

    #[test]
    fn templates_prefilter_mismatches() {
        let lexicon = Lexicon::new();
        let a = parse_sentence("dax $MAPS_TO$ RED", &lexicon).expect("parse");
        let b = parse_sentence("dax is RED", &lexicon).expect("parse");
        assert_ne!(SentenceTemplate::of(&a), SentenceTemplate::of(&b));
    }

    #[test]
    fn rule_template_ignores_premise_order() {
        let lexicon = Lexicon::new();
        let r1 = parse_rule("a $P$ b\nc d\n---\ne", &lexicon).expect("parse");
        let r2 = parse_rule("c d\na $P$ b\n---\ne", &lexicon).expect("parse");
        assert_eq!(RuleTemplate::of(&r1), RuleTemplate::of(&r2));
        let r3 = parse_rule("c d\n---\ne", &lexicon).expect("parse");
        assert_ne!(RuleTemplate::of(&r1), RuleTemplate::of(&r3));
        let fact = Rule::new(vec![], parse_sentence("e", &lexicon).expect("parse"));
        assert!(RuleTemplate::of(&fact).premise_templates().is_empty());
    }
}
