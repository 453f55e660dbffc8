//! Core data model of the symbolic language: tokens, vocabularies,
//! sentences, templates, substitutions, and rules.

pub mod rule;
pub mod sentence;
pub mod substitution;
pub mod template;
pub mod token;
pub mod vocab;

pub use rule::Rule;
pub use sentence::{
    common_prefix_len, common_suffix_len, subslice_occurrences, Sentence, SentenceView,
};
pub use substitution::{AlphaConversion, BindingError, Substitution, VariableBinding};
pub use template::{compose, decompose, RuleTemplate, SentenceTemplate, TemplateSlot};
pub use token::{Token, TokenKind};
pub use vocab::{Lexicon, LexiconCheckpoint, VocabError, Vocabulary};
