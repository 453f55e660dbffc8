//! Parsing of the surface syntax: sentences, rules, and input files.
//!
//! Sentences are whitespace-separated tokens (`word`, `[VARIABLE]`,
//! `$SPECIAL$`); rules are premise lines, a `---` separator, and one
//! conclusion line.  Input files follow the command/list-section format
//! (`set(...)`, `assign(...)`, `list(...)` ... `end_of_list.`).

mod syntax;

pub use syntax::{
    parse_rule, parse_sentence, Command, InputFile, ListSection, ParseError, Parser,
};
