use thiserror::Error;

use crate::data::{Lexicon, Rule, Sentence, Token};

/// A parse failure, carrying the (1-based) source line where it occurred;
/// line 0 means the input was a bare sentence or rule string.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("parse error at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

/// Parse one whitespace-separated token: `[NAME]` is a variable, `$NAME$`
/// a special symbol, anything else a word.
fn parse_token(text: &str, lexicon: &Lexicon, line: usize) -> Result<Token, ParseError> {
    if let Some(inner) = text.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        return lexicon
            .variable(inner)
            .map_err(|err| ParseError::new(line, err.to_string()));
    }
    if text.len() > 2 {
        if let Some(inner) = text.strip_prefix('$').and_then(|rest| rest.strip_suffix('$')) {
            return lexicon
                .special(inner)
                .map_err(|err| ParseError::new(line, err.to_string()));
        }
    }
    lexicon
        .word(text)
        .map_err(|err| ParseError::new(line, err.to_string()))
}

fn parse_sentence_at(
    text: &str,
    lexicon: &Lexicon,
    line: usize,
) -> Result<Sentence, ParseError> {
    text.split_whitespace()
        .map(|token| parse_token(token, lexicon, line))
        .collect::<Result<Sentence, ParseError>>()
}

/// Parse a sentence from its display syntax.
pub fn parse_sentence(text: &str, lexicon: &Lexicon) -> Result<Sentence, ParseError> {
    parse_sentence_at(text, lexicon, 0)
}

/// Parse a rule: premise lines, a `---` separator line, one conclusion
/// line.  Blank lines are ignored.
pub fn parse_rule(text: &str, lexicon: &Lexicon) -> Result<Rule, ParseError> {
    parse_rule_block(
        &text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.to_string()))
            .collect::<Vec<_>>(),
        lexicon,
    )
}

/// Parse a rule from numbered source lines.
fn parse_rule_block(
    lines: &[(usize, String)],
    lexicon: &Lexicon,
) -> Result<Rule, ParseError> {
    let first_line = lines.first().map(|(number, _)| *number).unwrap_or(0);
    let mut premises = Vec::new();
    let mut conclusion: Option<Sentence> = None;
    let mut seen_separator = false;
    for (number, raw) in lines {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "---" {
            if seen_separator {
                return Err(ParseError::new(*number, "duplicate `---` separator"));
            }
            seen_separator = true;
            continue;
        }
        let sentence = parse_sentence_at(trimmed, lexicon, *number)?;
        if seen_separator {
            if conclusion.is_some() {
                return Err(ParseError::new(
                    *number,
                    "rule has more than one conclusion line",
                ));
            }
            conclusion = Some(sentence);
        } else {
            premises.push(sentence);
        }
    }
    if !seen_separator {
        return Err(ParseError::new(first_line, "rule is missing its `---` separator"));
    }
    match conclusion {
        Some(conclusion) => Ok(Rule::new(premises, conclusion)),
        None => Err(ParseError::new(first_line, "rule is missing a conclusion line")),
    }
}

/// A command encountered outside list sections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `set(name).`
    Set(String),
    /// `assign(name, value).`
    Assign(String, String),
}

/// A list section: `list(name).` followed by raw lines up to
/// `end_of_list.`.  Blank lines are preserved because rule entries are
/// blank-line separated blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListSection {
    pub name: String,
    pub lines: Vec<(usize, String)>,
}

impl ListSection {
    /// One sentence per non-blank line.
    pub fn sentences(&self, lexicon: &Lexicon) -> Result<Vec<Sentence>, ParseError> {
        self.lines
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(number, text)| parse_sentence_at(text.trim(), lexicon, *number))
            .collect()
    }

    /// Weighted rules: blank-line separated blocks, each a rule in the
    /// `premises / --- / conclusion` syntax with an optional trailing
    /// `weight <w>` line.
    pub fn weighted_rules(&self, lexicon: &Lexicon) -> Result<Vec<(Rule, f64)>, ParseError> {
        let mut rules = Vec::new();
        for block in split_blocks(&self.lines) {
            let mut body = block;
            let mut weight = 1.0;
            if let Some((number, last)) = body.last() {
                if let Some(value) = last.trim().strip_prefix("weight ") {
                    weight = value.trim().parse::<f64>().map_err(|_| {
                        ParseError::new(*number, format!("invalid weight value `{value}`"))
                    })?;
                    if !(0.0..=1.0).contains(&weight) {
                        return Err(ParseError::new(
                            *number,
                            format!("rule weight {weight} is outside [0, 1]"),
                        ));
                    }
                    body = &body[..body.len() - 1];
                }
            }
            rules.push((parse_rule_block(body, lexicon)?, weight));
        }
        Ok(rules)
    }
}

/// Split preserved lines into blank-line separated blocks.
fn split_blocks(lines: &[(usize, String)]) -> Vec<&[(usize, String)]> {
    let mut blocks = Vec::new();
    let mut start = 0;
    for (index, (_, text)) in lines.iter().enumerate() {
        if text.trim().is_empty() {
            if index > start {
                blocks.push(&lines[start..index]);
            }
            start = index + 1;
        }
    }
    if start < lines.len() {
        blocks.push(&lines[start..]);
    }
    blocks
}

/// A parsed input file: commands plus list sections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputFile {
    pub commands: Vec<Command>,
    pub lists: Vec<ListSection>,
}

impl InputFile {
    pub fn flag(&self, name: &str) -> bool {
        self.commands
            .iter()
            .any(|command| matches!(command, Command::Set(set) if set == name))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.commands.iter().find_map(|command| match command {
            Command::Assign(key, value) if key == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn list(&self, name: &str) -> Option<&ListSection> {
        self.lists.iter().find(|list| list.name == name)
    }
}

/// Parser for the input-file format.
#[derive(Clone, Debug, Default)]
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, source: &str) -> Result<InputFile, ParseError> {
        let mut file = InputFile::default();
        let mut current: Option<ListSection> = None;
        for (index, raw) in source.lines().enumerate() {
            let number = index + 1;
            let line = strip_comment(raw);
            let trimmed = line.trim();
            if current.is_some() {
                if trimmed == "end_of_list." {
                    if let Some(done) = current.take() {
                        file.lists.push(done);
                    }
                } else if let Some(section) = current.as_mut() {
                    section.lines.push((number, line.to_string()));
                }
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }
            if let Some(name) = command_argument(trimmed, "list") {
                current = Some(ListSection { name, lines: Vec::new() });
            } else if let Some(name) = command_argument(trimmed, "set") {
                file.commands.push(Command::Set(name));
            } else if let Some(arguments) = command_argument(trimmed, "assign") {
                let (key, value) = arguments.split_once(',').ok_or_else(|| {
                    ParseError::new(number, "assign takes `assign(name, value).`")
                })?;
                file.commands.push(Command::Assign(
                    key.trim().to_string(),
                    value.trim().to_string(),
                ));
            } else {
                return Err(ParseError::new(
                    number,
                    format!("expected a command or list section, found `{trimmed}`"),
                ));
            }
        }
        if let Some(section) = current {
            return Err(ParseError::new(
                source.lines().count(),
                format!("list `{}` is missing `end_of_list.`", section.name),
            ));
        }
        Ok(file)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('%') {
        Some(index) => &line[..index],
        None => line,
    }
}

/// For `keyword(argument).` return the argument.
fn command_argument(line: &str, keyword: &str) -> Option<String> {
    let rest = line.strip_prefix(keyword)?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(").")?;
    Some(inner.trim().to_string())
}
