//! Interned vocabularies for words, variables, and special symbols.
//!
//! Each vocabulary is a bijection between admissible strings and positive
//! integer ids, append-only during a run.  The `Lexicon` aggregates the
//! three vocabularies and is the explicit context object passed wherever
//! tokens are minted or rendered; the core has no implicit globals.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::{Token, TokenKind};

static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s\[\]$]+$").expect("word pattern"));
static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]+$").expect("variable pattern"));

/// Errors raised by vocabulary operations.
#[derive(Debug, Error)]
pub enum VocabError {
    #[error("inadmissible {kind:?} name `{name}`")]
    InadmissibleName { kind: TokenKind, name: String },
    #[error("checkpoint conflicts with in-memory vocabulary at id {id}: have `{current}`, checkpoint has `{replacement}`")]
    CheckpointConflict { id: i32, current: String, replacement: String },
    #[error("vocabulary i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("vocabulary serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A bijection between admissible strings and positive ids starting at 1.
#[derive(Debug)]
pub struct Vocabulary {
    kind: TokenKind,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    names: Vec<String>,
    ids: HashMap<String, i32>,
}

impl Vocabulary {
    pub fn new(kind: TokenKind) -> Self {
        Self { kind, inner: RwLock::new(Inner::default()) }
    }

    fn pattern(&self) -> &Regex {
        match self.kind {
            TokenKind::Variable => &VARIABLE_PATTERN,
            _ => &WORD_PATTERN,
        }
    }

    /// Intern `name`, returning its token.  Interning is stable: the same
    /// name always receives the same id.
    pub fn intern(&self, name: &str) -> Result<Token, VocabError> {
        if !self.pattern().is_match(name) {
            return Err(VocabError::InadmissibleName {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        Ok(self.intern_raw(name))
    }

    /// Intern a name that is known to be admissible (generated internally).
    pub(crate) fn intern_raw(&self, name: &str) -> Token {
        {
            let guard = self.inner.read().expect("vocabulary poisoned");
            if let Some(&id) = guard.ids.get(name) {
                return Token::new(id, self.kind);
            }
        }
        let mut guard = self.inner.write().expect("vocabulary poisoned");
        if let Some(&id) = guard.ids.get(name) {
            return Token::new(id, self.kind);
        }
        let id = guard.names.len() as i32 + 1;
        guard.names.push(name.to_string());
        guard.ids.insert(name.to_string(), id);
        Token::new(id, self.kind)
    }

    /// Look up an already-interned name without adding it.
    pub fn lookup(&self, name: &str) -> Option<Token> {
        let guard = self.inner.read().expect("vocabulary poisoned");
        guard.ids.get(name).map(|&id| Token::new(id, self.kind))
    }

    /// The name registered for `id`, if any.
    pub fn name(&self, id: i32) -> Option<String> {
        if id < 1 {
            return None;
        }
        let guard = self.inner.read().expect("vocabulary poisoned");
        guard.names.get(id as usize - 1).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("vocabulary poisoned").names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All names in id order.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.read().expect("vocabulary poisoned").names.clone()
    }

    /// Check that `names` extends the current contents: every name
    /// currently at id `i` must reappear at id `i`.
    fn validate_extension(&self, names: &[String]) -> Result<(), VocabError> {
        for name in names {
            if !self.pattern().is_match(name) {
                return Err(VocabError::InadmissibleName {
                    kind: self.kind,
                    name: name.clone(),
                });
            }
        }
        let guard = self.inner.read().expect("vocabulary poisoned");
        for (index, current) in guard.names.iter().enumerate() {
            match names.get(index) {
                Some(replacement) if replacement == current => {}
                other => {
                    return Err(VocabError::CheckpointConflict {
                        id: index as i32 + 1,
                        current: current.clone(),
                        replacement: other.cloned().unwrap_or_default(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Replace the contents with `names`, refusing any replacement that
    /// does not extend the current contents.
    pub fn reset(&self, names: Vec<String>) -> Result<(), VocabError> {
        self.validate_extension(&names)?;
        let mut guard = self.inner.write().expect("vocabulary poisoned");
        guard.ids = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index as i32 + 1))
            .collect();
        guard.names = names;
        Ok(())
    }
}

/// Persistent form of a lexicon: three ordered name lists in id order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconCheckpoint {
    pub words: Vec<String>,
    pub variables: Vec<String>,
    pub special_symbols: Vec<String>,
}

/// The three vocabularies of the symbolic language.
///
/// The variable vocabulary is pre-seeded with the single-letter names
/// `A..Z` so that single-letter variables have stable ids across runs.
#[derive(Debug)]
pub struct Lexicon {
    words: Vocabulary,
    variables: Vocabulary,
    specials: Vocabulary,
}

impl Lexicon {
    pub fn new() -> Self {
        let lexicon = Self {
            words: Vocabulary::new(TokenKind::Word),
            variables: Vocabulary::new(TokenKind::Variable),
            specials: Vocabulary::new(TokenKind::Special),
        };
        for letter in b'A'..=b'Z' {
            lexicon.variables.intern_raw(&(letter as char).to_string());
        }
        lexicon
    }

    pub fn words(&self) -> &Vocabulary {
        &self.words
    }

    pub fn variables(&self) -> &Vocabulary {
        &self.variables
    }

    pub fn specials(&self) -> &Vocabulary {
        &self.specials
    }

    pub fn word(&self, name: &str) -> Result<Token, VocabError> {
        self.words.intern(name)
    }

    pub fn variable(&self, name: &str) -> Result<Token, VocabError> {
        self.variables.intern(name)
    }

    pub fn special(&self, name: &str) -> Result<Token, VocabError> {
        self.specials.intern(name)
    }

    /// The registered name of a token, if it came from a vocabulary.
    pub fn name_of(&self, token: Token) -> Option<String> {
        match token.kind() {
            TokenKind::Word => self.words.name(token.id()),
            TokenKind::Variable => self.variables.name(token.id()),
            TokenKind::Special => self.specials.name(token.id()),
        }
    }

    /// Mint a variable whose id is not in `avoid`, interning a new name if
    /// every existing candidate collides.
    pub fn fresh_variable(&self, avoid: &[Token]) -> Token {
        let mut index = 0usize;
        loop {
            let name = spell_variable(index);
            let token = self
                .variables
                .lookup(&name)
                .unwrap_or_else(|| self.variables.intern_raw(&name));
            if !avoid.contains(&token) {
                return token;
            }
            index += 1;
        }
    }

    pub fn checkpoint(&self) -> LexiconCheckpoint {
        LexiconCheckpoint {
            words: self.words.snapshot(),
            variables: self.variables.snapshot(),
            special_symbols: self.specials.snapshot(),
        }
    }

    /// Restore from a checkpoint.  Each list must extend the corresponding
    /// in-memory vocabulary; any id conflict aborts the whole restore
    /// before anything is replaced.
    pub fn restore(&self, checkpoint: &LexiconCheckpoint) -> Result<(), VocabError> {
        self.words.validate_extension(&checkpoint.words)?;
        self.variables.validate_extension(&checkpoint.variables)?;
        self.specials.validate_extension(&checkpoint.special_symbols)?;
        self.words.reset(checkpoint.words.clone())?;
        self.variables.reset(checkpoint.variables.clone())?;
        self.specials.reset(checkpoint.special_symbols.clone())?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), VocabError> {
        let text = serde_json::to_string_pretty(&self.checkpoint())?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), VocabError> {
        let text = fs::read_to_string(path)?;
        let checkpoint: LexiconCheckpoint = serde_json::from_str(&text)?;
        self.restore(&checkpoint)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

/// Bijective base-26 spelling: `A..Z`, then `AA`, `AB`, ...
fn spell_variable(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ascii letters")
}
