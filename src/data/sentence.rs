//! Sentences: immutable ordered sequences of tokens.
//!
//! Two sentences are *identical* when their token sequences are equal by
//! id and kind (this is `==`).  They are *equivalent* when a bijective
//! renaming of their variables makes them identical; `alpha_hash` agrees
//! on equivalent sentences.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use rustc_hash::FxHasher;
use smallvec::SmallVec;

use super::token::{Token, TokenKind};
use super::vocab::Lexicon;

pub(crate) type TokenBuf = SmallVec<[Token; 8]>;

/// A non-owning contiguous slice of a sentence.
pub type SentenceView<'a> = &'a [Token];

/// An immutable ordered sequence of tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Sentence {
    tokens: TokenBuf,
}

impl Sentence {
    pub fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self { tokens: tokens.into_iter().collect() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_slice(tokens: &[Token]) -> Self {
        Self { tokens: SmallVec::from_slice(tokens) }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn view(&self) -> SentenceView<'_> {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Token> {
        self.tokens.get(index).copied()
    }

    pub fn first(&self) -> Option<Token> {
        self.tokens.first().copied()
    }

    pub fn last(&self) -> Option<Token> {
        self.tokens.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Token> + '_ {
        self.tokens.iter().copied()
    }

    /// A sentence is concrete when it contains no variable.
    pub fn is_concrete(&self) -> bool {
        !self.tokens.iter().any(|token| token.is_variable())
    }

    pub fn contains_special(&self) -> bool {
        self.tokens.iter().any(|token| token.is_special())
    }

    pub fn contains(&self, token: Token) -> bool {
        self.tokens.contains(&token)
    }

    pub fn occurrences(&self, token: Token) -> usize {
        self.tokens.iter().filter(|&&t| t == token).count()
    }

    /// Distinct variables in first-occurrence order.
    pub fn variables(&self) -> Vec<Token> {
        let mut seen = Vec::new();
        for &token in &self.tokens {
            if token.is_variable() && !seen.contains(&token) {
                seen.push(token);
            }
        }
        seen
    }

    /// An owned copy of a contiguous range.
    pub fn slice(&self, range: Range<usize>) -> Sentence {
        Sentence::from_slice(&self.tokens[range])
    }

    pub fn concat(&self, other: &Sentence) -> Sentence {
        let mut tokens = self.tokens.clone();
        tokens.extend_from_slice(&other.tokens);
        Sentence { tokens }
    }

    /// Canonical form: variables renamed to De-Bruijn dummies in order of
    /// first occurrence.  Equivalent sentences have identical canonical
    /// forms.
    pub fn de_bruijn(&self) -> Sentence {
        let mut assignment: HashMap<i32, u32> = HashMap::new();
        let tokens = self
            .tokens
            .iter()
            .map(|&token| {
                if token.is_variable() {
                    let next = assignment.len() as u32 + 1;
                    let index = *assignment.entry(token.id()).or_insert(next);
                    Token::de_bruijn(index)
                } else {
                    token
                }
            })
            .collect();
        Sentence { tokens }
    }

    /// A hash that agrees on α-equivalent sentences.
    pub fn alpha_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.de_bruijn().hash(&mut hasher);
        hasher.finish()
    }

    /// Equality up to a bijective renaming of variables.
    pub fn is_equivalent(&self, other: &Sentence) -> bool {
        if self.tokens.len() != other.tokens.len() {
            return false;
        }
        let mut forward: HashMap<Token, Token> = HashMap::new();
        let mut backward: HashMap<Token, Token> = HashMap::new();
        for (&a, &b) in self.tokens.iter().zip(other.tokens.iter()) {
            if a.kind() != b.kind() {
                return false;
            }
            if !a.is_variable() {
                if a != b {
                    return false;
                }
                continue;
            }
            if *forward.entry(a).or_insert(b) != b {
                return false;
            }
            if *backward.entry(b).or_insert(a) != a {
                return false;
            }
        }
        true
    }

    /// Display form using the surface syntax: words bare, variables as
    /// `[NAME]`, specials as `$NAME$`.
    pub fn render(&self, lexicon: &Lexicon) -> String {
        self.tokens
            .iter()
            .map(|&token| render_token(token, lexicon))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<Token> for Sentence {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Sentence::new(iter)
    }
}

impl From<Vec<Token>> for Sentence {
    fn from(tokens: Vec<Token>) -> Self {
        Sentence::new(tokens)
    }
}

pub(crate) fn render_token(token: Token, lexicon: &Lexicon) -> String {
    match token.kind() {
        TokenKind::Word => lexicon
            .name_of(token)
            .unwrap_or_else(|| format!("<word:{}>", token.id())),
        TokenKind::Variable => {
            if token.is_de_bruijn() {
                format!("[#{}]", -token.id())
            } else {
                match lexicon.name_of(token) {
                    Some(name) => format!("[{name}]"),
                    None => format!("[?{}]", token.id()),
                }
            }
        }
        TokenKind::Special => match lexicon.name_of(token) {
            Some(name) => format!("${name}$"),
            None => "$|$".to_string(),
        },
    }
}

/// Length of the longest shared prefix, comparing tokens by id and kind.
pub fn common_prefix_len(a: &[Token], b: &[Token]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Length of the longest shared suffix.
pub fn common_suffix_len(a: &[Token], b: &[Token]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Number of (possibly overlapping) occurrences of `needle` in `haystack`.
pub fn subslice_occurrences(haystack: &[Token], needle: &[Token]) -> usize {
    if needle.is_empty() || needle.len() > haystack.len() {
        return 0;
    }
    (0..=haystack.len() - needle.len())
        .filter(|&start| &haystack[start..start + needle.len()] == needle)
        .count()
}

#[cfg(test)]
mod tests {
    use super::{common_prefix_len, common_suffix_len, subslice_occurrences, Sentence};
    use crate::data::token::Token;
    use crate::data::vocab::Lexicon;
    use crate::parser::parse_sentence;

    fn sentence(lexicon: &Lexicon, text: &str) -> Sentence {
        parse_sentence(text, lexicon).expect("well-formed sentence")
    }

    #[test]
    fn identity_is_token_equality() {
        let lexicon = Lexicon::new();
        let a = sentence(&lexicon, "dax fep $MAPS_TO$ RED");
        let b = sentence(&lexicon, "dax fep $MAPS_TO$ RED");
        let c = sentence(&lexicon, "dax fep $MAPS_TO$ BLUE");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn concreteness_and_variables() {
        let lexicon = Lexicon::new();
        let concrete = sentence(&lexicon, "dax fep");
        let open = sentence(&lexicon, "[A] fep [B] [A]");
        assert!(concrete.is_concrete());
        assert!(!open.is_concrete());
        let vars = open.variables();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0], lexicon.variable("A").expect("seeded"));
        assert_eq!(vars[1], lexicon.variable("B").expect("seeded"));
    }

    #[test]
    fn equivalence_is_bijective_renaming() {
        let lexicon = Lexicon::new();
        let a = sentence(&lexicon, "[A] kiki [B]");
        let b = sentence(&lexicon, "[C] kiki [D]");
        let collapsed = sentence(&lexicon, "[C] kiki [C]");
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&collapsed), "renaming must be bijective");
        assert!(collapsed.is_equivalent(&collapsed));
    }

    #[test]
    fn alpha_hash_agrees_on_equivalent_sentences() {
        let lexicon = Lexicon::new();
        let a = sentence(&lexicon, "[A] kiki [B] [A]");
        let b = sentence(&lexicon, "[X] kiki [Y] [X]");
        assert!(a.is_equivalent(&b));
        assert_eq!(a.alpha_hash(), b.alpha_hash());
        let c = sentence(&lexicon, "[A] kiki [B] [B]");
        assert!(!a.is_equivalent(&c));
        assert_ne!(a.alpha_hash(), c.alpha_hash());
    }

    #[test]
    fn de_bruijn_canonicalizes_first_occurrence_order() {
        let lexicon = Lexicon::new();
        let s = sentence(&lexicon, "[B] w [A] [B]");
        let canonical = s.de_bruijn();
        assert_eq!(canonical.get(0), Some(Token::de_bruijn(1)));
        assert_eq!(canonical.get(2), Some(Token::de_bruijn(2)));
        assert_eq!(canonical.get(3), Some(Token::de_bruijn(1)));
    }

    #[test]
    fn render_roundtrips_surface_syntax() {
        let lexicon = Lexicon::new();
        let text = "dax [A] $MAPS_TO$ RED [B]";
        let s = sentence(&lexicon, text);
        assert_eq!(s.render(&lexicon), text);
    }

    #[test]
    fn slice_helpers() {
        let lexicon = Lexicon::new();
        let a = sentence(&lexicon, "w1 w2 w3 w4");
        let b = sentence(&lexicon, "w1 w2 x w4");
        assert_eq!(common_prefix_len(a.tokens(), b.tokens()), 2);
        assert_eq!(common_suffix_len(a.tokens(), b.tokens()), 1);
        let needle = sentence(&lexicon, "w2 w3");
        assert_eq!(subslice_occurrences(a.tokens(), needle.tokens()), 1);
        assert_eq!(a.slice(1..3), needle);
    }
}
