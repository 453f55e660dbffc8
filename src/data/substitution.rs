//! Substitutions: partial maps from variables to non-empty, special-free
//! sentences.
//!
//! Substitutions are built functionally; `compose` and `merge` always
//! produce fresh values so no operand is ever aliased or mutated.

use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use thiserror::Error;

use super::sentence::Sentence;
use super::token::Token;
use super::vocab::Lexicon;

/// Violations of the binding contract.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("cannot bind non-variable token id {0}")]
    NotAVariable(i32),
    #[error("cannot bind variable id {0} to an empty sentence")]
    EmptyBinding(i32),
    #[error("cannot bind variable id {0} to a sentence containing a special symbol")]
    SpecialInBinding(i32),
    #[error("substitutions disagree on variable id {0}")]
    MergeConflict(i32),
}

fn validate(var: Token, value: &Sentence) -> Result<(), BindingError> {
    if !var.is_variable() {
        return Err(BindingError::NotAVariable(var.id()));
    }
    if value.is_empty() {
        return Err(BindingError::EmptyBinding(var.id()));
    }
    if value.contains_special() {
        return Err(BindingError::SpecialInBinding(var.id()));
    }
    Ok(())
}

/// A partial map from variables to sentences, insertion-ordered so that
/// enumerations over substitutions are deterministic.
#[derive(Clone, Debug, Default)]
pub struct Substitution {
    bindings: IndexMap<Token, Sentence>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(var: Token, value: Sentence) -> Result<Self, BindingError> {
        let mut subst = Self::new();
        subst.bind(var, value)?;
        Ok(subst)
    }

    /// Bind a variable, validating the binding contract.
    pub fn bind(&mut self, var: Token, value: Sentence) -> Result<(), BindingError> {
        validate(var, &value)?;
        self.bindings.insert(var, value);
        Ok(())
    }

    /// Insert a binding whose contract the caller has already established
    /// (segments cut between special symbols are special-free by
    /// construction).
    pub(crate) fn insert_unchecked(&mut self, var: Token, value: Sentence) {
        debug_assert!(validate(var, &value).is_ok());
        self.bindings.insert(var, value);
    }

    pub fn get(&self, var: Token) -> Option<&Sentence> {
        self.bindings.get(&var)
    }

    pub fn contains(&self, var: Token) -> bool {
        self.bindings.contains_key(&var)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, &Sentence)> {
        self.bindings.iter().map(|(&var, value)| (var, value))
    }

    pub fn domain(&self) -> impl Iterator<Item = Token> + '_ {
        self.bindings.keys().copied()
    }

    /// Apply to a token slice, splicing bound variables in a single pass.
    pub fn apply_slice(&self, tokens: &[Token]) -> Sentence {
        let mut out = Vec::with_capacity(tokens.len());
        for &token in tokens {
            match self.bindings.get(&token) {
                Some(value) => out.extend(value.iter()),
                None => out.push(token),
            }
        }
        Sentence::new(out)
    }

    pub fn apply(&self, sentence: &Sentence) -> Sentence {
        if self.is_empty() {
            return sentence.clone();
        }
        self.apply_slice(sentence.tokens())
    }

    /// Composition: `(s1.compose(s2))(t) = s2(s1(t))`.  Implemented by
    /// applying `s2` to every value of `s1` and adding the bindings of
    /// `s2` whose variables `s1` leaves untouched.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut result = Substitution::new();
        for (var, value) in self.iter() {
            result.bindings.insert(var, other.apply(value));
        }
        for (var, value) in other.iter() {
            if !result.bindings.contains_key(&var) {
                result.bindings.insert(var, value.clone());
            }
        }
        result
    }

    /// Disjoint merge: the union of both maps, failing when a shared
    /// variable is bound to different sentences.
    pub fn merge(&self, other: &Substitution) -> Result<Substitution, BindingError> {
        let mut result = self.clone();
        for (var, value) in other.iter() {
            match result.bindings.get(&var) {
                Some(existing) if existing != value => {
                    return Err(BindingError::MergeConflict(var.id()));
                }
                Some(_) => {}
                None => {
                    result.bindings.insert(var, value.clone());
                }
            }
        }
        Ok(result)
    }

    /// Restriction of the domain to `vars`, preserving `vars` order.
    pub fn restrict(&self, vars: &[Token]) -> Substitution {
        let mut result = Substitution::new();
        for &var in vars {
            if let Some(value) = self.bindings.get(&var) {
                result.bindings.insert(var, value.clone());
            }
        }
        result
    }

    pub fn render(&self, lexicon: &Lexicon) -> String {
        let entries: Vec<String> = self
            .iter()
            .map(|(var, value)| {
                format!(
                    "{} -> {}",
                    super::sentence::render_token(var, lexicon),
                    value.render(lexicon)
                )
            })
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

impl PartialEq for Substitution {
    fn eq(&self, other: &Self) -> bool {
        self.bindings == other.bindings
    }
}

impl Eq for Substitution {}

impl Hash for Substitution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Commutative combination: equal maps hash equal regardless of
        // insertion order.
        let mut combined = 0u64;
        for (var, value) in self.iter() {
            let mut hasher = FxHasher::default();
            var.hash(&mut hasher);
            value.hash(&mut hasher);
            combined ^= hasher.finish();
        }
        state.write_u64(combined);
    }
}

/// A single-pair substitution, avoiding a map allocation in the common
/// case of binding one variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableBinding {
    var: Token,
    value: Sentence,
}

impl VariableBinding {
    pub fn new(var: Token, value: Sentence) -> Result<Self, BindingError> {
        validate(var, &value)?;
        Ok(Self { var, value })
    }

    pub(crate) fn new_unchecked(var: Token, value: Sentence) -> Self {
        debug_assert!(validate(var, &value).is_ok());
        Self { var, value }
    }

    pub fn var(&self) -> Token {
        self.var
    }

    pub fn value(&self) -> &Sentence {
        &self.value
    }

    pub fn apply_slice(&self, tokens: &[Token]) -> Sentence {
        let mut out = Vec::with_capacity(tokens.len());
        for &token in tokens {
            if token == self.var {
                out.extend(self.value.iter());
            } else {
                out.push(token);
            }
        }
        Sentence::new(out)
    }

    pub fn apply(&self, sentence: &Sentence) -> Sentence {
        self.apply_slice(sentence.tokens())
    }

    pub fn into_substitution(self) -> Substitution {
        let mut subst = Substitution::new();
        subst.insert_unchecked(self.var, self.value);
        subst
    }
}

/// A bijective renaming of variables, used to make two sentences
/// variable-disjoint before unification.
#[derive(Clone, Debug, Default)]
pub struct AlphaConversion {
    map: IndexMap<Token, Token>,
}

impl AlphaConversion {
    /// Rename every variable of `vars` to a fresh variable colliding with
    /// neither `avoid` nor any variable chosen so far.
    pub fn disjoint(vars: &[Token], avoid: &[Token], lexicon: &Lexicon) -> Self {
        let mut map = IndexMap::new();
        let mut taken: Vec<Token> = avoid.to_vec();
        taken.extend_from_slice(vars);
        for &var in vars {
            let fresh = lexicon.fresh_variable(&taken);
            taken.push(fresh);
            map.insert(var, fresh);
        }
        Self { map }
    }

    pub fn get(&self, var: Token) -> Option<Token> {
        self.map.get(&var).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, Token)> + '_ {
        self.map.iter().map(|(&from, &to)| (from, to))
    }

    pub fn rename(&self, sentence: &Sentence) -> Sentence {
        sentence
            .iter()
            .map(|token| self.map.get(&token).copied().unwrap_or(token))
            .collect()
    }

    pub fn invert(&self) -> AlphaConversion {
        let map = self.map.iter().map(|(&from, &to)| (to, from)).collect();
        AlphaConversion { map }
    }

    /// Rename both the domain and the values of a substitution.
    pub fn rename_substitution(&self, subst: &Substitution) -> Substitution {
        let mut result = Substitution::new();
        for (var, value) in subst.iter() {
            let renamed_var = self.map.get(&var).copied().unwrap_or(var);
            result.insert_unchecked(renamed_var, self.rename(value));
        }
        result
    }
}
