//! Clause-level contract with the external MAX-SAT rule-selection
//! solver.
//!
//! During training, proof paths supply concrete rule instantiations and
//! the indexed rule set supplies their generalizations.  The core
//! assembles hard clauses tying every instantiation (`cr_<int>`) to the
//! selection of one of its generalizations (`r_<int>`) plus weighted
//! soft clauses penalizing selections, and hands the problem to whatever
//! solver implements [`MaxSatSolver`].  Infeasibility is fatal; the core
//! has no fallback.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::data::Rule;
use crate::inference::backward::ProofPath;
use crate::inference::matching::Matchable;
use crate::inference::ruleset::{IndexedRuleSet, RuleId};

/// A boolean variable of the selection problem.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SolverVar {
    /// `cr_<int>`: a concrete rule instantiation is used.
    ConcreteRule(u32),
    /// `r_<int>`: an abstract rule is selected into the model.
    AbstractRule(u32),
}

impl fmt::Display for SolverVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverVar::ConcreteRule(index) => write!(f, "cr_{index}"),
            SolverVar::AbstractRule(index) => write!(f, "r_{index}"),
        }
    }
}

/// A possibly negated variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SolverLiteral {
    pub var: SolverVar,
    pub positive: bool,
}

impl SolverLiteral {
    pub fn pos(var: SolverVar) -> Self {
        Self { var, positive: true }
    }

    pub fn neg(var: SolverVar) -> Self {
        Self { var, positive: false }
    }
}

impl fmt::Display for SolverLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.positive {
            write!(f, "{}", self.var)
        } else {
            write!(f, "-{}", self.var)
        }
    }
}

/// Errors surfaced by solver backends.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("rule-selection problem is infeasible")]
    Infeasible,
    #[error("solver backend failure: {0}")]
    Backend(String),
}

/// A hard/soft clause set over [`SolverVar`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverProblem {
    hard: Vec<Vec<SolverLiteral>>,
    soft: Vec<(Vec<SolverLiteral>, f64)>,
}

impl SolverProblem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hard(&mut self, clause: Vec<SolverLiteral>) {
        self.hard.push(clause);
    }

    pub fn add_soft(&mut self, clause: Vec<SolverLiteral>, weight: f64) {
        self.soft.push((clause, weight));
    }

    pub fn hard(&self) -> &[Vec<SolverLiteral>] {
        &self.hard
    }

    pub fn soft(&self) -> &[(Vec<SolverLiteral>, f64)] {
        &self.soft
    }

    pub fn is_empty(&self) -> bool {
        self.hard.is_empty() && self.soft.is_empty()
    }

    /// Assemble the selection problem for a set of proof paths.
    ///
    /// Every distinct concrete rule used by some path receives a
    /// `cr_<int>` variable, hard-required to imply the selection of one
    /// of its generalizations in `rules` (its ruleset ancestors, or the
    /// rule itself when present).  Each path contributes a hard clause
    /// requiring all of its instantiations, and every abstract rule
    /// carries a unit soft clause against selecting it, weighted by
    /// `selection_cost`.
    ///
    /// Returns the problem together with the concrete-rule numbering.
    pub fn from_paths(
        paths: &[ProofPath],
        rules: &IndexedRuleSet,
        selection_cost: f64,
    ) -> (Self, IndexMap<Rule, SolverVar>) {
        let mut problem = Self::new();
        let mut numbering: IndexMap<Rule, SolverVar> = IndexMap::new();
        for path in paths {
            let mut clause = Vec::with_capacity(path.len());
            for concrete in path.rules() {
                let var = match numbering.get(concrete) {
                    Some(&var) => var,
                    None => {
                        let var = SolverVar::ConcreteRule(numbering.len() as u32);
                        numbering.insert(concrete.clone(), var);
                        // Tie the fresh instantiation to its
                        // generalizations.
                        let mut support = vec![SolverLiteral::neg(var)];
                        for id in generalization_ids(concrete, rules) {
                            support
                                .push(SolverLiteral::pos(SolverVar::AbstractRule(id as u32)));
                        }
                        problem.add_hard(support);
                        var
                    }
                };
                clause.push(SolverLiteral::pos(var));
            }
            if !clause.is_empty() {
                problem.add_hard(clause);
            }
        }
        for (id, _) in rules.iter() {
            problem.add_soft(
                vec![SolverLiteral::neg(SolverVar::AbstractRule(id as u32))],
                selection_cost,
            );
        }
        (problem, numbering)
    }
}

fn generalization_ids(concrete: &Rule, rules: &IndexedRuleSet) -> Vec<RuleId> {
    match rules.find(concrete) {
        Some(id) => {
            let mut ids = vec![id];
            ids.extend(rules.ancestors(id));
            ids
        }
        None => rules
            .iter()
            .filter(|(_, rule)| rule.is_more_general(concrete))
            .map(|(id, _)| id)
            .collect(),
    }
}

/// A truth assignment returned by the backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverModel {
    assignments: IndexMap<SolverVar, bool>,
}

impl SolverModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, var: SolverVar, value: bool) {
        self.assignments.insert(var, value);
    }

    pub fn get(&self, var: SolverVar) -> Option<bool> {
        self.assignments.get(&var).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SolverVar, bool)> + '_ {
        self.assignments.iter().map(|(&var, &value)| (var, value))
    }

    /// Indices of the selected abstract rules, in assignment order.
    pub fn selected_rules(&self) -> Vec<u32> {
        self.assignments
            .iter()
            .filter_map(|(&var, &value)| match var {
                SolverVar::AbstractRule(index) if value => Some(index),
                _ => None,
            })
            .collect()
    }
}

/// The external solver contract: `solve` establishes satisfiability (an
/// infeasible problem is an error), after which `get_model` retrieves
/// the assignments; backends may serve `get_model` repeatedly from one
/// `solve`.
pub trait MaxSatSolver {
    fn solve(&mut self, problem: &SolverProblem) -> Result<(), SolverError>;

    fn get_model(&self) -> &SolverModel;
}

#[cfg(test)]
mod tests {
    use super::{
        MaxSatSolver, SolverError, SolverLiteral, SolverModel, SolverProblem, SolverVar,
    };
    use crate::data::{Lexicon, Rule};
    use crate::inference::backward::ProofPath;
    use crate::inference::ruleset::IndexedRuleSet;
    use crate::parser::parse_rule;

    #[test]
    fn variable_naming() {
        assert_eq!(SolverVar::ConcreteRule(7).to_string(), "cr_7");
        assert_eq!(SolverVar::AbstractRule(3).to_string(), "r_3");
        assert_eq!(
            SolverLiteral::neg(SolverVar::AbstractRule(3)).to_string(),
            "-r_3"
        );
    }

    #[test]
    fn paths_become_clauses() {
        let lexicon = Lexicon::new();
        let mut rules = IndexedRuleSet::new();
        let concrete =
            parse_rule("dax wug\n---\ndax zug", &lexicon).expect("parse");
        let general = parse_rule("[A] wug\n---\n[A] zug", &lexicon).expect("parse");
        let concrete_id = rules.insert(concrete.clone(), &lexicon, &Rule::is_valid);
        let general_id = rules.insert(general, &lexicon, &Rule::is_valid);

        let path = ProofPath::singleton(concrete.clone());
        let (problem, numbering) = SolverProblem::from_paths(&[path], &rules, 1.0);

        assert_eq!(numbering.len(), 1);
        assert_eq!(
            numbering.get(&concrete),
            Some(&SolverVar::ConcreteRule(0))
        );
        // One support clause, one path clause, one soft unit per rule.
        assert_eq!(problem.hard().len(), 2);
        assert_eq!(problem.soft().len(), rules.len());

        let support = &problem.hard()[0];
        assert!(support.contains(&SolverLiteral::neg(SolverVar::ConcreteRule(0))));
        assert!(support
            .contains(&SolverLiteral::pos(SolverVar::AbstractRule(general_id as u32))));
        assert!(support
            .contains(&SolverLiteral::pos(SolverVar::AbstractRule(concrete_id as u32))));
    }

    #[test]
    fn trait_contract_is_usable() {
        #[derive(Default)]
        struct SelectEverything {
            model: SolverModel,
        }
        impl MaxSatSolver for SelectEverything {
            fn solve(&mut self, problem: &SolverProblem) -> Result<(), SolverError> {
                if problem.is_empty() {
                    return Err(SolverError::Infeasible);
                }
                let mut model = SolverModel::new();
                for clause in problem.hard() {
                    for literal in clause {
                        model.assign(literal.var, true);
                    }
                }
                self.model = model;
                Ok(())
            }

            fn get_model(&self) -> &SolverModel {
                &self.model
            }
        }

        let mut solver = SelectEverything::default();
        assert!(matches!(
            solver.solve(&SolverProblem::new()),
            Err(SolverError::Infeasible)
        ));

        let mut problem = SolverProblem::new();
        problem.add_hard(vec![SolverLiteral::pos(SolverVar::AbstractRule(0))]);
        solver.solve(&problem).expect("feasible");
        let model = solver.get_model();
        assert_eq!(model.get(SolverVar::AbstractRule(0)), Some(true));
        assert_eq!(model.selected_rules(), vec![0]);

        // The model stays queryable after the solve that produced it.
        assert_eq!(solver.get_model().selected_rules(), vec![0]);
    }
}
