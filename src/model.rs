//! Model equations with one or more results
//!
//! A model is written as `result = expression` equations separated by commas or newlines, for
//! example
//!
//! ```text
//! L = L_s + d
//! E = L - L_nominal
//! ```
//!
//! Left sides name result variables. An identifier on a right side that is not a result is an
//! input variable. A result may use other results, which are substituted before differentiation
//! so that sensitivities are always taken with respect to inputs.

use itertools::Itertools;
use thiserror::Error;

use crate::expression::{Engine, Expr, ParseError};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ModelError {
    #[error("the model does not define any result")]
    Empty,
    #[error("equation {index} '{text}' must have the form 'result = expression'")]
    MissingAssignment { index: usize, text: String },
    #[error("equation {index}: '{text}' is not a valid result name")]
    InvalidResultName { index: usize, text: String },
    #[error("result '{0}' is defined more than once")]
    DuplicateResult(String),
    #[error("definition of '{result}': {source}")]
    Parse {
        result: String,
        #[source]
        source: ParseError,
    },
    #[error("'{0}' is not a result of the model")]
    UnknownResult(String),
    #[error("circular definition {chain}")]
    CircularDefinition { chain: String },
}

/// Parsed model equations, in the order they were written
#[derive(Clone, Debug, PartialEq)]
pub struct ModelEquation {
    definitions: Vec<(String, Expr)>,
}

impl ModelEquation {
    /// Parse model text with the vocabulary of `engine`
    ///
    /// # Errors
    /// Fails when a piece is not an assignment, when the left side is not a single name, when a
    /// result is defined twice, when a right side does not parse and when the text holds no
    /// equation at all. Circular definitions are only detected by
    /// [`ModelEquation::expression_for`].
    pub fn parse(engine: &Engine, text: &str) -> Result<Self, ModelError> {
        let mut definitions: Vec<(String, Expr)> = Vec::new();

        let pieces = text
            .split(|c| c == ',' || c == '\n')
            .map(str::trim)
            .filter(|piece| !piece.is_empty());
        for (index, piece) in pieces.enumerate() {
            let index = index + 1;
            let (left, right) = piece
                .split_once('=')
                .ok_or_else(|| ModelError::MissingAssignment {
                    index,
                    text: piece.to_owned(),
                })?;

            let invalid_name = || ModelError::InvalidResultName {
                index,
                text: left.trim().to_owned(),
            };
            let result = match engine.parse(left) {
                Ok(Expr::Variable(name)) => name,
                _ => return Err(invalid_name()),
            };
            if definitions.iter().any(|(existing, _)| *existing == result) {
                return Err(ModelError::DuplicateResult(result));
            }

            let expression = engine.parse(right).map_err(|source| ModelError::Parse {
                result: result.clone(),
                source,
            })?;
            definitions.push((result, expression));
        }

        if definitions.is_empty() {
            return Err(ModelError::Empty);
        }
        log::debug!(
            "model defines {}",
            definitions.iter().map(|(result, _)| result).join(", ")
        );
        Ok(Self { definitions })
    }

    pub fn results(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|(result, _)| result.as_str())
    }

    pub fn is_result(&self, name: &str) -> bool {
        self.definition(name).is_some()
    }

    /// Right side of the equation for `result` as written
    pub fn definition(&self, result: &str) -> Option<&Expr> {
        self.definitions
            .iter()
            .find(|(name, _)| name == result)
            .map(|(_, expression)| expression)
    }

    /// Definition of `result` with every other result substituted, so it depends on inputs only
    ///
    /// # Errors
    /// Fails with [`ModelError::UnknownResult`] for a name that is not a result and with
    /// [`ModelError::CircularDefinition`] when a result depends on itself.
    pub fn expression_for(&self, result: &str) -> Result<Expr, ModelError> {
        let mut chain = Vec::new();
        self.expand(result, &mut chain)
    }

    fn expand<'a>(&'a self, result: &'a str, chain: &mut Vec<&'a str>) -> Result<Expr, ModelError> {
        if chain.contains(&result) {
            chain.push(result);
            return Err(ModelError::CircularDefinition {
                chain: chain.iter().join(" -> "),
            });
        }
        let definition = self
            .definition(result)
            .ok_or_else(|| ModelError::UnknownResult(result.to_owned()))?;

        chain.push(result);
        let mut expression = definition.clone();
        for (other, _) in &self.definitions {
            if expression.contains_variable(other) {
                let replacement = self.expand(other, chain)?;
                expression = expression.substitute(other, &replacement);
            }
        }
        chain.pop();

        Ok(expression)
    }

    /// Input variables of every equation, in order of first appearance
    pub fn input_variables(&self) -> Vec<String> {
        self.definitions
            .iter()
            .flat_map(|(_, expression)| expression.variables())
            .filter(|name| !self.is_result(name))
            .unique()
            .collect()
    }

    /// Inputs `result` depends on once other results are substituted
    ///
    /// # Errors
    /// See [`ModelEquation::expression_for`].
    pub fn inputs_of(&self, result: &str) -> Result<Vec<String>, ModelError> {
        Ok(self.expression_for(result)?.variables())
    }
}
