//! Symbolic model expressions
//!
//! Model text is parsed into an immutable [`Expr`] tree. Children are shared through [`Arc`], so
//! a derivative reuses the untouched sub-trees of the expression it was taken from instead of
//! copying them. Evaluation, differentiation and rendering are methods on the tree and never
//! mutate it.

mod diff;
mod display;
mod error;
mod eval;
mod functions;
mod lexer;
mod parser;

use std::collections::HashMap;
use std::sync::Arc;

pub use error::{EvalError, ParseError, Span};
pub use functions::{Function, FunctionTable};

/// Values of the variables an expression is evaluated at
pub type Bindings = HashMap<String, f64>;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Constant(f64),
    Variable(String),
    Add(Arc<Expr>, Arc<Expr>),
    Sub(Arc<Expr>, Arc<Expr>),
    Mul(Arc<Expr>, Arc<Expr>),
    Div(Arc<Expr>, Arc<Expr>),
    Pow(Arc<Expr>, Arc<Expr>),
    Neg(Arc<Expr>),
    Func(Function, Arc<Expr>),
}

impl Expr {
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub(crate) const fn as_constant(&self) -> Option<f64> {
        match self {
            Self::Constant(value) => Some(*value),
            _ => None,
        }
    }

    /// Names of the variables in the expression, in order of first appearance
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Self::Constant(_) => {}
            Self::Variable(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Self::Add(l, r)
            | Self::Sub(l, r)
            | Self::Mul(l, r)
            | Self::Div(l, r)
            | Self::Pow(l, r) => {
                l.collect_variables(names);
                r.collect_variables(names);
            }
            Self::Neg(inner) | Self::Func(_, inner) => inner.collect_variables(names),
        }
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        match self {
            Self::Constant(_) => false,
            Self::Variable(own) => own == name,
            Self::Add(l, r)
            | Self::Sub(l, r)
            | Self::Mul(l, r)
            | Self::Div(l, r)
            | Self::Pow(l, r) => {
                l.contains_variable(name) || r.contains_variable(name)
            }
            Self::Neg(inner) | Self::Func(_, inner) => inner.contains_variable(name),
        }
    }

    /// Replace every occurrence of the variable `name` with `replacement`
    ///
    /// Sub-trees that do not mention `name` are shared with `self`.
    #[must_use]
    pub fn substitute(&self, name: &str, replacement: &Self) -> Self {
        if !self.contains_variable(name) {
            return self.clone();
        }
        let sub = |child: &Arc<Self>| Arc::new(child.substitute(name, replacement));
        match self {
            Self::Variable(_) => replacement.clone(),
            Self::Add(l, r) => Self::Add(sub(l), sub(r)),
            Self::Sub(l, r) => Self::Sub(sub(l), sub(r)),
            Self::Mul(l, r) => Self::Mul(sub(l), sub(r)),
            Self::Div(l, r) => Self::Div(sub(l), sub(r)),
            Self::Pow(l, r) => Self::Pow(sub(l), sub(r)),
            Self::Neg(inner) => Self::Neg(sub(inner)),
            Self::Func(function, inner) => Self::Func(*function, sub(inner)),
            Self::Constant(_) => self.clone(),
        }
    }
}

/// Parser front end owning the names it recognises
///
/// Engines are independent of each other: every engine carries its own [`FunctionTable`].
#[derive(Clone, Debug, Default)]
pub struct Engine {
    functions: FunctionTable,
}

impl Engine {
    pub const fn new(functions: FunctionTable) -> Self {
        Self { functions }
    }

    pub const fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Parse model text into an expression
    ///
    /// # Errors
    /// Returns [`ParseError::Empty`] for blank text, [`ParseError::Syntax`] for unbalanced
    /// parentheses, unknown characters and misplaced operators, and
    /// [`ParseError::UnknownFunction`] for calls to names missing from the table.
    pub fn parse(&self, text: &str) -> Result<Expr, ParseError> {
        parser::parse(text, &self.functions)
    }
}

/// Parse with the standard function table
///
/// # Errors
/// See [`Engine::parse`].
pub fn parse(text: &str) -> Result<Expr, ParseError> {
    Engine::default().parse(text)
}
