use thiserror::Error;

use crate::expression::{EvalError, ParseError};
use crate::model::ModelError;
use crate::monte_carlo::MonteCarloError;
use crate::propagation::PropagationError;
use crate::regression::{FitError, RowParseError};
use crate::uncertainty::ResolveError;

/// Every failure the crate can report
///
/// Component errors convert into this type with `?`, so callers working with whole projects
/// handle one error type while component level callers can still match on the precise cause.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Evaluation(#[from] EvalError),
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error(transparent)]
    RowParse(#[from] RowParseError),
    #[error("variable '{variable}' at '{point}': {source}")]
    Resolve {
        variable: String,
        point: String,
        #[source]
        source: ResolveError,
    },
    #[error(transparent)]
    Propagation(#[from] PropagationError),
    #[error(transparent)]
    MonteCarlo(#[from] MonteCarloError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("'{0}' is not a calibration point of the project")]
    UnknownPoint(String),
    #[error("'{0}' is not a variable of the project")]
    UnknownVariable(String),
    #[error("regression model '{name}': {source}")]
    Regression {
        name: String,
        #[source]
        source: FitError,
    },
}

pub type Result<T> = ::std::result::Result<T, Error>;
