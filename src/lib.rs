#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
// #![warn(clippy::cargo)]

pub mod config;
pub mod distributions;
pub mod error;
pub mod expression;
pub mod math;
pub mod model;
pub mod monte_carlo;
pub mod project;
pub mod propagation;
pub mod regression;
pub mod report;
pub mod rounding;
pub mod uncertainty;
pub mod units;

pub use error::{Error, Result};
