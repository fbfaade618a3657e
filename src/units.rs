//! Dimensional consistency of model equations
//!
//! Unit strings such as `kg*m/s^2`, `N/mm^2` or `(m/s)^2` are reduced to exponents of the seven
//! SI base quantities. Every equation of the model is then checked by computing the dimension
//! of its right side from the units of its variables and comparing it with the unit declared for
//! the result.
//!
//! Prefixes scale a unit without changing its dimension, so `mm` and `km` both reduce to `m`.
//! Degrees Celsius reduce to kelvin.

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::expression::{Bindings, Expr, Function};
use crate::model::ModelEquation;

const BASE_UNITS: [&str; 7] = ["m", "kg", "s", "A", "K", "mol", "cd"];

/// Exponents are stored in twelfths so that square and cube roots stay exact
const DENOMINATOR: i32 = 12;

const PREFIXES: [&str; 21] = [
    "da", "Y", "Z", "E", "P", "T", "G", "M", "k", "h", "d", "c", "m", "u", "µ", "μ", "n", "p",
    "f", "a", "z",
];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("unsupported character '{character}' in unit '{text}'")]
    UnsupportedCharacter { character: char, text: String },
    #[error("unknown unit '{unit}' in '{text}'")]
    UnknownUnit { unit: String, text: String },
    #[error("unexpected '{token}' in unit '{text}'")]
    UnexpectedToken { token: String, text: String },
    #[error("unit '{0}' ends unexpectedly")]
    UnexpectedEnd(String),
    #[error("invalid exponent in unit '{0}'")]
    InvalidExponent(String),
}

/// Why the dimension of an expression cannot be determined
#[derive(Clone, Debug, PartialEq, Error)]
pub enum DimensionError {
    #[error("unit of '{0}' is unresolved")]
    Unresolved(String),
    #[error("terms of a sum have dimensions {left} and {right}")]
    MismatchedTerms { left: Dimension, right: Dimension },
    #[error("{function} needs a dimensionless argument, not {argument}")]
    DimensionalArgument {
        function: &'static str,
        argument: Dimension,
    },
    #[error("an exponent must be dimensionless, not {0}")]
    DimensionalExponent(Dimension),
    #[error("the exponent of {0} must be a number")]
    SymbolicExponent(Dimension),
    #[error("raising {base} to {exponent} does not give a supported dimension")]
    UnsupportedPower { base: Dimension, exponent: f64 },
}

/// Exponents of the SI base quantities m, kg, s, A, K, mol and cd
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimension {
    twelfths: [i32; 7],
}

impl Dimension {
    pub const DIMENSIONLESS: Self = Self { twelfths: [0; 7] };

    /// Dimension with whole exponents, in the order m, kg, s, A, K, mol, cd
    pub const fn new(exponents: [i32; 7]) -> Self {
        let mut twelfths = [0; 7];
        let mut i = 0;
        while i < 7 {
            twelfths[i] = exponents[i] * DENOMINATOR;
            i += 1;
        }
        Self { twelfths }
    }

    pub fn is_dimensionless(self) -> bool {
        self == Self::DIMENSIONLESS
    }

    /// Exponent of `base`, `None` when `base` is not an SI base unit symbol
    pub fn exponent(self, base: &str) -> Option<f64> {
        let index = BASE_UNITS.iter().position(|b| *b == base)?;
        Some(f64::from(self.twelfths[index]) / f64::from(DENOMINATOR))
    }

    fn combine(self, other: Self, sign: i32) -> Self {
        let mut twelfths = self.twelfths;
        for (own, theirs) in twelfths.iter_mut().zip(other.twelfths) {
            *own += sign * theirs;
        }
        Self { twelfths }
    }

    #[must_use]
    pub fn multiply(self, other: Self) -> Self {
        self.combine(other, 1)
    }

    #[must_use]
    pub fn divide(self, other: Self) -> Self {
        self.combine(other, -1)
    }

    /// `None` when an exponent would not be a multiple of 1/12
    #[allow(clippy::cast_possible_truncation)]
    pub fn power(self, exponent: f64) -> Option<Self> {
        let mut twelfths = [0; 7];
        for (scaled, own) in twelfths.iter_mut().zip(self.twelfths) {
            let exact = f64::from(own) * exponent;
            let rounded = exact.round();
            if !exact.is_finite() || (exact - rounded).abs() > 1e-9 || rounded.abs() > 1e6 {
                return None;
            }
            *scaled = rounded as i32;
        }
        Some(Self { twelfths })
    }
}

fn gcd(a: i32, b: i32) -> i32 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

fn format_term(base: &str, twelfths: i32) -> String {
    let divisor = gcd(twelfths, DENOMINATOR);
    let (numerator, denominator) = (twelfths / divisor, DENOMINATOR / divisor);
    match (numerator, denominator) {
        (1, 1) => base.to_owned(),
        (n, 1) => format!("{base}^{n}"),
        (n, d) => format!("{base}^({n}/{d})"),
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms = |positive: bool| {
            BASE_UNITS
                .iter()
                .zip(self.twelfths)
                .filter(|(_, twelfths)| *twelfths != 0 && (*twelfths > 0) == positive)
                .map(|(base, twelfths)| format_term(base, twelfths.abs()))
                .join("*")
        };
        let (numerator, denominator) = (terms(true), terms(false));
        match (numerator.is_empty(), denominator.is_empty()) {
            (true, true) => write!(f, "1"),
            (false, true) => write!(f, "{numerator}"),
            (true, false) => write!(f, "1/{denominator}"),
            (false, false) => write!(f, "{numerator}/{denominator}"),
        }
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Dimension of a unit symbol without a prefix
fn named_unit(name: &str) -> Option<Dimension> {
    let exponents = match name {
        "m" => [1, 0, 0, 0, 0, 0, 0],
        "kg" | "g" => [0, 1, 0, 0, 0, 0, 0],
        "s" | "min" | "h" => [0, 0, 1, 0, 0, 0, 0],
        "A" => [0, 0, 0, 1, 0, 0, 0],
        "K" | "degC" | "digC" | "℃" | "°C" => [0, 0, 0, 0, 1, 0, 0],
        "mol" => [0, 0, 0, 0, 0, 1, 0],
        "cd" | "lm" => [0, 0, 0, 0, 0, 0, 1],
        "rad" | "sr" => [0; 7],
        "L" => [3, 0, 0, 0, 0, 0, 0],
        "N" => [1, 1, -2, 0, 0, 0, 0],
        "Pa" => [-1, 1, -2, 0, 0, 0, 0],
        "J" => [2, 1, -2, 0, 0, 0, 0],
        "W" => [2, 1, -3, 0, 0, 0, 0],
        "Hz" => [0, 0, -1, 0, 0, 0, 0],
        "C" => [0, 0, 1, 1, 0, 0, 0],
        "V" => [2, 1, -3, -1, 0, 0, 0],
        "ohm" | "Ω" => [2, 1, -3, -2, 0, 0, 0],
        "S" => [-2, -1, 3, 2, 0, 0, 0],
        "F" => [-2, -1, 4, 2, 0, 0, 0],
        "H" => [2, 1, -2, -2, 0, 0, 0],
        "Wb" => [2, 1, -2, -1, 0, 0, 0],
        "T" => [0, 1, -2, -1, 0, 0, 0],
        "lx" => [-2, 0, 0, 0, 0, 0, 1],
        _ => return None,
    };
    Some(Dimension::new(exponents))
}

/// A unit symbol with an optional SI prefix
fn unit_symbol(name: &str) -> Option<Dimension> {
    named_unit(name).or_else(|| {
        PREFIXES.iter().find_map(|prefix| {
            let rest = name.strip_prefix(prefix)?;
            if rest.is_empty() || rest == "kg" {
                return None;
            }
            named_unit(rest)
        })
    })
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Name(String),
    Integer(i32),
    Star,
    Slash,
    Caret,
    Minus,
    LeftParen,
    RightParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Caret => write!(f, "^"),
            Self::Minus => write!(f, "-"),
            Self::LeftParen => write!(f, "("),
            Self::RightParen => write!(f, ")"),
        }
    }
}

fn is_name_character(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '℃' | '°')
}

fn tokenize(text: &str) -> Result<Vec<Token>, UnitError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if is_name_character(c) {
            let mut name = String::new();
            while let Some(&c) = chars.peek().filter(|c| is_name_character(**c)) {
                name.push(c);
                chars.next();
            }
            tokens.push(Token::Name(name));
            continue;
        }
        if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(&c) = chars.peek().filter(|c| c.is_ascii_digit()) {
                digits.push(c);
                chars.next();
            }
            let value = digits
                .parse()
                .map_err(|_| UnitError::InvalidExponent(text.to_owned()))?;
            tokens.push(Token::Integer(value));
            continue;
        }
        let token = match c {
            '*' | '·' | '⋅' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '-' => Token::Minus,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            character => {
                return Err(UnitError::UnsupportedCharacter {
                    character,
                    text: text.to_owned(),
                })
            }
        };
        tokens.push(token);
        chars.next();
    }
    Ok(tokens)
}

struct UnitParser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl UnitParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Result<Token, UnitError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or_else(|| UnitError::UnexpectedEnd(self.text.to_owned()))?;
        self.position += 1;
        Ok(token)
    }

    fn unexpected(&self, token: &Token) -> UnitError {
        UnitError::UnexpectedToken {
            token: token.to_string(),
            text: self.text.to_owned(),
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), UnitError> {
        let token = self.advance()?;
        if token == *expected {
            Ok(())
        } else {
            Err(self.unexpected(&token))
        }
    }

    fn product(&mut self) -> Result<Dimension, UnitError> {
        let mut dimension = self.power()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.position += 1;
                    dimension = dimension.multiply(self.power()?);
                }
                Some(Token::Slash) => {
                    self.position += 1;
                    dimension = dimension.divide(self.power()?);
                }
                _ => return Ok(dimension),
            }
        }
    }

    fn power(&mut self) -> Result<Dimension, UnitError> {
        let base = self.factor()?;
        if self.peek() != Some(&Token::Caret) {
            return Ok(base);
        }
        self.position += 1;
        let exponent = self.exponent()?;
        base.power(exponent)
            .ok_or_else(|| UnitError::InvalidExponent(self.text.to_owned()))
    }

    fn factor(&mut self) -> Result<Dimension, UnitError> {
        match self.advance()? {
            Token::LeftParen => {
                let inner = self.product()?;
                self.expect(&Token::RightParen)?;
                Ok(inner)
            }
            Token::Integer(_) => Ok(Dimension::DIMENSIONLESS),
            Token::Name(name) => unit_symbol(&name).ok_or_else(|| UnitError::UnknownUnit {
                unit: name,
                text: self.text.to_owned(),
            }),
            token => Err(self.unexpected(&token)),
        }
    }

    /// `2`, `-1` or a parenthesised fraction such as `(1/2)`
    fn exponent(&mut self) -> Result<f64, UnitError> {
        let parenthesised = self.peek() == Some(&Token::LeftParen);
        if parenthesised {
            self.position += 1;
        }
        let mut value = self.signed_integer()?;
        if parenthesised {
            if self.peek() == Some(&Token::Slash) {
                self.position += 1;
                match self.advance()? {
                    Token::Integer(denominator) if denominator != 0 => {
                        value /= f64::from(denominator);
                    }
                    _ => return Err(UnitError::InvalidExponent(self.text.to_owned())),
                }
            }
            self.expect(&Token::RightParen)?;
        }
        Ok(value)
    }

    fn signed_integer(&mut self) -> Result<f64, UnitError> {
        let negative = self.peek() == Some(&Token::Minus);
        if negative {
            self.position += 1;
        }
        match self.advance()? {
            Token::Integer(value) => Ok(if negative {
                -f64::from(value)
            } else {
                f64::from(value)
            }),
            _ => Err(UnitError::InvalidExponent(self.text.to_owned())),
        }
    }
}

/// Reduce a unit string to its dimension
///
/// Blank text, `1` and `-` are dimensionless.
///
/// # Errors
/// Fails for unknown unit symbols, characters outside the unit grammar, unbalanced parentheses
/// and exponents that are not integers or simple fractions.
///
/// ```
/// use uncertainty_budget::units::{parse_unit, Dimension};
///
/// assert_eq!(parse_unit("N").unwrap(), parse_unit("kg*m/s^2").unwrap());
/// assert_eq!(parse_unit("mm").unwrap(), Dimension::new([1, 0, 0, 0, 0, 0, 0]));
/// ```
pub fn parse_unit(text: &str) -> Result<Dimension, UnitError> {
    let trimmed = text.trim();
    if matches!(trimmed, "" | "1" | "-") {
        return Ok(Dimension::DIMENSIONLESS);
    }
    let mut parser = UnitParser {
        text: trimmed,
        tokens: tokenize(trimmed)?,
        position: 0,
    };
    let dimension = parser.product()?;
    match parser.peek() {
        None => Ok(dimension),
        Some(token) => Err(parser.unexpected(token)),
    }
}

/// Dimension of `expression` given the dimensions of its variables
///
/// # Errors
/// Fails for a variable missing from `dimensions`, sums of unlike dimensions, a dimensional
/// argument to a transcendental function and powers whose exponent is not a plain number while
/// the base has a dimension.
pub fn dimension_of(
    expression: &Expr,
    dimensions: &HashMap<String, Dimension>,
) -> Result<Dimension, DimensionError> {
    let of = |e: &Expr| dimension_of(e, dimensions);
    match expression {
        Expr::Constant(_) => Ok(Dimension::DIMENSIONLESS),
        Expr::Variable(name) => dimensions
            .get(name)
            .copied()
            .ok_or_else(|| DimensionError::Unresolved(name.clone())),
        Expr::Add(l, r) | Expr::Sub(l, r) => {
            let (left, right) = (of(l)?, of(r)?);
            if left == right {
                Ok(left)
            } else {
                Err(DimensionError::MismatchedTerms { left, right })
            }
        }
        Expr::Mul(l, r) => Ok(of(l)?.multiply(of(r)?)),
        Expr::Div(l, r) => Ok(of(l)?.divide(of(r)?)),
        Expr::Neg(inner) => of(inner),
        Expr::Pow(base, exponent) => {
            let base = of(base)?;
            let exponent_dimension = of(exponent)?;
            if !exponent_dimension.is_dimensionless() {
                return Err(DimensionError::DimensionalExponent(exponent_dimension));
            }
            if base.is_dimensionless() {
                return Ok(base);
            }
            let value = exponent
                .evaluate(&Bindings::new())
                .map_err(|_| DimensionError::SymbolicExponent(base))?;
            base.power(value)
                .ok_or(DimensionError::UnsupportedPower {
                    base,
                    exponent: value,
                })
        }
        Expr::Func(function, argument) => {
            let argument = of(argument)?;
            match function {
                Function::Abs => Ok(argument),
                Function::Sign => Ok(Dimension::DIMENSIONLESS),
                Function::Sqrt => argument.power(0.5).ok_or(DimensionError::UnsupportedPower {
                    base: argument,
                    exponent: 0.5,
                }),
                _ if argument.is_dimensionless() => Ok(argument),
                _ => Err(DimensionError::DimensionalArgument {
                    function: function.name(),
                    argument,
                }),
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Warn,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of reading the unit of one variable
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariableCheck {
    pub name: String,
    pub unit: String,
    pub status: Status,
    pub message: String,
    pub dimension: Option<Dimension>,
}

/// Outcome of comparing both sides of one equation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EquationCheck {
    pub result: String,
    pub left: Option<Dimension>,
    pub right: Option<Dimension>,
    pub status: Status,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UnitReport {
    pub variables: Vec<VariableCheck>,
    pub equations: Vec<EquationCheck>,
}

impl UnitReport {
    /// Number of variable and equation checks with `status`
    pub fn count(&self, status: Status) -> usize {
        let variables = self.variables.iter().filter(|c| c.status == status).count();
        let equations = self.equations.iter().filter(|c| c.status == status).count();
        variables + equations
    }

    pub fn is_consistent(&self) -> bool {
        self.count(Status::Error) == 0
    }
}

/// Check the declared units against every equation of `model`
///
/// `units` pairs each name with its unit text, results and inputs alike. A blank unit is only a
/// warning for the variable itself, but any equation that needs it cannot be checked.
pub fn check_units(model: &ModelEquation, units: &[(&str, &str)]) -> UnitReport {
    let mut report = UnitReport::default();
    let mut dimensions = HashMap::new();

    for (name, unit) in units.iter().unique_by(|(name, _)| *name) {
        let (status, message, dimension) = if unit.trim().is_empty() {
            (Status::Warn, "unit is not set".to_owned(), None)
        } else {
            match parse_unit(unit) {
                Ok(dimension) => (Status::Ok, format!("reduces to {dimension}"), Some(dimension)),
                Err(e) => (Status::Error, e.to_string(), None),
            }
        };
        if let Some(dimension) = dimension {
            dimensions.insert((*name).to_owned(), dimension);
        }
        report.variables.push(VariableCheck {
            name: (*name).to_owned(),
            unit: (*unit).to_owned(),
            status,
            message,
            dimension,
        });
    }

    for result in model.results() {
        let Some(definition) = model.definition(result) else {
            continue;
        };
        let left = dimensions.get(result).copied();
        let check = match (left, dimension_of(definition, &dimensions)) {
            (None, _) => EquationCheck {
                result: result.to_owned(),
                left,
                right: None,
                status: Status::Warn,
                message: format!("unit of result '{result}' is unresolved"),
            },
            (Some(_), Err(e)) => EquationCheck {
                result: result.to_owned(),
                left,
                right: None,
                status: Status::Error,
                message: e.to_string(),
            },
            (Some(l), Ok(r)) if l == r => EquationCheck {
                result: result.to_owned(),
                left,
                right: Some(r),
                status: Status::Ok,
                message: "both sides have the same dimension".to_owned(),
            },
            (Some(l), Ok(r)) => EquationCheck {
                result: result.to_owned(),
                left,
                right: Some(r),
                status: Status::Error,
                message: format!("left side is {l} but right side is {r}"),
            },
        };
        if check.status == Status::Error {
            log::warn!("equation for '{result}': {}", check.message);
        }
        report.equations.push(check);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::{check_units, parse_unit, Dimension, Status, UnitError};
    use crate::expression::Engine;
    use crate::model::ModelEquation;

    fn model(text: &str) -> ModelEquation {
        ModelEquation::parse(&Engine::default(), text).unwrap()
    }

    fn equation_status(text: &str, units: &[(&str, &str)]) -> Status {
        let report = check_units(&model(text), units);
        report.equations[0].status
    }

    #[test]
    fn derived_units_reduce_to_base_units() {
        let newton = parse_unit("N").unwrap();
        assert_eq!(newton.exponent("kg"), Some(1.0));
        assert_eq!(newton.exponent("m"), Some(1.0));
        assert_eq!(newton.exponent("s"), Some(-2.0));

        assert_eq!(parse_unit("Pa").unwrap(), parse_unit("N/m^2").unwrap());
        assert_eq!(parse_unit("J").unwrap(), parse_unit("N*m").unwrap());
        assert_eq!(parse_unit("W").unwrap(), parse_unit("J/s").unwrap());
        assert_eq!(parse_unit("V").unwrap(), parse_unit("W/A").unwrap());
        assert_eq!(parse_unit("ohm").unwrap(), parse_unit("V/A").unwrap());
        assert_eq!(parse_unit("Ω").unwrap(), parse_unit("V/A").unwrap());
        assert_eq!(parse_unit("T").unwrap(), parse_unit("Wb/m^2").unwrap());
    }

    #[test]
    fn compound_units() {
        let acceleration = parse_unit("m/s^2").unwrap();
        assert_eq!(acceleration, Dimension::new([1, 0, -2, 0, 0, 0, 0]));
        assert_eq!(parse_unit("(m/s)^2").unwrap(), Dimension::new([2, 0, -2, 0, 0, 0, 0]));
        assert_eq!(parse_unit("m·s^-1").unwrap(), parse_unit("m/s").unwrap());
        assert_eq!(parse_unit("m^(1/2)").unwrap().exponent("m"), Some(0.5));
    }

    #[test]
    fn dimensionless_spellings() {
        for text in ["", "1", "-", "  ", "rad", "m/m"] {
            assert!(parse_unit(text).unwrap().is_dimensionless(), "{text}");
        }
    }

    #[test]
    fn prefixes_and_celsius() {
        let metre = parse_unit("m").unwrap();
        assert_eq!(parse_unit("mm").unwrap(), metre);
        assert_eq!(parse_unit("km").unwrap(), metre);
        assert_eq!(parse_unit("µm").unwrap(), metre);
        assert_eq!(parse_unit("mg").unwrap(), parse_unit("kg").unwrap());
        assert_eq!(parse_unit("kPa").unwrap(), parse_unit("Pa").unwrap());
        for celsius in ["degC", "digC", "℃", "°C"] {
            assert_eq!(parse_unit(celsius).unwrap(), parse_unit("K").unwrap());
        }
    }

    #[test]
    fn malformed_units_are_rejected() {
        assert!(matches!(parse_unit("foobar"), Err(UnitError::UnknownUnit { .. })));
        assert!(matches!(
            parse_unit("m%"),
            Err(UnitError::UnsupportedCharacter { character: '%', .. })
        ));
        assert!(matches!(parse_unit("(m/s"), Err(UnitError::UnexpectedEnd(_))));
        assert!(matches!(parse_unit("m^x"), Err(UnitError::InvalidExponent(_))));
        assert!(matches!(parse_unit("m s"), Err(UnitError::UnexpectedToken { .. })));
    }

    #[test]
    fn dimensions_are_rendered() {
        assert_eq!(Dimension::DIMENSIONLESS.to_string(), "1");
        assert_eq!(parse_unit("N").unwrap().to_string(), "m*kg/s^2");
        assert_eq!(parse_unit("Hz").unwrap().to_string(), "1/s");
        let root = parse_unit("m^(1/2)").unwrap();
        assert_eq!(root.to_string(), "m^(1/2)");
        assert_eq!(parse_unit(&root.to_string()).unwrap(), root);
    }

    #[test]
    fn consistent_equation() {
        let report = check_units(
            &model("F = m * a"),
            &[("F", "N"), ("m", "kg"), ("a", "m/s^2")],
        );
        assert!(report.is_consistent());
        assert_eq!(report.count(Status::Ok), 4);
        assert_eq!(report.equations[0].right, Some(parse_unit("N").unwrap()));
    }

    #[test]
    fn unlike_terms_are_errors() {
        let status = equation_status("x = t + y", &[("x", "m"), ("t", "s"), ("y", "m")]);
        assert_eq!(status, Status::Error);
    }

    #[test]
    fn mismatched_sides_are_errors() {
        let report = check_units(&model("v = d * t"), &[("v", "m/s"), ("d", "m"), ("t", "s")]);
        assert_eq!(report.equations[0].status, Status::Error);
        assert_eq!(report.equations[0].message, "left side is m/s but right side is m*s");
    }

    #[test]
    fn missing_units() {
        let report = check_units(&model("y = x"), &[("y", ""), ("x", "m")]);
        assert_eq!(report.variables[0].status, Status::Warn);
        assert_eq!(report.equations[0].status, Status::Warn);

        let status = equation_status("y = x + z", &[("y", "m"), ("x", "m")]);
        assert_eq!(status, Status::Error);
    }

    #[test]
    fn functions_need_dimensionless_arguments() {
        assert_eq!(equation_status("y = sin(x)", &[("y", "1"), ("x", "m")]), Status::Error);
        let status = equation_status("y = exp(x / L)", &[("y", "1"), ("x", "m"), ("L", "mm")]);
        assert_eq!(status, Status::Ok);
        assert_eq!(equation_status("y = abs(x)", &[("y", "m"), ("x", "m")]), Status::Ok);
    }

    #[test]
    fn powers_and_roots() {
        assert_eq!(equation_status("y = sqrt(x)", &[("y", "m"), ("x", "m^2")]), Status::Ok);
        assert_eq!(equation_status("y = x^(1/2)", &[("y", "m"), ("x", "m^2")]), Status::Ok);
        assert_eq!(equation_status("y = x^-2", &[("y", "1/m^2"), ("x", "m")]), Status::Ok);
        assert_eq!(
            equation_status("y = x^a", &[("y", "1"), ("x", "m"), ("a", "1")]),
            Status::Error
        );
        assert_eq!(
            equation_status("y = (1 + g)^a", &[("y", "1"), ("g", "1"), ("a", "1")]),
            Status::Ok
        );
    }

    #[test]
    fn chained_results_use_the_declared_unit() {
        let report = check_units(
            &model("p = F / S, q = p * S"),
            &[("p", "Pa"), ("q", "N"), ("F", "N"), ("S", "mm^2")],
        );
        assert!(report.is_consistent());
        assert_eq!(report.equations.len(), 2);
    }

    #[test]
    fn bad_unit_text_is_an_error_for_the_variable() {
        let report = check_units(&model("y = x"), &[("y", "m"), ("x", "furlong")]);
        assert_eq!(report.variables[1].status, Status::Error);
        assert_eq!(report.equations[0].status, Status::Error);
        assert_eq!(report.count(Status::Error), 2);
    }
}
