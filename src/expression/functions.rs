use std::collections::HashMap;

/// Elementary functions of one real argument understood by the engine
///
/// The set is closed: evaluation and differentiation dispatch on the variant directly, so an
/// expression that parsed successfully can always be evaluated and differentiated without
/// consulting a [`FunctionTable`] again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Sign,
}

impl Function {
    pub const ALL: [Self; 15] = [
        Self::Sin,
        Self::Cos,
        Self::Tan,
        Self::Asin,
        Self::Acos,
        Self::Atan,
        Self::Sinh,
        Self::Cosh,
        Self::Tanh,
        Self::Exp,
        Self::Ln,
        Self::Log10,
        Self::Sqrt,
        Self::Abs,
        Self::Sign,
    ];

    /// Canonical name, used when rendering
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Log10 => "log10",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Sign => "sign",
        }
    }

    /// Apply the function, returning `None` outside its real domain
    pub(crate) fn apply(self, x: f64) -> Option<f64> {
        match self {
            Self::Sin => Some(x.sin()),
            Self::Cos => Some(x.cos()),
            Self::Tan => Some(x.tan()),
            Self::Asin => (-1.0..=1.0).contains(&x).then(|| x.asin()),
            Self::Acos => (-1.0..=1.0).contains(&x).then(|| x.acos()),
            Self::Atan => Some(x.atan()),
            Self::Sinh => Some(x.sinh()),
            Self::Cosh => Some(x.cosh()),
            Self::Tanh => Some(x.tanh()),
            Self::Exp => Some(x.exp()),
            Self::Ln => (x > 0.0).then(|| x.ln()),
            Self::Log10 => (x > 0.0).then(|| x.log10()),
            Self::Sqrt => (x >= 0.0).then(|| x.sqrt()),
            Self::Abs => Some(x.abs()),
            // `f64::signum` maps zero to one
            Self::Sign => Some(if x == 0.0 { 0.0 } else { x.signum() }),
        }
    }
}

/// Names the parser recognises as function calls and named constants
///
/// Each [`crate::expression::Engine`] owns its own table, so two documents with different
/// vocabularies never see each other's names.
#[derive(Clone, Debug)]
pub struct FunctionTable {
    functions: HashMap<String, Function>,
    constants: HashMap<String, f64>,
}

impl FunctionTable {
    /// A table that knows no names at all
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
            constants: HashMap::new(),
        }
    }

    /// Every [`Function`] under its canonical name, `log` as an alias of `ln`, and `pi`
    pub fn standard() -> Self {
        Function::ALL
            .iter()
            .fold(Self::empty(), |table, function| {
                table.with_function(function.name(), *function)
            })
            .with_function("log", Function::Ln)
            .with_constant("pi", std::f64::consts::PI)
    }

    #[must_use]
    pub fn with_function(mut self, name: impl Into<String>, function: Function) -> Self {
        self.functions.insert(name.into(), function);
        self
    }

    #[must_use]
    pub fn with_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    pub fn function(&self, name: &str) -> Option<Function> {
        self.functions.get(name).copied()
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::standard()
    }
}
