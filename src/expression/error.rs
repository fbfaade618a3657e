use thiserror::Error;

/// Byte range of the input text a parse failure refers to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    /// Start position (0-indexed byte offset)
    pub start: usize,
    /// End position (exclusive)
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn at(position: usize) -> Self {
        Self {
            start: position,
            end: position + 1,
        }
    }

    /// Location suffix for error messages, 1-indexed for users
    pub fn describe(&self) -> String {
        if self.end <= self.start {
            String::new()
        } else if self.end - self.start == 1 {
            format!(" at position {}", self.start + 1)
        } else {
            format!(" at positions {}-{}", self.start + 1, self.end)
        }
    }
}

/// The model text could not be turned into an expression
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error: the expression is empty")]
    Empty,
    /// Unbalanced parentheses, unknown tokens and misplaced operators
    #[error("syntax error: {message}{}", .span.describe())]
    Syntax { message: String, span: Span },
    /// A call to a name the function table does not contain
    #[error("unknown function '{name}'{}", .span.describe())]
    UnknownFunction { name: String, span: Span },
}

impl ParseError {
    pub(crate) fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    pub const fn span(&self) -> Span {
        match self {
            Self::Empty => Span::new(0, 0),
            Self::Syntax { span, .. } | Self::UnknownFunction { span, .. } => *span,
        }
    }
}

/// Evaluation of an expression failed for the supplied bindings
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("variable '{name}' has no value")]
    UnboundVariable { name: String },
    /// `expression` is the rendered sub-expression where the failure happened
    #[error("{operation} in `{expression}`")]
    Domain {
        operation: String,
        expression: String,
    },
}
