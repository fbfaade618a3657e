use super::{Bindings, EvalError, Expr};

impl Expr {
    /// Evaluate the expression for the given variable values
    ///
    /// # Errors
    /// Returns [`EvalError::UnboundVariable`] when a variable has no binding and
    /// [`EvalError::Domain`] for division by zero, arguments outside a function's real domain,
    /// a negative base raised to a non-integer power, zero raised to a negative power and any
    /// intermediate value that is not finite.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<f64, EvalError> {
        let value = match self {
            Self::Constant(value) => *value,
            Self::Variable(name) => {
                *bindings
                    .get(name)
                    .ok_or_else(|| EvalError::UnboundVariable { name: name.clone() })?
            }
            Self::Add(l, r) => l.evaluate(bindings)? + r.evaluate(bindings)?,
            Self::Sub(l, r) => l.evaluate(bindings)? - r.evaluate(bindings)?,
            Self::Mul(l, r) => l.evaluate(bindings)? * r.evaluate(bindings)?,
            Self::Div(l, r) => {
                let numerator = l.evaluate(bindings)?;
                let denominator = r.evaluate(bindings)?;
                if denominator == 0.0 {
                    return Err(self.domain_error("division by zero"));
                }
                numerator / denominator
            }
            Self::Pow(base, exponent) => {
                let base = base.evaluate(bindings)?;
                let exponent = exponent.evaluate(bindings)?;
                if base < 0.0 && exponent.fract() != 0.0 {
                    return Err(self.domain_error("negative base raised to a non-integer power"));
                }
                if base == 0.0 && exponent < 0.0 {
                    return Err(self.domain_error("zero raised to a negative power"));
                }
                base.powf(exponent)
            }
            Self::Neg(inner) => -inner.evaluate(bindings)?,
            Self::Func(function, argument) => {
                let x = argument.evaluate(bindings)?;
                function.apply(x).ok_or_else(|| {
                    self.domain_error(&format!("{}({x}) is undefined", function.name()))
                })?
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.domain_error("non-finite result"))
        }
    }

    fn domain_error(&self, operation: &str) -> EvalError {
        EvalError::Domain {
            operation: operation.to_owned(),
            expression: self.to_string(),
        }
    }
}
