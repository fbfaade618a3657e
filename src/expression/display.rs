use std::fmt;

use super::Expr;

impl Expr {
    /// Binding level used to decide where parentheses are needed
    ///
    /// Negative constants print with a leading `-` and therefore rank with negation.
    fn precedence(&self) -> u8 {
        match self {
            Self::Add(..) | Self::Sub(..) => 1,
            Self::Mul(..) | Self::Div(..) => 2,
            Self::Neg(_) => 3,
            Self::Constant(value) if value.is_sign_negative() => 3,
            Self::Pow(..) => 4,
            Self::Constant(_) | Self::Variable(_) | Self::Func(..) => 5,
        }
    }

    /// Infix text that parses back to an expression with the same value
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Variable(name) => f.write_str(name),
            Self::Add(l, r) => binary(f, l, " + ", r, 1),
            Self::Sub(l, r) => binary(f, l, " - ", r, 1),
            Self::Mul(l, r) => binary(f, l, " * ", r, 2),
            Self::Div(l, r) => binary(f, l, " / ", r, 2),
            Self::Pow(base, exponent) => {
                // `^` is right associative, so only the base needs to bind tighter
                operand(f, base, 5)?;
                f.write_str("^")?;
                operand(f, exponent, 4)
            }
            Self::Neg(inner) => {
                f.write_str("-")?;
                operand(f, inner, 3)
            }
            Self::Func(function, argument) => write!(f, "{}({argument})", function.name()),
        }
    }
}

/// Left associative operators need a strictly tighter right operand
fn binary(
    f: &mut fmt::Formatter<'_>,
    left: &Expr,
    operator: &str,
    right: &Expr,
    level: u8,
) -> fmt::Result {
    operand(f, left, level)?;
    f.write_str(operator)?;
    operand(f, right, level + 1)
}

fn operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min_level: u8) -> fmt::Result {
    if expr.precedence() < min_level {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::{parse, Expr};

    fn num(value: f64) -> Arc<Expr> {
        Arc::new(Expr::Constant(value))
    }

    fn var(name: &str) -> Arc<Expr> {
        Arc::new(Expr::variable(name))
    }

    #[test]
    fn parentheses_only_where_needed() {
        for text in [
            "a + b * c",
            "(a + b) * c",
            "a - (b - c)",
            "a / (b * c)",
            "a^b^c",
            "(a^b)^c",
            "-x^2",
            "(-x)^2",
            "sin(a + b) * 2",
        ] {
            assert_eq!(parse(text).unwrap().render(), text);
        }
    }

    #[test]
    fn negative_constants_are_guarded() {
        assert_eq!(Expr::Pow(num(-2.0), var("x")).render(), "(-2)^x");
        assert_eq!(Expr::Pow(var("x"), num(-0.5)).render(), "x^(-0.5)");
        assert_eq!(Expr::Sub(var("a"), num(-1.0)).render(), "a - -1");
    }

    #[test]
    fn nested_negation_keeps_both_signs() {
        let expr = Expr::Neg(Arc::new(Expr::Neg(var("x"))));
        assert_eq!(expr.render(), "--x");
        assert_eq!(parse("--x").unwrap(), expr);
    }
}
