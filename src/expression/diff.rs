use std::sync::Arc;

use super::{Expr, Function};

impl Expr {
    /// Symbolic partial derivative with respect to `variable`
    ///
    /// The result is folded only through the identities `0 + u`, `u - 0`, `0 * u`, `1 * u`,
    /// `u / 1`, `u^1`, `u^0` and arithmetic between constants. Differentiation is total: every
    /// expression the parser can build has a derivative expression, although evaluating it may
    /// still fail where the original function is not differentiable.
    #[must_use]
    pub fn differentiate(&self, variable: &str) -> Self {
        if !self.contains_variable(variable) {
            return Self::Constant(0.0);
        }

        match self {
            Self::Constant(_) => Self::Constant(0.0),
            Self::Variable(name) => Self::Constant(if name == variable { 1.0 } else { 0.0 }),
            Self::Add(u, v) => sum(u.differentiate(variable), v.differentiate(variable)),
            Self::Sub(u, v) => difference(u.differentiate(variable), v.differentiate(variable)),
            Self::Mul(u, v) => sum(
                product(u.differentiate(variable), shared(v)),
                product(shared(u), v.differentiate(variable)),
            ),
            Self::Div(u, v) => {
                let du = u.differentiate(variable);
                if !v.contains_variable(variable) {
                    return quotient(du, shared(v));
                }
                let dv = v.differentiate(variable);
                quotient(
                    difference(product(du, shared(v)), product(shared(u), dv)),
                    power(shared(v), Self::Constant(2.0)),
                )
            }
            Self::Pow(u, v) => {
                if !v.contains_variable(variable) {
                    // c u^(c - 1) u'
                    let reduced = v.as_constant().map_or_else(
                        || difference(shared(v), Self::Constant(1.0)),
                        |c| Self::Constant(c - 1.0),
                    );
                    product(
                        product(shared(v), power(shared(u), reduced)),
                        u.differentiate(variable),
                    )
                } else if !u.contains_variable(variable) {
                    // u^v ln(u) v'
                    product(
                        product(self.clone(), call(Function::Ln, shared(u))),
                        v.differentiate(variable),
                    )
                } else {
                    // u^v (v' ln(u) + v u' / u)
                    product(
                        self.clone(),
                        sum(
                            product(v.differentiate(variable), call(Function::Ln, shared(u))),
                            quotient(product(shared(v), u.differentiate(variable)), shared(u)),
                        ),
                    )
                }
            }
            Self::Neg(u) => negation(u.differentiate(variable)),
            Self::Func(function, u) => {
                product(outer_derivative(*function, u), u.differentiate(variable))
            }
        }
    }

    fn is_zero(&self) -> bool {
        self.as_constant() == Some(0.0)
    }

    fn is_one(&self) -> bool {
        self.as_constant() == Some(1.0)
    }
}

/// Derivative of the function itself, evaluated at `u`
fn outer_derivative(function: Function, u: &Arc<Expr>) -> Expr {
    let arg = || shared(u);
    match function {
        Function::Sin => call(Function::Cos, arg()),
        Function::Cos => negation(call(Function::Sin, arg())),
        // 1 / cos(u)^2
        Function::Tan => quotient(
            Expr::Constant(1.0),
            power(call(Function::Cos, arg()), Expr::Constant(2.0)),
        ),
        // 1 / sqrt(1 - u^2)
        Function::Asin => quotient(Expr::Constant(1.0), unit_circle(arg())),
        Function::Acos => negation(quotient(Expr::Constant(1.0), unit_circle(arg()))),
        // 1 / (1 + u^2)
        Function::Atan => quotient(
            Expr::Constant(1.0),
            sum(Expr::Constant(1.0), power(arg(), Expr::Constant(2.0))),
        ),
        Function::Sinh => call(Function::Cosh, arg()),
        Function::Cosh => call(Function::Sinh, arg()),
        // 1 - tanh(u)^2
        Function::Tanh => difference(
            Expr::Constant(1.0),
            power(call(Function::Tanh, arg()), Expr::Constant(2.0)),
        ),
        Function::Exp => call(Function::Exp, arg()),
        Function::Ln => quotient(Expr::Constant(1.0), arg()),
        Function::Log10 => quotient(
            Expr::Constant(1.0),
            product(arg(), Expr::Constant(std::f64::consts::LN_10)),
        ),
        // 1 / (2 sqrt(u))
        Function::Sqrt => quotient(
            Expr::Constant(1.0),
            product(Expr::Constant(2.0), call(Function::Sqrt, arg())),
        ),
        Function::Abs => call(Function::Sign, arg()),
        // Piecewise constant, zero wherever it is differentiable
        Function::Sign => Expr::Constant(0.0),
    }
}

/// sqrt(1 - u^2)
fn unit_circle(u: Expr) -> Expr {
    call(
        Function::Sqrt,
        difference(Expr::Constant(1.0), power(u, Expr::Constant(2.0))),
    )
}

/// Cheap copy of a child node: only the top level is cloned, its children stay shared
fn shared(node: &Arc<Expr>) -> Expr {
    (**node).clone()
}

fn call(function: Function, argument: Expr) -> Expr {
    Expr::Func(function, Arc::new(argument))
}

fn sum(a: Expr, b: Expr) -> Expr {
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return Expr::Constant(x + y);
    }
    if a.is_zero() {
        b
    } else if b.is_zero() {
        a
    } else {
        Expr::Add(Arc::new(a), Arc::new(b))
    }
}

fn difference(a: Expr, b: Expr) -> Expr {
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return Expr::Constant(x - y);
    }
    if b.is_zero() {
        a
    } else if a.is_zero() {
        negation(b)
    } else {
        Expr::Sub(Arc::new(a), Arc::new(b))
    }
}

fn product(a: Expr, b: Expr) -> Expr {
    if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
        return Expr::Constant(x * y);
    }
    if a.is_zero() || b.is_zero() {
        Expr::Constant(0.0)
    } else if a.is_one() {
        b
    } else if b.is_one() {
        a
    } else {
        Expr::Mul(Arc::new(a), Arc::new(b))
    }
}

fn quotient(a: Expr, b: Expr) -> Expr {
    if b.is_one() {
        return a;
    }
    match (a.as_constant(), b.as_constant()) {
        (Some(x), Some(y)) if y != 0.0 => Expr::Constant(x / y),
        (Some(x), _) if x == 0.0 => Expr::Constant(0.0),
        _ => Expr::Div(Arc::new(a), Arc::new(b)),
    }
}

fn power(base: Expr, exponent: Expr) -> Expr {
    if exponent.is_zero() {
        Expr::Constant(1.0)
    } else if exponent.is_one() {
        base
    } else {
        Expr::Pow(Arc::new(base), Arc::new(exponent))
    }
}

fn negation(a: Expr) -> Expr {
    match a {
        Expr::Constant(value) => Expr::Constant(-value),
        Expr::Neg(inner) => shared(&inner),
        other => Expr::Neg(Arc::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse, Bindings, Expr};

    fn derivative_at(text: &str, variable: &str, pairs: &[(&str, f64)]) -> f64 {
        let bindings: Bindings = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), *value))
            .collect();
        parse(text)
            .unwrap()
            .differentiate(variable)
            .evaluate(&bindings)
            .unwrap()
    }

    #[test]
    fn constants_and_foreign_variables_vanish() {
        assert_eq!(parse("3.5").unwrap().differentiate("x"), Expr::Constant(0.0));
        assert_eq!(parse("y * z").unwrap().differentiate("x"), Expr::Constant(0.0));
        assert_eq!(parse("x").unwrap().differentiate("x"), Expr::Constant(1.0));
    }

    #[test]
    fn linear_factor_reduces_to_the_other_factor() {
        assert_eq!(parse("a * x").unwrap().differentiate("a"), Expr::variable("x"));
        assert_eq!(parse("a * x").unwrap().differentiate("x"), Expr::variable("a"));
    }

    #[test]
    fn power_rule_with_constant_exponent() {
        assert_eq!(parse("x^3").unwrap().differentiate("x").render(), "3 * x^2");
        approx::assert_relative_eq!(derivative_at("x^3", "x", &[("x", 2.0)]), 12.0);
    }

    #[test]
    fn power_rule_with_symbolic_constant_exponent() {
        approx::assert_relative_eq!(
            derivative_at("x^n", "x", &[("x", 2.0), ("n", 3.0)]),
            12.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn exponential_rule_when_only_the_exponent_varies() {
        approx::assert_relative_eq!(
            derivative_at("2^x", "x", &[("x", 3.0)]),
            8.0 * std::f64::consts::LN_2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn logarithmic_rule_when_both_vary() {
        // d/dx x^x = x^x (ln x + 1)
        approx::assert_relative_eq!(
            derivative_at("x^x", "x", &[("x", 2.0)]),
            4.0 * (2f64.ln() + 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn quotient_rule() {
        // d/dx a / x = -a / x^2
        approx::assert_relative_eq!(
            derivative_at("a / x", "x", &[("a", 3.0), ("x", 2.0)]),
            -0.75,
            epsilon = 1e-12
        );
        assert_eq!(parse("x / c").unwrap().differentiate("x").render(), "1 / c");
    }

    #[test]
    fn chain_rule_through_functions() {
        approx::assert_relative_eq!(
            derivative_at("sin(2 * x)", "x", &[("x", 0.3)]),
            2.0 * 0.6f64.cos(),
            epsilon = 1e-12
        );
        approx::assert_relative_eq!(
            derivative_at("sqrt(x^2 + 1)", "x", &[("x", 3.0)]),
            3.0 / 10f64.sqrt(),
            epsilon = 1e-12
        );
        approx::assert_relative_eq!(
            derivative_at("log10(x)", "x", &[("x", 5.0)]),
            1.0 / (5.0 * std::f64::consts::LN_10),
            epsilon = 1e-12
        );
    }

    #[test]
    fn double_negation_cancels() {
        assert_eq!(parse("-(-x)").unwrap().differentiate("x"), Expr::Constant(1.0));
    }
}
