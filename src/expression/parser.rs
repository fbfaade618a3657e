//! Pratt parser for model expressions
//!
//! Binding powers, loosest first:
//! - `+ -` (10), left associative
//! - `* /` (20), left associative
//! - unary `-` and `+` (25)
//! - `^` (30), right associative, so `-x^2` is `-(x^2)` and `2^3^2` is `2^(3^2)`

use std::sync::Arc;

use super::error::{ParseError, Span};
use super::functions::FunctionTable;
use super::lexer::{tokenize, Token, TokenKind};
use super::Expr;

const ADDITIVE: u8 = 10;
const MULTIPLICATIVE: u8 = 20;
const UNARY: u8 = 25;
const POWER: u8 = 30;

pub(crate) fn parse(input: &str, functions: &FunctionTable) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        functions,
        end: input.len(),
    };
    let expr = parser.parse_expr(0)?;

    match parser.current() {
        None => Ok(expr),
        Some(token) if token.kind == TokenKind::RightParen => {
            Err(ParseError::syntax("unbalanced ')'", token.span))
        }
        Some(token) => Err(ParseError::syntax(
            format!("unexpected '{}'", &input[token.span.start..token.span.end]),
            token.span,
        )),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    functions: &'a FunctionTable,
    /// Length of the input, used to locate errors at the end of the text
    end: usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_prefix()?;

        while let Some(token) = self.current() {
            let Some((precedence, right_associative)) = infix_binding(&token.kind) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.advance();

            let next_precedence = if right_associative {
                precedence
            } else {
                precedence + 1
            };
            let right = Arc::new(self.parse_expr(next_precedence)?);
            let left_node = Arc::new(left);

            left = match token.kind {
                TokenKind::Plus => Expr::Add(left_node, right),
                TokenKind::Minus => Expr::Sub(left_node, right),
                TokenKind::Star => Expr::Mul(left_node, right),
                TokenKind::Slash => Expr::Div(left_node, right),
                _ => Expr::Pow(left_node, right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::syntax(
                "unexpected end of input, expected an operand",
                Span::at(self.end),
            ));
        };

        match &token.kind {
            TokenKind::Number(value) => Ok(Expr::Constant(*value)),
            TokenKind::Identifier(name) => {
                if self
                    .current()
                    .is_some_and(|next| next.kind == TokenKind::LeftParen)
                {
                    return self.parse_call(name, token.span);
                }
                Ok(self
                    .functions
                    .constant(name)
                    .map_or_else(|| Expr::Variable(name.clone()), Expr::Constant))
            }
            TokenKind::Minus => Ok(Expr::Neg(Arc::new(self.parse_expr(UNARY)?))),
            TokenKind::Plus => self.parse_expr(UNARY),
            TokenKind::LeftParen => {
                let inner = self.parse_expr(0)?;
                self.expect_closing(token.span)?;
                Ok(inner)
            }
            TokenKind::RightParen => Err(ParseError::syntax("unbalanced ')'", token.span)),
            TokenKind::Star | TokenKind::Slash | TokenKind::Caret => Err(ParseError::syntax(
                "operator is missing its left operand",
                token.span,
            )),
        }
    }

    fn parse_call(&mut self, name: &str, span: Span) -> Result<Expr, ParseError> {
        let function = self
            .functions
            .function(name)
            .ok_or_else(|| ParseError::UnknownFunction {
                name: name.to_owned(),
                span,
            })?;

        // Consume the opening parenthesis
        let open = self.advance().map_or(span, |token| token.span);
        let argument = self.parse_expr(0)?;
        self.expect_closing(open)?;

        Ok(Expr::Func(function, Arc::new(argument)))
    }

    fn expect_closing(&mut self, open: Span) -> Result<(), ParseError> {
        match self.advance() {
            Some(token) if token.kind == TokenKind::RightParen => Ok(()),
            _ => Err(ParseError::syntax("unbalanced '('", open)),
        }
    }
}

const fn infix_binding(kind: &TokenKind) -> Option<(u8, bool)> {
    match kind {
        TokenKind::Plus | TokenKind::Minus => Some((ADDITIVE, false)),
        TokenKind::Star | TokenKind::Slash => Some((MULTIPLICATIVE, false)),
        TokenKind::Caret => Some((POWER, true)),
        _ => None,
    }
}
