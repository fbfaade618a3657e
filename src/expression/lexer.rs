use std::iter::Peekable;
use std::str::CharIndices;

use super::error::{ParseError, Span};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LeftParen,
    RightParen,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

/// Characters pasted from rich text editors that carry no meaning in a formula
pub(crate) const fn is_ignorable(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// Split model text into tokens
///
/// Whitespace (including non-breaking and ideographic spaces) separates tokens, zero-width
/// characters are dropped and `**` is accepted as a spelling of `^`.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut chars = input.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() || is_ignorable(c) {
            chars.next();
            continue;
        }

        let kind = match c {
            '0'..='9' | '.' => {
                let end = number_end(input, &mut chars);
                let text = &input[start..end];
                let value = text.parse::<f64>().map_err(|_| {
                    ParseError::syntax(format!("malformed number '{text}'"), Span::new(start, end))
                })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    span: Span::new(start, end),
                });
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Identifier(input[start..end].to_owned()),
                    span: Span::new(start, end),
                });
                continue;
            }
            '+' => TokenKind::Plus,
            '-' | '\u{2212}' => TokenKind::Minus,
            '*' | '\u{00D7}' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '^' => TokenKind::Caret,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            other => {
                return Err(ParseError::syntax(
                    format!("unexpected character '{other}'"),
                    Span::new(start, start + other.len_utf8()),
                ))
            }
        };
        chars.next();

        let mut end = start + c.len_utf8();
        let kind = if kind == TokenKind::Star && matches!(chars.peek(), Some((_, '*'))) {
            chars.next();
            end += 1;
            TokenKind::Caret
        } else {
            kind
        };
        tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    Ok(tokens)
}

/// Consume a numeric literal: digits, an optional fraction and an optional exponent
fn number_end(input: &str, chars: &mut Peekable<CharIndices>) -> usize {
    let mut seen_dot = false;
    while let Some(&(i, c)) = chars.peek() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            'e' | 'E' => return exponent_end(input, i, chars),
            _ => return i,
        }
        chars.next();
    }
    input.len()
}

/// The exponent marker is only taken when digits follow it, so `2e` lexes as the number `2`
/// followed by the identifier `e`
fn exponent_end(input: &str, marker: usize, chars: &mut Peekable<CharIndices>) -> usize {
    let rest = &input[marker + 1..];
    let signed = rest.starts_with(|c| c == '+' || c == '-');
    let digits = if signed { &rest[1..] } else { rest };
    if !digits.starts_with(|d: char| d.is_ascii_digit()) {
        return marker;
    }

    chars.next();
    if signed {
        chars.next();
    }
    while let Some(&(i, d)) = chars.peek() {
        if !d.is_ascii_digit() {
            return i;
        }
        chars.next();
    }
    input.len()
}

#[cfg(test)]
mod tests {
    use super::{tokenize, TokenKind};

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn numbers_accept_fractions_and_exponents() {
        assert_eq!(
            kinds("1 .5 2. 1e-3 4.5E+2"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(0.5),
                TokenKind::Number(2.0),
                TokenKind::Number(1e-3),
                TokenKind::Number(450.0),
            ]
        );
    }

    #[test]
    fn exponent_marker_without_digits_starts_an_identifier() {
        assert_eq!(
            kinds("2e"),
            vec![
                TokenKind::Number(2.0),
                TokenKind::Identifier("e".to_owned())
            ]
        );
    }

    #[test]
    fn identifiers_may_be_unicode() {
        assert_eq!(
            kinds("R_ref*α2"),
            vec![
                TokenKind::Identifier("R_ref".to_owned()),
                TokenKind::Star,
                TokenKind::Identifier("α2".to_owned()),
            ]
        );
    }

    #[test]
    fn pasted_spaces_and_zero_width_characters_are_ignored() {
        assert_eq!(
            kinds("a\u{00A0}+\u{200B}b\u{3000}"),
            vec![
                TokenKind::Identifier("a".to_owned()),
                TokenKind::Plus,
                TokenKind::Identifier("b".to_owned()),
            ]
        );
    }

    #[test]
    fn double_star_is_power() {
        assert_eq!(
            kinds("x**2"),
            vec![
                TokenKind::Identifier("x".to_owned()),
                TokenKind::Caret,
                TokenKind::Number(2.0),
            ]
        );
    }

    #[test]
    fn unknown_characters_are_located() {
        let error = tokenize("a + $b").unwrap_err();
        assert_eq!(error.span().start, 4);
    }
}
