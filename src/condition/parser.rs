//! Text form of conditions.
//!
//! Grammar, keywords case-insensitive:
//!
//! ```text
//! expression := conjunction (OR conjunction)*
//! conjunction := unary (AND unary)*
//! unary := NOT atom | atom
//! atom := '(' expression ')' | quantifier
//! quantifier := (ANY | ALL | SOME | NONE) '(' path (',' path)* ')'
//! ```
//!
//! e.g. `ANY(shipped, cancelled) AND NOT NONE(billing.settled)`.

use crate::condition::Condition;
use thiserror::Error;

/// Failure to parse a condition expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A token that does not fit the grammar at its position. The offset is
    /// the 1-based character position of the token in the input.
    #[error("unexpected token {token:?} at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },
    /// The input ended while more was expected.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    offset: usize,
}

/// Split the input into word and punctuation tokens, recording each token's
/// 1-based character offset.
fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word_start = None;

    let flush = |tokens: &mut Vec<Token>, input: &str, start: usize, end: usize| {
        tokens.push(Token {
            text: input[start..end].to_owned(),
            offset: input[..start].chars().count() + 1,
        });
    };

    for (index, ch) in input.char_indices() {
        if ch.is_whitespace() || matches!(ch, '(' | ')' | ',') {
            if let Some(start) = word_start.take() {
                flush(&mut tokens, input, start, index);
            }
            if !ch.is_whitespace() {
                flush(&mut tokens, input, index, index + ch.len_utf8());
            }
        } else if word_start.is_none() {
            word_start = Some(index);
        }
    }
    if let Some(start) = word_start {
        flush(&mut tokens, input, start, input.len());
    }
    tokens
}

/// Parse a condition expression.
pub fn parse(input: &str) -> Result<Condition, ParseError> {
    let mut parser = Parser {
        tokens: tokenize(input),
        position: 0,
    };
    let condition = parser.expression()?;
    if let Some(trailing) = parser.peek() {
        return Err(ParseError::UnexpectedToken {
            token: trailing.text.clone(),
            offset: trailing.offset,
        });
    }
    Ok(condition)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(ParseError::UnexpectedEnd)?;
        self.position += 1;
        Ok(token)
    }

    fn peek_is(&self, keyword: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.text.eq_ignore_ascii_case(keyword))
    }

    fn expect(&mut self, expected: &str) -> Result<(), ParseError> {
        let token = self.advance()?;
        if token.text.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                token: token.text,
                offset: token.offset,
            })
        }
    }

    fn expression(&mut self) -> Result<Condition, ParseError> {
        let mut arms = vec![self.conjunction()?];
        while self.peek_is("OR") {
            self.advance()?;
            arms.push(self.conjunction()?);
        }
        Ok(if arms.len() == 1 {
            arms.pop().expect("one arm")
        } else {
            Condition::Or(arms)
        })
    }

    fn conjunction(&mut self) -> Result<Condition, ParseError> {
        let mut arms = vec![self.unary()?];
        while self.peek_is("AND") {
            self.advance()?;
            arms.push(self.unary()?);
        }
        Ok(if arms.len() == 1 {
            arms.pop().expect("one arm")
        } else {
            Condition::And(arms)
        })
    }

    fn unary(&mut self) -> Result<Condition, ParseError> {
        if self.peek_is("NOT") {
            self.advance()?;
            return Ok(Condition::Not(Box::new(self.atom()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Condition, ParseError> {
        if self.peek_is("(") {
            self.advance()?;
            let inner = self.expression()?;
            self.expect(")")?;
            return Ok(inner);
        }
        self.quantifier()
    }

    fn quantifier(&mut self) -> Result<Condition, ParseError> {
        let token = self.advance()?;
        let build: fn(Vec<String>) -> Condition = if token.text.eq_ignore_ascii_case("ANY") {
            Condition::AnyOf
        } else if token.text.eq_ignore_ascii_case("ALL") {
            Condition::AllOf
        } else if token.text.eq_ignore_ascii_case("SOME") {
            Condition::SomeOf
        } else if token.text.eq_ignore_ascii_case("NONE") {
            Condition::NoneOf
        } else {
            return Err(ParseError::UnexpectedToken {
                token: token.text,
                offset: token.offset,
            });
        };

        self.expect("(")?;
        let mut paths = vec![self.state_path()?];
        while self.peek_is(",") {
            self.advance()?;
            paths.push(self.state_path()?);
        }
        self.expect(")")?;
        Ok(build(paths))
    }

    fn state_path(&mut self) -> Result<String, ParseError> {
        let token = self.advance()?;
        if matches!(token.text.as_str(), "(" | ")" | ",") {
            return Err(ParseError::UnexpectedToken {
                token: token.text,
                offset: token.offset,
            });
        }
        Ok(token.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn single_quantifier() {
        assert_eq!(
            parse("ANY(open)").unwrap(),
            Condition::AnyOf(paths(&["open"]))
        );
    }

    #[test]
    fn quantifier_with_path_list() {
        assert_eq!(
            parse("NONE(shipped, billing.settled)").unwrap(),
            Condition::NoneOf(paths(&["shipped", "billing.settled"]))
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            parse("any(open) and not none(closed)").unwrap(),
            Condition::And(vec![
                Condition::AnyOf(paths(&["open"])),
                Condition::Not(Box::new(Condition::NoneOf(paths(&["closed"])))),
            ])
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(
            parse("ALL(a) OR ALL(b) AND ALL(c)").unwrap(),
            Condition::Or(vec![
                Condition::AllOf(paths(&["a"])),
                Condition::And(vec![
                    Condition::AllOf(paths(&["b"])),
                    Condition::AllOf(paths(&["c"])),
                ]),
            ])
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            parse("(ALL(a) OR ALL(b)) AND ALL(c)").unwrap(),
            Condition::And(vec![
                Condition::Or(vec![
                    Condition::AllOf(paths(&["a"])),
                    Condition::AllOf(paths(&["b"])),
                ]),
                Condition::AllOf(paths(&["c"])),
            ])
        );
    }

    #[test]
    fn negation_nests_only_through_parentheses() {
        // the second NOT begins at character 5
        assert_eq!(
            parse("NOT NOT SOME(a)").unwrap_err(),
            ParseError::UnexpectedToken {
                token: "NOT".to_owned(),
                offset: 5,
            }
        );
        assert_eq!(
            parse("NOT (NOT SOME(a))").unwrap(),
            Condition::Not(Box::new(Condition::Not(Box::new(Condition::SomeOf(
                paths(&["a"])
            )))))
        );
    }

    #[test]
    fn error_carries_token_and_offset() {
        // "BOGUS" begins at character 1
        assert_eq!(
            parse("BOGUS(open)").unwrap_err(),
            ParseError::UnexpectedToken {
                token: "BOGUS".to_owned(),
                offset: 1,
            }
        );
        // the stray comma after the parenthesized group begins at character 10
        assert_eq!(
            parse("ANY(open),").unwrap_err(),
            ParseError::UnexpectedToken {
                token: ",".to_owned(),
                offset: 10,
            }
        );
    }

    #[test]
    fn truncated_input_is_unexpected_end() {
        assert_eq!(parse("ANY(open").unwrap_err(), ParseError::UnexpectedEnd);
        assert_eq!(parse("NOT").unwrap_err(), ParseError::UnexpectedEnd);
        assert_eq!(parse("").unwrap_err(), ParseError::UnexpectedEnd);
    }

    #[test]
    fn offsets_count_whitespace() {
        // "ANY (open) XYZ" : XYZ begins at character 12
        assert_eq!(
            parse("ANY (open) XYZ").unwrap_err(),
            ParseError::UnexpectedToken {
                token: "XYZ".to_owned(),
                offset: 12,
            }
        );
    }
}
