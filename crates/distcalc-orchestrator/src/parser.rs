//! Infix to postfix conversion.
//!
//! Expressions use the four binary operators from
//! [`distcalc_common::Operator`], parentheses and unsigned decimal literals.
//! Whitespace is ignored. The output is the canonical postfix text: each
//! token followed by exactly one space, so `"2 + 2 * 2"` becomes
//! `"2 2 2 * + "`.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use distcalc_common::{Grouping, Operator, Symbol};

use crate::error::ParseError;

/// Canonical postfix text produced by [`parse_to_postfix`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostfixExpression(String);

/// One whitespace-separated postfix token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Literal(&'a str),
    Operator(Operator),
}

impl PostfixExpression {
    /// Wraps postfix text that was produced by [`parse_to_postfix`] earlier,
    /// e.g. when a job is loaded back from a store.
    pub fn from_canonical(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tokens(&self) -> impl Iterator<Item = Token<'_>> {
        self.0.split_whitespace().map(|raw| {
            let mut chars = raw.chars();
            match (chars.next().and_then(Operator::from_symbol), chars.next()) {
                (Some(op), None) => Token::Operator(op),
                _ => Token::Literal(raw),
            }
        })
    }
}

impl fmt::Display for PostfixExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts an infix expression to postfix.
///
/// Operators are popped while the operator on top of the stack binds at
/// least as tightly as the incoming one, which makes all four operators
/// left-associative.
///
/// # Errors
///
/// - [`ParseError::UnknownOperand`] for any character that is not a digit,
///   `.`, whitespace, operator or parenthesis
/// - [`ParseError::UnmatchedCloseParen`] / [`ParseError::UnmatchedOpenParen`]
/// - [`ParseError::OperandCountMismatch`] when literals and operators do not
///   reduce to exactly one value (this includes the empty expression)
pub fn parse_to_postfix(text: &str) -> Result<PostfixExpression, ParseError> {
    let mut output = String::with_capacity(text.len() + 8);
    let mut stack: Vec<Symbol> = Vec::new();
    let mut pending: i64 = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        if c.is_ascii_digit() {
            let end = scan_literal(&mut chars, position);
            push_token(&mut output, &text[position..end]);
            pending += 1;
            continue;
        }

        match Symbol::lookup(c) {
            Some(Symbol::Operator(op)) => {
                while let Some(&Symbol::Operator(top)) = stack.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    stack.pop();
                    emit_operator(&mut output, top, &mut pending)?;
                }
                stack.push(Symbol::Operator(op));
            }
            Some(Symbol::Grouping(Grouping::Open)) => stack.push(Symbol::Grouping(Grouping::Open)),
            Some(Symbol::Grouping(Grouping::Close)) => loop {
                match stack.pop() {
                    Some(Symbol::Operator(op)) => emit_operator(&mut output, op, &mut pending)?,
                    Some(Symbol::Grouping(_)) => break,
                    None => return Err(ParseError::UnmatchedCloseParen { position }),
                }
            },
            None => return Err(ParseError::UnknownOperand { symbol: c, position }),
        }
    }

    while let Some(symbol) = stack.pop() {
        match symbol {
            Symbol::Operator(op) => emit_operator(&mut output, op, &mut pending)?,
            Symbol::Grouping(_) => return Err(ParseError::UnmatchedOpenParen),
        }
    }

    if pending != 1 {
        return Err(ParseError::OperandCountMismatch { pending });
    }

    Ok(PostfixExpression(output))
}

/// Consumes the rest of a literal that started at `start` and returns its
/// end offset. A literal is a run of digits with at most one `.`.
fn scan_literal(chars: &mut Peekable<CharIndices<'_>>, start: usize) -> usize {
    let mut end = start + 1;
    let mut seen_dot = false;
    while let Some(&(offset, next)) = chars.peek() {
        if next.is_ascii_digit() || (next == '.' && !seen_dot) {
            seen_dot |= next == '.';
            end = offset + 1;
            chars.next();
        } else {
            break;
        }
    }
    end
}

/// Emits a binary operator, which folds the two most recent operands into
/// one. Fewer than two pending operands means the operator is misplaced.
fn emit_operator(output: &mut String, op: Operator, pending: &mut i64) -> Result<(), ParseError> {
    if *pending < 2 {
        return Err(ParseError::OperandCountMismatch { pending: *pending });
    }
    output.push(op.symbol());
    output.push(' ');
    *pending -= 1;
    Ok(())
}

fn push_token(output: &mut String, token: &str) {
    output.push_str(token);
    output.push(' ');
}
