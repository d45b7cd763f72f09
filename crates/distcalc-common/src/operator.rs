//! Operator table.
//!
//! Every operator the system understands is a variant of [`Operator`]. Its
//! attributes live in a single static table indexed by the variant, so
//! resolving a symbol is a table lookup rather than dynamic dispatch.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced by the operator table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// The result is not a finite number.
    #[error("arithmetic overflow")]
    Overflow,
}

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

/// Static attributes of one operator.
#[derive(Debug)]
pub struct OperatorSpec {
    pub symbol: char,
    pub name: &'static str,
    pub precedence: u8,
    pub arity: u8,
    apply: fn(f64, f64) -> Result<f64, OperatorError>,
}

fn add(a: f64, b: f64) -> Result<f64, OperatorError> {
    Ok(a + b)
}

fn sub(a: f64, b: f64) -> Result<f64, OperatorError> {
    Ok(a - b)
}

fn mul(a: f64, b: f64) -> Result<f64, OperatorError> {
    Ok(a * b)
}

fn div(a: f64, b: f64) -> Result<f64, OperatorError> {
    if b == 0.0 {
        return Err(OperatorError::DivisionByZero);
    }
    Ok(a / b)
}

// Indexed by `Operator as usize`.
static OPERATORS: [OperatorSpec; 4] = [
    OperatorSpec { symbol: '+', name: "addition", precedence: 1, arity: 2, apply: add },
    OperatorSpec { symbol: '-', name: "subtraction", precedence: 1, arity: 2, apply: sub },
    OperatorSpec { symbol: '*', name: "multiplication", precedence: 2, arity: 2, apply: mul },
    OperatorSpec { symbol: '/', name: "division", precedence: 2, arity: 2, apply: div },
];

impl Operator {
    /// All operators, in table order.
    pub const ALL: [Operator; 4] = [Operator::Add, Operator::Sub, Operator::Mul, Operator::Div];

    pub fn spec(self) -> &'static OperatorSpec {
        &OPERATORS[self as usize]
    }

    pub fn symbol(self) -> char {
        self.spec().symbol
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn precedence(self) -> u8 {
        self.spec().precedence
    }

    pub fn arity(self) -> u8 {
        self.spec().arity
    }

    /// Resolves an operator from its single-character symbol.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Applies the operator to `(a, b)`, where `a` is the left operand.
    ///
    /// Results outside the finite `f64` range are rejected with
    /// [`OperatorError::Overflow`]; JSON has no encoding for them.
    pub fn apply(self, a: f64, b: f64) -> Result<f64, OperatorError> {
        let value = (self.spec().apply)(a, b)?;
        if !value.is_finite() {
            return Err(OperatorError::Overflow);
        }
        Ok(value)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Operator {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Self::from_symbol(c).ok_or_else(|| OperatorError::UnknownOperator(s.to_string()))
            }
            _ => Err(OperatorError::UnknownOperator(s.to_string())),
        }
    }
}

/// Parenthesis tokens. They only scope precedence while parsing and are
/// never evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Open,
    Close,
}

impl Grouping {
    pub fn symbol(self) -> char {
        match self {
            Grouping::Open => '(',
            Grouping::Close => ')',
        }
    }

    pub fn precedence(self) -> u8 {
        0
    }
}

/// Any non-literal symbol recognised by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Operator(Operator),
    Grouping(Grouping),
}

impl Symbol {
    pub fn lookup(c: char) -> Option<Self> {
        match c {
            '(' => Some(Symbol::Grouping(Grouping::Open)),
            ')' => Some(Symbol::Grouping(Grouping::Close)),
            _ => Operator::from_symbol(c).map(Symbol::Operator),
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            Symbol::Operator(op) => op.precedence(),
            Symbol::Grouping(g) => g.precedence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_variants() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
            assert_eq!(op.arity(), 2);
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(Operator::Add.precedence(), 1);
        assert_eq!(Operator::Sub.precedence(), 1);
        assert_eq!(Operator::Mul.precedence(), 2);
        assert_eq!(Operator::Div.precedence(), 2);
        assert_eq!(Grouping::Open.precedence(), 0);
        assert_eq!(Symbol::lookup(')').unwrap().precedence(), 0);
    }

    #[test]
    fn test_apply_is_ordered() {
        assert_eq!(Operator::Sub.apply(5.0, 3.0).unwrap(), 2.0);
        assert_eq!(Operator::Div.apply(8.0, 2.0).unwrap(), 4.0);
        assert_eq!(Operator::Add.apply(2.5, 5.0).unwrap(), 7.5);
        assert_eq!(Operator::Mul.apply(-2.0, 3.0).unwrap(), -6.0);
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(Operator::Div.apply(5.0, 0.0), Err(OperatorError::DivisionByZero));
        assert_eq!(Operator::Div.apply(0.0, 5.0), Ok(0.0));
    }

    #[test]
    fn test_overflow() {
        assert_eq!(Operator::Mul.apply(1e308, 10.0), Err(OperatorError::Overflow));
        assert_eq!(Operator::Add.apply(f64::MAX, f64::MAX), Err(OperatorError::Overflow));
        assert_eq!(Operator::Div.apply(1e308, 1e-10), Err(OperatorError::Overflow));
        assert_eq!(Operator::Sub.apply(-f64::MAX, 1.0), Ok(-f64::MAX));
    }

    #[test]
    fn test_unknown_symbols() {
        assert!(Operator::from_symbol('^').is_none());
        assert!(Symbol::lookup('x').is_none());
        assert!(matches!("%".parse::<Operator>(), Err(OperatorError::UnknownOperator(_))));
        assert!("++".parse::<Operator>().is_err());
        assert!("".parse::<Operator>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        assert_eq!("/".parse::<Operator>().unwrap(), Operator::Div);
        assert_eq!(Operator::Mul.to_string(), "*");
        assert_eq!(Operator::Sub.name(), "subtraction");
    }
}
