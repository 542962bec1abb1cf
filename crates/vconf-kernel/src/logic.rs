//! Combining logic over the dependees of one depender.
//!
//! Dependees are numbered in registration order; `[n]` holds when the n-th
//! dependee is active. `and`, `or` and `xor` take one or more operands and
//! `not` exactly one. `xor` holds when exactly one operand does.
//!
//! ```text
//! and([0], or([1], not([2])))
//! ```
//!
//! A depender without logic requires every dependee to be active.

use crate::address::Cursor;
use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Logic {
    Slot(usize),
    And(Vec<Logic>),
    Or(Vec<Logic>),
    Xor(Vec<Logic>),
    Not(Box<Logic>),
}

impl Logic {
    /// Evaluate with `active(n)` telling whether dependee `n` is active.
    pub fn evaluate<F>(&self, active: &F) -> bool
    where
        F: Fn(usize) -> bool,
    {
        match self {
            Logic::Slot(slot) => active(*slot),
            Logic::And(operands) => operands.iter().all(|o| o.evaluate(active)),
            Logic::Or(operands) => operands.iter().any(|o| o.evaluate(active)),
            Logic::Xor(operands) => operands.iter().filter(|o| o.evaluate(active)).count() == 1,
            Logic::Not(operand) => !operand.evaluate(active),
        }
    }

    /// Highest dependee slot referenced.
    pub fn max_slot(&self) -> usize {
        match self {
            Logic::Slot(slot) => *slot,
            Logic::And(operands) | Logic::Or(operands) | Logic::Xor(operands) => {
                operands.iter().map(Logic::max_slot).max().unwrap_or(0)
            }
            Logic::Not(operand) => operand.max_slot(),
        }
    }

    fn parse_from(cursor: &mut Cursor<'_>) -> Result<Logic, ParseError> {
        cursor.skip_whitespace();
        if cursor.eat('[') {
            cursor.skip_whitespace();
            let slot = cursor.number()?;
            cursor.skip_whitespace();
            cursor.expect(']')?;
            return Ok(Logic::Slot(slot as usize));
        }
        let start = cursor.pos();
        let operator = cursor.identifier()?.to_ascii_lowercase();
        cursor.skip_whitespace();
        cursor.expect('(')?;
        let mut operands = vec![Logic::parse_from(cursor)?];
        cursor.skip_whitespace();
        while cursor.eat(',') {
            operands.push(Logic::parse_from(cursor)?);
            cursor.skip_whitespace();
        }
        cursor.expect(')')?;
        match operator.as_str() {
            "and" => Ok(Logic::And(operands)),
            "or" => Ok(Logic::Or(operands)),
            "xor" => Ok(Logic::Xor(operands)),
            "not" => match operands.pop() {
                Some(operand) if operands.is_empty() => Ok(Logic::Not(Box::new(operand))),
                _ => Err(ParseError::new(start, "'not' takes exactly one operand")),
            },
            other => Err(ParseError::new(
                start,
                format!("unknown logic operator '{other}'"),
            )),
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (operator, operands) = match self {
            Logic::Slot(slot) => return write!(f, "[{slot}]"),
            Logic::Not(operand) => return write!(f, "not({operand})"),
            Logic::And(operands) => ("and", operands),
            Logic::Or(operands) => ("or", operands),
            Logic::Xor(operands) => ("xor", operands),
        };
        write!(f, "{operator}(")?;
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{operand}")?;
        }
        f.write_str(")")
    }
}

impl FromStr for Logic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor::new(s);
        let logic = Logic::parse_from(&mut cursor)?;
        cursor.skip_whitespace();
        cursor.finish()?;
        Ok(logic)
    }
}
