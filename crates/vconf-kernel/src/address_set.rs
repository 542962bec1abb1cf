//! Predicates over a single integer address component.
//!
//! Syntax: `{*}` matches everything, `{a;b;c}` an explicit list (`{}` is the
//! empty list), and `[lo;hi)`, `(lo;hi]`, `[lo;hi]`, `(lo;hi)` a range with
//! independently included bounds. `[n]` is accepted as shorthand for `{n}`.

use crate::address::Cursor;
use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSet {
    All,
    List(BTreeSet<u32>),
    Range {
        lo: u32,
        hi: u32,
        lo_inclusive: bool,
        hi_inclusive: bool,
    },
}

impl AddressSet {
    pub fn list(values: impl IntoIterator<Item = u32>) -> Self {
        AddressSet::List(values.into_iter().collect())
    }

    /// The half-open range `[lo;hi)`.
    pub fn half_open(lo: u32, hi: u32) -> Self {
        AddressSet::Range {
            lo,
            hi,
            lo_inclusive: true,
            hi_inclusive: false,
        }
    }

    pub fn matches(&self, n: u32) -> bool {
        match self {
            AddressSet::All => true,
            AddressSet::List(values) => values.contains(&n),
            AddressSet::Range {
                lo,
                hi,
                lo_inclusive,
                hi_inclusive,
            } => {
                let above = if *lo_inclusive { n >= *lo } else { n > *lo };
                let below = if *hi_inclusive { n <= *hi } else { n < *hi };
                above && below
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AddressSet::All => false,
            AddressSet::List(values) => values.is_empty(),
            AddressSet::Range {
                lo,
                hi,
                lo_inclusive,
                hi_inclusive,
            } => match lo.cmp(hi) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => !(*lo_inclusive && *hi_inclusive),
                std::cmp::Ordering::Less => {
                    !*lo_inclusive && !*hi_inclusive && lo.checked_add(1) == Some(*hi)
                }
            },
        }
    }

    pub(crate) fn starts_at(cursor: &Cursor<'_>) -> bool {
        matches!(cursor.peek(), Some('{' | '[' | '('))
    }

    pub(crate) fn parse_from(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        if cursor.eat('{') {
            if cursor.eat('*') {
                cursor.expect('}')?;
                return Ok(AddressSet::All);
            }
            let mut values = BTreeSet::new();
            if cursor.eat('}') {
                return Ok(AddressSet::List(values));
            }
            loop {
                values.insert(cursor.number()?);
                if cursor.eat('}') {
                    return Ok(AddressSet::List(values));
                }
                cursor.expect(';')?;
            }
        }

        let lo_inclusive = if cursor.eat('[') {
            true
        } else if cursor.eat('(') {
            false
        } else {
            return Err(cursor.unexpected("'{', '[' or '('"));
        };
        let lo = cursor.number()?;
        if lo_inclusive && cursor.eat(']') {
            return Ok(AddressSet::list([lo]));
        }
        cursor.expect(';')?;
        let hi = cursor.number()?;
        let hi_inclusive = if cursor.eat(']') {
            true
        } else if cursor.eat(')') {
            false
        } else {
            return Err(cursor.unexpected("']' or ')'"));
        };
        Ok(AddressSet::Range {
            lo,
            hi,
            lo_inclusive,
            hi_inclusive,
        })
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSet::All => f.write_str("{*}"),
            AddressSet::List(values) => {
                f.write_str("{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("}")
            }
            AddressSet::Range {
                lo,
                hi,
                lo_inclusive,
                hi_inclusive,
            } => {
                let open = if *lo_inclusive { '[' } else { '(' };
                let close = if *hi_inclusive { ']' } else { ')' };
                write!(f, "{open}{lo};{hi}{close}")
            }
        }
    }
}

impl FromStr for AddressSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor::new(s);
        let set = AddressSet::parse_from(&mut cursor)?;
        cursor.finish()?;
        Ok(set)
    }
}
