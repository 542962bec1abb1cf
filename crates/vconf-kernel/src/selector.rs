//! Bulk selection rules over record addresses.
//!
//! A selector is a registry name (or `*`) followed by `/`-separated segment
//! patterns, e.g. `geo:setup/layer[0;3)/*{7}`. It matches every record whose
//! leading segments satisfy the patterns, i.e. the records under them.

use crate::address::{Address, Cursor, Segment};
use crate::address_set::AddressSet;
use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPattern {
    /// `None` is the `*` wildcard.
    pub name: Option<String>,
    /// `None` leaves the occurrence rank unconstrained.
    pub ranks: Option<AddressSet>,
}

impl SegmentPattern {
    pub fn matches(&self, segment: &Segment) -> bool {
        if let Some(name) = &self.name {
            if *name != segment.name {
                return false;
            }
        }
        match &self.ranks {
            None => true,
            Some(set) => segment.rank.is_some_and(|r| set.matches(r)),
        }
    }
}

impl fmt::Display for SegmentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or("*"))?;
        if let Some(set) = &self.ranks {
            write!(f, "{set}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    /// `None` matches every registry.
    pub registry: Option<String>,
    pub patterns: Vec<SegmentPattern>,
}

impl Selector {
    pub fn matches_path(&self, registry: &str, segments: &[Segment]) -> bool {
        if self.registry.as_deref().is_some_and(|r| r != registry) {
            return false;
        }
        segments.len() >= self.patterns.len()
            && self
                .patterns
                .iter()
                .zip(segments)
                .all(|(pattern, segment)| pattern.matches(segment))
    }

    /// Addresses without a registry never match a registry-bound selector.
    pub fn matches(&self, address: &Address) -> bool {
        match (&self.registry, &address.registry) {
            (Some(_), None) => false,
            (_, registry) => {
                self.matches_path(registry.as_deref().unwrap_or(""), &address.segments)
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.registry.as_deref().unwrap_or("*"))?;
        for (i, pattern) in self.patterns.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{pattern}")?;
        }
        Ok(())
    }
}

impl FromStr for Selector {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor::new(s);
        let registry = if cursor.eat('*') {
            None
        } else {
            Some(cursor.identifier()?)
        };
        cursor.expect(':')?;
        let mut patterns = Vec::new();
        if !cursor.at_end() {
            patterns.push(pattern(&mut cursor)?);
            while cursor.eat('/') {
                patterns.push(pattern(&mut cursor)?);
            }
        }
        cursor.finish()?;
        Ok(Selector { registry, patterns })
    }
}

fn pattern(cursor: &mut Cursor<'_>) -> Result<SegmentPattern, ParseError> {
    let name = if cursor.eat('*') {
        None
    } else {
        Some(cursor.identifier()?)
    };
    let ranks = if AddressSet::starts_at(cursor) {
        Some(AddressSet::parse_from(cursor)?)
    } else {
        None
    };
    Ok(SegmentPattern { name, ranks })
}
