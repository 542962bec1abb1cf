//! Address grammar: `registry:segment[rank]/segment@group`.
//!
//! ```text
//! identifier      ::= (alpha | '_') (alnum | '_' | '.' | '-')*
//! segment         ::= identifier ('[' digits ']')?
//! local_path      ::= segment ('/' segment)*
//! full_path_group ::= (identifier ':')? local_path ('@' identifier)?
//! ```
//!
//! Parsing trims surrounding whitespace and must consume the rest of the
//! input. `Display` is the exact inverse of `FromStr`.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One path component: a name with an optional occurrence rank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rank: None,
        }
    }

    pub fn ranked(name: impl Into<String>, rank: u32) -> Self {
        Self {
            name: name.into(),
            rank: Some(rank),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(rank) = self.rank {
            write!(f, "[{rank}]")?;
        }
        Ok(())
    }
}

/// A parsed node address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Address {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            registry: None,
            segments,
            group: None,
        }
    }

    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// The `/`-joined segments, without registry or group.
    pub fn local_path(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(&segment.to_string());
        }
        out
    }

    /// Parse a bare local path (no registry, no group).
    pub fn parse_local(text: &str) -> Result<Self, ParseError> {
        let address: Address = text.parse()?;
        if address.registry.is_some() || address.group.is_some() {
            return Err(ParseError::new(
                0,
                format!("expected a local path, got '{}'", text.trim()),
            ));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}:")?;
        }
        f.write_str(&self.local_path())?;
        if let Some(group) = &self.group {
            write!(f, "@{group}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor::new(s);
        let mut registry = None;
        let mut segments = Vec::new();

        let first = cursor.identifier()?;
        if cursor.eat(':') {
            registry = Some(first);
            segments.push(cursor.segment()?);
        } else {
            let rank = cursor.rank_suffix()?;
            segments.push(Segment { name: first, rank });
        }
        while cursor.eat('/') {
            segments.push(cursor.segment()?);
        }
        let group = if cursor.eat('@') {
            Some(cursor.identifier()?)
        } else {
            None
        };
        cursor.finish()?;
        Ok(Address {
            registry,
            segments,
            group,
        })
    }
}

/// Byte cursor shared by the address, address-set and selector parsers.
pub(crate) struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        let start = input.len() - input.trim_start().len();
        let end = input.trim_end().len().max(start);
        Self {
            input,
            pos: start,
            end,
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.input[self.pos..self.end].chars().next()
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    pub(crate) fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{c}'")))
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.pos, message)
    }

    pub(crate) fn unexpected(&self, wanted: &str) -> ParseError {
        match self.peek() {
            Some(c) => self.error(format!("expected {wanted}, found '{c}'")),
            None => self.error(format!("expected {wanted}, found end of input")),
        }
    }

    pub(crate) fn finish(&self) -> Result<(), ParseError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    pub(crate) fn identifier(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.pos += 1,
            _ => return Err(self.unexpected("identifier")),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    /// Decimal digits without leading zeros, so every number has one
    /// spelling.
    pub(crate) fn number(&mut self) -> Result<u32, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.unexpected("digits"));
        }
        if self.pos - start > 1 && self.input[start..].starts_with('0') {
            return Err(ParseError::new(start, "number has a leading zero"));
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| ParseError::new(start, "number out of range"))
    }

    fn rank_suffix(&mut self) -> Result<Option<u32>, ParseError> {
        if !self.eat('[') {
            return Ok(None);
        }
        let rank = self.number()?;
        self.expect(']')?;
        Ok(Some(rank))
    }

    fn segment(&mut self) -> Result<Segment, ParseError> {
        let name = self.identifier()?;
        let rank = self.rank_suffix()?;
        Ok(Segment { name, rank })
    }
}
