//! Typed parameter values and their text form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of value a parameter holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    Integer,
    Real,
    String,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::String => "string",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parameter value.
///
/// Deserializes untagged, so `true`, `10`, `2.5` and `"fast"` land on the
/// obvious variant. [`Value::coerce`] widens integers written for real
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Real(_) => ValueKind::Real,
            Value::String(_) => ValueKind::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to `kind` when the conversion is lossless.
    ///
    /// Only integer -> real widening is performed; every other mismatch is
    /// reported. Reals must be finite, since the text form has no spelling
    /// for infinities or NaN.
    pub fn coerce(self, kind: ValueKind) -> Result<Value, String> {
        match (self, kind) {
            (Value::Real(r), ValueKind::Real) if !r.is_finite() => {
                Err(format!("'{r}' is not a finite real number"))
            }
            (value, kind) if value.kind() == kind => Ok(value),
            (Value::Integer(i), ValueKind::Real) => Ok(Value::Real(i as f64)),
            (value, kind) => Err(format!(
                "expected a {kind} value, got {} '{value}'",
                value.kind()
            )),
        }
    }

    /// Parse the text form of a value of the given kind.
    pub fn parse(kind: ValueKind, text: &str) -> Result<Value, String> {
        let token = text.trim();
        match kind {
            ValueKind::Boolean => match token.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(format!("'{token}' is not a boolean")),
            },
            ValueKind::Integer => token
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| format!("'{token}' is not an integer: {e}")),
            ValueKind::Real => {
                let value = token
                    .parse::<f64>()
                    .map_err(|e| format!("'{token}' is not a real number: {e}"))?;
                if !value.is_finite() {
                    return Err(format!("'{token}' is not a finite real number"));
                }
                Ok(Value::Real(value))
            }
            ValueKind::String => parse_string_token(token).map(Value::String),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

/// Text form accepted by [`Value::parse`]; strings are always quoted.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

fn parse_string_token(token: &str) -> Result<String, String> {
    let Some(body) = token.strip_prefix('"') else {
        return Ok(token.to_string());
    };
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => return Err(format!("unsupported escape '\\{other}'")),
                None => return Err("dangling escape at end of string".to_string()),
            },
            '"' => {
                let rest = chars.as_str();
                if !rest.trim().is_empty() {
                    return Err(format!("unexpected trailing text '{rest}'"));
                }
                return Ok(out);
            }
            c => out.push(c),
        }
    }
    Err("unterminated quoted string".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_accept_words_and_digits() {
        assert_eq!(
            Value::parse(ValueKind::Boolean, " TRUE "),
            Ok(Value::Boolean(true))
        );
        assert_eq!(Value::parse(ValueKind::Boolean, "0"), Ok(Value::Boolean(false)));
        assert!(Value::parse(ValueKind::Boolean, "yes").is_err());
    }

    #[test]
    fn reals_keep_shortest_form() {
        let v = Value::parse(ValueKind::Real, "2.50").expect("real must parse");
        assert_eq!(v.to_string(), "2.5");
        assert!(Value::parse(ValueKind::Real, "inf").is_err());
    }

    #[test]
    fn strings_are_quoted_and_escaped() {
        let v = Value::from(r#"say "hi" \o/"#);
        let text = v.to_string();
        assert_eq!(text, r#""say \"hi\" \\o/""#);
        assert_eq!(Value::parse(ValueKind::String, &text), Ok(v));
    }

    #[test]
    fn control_characters_are_escaped() {
        let v = Value::from("a\nb\tc\r");
        let text = v.to_string();
        assert_eq!(text, r#""a\nb\tc\r""#);
        assert!(!text.contains('\n'));
        assert_eq!(Value::parse(ValueKind::String, &text), Ok(v));
    }

    #[test]
    fn non_finite_reals_do_not_coerce() {
        assert!(Value::Real(f64::INFINITY).coerce(ValueKind::Real).is_err());
        assert!(Value::Real(f64::NAN).coerce(ValueKind::Real).is_err());
        assert_eq!(Value::Real(0.5).coerce(ValueKind::Real), Ok(Value::Real(0.5)));
    }

    #[test]
    fn bare_strings_are_accepted() {
        assert_eq!(
            Value::parse(ValueKind::String, " fast "),
            Ok(Value::from("fast"))
        );
        assert!(Value::parse(ValueKind::String, "\"open").is_err());
        assert!(Value::parse(ValueKind::String, "\"a\" b").is_err());
    }

    #[test]
    fn coerce_widens_integers_only() {
        assert_eq!(Value::Integer(3).coerce(ValueKind::Real), Ok(Value::Real(3.0)));
        assert!(Value::Real(3.0).coerce(ValueKind::Integer).is_err());
        assert!(Value::from("x").coerce(ValueKind::Boolean).is_err());
    }

    #[test]
    fn untagged_deserialization_picks_variant() {
        let values: Vec<Value> =
            serde_json::from_str(r#"[true, 10, 2.5, "fast"]"#).expect("values must parse");
        assert_eq!(
            values,
            vec![
                Value::Boolean(true),
                Value::Integer(10),
                Value::Real(2.5),
                Value::from("fast"),
            ]
        );
    }
}
