//! Snapshot text: one `key = value` assignment per line.
//!
//! Keys are record paths for a registry snapshot and `registry:path` for a
//! repository snapshot. Blank lines and lines starting with `#` are ignored.

use crate::dependency::RecordRef;
use crate::error::{ParseError, VariantError};
use crate::propagation::Propagator;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    pub(crate) number: usize,
    pub(crate) key: String,
    pub(crate) value: String,
}

impl Line {
    pub(crate) fn bind(self, at: RecordRef) -> Assignment {
        Assignment {
            at,
            key: self.key,
            value: self.value,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Assignment {
    at: RecordRef,
    key: String,
    value: String,
}

pub(crate) fn parse(text: &str) -> Result<Vec<Line>, ParseError> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (index, raw) in text.split('\n').enumerate() {
        let line_offset = offset;
        offset += raw.len() + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(ParseError::new(
                line_offset,
                format!("line {}: expected 'key = value'", index + 1),
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::new(
                line_offset,
                format!("line {}: missing key", index + 1),
            ));
        }
        lines.push(Line {
            number: index + 1,
            key: key.to_string(),
            value: value.trim().to_string(),
        });
    }
    Ok(lines)
}

pub(crate) fn skip(line: &Line, reason: &str) {
    warn!(line = line.number, key = %line.key, reason, "skipping snapshot line");
}

/// Apply assignments in order. Lines hitting an inactive record are retried
/// after the others, so a selecting parameter may appear after the contents
/// of the variant it selects.
pub(crate) fn apply(
    propagator: &mut Propagator<'_>,
    mut pending: Vec<Assignment>,
) -> Result<(), VariantError> {
    loop {
        let before = pending.len();
        let mut deferred = Vec::new();
        for assignment in pending {
            if !propagator.record(assignment.at)?.is_active() {
                deferred.push(assignment);
                continue;
            }
            propagator.assign_text(assignment.at, &assignment.value)?;
        }
        match deferred.first() {
            None => return Ok(()),
            Some(first) if deferred.len() == before => {
                return Err(VariantError::inactive(first.key.as_str()));
            }
            Some(_) => pending = deferred,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let lines = parse("# saved\n\nroot/mode = \"fast\"\n  root/fastCfg/iterations=12  \n")
            .expect("snapshot parses");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].key, "root/mode");
        assert_eq!(lines[0].value, "\"fast\"");
        assert_eq!(lines[1].number, 4);
        assert_eq!(lines[1].value, "12");
    }

    #[test]
    fn values_may_contain_equals_signs() {
        let lines = parse("root/expr = \"a=b\"").expect("snapshot parses");
        assert_eq!(lines[0].value, "\"a=b\"");
    }

    #[test]
    fn malformed_line_reports_its_offset() {
        let err = parse("a = 1\nbroken\n").expect_err("missing '='");
        assert_eq!(err.offset, 6);
        let err = parse(" = 1").expect_err("missing key");
        assert_eq!(err.offset, 0);
    }
}
