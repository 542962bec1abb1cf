//! Error types for variant configuration operations.

/// A malformed address, address set or selector string.
///
/// `offset` is the byte offset in the original input where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at offset {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

const INACTIVE_REASON: &str = "record is not active";

/// Errors raised by models, records, registries and repositories.
///
/// Authoring errors (`DuplicateDaughter`, `DuplicatePath`, `DanglingAssociation`,
/// `InvalidModel`, `CyclicDependency`) are raised while building and leave
/// nothing behind. Runtime errors leave the engine state untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VariantError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A value outside the domain (or enabled groups) of a parameter, or a
    /// write to a parameter that is not active.
    #[error("invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },

    /// Read of a parameter with neither an explicit nor a default value.
    #[error("parameter '{0}' has no value set")]
    ValueNotSet(String),

    #[error("unknown path: {0}")]
    UnknownPath(String),

    #[error("record '{parent}' already has a daughter named '{name}'")]
    DuplicateDaughter { parent: String, name: String },

    #[error("duplicate record path: {0}")]
    DuplicatePath(String),

    #[error("dependency {depender} -> {dependee} would create a cycle")]
    CyclicDependency { depender: String, dependee: String },

    #[error("dependency {depender} -> {dependee} is already registered")]
    DuplicateDependency { depender: String, dependee: String },

    /// Dependency logic naming a dependee slot the depender does not have.
    #[error("invalid dependency logic for {depender}: {reason}")]
    InvalidLogic { depender: String, reason: String },

    /// The registry a handle points into was removed or rebuilt.
    #[error("stale reference into registry '{0}'")]
    StaleReference(String),

    #[error("record '{path}' is not a {expected}")]
    KindMismatch { path: String, expected: &'static str },

    /// An association table names a variant slot that does not exist.
    #[error("parameter '{parameter}' associates a value with unknown variant '{variant}'")]
    DanglingAssociation { parameter: String, variant: String },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("unknown registry: {0}")]
    UnknownRegistry(String),

    #[error("registry '{0}' already exists")]
    DuplicateRegistry(String),

    #[error("rank {rank} is already used by registry '{registry}'")]
    DuplicateRank { rank: u32, registry: String },

    #[error("parameter '{path}' has no value group named '{group}'")]
    UnknownGroup { path: String, group: String },

    #[error("parameter '{0}' has no default value")]
    MissingDefault(String),

    #[error("repository is locked")]
    Locked,
}

impl VariantError {
    pub(crate) fn invalid_value(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn inactive(path: impl Into<String>) -> Self {
        Self::invalid_value(path, INACTIVE_REASON)
    }

    /// Whether a write failed only because its record is not active.
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::InvalidValue { reason, .. } if reason == INACTIVE_REASON)
    }

    /// Whether this error reports an authoring mistake rather than bad input.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateDaughter { .. }
                | Self::DuplicatePath(_)
                | Self::CyclicDependency { .. }
                | Self::InvalidLogic { .. }
                | Self::DanglingAssociation { .. }
                | Self::InvalidModel(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_converts_and_keeps_offset() {
        let err: VariantError = ParseError::new(4, "expected identifier").into();
        assert!(matches!(&err, VariantError::Parse(p) if p.offset == 4));
        assert_eq!(
            err.to_string(),
            "parse error at offset 4: expected identifier"
        );
    }

    #[test]
    fn inactive_writes_are_invalid_values() {
        let err = VariantError::inactive("root/a");
        assert!(err.is_inactive());
        assert_eq!(err.to_string(), "invalid value for 'root/a': record is not active");
        assert!(!VariantError::invalid_value("root/a", "out of range").is_inactive());
    }

    #[test]
    fn structural_errors_are_classified() {
        assert!(VariantError::DuplicatePath("a/b".into()).is_structural());
        assert!(!VariantError::ValueNotSet("a/b".into()).is_structural());
    }
}
