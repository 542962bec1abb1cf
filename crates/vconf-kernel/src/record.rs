//! Instantiated configuration nodes.
//!
//! Records live in a [`Registry`](crate::Registry) arena and refer to each
//! other by [`RecordId`]. Only the engine mutates them; clients get shared
//! references.

use crate::error::VariantError;
use crate::model::{ParameterModel, VariantModel};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Index of a record within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub(crate) usize);

impl RecordId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Parameter,
    Variant,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Parameter => "parameter",
            RecordKind::Variant => "variant",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ParameterState {
    pub(crate) model: Arc<ParameterModel>,
    /// Explicit value; `None` falls back to the fixed value, then the default.
    pub(crate) value: Option<Value>,
    /// Sibling variant records selected through the association table.
    pub(crate) controls: Vec<RecordId>,
    /// Value groups currently disabled by unmet dependencies.
    pub(crate) disabled_groups: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct VariantState {
    pub(crate) model: Arc<VariantModel>,
    /// Daughters in insertion order.
    pub(crate) daughters: Vec<RecordId>,
    pub(crate) ranked: Vec<RecordId>,
    pub(crate) unranked: Vec<RecordId>,
    /// The sibling parameter whose value selects this variant.
    pub(crate) controller: Option<RecordId>,
}

#[derive(Debug, Clone)]
pub(crate) enum RecordBody {
    Parameter(ParameterState),
    Variant(VariantState),
}

/// One parameter or variant node.
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) parent: Option<RecordId>,
    pub(crate) rank: Option<u32>,
    pub(crate) with_update: bool,
    pub(crate) active: bool,
    pub(crate) body: RecordBody,
}

impl Record {
    /// Full path within the registry, e.g. `root/fastCfg/iterations`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Leaf name, including any `[n]` occurrence suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.parent
    }

    /// Display rank inherited from the model slot.
    pub fn rank(&self) -> Option<u32> {
        self.rank
    }

    pub fn with_update(&self) -> bool {
        self.with_update
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn kind(&self) -> RecordKind {
        match self.body {
            RecordBody::Parameter(_) => RecordKind::Parameter,
            RecordBody::Variant(_) => RecordKind::Variant,
        }
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.body, RecordBody::Parameter(_))
    }

    pub fn is_variant(&self) -> bool {
        matches!(self.body, RecordBody::Variant(_))
    }

    pub fn parameter_model(&self) -> Option<&Arc<ParameterModel>> {
        match &self.body {
            RecordBody::Parameter(p) => Some(&p.model),
            RecordBody::Variant(_) => None,
        }
    }

    pub fn variant_model(&self) -> Option<&Arc<VariantModel>> {
        match &self.body {
            RecordBody::Variant(v) => Some(&v.model),
            RecordBody::Parameter(_) => None,
        }
    }

    /// Whether an explicit value is stored.
    pub fn is_value_set(&self) -> bool {
        matches!(&self.body, RecordBody::Parameter(p) if p.value.is_some())
    }

    pub fn explicit_value(&self) -> Option<&Value> {
        match &self.body {
            RecordBody::Parameter(p) => p.value.as_ref(),
            RecordBody::Variant(_) => None,
        }
    }

    /// The explicit value, else the fixed value, else the model default.
    pub fn effective_value(&self) -> Option<&Value> {
        match &self.body {
            RecordBody::Parameter(p) => p
                .value
                .as_ref()
                .or(p.model.fixed.as_ref())
                .or(p.model.default.as_ref()),
            RecordBody::Variant(_) => None,
        }
    }

    /// Read the current value.
    ///
    /// Values are kept while a record is inactive, so this does not check
    /// the active flag.
    pub fn value(&self) -> Result<Value, VariantError> {
        match &self.body {
            RecordBody::Parameter(_) => self
                .effective_value()
                .cloned()
                .ok_or_else(|| VariantError::ValueNotSet(self.path.clone())),
            RecordBody::Variant(_) => Err(self.kind_mismatch("parameter")),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.parameter_model().is_some_and(|m| m.is_fixed())
    }

    /// Whether the effective value equals the model default.
    pub fn is_default_value(&self) -> bool {
        match &self.body {
            RecordBody::Parameter(p) => match (&p.value, &p.model.default) {
                (None, Some(_)) => true,
                (Some(value), Some(default)) => value == default,
                _ => false,
            },
            RecordBody::Variant(_) => false,
        }
    }

    /// Whether the value group `group` is disabled by unmet dependencies.
    pub fn is_group_disabled(&self, group: &str) -> bool {
        matches!(&self.body, RecordBody::Parameter(p) if p.disabled_groups.contains(group))
    }

    /// The variant slot name the effective value selects, if any.
    pub fn selected_variant(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Parameter(p) => {
                let value = self.effective_value()?;
                p.model.associated_variant(value)
            }
            RecordBody::Variant(_) => None,
        }
    }

    /// Variants selected by this parameter's value table.
    pub fn controlled_variants(&self) -> &[RecordId] {
        match &self.body {
            RecordBody::Parameter(p) => &p.controls,
            RecordBody::Variant(_) => &[],
        }
    }

    /// The parameter that selects this variant, if any.
    pub fn controller(&self) -> Option<RecordId> {
        match &self.body {
            RecordBody::Variant(v) => v.controller,
            RecordBody::Parameter(_) => None,
        }
    }

    /// Daughters in presentation order: ranked ascending, then unranked in
    /// insertion order.
    pub fn daughters(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.ranked_daughters()
            .iter()
            .chain(self.unranked_daughters())
            .copied()
    }

    pub fn ranked_daughters(&self) -> &[RecordId] {
        match &self.body {
            RecordBody::Variant(v) => &v.ranked,
            RecordBody::Parameter(_) => &[],
        }
    }

    pub fn unranked_daughters(&self) -> &[RecordId] {
        match &self.body {
            RecordBody::Variant(v) => &v.unranked,
            RecordBody::Parameter(_) => &[],
        }
    }

    pub(crate) fn kind_mismatch(&self, expected: &'static str) -> VariantError {
        VariantError::KindMismatch {
            path: self.path.clone(),
            expected,
        }
    }

    pub(crate) fn parameter(&self) -> Result<&ParameterState, VariantError> {
        match &self.body {
            RecordBody::Parameter(p) => Ok(p),
            RecordBody::Variant(_) => Err(self.kind_mismatch("parameter")),
        }
    }

    pub(crate) fn parameter_mut(&mut self) -> Result<&mut ParameterState, VariantError> {
        match &mut self.body {
            RecordBody::Parameter(p) => Ok(p),
            RecordBody::Variant(_) => Err(VariantError::KindMismatch {
                path: self.path.clone(),
                expected: "parameter",
            }),
        }
    }
}

impl VariantState {
    /// Recompute the ranked/unranked daughter lists.
    pub(crate) fn reorder(&mut self, rank_of: impl Fn(RecordId) -> Option<u32>) {
        let (mut ranked, unranked): (Vec<_>, Vec<_>) = self
            .daughters
            .iter()
            .copied()
            .partition(|id| rank_of(*id).is_some());
        ranked.sort_by_key(|id| rank_of(*id));
        self.ranked = ranked;
        self.unranked = unranked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    fn parameter(model: ParameterModel, value: Option<Value>) -> Record {
        Record {
            path: "root/p".to_string(),
            name: "p".to_string(),
            parent: Some(RecordId(0)),
            rank: None,
            with_update: false,
            active: true,
            body: RecordBody::Parameter(ParameterState {
                model: Arc::new(model),
                value,
                controls: Vec::new(),
                disabled_groups: BTreeSet::new(),
            }),
        }
    }

    #[test]
    fn effective_value_falls_back_to_default() {
        let model = ParameterModel::new("p", ValueKind::Integer).with_default(10);
        let record = parameter(model, None);
        assert!(!record.is_value_set());
        assert_eq!(record.value(), Ok(Value::Integer(10)));
        assert!(record.is_default_value());
    }

    #[test]
    fn fixed_value_backs_a_cleared_constant() {
        let model = ParameterModel::new("p", ValueKind::Integer).with_fixed(3);
        let record = parameter(model, None);
        assert_eq!(record.value(), Ok(Value::Integer(3)));
    }

    #[test]
    fn unset_without_default_reports_value_not_set() {
        let record = parameter(ParameterModel::new("p", ValueKind::Integer), None);
        assert_eq!(
            record.value(),
            Err(VariantError::ValueNotSet("root/p".to_string()))
        );
    }

    #[test]
    fn ranked_daughters_precede_unranked() {
        let ranks = [None, Some(5), None, Some(1)];
        let mut state = VariantState {
            model: Arc::new(VariantModel::new("v")),
            daughters: (0..4).map(RecordId).collect(),
            ranked: Vec::new(),
            unranked: Vec::new(),
            controller: None,
        };
        state.reorder(|id| ranks[id.0]);
        assert_eq!(state.ranked, vec![RecordId(3), RecordId(1)]);
        assert_eq!(state.unranked, vec![RecordId(0), RecordId(2)]);
    }
}
