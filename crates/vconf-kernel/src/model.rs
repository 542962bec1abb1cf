//! Immutable parameter and variant models.
//!
//! Models are the schemas records are instantiated from. They are shared
//! read-only (`Arc`) between every record built from them and are never
//! mutated by the engine.

use crate::error::VariantError;
use crate::value::{Value, ValueKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("model name regex must compile")
    })
}

/// Whether `name` is a valid model, slot, group or registry name.
pub fn is_valid_name(name: &str) -> bool {
    name_re().is_match(name)
}

fn check_name(what: &str, name: &str) -> Result<(), VariantError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(VariantError::InvalidModel(format!(
            "invalid {what} name '{name}'"
        )))
    }
}

fn default_true() -> bool {
    true
}

/// The set of values a parameter accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Every value of the parameter's kind.
    #[default]
    Any,
    /// An explicit list of values.
    Enumerated(Vec<Value>),
    /// Integers within inclusive optional bounds.
    IntegerRange {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// Reals within optional bounds, each independently inclusive.
    RealRange {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default = "default_true")]
        min_inclusive: bool,
        #[serde(default = "default_true")]
        max_inclusive: bool,
    },
}

impl Domain {
    pub fn enumerated<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Domain::Enumerated(values.into_iter().map(Into::into).collect())
    }

    pub fn single(value: impl Into<Value>) -> Self {
        Domain::Enumerated(vec![value.into()])
    }

    pub fn integer_range(min: Option<i64>, max: Option<i64>) -> Self {
        Domain::IntegerRange { min, max }
    }

    pub fn real_range(min: Option<f64>, max: Option<f64>) -> Self {
        Domain::RealRange {
            min,
            max,
            min_inclusive: true,
            max_inclusive: true,
        }
    }

    /// Domain membership. Integers compare numerically against reals.
    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Domain::Any => true,
            Domain::Enumerated(values) => values.iter().any(|v| same_value(v, value)),
            Domain::IntegerRange { min, max } => match value {
                Value::Integer(i) => {
                    min.is_none_or(|lo| *i >= lo) && max.is_none_or(|hi| *i <= hi)
                }
                _ => false,
            },
            Domain::RealRange {
                min,
                max,
                min_inclusive,
                max_inclusive,
            } => {
                let x = match value {
                    Value::Real(r) => *r,
                    Value::Integer(i) => *i as f64,
                    _ => return false,
                };
                let above = match min {
                    None => true,
                    Some(lo) if *min_inclusive => x >= *lo,
                    Some(lo) => x > *lo,
                };
                let below = match max {
                    None => true,
                    Some(hi) if *max_inclusive => x <= *hi,
                    Some(hi) => x < *hi,
                };
                above && below
            }
        }
    }

    fn check_kind(&self, kind: ValueKind) -> Result<(), String> {
        match self {
            Domain::Any => Ok(()),
            Domain::Enumerated(values) => {
                for value in values {
                    value.clone().coerce(kind)?;
                }
                Ok(())
            }
            Domain::IntegerRange { min, max } => {
                if kind != ValueKind::Integer {
                    return Err(format!("integer range used for a {kind} parameter"));
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(format!("empty integer range [{lo}, {hi}]"));
                    }
                }
                Ok(())
            }
            Domain::RealRange { min, max, .. } => {
                if kind != ValueKind::Real {
                    return Err(format!("real range used for a {kind} parameter"));
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(format!("empty real range [{lo}, {hi}]"));
                    }
                }
                Ok(())
            }
        }
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(i), Value::Real(r)) | (Value::Real(r), Value::Integer(i)) => {
            (*i as f64) == *r
        }
        _ => a == b,
    }
}

/// Maps the values matched by `when` to the variant slot named `variant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAssociation {
    pub when: Domain,
    pub variant: String,
}

/// A named subset of a parameter's values, addressable as `path@group`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueGroup {
    pub name: String,
    pub when: Domain,
}

/// Schema of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterModel {
    pub name: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// A fixed parameter accepts exactly this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<Value>,
    /// Value -> variant association table; the first matching row wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantAssociation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ValueGroup>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParameterModel {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            domain: Domain::Any,
            default: None,
            fixed: None,
            variants: Vec::new(),
            groups: Vec::new(),
            description: String::new(),
        }
    }

    /// A string parameter restricted to `values`.
    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<Value> = values.into_iter().map(|s| Value::String(s.into())).collect();
        Self::new(name, ValueKind::String).with_domain(Domain::Enumerated(values))
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_fixed(mut self, value: impl Into<Value>) -> Self {
        self.fixed = Some(value.into());
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Activate `variant` whenever the value is `value`.
    pub fn associate(self, value: impl Into<Value>, variant: impl Into<String>) -> Self {
        self.associate_when(Domain::single(value), variant)
    }

    /// Activate `variant` whenever the value falls within `when`.
    pub fn associate_when(mut self, when: Domain, variant: impl Into<String>) -> Self {
        self.variants.push(VariantAssociation {
            when,
            variant: variant.into(),
        });
        self
    }

    pub fn with_group(mut self, name: impl Into<String>, when: Domain) -> Self {
        self.groups.push(ValueGroup {
            name: name.into(),
            when,
        });
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name == name)
    }

    /// Names of the groups `value` belongs to.
    pub fn groups_of<'a>(&'a self, value: &'a Value) -> impl Iterator<Item = &'a str> + 'a {
        self.groups
            .iter()
            .filter(move |g| g.when.contains(value))
            .map(|g| g.name.as_str())
    }

    /// Variant slot selected by `value`, if any.
    pub fn associated_variant(&self, value: &Value) -> Option<&str> {
        self.variants
            .iter()
            .find(|a| a.when.contains(value))
            .map(|a| a.variant.as_str())
    }

    /// Every variant slot named by the association table, in table order.
    pub fn associated_variants(&self) -> impl Iterator<Item = &str> {
        let mut seen = BTreeSet::new();
        self.variants
            .iter()
            .map(|a| a.variant.as_str())
            .filter(move |name| seen.insert(*name))
    }

    /// Coerce `value` to this model's kind and check it against the domain.
    ///
    /// Group enablement is not considered here; records check it.
    pub fn admit(&self, value: Value) -> Result<Value, String> {
        let value = value.coerce(self.kind)?;
        if let Some(fixed) = &self.fixed {
            if !same_value(fixed, &value) {
                return Err(format!("fixed parameter only accepts {fixed}"));
            }
            return Ok(value);
        }
        if !self.domain.contains(&value) {
            return Err(format!("{value} is outside the domain of '{}'", self.name));
        }
        Ok(value)
    }

    /// Authoring checks on this model alone.
    pub fn validate(&self) -> Result<(), VariantError> {
        check_name("parameter model", &self.name)?;
        let invalid = |reason: String| {
            VariantError::InvalidModel(format!("parameter model '{}': {reason}", self.name))
        };
        self.domain.check_kind(self.kind).map_err(invalid)?;
        if self.default.is_some() && self.fixed.is_some() {
            return Err(invalid("a fixed parameter cannot declare a default".to_string()));
        }
        if let Some(fixed) = &self.fixed {
            let fixed = fixed.clone().coerce(self.kind).map_err(invalid)?;
            if !self.domain.contains(&fixed) {
                return Err(invalid(format!("fixed value {fixed} is outside the domain")));
            }
        }
        if let Some(default) = &self.default {
            self.admit(default.clone())
                .map_err(|e| invalid(format!("default value: {e}")))?;
        }
        for association in &self.variants {
            check_name("variant", &association.variant)?;
            association.when.check_kind(self.kind).map_err(invalid)?;
        }
        let mut group_names = BTreeSet::new();
        for group in &self.groups {
            check_name("value group", &group.name)?;
            group.when.check_kind(self.kind).map_err(invalid)?;
            if !group_names.insert(group.name.as_str()) {
                return Err(invalid(format!("duplicate value group '{}'", group.name)));
            }
        }
        Ok(())
    }
}

/// What a variant slot instantiates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotModel {
    Parameter(Arc<ParameterModel>),
    Variant(Arc<VariantModel>),
}

/// One named daughter slot of a variant model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    /// Explicit display rank; ranked slots are presented first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Instantiate `name[0]` .. `name[n-1]` instead of a single record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrences: Option<u32>,
    /// Re-derive this daughter whenever its parent is updated.
    #[serde(default)]
    pub with_update: bool,
    #[serde(flatten)]
    pub model: SlotModel,
}

impl Slot {
    pub fn parameter(name: impl Into<String>, model: Arc<ParameterModel>) -> Self {
        Self::new(name, SlotModel::Parameter(model))
    }

    pub fn variant(name: impl Into<String>, model: Arc<VariantModel>) -> Self {
        Self::new(name, SlotModel::Variant(model))
    }

    fn new(name: impl Into<String>, model: SlotModel) -> Self {
        Self {
            name: name.into(),
            rank: None,
            occurrences: None,
            with_update: false,
            model,
        }
    }

    pub fn ranked(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn repeated(mut self, occurrences: u32) -> Self {
        self.occurrences = Some(occurrences);
        self
    }

    pub fn with_update(mut self) -> Self {
        self.with_update = true;
        self
    }

    pub fn is_variant(&self) -> bool {
        matches!(self.model, SlotModel::Variant(_))
    }
}

/// Schema of a variant: the slots it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl VariantModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            slots: Vec::new(),
        }
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_parameter(self, name: impl Into<String>, model: Arc<ParameterModel>) -> Self {
        self.with_slot(Slot::parameter(name, model))
    }

    pub fn with_variant(self, name: impl Into<String>, model: Arc<VariantModel>) -> Self {
        self.with_slot(Slot::variant(name, model))
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Slot-level authoring checks. Nested models are checked by the
    /// registry as it instantiates them.
    pub fn validate(&self) -> Result<(), VariantError> {
        check_name("variant model", &self.name)?;
        let mut names = BTreeSet::new();
        for slot in &self.slots {
            check_name("slot", &slot.name)?;
            if !names.insert(slot.name.as_str()) {
                return Err(VariantError::DuplicateDaughter {
                    parent: self.name.clone(),
                    name: slot.name.clone(),
                });
            }
        }

        let mut controlled: BTreeSet<&str> = BTreeSet::new();
        for slot in &self.slots {
            let SlotModel::Parameter(param) = &slot.model else {
                if slot.occurrences.is_some() {
                    return Err(VariantError::InvalidModel(format!(
                        "variant slot '{}' in '{}' cannot repeat",
                        slot.name, self.name
                    )));
                }
                continue;
            };
            if slot.occurrences == Some(0) {
                return Err(VariantError::InvalidModel(format!(
                    "parameter slot '{}' in '{}' has zero occurrences",
                    slot.name, self.name
                )));
            }
            if slot.occurrences.is_some() && !param.variants.is_empty() {
                return Err(VariantError::InvalidModel(format!(
                    "repeated parameter slot '{}' in '{}' cannot select variants",
                    slot.name, self.name
                )));
            }
            for target in param.associated_variants() {
                match self.slot(target) {
                    Some(s) if s.is_variant() => {}
                    _ => {
                        return Err(VariantError::DanglingAssociation {
                            parameter: format!("{}/{}", self.name, slot.name),
                            variant: target.to_string(),
                        });
                    }
                }
                if !controlled.insert(target) {
                    return Err(VariantError::InvalidModel(format!(
                        "variant slot '{target}' in '{}' is selected by more than one parameter",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_range_bounds_are_independent() {
        let half_open = Domain::RealRange {
            min: Some(0.0),
            max: Some(1.0),
            min_inclusive: true,
            max_inclusive: false,
        };
        assert!(half_open.contains(&Value::Real(0.0)));
        assert!(!half_open.contains(&Value::Real(1.0)));
        assert!(half_open.contains(&Value::Integer(0)));
    }

    #[test]
    fn admit_coerces_and_checks_domain() {
        let model = ParameterModel::new("gain", ValueKind::Real)
            .with_domain(Domain::real_range(Some(0.0), Some(10.0)));
        assert_eq!(model.admit(Value::Integer(3)), Ok(Value::Real(3.0)));
        assert!(model.admit(Value::Real(11.0)).is_err());
        assert!(model.admit(Value::from("3")).is_err());
    }

    #[test]
    fn fixed_parameter_admits_only_its_value() {
        let model = ParameterModel::new("version", ValueKind::Integer).with_fixed(2);
        assert!(model.validate().is_ok());
        assert_eq!(model.admit(Value::Integer(2)), Ok(Value::Integer(2)));
        assert!(model.admit(Value::Integer(3)).is_err());
    }

    #[test]
    fn default_outside_domain_is_an_authoring_error() {
        let model = ParameterModel::enumeration("mode", ["fast", "accurate"]).with_default("slow");
        assert!(matches!(
            model.validate(),
            Err(VariantError::InvalidModel(_))
        ));
    }

    #[test]
    fn first_matching_association_wins() {
        let model = ParameterModel::new("level", ValueKind::Integer)
            .associate_when(Domain::integer_range(Some(0), Some(5)), "low")
            .associate_when(Domain::integer_range(Some(3), None), "high");
        assert_eq!(model.associated_variant(&Value::Integer(4)), Some("low"));
        assert_eq!(model.associated_variant(&Value::Integer(6)), Some("high"));
        assert_eq!(model.associated_variant(&Value::Integer(-1)), None);
        assert_eq!(model.associated_variants().collect::<Vec<_>>(), vec!["low", "high"]);
    }

    #[test]
    fn dangling_association_is_rejected() {
        let mode = Arc::new(ParameterModel::enumeration("mode", ["a", "b"]).associate("a", "cfgA"));
        let top = VariantModel::new("root").with_parameter("mode", mode);
        assert!(matches!(
            top.validate(),
            Err(VariantError::DanglingAssociation { variant, .. }) if variant == "cfgA"
        ));
    }

    #[test]
    fn duplicate_slot_names_are_rejected() {
        let flag = Arc::new(ParameterModel::new("flag", ValueKind::Boolean));
        let top = VariantModel::new("root")
            .with_parameter("x", flag.clone())
            .with_parameter("x", flag);
        assert!(matches!(
            top.validate(),
            Err(VariantError::DuplicateDaughter { name, .. }) if name == "x"
        ));
    }

    #[test]
    fn slot_model_is_externally_tagged_and_flattened() {
        let raw = r#"{
            "name": "iterations",
            "rank": 1,
            "parameter": { "name": "iterations", "kind": "integer", "default": 10 }
        }"#;
        let slot: Slot = serde_json::from_str(raw).expect("slot must parse");
        assert_eq!(slot.rank, Some(1));
        assert!(!slot.with_update);
        let SlotModel::Parameter(model) = &slot.model else {
            panic!("expected a parameter slot");
        };
        assert_eq!(model.default, Some(Value::Integer(10)));
    }

    #[test]
    fn names_follow_identifier_grammar() {
        assert!(is_valid_name("fast_cfg-2.b"));
        assert!(is_valid_name("_hidden"));
        assert!(!is_valid_name("2fast"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name(""));
    }
}
