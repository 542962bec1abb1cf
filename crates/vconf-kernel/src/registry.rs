//! One independently rooted tree of records.
//!
//! A registry is built from a top [`VariantModel`]: every slot is
//! instantiated top-down, sibling parameters are wired to the variants their
//! value tables select, and an initial propagation pass computes the active
//! flags. A registry can be used on its own or handed to a
//! [`Repository`](crate::Repository), which then owns all mutation.

use crate::address::Address;
use crate::dependency::{Links, RecordRef};
use crate::error::VariantError;
use crate::model::{ParameterModel, SlotModel, VariantModel, is_valid_name};
use crate::propagation::Propagator;
use crate::record::{ParameterState, Record, RecordBody, RecordId, VariantState};
use crate::snapshot;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Registry {
    name: String,
    top_model: Arc<VariantModel>,
    records: Vec<Record>,
    index: BTreeMap<String, RecordId>,
}

impl Registry {
    /// Instantiate and activate a record tree. Authoring errors in any
    /// reachable model are reported here.
    pub fn build(name: impl Into<String>, top: Arc<VariantModel>) -> Result<Self, VariantError> {
        let mut registry = Self::instantiate(name.into(), top)?;
        registry.stage(|p| p.reconcile(RecordRef::new(0, RecordId(0)), true))?;
        debug!(
            registry = %registry.name,
            records = registry.records.len(),
            "registry built"
        );
        Ok(registry)
    }

    /// The same tree with every record inactive and model defaults applied.
    pub(crate) fn instantiate(name: String, top: Arc<VariantModel>) -> Result<Self, VariantError> {
        if !is_valid_name(&name) {
            return Err(VariantError::InvalidModel(format!(
                "invalid registry name '{name}'"
            )));
        }
        let mut registry = Self {
            name,
            top_model: top.clone(),
            records: Vec::new(),
            index: BTreeMap::new(),
        };
        registry.add_variant(None, top.name.clone(), None, false, &top)?;
        Ok(registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn top_model(&self) -> &Arc<VariantModel> {
        &self.top_model
    }

    pub fn top(&self) -> &Record {
        &self.records[0]
    }

    pub fn top_id(&self) -> RecordId {
        RecordId(0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.get_mut(id.0)
    }

    pub fn id_of(&self, path: &str) -> Result<RecordId, VariantError> {
        self.index
            .get(path.trim())
            .copied()
            .ok_or_else(|| VariantError::UnknownPath(path.trim().to_string()))
    }

    pub fn find(&self, path: &str) -> Result<&Record, VariantError> {
        let id = self.id_of(path)?;
        Ok(&self.records[id.0])
    }

    /// Look up an address; a registry prefix, if present, must name this
    /// registry. Group suffixes are ignored.
    pub fn find_address(&self, address: &Address) -> Result<&Record, VariantError> {
        if let Some(registry) = &address.registry {
            if *registry != self.name {
                return Err(VariantError::UnknownPath(address.to_string()));
            }
        }
        self.find(&address.local_path())
    }

    /// Records in path order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.index.values().map(|id| &self.records[id.0])
    }

    /// Records in presentation order: depth first, parameters before
    /// variants, ranked before unranked.
    pub fn traverse(&self) -> Vec<&Record> {
        let mut out = Vec::with_capacity(self.records.len());
        let mut stack = vec![RecordId(0)];
        while let Some(id) = stack.pop() {
            let record = &self.records[id.0];
            out.push(record);
            let (parameters, variants): (Vec<_>, Vec<_>) = record
                .daughters()
                .partition(|d| self.records[d.0].is_parameter());
            stack.extend(parameters.into_iter().chain(variants).rev());
        }
        out
    }

    pub fn is_active(&self, path: &str) -> Result<bool, VariantError> {
        Ok(self.find(path)?.is_active())
    }

    pub fn value(&self, path: &str) -> Result<Value, VariantError> {
        self.find(path)?.value()
    }

    /// Active variable parameters with no effective value.
    pub fn unset_parameters(&self) -> Vec<&str> {
        self.traverse()
            .into_iter()
            .filter(|r| r.is_active() && r.is_parameter() && !r.is_fixed())
            .filter(|r| r.effective_value().is_none())
            .map(Record::path)
            .collect()
    }

    /// Whether every active parameter has a value.
    pub fn is_accomplished(&self) -> bool {
        self.unset_parameters().is_empty()
    }

    pub fn set_value(&mut self, path: &str, value: impl Into<Value>) -> Result<(), VariantError> {
        let at = self.local(path)?;
        let value = value.into();
        self.stage(|p| p.assign(at, Some(value)))
    }

    pub fn set_value_from_str(&mut self, path: &str, text: &str) -> Result<(), VariantError> {
        let at = self.local(path)?;
        self.stage(|p| p.assign_text(at, text))
    }

    /// Drop the explicit value; reads fall back to the model default.
    pub fn unset_value(&mut self, path: &str) -> Result<(), VariantError> {
        let at = self.local(path)?;
        self.stage(|p| p.assign(at, None))
    }

    pub fn set_default_value(&mut self, path: &str) -> Result<(), VariantError> {
        let at = self.local(path)?;
        let value = default_of(self.find(path)?)?;
        self.stage(|p| p.assign(at, Some(value)))
    }

    pub fn set_fixed_value(&mut self, path: &str) -> Result<(), VariantError> {
        let at = self.local(path)?;
        let value = fixed_of(self.find(path)?)?;
        self.stage(|p| p.assign(at, Some(value)))
    }

    /// Force re-derivation of one record and everything it drives.
    pub fn update(&mut self, path: &str) -> Result<(), VariantError> {
        let at = self.local(path)?;
        self.stage(|p| p.reconcile(at, true))
    }

    /// `path = value` lines for every active, explicitly set, variable
    /// parameter, in presentation order.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        for (path, value) in self.snapshot_entries() {
            out.push_str(&format!("{path} = {value}\n"));
        }
        out
    }

    pub(crate) fn snapshot_entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.traverse().into_iter().filter_map(|record| {
            if !record.is_active() || record.is_fixed() {
                return None;
            }
            record.explicit_value().map(|value| (record.path(), value))
        })
    }

    /// Re-apply snapshot text atomically. Unknown paths are skipped.
    pub fn restore(&mut self, text: &str) -> Result<(), VariantError> {
        let lines = snapshot::parse(text)?;
        let mut assignments = Vec::with_capacity(lines.len());
        for line in lines {
            match self.id_of(&line.key) {
                Ok(id) => assignments.push(line.bind(RecordRef::new(0, id))),
                Err(_) => snapshot::skip(&line, "unknown path"),
            }
        }
        self.stage(|p| snapshot::apply(p, assignments))
    }

    fn local(&self, path: &str) -> Result<RecordRef, VariantError> {
        Ok(RecordRef::new(0, self.id_of(path)?))
    }

    /// Run `op` against a copy-on-write stage and keep the staged copy only
    /// if `op` succeeds.
    fn stage<T>(
        &mut self,
        op: impl FnOnce(&mut Propagator<'_>) -> Result<T, VariantError>,
    ) -> Result<T, VariantError> {
        let links = Links::default();
        let mut propagator = Propagator::new(vec![Some(&*self)], &links);
        let out = op(&mut propagator)?;
        if let Some(staged) = propagator.into_staged().remove(&0) {
            *self = staged;
        }
        Ok(out)
    }

    fn push(&mut self, record: Record) -> Result<RecordId, VariantError> {
        if self.index.contains_key(&record.path) {
            return Err(VariantError::DuplicatePath(record.path));
        }
        let id = RecordId(self.records.len());
        self.index.insert(record.path.clone(), id);
        self.records.push(record);
        Ok(id)
    }

    fn child_path(&self, parent: Option<RecordId>, name: &str) -> String {
        match parent {
            Some(p) => format!("{}/{name}", self.records[p.0].path),
            None => name.to_string(),
        }
    }

    fn add_variant(
        &mut self,
        parent: Option<RecordId>,
        name: String,
        rank: Option<u32>,
        with_update: bool,
        model: &Arc<VariantModel>,
    ) -> Result<RecordId, VariantError> {
        model.validate()?;
        let path = self.child_path(parent, &name);
        let id = self.push(Record {
            path,
            name,
            parent,
            rank,
            with_update,
            active: false,
            body: RecordBody::Variant(VariantState {
                model: model.clone(),
                daughters: Vec::new(),
                ranked: Vec::new(),
                unranked: Vec::new(),
                controller: None,
            }),
        })?;

        let mut daughters = Vec::new();
        let mut selectors = Vec::new();
        let mut variants = BTreeMap::new();
        for slot in &model.slots {
            match &slot.model {
                SlotModel::Parameter(param) => {
                    let names = match slot.occurrences {
                        None => vec![slot.name.clone()],
                        Some(n) => (0..n).map(|i| format!("{}[{i}]", slot.name)).collect(),
                    };
                    for leaf in names {
                        let d = self.add_parameter(id, leaf, slot.rank, slot.with_update, param)?;
                        daughters.push(d);
                        if !param.variants.is_empty() {
                            selectors.push((d, param.clone()));
                        }
                    }
                }
                SlotModel::Variant(nested) => {
                    let d = self.add_variant(
                        Some(id),
                        slot.name.clone(),
                        slot.rank,
                        slot.with_update,
                        nested,
                    )?;
                    daughters.push(d);
                    variants.insert(slot.name.as_str(), d);
                }
            }
        }

        let mut controlled = BTreeSet::new();
        for (parameter, param_model) in selectors {
            let mut controls = Vec::new();
            for target in param_model.associated_variants() {
                let variant = *variants.get(target).ok_or_else(|| {
                    VariantError::DanglingAssociation {
                        parameter: self.records[parameter.0].path.clone(),
                        variant: target.to_string(),
                    }
                })?;
                if !controlled.insert(variant) {
                    return Err(VariantError::InvalidModel(format!(
                        "variant '{}' is selected by more than one parameter",
                        self.records[variant.0].path
                    )));
                }
                if let RecordBody::Variant(state) = &mut self.records[variant.0].body {
                    state.controller = Some(parameter);
                }
                controls.push(variant);
            }
            if let RecordBody::Parameter(state) = &mut self.records[parameter.0].body {
                state.controls = controls;
            }
        }

        let ranks: Vec<Option<u32>> = self.records.iter().map(|r| r.rank).collect();
        if let RecordBody::Variant(state) = &mut self.records[id.0].body {
            state.daughters = daughters;
            state.reorder(|d| ranks[d.0]);
        }
        Ok(id)
    }

    fn add_parameter(
        &mut self,
        parent: RecordId,
        name: String,
        rank: Option<u32>,
        with_update: bool,
        model: &Arc<ParameterModel>,
    ) -> Result<RecordId, VariantError> {
        let path = self.child_path(Some(parent), &name);
        model
            .validate()
            .map_err(|e| VariantError::InvalidModel(format!("{path}: {e}")))?;
        let initial = model
            .fixed
            .clone()
            .or_else(|| model.default.clone())
            .map(|v| model.admit(v))
            .transpose()
            .map_err(|e| VariantError::InvalidModel(format!("{path}: {e}")))?;
        self.push(Record {
            path,
            name,
            parent: Some(parent),
            rank,
            with_update,
            active: false,
            body: RecordBody::Parameter(ParameterState {
                model: model.clone(),
                value: initial,
                controls: Vec::new(),
                disabled_groups: BTreeSet::new(),
            }),
        })
    }
}

pub(crate) fn default_of(record: &Record) -> Result<Value, VariantError> {
    let state = record.parameter()?;
    if let Some(fixed) = &state.model.fixed {
        return Ok(fixed.clone());
    }
    state
        .model
        .default
        .clone()
        .ok_or_else(|| VariantError::MissingDefault(record.path().to_string()))
}

pub(crate) fn fixed_of(record: &Record) -> Result<Value, VariantError> {
    record.parameter()?.model.fixed.clone().ok_or_else(|| {
        VariantError::invalid_value(record.path(), "parameter is not fixed")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Slot;
    use crate::value::ValueKind;

    fn layered() -> Arc<VariantModel> {
        let thickness = Arc::new(
            ParameterModel::new("thickness", ValueKind::Real).with_default(1.5),
        );
        let layer = Arc::new(VariantModel::new("layer").with_parameter("thickness", thickness));
        let label = Arc::new(ParameterModel::new("label", ValueKind::String));
        let count = Arc::new(ParameterModel::new("count", ValueKind::Integer).with_fixed(3));
        Arc::new(
            VariantModel::new("setup")
                .with_slot(Slot::variant("layer", layer))
                .with_slot(Slot::parameter("label", label).repeated(2))
                .with_slot(Slot::parameter("count", count).ranked(0)),
        )
    }

    #[test]
    fn build_instantiates_occurrences_and_paths() {
        let registry = Registry::build("geo", layered()).expect("registry builds");
        let paths: Vec<&str> = registry.records().map(Record::path).collect();
        assert_eq!(
            paths,
            vec![
                "setup",
                "setup/count",
                "setup/label[0]",
                "setup/label[1]",
                "setup/layer",
                "setup/layer/thickness",
            ]
        );
        assert!(registry.records().all(Record::is_active));
        assert_eq!(registry.value("setup/count"), Ok(Value::Integer(3)));
    }

    #[test]
    fn traverse_puts_ranked_parameters_first() {
        let registry = Registry::build("geo", layered()).expect("registry builds");
        let order: Vec<&str> = registry.traverse().into_iter().map(Record::path).collect();
        assert_eq!(
            order,
            vec![
                "setup",
                "setup/count",
                "setup/label[0]",
                "setup/label[1]",
                "setup/layer",
                "setup/layer/thickness",
            ]
        );
    }

    #[test]
    fn unset_parameters_block_accomplishment() {
        let mut registry = Registry::build("geo", layered()).expect("registry builds");
        assert_eq!(
            registry.unset_parameters(),
            vec!["setup/label[0]", "setup/label[1]"]
        );
        registry.set_value("setup/label[0]", "a").expect("set");
        registry.set_value("setup/label[1]", "b").expect("set");
        assert!(registry.is_accomplished());
    }

    #[test]
    fn fixed_parameters_reject_other_values() {
        let mut registry = Registry::build("geo", layered()).expect("registry builds");
        let err = registry.set_value("setup/count", 4).expect_err("fixed");
        assert!(matches!(err, VariantError::InvalidValue { .. }));
        registry.set_fixed_value("setup/count").expect("fixed value");
        assert!(matches!(
            registry.set_fixed_value("setup/layer/thickness"),
            Err(VariantError::InvalidValue { .. })
        ));
    }

    #[test]
    fn default_value_can_be_reapplied() {
        let mut registry = Registry::build("geo", layered()).expect("registry builds");
        registry.set_value("setup/layer/thickness", 2).expect("set");
        assert_eq!(registry.value("setup/layer/thickness"), Ok(Value::Real(2.0)));
        registry.set_default_value("setup/layer/thickness").expect("default");
        assert!(registry.find("setup/layer/thickness").expect("found").is_default_value());
        assert!(matches!(
            registry.set_default_value("setup/label[0]"),
            Err(VariantError::MissingDefault(_))
        ));
    }

    #[test]
    fn kind_mismatch_on_variant_write() {
        let mut registry = Registry::build("geo", layered()).expect("registry builds");
        assert!(matches!(
            registry.set_value("setup/layer", 1),
            Err(VariantError::KindMismatch { .. })
        ));
        assert!(matches!(
            registry.set_value("setup/nope", 1),
            Err(VariantError::UnknownPath(_))
        ));
    }

    #[test]
    fn invalid_registry_name_is_rejected() {
        assert!(matches!(
            Registry::build("bad name", layered()),
            Err(VariantError::InvalidModel(_))
        ));
    }
}
