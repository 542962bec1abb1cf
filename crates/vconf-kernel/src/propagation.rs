//! Activation propagation.
//!
//! `reconcile` re-derives one record's active flag from its parent, its
//! controlling parameter and its dependees, then walks on:
//!
//! ```text
//!   parameter --(value / activity changed)--> controlled sibling variants
//!   variant   --(activity changed)----------> every daughter, parameters first
//!   variant   --(always)--------------------> daughters flagged with_update
//!   any       --(activity changed / forced)-> dependers
//! ```
//!
//! A record already on the propagation stack is not re-entered. Writes go
//! to staged copies of the registries they touch, cloned on first write;
//! callers commit them only on success, so a failing pass leaves nothing
//! behind.

use crate::dependency::{Links, Node, RecordRef};
use crate::error::VariantError;
use crate::record::Record;
use crate::registry::Registry;
use crate::value::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

pub(crate) struct Propagator<'a> {
    base: Vec<Option<&'a Registry>>,
    staged: BTreeMap<usize, Registry>,
    links: &'a Links,
    stack: BTreeSet<RecordRef>,
}

impl<'a> Propagator<'a> {
    /// `base` is indexed by repository slot; `None` marks a removed registry.
    pub(crate) fn new(base: Vec<Option<&'a Registry>>, links: &'a Links) -> Self {
        Self {
            base,
            staged: BTreeMap::new(),
            links,
            stack: BTreeSet::new(),
        }
    }

    /// The registries written during the pass, by slot.
    pub(crate) fn into_staged(self) -> BTreeMap<usize, Registry> {
        self.staged
    }

    fn registry(&self, slot: usize) -> Result<&Registry, VariantError> {
        self.staged
            .get(&slot)
            .or_else(|| self.base.get(slot).copied().flatten())
            .ok_or_else(|| VariantError::StaleReference(format!("slot {slot}")))
    }

    pub(crate) fn record(&self, at: RecordRef) -> Result<&Record, VariantError> {
        let registry = self.registry(at.registry)?;
        registry
            .get(at.id)
            .ok_or_else(|| VariantError::StaleReference(registry.name().to_string()))
    }

    fn record_mut(&mut self, at: RecordRef) -> Result<&mut Record, VariantError> {
        let registry = match self.staged.entry(at.registry) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let base = self
                    .base
                    .get(at.registry)
                    .copied()
                    .flatten()
                    .ok_or_else(|| VariantError::StaleReference(format!("slot {}", at.registry)))?;
                entry.insert(base.clone())
            }
        };
        let name = registry.name().to_string();
        registry
            .get_mut(at.id)
            .ok_or(VariantError::StaleReference(name))
    }

    fn is_active(&self, at: RecordRef) -> bool {
        self.record(at).is_ok_and(Record::is_active)
    }

    fn dependees_active(&self, node: &Node) -> bool {
        self.links.is_enabled(node, |d| self.is_active(d))
    }

    /// Store a new explicit value (or clear it) and propagate.
    pub(crate) fn assign(&mut self, at: RecordRef, value: Option<Value>) -> Result<(), VariantError> {
        let record = self.record(at)?;
        record.parameter()?;
        if !record.is_active() {
            return Err(VariantError::inactive(record.path()));
        }
        let value = match value {
            Some(value) => Some(admit(record, value)?),
            None => None,
        };
        debug!(path = %record.path(), value = ?value, "assign parameter value");
        self.record_mut(at)?.parameter_mut()?.value = value;
        self.reconcile(at, true)
    }

    /// Parse `text` with the parameter's kind, then [`assign`](Self::assign).
    pub(crate) fn assign_text(&mut self, at: RecordRef, text: &str) -> Result<(), VariantError> {
        let record = self.record(at)?;
        let kind = record.parameter()?.model.kind;
        if !record.is_active() {
            return Err(VariantError::inactive(record.path()));
        }
        let value = Value::parse(kind, text)
            .map_err(|reason| VariantError::invalid_value(record.path(), reason))?;
        self.assign(at, Some(value))
    }

    /// Re-derive `at` and walk on. `forced` re-validates a parameter and
    /// notifies dependers even when the active flag does not change.
    pub(crate) fn reconcile(&mut self, at: RecordRef, forced: bool) -> Result<(), VariantError> {
        if !self.stack.insert(at) {
            return Ok(());
        }
        let result = self.reconcile_entered(at, forced);
        self.stack.remove(&at);
        result
    }

    fn reconcile_entered(&mut self, at: RecordRef, forced: bool) -> Result<(), VariantError> {
        let active = self.desired_active(at)?;
        let changed = self.record(at)?.is_active() != active;
        if changed {
            let record = self.record_mut(at)?;
            record.active = active;
            trace!(path = %record.path, active, "activation changed");
        }

        if self.record(at)?.is_parameter() {
            self.refresh_groups(at)?;
            if active && (forced || changed) {
                let record = self.record(at)?;
                if let Some(value) = record.effective_value() {
                    admit(record, value.clone())?;
                }
            }
            if forced || changed {
                let controls = self.record(at)?.controlled_variants().to_vec();
                for id in controls {
                    let daughter = at.sibling(id);
                    let with_update = self.record(daughter)?.with_update();
                    self.reconcile(daughter, with_update)?;
                }
            }
        } else {
            let record = self.record(at)?;
            let (parameters, variants): (Vec<_>, Vec<_>) = record
                .daughters()
                .map(|id| at.sibling(id))
                .partition(|d| self.record(*d).is_ok_and(Record::is_parameter));
            for daughter in parameters.into_iter().chain(variants) {
                let with_update = self.record(daughter)?.with_update();
                if changed || with_update {
                    self.reconcile(daughter, with_update)?;
                }
            }
        }

        if changed || forced {
            let links = self.links;
            let dependers: BTreeSet<RecordRef> = links.dependers(at).map(Node::record).collect();
            for depender in dependers {
                let with_update = self.record(depender)?.with_update();
                self.reconcile(depender, with_update)?;
            }
        }
        Ok(())
    }

    fn desired_active(&self, at: RecordRef) -> Result<bool, VariantError> {
        let record = self.record(at)?;
        if let Some(parent) = record.parent() {
            if !self.is_active(at.sibling(parent)) {
                return Ok(false);
            }
        }
        if let Some(controller) = record.controller() {
            let controller = self.record(at.sibling(controller))?;
            if !controller.is_active() || controller.selected_variant() != Some(record.name()) {
                return Ok(false);
            }
        }
        Ok(self.dependees_active(&Node::Record(at)))
    }

    fn refresh_groups(&mut self, at: RecordRef) -> Result<(), VariantError> {
        let record = self.record(at)?;
        let model = record.parameter()?.model.clone();
        let links = self.links;
        let disabled: BTreeSet<String> = model
            .groups
            .iter()
            .filter(|g| !links.is_enabled(&Node::Group(at, g.name.clone()), |d| self.is_active(d)))
            .map(|g| g.name.clone())
            .collect();
        if self.record(at)?.parameter()?.disabled_groups == disabled {
            return Ok(());
        }
        let record = self.record_mut(at)?;
        trace!(path = %record.path, disabled = ?disabled, "value groups changed");
        record.parameter_mut()?.disabled_groups = disabled;
        Ok(())
    }
}

/// Coerce and check a value against the parameter's model and its enabled
/// value groups.
pub(crate) fn admit(record: &Record, value: Value) -> Result<Value, VariantError> {
    let state = record.parameter()?;
    let value = state
        .model
        .admit(value)
        .map_err(|reason| VariantError::invalid_value(record.path(), reason))?;
    if let Some(group) = state
        .model
        .groups_of(&value)
        .find(|g| state.disabled_groups.contains(*g))
    {
        return Err(VariantError::invalid_value(
            record.path(),
            format!("{value} belongs to disabled value group '{group}'"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParameterModel, VariantModel};
    use crate::value::ValueKind;
    use std::sync::Arc;

    fn registry(name: &str) -> Registry {
        let gain = ParameterModel::new("gain", ValueKind::Integer).with_default(1);
        let top = VariantModel::new("top").with_parameter("gain", Arc::new(gain));
        Registry::build(name, Arc::new(top)).expect("registry builds")
    }

    #[test]
    fn only_written_registries_are_staged() {
        let (a, b) = (registry("a"), registry("b"));
        let links = Links::default();
        let gain = RecordRef::new(1, b.id_of("top/gain").expect("gain exists"));
        let mut propagator = Propagator::new(vec![Some(&a), Some(&b)], &links);
        propagator
            .assign(gain, Some(Value::Integer(5)))
            .expect("valid value");

        let staged = propagator.into_staged();
        assert_eq!(staged.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(staged[&1].value("top/gain"), Ok(Value::Integer(5)));
        assert_eq!(b.value("top/gain"), Ok(Value::Integer(1)));
    }

    #[test]
    fn unchanged_reconcile_stages_nothing() {
        let a = registry("a");
        let links = Links::default();
        let mut propagator = Propagator::new(vec![Some(&a)], &links);
        propagator
            .reconcile(RecordRef::new(0, a.top_id()), true)
            .expect("reconciles");
        assert!(propagator.into_staged().is_empty());
    }
}
