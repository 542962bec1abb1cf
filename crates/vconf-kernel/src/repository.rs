//! A named collection of registries plus the dependency links between
//! their records.
//!
//! The repository owns every registry it holds and is the only way to
//! mutate them, so cross-registry dependers always see a change. Each
//! mutation writes to staged copies of the registries it touches, committed
//! only when the whole propagation pass succeeds.

use crate::address::Address;
use crate::dependency::{Dependency, DependencyLogic, Links, Node, RecordRef};
use crate::error::{ParseError, VariantError};
use crate::logic::Logic;
use crate::model::VariantModel;
use crate::propagation::Propagator;
use crate::record::{Record, RecordId};
use crate::registry::{Registry, default_of, fixed_of};
use crate::selector::Selector;
use crate::snapshot;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// A checked reference to a record; goes stale when its registry is removed
/// or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordHandle {
    registry: usize,
    generation: u64,
    record: RecordId,
}

impl RecordHandle {
    pub fn record(&self) -> RecordId {
        self.record
    }
}

#[derive(Debug, Clone)]
struct SlotMeta {
    name: String,
    rank: Option<u32>,
    generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Repository {
    registries: Vec<Option<Registry>>,
    meta: Vec<SlotMeta>,
    links: Links,
    locked: bool,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_registry(
        &mut self,
        name: impl Into<String>,
        top: Arc<VariantModel>,
    ) -> Result<(), VariantError> {
        self.add_registry(Registry::build(name, top)?, None)
    }

    pub fn build_ranked_registry(
        &mut self,
        name: impl Into<String>,
        rank: u32,
        top: Arc<VariantModel>,
    ) -> Result<(), VariantError> {
        self.add_registry(Registry::build(name, top)?, Some(rank))
    }

    /// Take ownership of a built registry.
    pub fn add_registry(&mut self, registry: Registry, rank: Option<u32>) -> Result<(), VariantError> {
        if self.slot(registry.name()).is_ok() {
            return Err(VariantError::DuplicateRegistry(registry.name().to_string()));
        }
        if let Some(rank) = rank {
            if let Some(owner) = self.live().find(|(_, meta)| meta.rank == Some(rank)) {
                return Err(VariantError::DuplicateRank {
                    rank,
                    registry: owner.1.name.clone(),
                });
            }
        }
        debug!(registry = %registry.name(), rank = ?rank, "registry added");
        self.meta.push(SlotMeta {
            name: registry.name().to_string(),
            rank,
            generation: 0,
        });
        self.registries.push(Some(registry));
        Ok(())
    }

    /// Remove a registry and every link touching it. Records that depended
    /// on it are re-derived.
    pub fn remove_registry(&mut self, name: &str) -> Result<Registry, VariantError> {
        let slot = self.slot(name)?;
        let mut links = self.links.clone();
        let orphaned = links.detach_registry(slot);
        let mut base = self.base();
        base[slot] = None;
        let mut propagator = Propagator::new(base, &links);
        for at in orphaned {
            propagator.reconcile(at, true)?;
        }
        let staged = propagator.into_staged();
        let removed = self.registries[slot]
            .take()
            .ok_or_else(|| VariantError::UnknownRegistry(name.to_string()))?;
        self.commit(staged);
        self.links = links;
        self.meta[slot].generation += 1;
        debug!(registry = %name, "registry removed");
        Ok(removed)
    }

    /// Rebuild a registry from its top model, discarding every value set on
    /// it. Links into it survive; handles into it go stale.
    pub fn reset_registry(&mut self, name: &str) -> Result<(), VariantError> {
        let slot = self.slot(name)?;
        let top = self.registry(name)?.top_model().clone();
        let fresh = Registry::instantiate(name.to_string(), top)?;
        let dependers: BTreeSet<RecordRef> = self
            .links
            .iter()
            .filter(|(depender, dependee)| {
                dependee.registry == slot && depender.record().registry != slot
            })
            .map(|(depender, _)| depender.record())
            .collect();

        let mut base = self.base();
        base[slot] = Some(&fresh);
        let mut propagator = Propagator::new(base, &self.links);
        propagator.reconcile(RecordRef::new(slot, RecordId(0)), true)?;
        for at in dependers {
            propagator.reconcile(at, true)?;
        }
        let staged = propagator.into_staged();
        self.registries[slot] = Some(fresh);
        self.commit(staged);
        self.meta[slot].generation += 1;
        debug!(registry = %name, "registry reset");
        Ok(())
    }

    pub fn has_registry(&self, name: &str) -> bool {
        self.slot(name).is_ok()
    }

    pub fn registry(&self, name: &str) -> Result<&Registry, VariantError> {
        let slot = self.slot(name)?;
        self.registries[slot]
            .as_ref()
            .ok_or_else(|| VariantError::UnknownRegistry(name.to_string()))
    }

    pub fn rank_of(&self, name: &str) -> Result<Option<u32>, VariantError> {
        Ok(self.meta[self.slot(name)?].rank)
    }

    /// Registries ranked ascending, then unranked in insertion order.
    pub fn registries(&self) -> impl Iterator<Item = &Registry> {
        self.order()
            .into_iter()
            .filter_map(|slot| self.registries[slot].as_ref())
    }

    fn order(&self) -> Vec<usize> {
        let (mut ranked, unranked): (Vec<_>, Vec<_>) = self
            .live()
            .map(|(slot, meta)| (slot, meta.rank))
            .partition(|(_, rank)| rank.is_some());
        ranked.sort_by_key(|(_, rank)| *rank);
        ranked.into_iter().chain(unranked).map(|(slot, _)| slot).collect()
    }

    fn live(&self) -> impl Iterator<Item = (usize, &SlotMeta)> {
        self.meta
            .iter()
            .enumerate()
            .filter(|(slot, _)| self.registries[*slot].is_some())
    }

    fn slot(&self, name: &str) -> Result<usize, VariantError> {
        self.live()
            .find(|(_, meta)| meta.name == name)
            .map(|(slot, _)| slot)
            .ok_or_else(|| VariantError::UnknownRegistry(name.to_string()))
    }

    fn resolve(&self, address: &Address) -> Result<RecordRef, VariantError> {
        let registry = address
            .registry
            .as_deref()
            .ok_or_else(|| VariantError::UnknownRegistry(address.to_string()))?;
        let slot = self.slot(registry)?;
        let id = self.registry(registry)?.id_of(&address.local_path())?;
        Ok(RecordRef::new(slot, id))
    }

    fn resolve_text(&self, text: &str) -> Result<RecordRef, VariantError> {
        let address: Address = text.parse()?;
        self.resolve(&address)
    }

    fn base(&self) -> Vec<Option<&Registry>> {
        self.registries.iter().map(Option::as_ref).collect()
    }

    fn commit(&mut self, staged: BTreeMap<usize, Registry>) {
        for (slot, registry) in staged {
            self.registries[slot] = Some(registry);
        }
    }

    fn at(&self, at: RecordRef) -> Result<&Record, VariantError> {
        self.registries
            .get(at.registry)
            .and_then(Option::as_ref)
            .and_then(|r| r.get(at.id))
            .ok_or_else(|| VariantError::StaleReference(self.meta[at.registry].name.clone()))
    }

    /// Look up `registry:path`.
    pub fn find(&self, address: &str) -> Result<&Record, VariantError> {
        self.at(self.resolve_text(address)?)
    }

    pub fn find_address(&self, address: &Address) -> Result<&Record, VariantError> {
        self.at(self.resolve(address)?)
    }

    pub fn handle(&self, address: &str) -> Result<RecordHandle, VariantError> {
        let at = self.resolve_text(address)?;
        Ok(RecordHandle {
            registry: at.registry,
            generation: self.meta[at.registry].generation,
            record: at.id,
        })
    }

    pub fn get(&self, handle: RecordHandle) -> Result<&Record, VariantError> {
        let meta = self
            .meta
            .get(handle.registry)
            .ok_or_else(|| VariantError::StaleReference(format!("slot {}", handle.registry)))?;
        if meta.generation != handle.generation {
            return Err(VariantError::StaleReference(meta.name.clone()));
        }
        self.at(RecordRef::new(handle.registry, handle.record))
    }

    pub fn value(&self, address: &str) -> Result<Value, VariantError> {
        self.find(address)?.value()
    }

    pub fn is_active(&self, address: &str) -> Result<bool, VariantError> {
        Ok(self.find(address)?.is_active())
    }

    /// Every record matched by `selector`, registries in rank order and
    /// records in path order.
    pub fn select(&self, selector: &Selector) -> Vec<(&Registry, &Record)> {
        let mut out = Vec::new();
        for registry in self.registries() {
            for record in registry.records() {
                let Ok(address) = Address::parse_local(record.path()) else {
                    continue;
                };
                if selector.matches_path(registry.name(), &address.segments) {
                    out.push((registry, record));
                }
            }
        }
        out
    }

    /// Active variable parameters with no value, as `registry:path`.
    pub fn unset_parameters(&self) -> Vec<String> {
        self.registries()
            .flat_map(|registry| {
                registry
                    .unset_parameters()
                    .into_iter()
                    .map(move |path| format!("{}:{path}", registry.name()))
            })
            .collect()
    }

    pub fn is_accomplished(&self) -> bool {
        self.registries().all(Registry::is_accomplished)
    }

    /// Make `depender` (a record or `path@group`) require `dependee` to be
    /// active. The link is kept only if it closes no cycle and the
    /// resulting propagation succeeds.
    pub fn register_dependency(&mut self, depender: &str, dependee: &str) -> Result<(), VariantError> {
        let depender_address: Address = depender.parse()?;
        let dependee_address: Address = dependee.parse()?;
        if dependee_address.group.is_some() {
            return Err(ParseError::new(
                dependee.find('@').unwrap_or(0),
                "a dependee cannot name a value group",
            )
            .into());
        }
        let node = self.depender_node(depender_address)?;
        let dependee_at = self.resolve(&dependee_address)?;

        if self.links.contains(&node, dependee_at) {
            return Err(VariantError::DuplicateDependency {
                depender: depender.trim().to_string(),
                dependee: dependee.trim().to_string(),
            });
        }
        if self.links.would_cycle(&self.registries, &node, dependee_at) {
            return Err(VariantError::CyclicDependency {
                depender: depender.trim().to_string(),
                dependee: dependee.trim().to_string(),
            });
        }

        let depender_at = node.record();
        let mut links = self.links.clone();
        links.insert(node, dependee_at);
        self.relink(links, depender_at)?;
        debug!(depender = %depender.trim(), dependee = %dependee.trim(), "dependency registered");
        Ok(())
    }

    /// Combine the dependees of `depender` with `logic` instead of requiring
    /// all of them, e.g. `or([0], [1])`. Slot `n` is the n-th dependee
    /// registered for that depender.
    pub fn set_dependency_logic(&mut self, depender: &str, logic: &str) -> Result<(), VariantError> {
        let node = self.depender_node(depender.parse()?)?;
        let logic: Logic = logic.parse()?;
        let count = self.links.dependee_count(&node);
        if logic.max_slot() >= count {
            return Err(VariantError::InvalidLogic {
                depender: depender.trim().to_string(),
                reason: format!(
                    "slot [{}] is out of range, {count} dependees registered",
                    logic.max_slot()
                ),
            });
        }
        debug!(depender = %depender.trim(), logic = %logic, "dependency logic set");
        let depender_at = node.record();
        let mut links = self.links.clone();
        links.set_logic(node, logic);
        self.relink(links, depender_at)
    }

    /// Swap in `links` if re-deriving `depender_at` under them succeeds.
    fn relink(&mut self, links: Links, depender_at: RecordRef) -> Result<(), VariantError> {
        let mut propagator = Propagator::new(self.base(), &links);
        propagator.reconcile(depender_at, true)?;
        let staged = propagator.into_staged();
        self.commit(staged);
        self.links = links;
        Ok(())
    }

    fn depender_node(&self, address: Address) -> Result<Node, VariantError> {
        let at = self.resolve(&address)?;
        let Some(group) = address.group else {
            return Ok(Node::Record(at));
        };
        let record = self.at(at)?;
        let known = record
            .parameter_model()
            .is_some_and(|model| model.has_group(&group));
        if !known {
            return Err(VariantError::UnknownGroup {
                path: record.path().to_string(),
                group,
            });
        }
        Ok(Node::Group(at, group))
    }

    /// Registered links in address form, in registration order.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.links
            .iter()
            .filter_map(|(depender, dependee)| {
                Some(Dependency {
                    depender: self.node_address(depender)?,
                    dependee: self.address_of(*dependee)?,
                })
            })
            .collect()
    }

    /// Dependers combining their dependees with explicit logic.
    pub fn dependency_logics(&self) -> Vec<DependencyLogic> {
        self.links
            .logics()
            .filter_map(|(depender, logic)| {
                Some(DependencyLogic {
                    depender: self.node_address(depender)?,
                    logic: logic.to_string(),
                })
            })
            .collect()
    }

    fn node_address(&self, node: &Node) -> Option<String> {
        let mut text = self.address_of(node.record())?;
        if let Node::Group(_, group) = node {
            text.push('@');
            text.push_str(group);
        }
        Some(text)
    }

    fn address_of(&self, at: RecordRef) -> Option<String> {
        let record = self.at(at).ok()?;
        Some(format!("{}:{}", self.meta[at.registry].name, record.path()))
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_value(&mut self, address: &str, value: impl Into<Value>) -> Result<(), VariantError> {
        let at = self.writable(address)?;
        let value = value.into();
        self.stage(|p| p.assign(at, Some(value)))
    }

    pub fn set_value_from_str(&mut self, address: &str, text: &str) -> Result<(), VariantError> {
        let at = self.writable(address)?;
        self.stage(|p| p.assign_text(at, text))
    }

    pub fn unset_value(&mut self, address: &str) -> Result<(), VariantError> {
        let at = self.writable(address)?;
        self.stage(|p| p.assign(at, None))
    }

    pub fn set_default_value(&mut self, address: &str) -> Result<(), VariantError> {
        let at = self.writable(address)?;
        let value = default_of(self.at(at)?)?;
        self.stage(|p| p.assign(at, Some(value)))
    }

    pub fn set_fixed_value(&mut self, address: &str) -> Result<(), VariantError> {
        let at = self.writable(address)?;
        let value = fixed_of(self.at(at)?)?;
        self.stage(|p| p.assign(at, Some(value)))
    }

    /// Force re-derivation of one record, its daughters and its dependers.
    pub fn update(&mut self, address: &str) -> Result<(), VariantError> {
        let at = self.resolve_text(address)?;
        self.stage(|p| p.reconcile(at, true))
    }

    fn writable(&self, address: &str) -> Result<RecordRef, VariantError> {
        if self.locked {
            return Err(VariantError::Locked);
        }
        self.resolve_text(address)
    }

    fn stage<T>(
        &mut self,
        op: impl FnOnce(&mut Propagator<'_>) -> Result<T, VariantError>,
    ) -> Result<T, VariantError> {
        let mut propagator = Propagator::new(self.base(), &self.links);
        let out = op(&mut propagator)?;
        let staged = propagator.into_staged();
        self.commit(staged);
        Ok(out)
    }

    /// `registry:path = value` lines over all registries in rank order.
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        for registry in self.registries() {
            for (path, value) in registry.snapshot_entries() {
                out.push_str(&format!("{}:{path} = {value}\n", registry.name()));
            }
        }
        out
    }

    /// Re-apply repository snapshot text atomically. Lines naming unknown
    /// registries or paths are skipped.
    pub fn restore(&mut self, text: &str) -> Result<(), VariantError> {
        if self.locked {
            return Err(VariantError::Locked);
        }
        let lines = snapshot::parse(text)?;
        let mut assignments = Vec::with_capacity(lines.len());
        for line in lines {
            let Some((registry, path)) = line.key.split_once(':') else {
                snapshot::skip(&line, "missing registry prefix");
                continue;
            };
            let Ok(slot) = self.slot(registry.trim()) else {
                snapshot::skip(&line, "unknown registry");
                continue;
            };
            let Ok(id) = self.registry(registry.trim()).and_then(|r| r.id_of(path)) else {
                snapshot::skip(&line, "unknown path");
                continue;
            };
            assignments.push(line.bind(RecordRef::new(slot, id)));
        }
        self.stage(|p| snapshot::apply(p, assignments))
    }
}
