//! Explicit depender -> dependee links between records.
//!
//! A depender (a record, or one value group of a parameter) is enabled only
//! while every one of its dependees is active, unless a [`Logic`] expression
//! over its dependees says otherwise. Links are owned by the repository and
//! kept acyclic together with the implicit tree edges.

use crate::logic::Logic;
use crate::record::RecordId;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A record located in a repository slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RecordRef {
    pub(crate) registry: usize,
    pub(crate) id: RecordId,
}

impl RecordRef {
    pub(crate) fn new(registry: usize, id: RecordId) -> Self {
        Self { registry, id }
    }

    pub(crate) fn sibling(self, id: RecordId) -> Self {
        Self { id, ..self }
    }
}

/// The depending side of a link.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Node {
    Record(RecordRef),
    Group(RecordRef, String),
}

impl Node {
    pub(crate) fn record(&self) -> RecordRef {
        match self {
            Node::Record(at) | Node::Group(at, _) => *at,
        }
    }
}

/// A registered dependency in address form, e.g.
/// `{ depender = "sim:setup/physics@em", dependee = "geo:setup/calo" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub depender: String,
    pub dependee: String,
}

/// Combining logic of one depender, e.g.
/// `{ depender = "sim:setup/physics", logic = "or([0], [1])" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLogic {
    pub depender: String,
    pub logic: String,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Links {
    edges: Vec<(Node, RecordRef)>,
    logic: BTreeMap<Node, Logic>,
}

impl Links {
    pub(crate) fn iter(&self) -> impl Iterator<Item = &(Node, RecordRef)> {
        self.edges.iter()
    }

    pub(crate) fn contains(&self, depender: &Node, dependee: RecordRef) -> bool {
        self.edges
            .iter()
            .any(|(d, e)| d == depender && *e == dependee)
    }

    pub(crate) fn insert(&mut self, depender: Node, dependee: RecordRef) {
        self.edges.push((depender, dependee));
    }

    pub(crate) fn dependees<'a>(&'a self, depender: &'a Node) -> impl Iterator<Item = RecordRef> + 'a {
        self.edges
            .iter()
            .filter(move |(d, _)| d == depender)
            .map(|(_, e)| *e)
    }

    /// Whether `depender` is enabled given which records are `active`.
    /// Slot `n` of its logic is its n-th registered dependee.
    pub(crate) fn is_enabled(&self, depender: &Node, active: impl Fn(RecordRef) -> bool) -> bool {
        let dependees: Vec<RecordRef> = self.dependees(depender).collect();
        match self.logic.get(depender) {
            Some(logic) => {
                logic.evaluate(&|slot| dependees.get(slot).is_some_and(|d| active(*d)))
            }
            None => dependees.into_iter().all(active),
        }
    }

    pub(crate) fn dependee_count(&self, depender: &Node) -> usize {
        self.dependees(depender).count()
    }

    pub(crate) fn set_logic(&mut self, depender: Node, logic: Logic) {
        self.logic.insert(depender, logic);
    }

    pub(crate) fn logics(&self) -> impl Iterator<Item = (&Node, &Logic)> {
        self.logic.iter()
    }

    pub(crate) fn dependers(&self, dependee: RecordRef) -> impl Iterator<Item = &Node> {
        self.edges
            .iter()
            .filter(move |(_, e)| *e == dependee)
            .map(|(d, _)| d)
    }

    /// Drop every link touching `registry`; returns the surviving records
    /// that lost a dependee. A surviving depender with logic loses all of
    /// its links and its logic, since its slot numbering no longer holds.
    pub(crate) fn detach_registry(&mut self, registry: usize) -> BTreeSet<RecordRef> {
        let touches = |node: &Node, dependee: &RecordRef| {
            node.record().registry == registry || dependee.registry == registry
        };
        let released: BTreeSet<Node> = self
            .edges
            .iter()
            .filter(|(d, e)| touches(d, e) && d.record().registry != registry)
            .filter(|(d, _)| self.logic.contains_key(d))
            .map(|(d, _)| d.clone())
            .collect();
        let mut orphaned = BTreeSet::new();
        self.edges.retain(|(depender, dependee)| {
            let depender_at = depender.record();
            if !touches(depender, dependee) && !released.contains(depender) {
                return true;
            }
            if depender_at.registry != registry {
                orphaned.insert(depender_at);
            }
            false
        });
        self.logic
            .retain(|node, _| node.record().registry != registry && !released.contains(node));
        orphaned
    }

    /// Whether adding `depender -> dependee` closes a cycle, counting the
    /// implicit edges child -> parent, controlled variant -> controller and
    /// parameter -> its value groups.
    pub(crate) fn would_cycle(
        &self,
        registries: &[Option<Registry>],
        depender: &Node,
        dependee: RecordRef,
    ) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![Node::Record(dependee)];
        while let Some(node) = stack.pop() {
            if node == *depender {
                return true;
            }
            if !seen.insert(node.clone()) {
                continue;
            }
            stack.extend(self.dependees(&node).map(Node::Record));
            let Node::Record(at) = node else {
                continue;
            };
            let Some(record) = registries
                .get(at.registry)
                .and_then(Option::as_ref)
                .and_then(|r| r.get(at.id))
            else {
                continue;
            };
            if let Some(parent) = record.parent() {
                stack.push(Node::Record(at.sibling(parent)));
            }
            if let Some(controller) = record.controller() {
                stack.push(Node::Record(at.sibling(controller)));
            }
            if let Some(model) = record.parameter_model() {
                stack.extend(model.groups.iter().map(|g| Node::Group(at, g.name.clone())));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(registry: usize, id: usize) -> RecordRef {
        RecordRef::new(registry, RecordId(id))
    }

    #[test]
    fn dependees_and_dependers_are_symmetric() {
        let mut links = Links::default();
        links.insert(Node::Record(at(0, 1)), at(1, 0));
        links.insert(Node::Group(at(0, 2), "fast".into()), at(1, 0));
        assert_eq!(
            links.dependees(&Node::Record(at(0, 1))).collect::<Vec<_>>(),
            vec![at(1, 0)]
        );
        assert_eq!(links.dependee_count(&Node::Group(at(0, 2), "fast".into())), 1);
        assert_eq!(links.dependee_count(&Node::Group(at(0, 2), "slow".into())), 0);
        assert_eq!(links.dependers(at(1, 0)).count(), 2);
    }

    #[test]
    fn logic_overrides_the_all_dependees_rule() {
        let mut links = Links::default();
        let depender = Node::Record(at(0, 1));
        links.insert(depender.clone(), at(1, 0));
        links.insert(depender.clone(), at(1, 1));
        let only_first = |r: RecordRef| r == at(1, 0);
        assert!(!links.is_enabled(&depender, only_first));

        links.set_logic(depender.clone(), "or([0], [1])".parse().expect("logic parses"));
        assert!(links.is_enabled(&depender, only_first));
        links.set_logic(depender.clone(), "not([1])".parse().expect("logic parses"));
        assert!(links.is_enabled(&depender, only_first));
        assert!(!links.is_enabled(&depender, |_| true));
        assert!(links.is_enabled(&Node::Record(at(0, 9)), |_| false));
    }

    #[test]
    fn detaching_releases_dependers_with_logic() {
        let mut links = Links::default();
        let depender = Node::Record(at(0, 1));
        links.insert(depender.clone(), at(1, 0));
        links.insert(depender.clone(), at(2, 0));
        links.set_logic(depender.clone(), "xor([0], [1])".parse().expect("logic parses"));
        links.insert(Node::Record(at(0, 2)), at(2, 0));

        let orphaned = links.detach_registry(1);
        assert_eq!(orphaned.into_iter().collect::<Vec<_>>(), vec![at(0, 1)]);
        assert_eq!(links.dependee_count(&depender), 0);
        assert_eq!(links.logics().count(), 0);
        assert_eq!(links.iter().count(), 1);
    }

    #[test]
    fn detaching_a_registry_reports_orphaned_dependers() {
        let mut links = Links::default();
        links.insert(Node::Record(at(0, 1)), at(1, 0));
        links.insert(Node::Record(at(1, 3)), at(0, 0));
        links.insert(Node::Record(at(0, 2)), at(2, 0));
        let orphaned = links.detach_registry(1);
        assert_eq!(orphaned.into_iter().collect::<Vec<_>>(), vec![at(0, 1)]);
        assert_eq!(links.iter().count(), 1);
    }

    #[test]
    fn explicit_edges_close_cycles() {
        let mut links = Links::default();
        links.insert(Node::Record(at(0, 1)), at(1, 1));
        assert!(links.would_cycle(&[], &Node::Record(at(1, 1)), at(0, 1)));
        assert!(!links.would_cycle(&[], &Node::Record(at(1, 2)), at(0, 1)));
        assert!(links.would_cycle(&[], &Node::Record(at(0, 3)), at(0, 3)));
    }
}
