//! # vconf kernel
//!
//! A variant configuration engine: hierarchical trees of typed parameters
//! and mutually exclusive sub-configurations ("variants"), where the value
//! of a parameter decides which sibling variants participate in the
//! effective configuration.
//!
//! The kernel performs no I/O. Collaborators supply immutable models and
//! drive the records built from them.
//!
//! ## Architecture
//!
//! ```text
//! Repository            ← Named registries + depender links, staged commits
//!     │
//! Registry              ← Arena of records rooted at one top variant
//!     │
//! Record                ← Parameter (value) | Variant (daughters)
//!     │
//! Propagation           ← set value → validate → (de)activate sub-trees
//!     │
//! ParameterModel /      ← Immutable schemas shared by records
//! VariantModel
//! ```
//!
//! Addresses (`registry:path/seg[n]@group`), address sets (`{*}`, `{a;b}`,
//! `[lo;hi)`) and selectors are pure parsers usable on their own.

pub mod address;
pub mod address_set;
pub mod dependency;
pub mod error;
pub mod logic;
pub mod model;
pub mod record;
pub mod registry;
pub mod repository;
pub mod selector;
pub mod value;

mod propagation;
mod snapshot;

pub use address::{Address, Segment};
pub use address_set::AddressSet;
pub use dependency::{Dependency, DependencyLogic};
pub use error::{ParseError, VariantError};
pub use logic::Logic;
pub use model::{
    Domain, ParameterModel, Slot, SlotModel, ValueGroup, VariantAssociation, VariantModel,
    is_valid_name,
};
pub use record::{Record, RecordId, RecordKind};
pub use registry::Registry;
pub use repository::{RecordHandle, Repository};
pub use selector::{SegmentPattern, Selector};
pub use value::{Value, ValueKind};
