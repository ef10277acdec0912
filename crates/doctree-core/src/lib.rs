//! Tree-document model core: positional addressing, reversible operations,
//! change buffering and live address tracking.
//!
//! The document is a forest of named roots holding elements and text, plus a
//! `$graveyard` root where removed content is parked so removals stay
//! reversible. Addresses are [`Position`] values (root name + offset path),
//! spans are [`Range`]s, and every mutation is an [`Operation`] applied
//! through [`Document::apply`]. The [`Differ`] turns a batch of applied
//! operations into a minimal ordered change set; the [`LiveRegistry`] keeps
//! user-held addresses valid across changes.

pub mod differ;
pub mod document;
pub mod error;
pub mod json;
pub mod live;
pub mod marker;
pub mod node;
pub mod operation;
pub mod position;
pub mod range;

pub use differ::{
    AttributeDelta, ChangedMarker, ChangedRoot, ChangesOptions, DiffAction, DiffItem, Differ,
    ElementBefore,
};
pub use document::Document;
pub use error::{JsonError, ModelError};
pub use live::{LiveChangeEvent, LivePositionId, LiveRangeId, LiveRegistry, ListenerId};
pub use marker::{Marker, MarkerCollection};
pub use node::{Attributes, NodeData, NodeId, Tree, GRAVEYARD_ROOT, TEXT_NAME};
pub use operation::{MoveKind, Operation, OperationKind};
pub use position::{Position, PositionRelation, Stickiness};
pub use range::Range;

/// Version of this crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
