//! The document: tree state, markers, change buffer and live addresses
//! behind a single versioned apply pipeline.

use crate::differ::{ChangedMarker, ChangedRoot, ChangesOptions, DiffItem, Differ};
use crate::error::ModelError;
use crate::live::LiveRegistry;
use crate::marker::MarkerCollection;
use crate::node::{NodeData, Tree};
use crate::operation::Operation;
use crate::position::Position;

/// An editable tree document. All mutation goes through [`Document::apply`]:
/// version check, validation, change buffering, execution, then live-address
/// transformation, in that order. A failed step leaves the document
/// untouched.
#[derive(Debug, Default)]
pub struct Document {
    tree: Tree,
    markers: MarkerCollection,
    differ: Differ,
    live: LiveRegistry,
    version: u64,
}

impl Document {
    /// Empty document: just the graveyard root, version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current document version. Starts at 0 and grows by one per applied
    /// operation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn markers(&self) -> &MarkerCollection {
        &self.markers
    }

    pub fn live(&self) -> &LiveRegistry {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut LiveRegistry {
        &mut self.live
    }

    pub fn differ(&self) -> &Differ {
        &self.differ
    }

    /// Creates an attached root outside the operation pipeline. Used for
    /// initial document setup; collaborative root creation uses
    /// [`Operation::Root`].
    pub fn create_root(&mut self, name: &str) {
        self.tree.create_root(name, true);
    }

    /// Applies one operation. The operation's `base_version` must equal the
    /// current document version.
    pub fn apply(&mut self, op: &Operation) -> Result<(), ModelError> {
        if op.base_version() != self.version {
            return Err(ModelError::BaseVersionMismatch {
                operation: op.base_version(),
                document: self.version,
            });
        }
        op.validate(&self.tree, &self.markers)?;
        self.differ.buffer_operation(&self.tree, &self.markers, op);
        op.execute(&mut self.tree, &mut self.markers)?;
        self.version += 1;
        self.live.transform_all(op);
        Ok(())
    }

    /// Buffered changes since the last [`Document::reset_changes`], minimal
    /// and in document order.
    pub fn get_changes(&mut self, options: ChangesOptions) -> Vec<DiffItem> {
        self.differ.get_changes(&self.tree, options)
    }

    pub fn get_changed_markers(&self) -> Vec<ChangedMarker> {
        self.differ.get_changed_markers()
    }

    pub fn get_changed_roots(&self) -> Vec<ChangedRoot> {
        self.differ.get_changed_roots()
    }

    pub fn has_buffered_changes(&self) -> bool {
        !self.differ.is_empty()
    }

    pub fn has_data_changes(&self) -> bool {
        self.differ.has_data_changes()
    }

    /// Ends the current change batch: consumers have seen the diff.
    pub fn reset_changes(&mut self) {
        self.differ.reset();
    }

    /// Re-queues the element at `position` as removed-then-inserted with the
    /// refresh action, forcing consumers to reconvert it.
    pub fn refresh_item(&mut self, position: &Position) {
        self.differ.refresh_item(&self.tree, &self.markers, position);
    }

    /// Deep value snapshot of a root's content.
    pub fn export_root(&self, name: &str) -> Option<NodeData> {
        let root = self.tree.root(name)?;
        self.tree.export(root.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;

    #[test]
    fn apply_bumps_version_and_checks_base() {
        let mut doc = Document::new();
        doc.create_root("main");
        let op = Operation::Insert {
            base_version: 0,
            position: Position::new("main", vec![0]),
            nodes: vec![NodeData::text("hi")],
        };
        doc.apply(&op).unwrap();
        assert_eq!(doc.version(), 1);
        let stale = Operation::Insert {
            base_version: 0,
            position: Position::new("main", vec![0]),
            nodes: vec![NodeData::text("again")],
        };
        assert_eq!(
            doc.apply(&stale),
            Err(ModelError::BaseVersionMismatch {
                operation: 0,
                document: 1,
            })
        );
    }

    #[test]
    fn failed_validation_leaves_document_untouched() {
        let mut doc = Document::new();
        doc.create_root("main");
        let bad = Operation::Move {
            base_version: 0,
            source: Position::new("main", vec![0]),
            how_many: 3,
            target: Position::new("main", vec![0]),
        };
        assert!(doc.apply(&bad).is_err());
        assert_eq!(doc.version(), 0);
        assert!(!doc.has_buffered_changes());
    }
}
