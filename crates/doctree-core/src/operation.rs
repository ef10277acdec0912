//! The reversible operation family.
//!
//! An operation is an atomic, versioned tree mutation. `validate` is pure and
//! runs immediately before `execute`; a validation error aborts the whole
//! operation before any mutation. `get_reversed` yields the exact inverse at
//! `base_version + 1`, so undo is "apply reverses in reverse order".

use serde_json::Value;

use crate::error::ModelError;
use crate::marker::{Marker, MarkerCollection};
use crate::node::{total_offset_size, NodeData, Tree, GRAVEYARD_ROOT};
use crate::position::{merge_deletion_position, Position};
use crate::range::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Move,
    Rename,
    Split,
    Merge,
    Attribute,
    Marker,
    Root,
    RootAttribute,
    Detach,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Move => "move",
            OperationKind::Rename => "rename",
            OperationKind::Split => "split",
            OperationKind::Merge => "merge",
            OperationKind::Attribute => "attribute",
            OperationKind::Marker => "marker",
            OperationKind::Root => "root",
            OperationKind::RootAttribute => "rootAttribute",
            OperationKind::Detach => "detach",
        }
    }
}

/// Semantic classification of a move by the graveyard-root convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Plain relocation between attached roots.
    Move,
    /// Target root is the graveyard: a logical remove.
    Remove,
    /// Source root is the graveyard: a logical reinsert.
    Reinsert,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert {
        base_version: u64,
        position: Position,
        nodes: Vec<NodeData>,
    },
    Move {
        base_version: u64,
        source: Position,
        how_many: usize,
        target: Position,
    },
    Rename {
        base_version: u64,
        position: Position,
        old_name: String,
        new_name: String,
    },
    Split {
        base_version: u64,
        split_position: Position,
        how_many: usize,
        insertion_position: Position,
        graveyard_element_position: Option<Position>,
    },
    Merge {
        base_version: u64,
        source_position: Position,
        how_many: usize,
        target_position: Position,
        graveyard_position: Position,
    },
    Attribute {
        base_version: u64,
        range: Range,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    Marker {
        base_version: u64,
        name: String,
        old_range: Option<Range>,
        new_range: Option<Range>,
        affects_data: bool,
    },
    Root {
        base_version: u64,
        root_name: String,
        attach: bool,
    },
    RootAttribute {
        base_version: u64,
        root_name: String,
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
    /// Permanent local-only deletion of already-detached content. Never
    /// transmitted to peers and not reversible.
    Detach {
        base_version: u64,
        source: Position,
        how_many: usize,
    },
}

impl Operation {
    pub fn base_version(&self) -> u64 {
        match self {
            Operation::Insert { base_version, .. }
            | Operation::Move { base_version, .. }
            | Operation::Rename { base_version, .. }
            | Operation::Split { base_version, .. }
            | Operation::Merge { base_version, .. }
            | Operation::Attribute { base_version, .. }
            | Operation::Marker { base_version, .. }
            | Operation::Root { base_version, .. }
            | Operation::RootAttribute { base_version, .. }
            | Operation::Detach { base_version, .. } => *base_version,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Move { .. } => OperationKind::Move,
            Operation::Rename { .. } => OperationKind::Rename,
            Operation::Split { .. } => OperationKind::Split,
            Operation::Merge { .. } => OperationKind::Merge,
            Operation::Attribute { .. } => OperationKind::Attribute,
            Operation::Marker { .. } => OperationKind::Marker,
            Operation::Root { .. } => OperationKind::Root,
            Operation::RootAttribute { .. } => OperationKind::RootAttribute,
            Operation::Detach { .. } => OperationKind::Detach,
        }
    }

    /// Remove/Reinsert classification for moves, by root-name convention.
    pub fn move_kind(&self) -> Option<MoveKind> {
        match self {
            Operation::Move { source, target, .. } => Some(if target.is_in_graveyard() {
                MoveKind::Remove
            } else if source.is_in_graveyard() {
                MoveKind::Reinsert
            } else {
                MoveKind::Move
            }),
            _ => None,
        }
    }

    /// Checks the operation against the current tree without mutating
    /// anything.
    pub fn validate(&self, tree: &Tree, markers: &MarkerCollection) -> Result<(), ModelError> {
        match self {
            Operation::Insert { position, .. } => {
                tree.resolve_parent(position)?;
                Ok(())
            }
            Operation::Move {
                source,
                how_many,
                target,
                ..
            } => {
                let source_parent = tree.resolve_parent(source)?;
                if source.offset() + how_many > tree.max_offset(source_parent) {
                    return Err(ModelError::PositionInvalid);
                }
                tree.resolve_parent(target)?;
                if source.root() == target.root()
                    && target.get_transformed_by_deletion(source, *how_many).is_none()
                {
                    return Err(ModelError::MoveIntoSelf);
                }
                Ok(())
            }
            Operation::Rename {
                position, old_name, ..
            } => {
                let parent = tree.resolve_parent(position)?;
                let element = tree
                    .element_at(parent, position.offset())
                    .ok_or(ModelError::RenameWrongNameOrPosition)?;
                let node = tree.node(element).ok_or(ModelError::PositionInvalid)?;
                if node.name() != Some(old_name.as_str()) {
                    return Err(ModelError::RenameWrongNameOrPosition);
                }
                Ok(())
            }
            Operation::Split {
                split_position,
                how_many,
                insertion_position,
                graveyard_element_position,
                ..
            } => {
                if split_position.path().len() < 2 {
                    return Err(ModelError::PositionInvalid);
                }
                let split_element = tree.resolve_parent(split_position)?;
                if split_position.offset() + how_many != tree.max_offset(split_element) {
                    return Err(ModelError::SplitHowManyInvalid);
                }
                let mut expected = split_position.parent_path().to_vec();
                *expected.last_mut().expect("split element is not a root") += 1;
                if insertion_position.root() != split_position.root()
                    || insertion_position.path() != expected
                {
                    return Err(ModelError::SplitInsertionPositionInvalid);
                }
                if let Some(graveyard_position) = graveyard_element_position {
                    let parent = tree.resolve_parent(graveyard_position)?;
                    tree.element_at(parent, graveyard_position.offset())
                        .ok_or(ModelError::PositionInvalid)?;
                }
                Ok(())
            }
            Operation::Merge {
                source_position,
                how_many,
                target_position,
                graveyard_position,
                ..
            } => {
                if source_position.path().len() < 2 {
                    return Err(ModelError::PositionInvalid);
                }
                let merged = tree.resolve_parent(source_position)?;
                if source_position.offset() != 0 || *how_many != tree.max_offset(merged) {
                    return Err(ModelError::MergeHowManyInvalid);
                }
                tree.resolve_parent(target_position)?;
                let element_path = source_position.parent_path();
                if target_position.root() == source_position.root()
                    && target_position.path().len() > element_path.len()
                    && &target_position.path()[..element_path.len()] == element_path
                {
                    return Err(ModelError::MoveIntoSelf);
                }
                // The inverse split extracts a trailing span, so the merged
                // element must follow the target content (same root).
                if !target_position.is_before(&merge_deletion_position(source_position)) {
                    return Err(ModelError::MergeTargetInvalid);
                }
                tree.resolve_parent(graveyard_position)?;
                Ok(())
            }
            Operation::Attribute {
                range,
                key,
                old_value,
                new_value,
                ..
            } => {
                if !range.is_flat() {
                    return Err(ModelError::RangeNotFlat);
                }
                if old_value.is_none() && new_value.is_none() {
                    return Err(ModelError::AttributeValueMismatch(key.clone()));
                }
                let parent = tree.resolve_parent(&range.start)?;
                if range.end.offset() > tree.max_offset(parent) {
                    return Err(ModelError::PositionInvalid);
                }
                for child in
                    tree.children_overlapping(parent, range.start.offset(), range.end.offset())
                {
                    let node = tree.node(child).ok_or(ModelError::PositionInvalid)?;
                    let current = node.attrs.get(key);
                    match old_value {
                        None => {
                            if current.is_some() {
                                return Err(ModelError::AttributeValueMismatch(key.clone()));
                            }
                        }
                        Some(expected) => {
                            if current != Some(expected) {
                                return Err(ModelError::AttributeValueMismatch(key.clone()));
                            }
                        }
                    }
                }
                Ok(())
            }
            Operation::Marker {
                name,
                old_range,
                new_range,
                ..
            } => {
                match (markers.get(name), old_range) {
                    (None, None) => {}
                    (None, Some(_)) => return Err(ModelError::MarkerRangeMismatch(name.clone())),
                    (Some(_), None) => return Err(ModelError::MarkerNameCollision(name.clone())),
                    (Some(marker), Some(old)) => {
                        if !marker.range.is_equal(old) {
                            return Err(ModelError::MarkerRangeMismatch(name.clone()));
                        }
                    }
                }
                if let Some(new) = new_range {
                    tree.resolve_parent(&new.start)?;
                    tree.resolve_parent(&new.end)?;
                }
                Ok(())
            }
            Operation::Root {
                root_name, attach, ..
            } => {
                if root_name == GRAVEYARD_ROOT {
                    return Err(ModelError::RootStateInvalid(root_name.clone()));
                }
                let current = tree.root(root_name);
                match (attach, current) {
                    (true, Some(root)) if root.attached => {
                        Err(ModelError::RootStateInvalid(root_name.clone()))
                    }
                    (false, None) => Err(ModelError::RootMissing(root_name.clone())),
                    (false, Some(root)) if !root.attached => {
                        Err(ModelError::RootStateInvalid(root_name.clone()))
                    }
                    _ => Ok(()),
                }
            }
            Operation::RootAttribute {
                root_name,
                key,
                old_value,
                new_value,
                ..
            } => {
                if old_value.is_none() && new_value.is_none() {
                    return Err(ModelError::AttributeValueMismatch(key.clone()));
                }
                let root = tree
                    .root(root_name)
                    .ok_or_else(|| ModelError::RootMissing(root_name.clone()))?;
                let node = tree.node(root.node).ok_or(ModelError::PositionInvalid)?;
                if node.attrs.get(key) != old_value.as_ref() {
                    return Err(ModelError::AttributeValueMismatch(key.clone()));
                }
                Ok(())
            }
            Operation::Detach {
                source, how_many, ..
            } => {
                let root = tree
                    .root(source.root())
                    .ok_or(ModelError::PositionInvalid)?;
                if root.attached {
                    return Err(ModelError::DetachOnAttachedNode);
                }
                let parent = tree.resolve_parent(source)?;
                if source.offset() + how_many > tree.max_offset(parent) {
                    return Err(ModelError::PositionInvalid);
                }
                Ok(())
            }
        }
    }

    /// Performs exactly the described mutation. Assumes `validate` passed on
    /// the same tree state.
    pub fn execute(
        &self,
        tree: &mut Tree,
        markers: &mut MarkerCollection,
    ) -> Result<(), ModelError> {
        match self {
            Operation::Insert {
                position, nodes, ..
            } => {
                let parent = tree.resolve_parent(position)?;
                let ids = nodes.iter().map(|n| tree.materialize(n)).collect();
                tree.insert_children(parent, position.offset(), ids);
                Ok(())
            }
            Operation::Move {
                source,
                how_many,
                target,
                ..
            } => {
                let source_parent = tree.resolve_parent(source)?;
                let nodes = tree.remove_children(source_parent, source.offset(), *how_many);
                let adjusted = target
                    .get_transformed_by_deletion(source, *how_many)
                    .unwrap_or_else(|| target.clone());
                let target_parent = tree.resolve_parent(&adjusted)?;
                tree.insert_children(target_parent, adjusted.offset(), nodes);
                Ok(())
            }
            Operation::Rename {
                position, new_name, ..
            } => {
                let parent = tree.resolve_parent(position)?;
                let element = tree
                    .element_at(parent, position.offset())
                    .ok_or(ModelError::RenameWrongNameOrPosition)?;
                if let Some(node) = tree.node_mut(element) {
                    if let crate::node::NodeKind::Element { name, .. } = &mut node.kind {
                        *name = new_name.clone();
                    }
                }
                Ok(())
            }
            Operation::Split {
                split_position,
                how_many,
                insertion_position,
                graveyard_element_position,
                ..
            } => {
                let split_element = tree.resolve_parent(split_position)?;
                let shell = match graveyard_element_position {
                    Some(graveyard_position) => {
                        let gy_parent = tree.resolve_parent(graveyard_position)?;
                        let mut ids =
                            tree.remove_children(gy_parent, graveyard_position.offset(), 1);
                        ids.pop().ok_or(ModelError::PositionInvalid)?
                    }
                    None => {
                        let source = tree
                            .export(split_element)
                            .ok_or(ModelError::PositionInvalid)?;
                        let NodeData::Element {
                            name, attributes, ..
                        } = source
                        else {
                            return Err(ModelError::PositionInvalid);
                        };
                        tree.materialize(&NodeData::element_with_attrs(name, attributes, vec![]))
                    }
                };
                let insertion_parent = tree.resolve_parent(insertion_position)?;
                tree.insert_children(insertion_parent, insertion_position.offset(), vec![shell]);
                let moved = tree.remove_children(split_element, split_position.offset(), *how_many);
                tree.insert_children(shell, 0, moved);
                Ok(())
            }
            Operation::Merge {
                source_position,
                how_many,
                target_position,
                graveyard_position,
                ..
            } => {
                let merged = tree.resolve_parent(source_position)?;
                let moved = tree.remove_children(merged, source_position.offset(), *how_many);
                let target_parent = tree.resolve_parent(target_position)?;
                tree.insert_children(target_parent, target_position.offset(), moved);
                let deletion_position = merge_deletion_position(source_position);
                let deletion_parent = tree.resolve_parent(&deletion_position)?;
                let shell = tree.remove_children(deletion_parent, deletion_position.offset(), 1);
                let gy_parent = tree.resolve_parent(graveyard_position)?;
                tree.insert_children(gy_parent, graveyard_position.offset(), shell);
                Ok(())
            }
            Operation::Attribute {
                range,
                key,
                new_value,
                ..
            } => {
                let parent = tree.resolve_parent(&range.start)?;
                let (start, end) = (range.start.offset(), range.end.offset());
                tree.split_text_at(parent, start);
                tree.split_text_at(parent, end);
                for child in tree.children_overlapping(parent, start, end) {
                    if let Some(node) = tree.node_mut(child) {
                        match new_value {
                            Some(value) => {
                                node.attrs.insert(key.clone(), value.clone());
                            }
                            None => {
                                node.attrs.remove(key);
                            }
                        }
                    }
                }
                tree.normalize(parent);
                Ok(())
            }
            Operation::Marker {
                name,
                new_range,
                affects_data,
                ..
            } => {
                match new_range {
                    Some(range) => markers.set(
                        name.clone(),
                        Marker {
                            range: range.clone(),
                            affects_data: *affects_data,
                        },
                    ),
                    None => {
                        markers.remove(name);
                    }
                }
                Ok(())
            }
            Operation::Root {
                root_name, attach, ..
            } => {
                if *attach {
                    tree.create_root(root_name, true);
                    tree.set_root_attached(root_name, true);
                } else {
                    tree.set_root_attached(root_name, false);
                }
                Ok(())
            }
            Operation::RootAttribute {
                root_name,
                key,
                new_value,
                ..
            } => {
                let root = tree
                    .root(root_name)
                    .ok_or_else(|| ModelError::RootMissing(root_name.clone()))?
                    .node;
                if let Some(node) = tree.node_mut(root) {
                    match new_value {
                        Some(value) => {
                            node.attrs.insert(key.clone(), value.clone());
                        }
                        None => {
                            node.attrs.remove(key);
                        }
                    }
                }
                Ok(())
            }
            Operation::Detach {
                source, how_many, ..
            } => {
                let parent = tree.resolve_parent(source)?;
                let removed = tree.remove_children(parent, source.offset(), *how_many);
                for id in removed {
                    tree.drop_subtree(id);
                }
                Ok(())
            }
        }
    }

    /// The exact inverse operation at `base_version + 1`. Fails only for
    /// Detach, which permanently discards content.
    pub fn get_reversed(&self) -> Result<Operation, ModelError> {
        let base_version = self.base_version() + 1;
        match self {
            Operation::Insert {
                position, nodes, ..
            } => Ok(Operation::Move {
                base_version,
                source: position.clone(),
                how_many: total_offset_size(nodes),
                target: Position::new(GRAVEYARD_ROOT, vec![0]),
            }),
            Operation::Move {
                source,
                how_many,
                target,
                ..
            } => {
                let moved_start = target
                    .get_transformed_by_deletion(source, *how_many)
                    .unwrap_or_else(|| target.clone());
                let new_target = source.get_transformed_by_insertion(target, *how_many);
                Ok(Operation::Move {
                    base_version,
                    source: moved_start,
                    how_many: *how_many,
                    target: new_target,
                })
            }
            Operation::Rename {
                position,
                old_name,
                new_name,
                ..
            } => Ok(Operation::Rename {
                base_version,
                position: position.clone(),
                old_name: new_name.clone(),
                new_name: old_name.clone(),
            }),
            Operation::Split {
                split_position,
                how_many,
                insertion_position,
                ..
            } => {
                let mut source_path = insertion_position.path().to_vec();
                source_path.push(0);
                Ok(Operation::Merge {
                    base_version,
                    source_position: Position::new(insertion_position.root().to_owned(), source_path),
                    how_many: *how_many,
                    target_position: split_position.clone(),
                    graveyard_position: Position::new(GRAVEYARD_ROOT, vec![0]),
                })
            }
            Operation::Merge {
                source_position,
                how_many,
                target_position,
                graveyard_position,
                ..
            } => Ok(Operation::Split {
                base_version,
                split_position: target_position.clone(),
                how_many: *how_many,
                insertion_position: merge_deletion_position(source_position),
                graveyard_element_position: Some(graveyard_position.clone()),
            }),
            Operation::Attribute {
                range,
                key,
                old_value,
                new_value,
                ..
            } => Ok(Operation::Attribute {
                base_version,
                range: range.clone(),
                key: key.clone(),
                old_value: new_value.clone(),
                new_value: old_value.clone(),
            }),
            Operation::Marker {
                name,
                old_range,
                new_range,
                affects_data,
                ..
            } => Ok(Operation::Marker {
                base_version,
                name: name.clone(),
                old_range: new_range.clone(),
                new_range: old_range.clone(),
                affects_data: *affects_data,
            }),
            Operation::Root {
                root_name, attach, ..
            } => Ok(Operation::Root {
                base_version,
                root_name: root_name.clone(),
                attach: !attach,
            }),
            Operation::RootAttribute {
                root_name,
                key,
                old_value,
                new_value,
                ..
            } => Ok(Operation::RootAttribute {
                base_version,
                root_name: root_name.clone(),
                key: key.clone(),
                old_value: new_value.clone(),
                new_value: old_value.clone(),
            }),
            Operation::Detach { .. } => Err(ModelError::DetachNotReversible),
        }
    }
}
