//! Buffers the effect of applied operations and derives a minimal,
//! order-stable change set on demand.
//!
//! Every operation maps onto at most two primitive interval edits (insert or
//! remove of an offset span within one parent), plus attribute marks, marker
//! deltas and root deltas. Per parent the differ keeps a *before* snapshot
//! (one entry per offset unit; each text character is one synthetic entry)
//! and a unit tape aligning that snapshot with the current tree. The tape
//! keeps intervals non-overlapping by construction: an insert cancelled by a
//! later remove simply disappears, a remove point swallowed by a wider
//! remove merges into it, and attribute marks on removed or freshly inserted
//! units never survive to the output.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::marker::MarkerCollection;
use crate::node::{Attributes, NodeId, NodeKind, Tree, GRAVEYARD_ROOT, TEXT_NAME};
use crate::operation::Operation;
use crate::position::{merge_deletion_position, Position};
use crate::range::Range;

/// How a diff record came to be, beyond its raw type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffAction {
    Insert,
    Remove,
    Rename,
    Refresh,
}

/// Lifecycle label for elements touched during a batch. Upgrades are
/// monotonic: `Refresh < Rename < Move`, and a state never downgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ElementState {
    Refresh,
    Rename,
    Move,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDelta {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Name and attributes an element had before the batch, attached to insert
/// records produced by rename/refresh so consumers can reconvert.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBefore {
    pub name: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiffItem {
    Insert {
        position: Position,
        name: String,
        length: usize,
        attributes: Attributes,
        action: DiffAction,
        before: Option<ElementBefore>,
    },
    Remove {
        position: Position,
        name: String,
        length: usize,
        attributes: Attributes,
        action: DiffAction,
    },
    Attribute {
        range: Range,
        attributes: Vec<AttributeDelta>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangedMarker {
    pub name: String,
    pub old_range: Option<Range>,
    pub new_range: Option<Range>,
    pub affects_data: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangedRoot {
    pub name: String,
    /// `Some(final state)` when the attach flag flipped during the batch.
    pub attached: Option<bool>,
    pub attributes: Vec<AttributeDelta>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangesOptions {
    /// Also report records whose parent now lives in the graveyard.
    pub include_changes_in_graveyard: bool,
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    name: String,
    attributes: Attributes,
    /// Set for element units; text characters have no stable identity.
    node: Option<NodeId>,
}

#[derive(Debug, Clone, Copy)]
enum Origin {
    Before(usize),
    Inserted(u64),
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Live {
        origin: Origin,
        attr_count: Option<u64>,
    },
    /// Zero-width trace of a removed before-unit, anchored between live
    /// slots at the point where the removal happened.
    Ghost {
        before_index: usize,
        count: u64,
    },
}

impl Slot {
    fn is_live(&self) -> bool {
        matches!(self, Slot::Live { .. })
    }
}

#[derive(Debug, Clone)]
struct ParentChanges {
    snapshot: Vec<SnapshotEntry>,
    tape: Vec<Slot>,
}

impl ParentChanges {
    /// Tape index of the boundary after `offset` live units. With
    /// `after_ghosts`, skips ghost slots sitting at that boundary, so
    /// content inserted at a prior removal point lands after the ghosts.
    fn boundary(&self, offset: usize, after_ghosts: bool) -> usize {
        let mut live = 0;
        let mut i = 0;
        while i < self.tape.len() {
            if live == offset {
                if after_ghosts && !self.tape[i].is_live() {
                    i += 1;
                    continue;
                }
                return i;
            }
            if self.tape[i].is_live() {
                live += 1;
            }
            i += 1;
        }
        self.tape.len()
    }

    fn insert(&mut self, offset: usize, how_many: usize, count: u64) {
        let at = self.boundary(offset, true);
        self.tape.splice(
            at..at,
            (0..how_many).map(|_| Slot::Live {
                origin: Origin::Inserted(count),
                attr_count: None,
            }),
        );
    }

    fn remove(&mut self, offset: usize, how_many: usize, count: u64) {
        let mut i = self.boundary(offset, false);
        let mut taken = 0;
        while taken < how_many && i < self.tape.len() {
            match self.tape[i] {
                Slot::Ghost { .. } => i += 1,
                Slot::Live { origin, .. } => {
                    taken += 1;
                    match origin {
                        // Removing freshly inserted content cancels it.
                        Origin::Inserted(_) => {
                            self.tape.remove(i);
                        }
                        Origin::Before(before_index) => {
                            self.tape[i] = Slot::Ghost {
                                before_index,
                                count,
                            };
                            i += 1;
                        }
                    }
                }
            }
        }
    }

    fn mark_attributes(&mut self, offset: usize, how_many: usize, count: u64) {
        let mut i = self.boundary(offset, true);
        let mut taken = 0;
        while taken < how_many && i < self.tape.len() {
            if let Slot::Live { origin, attr_count } = &mut self.tape[i] {
                taken += 1;
                // Inserted units report their final attributes with the
                // insert record; only before-units need a mark.
                if matches!(origin, Origin::Before(_)) && attr_count.is_none() {
                    *attr_count = Some(count);
                }
            }
            i += 1;
        }
    }

    fn is_trivial(&self) -> bool {
        self.tape.iter().all(|slot| {
            matches!(
                slot,
                Slot::Live {
                    origin: Origin::Before(_),
                    attr_count: None,
                }
            )
        })
    }
}

#[derive(Debug, Clone, Default)]
struct MarkerDelta {
    old_range: Option<Range>,
    new_range: Option<Range>,
    affects_data: bool,
    touched: bool,
}

#[derive(Debug, Clone, Default)]
struct RootDelta {
    before_attached: Option<bool>,
    after_attached: Option<bool>,
    attributes: BTreeMap<String, (Option<Value>, Option<Value>)>,
}

#[derive(Debug, Default)]
pub struct Differ {
    parents: HashMap<NodeId, ParentChanges>,
    element_state: HashMap<NodeId, ElementState>,
    markers: BTreeMap<String, MarkerDelta>,
    roots: BTreeMap<String, RootDelta>,
    change_count: u64,
    cached: Option<Vec<DiffItem>>,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing observable was buffered since the last `reset`.
    pub fn is_empty(&self) -> bool {
        self.parents.values().all(ParentChanges::is_trivial)
            && !self.markers.values().any(|d| d.touched)
            && self.roots.values().all(|d| {
                d.before_attached == d.after_attached
                    && d.attributes.values().all(|(old, new)| old == new)
            })
    }

    /// True when the batch changed document data: tree changes, or marker
    /// changes with `affects_data`, or root changes.
    pub fn has_data_changes(&self) -> bool {
        !self.parents.values().all(ParentChanges::is_trivial)
            || self.markers.values().any(|d| d.touched && d.affects_data)
            || !self.roots.is_empty()
    }

    pub fn reset(&mut self) {
        self.parents.clear();
        self.element_state.clear();
        self.markers.clear();
        self.roots.clear();
        self.change_count = 0;
        self.cached = None;
    }

    /// Buffers one operation's effect. Must be called with the tree state
    /// the operation is about to execute on.
    pub fn buffer_operation(
        &mut self,
        tree: &Tree,
        markers: &MarkerCollection,
        op: &Operation,
    ) {
        self.cached = None;
        match op {
            Operation::Insert {
                position, nodes, ..
            } => {
                if let Ok(parent) = tree.resolve_parent(position) {
                    self.mark_insert(
                        tree,
                        parent,
                        position.offset(),
                        crate::node::total_offset_size(nodes),
                    );
                }
            }
            Operation::Move {
                source,
                how_many,
                target,
                ..
            } => {
                let Ok(source_parent) = tree.resolve_parent(source) else {
                    return;
                };
                for child in tree.children_overlapping(
                    source_parent,
                    source.offset(),
                    source.offset() + how_many,
                ) {
                    if tree.node(child).is_some_and(|n| n.is_element()) {
                        self.upgrade_state(child, ElementState::Move);
                    }
                }
                self.mark_remove(tree, source_parent, source.offset(), *how_many);
                let adjusted = target
                    .get_transformed_by_deletion(source, *how_many)
                    .unwrap_or_else(|| target.clone());
                if let Ok(target_parent) = tree.resolve_parent(&adjusted) {
                    self.mark_insert(tree, target_parent, adjusted.offset(), *how_many);
                }
            }
            Operation::Rename { position, .. } => {
                let Ok(parent) = tree.resolve_parent(position) else {
                    return;
                };
                if let Some(element) = tree.element_at(parent, position.offset()) {
                    self.upgrade_state(element, ElementState::Rename);
                }
                self.mark_remove(tree, parent, position.offset(), 1);
                self.mark_insert(tree, parent, position.offset(), 1);
                self.refresh_intersecting_markers(
                    markers,
                    &Range::from_position_and_shift(position.clone(), 1),
                );
            }
            Operation::Split {
                split_position,
                how_many,
                insertion_position,
                graveyard_element_position,
                ..
            } => {
                let Ok(split_element) = tree.resolve_parent(split_position) else {
                    return;
                };
                self.upgrade_state(split_element, ElementState::Move);
                self.mark_remove(tree, split_element, split_position.offset(), *how_many);
                if let Some(graveyard_position) = graveyard_element_position {
                    if let Ok(gy_parent) = tree.resolve_parent(graveyard_position) {
                        self.mark_remove(tree, gy_parent, graveyard_position.offset(), 1);
                    }
                }
                if let Ok(insertion_parent) = tree.resolve_parent(insertion_position) {
                    self.mark_insert(tree, insertion_parent, insertion_position.offset(), 1);
                }
                self.refresh_intersecting_markers(
                    markers,
                    &Range::from_position_and_shift(split_position.clone(), *how_many),
                );
            }
            Operation::Merge {
                source_position,
                how_many,
                target_position,
                graveyard_position,
                ..
            } => {
                let deletion_position = merge_deletion_position(source_position);
                if let Ok(merged) = tree.resolve_parent(source_position) {
                    self.upgrade_state(merged, ElementState::Move);
                }
                if let Ok(deletion_parent) = tree.resolve_parent(&deletion_position) {
                    self.mark_remove(tree, deletion_parent, deletion_position.offset(), 1);
                }
                if let Ok(target_parent) = tree.resolve_parent(target_position) {
                    self.mark_insert(tree, target_parent, target_position.offset(), *how_many);
                }
                if let Ok(gy_parent) = tree.resolve_parent(graveyard_position) {
                    self.mark_insert(tree, gy_parent, graveyard_position.offset(), 1);
                }
                self.refresh_intersecting_markers(
                    markers,
                    &Range::from_position_and_shift(deletion_position, 1),
                );
            }
            Operation::Attribute { range, .. } => {
                if let Ok(parent) = tree.resolve_parent(&range.start) {
                    let how_many = range.end.offset().saturating_sub(range.start.offset());
                    self.mark_attribute(tree, parent, range.start.offset(), how_many);
                }
            }
            Operation::Marker {
                name,
                old_range,
                new_range,
                affects_data,
                ..
            } => {
                self.buffer_marker_change(
                    name.clone(),
                    old_range.clone(),
                    new_range.clone(),
                    *affects_data,
                );
            }
            Operation::Root {
                root_name, attach, ..
            } => {
                let before = tree.root(root_name).is_some_and(|r| r.attached);
                let delta = self.roots.entry(root_name.clone()).or_default();
                delta.before_attached.get_or_insert(before);
                delta.after_attached = Some(*attach);
            }
            Operation::RootAttribute {
                root_name,
                key,
                old_value,
                new_value,
                ..
            } => {
                let delta = self.roots.entry(root_name.clone()).or_default();
                let entry = delta
                    .attributes
                    .entry(key.clone())
                    .or_insert_with(|| (old_value.clone(), None));
                entry.1 = new_value.clone();
            }
            Operation::Detach {
                source, how_many, ..
            } => {
                if let Ok(parent) = tree.resolve_parent(source) {
                    self.mark_remove(tree, parent, source.offset(), *how_many);
                }
            }
        }
    }

    /// Re-queues an element as removed-then-inserted with the `refresh`
    /// action, so consumers reconvert it wholesale.
    pub fn refresh_item(
        &mut self,
        tree: &Tree,
        markers: &MarkerCollection,
        position: &Position,
    ) {
        self.cached = None;
        let Ok(parent) = tree.resolve_parent(position) else {
            return;
        };
        if let Some(element) = tree.element_at(parent, position.offset()) {
            self.upgrade_state(element, ElementState::Refresh);
        }
        self.mark_remove(tree, parent, position.offset(), 1);
        self.mark_insert(tree, parent, position.offset(), 1);
        self.refresh_intersecting_markers(
            markers,
            &Range::from_position_and_shift(position.clone(), 1),
        );
    }

    pub fn buffer_marker_change(
        &mut self,
        name: String,
        old_range: Option<Range>,
        new_range: Option<Range>,
        affects_data: bool,
    ) {
        self.cached = None;
        let delta = self.markers.entry(name).or_default();
        if !delta.touched {
            delta.old_range = old_range;
            delta.touched = true;
        }
        delta.new_range = new_range;
        delta.affects_data = delta.affects_data || affects_data;
    }

    pub fn get_changed_markers(&self) -> Vec<ChangedMarker> {
        self.markers
            .iter()
            .filter(|(_, d)| d.touched && !(d.old_range.is_none() && d.new_range.is_none()))
            .map(|(name, d)| ChangedMarker {
                name: name.clone(),
                old_range: d.old_range.clone(),
                new_range: d.new_range.clone(),
                affects_data: d.affects_data,
            })
            .collect()
    }

    pub fn get_markers_to_remove(&self) -> Vec<(String, Range)> {
        self.get_changed_markers()
            .into_iter()
            .filter_map(|m| m.old_range.map(|r| (m.name, r)))
            .collect()
    }

    pub fn get_markers_to_add(&self) -> Vec<(String, Range)> {
        self.get_changed_markers()
            .into_iter()
            .filter_map(|m| m.new_range.map(|r| (m.name, r)))
            .collect()
    }

    pub fn get_changed_roots(&self) -> Vec<ChangedRoot> {
        self.roots
            .iter()
            .filter_map(|(name, delta)| {
                let attached = match (delta.before_attached, delta.after_attached) {
                    (Some(before), Some(after)) if before != after => Some(after),
                    _ => None,
                };
                let attributes: Vec<AttributeDelta> = delta
                    .attributes
                    .iter()
                    .filter(|(_, (old, new))| old != new)
                    .map(|(key, (old, new))| AttributeDelta {
                        key: key.clone(),
                        old_value: old.clone(),
                        new_value: new.clone(),
                    })
                    .collect();
                (attached.is_some() || !attributes.is_empty()).then(|| ChangedRoot {
                    name: name.clone(),
                    attached,
                    attributes,
                })
            })
            .collect()
    }

    /// Computes the ordered, glued change set. Results for the default
    /// options are memoized until the next buffered operation.
    pub fn get_changes(&mut self, tree: &Tree, options: ChangesOptions) -> Vec<DiffItem> {
        if !options.include_changes_in_graveyard {
            if let Some(cached) = &self.cached {
                return cached.clone();
            }
        }
        let mut keyed: Vec<(String, Vec<usize>, u64, DiffItem)> = Vec::new();
        for (&parent_id, changes) in &self.parents {
            let Some((root, parent_path)) = tree.path_of(parent_id) else {
                // Parent permanently detached; nothing to report.
                continue;
            };
            if root == GRAVEYARD_ROOT && !options.include_changes_in_graveyard {
                continue;
            }
            self.walk_parent(tree, parent_id, changes, &root, &parent_path, &mut keyed);
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        let items: Vec<DiffItem> = keyed.into_iter().map(|(_, _, _, item)| item).collect();
        if !options.include_changes_in_graveyard {
            self.cached = Some(items.clone());
        }
        items
    }

    fn walk_parent(
        &self,
        tree: &Tree,
        parent_id: NodeId,
        changes: &ParentChanges,
        root: &str,
        parent_path: &[usize],
        out: &mut Vec<(String, Vec<usize>, u64, DiffItem)>,
    ) {
        let position_at = |offset: usize| {
            let mut path = parent_path.to_vec();
            path.push(offset);
            Position::new(root.to_owned(), path)
        };
        let mut offset = 0;
        let mut i = 0;
        let tape = &changes.tape;
        while i < tape.len() {
            match tape[i] {
                Slot::Ghost { before_index, count } => {
                    // Glue a run of removed units with equal name/attributes.
                    let entry = &changes.snapshot[before_index];
                    let mut length = 1;
                    let mut min_count = count;
                    let action = self.removed_action(entry);
                    while let Some(Slot::Ghost {
                        before_index: next_index,
                        count: next_count,
                    }) = tape.get(i + length)
                    {
                        let next = &changes.snapshot[*next_index];
                        if entry.name != TEXT_NAME
                            || next.name != TEXT_NAME
                            || next.attributes != entry.attributes
                        {
                            break;
                        }
                        min_count = min_count.min(*next_count);
                        length += 1;
                    }
                    out.push((
                        root.to_owned(),
                        position_at(offset).path().to_vec(),
                        min_count,
                        DiffItem::Remove {
                            position: position_at(offset),
                            name: entry.name.clone(),
                            length: if entry.name == TEXT_NAME { length } else { 1 },
                            attributes: entry.attributes.clone(),
                            action,
                        },
                    ));
                    i += if entry.name == TEXT_NAME { length } else { 1 };
                }
                Slot::Live {
                    origin: Origin::Inserted(count),
                    ..
                } => {
                    let Some((node, _)) = tree.item_at(parent_id, offset) else {
                        i += 1;
                        offset += 1;
                        continue;
                    };
                    let node_ref = tree.node(node).expect("tape tracks live children");
                    match &node_ref.kind {
                        NodeKind::Text { .. } => {
                            // Glue adjacent inserted characters sharing text
                            // attributes into one record.
                            let attrs = node_ref.attrs.clone();
                            let mut length = 1;
                            while let Some(Slot::Live {
                                origin: Origin::Inserted(_),
                                ..
                            }) = tape.get(i + length)
                            {
                                match tree.item_at(parent_id, offset + length) {
                                    Some((next, _))
                                        if tree.node(next).is_some_and(|n| {
                                            !n.is_element() && n.attrs == attrs
                                        }) =>
                                    {
                                        length += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((
                                root.to_owned(),
                                position_at(offset).path().to_vec(),
                                count,
                                DiffItem::Insert {
                                    position: position_at(offset),
                                    name: TEXT_NAME.to_owned(),
                                    length,
                                    attributes: attrs,
                                    action: DiffAction::Insert,
                                    before: None,
                                },
                            ));
                            i += length;
                            offset += length;
                        }
                        NodeKind::Element { name, .. } => {
                            let (action, before) = self.inserted_action(changes, node);
                            out.push((
                                root.to_owned(),
                                position_at(offset).path().to_vec(),
                                count,
                                DiffItem::Insert {
                                    position: position_at(offset),
                                    name: name.clone(),
                                    length: 1,
                                    attributes: node_ref.attrs.clone(),
                                    action,
                                    before,
                                },
                            ));
                            i += 1;
                            offset += 1;
                        }
                    }
                }
                Slot::Live {
                    origin: Origin::Before(before_index),
                    attr_count,
                } => {
                    let Some(count) = attr_count else {
                        i += 1;
                        offset += 1;
                        continue;
                    };
                    // Chunk marked units by identical change signature.
                    let signature = self.attribute_signature(tree, parent_id, changes, offset, before_index);
                    let mut length = 1;
                    let mut min_count = count;
                    while let Some(Slot::Live {
                        origin: Origin::Before(next_index),
                        attr_count: Some(next_count),
                    }) = tape.get(i + length)
                    {
                        let next_signature = self.attribute_signature(
                            tree,
                            parent_id,
                            changes,
                            offset + length,
                            *next_index,
                        );
                        if next_signature != signature {
                            break;
                        }
                        min_count = min_count.min(*next_count);
                        length += 1;
                    }
                    if !signature.is_empty() {
                        let range = Range::new(position_at(offset), position_at(offset + length));
                        out.push((
                            root.to_owned(),
                            position_at(offset).path().to_vec(),
                            min_count,
                            DiffItem::Attribute {
                                range,
                                attributes: signature,
                            },
                        ));
                    }
                    i += length;
                    offset += length;
                }
            }
        }
    }

    /// Per-unit attribute change signature: the keys whose values differ
    /// between the snapshot and the current tree, with both values.
    fn attribute_signature(
        &self,
        tree: &Tree,
        parent_id: NodeId,
        changes: &ParentChanges,
        offset: usize,
        before_index: usize,
    ) -> Vec<AttributeDelta> {
        let old = &changes.snapshot[before_index].attributes;
        let new = tree
            .item_at(parent_id, offset)
            .and_then(|(node, _)| tree.node(node))
            .map(|n| n.attrs.clone())
            .unwrap_or_default();
        let mut keys: Vec<&String> = old.keys().collect();
        for key in new.keys() {
            if !old.contains_key(key) {
                keys.push(key);
            }
        }
        keys.sort();
        keys.into_iter()
            .filter(|key| old.get(*key) != new.get(*key))
            .map(|key| AttributeDelta {
                key: key.clone(),
                old_value: old.get(key).cloned(),
                new_value: new.get(key).cloned(),
            })
            .collect()
    }

    fn removed_action(&self, entry: &SnapshotEntry) -> DiffAction {
        match entry.node.and_then(|id| self.element_state.get(&id)) {
            Some(ElementState::Rename) => DiffAction::Rename,
            Some(ElementState::Refresh) => DiffAction::Refresh,
            _ => DiffAction::Remove,
        }
    }

    fn inserted_action(
        &self,
        changes: &ParentChanges,
        node: NodeId,
    ) -> (DiffAction, Option<ElementBefore>) {
        let before = changes
            .snapshot
            .iter()
            .find(|entry| entry.node == Some(node))
            .map(|entry| ElementBefore {
                name: entry.name.clone(),
                attributes: entry.attributes.clone(),
            });
        // An element with no snapshot entry appeared during this batch, so
        // whatever happened to it afterwards is still just an insert.
        match (self.element_state.get(&node), &before) {
            (Some(ElementState::Rename), Some(_)) => (DiffAction::Rename, before),
            (Some(ElementState::Refresh), Some(_)) => (DiffAction::Refresh, before),
            _ => (DiffAction::Insert, None),
        }
    }

    fn upgrade_state(&mut self, element: NodeId, state: ElementState) {
        let entry = self.element_state.entry(element).or_insert(state);
        *entry = (*entry).max(state);
    }

    fn refresh_intersecting_markers(&mut self, markers: &MarkerCollection, range: &Range) {
        let hits: Vec<(String, Range, bool)> = markers
            .intersecting_range(range)
            .map(|(name, marker)| (name.clone(), marker.range.clone(), marker.affects_data))
            .collect();
        for (name, marker_range, affects_data) in hits {
            self.buffer_marker_change(
                name,
                Some(marker_range.clone()),
                Some(marker_range),
                affects_data,
            );
        }
    }

    fn ensure_parent(&mut self, tree: &Tree, parent: NodeId) -> &mut ParentChanges {
        self.parents.entry(parent).or_insert_with(|| {
            let mut snapshot = Vec::new();
            for &child in tree.children(parent) {
                let node = tree.node(child).expect("child ids are live");
                match &node.kind {
                    NodeKind::Element { name, .. } => snapshot.push(SnapshotEntry {
                        name: name.clone(),
                        attributes: node.attrs.clone(),
                        node: Some(child),
                    }),
                    NodeKind::Text { data } => {
                        for _ in data.chars() {
                            snapshot.push(SnapshotEntry {
                                name: TEXT_NAME.to_owned(),
                                attributes: node.attrs.clone(),
                                node: None,
                            });
                        }
                    }
                }
            }
            let tape = (0..snapshot.len())
                .map(|index| Slot::Live {
                    origin: Origin::Before(index),
                    attr_count: None,
                })
                .collect();
            ParentChanges { snapshot, tape }
        })
    }

    fn mark_insert(&mut self, tree: &Tree, parent: NodeId, offset: usize, how_many: usize) {
        if how_many == 0 {
            return;
        }
        let count = self.next_count();
        self.ensure_parent(tree, parent).insert(offset, how_many, count);
    }

    fn mark_remove(&mut self, tree: &Tree, parent: NodeId, offset: usize, how_many: usize) {
        if how_many == 0 {
            return;
        }
        let count = self.next_count();
        self.ensure_parent(tree, parent).remove(offset, how_many, count);
    }

    fn mark_attribute(&mut self, tree: &Tree, parent: NodeId, offset: usize, how_many: usize) {
        if how_many == 0 {
            return;
        }
        let count = self.next_count();
        self.ensure_parent(tree, parent)
            .mark_attributes(offset, how_many, count);
    }

    fn next_count(&mut self) -> u64 {
        let count = self.change_count;
        self.change_count += 1;
        count
    }
}
