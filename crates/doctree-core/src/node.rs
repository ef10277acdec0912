//! Arena-backed document tree.
//!
//! Nodes live in a flat map keyed by [`NodeId`]; parent/child links are ids,
//! never references, so ancestor walks are O(depth) without reference cycles.
//! Child lists are addressed in *offset space*: an element child occupies one
//! offset unit, a text child occupies one unit per character. All structural
//! mutation goes through [`Tree::insert_children`] / [`Tree::remove_children`],
//! which split text nodes at offset boundaries and re-merge equal-attribute
//! neighbours afterwards.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::position::Position;

/// Name of the conventional deletion root. Moving content here is a logical
/// remove; moving content out of here is a reinsert.
pub const GRAVEYARD_ROOT: &str = "$graveyard";

/// Synthetic node name used for text content in diff records and snapshots.
pub const TEXT_NAME: &str = "$text";

/// Attribute map attached to every node. `serde_json` with `preserve_order`
/// keeps insertion order stable for serialization round-trips.
pub type Attributes = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub attrs: Attributes,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element { name: String, children: Vec<NodeId> },
    Text { data: String },
}

impl Node {
    /// Number of offset units this node occupies in its parent.
    pub fn offset_size(&self) -> usize {
        match &self.kind {
            NodeKind::Element { .. } => 1,
            NodeKind::Text { data } => data.chars().count(),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text { .. } => None,
        }
    }
}

/// A detached subtree, used as the payload of insert operations and as the
/// JSON-able export format.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element {
        name: String,
        attributes: Attributes,
        children: Vec<NodeData>,
    },
    Text {
        data: String,
        attributes: Attributes,
    },
}

impl NodeData {
    pub fn element(name: impl Into<String>, children: Vec<NodeData>) -> Self {
        NodeData::Element {
            name: name.into(),
            attributes: Attributes::new(),
            children,
        }
    }

    pub fn element_with_attrs(
        name: impl Into<String>,
        attributes: Attributes,
        children: Vec<NodeData>,
    ) -> Self {
        NodeData::Element {
            name: name.into(),
            attributes,
            children,
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        NodeData::Text {
            data: data.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn text_with_attrs(data: impl Into<String>, attributes: Attributes) -> Self {
        NodeData::Text {
            data: data.into(),
            attributes,
        }
    }

    pub fn offset_size(&self) -> usize {
        match self {
            NodeData::Element { .. } => 1,
            NodeData::Text { data, .. } => data.chars().count(),
        }
    }
}

/// Total offset size of a sequence of detached nodes.
pub fn total_offset_size(nodes: &[NodeData]) -> usize {
    nodes.iter().map(NodeData::offset_size).sum()
}

#[derive(Debug, Clone)]
pub struct Root {
    pub node: NodeId,
    pub attached: bool,
}

/// Where an offset falls within a child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spot {
    /// Index of the child the offset falls in (or `children.len()` when the
    /// offset equals the parent's max offset).
    pub index: usize,
    /// Offset inside that child; zero on a node boundary.
    pub within: usize,
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    roots: BTreeMap<String, Root>,
    next_id: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates an empty tree with the `$graveyard` root already in place.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: HashMap::new(),
            roots: BTreeMap::new(),
            next_id: 0,
        };
        tree.create_root(GRAVEYARD_ROOT, false);
        tree
    }

    pub fn create_root(&mut self, name: &str, attached: bool) -> NodeId {
        if let Some(root) = self.roots.get(name) {
            return root.node;
        }
        let id = self.alloc(
            NodeKind::Element {
                name: name.to_owned(),
                children: Vec::new(),
            },
            Attributes::new(),
            None,
        );
        self.roots.insert(name.to_owned(), Root { node: id, attached });
        id
    }

    pub fn root(&self, name: &str) -> Option<&Root> {
        self.roots.get(name)
    }

    pub fn root_id(&self, name: &str) -> Option<NodeId> {
        self.roots.get(name).map(|r| r.node)
    }

    pub fn roots(&self) -> impl Iterator<Item = (&String, &Root)> {
        self.roots.iter()
    }

    pub fn set_root_attached(&mut self, name: &str, attached: bool) {
        if let Some(root) = self.roots.get_mut(name) {
            root.attached = attached;
        }
    }

    fn alloc(&mut self, kind: NodeKind, attrs: Attributes, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node { kind, attrs, parent });
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    fn expect_node(&self, id: NodeId) -> &Node {
        self.nodes.get(&id).expect("arena id must be live")
    }

    pub fn children(&self, el: NodeId) -> &[NodeId] {
        match &self.expect_node(el).kind {
            NodeKind::Element { children, .. } => children,
            NodeKind::Text { .. } => &[],
        }
    }

    fn children_mut(&mut self, el: NodeId) -> &mut Vec<NodeId> {
        match &mut self.nodes.get_mut(&el).expect("arena id must be live").kind {
            NodeKind::Element { children, .. } => children,
            NodeKind::Text { .. } => panic!("text node has no children"),
        }
    }

    pub fn max_offset(&self, el: NodeId) -> usize {
        self.children(el)
            .iter()
            .map(|&c| self.expect_node(c).offset_size())
            .sum()
    }

    /// Locates `offset` in `el`'s child list. `None` when out of bounds.
    pub fn locate(&self, el: NodeId, offset: usize) -> Option<Spot> {
        let children = self.children(el);
        let mut start = 0;
        for (index, &child) in children.iter().enumerate() {
            let size = self.expect_node(child).offset_size();
            if offset < start + size {
                return Some(Spot {
                    index,
                    within: offset - start,
                });
            }
            start += size;
        }
        (offset == start).then_some(Spot {
            index: children.len(),
            within: 0,
        })
    }

    /// The child item covering `offset`, with the offset inside it.
    pub fn item_at(&self, el: NodeId, offset: usize) -> Option<(NodeId, usize)> {
        let spot = self.locate(el, offset)?;
        let children = self.children(el);
        (spot.index < children.len()).then(|| (children[spot.index], spot.within))
    }

    /// The element child starting exactly at `offset`, if any.
    pub fn element_at(&self, el: NodeId, offset: usize) -> Option<NodeId> {
        let (child, within) = self.item_at(el, offset)?;
        (within == 0 && self.expect_node(child).is_element()).then_some(child)
    }

    /// Offset of `child` within `parent`'s child list.
    pub fn offset_of_child(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        let mut start = 0;
        for &c in self.children(parent) {
            if c == child {
                return Some(start);
            }
            start += self.expect_node(c).offset_size();
        }
        None
    }

    /// Root name and path of the position *before* `id`. `None` when `id` is
    /// not reachable from any root (e.g. already dropped or free-floating).
    pub fn path_of(&self, id: NodeId) -> Option<(String, Vec<usize>)> {
        let mut path = Vec::new();
        let mut cur = id;
        loop {
            match self.node(cur)?.parent {
                Some(parent) => {
                    path.push(self.offset_of_child(parent, cur)?);
                    cur = parent;
                }
                None => {
                    let (name, _) = self.roots.iter().find(|(_, r)| r.node == cur)?;
                    path.reverse();
                    return Some((name.clone(), path));
                }
            }
        }
    }

    /// Resolves the element that contains `pos`'s offset, checking every
    /// intermediate path step lands on an element boundary.
    pub fn resolve_parent(&self, pos: &Position) -> Result<NodeId, ModelError> {
        let root = self
            .root_id(pos.root())
            .ok_or(ModelError::PositionInvalid)?;
        if pos.path().is_empty() {
            return Err(ModelError::PositionInvalid);
        }
        let mut cur = root;
        for &step in &pos.path()[..pos.path().len() - 1] {
            cur = self
                .element_at(cur, step)
                .ok_or(ModelError::PositionInvalid)?;
        }
        if pos.offset() > self.max_offset(cur) {
            return Err(ModelError::PositionInvalid);
        }
        Ok(cur)
    }

    /// Builds arena nodes for a detached subtree. The produced root node has
    /// no parent until it is inserted somewhere.
    pub fn materialize(&mut self, data: &NodeData) -> NodeId {
        match data {
            NodeData::Element {
                name,
                attributes,
                children,
            } => {
                let id = self.alloc(
                    NodeKind::Element {
                        name: name.clone(),
                        children: Vec::new(),
                    },
                    attributes.clone(),
                    None,
                );
                for child in children {
                    let child_id = self.materialize(child);
                    self.nodes
                        .get_mut(&child_id)
                        .expect("freshly materialized child")
                        .parent = Some(id);
                    self.children_mut(id).push(child_id);
                }
                id
            }
            NodeData::Text { data, attributes } => self.alloc(
                NodeKind::Text { data: data.clone() },
                attributes.clone(),
                None,
            ),
        }
    }

    /// Exports a subtree as detached node data.
    pub fn export(&self, id: NodeId) -> Option<NodeData> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Element { name, children } => {
                let mut exported = Vec::with_capacity(children.len());
                for &child in children {
                    exported.push(self.export(child)?);
                }
                Some(NodeData::Element {
                    name: name.clone(),
                    attributes: node.attrs.clone(),
                    children: exported,
                })
            }
            NodeKind::Text { data } => Some(NodeData::Text {
                data: data.clone(),
                attributes: node.attrs.clone(),
            }),
        }
    }

    /// Splits the text node covering `offset`, so that `offset` becomes a node
    /// boundary. No-op when it already is one.
    pub fn split_text_at(&mut self, el: NodeId, offset: usize) {
        let Some(spot) = self.locate(el, offset) else {
            return;
        };
        if spot.within == 0 {
            return;
        }
        let child = self.children(el)[spot.index];
        let (tail_data, attrs, parent) = {
            let node = self.expect_node(child);
            let NodeKind::Text { data } = &node.kind else {
                return;
            };
            let byte = data
                .char_indices()
                .nth(spot.within)
                .map(|(b, _)| b)
                .unwrap_or(data.len());
            (data[byte..].to_owned(), node.attrs.clone(), node.parent)
        };
        let tail = self.alloc(NodeKind::Text { data: tail_data }, attrs, parent);
        if let NodeKind::Text { data } = &mut self
            .nodes
            .get_mut(&child)
            .expect("arena id must be live")
            .kind
        {
            let byte = data
                .char_indices()
                .nth(spot.within)
                .map(|(b, _)| b)
                .unwrap_or(data.len());
            data.truncate(byte);
        }
        self.children_mut(el).insert(spot.index + 1, tail);
    }

    /// Merges adjacent text children with identical attributes and drops
    /// empty text children.
    pub(crate) fn normalize(&mut self, el: NodeId) {
        let children = self.children(el).to_vec();
        let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            let is_empty_text = matches!(
                &self.expect_node(child).kind,
                NodeKind::Text { data } if data.is_empty()
            );
            if is_empty_text {
                self.nodes.remove(&child);
                continue;
            }
            if let Some(&prev) = merged.last() {
                let joinable = {
                    let a = self.expect_node(prev);
                    let b = self.expect_node(child);
                    matches!(&a.kind, NodeKind::Text { .. })
                        && matches!(&b.kind, NodeKind::Text { .. })
                        && a.attrs == b.attrs
                };
                if joinable {
                    let tail = match &self.expect_node(child).kind {
                        NodeKind::Text { data } => data.clone(),
                        NodeKind::Element { .. } => unreachable!(),
                    };
                    if let NodeKind::Text { data } = &mut self
                        .nodes
                        .get_mut(&prev)
                        .expect("arena id must be live")
                        .kind
                    {
                        data.push_str(&tail);
                    }
                    self.nodes.remove(&child);
                    continue;
                }
            }
            merged.push(child);
        }
        *self.children_mut(el) = merged;
    }

    /// Inserts detached nodes into `el` at `offset`.
    pub fn insert_children(&mut self, el: NodeId, offset: usize, ids: Vec<NodeId>) {
        self.split_text_at(el, offset);
        let index = self
            .locate(el, offset)
            .map(|s| s.index)
            .unwrap_or_else(|| self.children(el).len());
        for (k, &id) in ids.iter().enumerate() {
            self.nodes
                .get_mut(&id)
                .expect("inserted node must be live")
                .parent = Some(el);
            self.children_mut(el).insert(index + k, id);
        }
        self.normalize(el);
    }

    /// Detaches `how_many` offset units starting at `offset` from `el`,
    /// splitting boundary text nodes first. Returned nodes keep their
    /// subtrees but have no parent.
    pub fn remove_children(&mut self, el: NodeId, offset: usize, how_many: usize) -> Vec<NodeId> {
        if how_many == 0 {
            return Vec::new();
        }
        self.split_text_at(el, offset);
        self.split_text_at(el, offset + how_many);
        let start = self
            .locate(el, offset)
            .map(|s| s.index)
            .unwrap_or_else(|| self.children(el).len());
        let mut taken = 0;
        let mut end = start;
        while taken < how_many && end < self.children(el).len() {
            taken += self.expect_node(self.children(el)[end]).offset_size();
            end += 1;
        }
        debug_assert_eq!(taken, how_many, "removal extent must land on boundaries");
        let removed: Vec<NodeId> = self.children_mut(el).drain(start..end).collect();
        for &id in &removed {
            self.nodes.get_mut(&id).expect("removed node is live").parent = None;
        }
        self.normalize(el);
        removed
    }

    /// Drops a detached subtree from the arena for good.
    pub fn drop_subtree(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if let NodeKind::Element { children, .. } = node.kind {
            for child in children {
                self.drop_subtree(child);
            }
        }
    }

    /// Children of `el` overlapping the offset span `[start, end)`, without
    /// mutating the tree. Used by pure validation passes.
    pub fn children_overlapping(
        &self,
        el: NodeId,
        start: usize,
        end: usize,
    ) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut at = 0;
        for &child in self.children(el) {
            let size = self.expect_node(child).offset_size();
            if at < end && at + size > start {
                out.push(child);
            }
            at += size;
            if at >= end {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_offsets_count_characters() {
        let mut tree = Tree::new();
        let root = tree.create_root("main", true);
        let text = tree.materialize(&NodeData::text("f∞o"));
        tree.insert_children(root, 0, vec![text]);
        assert_eq!(tree.max_offset(root), 3);
    }

    #[test]
    fn split_and_normalize_round_trip() {
        let mut tree = Tree::new();
        let root = tree.create_root("main", true);
        let text = tree.materialize(&NodeData::text("abcd"));
        tree.insert_children(root, 0, vec![text]);
        let removed = tree.remove_children(root, 1, 2);
        assert_eq!(removed.len(), 1);
        assert_eq!(tree.max_offset(root), 2);
        // "a" and "d" merged back into a single text node.
        assert_eq!(tree.children(root).len(), 1);
        tree.insert_children(root, 1, removed);
        assert_eq!(
            tree.export(tree.children(root)[0]),
            Some(NodeData::text("abcd"))
        );
    }
}
