//! Named ranges tracked alongside the tree.

use std::collections::BTreeMap;

use crate::range::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub range: Range,
    /// Whether this marker is part of the document data (serialized and
    /// diffed as data) or editor-local decoration.
    pub affects_data: bool,
}

/// Markers keyed by name.
///
/// Stored ranges are plain values: applying tree operations does not
/// re-anchor them. A caller that wants a marker to follow content across
/// edits tracks its range in the live registry and issues a `Marker`
/// operation with the transformed range.
#[derive(Debug, Clone, Default)]
pub struct MarkerCollection {
    map: BTreeMap<String, Marker>,
}

impl MarkerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Marker> {
        self.map.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, marker: Marker) {
        self.map.insert(name.into(), marker);
    }

    pub fn remove(&mut self, name: &str) -> Option<Marker> {
        self.map.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Marker)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Markers whose range intersects `range` (shared items, not just
    /// touching boundaries).
    pub fn intersecting_range<'a>(
        &'a self,
        range: &'a Range,
    ) -> impl Iterator<Item = (&'a String, &'a Marker)> {
        self.map
            .iter()
            .filter(move |(_, marker)| marker.range.is_intersecting(range))
    }
}
