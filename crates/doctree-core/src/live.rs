//! Live addresses that follow document changes.
//!
//! A tracked position or range is updated after every applied operation by
//! the same transform primitives user code has, so a tracked address always
//! means "the same place in the document", not "the same path".

use std::collections::BTreeMap;

use crate::node::GRAVEYARD_ROOT;
use crate::operation::Operation;
use crate::position::Position;
use crate::range::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LivePositionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LiveRangeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Passed to change listeners together with the updated address.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveChangeEvent {
    /// Set when the tracked content was deleted (moved to the graveyard or
    /// detached): the point in the document where it used to be.
    pub deletion_position: Option<Position>,
}

type PositionListener = Box<dyn FnMut(&Position, &LiveChangeEvent) + Send + Sync>;
type RangeListener = Box<dyn FnMut(&Range, &LiveChangeEvent) + Send + Sync>;

struct LivePositionEntry {
    position: Position,
    listeners: BTreeMap<u64, PositionListener>,
}

struct LiveRangeEntry {
    range: Range,
    listeners: BTreeMap<u64, RangeListener>,
}

/// Registry of tracked positions and ranges, transformed in bulk after each
/// operation. Entries stay registered until explicitly untracked.
#[derive(Default)]
pub struct LiveRegistry {
    positions: BTreeMap<u64, LivePositionEntry>,
    ranges: BTreeMap<u64, LiveRangeEntry>,
    next_id: u64,
}

impl std::fmt::Debug for LiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveRegistry")
            .field("positions", &self.positions.len())
            .field("ranges", &self.ranges.len())
            .finish()
    }
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn track_position(&mut self, position: Position) -> LivePositionId {
        let id = self.bump();
        self.positions.insert(
            id,
            LivePositionEntry {
                position,
                listeners: BTreeMap::new(),
            },
        );
        LivePositionId(id)
    }

    pub fn track_range(&mut self, range: Range) -> LiveRangeId {
        let id = self.bump();
        self.ranges.insert(
            id,
            LiveRangeEntry {
                range,
                listeners: BTreeMap::new(),
            },
        );
        LiveRangeId(id)
    }

    pub fn position(&self, id: LivePositionId) -> Option<&Position> {
        self.positions.get(&id.0).map(|entry| &entry.position)
    }

    pub fn range(&self, id: LiveRangeId) -> Option<&Range> {
        self.ranges.get(&id.0).map(|entry| &entry.range)
    }

    pub fn untrack_position(&mut self, id: LivePositionId) -> Option<Position> {
        self.positions.remove(&id.0).map(|entry| entry.position)
    }

    pub fn untrack_range(&mut self, id: LiveRangeId) -> Option<Range> {
        self.ranges.remove(&id.0).map(|entry| entry.range)
    }

    /// Registers a listener fired whenever the tracked position actually
    /// changes. Returns `None` for an unknown id.
    pub fn on_position_change(
        &mut self,
        id: LivePositionId,
        listener: impl FnMut(&Position, &LiveChangeEvent) + Send + Sync + 'static,
    ) -> Option<ListenerId> {
        let listener_id = self.bump();
        let entry = self.positions.get_mut(&id.0)?;
        entry.listeners.insert(listener_id, Box::new(listener));
        Some(ListenerId(listener_id))
    }

    pub fn on_range_change(
        &mut self,
        id: LiveRangeId,
        listener: impl FnMut(&Range, &LiveChangeEvent) + Send + Sync + 'static,
    ) -> Option<ListenerId> {
        let listener_id = self.bump();
        let entry = self.ranges.get_mut(&id.0)?;
        entry.listeners.insert(listener_id, Box::new(listener));
        Some(ListenerId(listener_id))
    }

    pub fn off_position_change(&mut self, id: LivePositionId, listener: ListenerId) -> bool {
        self.positions
            .get_mut(&id.0)
            .map(|entry| entry.listeners.remove(&listener.0).is_some())
            .unwrap_or(false)
    }

    pub fn off_range_change(&mut self, id: LiveRangeId, listener: ListenerId) -> bool {
        self.ranges
            .get_mut(&id.0)
            .map(|entry| entry.listeners.remove(&listener.0).is_some())
            .unwrap_or(false)
    }

    /// Transforms every tracked address by an applied operation and fires
    /// listeners for the addresses that moved.
    pub fn transform_all(&mut self, op: &Operation) {
        for entry in self.positions.values_mut() {
            let transformed = entry.position.get_transformed_by_operation(op);
            if transformed == entry.position {
                continue;
            }
            let event = LiveChangeEvent {
                deletion_position: deletion_point(op, &entry.position),
            };
            entry.position = transformed;
            for listener in entry.listeners.values_mut() {
                listener(&entry.position, &event);
            }
        }
        for entry in self.ranges.values_mut() {
            let pieces = entry.range.get_transformed_by_operation(op, false);
            let transformed =
                Range::from_ranges(pieces).unwrap_or_else(|| entry.range.clone());
            if transformed.is_equal(&entry.range) {
                continue;
            }
            let event = LiveChangeEvent {
                deletion_position: deletion_point(op, &entry.range.start),
            };
            entry.range = transformed;
            for listener in entry.listeners.values_mut() {
                listener(&entry.range, &event);
            }
        }
    }
}

/// Where deleted content used to sit, when `op` removed the span holding
/// `position` from attached content.
fn deletion_point(op: &Operation, position: &Position) -> Option<Position> {
    let (source, how_many, gone) = match op {
        Operation::Move {
            source,
            how_many,
            target,
            ..
        } => (source, *how_many, target.root() == GRAVEYARD_ROOT),
        Operation::Detach {
            source, how_many, ..
        } => (source, *how_many, true),
        _ => return None,
    };
    if !gone || position.is_in_graveyard() {
        return None;
    }
    position
        .get_transformed_by_deletion(source, how_many)
        .is_none()
        .then(|| source.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::node::NodeData;

    #[test]
    fn tracked_position_follows_insertions() {
        let mut live = LiveRegistry::new();
        let id = live.track_position(Position::new("main", vec![4]));
        live.transform_all(&Operation::Insert {
            base_version: 0,
            position: Position::new("main", vec![1]),
            nodes: vec![NodeData::text("ab")],
        });
        assert_eq!(live.position(id).unwrap().offset(), 6);
    }

    #[test]
    fn listener_fires_only_on_actual_change() {
        let mut live = LiveRegistry::new();
        let id = live.track_position(Position::new("main", vec![1]));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        live.on_position_change(id, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        // Insertion after the position: no change, no event.
        live.transform_all(&Operation::Insert {
            base_version: 0,
            position: Position::new("main", vec![5]),
            nodes: vec![NodeData::text("x")],
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        live.transform_all(&Operation::Insert {
            base_version: 1,
            position: Position::new("main", vec![0]),
            nodes: vec![NodeData::text("x")],
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(live.position(id).unwrap().offset(), 2);
    }

    #[test]
    fn move_to_graveyard_reports_deletion_point() {
        let mut live = LiveRegistry::new();
        let id = live.track_position(Position::new("main", vec![3]));
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = seen.clone();
        live.on_position_change(id, move |_, event| {
            *sink.lock().unwrap() = event.deletion_position.clone();
        })
        .unwrap();
        live.transform_all(&Operation::Move {
            base_version: 0,
            source: Position::new("main", vec![2]),
            how_many: 3,
            target: Position::new(GRAVEYARD_ROOT, vec![0]),
        });
        let deletion = seen.lock().unwrap().clone();
        assert_eq!(deletion, Some(Position::new("main", vec![2])));
    }
}
