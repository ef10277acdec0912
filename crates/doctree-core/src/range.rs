//! Ordered position pairs and their set algebra.

use crate::error::ModelError;
use crate::node::{total_offset_size, Tree};
use crate::operation::Operation;
use crate::position::{Position, Stickiness};

/// A span between two positions in one root, `start <= end` in document
/// order. Collapsed iff the boundaries are equal; flat iff both boundaries
/// share the same immediate parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert_eq!(start.root(), end.root(), "range boundaries share a root");
        debug_assert!(!start.is_after(&end), "range start must not be after end");
        Range { start, end }
    }

    pub fn collapsed(at: Position) -> Self {
        Range {
            end: at.clone(),
            start: at,
        }
    }

    /// Range starting at `start` and spanning `how_many` offset units in the
    /// same parent.
    pub fn from_position_and_shift(start: Position, how_many: usize) -> Self {
        let end = start.get_shifted_by(how_many as isize);
        Range { start, end }
    }

    pub fn root(&self) -> &str {
        self.start.root()
    }

    pub fn is_collapsed(&self) -> bool {
        self.start.is_equal(&self.end)
    }

    pub fn is_flat(&self) -> bool {
        self.start.parent_path() == self.end.parent_path()
    }

    pub fn is_equal(&self, other: &Range) -> bool {
        self.start.is_equal(&other.start) && self.end.is_equal(&other.end)
    }

    /// Strict containment: the position is inside the range, boundaries
    /// excluded.
    pub fn contains_position(&self, position: &Position) -> bool {
        position.is_after(&self.start) && position.is_before(&self.end)
    }

    /// Containment of a whole range. `loose` lets boundaries coincide;
    /// collapsed inner ranges are always checked strictly.
    pub fn contains_range(&self, other: &Range, loose: bool) -> bool {
        let loose = loose && !other.is_collapsed();
        let contains_start =
            self.contains_position(&other.start) || (loose && self.start.is_equal(&other.start));
        let contains_end =
            self.contains_position(&other.end) || (loose && self.end.is_equal(&other.end));
        contains_start && contains_end
    }

    pub fn is_intersecting(&self, other: &Range) -> bool {
        self.get_intersection(other).is_some()
    }

    /// The parts of this range not covered by `other`: zero, one or two
    /// ranges, in document order.
    pub fn get_difference(&self, other: &Range) -> Vec<Range> {
        if self.root() != other.root()
            || !other.start.is_before(&self.end)
            || !other.end.is_after(&self.start)
        {
            return vec![self.clone()];
        }
        let mut pieces = Vec::new();
        if self.start.is_before(&other.start) {
            pieces.push(Range::new(self.start.clone(), other.start.clone()));
        }
        if self.end.is_after(&other.end) {
            pieces.push(Range::new(other.end.clone(), self.end.clone()));
        }
        pieces
    }

    /// The common part of two ranges, if any.
    pub fn get_intersection(&self, other: &Range) -> Option<Range> {
        if self.root() != other.root() {
            return None;
        }
        let start = if self.start.is_after(&other.start) {
            &self.start
        } else {
            &other.start
        };
        let end = if self.end.is_before(&other.end) {
            &self.end
        } else {
            &other.end
        };
        start
            .is_before(end)
            .then(|| Range::new(start.clone(), end.clone()))
    }

    /// Joins contiguous pieces back into one range spanning from the first
    /// piece's start to the last piece's end. Pieces must share a root.
    pub fn from_ranges(mut pieces: Vec<Range>) -> Option<Range> {
        pieces.sort_by(|a, b| a.start.path().cmp(b.start.path()));
        let first = pieces.first()?.start.clone();
        let last = pieces.last()?.end.clone();
        Some(Range::new(first, last))
    }

    /// The minimal set of flat ranges that jointly cover exactly this range:
    /// walk up from `start` to the depth where the boundary paths diverge,
    /// then down to `end`, emitting a non-empty flat sub-range per level.
    pub fn get_minimal_flat_ranges(&self, tree: &Tree) -> Result<Vec<Range>, ModelError> {
        let mut ranges = Vec::new();
        let diff_at = self.start.common_path_length(&self.end);
        let mut pos = self.start.clone().with_stickiness(Stickiness::ToNone);
        // Climb from the start boundary.
        while pos.path().len() > diff_at + 1 {
            let parent = tree.resolve_parent(&pos)?;
            let how_many = tree.max_offset(parent) - pos.offset();
            if how_many != 0 {
                ranges.push(Range::from_position_and_shift(pos.clone(), how_many));
            }
            let mut path = pos.path().to_vec();
            path.pop();
            *path.last_mut().expect("climb stays below the root") += 1;
            pos = Position::new(pos.root().to_owned(), path);
        }
        // Descend towards the end boundary.
        while pos.path().len() <= self.end.path().len() {
            let offset = self.end.path()[pos.path().len() - 1];
            let how_many = offset - pos.offset();
            if how_many != 0 {
                ranges.push(Range::from_position_and_shift(pos.clone(), how_many));
            }
            let mut path = pos.path().to_vec();
            *path.last_mut().expect("position path is non-empty") = offset;
            path.push(0);
            pos = Position::new(pos.root().to_owned(), path);
        }
        Ok(ranges)
    }

    fn boundary_with(&self, position: &Position, stickiness: Stickiness) -> Position {
        let forced = if self.is_collapsed() {
            position.stickiness
        } else {
            stickiness
        };
        position.clone().with_stickiness(forced)
    }

    /// Transforms by an insertion. Non-collapsed ranges "hug" their content:
    /// content inserted exactly at a boundary stays outside. With `spread`,
    /// an insertion strictly inside yields two pieces around the new content.
    pub fn get_transformed_by_insertion(
        &self,
        insertion: &Position,
        how_many: usize,
        spread: bool,
    ) -> Vec<Range> {
        if spread && self.contains_position(insertion) {
            return vec![
                Range::new(self.start.clone(), insertion.clone()),
                Range::new(
                    insertion.get_shifted_by(how_many as isize),
                    self.boundary_with(&self.end, Stickiness::ToPrevious)
                        .get_transformed_by_insertion(insertion, how_many),
                ),
            ];
        }
        let start = self
            .boundary_with(&self.start, Stickiness::ToNext)
            .get_transformed_by_insertion(insertion, how_many);
        let end = self
            .boundary_with(&self.end, Stickiness::ToPrevious)
            .get_transformed_by_insertion(insertion, how_many);
        vec![Range::new(start, end)]
    }

    /// Transforms by a deletion. `None` when the whole range was inside the
    /// deleted span; a boundary inside the span snaps to the deletion point.
    pub fn get_transformed_by_deletion(
        &self,
        deletion: &Position,
        how_many: usize,
    ) -> Option<Range> {
        let start = self.start.get_transformed_by_deletion(deletion, how_many);
        let end = self.end.get_transformed_by_deletion(deletion, how_many);
        if start.is_none() && end.is_none() {
            return None;
        }
        let start = start.unwrap_or_else(|| deletion.clone().with_stickiness(self.start.stickiness));
        let end = end.unwrap_or_else(|| deletion.clone().with_stickiness(self.end.stickiness));
        Some(Range::new(start, end))
    }

    /// Transforms by a move: up to three pieces — the part before the moved
    /// span, the moved/common part (re-mapped to the target), and the part
    /// after — derived from the difference/intersection set algebra.
    pub fn get_transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
        spread: bool,
    ) -> Vec<Range> {
        if self.is_collapsed() {
            let at = self.start.get_transformed_by_move(source, target, how_many);
            return vec![Range::collapsed(at)];
        }
        let move_range = Range::from_position_and_shift(source.clone(), how_many);
        let insert_position = target
            .get_transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());
        let common = self.get_intersection(&move_range).map(|common| {
            Range::new(
                common.start.get_combined(source, &insert_position),
                common.end.get_combined(source, &insert_position),
            )
        });
        let mut result = Vec::new();
        let mut common = common;
        for piece in self.get_difference(&move_range) {
            // Emit the moved part between the two difference pieces.
            if piece.start.compare_with(source) == crate::position::PositionRelation::After
                || piece.start.is_equal(source)
            {
                if let Some(c) = common.take() {
                    result.push(c);
                }
            }
            if let Some(deleted) = piece.get_transformed_by_deletion(source, how_many) {
                result.extend(deleted.get_transformed_by_insertion(
                    &insert_position,
                    how_many,
                    spread,
                ));
            }
        }
        if let Some(c) = common {
            result.push(c);
        }
        result
    }

    /// Transforms by a whole applied operation. Returns one or more pieces;
    /// more than one only for moves (and spreads) that tear the range apart.
    pub fn get_transformed_by_operation(&self, op: &Operation, spread: bool) -> Vec<Range> {
        match op {
            Operation::Insert {
                position, nodes, ..
            } => self.get_transformed_by_insertion(position, total_offset_size(nodes), spread),
            Operation::Move {
                source,
                how_many,
                target,
                ..
            } => self.get_transformed_by_move(source, target, *how_many, spread),
            Operation::Split { .. } | Operation::Merge { .. } | Operation::Detach { .. } => {
                let start = self.start.get_transformed_by_operation(op);
                let mut end = self.end.get_transformed_by_operation(op);
                if let Operation::Split {
                    insertion_position, ..
                } = op
                {
                    // A range ending right after the split element keeps the
                    // new element inside it.
                    if self.end.is_equal(insertion_position) {
                        end = self.end.get_shifted_by(1);
                    }
                }
                if start.root() != end.root() || end.is_before(&start) {
                    return vec![Range::collapsed(start)];
                }
                vec![Range::new(start, end)]
            }
            Operation::Rename { .. }
            | Operation::Attribute { .. }
            | Operation::Marker { .. }
            | Operation::Root { .. }
            | Operation::RootAttribute { .. } => vec![self.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn r(start: &[usize], end: &[usize]) -> Range {
        Range::new(p(start), p(end))
    }

    #[test]
    fn difference_and_intersection_partition() {
        let a = r(&[2], &[8]);
        let b = r(&[4], &[6]);
        let diff = a.get_difference(&b);
        assert_eq!(diff, vec![r(&[2], &[4]), r(&[6], &[8])]);
        assert_eq!(a.get_intersection(&b), Some(r(&[4], &[6])));
    }

    #[test]
    fn disjoint_difference_is_identity() {
        let a = r(&[2], &[4]);
        let b = r(&[6], &[9]);
        assert_eq!(a.get_difference(&b), vec![a.clone()]);
        assert_eq!(a.get_intersection(&b), None);
    }

    #[test]
    fn insertion_inside_with_spread_splits() {
        let range = r(&[2], &[6]);
        let pieces = range.get_transformed_by_insertion(&p(&[4]), 2, true);
        assert_eq!(pieces, vec![r(&[2], &[4]), r(&[6], &[8])]);
    }

    #[test]
    fn insertion_at_boundary_hugs_content() {
        let range = r(&[2], &[6]);
        let at_start = range.get_transformed_by_insertion(&p(&[2]), 3, false);
        assert_eq!(at_start, vec![r(&[5], &[9])]);
        let at_end = range.get_transformed_by_insertion(&p(&[6]), 3, false);
        assert_eq!(at_end, vec![r(&[2], &[6])]);
    }
}
