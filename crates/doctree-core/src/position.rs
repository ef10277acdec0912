//! Tree addresses.
//!
//! A [`Position`] is a root name plus a path of offsets; the last path entry
//! is the offset inside its parent element. Positions are value-like and get
//! transformed, never mutated in place, by the primitives below. All
//! transform primitives are pure path math and need no tree handle.

use crate::node::GRAVEYARD_ROOT;
use crate::operation::Operation;

/// Which side of an insertion or deletion point a position binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stickiness {
    /// Stay put at an exact insertion point.
    #[default]
    ToNone,
    /// Bind to the content before the point.
    ToPrevious,
    /// Bind to the content after the point; gets pushed past insertions.
    ToNext,
}

/// Document-order relation between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRelation {
    Before,
    Same,
    After,
    /// Positions in different roots are not comparable.
    Different,
}

/// Relation of path `a` to path `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathRelation {
    Same,
    /// `a` is a proper prefix of `b`.
    Prefix,
    Other,
}

pub(crate) fn path_relation(a: &[usize], b: &[usize]) -> PathRelation {
    if a.len() > b.len() || a != &b[..a.len()] {
        return PathRelation::Other;
    }
    if a.len() == b.len() {
        PathRelation::Same
    } else {
        PathRelation::Prefix
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    root: String,
    path: Vec<usize>,
    pub stickiness: Stickiness,
}

impl Position {
    /// Creates a position. The path must be non-empty; the last entry is the
    /// offset inside the parent addressed by the preceding entries.
    pub fn new(root: impl Into<String>, path: Vec<usize>) -> Self {
        debug_assert!(!path.is_empty(), "position path must be non-empty");
        Position {
            root: root.into(),
            path,
            stickiness: Stickiness::ToNone,
        }
    }

    pub fn with_stickiness(mut self, stickiness: Stickiness) -> Self {
        self.stickiness = stickiness;
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn offset(&self) -> usize {
        *self.path.last().expect("position path is non-empty")
    }

    pub(crate) fn offset_mut(&mut self) -> &mut usize {
        self.path.last_mut().expect("position path is non-empty")
    }

    /// Path of the parent element holding this position's offset.
    pub fn parent_path(&self) -> &[usize] {
        &self.path[..self.path.len() - 1]
    }

    pub fn is_in_graveyard(&self) -> bool {
        self.root == GRAVEYARD_ROOT
    }

    /// Same address, shifted by `shift` offset units (clamped at zero).
    pub fn get_shifted_by(&self, shift: isize) -> Position {
        let mut shifted = self.clone();
        let offset = self.offset() as isize + shift;
        *shifted.offset_mut() = offset.max(0) as usize;
        shifted
    }

    /// Length of the common path prefix with `other`.
    pub fn common_path_length(&self, other: &Position) -> usize {
        self.path
            .iter()
            .zip(other.path.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    pub fn compare_with(&self, other: &Position) -> PositionRelation {
        if self.root != other.root {
            return PositionRelation::Different;
        }
        match self.path.cmp(&other.path) {
            std::cmp::Ordering::Less => PositionRelation::Before,
            std::cmp::Ordering::Equal => PositionRelation::Same,
            std::cmp::Ordering::Greater => PositionRelation::After,
        }
    }

    pub fn is_equal(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::Same
    }

    pub fn is_before(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::Before
    }

    pub fn is_after(&self, other: &Position) -> bool {
        self.compare_with(other) == PositionRelation::After
    }

    /// Transforms this position by an insertion of `how_many` units at
    /// `insertion`. At the exact insertion point only `ToNext` positions are
    /// pushed past the new content.
    pub fn get_transformed_by_insertion(&self, insertion: &Position, how_many: usize) -> Position {
        let mut transformed = self.clone();
        if self.root != insertion.root {
            return transformed;
        }
        match path_relation(insertion.parent_path(), self.parent_path()) {
            PathRelation::Same => {
                if insertion.offset() < self.offset()
                    || (insertion.offset() == self.offset()
                        && self.stickiness == Stickiness::ToNext)
                {
                    *transformed.offset_mut() += how_many;
                }
            }
            PathRelation::Prefix => {
                // Insertion in an ancestor's parent: shift the ancestor step.
                let i = insertion.path.len() - 1;
                if insertion.offset() <= self.path[i] {
                    transformed.path[i] += how_many;
                }
            }
            PathRelation::Other => {}
        }
        transformed
    }

    /// Transforms this position by a deletion of `how_many` units at
    /// `deletion`. Returns `None` when the position (or one of its ancestors)
    /// was inside the deleted span — the caller substitutes the deletion
    /// point.
    pub fn get_transformed_by_deletion(
        &self,
        deletion: &Position,
        how_many: usize,
    ) -> Option<Position> {
        let mut transformed = self.clone();
        if self.root != deletion.root {
            return Some(transformed);
        }
        match path_relation(deletion.parent_path(), self.parent_path()) {
            PathRelation::Same => {
                if deletion.offset() < self.offset() {
                    if deletion.offset() + how_many > self.offset() {
                        return None;
                    }
                    *transformed.offset_mut() -= how_many;
                }
            }
            PathRelation::Prefix => {
                let i = deletion.path.len() - 1;
                if deletion.offset() <= self.path[i] {
                    if deletion.offset() + how_many > self.path[i] {
                        return None;
                    }
                    transformed.path[i] -= how_many;
                }
            }
            PathRelation::Other => {}
        }
        Some(transformed)
    }

    /// Transforms this position by a move of `how_many` units from `source`
    /// to `target`.
    pub fn get_transformed_by_move(
        &self,
        source: &Position,
        target: &Position,
        how_many: usize,
    ) -> Position {
        // Target in post-removal coordinates.
        let target = target
            .get_transformed_by_deletion(source, how_many)
            .unwrap_or_else(|| target.clone());
        if source.is_equal(&target) {
            return self.clone();
        }
        let transformed = self.get_transformed_by_deletion(source, how_many);
        let moved = transformed.is_none()
            || (self.stickiness == Stickiness::ToNext && self.is_equal(source))
            || (self.stickiness == Stickiness::ToPrevious
                && self.is_equal(&source.get_shifted_by(how_many as isize)));
        if moved {
            self.get_combined(source, &target)
        } else {
            let transformed = transformed.expect("position outside the moved span");
            transformed.get_transformed_by_insertion(&target, how_many)
        }
    }

    /// Re-maps a position inside a moved span: `source` is where the span
    /// was, `target` is where it landed. Interior coordinates are preserved.
    pub fn get_combined(&self, source: &Position, target: &Position) -> Position {
        let i = source.path.len() - 1;
        let mut combined = target.clone();
        combined.stickiness = self.stickiness;
        *combined.offset_mut() += self.path[i] - source.offset();
        let tail = self.path[i + 1..].to_vec();
        combined.path.extend(tail);
        combined
    }

    /// Transforms this position by a whole applied operation.
    pub fn get_transformed_by_operation(&self, op: &Operation) -> Position {
        match op {
            Operation::Insert {
                position, nodes, ..
            } => self.get_transformed_by_insertion(position, crate::node::total_offset_size(nodes)),
            Operation::Move {
                source,
                how_many,
                target,
                ..
            } => self.get_transformed_by_move(source, target, *how_many),
            Operation::Split {
                split_position,
                how_many,
                insertion_position,
                graveyard_element_position,
                ..
            } => self.get_transformed_by_split(
                split_position,
                *how_many,
                insertion_position,
                graveyard_element_position.as_ref(),
            ),
            Operation::Merge {
                source_position,
                how_many,
                target_position,
                graveyard_position,
                ..
            } => self.get_transformed_by_merge(
                source_position,
                *how_many,
                target_position,
                graveyard_position,
            ),
            Operation::Detach {
                source, how_many, ..
            } => self
                .get_transformed_by_deletion(source, *how_many)
                .unwrap_or_else(|| source.clone().with_stickiness(self.stickiness)),
            Operation::Rename { .. }
            | Operation::Attribute { .. }
            | Operation::Marker { .. }
            | Operation::Root { .. }
            | Operation::RootAttribute { .. } => self.clone(),
        }
    }

    fn get_transformed_by_split(
        &self,
        split_position: &Position,
        how_many: usize,
        insertion_position: &Position,
        graveyard_element_position: Option<&Position>,
    ) -> Position {
        let moved_end = split_position.get_shifted_by(how_many as isize);
        let in_moved = self.is_inside_span(split_position, &moved_end)
            || (self.is_equal(split_position) && self.stickiness == Stickiness::ToNext);
        if in_moved {
            // Landed inside the new element.
            let mut target = insertion_position.clone();
            target.path.push(0);
            self.get_combined(split_position, &target)
        } else if let Some(graveyard_position) = graveyard_element_position {
            self.get_transformed_by_move(graveyard_position, insertion_position, 1)
        } else {
            self.get_transformed_by_insertion(insertion_position, 1)
        }
    }

    fn get_transformed_by_merge(
        &self,
        source_position: &Position,
        how_many: usize,
        target_position: &Position,
        graveyard_position: &Position,
    ) -> Position {
        let moved_end = source_position.get_shifted_by(how_many as isize);
        let deletion_position = merge_deletion_position(source_position);
        if self.is_inside_span(source_position, &moved_end) || self.is_equal(source_position) {
            // The shell removal shifts the target when the merged element
            // precedes it.
            let target = target_position
                .get_transformed_by_deletion(&deletion_position, 1)
                .unwrap_or_else(|| target_position.clone());
            return self.get_combined(source_position, &target);
        }
        // The emptied source shell moves to the graveyard.
        self.get_transformed_by_move(&deletion_position, graveyard_position, 1)
    }

    /// True when the position sits strictly after `start` and not after
    /// `end`, including positions nested deeper inside the span.
    fn is_inside_span(&self, start: &Position, end: &Position) -> bool {
        self.is_after(start) && !self.is_after(end)
    }
}

/// Position of the merged element itself, derived from the merge operation's
/// source position (which points inside that element).
pub(crate) fn merge_deletion_position(source_position: &Position) -> Position {
    let path = source_position.parent_path().to_vec();
    Position::new(source_position.root().to_owned(), path)
}
