//! Property-based checks of the interval algebra: set-algebra partitioning,
//! transform identities, flat-range decomposition and diff gluing.

use std::collections::BTreeSet;

use proptest::prelude::*;

use doctree_core::{
    ChangesOptions, DiffItem, Document, NodeData, Operation, Position, Range, Stickiness, Tree,
    TEXT_NAME,
};

fn p(path: &[usize]) -> Position {
    Position::new("main", path.to_vec())
}

fn flat(start: usize, end: usize) -> Range {
    Range::new(p(&[start]), p(&[end]))
}

/// Offset units covered by a flat sibling range.
fn units(range: &Range) -> BTreeSet<usize> {
    (range.start.offset()..range.end.offset()).collect()
}

/// `[ <p>one</p>, <bq> <p>abc</p>, <p>de</p> </bq>, <p>xy</p> ]`
fn nested_tree() -> Tree {
    let mut tree = Tree::new();
    let root = tree.create_root("main", true);
    let one = tree.materialize(&NodeData::element("paragraph", vec![NodeData::text("one")]));
    let bq = tree.materialize(&NodeData::element(
        "blockQuote",
        vec![
            NodeData::element("paragraph", vec![NodeData::text("abc")]),
            NodeData::element("paragraph", vec![NodeData::text("de")]),
        ],
    ));
    let xy = tree.materialize(&NodeData::element("paragraph", vec![NodeData::text("xy")]));
    tree.insert_children(root, 0, vec![one, bq, xy]);
    tree
}

/// Every char/element boundary in the nested tree.
fn all_positions() -> Vec<Vec<usize>> {
    let mut out = vec![vec![0], vec![1], vec![2], vec![3]];
    for o in 0..=3 {
        out.push(vec![0, o]);
        out.push(vec![1, 0, o]);
    }
    for o in 0..=2 {
        out.push(vec![1, o]);
        out.push(vec![2, o]);
        out.push(vec![1, 1, o]);
    }
    out
}

proptest! {
    #[test]
    fn difference_and_intersection_partition(
        a in (0usize..12, 0usize..12),
        b in (0usize..12, 0usize..12),
    ) {
        let a = flat(a.0.min(a.1), a.0.max(a.1));
        let b = flat(b.0.min(b.1), b.0.max(b.1));
        let mut rebuilt = BTreeSet::new();
        for piece in a.get_difference(&b) {
            let piece_units = units(&piece);
            prop_assert!(rebuilt.is_disjoint(&piece_units));
            rebuilt.extend(piece_units);
        }
        if let Some(common) = a.get_intersection(&b) {
            let common_units = units(&common);
            prop_assert!(rebuilt.is_disjoint(&common_units));
            prop_assert!(common_units.is_subset(&units(&b)));
            rebuilt.extend(common_units);
        }
        prop_assert_eq!(rebuilt, units(&a));
    }

    #[test]
    fn insertion_then_deletion_is_identity(
        path in prop::collection::vec(0usize..8, 1..4),
        at in prop::collection::vec(0usize..8, 1..3),
        how_many in 1usize..5,
        sticky in prop::sample::select(vec![
            Stickiness::ToNone,
            Stickiness::ToPrevious,
            Stickiness::ToNext,
        ]),
    ) {
        let pos = Position::new("main", path).with_stickiness(sticky);
        let at = Position::new("main", at);
        let back = pos
            .get_transformed_by_insertion(&at, how_many)
            .get_transformed_by_deletion(&at, how_many);
        prop_assert_eq!(back, Some(pos));
    }

    #[test]
    fn minimal_flat_ranges_are_flat_ordered_and_bounded(
        i in 0usize..21,
        j in 0usize..21,
    ) {
        let positions = all_positions();
        let a = p(&positions[i]);
        let b = p(&positions[j]);
        let (start, end) = if a.is_after(&b) { (b, a) } else { (a, b) };
        let range = Range::new(start, end);
        let tree = nested_tree();
        let pieces = range.get_minimal_flat_ranges(&tree).unwrap();
        for piece in &pieces {
            prop_assert!(piece.is_flat());
            prop_assert!(!piece.is_collapsed());
            prop_assert!(!piece.start.is_before(&range.start));
            prop_assert!(!piece.end.is_after(&range.end));
        }
        for pair in pieces.windows(2) {
            prop_assert!(!pair[0].end.is_after(&pair[1].start));
        }
        if range.is_collapsed() {
            prop_assert!(pieces.is_empty());
        }
    }

    #[test]
    fn single_char_insertions_glue_into_one_record(n in 1usize..12) {
        let mut doc = Document::new();
        doc.create_root("main");
        doc.apply(&Operation::Insert {
            base_version: 0,
            position: p(&[0]),
            nodes: vec![NodeData::element("paragraph", vec![NodeData::text("a")])],
        }).unwrap();
        doc.reset_changes();
        for i in 0..n {
            doc.apply(&Operation::Insert {
                base_version: doc.version(),
                position: p(&[0, 1 + i]),
                nodes: vec![NodeData::text("x")],
            }).unwrap();
        }
        let changes = doc.get_changes(ChangesOptions::default());
        prop_assert_eq!(changes.len(), 1);
        match &changes[0] {
            DiffItem::Insert { position, name, length, .. } => {
                prop_assert_eq!(position.path(), &[0, 1]);
                prop_assert_eq!(name.as_str(), TEXT_NAME);
                prop_assert_eq!(*length, n);
            }
            other => prop_assert!(false, "expected an insert record, got {:?}", other),
        }
    }

    #[test]
    fn range_transform_by_insertion_never_inverts(
        (s, e) in (0usize..10, 0usize..10),
        at in 0usize..10,
        how_many in 1usize..4,
        spread in any::<bool>(),
    ) {
        let range = flat(s.min(e), s.max(e));
        let pieces = range.get_transformed_by_insertion(&p(&[at]), how_many, spread);
        for piece in pieces {
            prop_assert!(!piece.start.is_after(&piece.end));
        }
    }
}
