//! Range set algebra, containment modes and transformation.

use doctree_core::{NodeData, Operation, Position, Range, Tree};

fn p(path: &[usize]) -> Position {
    Position::new("main", path.to_vec())
}

fn r(start: &[usize], end: &[usize]) -> Range {
    Range::new(p(start), p(end))
}

fn two_paragraph_tree() -> Tree {
    let mut tree = Tree::new();
    let root = tree.create_root("main", true);
    let p0 = tree.materialize(&NodeData::element("paragraph", vec![NodeData::text("foo")]));
    let p1 = tree.materialize(&NodeData::element("paragraph", vec![NodeData::text("bar")]));
    tree.insert_children(root, 0, vec![p0, p1]);
    tree
}

#[test]
fn containment_strict_and_loose() {
    let outer = r(&[1], &[5]);
    assert!(outer.contains_position(&p(&[3])));
    assert!(!outer.contains_position(&p(&[1])));
    assert!(outer.contains_position(&p(&[2, 0])));

    let touching = r(&[1], &[3]);
    assert!(!outer.contains_range(&touching, false));
    assert!(outer.contains_range(&touching, true));
    // Collapsed ranges are always checked strictly.
    let collapsed = Range::collapsed(p(&[1]));
    assert!(!outer.contains_range(&collapsed, true));
    assert!(outer.contains_range(&Range::collapsed(p(&[2])), true));
}

#[test]
fn difference_covers_everything_intersection_does_not() {
    let a = r(&[0], &[6]);
    let b = r(&[4], &[9]);
    assert_eq!(a.get_difference(&b), vec![r(&[0], &[4])]);
    assert_eq!(a.get_intersection(&b), Some(r(&[4], &[6])));
    // Contained subtrahend splits in two.
    let inner = r(&[2], &[3]);
    assert_eq!(a.get_difference(&inner), vec![r(&[0], &[2]), r(&[3], &[6])]);
    // Swallowed range has an empty difference.
    assert_eq!(inner.get_difference(&a), Vec::<Range>::new());
}

#[test]
fn minimal_flat_ranges_cover_a_cross_parent_range() {
    let tree = two_paragraph_tree();
    let range = Range::new(p(&[0, 1]), p(&[1, 2]));
    let flat = range.get_minimal_flat_ranges(&tree).unwrap();
    assert_eq!(flat, vec![r(&[0, 1], &[0, 3]), r(&[1, 0], &[1, 2])]);
    for piece in &flat {
        assert!(piece.is_flat());
        assert!(!piece.is_collapsed());
    }
}

#[test]
fn minimal_flat_ranges_of_a_flat_range_is_itself() {
    let tree = two_paragraph_tree();
    let range = r(&[0, 0], &[0, 2]);
    assert_eq!(range.get_minimal_flat_ranges(&tree).unwrap(), vec![range]);
}

#[test]
fn move_tears_a_range_into_pieces() {
    // Four siblings; range covers children 0..2, child 1 moves after child 2.
    let range = r(&[0], &[2]);
    let pieces = range.get_transformed_by_move(&p(&[1]), &p(&[3]), 1, false);
    assert_eq!(pieces, vec![r(&[0], &[1]), r(&[2], &[3])]);
}

#[test]
fn move_of_unrelated_content_shifts_the_range() {
    let range = r(&[1], &[3]);
    let pieces = range.get_transformed_by_move(&p(&[0]), &p(&[4]), 1, false);
    assert_eq!(pieces, vec![r(&[0], &[2])]);
}

#[test]
fn deletion_of_one_boundary_snaps_to_the_deletion_point() {
    let range = r(&[2], &[6]);
    let transformed = range.get_transformed_by_deletion(&p(&[4]), 4).unwrap();
    assert_eq!(transformed, r(&[2], &[4]));
    assert_eq!(range.get_transformed_by_deletion(&p(&[1]), 8), None);
}

#[test]
fn split_keeps_the_new_element_inside_a_wrapping_range() {
    let op = Operation::Split {
        base_version: 0,
        split_position: p(&[0, 1]),
        how_many: 2,
        insertion_position: p(&[1]),
        graveyard_element_position: None,
    };
    let wrapping = r(&[0], &[1]);
    let pieces = wrapping.get_transformed_by_operation(&op, false);
    assert_eq!(pieces, vec![r(&[0], &[2])]);
}

#[test]
fn from_ranges_rejoins_pieces_in_document_order() {
    let joined = Range::from_ranges(vec![r(&[4], &[6]), r(&[1], &[2])]).unwrap();
    assert_eq!(joined, r(&[1], &[6]));
    assert_eq!(Range::from_ranges(vec![]), None);
}
