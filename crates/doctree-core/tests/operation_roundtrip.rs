//! Apply-then-undo round trips for every operation kind, plus validation
//! failures from the error taxonomy.

use serde_json::json;

use doctree_core::{
    Attributes, Document, ModelError, NodeData, Operation, Position, Range, GRAVEYARD_ROOT,
};

fn p(path: &[usize]) -> Position {
    Position::new("main", path.to_vec())
}

fn gy(path: &[usize]) -> Position {
    Position::new(GRAVEYARD_ROOT, path.to_vec())
}

/// `<paragraph>foo</paragraph><paragraph>bar</paragraph>` under root `main`.
fn fixture() -> Document {
    let mut doc = Document::new();
    doc.create_root("main");
    doc.apply(&Operation::Insert {
        base_version: 0,
        position: p(&[0]),
        nodes: vec![
            NodeData::element("paragraph", vec![NodeData::text("foo")]),
            NodeData::element("paragraph", vec![NodeData::text("bar")]),
        ],
    })
    .unwrap();
    doc.reset_changes();
    doc
}

fn assert_undo_restores(doc: &mut Document, op: Operation) {
    let before = doc.export_root("main").unwrap();
    doc.apply(&op).unwrap();
    let reversed = op.get_reversed().unwrap();
    assert_eq!(reversed.base_version(), op.base_version() + 1);
    doc.apply(&reversed).unwrap();
    assert_eq!(doc.export_root("main").unwrap(), before);
}

#[test]
fn insert_undo_removes_the_content() {
    let mut doc = fixture();
    assert_undo_restores(
        &mut doc,
        Operation::Insert {
            base_version: 1,
            position: p(&[0, 1]),
            nodes: vec![NodeData::text("xy"), NodeData::element("softBreak", vec![])],
        },
    );
}

#[test]
fn move_undo_returns_nodes_to_their_source() {
    let mut doc = fixture();
    assert_undo_restores(
        &mut doc,
        Operation::Move {
            base_version: 1,
            source: p(&[0]),
            how_many: 1,
            target: p(&[2]),
        },
    );
}

#[test]
fn remove_is_a_move_to_the_graveyard_and_undoes() {
    let mut doc = fixture();
    assert_undo_restores(
        &mut doc,
        Operation::Move {
            base_version: 1,
            source: p(&[1]),
            how_many: 1,
            target: gy(&[0]),
        },
    );
}

#[test]
fn rename_undo_restores_the_old_name() {
    let mut doc = fixture();
    assert_undo_restores(
        &mut doc,
        Operation::Rename {
            base_version: 1,
            position: p(&[1]),
            old_name: "paragraph".to_owned(),
            new_name: "listItem".to_owned(),
        },
    );
}

#[test]
fn split_reverses_into_a_merge() {
    let mut doc = fixture();
    let split = Operation::Split {
        base_version: 1,
        split_position: p(&[0, 1]),
        how_many: 2,
        insertion_position: p(&[1]),
        graveyard_element_position: None,
    };
    let before = doc.export_root("main").unwrap();
    doc.apply(&split).unwrap();
    // "foo" became "f" / "oo" in a cloned shell.
    let NodeData::Element { children, .. } = doc.export_root("main").unwrap() else {
        panic!("root is an element");
    };
    assert_eq!(children.len(), 3);
    assert_eq!(
        children[1],
        NodeData::element("paragraph", vec![NodeData::text("oo")])
    );
    let merge = split.get_reversed().unwrap();
    assert!(matches!(merge, Operation::Merge { .. }));
    doc.apply(&merge).unwrap();
    assert_eq!(doc.export_root("main").unwrap(), before);
}

#[test]
fn merge_reverses_into_a_split_pulling_the_shell_from_the_graveyard() {
    let mut doc = fixture();
    let merge = Operation::Merge {
        base_version: 1,
        source_position: p(&[1, 0]),
        how_many: 3,
        target_position: p(&[0, 3]),
        graveyard_position: gy(&[0]),
    };
    let before = doc.export_root("main").unwrap();
    doc.apply(&merge).unwrap();
    let NodeData::Element { children, .. } = doc.export_root("main").unwrap() else {
        panic!("root is an element");
    };
    assert_eq!(
        children,
        vec![NodeData::element("paragraph", vec![NodeData::text("foobar")])]
    );
    let split = merge.get_reversed().unwrap();
    assert!(matches!(
        split,
        Operation::Split {
            graveyard_element_position: Some(_),
            ..
        }
    ));
    doc.apply(&split).unwrap();
    assert_eq!(doc.export_root("main").unwrap(), before);
}

#[test]
fn attribute_undo_restores_old_values() {
    let mut doc = fixture();
    assert_undo_restores(
        &mut doc,
        Operation::Attribute {
            base_version: 1,
            range: Range::new(p(&[0, 1]), p(&[0, 3])),
            key: "bold".to_owned(),
            old_value: None,
            new_value: Some(json!(true)),
        },
    );
}

#[test]
fn marker_undo_removes_the_marker() {
    let mut doc = fixture();
    let add = Operation::Marker {
        base_version: 1,
        name: "comment:1".to_owned(),
        old_range: None,
        new_range: Some(Range::new(p(&[0, 0]), p(&[1, 3]))),
        affects_data: true,
    };
    doc.apply(&add).unwrap();
    assert!(doc.markers().get("comment:1").is_some());
    doc.apply(&add.get_reversed().unwrap()).unwrap();
    assert!(doc.markers().get("comment:1").is_none());
}

#[test]
fn root_and_root_attribute_undo() {
    let mut doc = fixture();
    let attach = Operation::Root {
        base_version: 1,
        root_name: "side".to_owned(),
        attach: true,
    };
    doc.apply(&attach).unwrap();
    assert!(doc.tree().root("side").unwrap().attached);
    let set = Operation::RootAttribute {
        base_version: 2,
        root_name: "side".to_owned(),
        key: "locale".to_owned(),
        old_value: None,
        new_value: Some(json!("en")),
    };
    doc.apply(&set).unwrap();
    doc.apply(&set.get_reversed().unwrap()).unwrap();
    doc.apply(&Operation::Root {
        base_version: 4,
        root_name: "side".to_owned(),
        attach: false,
    })
    .unwrap();
    assert!(!doc.tree().root("side").unwrap().attached);
}

#[test]
fn detach_is_not_reversible_and_needs_a_detached_root() {
    let mut doc = fixture();
    let on_attached = Operation::Detach {
        base_version: 1,
        source: p(&[0]),
        how_many: 1,
    };
    assert_eq!(doc.apply(&on_attached), Err(ModelError::DetachOnAttachedNode));
    // Park a paragraph in the graveyard, then discard it for good.
    doc.apply(&Operation::Move {
        base_version: 1,
        source: p(&[0]),
        how_many: 1,
        target: gy(&[0]),
    })
    .unwrap();
    let detach = Operation::Detach {
        base_version: 2,
        source: gy(&[0]),
        how_many: 1,
    };
    doc.apply(&detach).unwrap();
    assert_eq!(detach.get_reversed(), Err(ModelError::DetachNotReversible));
}

#[test]
fn double_reversal_is_the_original_modulo_base_version() {
    let op = Operation::Move {
        base_version: 5,
        source: p(&[0]),
        how_many: 1,
        target: p(&[2]),
    };
    let back = op.get_reversed().unwrap().get_reversed().unwrap();
    assert_eq!(
        back,
        Operation::Move {
            base_version: 7,
            source: p(&[0]),
            how_many: 1,
            target: p(&[2]),
        }
    );
}

#[test]
fn validation_rejects_malformed_operations() {
    let mut doc = fixture();
    assert_eq!(
        doc.apply(&Operation::Move {
            base_version: 1,
            source: p(&[0]),
            how_many: 2,
            target: p(&[0, 1]),
        }),
        Err(ModelError::MoveIntoSelf)
    );
    assert_eq!(
        doc.apply(&Operation::Rename {
            base_version: 1,
            position: p(&[1]),
            old_name: "heading".to_owned(),
            new_name: "listItem".to_owned(),
        }),
        Err(ModelError::RenameWrongNameOrPosition)
    );
    assert_eq!(
        doc.apply(&Operation::Attribute {
            base_version: 1,
            range: Range::new(p(&[0, 0]), p(&[1, 1])),
            key: "bold".to_owned(),
            old_value: None,
            new_value: Some(json!(true)),
        }),
        Err(ModelError::RangeNotFlat)
    );
    // Adding an attribute that is already present is rejected.
    doc.apply(&Operation::Attribute {
        base_version: 1,
        range: Range::new(p(&[0, 0]), p(&[0, 3])),
        key: "bold".to_owned(),
        old_value: None,
        new_value: Some(json!(true)),
    })
    .unwrap();
    assert_eq!(
        doc.apply(&Operation::Attribute {
            base_version: 2,
            range: Range::new(p(&[0, 0]), p(&[0, 3])),
            key: "bold".to_owned(),
            old_value: None,
            new_value: Some(json!(false)),
        }),
        Err(ModelError::AttributeValueMismatch("bold".to_owned()))
    );
    assert_eq!(
        doc.apply(&Operation::Marker {
            base_version: 2,
            name: "m".to_owned(),
            old_range: Some(Range::new(p(&[0, 0]), p(&[0, 1]))),
            new_range: None,
            affects_data: false,
        }),
        Err(ModelError::MarkerRangeMismatch("m".to_owned())),
    );
    assert_eq!(doc.version(), 2, "failed operations do not advance the version");
}

#[test]
fn merge_into_a_following_element_is_rejected() {
    // Removing the emptied shell would shift the target element, and the
    // reverse split could not re-extract the merged span; only merges into
    // preceding content are allowed.
    let mut doc = fixture();
    let before = doc.export_root("main").unwrap();
    assert_eq!(
        doc.apply(&Operation::Merge {
            base_version: 1,
            source_position: p(&[0, 0]),
            how_many: 3,
            target_position: p(&[1, 3]),
            graveyard_position: gy(&[0]),
        }),
        Err(ModelError::MergeTargetInvalid)
    );
    assert_eq!(doc.export_root("main").unwrap(), before);
    assert_eq!(doc.version(), 1);
}

#[test]
fn split_validation_checks_extent_and_insertion_point() {
    let mut doc = fixture();
    assert_eq!(
        doc.apply(&Operation::Split {
            base_version: 1,
            split_position: p(&[0, 1]),
            how_many: 1,
            insertion_position: p(&[1]),
            graveyard_element_position: None,
        }),
        Err(ModelError::SplitHowManyInvalid)
    );
    assert_eq!(
        doc.apply(&Operation::Split {
            base_version: 1,
            split_position: p(&[0, 1]),
            how_many: 2,
            insertion_position: p(&[2]),
            graveyard_element_position: None,
        }),
        Err(ModelError::SplitInsertionPositionInvalid)
    );
}

#[test]
fn insert_reversal_parks_content_in_the_graveyard() {
    let mut doc = fixture();
    let op = Operation::Insert {
        base_version: 1,
        position: p(&[2]),
        nodes: vec![NodeData::element("paragraph", vec![NodeData::text("baz")])],
    };
    doc.apply(&op).unwrap();
    doc.apply(&op.get_reversed().unwrap()).unwrap();
    let gy_root = doc.tree().root(GRAVEYARD_ROOT).unwrap().node;
    assert_eq!(doc.tree().max_offset(gy_root), 1);
}

#[test]
fn attribute_changes_split_and_remerge_text_runs() {
    let mut doc = fixture();
    let mut bold = Attributes::new();
    bold.insert("bold".to_owned(), json!(true));
    doc.apply(&Operation::Attribute {
        base_version: 1,
        range: Range::new(p(&[0, 1]), p(&[0, 2])),
        key: "bold".to_owned(),
        old_value: None,
        new_value: Some(json!(true)),
    })
    .unwrap();
    let NodeData::Element { children, .. } = doc.export_root("main").unwrap() else {
        panic!("root is an element");
    };
    assert_eq!(
        children[0],
        NodeData::element(
            "paragraph",
            vec![
                NodeData::text("f"),
                NodeData::text_with_attrs("o", bold),
                NodeData::text("o"),
            ]
        )
    );
}
