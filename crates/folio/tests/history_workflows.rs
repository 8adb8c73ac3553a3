mod common;

use common::{build_doc, contents, list, paragraph, view};
use folio::{Change, ChangeId, Node, NodeId, Operation, Selection};
use serde_json::json;

fn tic_tac_doc() -> folio::Document {
    build_doc(
        vec![
            view("content", &["l1"]),
            list("l1", &["p1", "p2", "p3"]),
            paragraph("p1", "Tic"),
            paragraph("p2", "Tac"),
            paragraph("p3", "Toe"),
        ],
        "content",
    )
}

#[test]
fn undo_and_redo_replay_a_whole_edit() {
    let mut doc = tic_tac_doc();
    let view_id = NodeId::from("content");

    doc.edit(|session| session.join(&view_id, &NodeId::from("p1"), &NodeId::from("p2")))
        .unwrap();
    assert_eq!(contents(&doc, "content"), vec!["TicTac", "Toe"]);

    // Undo restores the merged node, its text, and the list entry.
    let pivot = doc.undo().unwrap();
    assert!(pivot.is_some());
    assert_eq!(contents(&doc, "content"), vec!["Tic", "Tac", "Toe"]);
    assert_eq!(
        doc.get(&NodeId::from("l1")).unwrap().id_list_prop("items").unwrap(),
        vec![NodeId::from("p1"), NodeId::from("p2"), NodeId::from("p3")]
    );

    let pivot = doc.redo().unwrap();
    assert!(pivot.is_some());
    assert_eq!(contents(&doc, "content"), vec!["TicTac", "Toe"]);
    assert!(!doc.contains(&NodeId::from("p2")));
}

#[test]
fn fast_forward_merge_applies_a_linear_continuation() {
    let mut doc = build_doc(
        vec![view("content", &["p1"]), paragraph("p1", "a")],
        "content",
    );
    let view_id = NodeId::from("content");

    doc.edit(|session| session.insert_text(&view_id, &Selection::collapsed(0, 1), "b"))
        .unwrap();
    let tip = doc.head().unwrap();

    doc.undo().unwrap();
    assert_eq!(contents(&doc, "content"), vec!["a"]);

    // The tip is a pure continuation of the rewound head: fast-forward.
    assert!(doc.merge(tip).unwrap());
    assert_eq!(contents(&doc, "content"), vec!["ab"]);
    assert_eq!(doc.head(), Some(tip));
}

#[test]
fn diverged_merge_fails_without_mutating() {
    let mut doc = build_doc(
        vec![view("content", &["p1"]), paragraph("p1", "a")],
        "content",
    );
    let view_id = NodeId::from("content");

    doc.edit(|session| session.insert_text(&view_id, &Selection::collapsed(0, 1), "b"))
        .unwrap();
    let old_tip = doc.head().unwrap();

    doc.undo().unwrap();
    doc.edit(|session| session.insert_text(&view_id, &Selection::collapsed(0, 1), "c"))
        .unwrap();
    let new_tip = doc.head().unwrap();

    // old_tip is now a sibling branch, not a continuation.
    assert!(!doc.merge(old_tip).unwrap());
    assert_eq!(contents(&doc, "content"), vec!["ac"]);
    assert_eq!(doc.head(), Some(new_tip));
}

#[test]
fn checkout_moves_between_sibling_branches() {
    let mut doc = build_doc(
        vec![view("content", &["p1"]), paragraph("p1", "a")],
        "content",
    );
    let view_id = NodeId::from("content");

    doc.edit(|session| session.insert_text(&view_id, &Selection::collapsed(0, 1), "b"))
        .unwrap();
    let branch_b = doc.head().unwrap();
    doc.undo().unwrap();
    doc.edit(|session| session.insert_text(&view_id, &Selection::collapsed(0, 1), "c"))
        .unwrap();
    assert_eq!(contents(&doc, "content"), vec!["ac"]);

    doc.checkout(branch_b).unwrap();
    assert_eq!(contents(&doc, "content"), vec!["ab"]);
    assert_eq!(doc.head(), Some(branch_b));
}

#[test]
fn imported_collaborator_change_fast_forwards() {
    let mut doc = build_doc(
        vec![view("content", &["p1"]), paragraph("p1", "base")],
        "content",
    );
    let head = doc.head().unwrap();

    // A collaborator produced one create on top of our head.
    let foreign = Change {
        id: ChangeId::new(1_000),
        parent: Some(head),
        ops: vec![
            Operation::Create {
                node: Node::new("p2", "paragraph").with("content", json!("remote")),
            },
            Operation::Update {
                path: folio::PropertyPath::new("content", "nodes"),
                delta: folio::PropertyDelta::Array(folio_delta::ArrayDelta::Insert {
                    pos: 1,
                    value: json!("p2"),
                }),
            },
        ],
    };
    doc.import_change(foreign).unwrap();

    assert!(doc.merge(ChangeId::new(1_000)).unwrap());
    assert_eq!(contents(&doc, "content"), vec!["base", "remote"]);
}
