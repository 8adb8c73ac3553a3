mod common;

use common::fixtures::{document_from_fixture, load_fixture};
use folio::NodeId;

#[test]
fn joining_list_items_splices_the_flat_list() {
    let fixture = load_fixture("tic_tac");
    let mut doc = document_from_fixture(&fixture);
    let view = NodeId::from("content");

    let joined = doc
        .edit(|session| session.join(&view, &NodeId::from("p1"), &NodeId::from("p2")))
        .unwrap();
    assert!(joined);

    let p1 = doc.get(&NodeId::from("p1")).unwrap();
    assert_eq!(p1.string_prop("content").unwrap(), "TicTac");
    assert!(!doc.contains(&NodeId::from("p2")));
    assert_eq!(
        doc.get(&NodeId::from("l1")).unwrap().id_list_prop("items").unwrap(),
        vec![NodeId::from("p1"), NodeId::from("p3")]
    );
    assert_eq!(common::contents(&doc, "content"), vec!["TicTac", "Toe"]);
}

#[test]
fn joining_across_two_levels_of_nesting_collapses_both_parents() {
    let fixture = load_fixture("nested_lists");
    let mut doc = document_from_fixture(&fixture);
    let view = NodeId::from("content");

    let joined = doc
        .edit(|session| session.join(&view, &NodeId::from("p1"), &NodeId::from("p2")))
        .unwrap();
    assert!(joined);

    // The merged leaf.
    assert_eq!(
        doc.get(&NodeId::from("p1")).unwrap().string_prop("content").unwrap(),
        "alphabeta"
    );
    assert!(!doc.contains(&NodeId::from("p2")));
    // Inner list of the second stack was emptied into the first and deleted.
    assert!(!doc.contains(&NodeId::from("l2")));
    assert_eq!(
        doc.get(&NodeId::from("l1")).unwrap().id_list_prop("items").unwrap(),
        vec![NodeId::from("p1"), NodeId::from("p3")]
    );
    // Same one level up.
    assert!(!doc.contains(&NodeId::from("o2")));
    assert_eq!(
        doc.get(&NodeId::from("content")).unwrap().id_list_prop("nodes").unwrap(),
        vec![NodeId::from("o1")]
    );
    assert_eq!(common::contents(&doc, "content"), vec!["alphabeta", "gamma"]);
}

#[test]
fn join_of_incompatible_leaves_reports_false_and_changes_nothing() {
    let fixture = load_fixture("tic_tac");
    let mut doc = document_from_fixture(&fixture);
    let view = NodeId::from("content");

    // An image cannot merge into a paragraph.
    doc.edit(|session| {
        session.create(folio::Node::new("img1", "image").with("url", serde_json::json!("a.png")))?;
        Ok(())
    })
    .unwrap();

    let before = common::contents(&doc, "content");
    let joined = doc
        .edit(|session| session.join(&view, &NodeId::from("p1"), &NodeId::from("img1")))
        .unwrap();
    assert!(!joined);
    assert_eq!(common::contents(&doc, "content"), before);
}
