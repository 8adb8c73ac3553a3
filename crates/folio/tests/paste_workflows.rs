mod common;

use common::{build_doc, contents, paragraph, strong, view};
use folio::{Coordinate, DocumentFragment, NodeId, PropertyPath, Selection};

fn clipboard() -> DocumentFragment {
    DocumentFragment::new(
        vec![
            paragraph("c1", " "),
            paragraph("c2", "Hello World!"),
            paragraph("c3", "quick brown"),
        ],
        vec![],
    )
}

#[test]
fn multi_node_paste_into_a_selection_splits_and_merges() {
    let mut doc = build_doc(
        vec![
            view("content", &["p1", "p2", "p3"]),
            paragraph("p1", "The"),
            paragraph("p2", " fox jumps over the lazy dog."),
            paragraph("p3", "Lorem ipsum dolor sit amet, consectetur adipiscing elit."),
        ],
        "content",
    );
    let view_id = NodeId::from("content");

    // Replace the five characters of "dolor" with the clipboard content.
    let selection = Selection::new(Coordinate::new(2, 12), Coordinate::new(2, 17));
    let after = doc
        .edit(|session| {
            let collapsed = session.delete_selection(&view_id, &selection)?;
            session.paste(&view_id, &collapsed, &clipboard())
        })
        .unwrap();

    assert_eq!(
        contents(&doc, "content"),
        vec![
            "The",
            " fox jumps over the lazy dog.",
            "Lorem ipsum  ",
            "Hello World!",
            "quick brown sit amet, consectetur adipiscing elit.",
        ]
    );
    // Cursor lands at the end of the pasted content.
    assert_eq!(after, Selection::collapsed(4, 11));
}

#[test]
fn single_node_same_type_paste_inlines_text_and_annotations() {
    let mut doc = build_doc(
        vec![view("content", &["p1"]), paragraph("p1", "before after")],
        "content",
    );
    let view_id = NodeId::from("content");

    let fragment = DocumentFragment::new(
        vec![paragraph("c1", "BOLD")],
        vec![strong("ca1", "c1", 0, 4)],
    );
    let after = doc
        .edit(|session| session.paste(&view_id, &Selection::collapsed(0, 7), &fragment))
        .unwrap();

    assert_eq!(
        doc.get(&NodeId::from("p1")).unwrap().string_prop("content").unwrap(),
        "before BOLDafter"
    );
    assert_eq!(after, Selection::collapsed(0, 11));
    let anns = doc.annotations_at(&PropertyPath::new("p1", "content"));
    assert_eq!(anns.len(), 1);
    assert_eq!(anns[0].range().unwrap(), (7, 11));
    // Pasted annotations get fresh identities.
    assert_ne!(anns[0].id, NodeId::from("ca1"));
}

#[test]
fn copy_paste_round_trip_duplicates_content_with_fresh_ids() {
    let mut doc = build_doc(
        vec![
            view("content", &["p1", "p2"]),
            paragraph("p1", "alpha"),
            paragraph("p2", "omega"),
            strong("a1", "p1", 0, 5),
        ],
        "content",
    );
    let view_id = NodeId::from("content");

    // Copy both paragraphs wholesale.
    let selection = Selection::new(Coordinate::new(0, 0), Coordinate::new(1, 5));
    let fragment = folio::copy_selection(doc.state(), &view_id, &selection).unwrap();
    assert_eq!(fragment.nodes.len(), 2);
    assert_eq!(fragment.annotations.len(), 1);

    // Paste at the very end of the document.
    doc.edit(|session| session.paste(&view_id, &Selection::collapsed(1, 5), &fragment))
        .unwrap();

    let texts = contents(&doc, "content");
    assert_eq!(texts, vec!["alpha", "omegaalpha", "omega"]);
    // The original annotation is untouched; the pasted copy lives on the
    // merged node with rebased offsets.
    let originals = doc.annotations_at(&PropertyPath::new("p1", "content"));
    assert_eq!(originals.len(), 1);
    assert_eq!(originals[0].range().unwrap(), (0, 5));
    let pasted = doc.annotations_at(&PropertyPath::new("p2", "content"));
    assert_eq!(pasted.len(), 1);
    assert_eq!(pasted[0].range().unwrap(), (5, 10));
}

#[test]
fn cut_then_paste_moves_content() {
    let mut doc = build_doc(
        vec![
            view("content", &["p1", "p2"]),
            paragraph("p1", "keep CUT"),
            paragraph("p2", "target"),
        ],
        "content",
    );
    let view_id = NodeId::from("content");

    let selection = Selection::new(Coordinate::new(0, 5), Coordinate::new(0, 8));
    let moved = doc
        .edit(|session| {
            let (fragment, _) = session.cut_selection(&view_id, &selection)?;
            session.paste(&view_id, &Selection::collapsed(1, 6), &fragment)
        })
        .unwrap();

    assert_eq!(contents(&doc, "content"), vec!["keep ", "targetCUT"]);
    assert_eq!(moved, Selection::collapsed(1, 9));
}
