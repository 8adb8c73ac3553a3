#![allow(dead_code)]

pub mod fixtures;

use folio::{Document, Expand, Node, NodeId, NodeType, PropertySpec, Schema};
use serde_json::json;

/// The node-type catalog shared by the integration suites: a small but
/// realistic editor schema with text leaves, nested composites, and
/// annotation types covering every expansion/split policy combination.
pub fn editor_schema() -> Schema {
    let mut schema = Schema::new();
    schema.register(NodeType::composite("view", "nodes"));
    schema.register(
        NodeType::leaf("paragraph")
            .text("content")
            .mergeable_with(["paragraph", "heading"])
            .split_into("paragraph")
            .allow_annotations(["strong", "emphasis", "comment"]),
    );
    schema.register(
        NodeType::leaf("heading")
            .text("content")
            .property("level", PropertySpec::Number)
            .mergeable_with(["paragraph", "heading"])
            .split_into("paragraph")
            .allow_annotations(["strong", "emphasis"]),
    );
    schema.register(NodeType::leaf("image").property("url", PropertySpec::String));
    schema.register(NodeType::composite("list", "items").mergeable_with(["list"]));
    schema.register(NodeType::composite("figure", "items"));
    schema.register(NodeType::annotation("strong").expand(Expand::RIGHT).splittable());
    schema.register(
        NodeType::annotation("emphasis")
            .expand(Expand {
                left: true,
                right: true,
            })
            .splittable(),
    );
    schema.register(NodeType::annotation("comment"));
    schema.register(NodeType::container_annotation("idea"));
    schema
}

pub fn paragraph(id: &str, content: &str) -> Node {
    Node::new(id, "paragraph").with("content", json!(content))
}

pub fn list(id: &str, items: &[&str]) -> Node {
    Node::new(id, "list").with("items", json!(items))
}

pub fn view(id: &str, nodes: &[&str]) -> Node {
    Node::new(id, "view").with("nodes", json!(nodes))
}

pub fn strong(id: &str, node: &str, start: u64, end: u64) -> Node {
    Node::new(id, "strong")
        .with("path", json!([node, "content"]))
        .with("range", json!([start, end]))
}

/// Build a document from the given nodes (one change), then register the
/// container for `view_id`.
pub fn build_doc(nodes: Vec<Node>, view_id: &str) -> Document {
    let mut doc = Document::new(editor_schema());
    doc.edit(|session| {
        for node in nodes {
            session.create(node)?;
        }
        Ok(())
    })
    .expect("fixture nodes are valid");
    doc.add_container(NodeId::from(view_id))
        .expect("fixture view is a composite");
    doc
}

/// The flattened leaf contents of a view, for whole-document assertions.
pub fn contents(doc: &Document, view_id: &str) -> Vec<String> {
    let container = doc.container(&NodeId::from(view_id)).unwrap();
    container
        .ids()
        .iter()
        .map(|id| {
            let node = doc.get(id).unwrap();
            match doc.schema().text_property(&node.node_type) {
                Some(property) => node.string_prop(property).unwrap().to_string(),
                None => format!("<{}>", node.node_type),
            }
        })
        .collect()
}
