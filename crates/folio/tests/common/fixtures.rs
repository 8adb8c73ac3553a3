//! TOML-described document fixtures for the integration suites.

use folio::{Document, Node};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct Fixture {
    /// Id of the view node to register a container for.
    pub view: String,
    pub nodes: Vec<FixtureNode>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub properties: toml::Table,
}

pub fn load_fixture(name: &str) -> Fixture {
    let path = format!(
        "{}/tests/fixtures/{name}.toml",
        env!("CARGO_MANIFEST_DIR")
    );
    let raw = std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("fixture {path} unreadable: {err}"));
    toml::from_str(&raw).unwrap_or_else(|err| panic!("fixture {path} malformed: {err}"))
}

/// Build a document (using the shared editor schema) from a fixture.
pub fn document_from_fixture(fixture: &Fixture) -> Document {
    let nodes = fixture
        .nodes
        .iter()
        .map(|spec| {
            let mut node = Node::new(spec.id.as_str(), spec.node_type.as_str());
            for (key, value) in &spec.properties {
                node = node.with(key, toml_to_json(value));
            }
            node
        })
        .collect();
    super::build_doc(nodes, &fixture.view)
}

fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(n) => Value::from(*n),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}
