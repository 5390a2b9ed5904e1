use std::sync::Arc;

use serde::{Deserialize, Serialize};

use arbor_types::NodeId;

use crate::node::Node;

/// Owned, serde-friendly description of a subtree.
///
/// This is the JSON shape documents are imported from and exported to:
///
/// ```json
/// { "id": "0", "content": "", "children": [ { "id": "1", "content": "A" } ] }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(id: NodeId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id().clone(),
            content: node.content().to_string(),
            children: node.children().iter().map(|c| Self::from_node(c)).collect(),
        }
    }

    pub fn to_node(&self) -> Node {
        Node::with_children(
            self.id.clone(),
            self.content.as_str(),
            self.children.iter().map(|c| Arc::new(c.to_node())).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    #[test]
    fn parses_sparse_json() {
        let json = r#"{"id":"0","children":[{"id":"1","content":"A"},{"id":"2"}]}"#;
        let spec: NodeSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.content, "");
        assert_eq!(spec.children.len(), 2);
        assert_eq!(spec.children[1].content, "");

        let tree = Tree::from_spec(&spec).unwrap();
        assert_eq!(tree.get("1").unwrap().content(), "A");
        assert_eq!(tree.to_spec(), spec);
    }

    #[test]
    fn rejects_empty_id() {
        let json = r#"{"id":"","content":"x"}"#;
        assert!(serde_json::from_str::<NodeSpec>(json).is_err());
    }

    #[test]
    fn leaf_children_are_omitted_on_export() {
        let spec = NodeSpec::new(NodeId::root(), "").with_child(NodeSpec::new(
            NodeId::new("1").unwrap(),
            "leaf",
        ));
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(
            json,
            r#"{"id":"0","content":"","children":[{"id":"1","content":"leaf"}]}"#
        );
    }
}
