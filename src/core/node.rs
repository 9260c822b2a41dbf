//! Binary node encoding seam.
//!
//! The structural marshaller for protocol nodes lives outside this crate. The
//! writer only needs canonical bytes, so it consumes anything implementing
//! [`Marshal`]. [`Node`] is a serde-backed node tree with a bincode encoding,
//! useful where no external marshaller is wired in.

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Produces the canonical byte encoding of a binary protocol node.
pub trait Marshal {
    fn marshal(&self) -> Result<Vec<u8>>;
}

/// Already-encoded node bytes, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode(pub Vec<u8>);

impl Marshal for RawNode {
    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// Content of a [`Node`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeContent {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    Children(Vec<Node>),
}

/// Protocol node: a description, ordered attributes and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Node {
    pub description: String,
    pub attributes: BTreeMap<String, String>,
    pub content: NodeContent,
}

impl Node {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_content(mut self, content: NodeContent) -> Self {
        self.content = content;
        self
    }
}

impl Marshal for Node {
    fn marshal(&self) -> Result<Vec<u8>> {
        if self.description.is_empty() {
            return Err(DispatchError::Encoding("node has no description".into()));
        }
        bincode::serialize(self).map_err(|e| DispatchError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_marshal_is_canonical() {
        let a = Node::new("action")
            .with_attr("type", "set")
            .with_attr("epoch", "3")
            .with_content(NodeContent::Children(vec![Node::new("read")]));
        let b = Node::new("action")
            .with_attr("epoch", "3")
            .with_attr("type", "set")
            .with_content(NodeContent::Children(vec![Node::new("read")]));
        assert_eq!(a.marshal().unwrap(), b.marshal().unwrap());

        let decoded: Node = bincode::deserialize(&a.marshal().unwrap()).unwrap();
        assert_eq!(decoded, a);
    }

    #[test]
    fn test_nameless_node_is_encoding_error() {
        assert!(matches!(Node::default().marshal(), Err(DispatchError::Encoding(_))));
    }

    #[test]
    fn test_raw_node_passthrough() {
        assert_eq!(RawNode(vec![1, 2, 3]).marshal().unwrap(), vec![1, 2, 3]);
    }
}
