//! Nested Helm values overlay carried in a Gaffer's `spec`
//!
//! A [`SpecTree`] is a map of string keys to [`SpecNode`]s. Interior nodes are
//! maps; leaves are scalars or lists. Traversal is typed, so a path that runs
//! into a scalar is simply "not found" on read and a [`SpecTreeError::Conflict`]
//! on write, never a panic or a silent overwrite.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Children of a map node, keyed by segment name
pub type SpecMap = BTreeMap<String, SpecNode>;

/// Errors returned by [`SpecTree::put`]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpecTreeError {
    /// The path had no segments
    #[error("path must contain at least one segment")]
    EmptyPath,

    /// A non-terminal segment already holds a scalar or list
    #[error("cannot write through non-map value at '{path}'")]
    Conflict {
        /// Dotted prefix of the path that holds the non-map value
        path: String,
    },
}

/// A leaf value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean leaf
    Bool(bool),
    /// Integer leaf
    Int(i64),
    /// Floating point leaf
    Float(f64),
    /// String leaf
    String(String),
    /// Explicit null
    Null,
}

/// A node in the tree
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecNode {
    /// Interior node
    Map(SpecMap),
    /// Ordered list leaf
    List(Vec<SpecNode>),
    /// Scalar leaf
    Scalar(Scalar),
}

impl SpecNode {
    /// Borrow the string value of a scalar string leaf
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SpecNode::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Borrow the children of a map node
    pub fn as_map(&self) -> Option<&SpecMap> {
        match self {
            SpecNode::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Build a list leaf from string items
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SpecNode::List(items.into_iter().map(|s| SpecNode::from(s.into())).collect())
    }
}

impl From<&str> for SpecNode {
    fn from(value: &str) -> Self {
        SpecNode::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<String> for SpecNode {
    fn from(value: String) -> Self {
        SpecNode::Scalar(Scalar::String(value))
    }
}

impl From<bool> for SpecNode {
    fn from(value: bool) -> Self {
        SpecNode::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for SpecNode {
    fn from(value: i64) -> Self {
        SpecNode::Scalar(Scalar::Int(value))
    }
}

impl From<f64> for SpecNode {
    fn from(value: f64) -> Self {
        SpecNode::Scalar(Scalar::Float(value))
    }
}

impl From<Vec<SpecNode>> for SpecNode {
    fn from(value: Vec<SpecNode>) -> Self {
        SpecNode::List(value)
    }
}

impl From<SpecMap> for SpecNode {
    fn from(value: SpecMap) -> Self {
        SpecNode::Map(value)
    }
}

/// Nested key-path map used as the Helm values overlay
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecTree {
    root: SpecMap,
}

impl SpecTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing map as the tree root
    pub fn from_map(root: SpecMap) -> Self {
        Self { root }
    }

    /// Borrow the root map
    pub fn root(&self) -> &SpecMap {
        &self.root
    }

    /// True when the tree has no top-level keys
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Look up the node at `path`.
    ///
    /// Returns `None` if any segment is missing or if a non-terminal segment
    /// resolves to a scalar or list. An empty path has no node.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&SpecNode> {
        let (last, parents) = path.split_last()?;
        let mut map = &self.root;
        for segment in parents {
            map = map.get(segment.as_ref())?.as_map()?;
        }
        map.get(last.as_ref())
    }

    /// Convenience lookup for string leaves
    pub fn get_str<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        self.get(path).and_then(SpecNode::as_str)
    }

    /// Write `value` at `path`, creating missing intermediate maps.
    ///
    /// The terminal segment is always overwritten. If an existing intermediate
    /// node is not a map the tree is left untouched and
    /// [`SpecTreeError::Conflict`] names the offending prefix.
    pub fn put<S: AsRef<str>>(
        &mut self,
        value: impl Into<SpecNode>,
        path: &[S],
    ) -> Result<(), SpecTreeError> {
        let (last, parents) = path.split_last().ok_or(SpecTreeError::EmptyPath)?;

        // Validate the whole prefix before materializing anything.
        let mut cursor = Some(&self.root);
        for (depth, segment) in parents.iter().enumerate() {
            let Some(map) = cursor else { break };
            cursor = match map.get(segment.as_ref()) {
                None => None,
                Some(SpecNode::Map(child)) => Some(child),
                Some(_) => {
                    return Err(SpecTreeError::Conflict {
                        path: dotted(&path[..=depth]),
                    })
                }
            };
        }

        let mut map = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            let node = map
                .entry(segment.as_ref().to_string())
                .or_insert_with(|| SpecNode::Map(SpecMap::new()));
            map = match node {
                SpecNode::Map(child) => child,
                _ => {
                    return Err(SpecTreeError::Conflict {
                        path: dotted(&path[..=depth]),
                    })
                }
            };
        }
        map.insert(last.as_ref().to_string(), value.into());
        Ok(())
    }

    /// Render the tree as a YAML document
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.root)
    }
}

impl From<SpecMap> for SpecTree {
    fn from(root: SpecMap) -> Self {
        Self::from_map(root)
    }
}

fn dotted<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> SpecTree {
        serde_yaml::from_str(
            r#"
graph:
  config:
    graphId: simpleGraph
  schema:
    elements.json: "{}"
api:
  replicas: 2
  enabled: true
  tags: [a, b]
"#,
        )
        .unwrap()
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut tree = SpecTree::new();
        tree.put("value", &["a", "b", "c"]).unwrap();
        assert_eq!(tree.get(&["a", "b", "c"]), Some(&SpecNode::from("value")));
        assert!(tree.get(&["a", "b"]).unwrap().as_map().is_some());
    }

    #[test]
    fn put_overwrites_terminal_segment() {
        let mut tree = sample_tree();
        tree.put("other", &["graph", "config", "graphId"]).unwrap();
        assert_eq!(tree.get_str(&["graph", "config", "graphId"]), Some("other"));

        // A terminal map may be replaced by a scalar.
        tree.put(1i64, &["graph", "config"]).unwrap();
        assert_eq!(tree.get(&["graph", "config"]), Some(&SpecNode::from(1i64)));
    }

    #[test]
    fn put_through_scalar_conflicts_without_partial_write() {
        let mut tree = sample_tree();
        let before = tree.clone();

        let err = tree
            .put("x", &["api", "replicas", "deep", "leaf"])
            .unwrap_err();
        assert_eq!(
            err,
            SpecTreeError::Conflict {
                path: "api.replicas".to_string()
            }
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn put_through_list_conflicts() {
        let mut tree = sample_tree();
        let before = tree.clone();
        assert!(matches!(
            tree.put("x", &["api", "tags", "0"]),
            Err(SpecTreeError::Conflict { .. })
        ));
        assert_eq!(tree, before);
    }

    #[test]
    fn conflict_deep_in_fresh_branch_leaves_no_materialized_maps() {
        let mut tree = SpecTree::new();
        tree.put("scalar", &["a", "b"]).unwrap();
        let before = tree.clone();
        assert!(tree.put("x", &["a", "b", "c", "d"]).is_err());
        assert_eq!(tree, before);
    }

    #[test]
    fn empty_path_is_distinct_from_conflict() {
        let mut tree = SpecTree::new();
        let empty: [&str; 0] = [];
        assert_eq!(tree.put("x", &empty), Err(SpecTreeError::EmptyPath));
        assert!(tree.is_empty());
        assert_eq!(tree.get(&empty), None);
    }

    #[test]
    fn get_missing_or_through_scalar_is_none() {
        let tree = sample_tree();
        assert_eq!(tree.get(&["nope"]), None);
        assert_eq!(tree.get(&["graph", "missing", "leaf"]), None);
        assert_eq!(tree.get(&["api", "replicas", "leaf"]), None);
        assert_eq!(tree.get(&["api", "tags", "0"]), None);
    }

    #[test]
    fn dotted_keys_are_single_segments() {
        let tree = sample_tree();
        assert_eq!(
            tree.get_str(&["graph", "schema", "elements.json"]),
            Some("{}")
        );
    }

    #[test]
    fn scalars_keep_their_types_through_yaml() {
        let tree = sample_tree();
        assert_eq!(tree.get(&["api", "replicas"]), Some(&SpecNode::from(2i64)));
        assert_eq!(tree.get(&["api", "enabled"]), Some(&SpecNode::from(true)));
        assert_eq!(
            tree.get(&["api", "tags"]),
            Some(&SpecNode::string_list(["a", "b"]))
        );

        let rendered = tree.to_yaml().unwrap();
        let reparsed: SpecTree = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(reparsed, tree);
    }

    #[test]
    fn nulls_survive_json() {
        let tree: SpecTree = serde_json::from_str(r#"{"a": null, "b": 1.5}"#).unwrap();
        assert_eq!(tree.get(&["a"]), Some(&SpecNode::Scalar(Scalar::Null)));
        assert_eq!(tree.get(&["b"]), Some(&SpecNode::from(1.5)));
    }
}
