//! The host visual tree, as seen by the overlay.
//!
//! The overlay does not own the tree: the host rebuilds it out-of-band and
//! without notice. Everything the overlay reads or writes goes through
//! [`HostTree`], and node references are plain ids that may go stale at any
//! time; check [`HostTree::contains`] before trusting one.

use serde::{Deserialize, Serialize};

/// Non-owning reference to a node in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Viewport-relative bounding box, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// Style write precedence. `Important` wins over host stylesheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Normal,
    Important,
}

/// A structural change reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub kind: MutationKind,
    /// Classes of the added or removed node, when known.
    #[serde(default)]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationKind {
    ChildAdded,
    ChildRemoved,
}

impl Mutation {
    pub fn added(classes: &[&str]) -> Self {
        Self {
            kind: MutationKind::ChildAdded,
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn removed(classes: &[&str]) -> Self {
        Self {
            kind: MutationKind::ChildRemoved,
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Queryable, writable view of the host tree.
///
/// Selection is class based: a node matches when it carries every class in
/// the list. Results are in document order.
pub trait HostTree {
    /// Every matching node in the tree.
    fn select_all(&self, classes: &[&str]) -> Vec<NodeId>;

    /// Every matching descendant of `scope`.
    fn select_all_within(&self, scope: NodeId, classes: &[&str]) -> Vec<NodeId>;

    /// First matching node in the tree.
    fn select_first(&self, classes: &[&str]) -> Option<NodeId> {
        self.select_all(classes).into_iter().next()
    }

    /// First matching descendant of `scope`.
    fn select_within(&self, scope: NodeId, classes: &[&str]) -> Option<NodeId> {
        self.select_all_within(scope, classes).into_iter().next()
    }

    /// Whether `node` is still attached to the tree.
    fn contains(&self, node: NodeId) -> bool;

    fn has_class(&self, node: NodeId, class: &str) -> bool;
    fn add_class(&mut self, node: NodeId, class: &str);
    fn remove_class(&mut self, node: NodeId, class: &str);

    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;

    /// Inline style value of `property`, if set.
    fn style(&self, node: NodeId, property: &str) -> Option<String>;
    fn set_style(&mut self, node: NodeId, property: &str, value: &str, priority: Priority);
    fn remove_style(&mut self, node: NodeId, property: &str);

    /// Create a node with `classes` as the last child of the tree root.
    fn append_to_root(&mut self, classes: &[&str]) -> NodeId;

    /// Detach `node` and its subtree.
    fn remove(&mut self, node: NodeId);
}
