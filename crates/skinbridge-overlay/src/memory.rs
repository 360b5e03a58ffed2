//! In-memory host tree.
//!
//! Used by the headless connector host and by tests. Structural changes are
//! recorded as [`Mutation`]s the way a DOM mutation observer would report
//! them, and [`MemoryTree::rebuild`] swaps the whole tree for a new one with
//! fresh node ids, which is what the real host does to the overlay without
//! warning.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::host::{HostTree, Mutation, MutationKind, NodeId, Priority, Rect};

/// Serializable description of a subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

/// An inline style declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleEntry {
    pub value: String,
    pub priority: Priority,
}

#[derive(Debug, Clone)]
struct MemNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    classes: Vec<String>,
    rect: Option<Rect>,
    styles: BTreeMap<String, StyleEntry>,
}

impl MemNode {
    fn new(parent: Option<NodeId>, classes: Vec<String>, rect: Option<Rect>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            classes,
            rect,
            styles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTree {
    nodes: HashMap<NodeId, MemNode>,
    root: NodeId,
    next_id: u64,
    mutations: Vec<Mutation>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// A tree holding only an empty root.
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, MemNode::new(None, Vec::new(), None));
        Self {
            nodes,
            root,
            next_id: 1,
            mutations: Vec::new(),
        }
    }

    pub fn from_spec(spec: &NodeSpec) -> Self {
        let mut tree = Self::new();
        tree.rebuild(spec);
        tree.mutations.clear();
        tree
    }

    /// Parse a JSON snapshot of the root node.
    pub fn from_json(text: &str) -> Result<Self, HostError> {
        let spec: NodeSpec = serde_json::from_str(text)?;
        Ok(Self::from_spec(&spec))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes below the root.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole tree below the root. Every previous node id goes
    /// stale; new nodes get ids never used before.
    pub fn rebuild(&mut self, spec: &NodeSpec) {
        let old_children = self
            .nodes
            .get(&self.root)
            .map(|root| root.children.clone())
            .unwrap_or_default();
        for child in old_children {
            self.remove(child);
        }

        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.classes = spec.classes.clone();
            root.rect = spec.rect;
        }
        let root = self.root;
        for child in &spec.children {
            self.append_spec(root, child);
        }
    }

    fn append_spec(&mut self, parent: NodeId, spec: &NodeSpec) -> NodeId {
        let classes: Vec<&str> = spec.classes.iter().map(String::as_str).collect();
        let id = self.append(parent, &classes, spec.rect);
        for child in &spec.children {
            self.insert(id, child);
        }
        id
    }

    // Descendants of a freshly added node are covered by its own mutation.
    fn insert(&mut self, parent: NodeId, spec: &NodeSpec) {
        let id = self.alloc(parent, spec.classes.clone(), spec.rect);
        for child in &spec.children {
            self.insert(id, child);
        }
    }

    fn alloc(&mut self, parent: NodeId, classes: Vec<String>, rect: Option<Rect>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, MemNode::new(Some(parent), classes, rect));
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.push(id);
        }
        id
    }

    /// Append a node under `parent` and record the mutation.
    pub fn append(&mut self, parent: NodeId, classes: &[&str], rect: Option<Rect>) -> NodeId {
        let owned: Vec<String> = classes.iter().map(|c| c.to_string()).collect();
        let id = self.alloc(parent, owned.clone(), rect);
        self.mutations.push(Mutation {
            kind: MutationKind::ChildAdded,
            classes: owned,
        });
        id
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.rect = Some(rect);
        }
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .get(&node)
            .map(|n| n.classes.clone())
            .unwrap_or_default()
    }

    pub fn style_entry(&self, node: NodeId, property: &str) -> Option<&StyleEntry> {
        self.nodes.get(&node)?.styles.get(property)
    }

    /// All inline styles on `node`, sorted by property.
    pub fn styles(&self, node: NodeId) -> BTreeMap<String, StyleEntry> {
        self.nodes
            .get(&node)
            .map(|n| n.styles.clone())
            .unwrap_or_default()
    }

    /// Drain the structural changes recorded since the last call.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&scope) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn matches(&self, node: NodeId, classes: &[&str]) -> bool {
        match self.nodes.get(&node) {
            Some(n) => classes
                .iter()
                .all(|class| n.classes.iter().any(|c| c == class)),
            None => false,
        }
    }
}

impl HostTree for MemoryTree {
    fn select_all(&self, classes: &[&str]) -> Vec<NodeId> {
        self.select_all_within(self.root, classes)
    }

    fn select_all_within(&self, scope: NodeId, classes: &[&str]) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.matches(*id, classes))
            .collect()
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.matches(node, &[class])
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(n) = self.nodes.get_mut(&node) {
            if !n.classes.iter().any(|c| c == class) {
                n.classes.push(class.to_string());
            }
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.classes.retain(|c| c != class);
        }
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        self.nodes.get(&node)?.rect
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.style_entry(node, property).map(|entry| entry.value.clone())
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str, priority: Priority) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.styles.insert(
                property.to_string(),
                StyleEntry {
                    value: value.to_string(),
                    priority,
                },
            );
        }
    }

    fn remove_style(&mut self, node: NodeId, property: &str) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.styles.remove(property);
        }
    }

    fn append_to_root(&mut self, classes: &[&str]) -> NodeId {
        let root = self.root;
        self.append(root, classes, None)
    }

    fn remove(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        let Some(removed) = self.nodes.get(&node) else {
            return;
        };
        let parent = removed.parent;
        let classes = removed.classes.clone();

        let mut doomed = self.descendants(node);
        doomed.push(node);
        for id in doomed {
            self.nodes.remove(&id);
        }
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }

        self.mutations.push(Mutation {
            kind: MutationKind::ChildRemoved,
            classes,
        });
    }
}
