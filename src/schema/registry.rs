//! Static catalog of node types.

use std::collections::BTreeMap;

use super::builtins;
use super::types::NodeType;

/// Catalog of node types available to a session.
///
/// Built once and shared read-only; the built-in financial nodes are
/// registered by [`SchemaRegistry::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRegistry {
    nodes: BTreeMap<String, NodeType>,
}

impl SchemaRegistry {
    /// Create a registry with the built-in financial node types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for node in builtins::all() {
            // Built-in names are unique.
            let _ = registry.register(node);
        }
        registry
    }

    /// Create a registry with no node types.
    pub fn empty() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Register a node type.
    ///
    /// # Errors
    /// Returns error if the name is empty or already registered.
    pub fn register(&mut self, node: NodeType) -> Result<(), String> {
        if node.name.trim().is_empty() {
            return Err("Node name is required".to_string());
        }
        if self.nodes.contains_key(&node.name) {
            return Err(format!("Node '{}' already exists", node.name));
        }
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    /// Builder-style registration, ignoring duplicates.
    pub fn with_node(mut self, node: NodeType) -> Self {
        let _ = self.register(node);
        self
    }

    /// Get a node type by name.
    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.nodes.get(name)
    }

    /// Whether a node type with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Node names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Iterate over node types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeType> {
        self.nodes.values()
    }

    /// Get the number of registered node types.
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Deterministic question used when the dialogue is pinned to a node.
    pub fn fallback_question(&self, node: &str, field: Option<&str>) -> String {
        if let Some(text) = field.and_then(|f| builtins::primary_question(node, f)) {
            return text.to_string();
        }
        let description = field.and_then(|f| self.get(node).and_then(|n| n.describe(f)));
        match (field, description) {
            (_, Some(desc)) => format!("Just to complete {}, could you share this: {}", node, desc),
            (Some(f), None) => format!("Just to complete {}, could you tell me about: {}?", node, f),
            (None, None) => format!("Just to complete {}, what information can you share here?", node),
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
