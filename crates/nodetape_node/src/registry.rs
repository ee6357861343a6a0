//! Node registry: name → node lookups.

use crate::node::Node;
use indexmap::IndexMap;
use nodetape_core::{TapeError, TapeResult};
use std::sync::Arc;

/// Error from registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Node already registered
    AlreadyRegistered {
        /// Duplicate node name
        name: String,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRegistered { name } => write!(f, "Node already registered: {}", name),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<RegistryError> for TapeError {
    fn from(err: RegistryError) -> Self {
        TapeError::configuration(err.to_string())
    }
}

/// Registry of workflow nodes
///
/// Built once by the embedding workflow, then shared read-only with the
/// replay engine.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: IndexMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    /// Register a node under its own name
    ///
    /// # Errors
    ///
    /// Returns error if the name is already taken
    pub fn register(&mut self, node: Arc<dyn Node>) -> Result<(), RegistryError> {
        let name = node.name().to_string();
        if self.nodes.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { name });
        }
        tracing::debug!(node_name = %name, "node registered");
        self.nodes.insert(name, node);
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    ///
    /// # Errors
    ///
    /// Returns error if the name is already taken
    pub fn with_node(mut self, node: impl Node + 'static) -> Result<Self, RegistryError> {
        self.register(Arc::new(node))?;
        Ok(self)
    }

    /// Get a node by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownNode` if no node has that name
    pub fn get(&self, name: &str) -> TapeResult<Arc<dyn Node>> {
        self.nodes
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| TapeError::UnknownNode {
                name: name.to_string(),
            })
    }

    /// Check if a node is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Registered names, in registration order
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Number of registered nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.list())
            .finish()
    }
}
