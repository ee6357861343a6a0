//! Node trait

use async_trait::async_trait;
use futures::future::BoxFuture;
use nodetape_codec::{State, Value};
use std::fmt;
use std::sync::Arc;

/// Failure raised by a node
///
/// Recording, tracing, and replay capture this into their artifacts rather
/// than propagating it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// Node returned an error
    #[error("{message}")]
    Failed {
        /// Error message
        message: String,
        /// Backtrace or stack text, if the node supplied one
        stack_trace: Option<String>,
    },

    /// Node panicked
    #[error("node panicked: {message}")]
    Panicked {
        /// Panic payload text
        message: String,
    },
}

impl NodeError {
    /// Build a failure from a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Attach stack text to a failure
    #[must_use]
    pub fn with_stack_trace(self, stack: impl Into<String>) -> Self {
        match self {
            Self::Failed { message, .. } => Self::Failed {
                message,
                stack_trace: Some(stack.into()),
            },
            panicked => panicked,
        }
    }

    /// Stack text, if any
    #[must_use]
    pub fn stack_trace(&self) -> Option<&str> {
        match self {
            Self::Failed { stack_trace, .. } => stack_trace.as_deref(),
            Self::Panicked { .. } => None,
        }
    }
}

/// A unit of workflow logic: takes a state, returns a partial state update
#[async_trait]
pub trait Node: Send + Sync {
    /// Registry name
    fn name(&self) -> &str;

    /// Run against a state
    async fn run(&self, state: State) -> Result<Value, NodeError>;
}

type NodeFn = dyn Fn(State) -> BoxFuture<'static, Result<Value, NodeError>> + Send + Sync;

/// Node backed by a closure
pub struct FnNode {
    name: String,
    func: Arc<NodeFn>,
}

impl FnNode {
    /// Wrap an async closure
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(State) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, NodeError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |state| Box::pin(func(state))),
        }
    }

    /// Wrap a synchronous closure
    pub fn sync<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(State) -> Result<Value, NodeError> + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        Self::new(name, move |state| {
            let func = Arc::clone(&func);
            async move { func(state) }
        })
    }
}

#[async_trait]
impl Node for FnNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: State) -> Result<Value, NodeError> {
        (self.func)(state).await
    }
}

impl fmt::Debug for FnNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnNode")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
