//! Timed, panic-safe node invocation.

use crate::node::{Node, NodeError};
use futures::FutureExt;
use nodetape_codec::{State, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

/// Outcome of one node call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Node output or captured failure
    pub output: Result<Value, NodeError>,
    /// Monotonic wall time of the call
    pub elapsed: Duration,
}

impl Invocation {
    /// Check if the node succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }

    /// Failure message, if the node failed
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.output.as_ref().err().map(ToString::to_string)
    }
}

/// Invoke a node, timing it and capturing panics as [`NodeError::Panicked`]
pub async fn invoke(node: &dyn Node, state: State) -> Invocation {
    let started = Instant::now();
    let output = match AssertUnwindSafe(node.run(state)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(NodeError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    };
    let elapsed = started.elapsed();

    if let Err(err) = &output {
        tracing::debug!(node_name = node.name(), error = %err, "node failed");
    }

    Invocation { output, elapsed }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}
