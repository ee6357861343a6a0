//! Explicit instrumentation around node calls.

use crate::changes::merge_update;
use crate::trace::{ExecutionTrace, LogLevel};
use crate::tracer::Tracer;
use nodetape_codec::{State, ToCanonical, Value};
use nodetape_core::TraceId;
use nodetape_node::{Node, NodeError, invoke};

/// Error message for scopes dropped while still active
pub const DROPPED: &str = "dropped without completion";

/// Trace one node call
///
/// Starts a trace, invokes the node, records the state changes its output
/// makes to a copy of `input`, and ends the trace. Node failures end the
/// trace and are returned to the caller.
///
/// # Errors
///
/// Returns the node's own failure, including captured panics
pub async fn instrumented_call(
    tracer: &Tracer,
    node: &dyn Node,
    input: State,
) -> Result<Value, NodeError> {
    let scope = TraceScope::start(tracer, node.name(), &input);
    let invocation = invoke(node, input.clone()).await;

    match &invocation.output {
        Ok(output) => {
            scope.record_changes(&input, &merge_update(&input, output));
            scope.finish(output);
        }
        Err(error) => {
            scope.fail(error);
        }
    }
    invocation.output
}

/// Guard for one active trace
///
/// Ends the trace as failed if dropped before [`finish`](Self::finish) or
/// [`fail`](Self::fail).
#[must_use = "dropping a scope immediately ends its trace as failed"]
pub struct TraceScope<'a> {
    tracer: &'a Tracer,
    trace_id: TraceId,
    done: bool,
}

impl<'a> TraceScope<'a> {
    /// Start a trace
    pub fn start<T: ToCanonical + ?Sized>(tracer: &'a Tracer, node_name: &str, input: &T) -> Self {
        Self {
            tracer,
            trace_id: tracer.start_trace(node_name, input),
            done: false,
        }
    }

    /// Trace id
    #[must_use]
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Record state changes between two snapshots
    pub fn record_changes(&self, before: &State, after: &State) {
        self.tracer.add_state_change(&self.trace_id, before, after);
    }

    /// Attach a log entry
    pub fn log(&self, level: LogLevel, message: &str, extra: Option<State>) {
        match level {
            LogLevel::Debug => self.tracer.log_debug(&self.trace_id, message, extra),
            LogLevel::Info => self.tracer.log_info(&self.trace_id, message, extra),
            LogLevel::Warning => self.tracer.log_warning(&self.trace_id, message, extra),
            LogLevel::Error => self.tracer.log_error(&self.trace_id, message, extra),
        }
    }

    /// End the trace successfully
    pub fn finish(mut self, output: &Value) -> Option<ExecutionTrace> {
        self.done = true;
        self.tracer.end_trace(&self.trace_id, Ok(output))
    }

    /// End the trace with a failure
    pub fn fail(mut self, error: &NodeError) -> Option<ExecutionTrace> {
        self.done = true;
        self.tracer.end_trace(&self.trace_id, Err(error))
    }
}

impl Drop for TraceScope<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.tracer
                .end_trace(&self.trace_id, Err(&NodeError::failed(DROPPED)));
        }
    }
}
