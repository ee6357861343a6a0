//! Identifiers for traces, replay steps and sequences.
//!
//! Ids are human-readable: a prefix, a microsecond timestamp, and a
//! process-wide monotonic counter that breaks ties between calls landing
//! in the same microsecond.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get as string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Trace identifier - one traced node invocation
    TraceId
);

string_id!(
    /// Replay step identifier - one recorded node invocation
    StepId
);

string_id!(
    /// Replay sequence identifier
    SequenceId
);

/// Issued-id counter shared by every generator in the process
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generator for unique, ordered ids
///
/// The counter is process-wide, so ids stay unique across tracers and
/// engines sharing an artifact directory, even for calls issued faster than
/// the clock resolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdGenerator;

impl IdGenerator {
    /// Create a generator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Next raw id for a prefix at the given instant
    pub fn next_at(&self, prefix: &str, at: DateTime<Utc>) -> String {
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{:06}", prefix, at.format("%Y%m%d_%H%M%S_%6f"), seq)
    }

    /// Next raw id for a prefix at the current instant
    pub fn next_raw(&self, prefix: &str) -> String {
        self.next_at(prefix, Utc::now())
    }

    /// Next trace id for a node
    pub fn trace_id(&self, node_name: &str) -> TraceId {
        TraceId(self.next_raw(node_name))
    }

    /// Next step id for a node
    pub fn step_id(&self, node_name: &str) -> StepId {
        StepId(self.next_raw(node_name))
    }

    /// Next sequence id
    pub fn sequence_id(&self) -> SequenceId {
        SequenceId(self.next_raw("seq"))
    }
}
