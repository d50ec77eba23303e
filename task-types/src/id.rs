//! Typed ID wrappers for tasks, traces, agents, and crews.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up task IDs, trace IDs, agent IDs, etc.
/// These are plain strings underneath — the core doesn't enforce UUID
/// format, it only cares that IDs are stable and comparable.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(TaskId, "Unique identifier for a task.");
typed_id!(TraceId, "Unique identifier for a trace.");
typed_id!(SpanId, "Unique identifier for a trace span.");
typed_id!(SessionId, "Unique identifier for a conversation session.");
typed_id!(AgentId, "Unique identifier for a crew agent.");
