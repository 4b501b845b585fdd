//! Strongly-typed ID types for domain entities.
//!
//! All IDs wrap a ULID, so they are unique and sort by creation time. The
//! dependency resolver relies on that ordering to break ties between nodes
//! that become ready at the same time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(ulid).map(Self).map_err(|err| ParseIdError {
                    id_type: stringify!($name),
                    reason: err.to_string(),
                })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }

        impl From<$name> for Ulid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a workflow.
    WorkflowId,
    "wf"
);

define_id!(
    /// Unique identifier for a transform node within a workflow.
    NodeId,
    "node"
);

define_id!(
    /// Unique identifier for a directed edge between two nodes.
    EdgeId,
    "edge"
);

define_id!(
    /// Unique identifier for a dataset held by a dataset store.
    DatasetId,
    "ds"
);

define_id!(
    /// Unique identifier for a single execution of a workflow.
    WorkflowRunId,
    "run"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_type_prefix() {
        assert!(WorkflowId::new().to_string().starts_with("wf_"));
        assert!(NodeId::new().to_string().starts_with("node_"));
        assert!(EdgeId::new().to_string().starts_with("edge_"));
        assert!(DatasetId::new().to_string().starts_with("ds_"));
        assert!(WorkflowRunId::new().to_string().starts_with("run_"));
    }

    #[test]
    fn parse_with_prefix() {
        let id = DatasetId::new();
        let parsed: DatasetId = id.to_string().parse().expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_without_prefix() {
        let ulid = Ulid::new();
        let id: NodeId = ulid.to_string().parse().expect("should parse");
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        let other = WorkflowId::new().to_string();
        let err = other.parse::<NodeId>().unwrap_err();
        assert_eq!(err.id_type, "NodeId");
    }

    #[test]
    fn ids_order_by_underlying_ulid() {
        let earlier = NodeId::from_ulid(Ulid::from_parts(1_000, 7));
        let later = NodeId::from_ulid(Ulid::from_parts(2_000, 1));
        assert!(earlier < later);

        let mut ids = vec![later, earlier];
        ids.sort();
        assert_eq!(ids, vec![earlier, later]);
    }

    #[test]
    fn id_serde_is_transparent() {
        let id = WorkflowRunId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));
        let parsed: WorkflowRunId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, parsed);
    }
}
