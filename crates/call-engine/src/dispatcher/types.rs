//! Identifier newtypes and the operator record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operator identifier (`A`, `B`, ...), unique within the pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub String);

/// Caller-supplied call identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(OperatorId);
string_id!(CallId);

/// Operator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorState {
    /// Free to take a call
    Available,

    /// Offered a call, waiting for answer or reject
    Ringing,

    /// Handling an answered call
    Busy,
}

impl fmt::Display for OperatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperatorState::Available => "available",
            OperatorState::Ringing => "ringing",
            OperatorState::Busy => "busy",
        };
        f.write_str(s)
    }
}

/// A single operator in the pool.
///
/// `assigned_call` is `None` exactly when `state` is `Available`. The two are
/// kept as separate fields so the dispatcher can detect and repair a ringing
/// operator that lost its call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub id: OperatorId,
    pub state: OperatorState,
    pub assigned_call: Option<CallId>,
}

impl Operator {
    pub fn new(id: OperatorId) -> Self {
        Self {
            id,
            state: OperatorState::Available,
            assigned_call: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_operator_is_available_without_call() {
        let op = Operator::new(OperatorId::from("A"));
        assert_eq!(op.state, OperatorState::Available);
        assert!(op.assigned_call.is_none());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&CallId::from("c1")).unwrap();
        assert_eq!(json, "\"c1\"");
        assert_eq!(OperatorState::Ringing.to_string(), "ringing");
    }
}
