//! Results returned by dispatcher operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{CallId, OperatorId};
use crate::error::DispatchError;

/// One entry in the ordered result of a dispatcher operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Update(Update),
    Error(DispatchError),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// Human-readable message for the entry
    pub fn message(&self) -> String {
        match self {
            Outcome::Update(update) => update.to_string(),
            Outcome::Error(err) => err.to_string(),
        }
    }
}

impl From<Update> for Outcome {
    fn from(update: Update) -> Self {
        Outcome::Update(update)
    }
}

impl From<DispatchError> for Outcome {
    fn from(err: DispatchError) -> Self {
        Outcome::Error(err)
    }
}

/// Progress events emitted while routing calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    CallReceived { call: CallId },
    CallWaiting { call: CallId },
    CallRinging { call: CallId, operator: OperatorId },
    CallAnswered { call: CallId, operator: OperatorId },
    CallRejected { call: CallId, operator: OperatorId },
    CallMissed { call: CallId },
    CallFinished { call: CallId, operator: OperatorId },
    OperatorRecovered { operator: OperatorId },
    Operators(OperatorsInfo),
    Calls(CallsInfo),
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::CallReceived { call } => write!(f, "call {} received", call),
            Update::CallWaiting { call } => write!(f, "call {} waiting in queue", call),
            Update::CallRinging { call, operator } => {
                write!(f, "call {} ringing for operator {}", call, operator)
            }
            Update::CallAnswered { call, operator } => {
                write!(f, "call {} answered by operator {}", call, operator)
            }
            Update::CallRejected { call, operator } => {
                write!(f, "call {} rejected by operator {}", call, operator)
            }
            Update::CallMissed { call } => write!(f, "call {} missed", call),
            Update::CallFinished { call, operator } => {
                write!(f, "call {} finished and operator {} available", call, operator)
            }
            Update::OperatorRecovered { operator } => {
                write!(f, "operator {} moved back to available", operator)
            }
            Update::Operators(info) => fmt::Display::fmt(info, f),
            Update::Calls(info) => fmt::Display::fmt(info, f),
        }
    }
}

/// Operator ids grouped by state, each in pool order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorsInfo {
    pub available: Vec<OperatorId>,
    pub ringing: Vec<OperatorId>,
    pub busy: Vec<OperatorId>,
}

impl fmt::Display for OperatorsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operators available: [{}] ringing: [{}] busy: [{}]",
            join(&self.available),
            join(&self.ringing),
            join(&self.busy)
        )
    }
}

/// Waiting calls in queue order and assigned calls in assignment order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallsInfo {
    pub waiting: Vec<CallId>,
    pub assigned: Vec<CallId>,
}

impl fmt::Display for CallsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "calls waiting: [{}] assigned: [{}]",
            join(&self.waiting),
            join(&self.assigned)
        )
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_messages() {
        let ringing = Update::CallRinging {
            call: CallId::from("c1"),
            operator: OperatorId::from("A"),
        };
        assert_eq!(ringing.to_string(), "call c1 ringing for operator A");

        let finished = Update::CallFinished {
            call: CallId::from("c1"),
            operator: OperatorId::from("A"),
        };
        assert_eq!(finished.to_string(), "call c1 finished and operator A available");
    }

    #[test]
    fn info_rendering() {
        let info = OperatorsInfo {
            available: vec![OperatorId::from("B"), OperatorId::from("C")],
            ringing: vec![OperatorId::from("A")],
            busy: vec![],
        };
        assert_eq!(
            info.to_string(),
            "operators available: [B, C] ringing: [A] busy: []"
        );
    }

    #[test]
    fn error_outcome_message() {
        let outcome = Outcome::from(DispatchError::UnknownCall(CallId::from("x")));
        assert!(outcome.is_error());
        assert_eq!(outcome.message(), "no such call being handled");
    }
}
