use thiserror::Error;

use crate::dispatcher::{CallId, OperatorId};

/// Rejections produced by the dispatcher.
///
/// These never escape as `Err`; they are carried inside
/// [`Outcome::Error`](crate::dispatcher::Outcome) so the caller can render
/// them next to any updates emitted by the same command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Call id is already waiting or assigned
    #[error("call {0} already exists")]
    DuplicateCall(CallId),

    /// Hangup for a call that is neither waiting nor assigned
    #[error("no such call being handled")]
    UnknownCall(CallId),

    /// Answer or reject for an operator that is not ringing
    #[error("operator {0} not in ringing state")]
    OperatorNotRinging(OperatorId),

    /// Operator was ringing with no call bound to it
    #[error("operator {0} in ringing state but has no call")]
    CorruptRingingState(OperatorId),

    /// Info requested for something other than operators or calls
    #[error("invalid info object {0}")]
    InvalidInfoScope(String),
}

/// Call center errors outside the dispatcher core
#[derive(Error, Debug)]
pub enum CallCenterError {
    /// Socket and stream errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding or decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command could not be decoded into a verb and id
    #[error("{0}")]
    MalformedCommand(String),
}

impl CallCenterError {
    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new MalformedCommand error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedCommand(msg.into())
    }
}

/// Result type for call center operations
pub type Result<T> = std::result::Result<T, CallCenterError>;

/// Dispatcher bookkeeping is inconsistent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invariant violated: {0}")]
pub struct InvariantViolation(pub String);
