//! # Switchboard Call Engine
//!
//! Call-center dispatching: incoming calls are offered to available
//! operators, queued when none is free, and moved through answer, reject
//! and hangup transitions.
//!
//! ## Features
//!
//! - **Dispatcher**: the routing state machine with FIFO operator and wait queues
//! - **Protocol**: command decoding and newline-delimited JSON frames
//! - **Server**: TCP sessions sharing one dispatcher behind a lock
//! - **Console**: a local shell over the same command set
//!
//! ## Architecture
//!
//! - [`dispatcher`]: operator pool, wait queue, call assignment
//! - [`protocol`]: `Command` decoding and wire messages
//! - [`server`]: session server and broadcast fan-out
//! - [`console`]: local interactive shell
//! - [`config`]: configuration sections
//! - [`logging`]: `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use switchboard_call_engine::prelude::*;
//!
//! let mut dispatcher = Dispatcher::new(1);
//! dispatcher.submit_call(CallId::from("c1"));
//! dispatcher.submit_call(CallId::from("c2"));
//! dispatcher.answer(&OperatorId::from("A"));
//!
//! let out = dispatcher.hangup(&CallId::from("c1"));
//! assert_eq!(out[1].message(), "call c2 ringing for operator A");
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod logging;

// Routing core
pub mod dispatcher;

// External interfaces
pub mod console;
pub mod protocol;
pub mod server;

// Re-exports for convenience
pub use config::CallCenterConfig;
pub use dispatcher::Dispatcher;
pub use error::{CallCenterError, DispatchError, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{CallCenterConfig, DispatcherConfig, LogConfig, ServerConfig};
    pub use crate::dispatcher::{
        CallId, CallsInfo, Dispatcher, InfoScope, Operator, OperatorId, OperatorState,
        OperatorsInfo, Outcome, Update,
    };
    pub use crate::error::{CallCenterError, DispatchError, InvariantViolation, Result};
    pub use crate::protocol::{Command, CommandRequest, MessageKind, ServerMessage};
    pub use crate::server::{CallCenterServer, ServerHandle, SharedDispatcher};
}
