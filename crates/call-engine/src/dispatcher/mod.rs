//! Call routing core.
//!
//! - [`core`]: the [`Dispatcher`] state machine
//! - [`outcome`]: updates and errors returned by each operation
//! - [`pool`]: operator id generation and pool sizing
//! - [`types`]: identifiers and the operator record

pub mod core;
pub mod outcome;
pub mod pool;
pub mod types;

pub use self::core::{Dispatcher, InfoScope};
pub use outcome::{CallsInfo, OperatorsInfo, Outcome, Update};
pub use types::{CallId, Operator, OperatorId, OperatorState};
