//! # Dispatcher
//!
//! Owns the operator pool, the wait queue and the call-to-operator
//! assignments, and applies the routing transitions:
//!
//! ```text
//!              submit_call            answer
//!  Waiting ───────────────► Ringing ─────────► Busy
//!     ▲                        │                 │
//!     │        reject          │     hangup      │
//!     └────────────────────────┘        │        │
//!                                       ▼        ▼
//!                                 operator freed, queue drained
//! ```
//!
//! Every operation runs to completion on `&mut self`, including the queue
//! drain it may trigger, and returns the ordered [`Outcome`]s it produced.
//! Callers that share a dispatcher between sessions hold an exclusive lock
//! for the duration of one call.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, error, info, warn};

use super::outcome::{CallsInfo, OperatorsInfo, Outcome, Update};
use super::pool;
use super::types::{CallId, Operator, OperatorId, OperatorState};
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, InvariantViolation};

/// What an `info` query reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoScope {
    Operators,
    Calls,
}

impl FromStr for InfoScope {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operators" | "ops" => Ok(InfoScope::Operators),
            "calls" => Ok(InfoScope::Calls),
            other => Err(DispatchError::InvalidInfoScope(other.to_string())),
        }
    }
}

/// Call routing state machine
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Operator records (id -> operator)
    operators: HashMap<OperatorId, Operator>,

    /// Available operators, longest-available first
    available: VecDeque<OperatorId>,

    /// Ringing operators in the order they started ringing
    ringing: IndexSet<OperatorId>,

    /// Busy operators in the order they answered
    busy: IndexSet<OperatorId>,

    /// Calls without an operator, oldest first
    wait_queue: VecDeque<CallId>,

    /// Assigned calls (call_id -> operator_id) in assignment order
    assigned: IndexMap<CallId, OperatorId>,
}

impl Dispatcher {
    /// Create a dispatcher with `pool_size` operators named `A`, `B`, ...
    pub fn new(pool_size: usize) -> Self {
        let operators = pool::generate_operators(pool_size);
        let available = operators.iter().map(|op| op.id.clone()).collect();
        let operators = operators
            .into_iter()
            .map(|op| (op.id.clone(), op))
            .collect();

        Self {
            operators,
            available,
            ringing: IndexSet::new(),
            busy: IndexSet::new(),
            wait_queue: VecDeque::new(),
            assigned: IndexMap::new(),
        }
    }

    /// Create a dispatcher sized by the configuration, clamping oversized pools
    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self::with_requested_size(config.operators, config)
    }

    /// Create a dispatcher for a requested pool size, clamping it against `config`
    pub fn with_requested_size(requested: usize, config: &DispatcherConfig) -> Self {
        Self::new(pool::resolve_pool_size(requested, config))
    }

    /// Number of operators in the pool
    pub fn pool_size(&self) -> usize {
        self.operators.len()
    }

    /// Look up an operator record
    pub fn operator(&self, id: &OperatorId) -> Option<&Operator> {
        self.operators.get(id)
    }

    /// Calls waiting for an operator, oldest first
    pub fn waiting_calls(&self) -> impl Iterator<Item = &CallId> {
        self.wait_queue.iter()
    }

    /// Operator currently bound to `call`, if any
    pub fn assigned_operator(&self, call: &CallId) -> Option<&OperatorId> {
        self.assigned.get(call)
    }

    /// Accept a new call and offer it to the longest-available operator.
    ///
    /// The call is queued when no operator is available.
    pub fn submit_call(&mut self, call: CallId) -> Vec<Outcome> {
        if self.wait_queue.contains(&call) || self.assigned.contains_key(&call) {
            warn!("📞 Call {} already exists, ignoring", call);
            return vec![DispatchError::DuplicateCall(call).into()];
        }

        info!("📞 Call {} received", call);
        let mut out = vec![Update::CallReceived { call: call.clone() }.into()];
        self.place_call(call, &mut out);
        out
    }

    /// Operator picks up the call that is ringing for it
    pub fn answer(&mut self, operator: &OperatorId) -> Vec<Outcome> {
        let call = match self.ringing_call(operator) {
            Ok(call) => call,
            Err(out) => return out,
        };

        self.ringing.shift_remove(operator);
        self.busy.insert(operator.clone());
        if let Some(op) = self.operators.get_mut(operator) {
            op.state = OperatorState::Busy;
        }

        info!("✅ Call {} answered by operator {}", call, operator);
        vec![Update::CallAnswered {
            call,
            operator: operator.clone(),
        }
        .into()]
    }

    /// Operator declines the call that is ringing for it.
    ///
    /// The call goes back to the tail of the wait queue and the freed operator
    /// takes part in the drain like any other available operator.
    pub fn reject(&mut self, operator: &OperatorId) -> Vec<Outcome> {
        let call = match self.ringing_call(operator) {
            Ok(call) => call,
            Err(out) => return out,
        };

        info!("↩️ Call {} rejected by operator {}", call, operator);
        let mut out = vec![Update::CallRejected {
            call: call.clone(),
            operator: operator.clone(),
        }
        .into()];

        self.release_operator(operator);
        self.wait_queue.push_back(call);
        self.drain_queue(&mut out);
        out
    }

    /// Caller hangs up, whether waiting, ringing or connected
    pub fn hangup(&mut self, call: &CallId) -> Vec<Outcome> {
        if let Some(position) = self.wait_queue.iter().position(|c| c == call) {
            self.wait_queue.remove(position);
            info!("📴 Call {} missed while waiting", call);
            return vec![Update::CallMissed { call: call.clone() }.into()];
        }

        let Some(operator) = self.assigned.get(call).cloned() else {
            debug!("Hangup for unknown call {}", call);
            return vec![DispatchError::UnknownCall(call.clone()).into()];
        };

        let state = self
            .operators
            .get(&operator)
            .map(|op| op.state)
            .unwrap_or(OperatorState::Available);

        let update = match state {
            OperatorState::Busy => {
                info!("📴 Call {} finished, operator {} available", call, operator);
                Update::CallFinished {
                    call: call.clone(),
                    operator: operator.clone(),
                }
            }
            OperatorState::Ringing => {
                info!("📴 Call {} missed while ringing operator {}", call, operator);
                Update::CallMissed { call: call.clone() }
            }
            OperatorState::Available => {
                error!(
                    "Call {} assigned to operator {} which is available",
                    call, operator
                );
                Update::CallMissed { call: call.clone() }
            }
        };

        let mut out = vec![update.into()];
        self.free_operator(&operator, &mut out);
        out
    }

    /// Report on operators or calls; `scope` is `operators` (or `ops`) or `calls`
    pub fn info(&self, scope: &str) -> Vec<Outcome> {
        match scope.parse::<InfoScope>() {
            Ok(scope) => vec![self.info_scope(scope).into()],
            Err(err) => vec![err.into()],
        }
    }

    /// Typed form of [`Dispatcher::info`]
    pub fn info_scope(&self, scope: InfoScope) -> Update {
        match scope {
            InfoScope::Operators => Update::Operators(self.operators_info()),
            InfoScope::Calls => Update::Calls(self.calls_info()),
        }
    }

    pub fn operators_info(&self) -> OperatorsInfo {
        OperatorsInfo {
            available: self.available.iter().cloned().collect(),
            ringing: self.ringing.iter().cloned().collect(),
            busy: self.busy.iter().cloned().collect(),
        }
    }

    pub fn calls_info(&self) -> CallsInfo {
        CallsInfo {
            waiting: self.wait_queue.iter().cloned().collect(),
            assigned: self.assigned.keys().cloned().collect(),
        }
    }

    /// Offer `call` to the longest-available operator or queue it.
    ///
    /// Emits no "received" update; the queue drain re-offers through here.
    fn place_call(&mut self, call: CallId, out: &mut Vec<Outcome>) {
        let Some(operator) = self.available.pop_front() else {
            info!("⏳ Call {} waiting in queue (depth {})", call, self.wait_queue.len() + 1);
            self.wait_queue.push_back(call.clone());
            out.push(Update::CallWaiting { call }.into());
            return;
        };

        if let Some(op) = self.operators.get_mut(&operator) {
            op.state = OperatorState::Ringing;
            op.assigned_call = Some(call.clone());
        }
        self.ringing.insert(operator.clone());
        self.assigned.insert(call.clone(), operator.clone());

        info!("🔔 Call {} ringing for operator {}", call, operator);
        out.push(Update::CallRinging { call, operator }.into());
    }

    /// Call bound to a ringing operator.
    ///
    /// On failure returns the outcomes to report instead. A ringing operator
    /// with no call is put back into the available pool.
    fn ringing_call(&mut self, operator: &OperatorId) -> Result<CallId, Vec<Outcome>> {
        if !self.ringing.contains(operator) {
            debug!("Operator {} is not ringing", operator);
            return Err(vec![DispatchError::OperatorNotRinging(operator.clone()).into()]);
        }

        let call = self
            .operators
            .get(operator)
            .and_then(|op| op.assigned_call.clone());

        match call {
            Some(call) => Ok(call),
            None => {
                warn!("⚠️ Operator {} ringing without a call, resetting", operator);
                let mut out = vec![DispatchError::CorruptRingingState(operator.clone()).into()];
                self.release_operator(operator);
                out.push(
                    Update::OperatorRecovered {
                        operator: operator.clone(),
                    }
                    .into(),
                );
                self.drain_queue(&mut out);
                Err(out)
            }
        }
    }

    /// Release the operator and hand it the head of the wait queue if any
    fn free_operator(&mut self, operator: &OperatorId, out: &mut Vec<Outcome>) {
        self.release_operator(operator);
        self.drain_queue(out);
    }

    /// Unbind the operator's call and return it to the tail of the available pool
    fn release_operator(&mut self, operator: &OperatorId) {
        let Some(op) = self.operators.get_mut(operator) else {
            error!("Cannot free unknown operator {}", operator);
            return;
        };

        if let Some(call) = op.assigned_call.take() {
            self.assigned.shift_remove(&call);
        }
        op.state = OperatorState::Available;

        self.ringing.shift_remove(operator);
        self.busy.shift_remove(operator);
        if !self.available.contains(operator) {
            self.available.push_back(operator.clone());
        }
        debug!("Operator {} available", operator);
    }

    /// Re-offer waiting calls, oldest first, while operators are available
    fn drain_queue(&mut self, out: &mut Vec<Outcome>) {
        while !self.available.is_empty() {
            let Some(call) = self.wait_queue.pop_front() else {
                break;
            };
            debug!("📤 Dequeued call {} (remaining: {})", call, self.wait_queue.len());
            self.place_call(call, out);
        }
    }

    /// Verify the bookkeeping invariants, reporting the first violation found
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let violation = |msg: String| Err(InvariantViolation(msg));

        for (i, call) in self.wait_queue.iter().enumerate() {
            if self.assigned.contains_key(call) {
                return violation(format!("call {} is both waiting and assigned", call));
            }
            if self.wait_queue.iter().skip(i + 1).any(|c| c == call) {
                return violation(format!("call {} queued twice", call));
            }
        }

        for (id, op) in &self.operators {
            let in_available = self.available.iter().filter(|a| *a == id).count();
            let in_ringing = usize::from(self.ringing.contains(id));
            let in_busy = usize::from(self.busy.contains(id));
            if in_available + in_ringing + in_busy != 1 {
                return violation(format!(
                    "operator {} in {} pools",
                    id,
                    in_available + in_ringing + in_busy
                ));
            }

            let expected = if in_available == 1 {
                OperatorState::Available
            } else if in_ringing == 1 {
                OperatorState::Ringing
            } else {
                OperatorState::Busy
            };
            if op.state != expected {
                return violation(format!(
                    "operator {} is {} but pooled as {}",
                    id, op.state, expected
                ));
            }

            match (op.state, &op.assigned_call) {
                (OperatorState::Available, Some(call)) => {
                    return violation(format!("available operator {} holds call {}", id, call));
                }
                (OperatorState::Ringing | OperatorState::Busy, None) => {
                    return violation(format!("{} operator {} holds no call", op.state, id));
                }
                (_, Some(call)) if self.assigned.get(call) != Some(id) => {
                    return violation(format!(
                        "operator {} holds call {} not mapped back to it",
                        id, call
                    ));
                }
                _ => {}
            }
        }

        let pooled = self.available.len() + self.ringing.len() + self.busy.len();
        if pooled != self.operators.len() {
            return violation(format!(
                "{} pooled ids for {} operators",
                pooled,
                self.operators.len()
            ));
        }

        for (call, operator) in &self.assigned {
            let bound = self
                .operators
                .get(operator)
                .and_then(|op| op.assigned_call.as_ref());
            if bound != Some(call) {
                return violation(format!(
                    "call {} mapped to operator {} which does not hold it",
                    call, operator
                ));
            }
        }

        Ok(())
    }

    /// Put an available operator into the ringing pool with no call bound
    #[cfg(test)]
    pub(crate) fn force_ringing_without_call(&mut self, operator: &OperatorId) {
        if let Some(position) = self.available.iter().position(|a| a == operator) {
            self.available.remove(position);
        }
        if let Some(op) = self.operators.get_mut(operator) {
            op.state = OperatorState::Ringing;
            op.assigned_call = None;
        }
        self.ringing.insert(operator.clone());
    }
}
