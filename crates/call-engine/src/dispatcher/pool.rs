//! Operator pool generation.

use tracing::{info, warn};

use super::types::{Operator, OperatorId};
use crate::config::DispatcherConfig;

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Apply the configured maximum to a requested pool size.
///
/// Requests above `max_operators` fall back to `fallback_operators`.
pub fn resolve_pool_size(requested: usize, config: &DispatcherConfig) -> usize {
    if requested > config.max_operators {
        warn!(
            "Maximum number of operators is {}, requested {}; using {}",
            config.max_operators, requested, config.fallback_operators
        );
        config.fallback_operators
    } else {
        requested
    }
}

/// Identifier for the operator at `index` in pool order.
///
/// `0..26` map to `A..Z`, then `AA`, `AB`, ... in the spreadsheet column style.
pub fn operator_id(index: usize) -> OperatorId {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(ALPHABET[n % ALPHABET.len()]);
        n /= ALPHABET.len();
    }
    letters.reverse();
    OperatorId(letters.into_iter().map(char::from).collect())
}

/// Build `count` available operators in pool order
pub fn generate_operators(count: usize) -> Vec<Operator> {
    info!("Setting number of operators to {}", count);
    (0..count).map(|i| Operator::new(operator_id(i))).collect()
}
