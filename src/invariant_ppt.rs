//! Runtime invariant checks with contract-test support.
//!
//! Production code asserts session invariants through [`assert_invariant!`];
//! every check is recorded per thread so a contract test can prove the
//! check actually ran on the code path it exercised.
//!
//! ```rust,ignore
//! use crabscan::invariant_ppt::*;
//!
//! assert_invariant!(
//!     snapshot.stream.is_some() == snapshot.status.holds_stream(),
//!     STREAM_HELD_IFF_ACTIVE,
//!     "controller"
//! );
//!
//! #[tokio::test]
//! async fn contract_session_state() {
//!     // ... drive the controller ...
//!     contract_test("session state", &[STREAM_HELD_IFF_ACTIVE]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

pub const STREAM_HELD_IFF_ACTIVE: &str = "Stream is held iff status is streaming or scanning";
pub const ERROR_IFF_ERROR_STATUS: &str = "Error is present iff status is error";
pub const FORMATS_NEVER_EMPTY: &str = "Active format set is never empty";
pub const HISTORY_WITHIN_CAP: &str = "History never exceeds its capacity";

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and record that it was checked.
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Panic unless every listed invariant was checked on this thread.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.with(|log| log.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !log.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_invariant_satisfies_contract() {
        clear_invariant_log();
        assert_invariant!(true, FORMATS_NEVER_EMPTY, "test");
        contract_test("formats", &[FORMATS_NEVER_EMPTY]);
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE")]
    fn test_unchecked_invariant_fails_contract() {
        clear_invariant_log();
        contract_test("history", &[HISTORY_WITHIN_CAP]);
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [test]")]
    fn test_violation_panics() {
        assert_invariant!(false, ERROR_IFF_ERROR_STATUS, "test");
    }
}
