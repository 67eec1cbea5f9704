//! Interpreter errors
//!
//! Every variant is fatal: a run stops at the first one.

use thiserror::Error;

/// Result type for interpreter runs
pub type VmResult<T> = Result<T, VmError>;

fn mismatch_text(reported: &bool) -> &'static str {
    if *reported {
        "expected success, injector reported failure"
    } else {
        "expected failure, injector reported success"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// The allocation-failure signal disagrees with what the operation
    /// guaranteed
    #[error("{op}: {} ({operands})", mismatch_text(.reported))]
    FailureMismatch {
        op: &'static str,
        operands: String,
        reported: bool,
    },
    /// A node register holds a handle to freed memory
    #[error("{op}: node register {slot} holds a freed node")]
    DanglingHandle { op: &'static str, slot: usize },
    /// Nodes or namespaces survived the final drain
    #[error("{nodes} nodes and {namespaces} namespaces leaked")]
    Leak { nodes: usize, namespaces: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message() {
        let err = VmError::FailureMismatch {
            op: "parent",
            operands: "n0=-".into(),
            reported: true,
        };
        assert_eq!(err.to_string(), "parent: expected success, injector reported failure (n0=-)");
    }

    #[test]
    fn test_leak_message() {
        let err = VmError::Leak { nodes: 2, namespaces: 0 };
        assert_eq!(err.to_string(), "2 nodes and 0 namespaces leaked");
    }
}
