//! Engine error taxonomy.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors raised while registering stacks or executing card actions.
///
/// Unknown selectors and missing records are not errors: they resolve to null or to a
/// not-found binding instead of failing.
pub enum EngineError {
    /// The execution scope names a stack that was never registered.
    #[error("unknown stack `{0}`")]
    UnknownStack(String),
    /// A stack definition is internally inconsistent.
    #[error("invalid stack `{stack_id}`: {reason}")]
    InvalidStack {
        /// Offending stack.
        stack_id: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A `set`/`patch` path is empty or crosses a non-container value.
    #[error("invalid state path `{path}`: {reason}")]
    InvalidPath {
        /// The dotted path as written.
        path: String,
        /// Why it cannot be applied.
        reason: String,
    },
    /// A `patch` value did not resolve to an object.
    #[error("patch value must resolve to an object")]
    PatchNotObject,
    /// A `nav.go` card expression did not resolve to a card id string.
    #[error("navigation target must resolve to a card id, got {0}")]
    InvalidNavigationTarget(String),
    /// A handler program exceeds the configured instruction budget.
    #[error("handler `{handler}` has {count} instructions, budget is {limit}")]
    InstructionBudgetExceeded {
        /// Event handler name.
        handler: String,
        /// Instructions in the program.
        count: usize,
        /// Configured budget.
        limit: usize,
    },
}
