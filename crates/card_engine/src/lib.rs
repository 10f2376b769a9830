//! Card command-execution engine.
//!
//! Cards declare behavior as data: action descriptors, value expressions, and small handler
//! programs. The engine resolves those declarations against layered scoped state and a selector
//! registry, dispatches domain actions to an injected store, patches card-local state, and hands
//! navigation and desktop commands back to the host as intent values.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod expr;
pub mod program;
pub mod scoped_state;
pub mod selectors;
pub mod stack;

pub use descriptor::{ActionDescriptor, CardCommand, DomainAction, DomainActionDescriptor};
pub use engine::{
    CardBinding, CardEngine, CardIntent, DomainStore, EngineConfig, ExecutionReport,
    ExecutionScope, NavIntent, NavOp, NotFoundReason,
};
pub use error::EngineError;
pub use expr::{ContextPath, ContextRoot, ValueExpr};
pub use program::{Condition, HandlerProgram, Instruction};
pub use scoped_state::{CardScopeKey, CardStateStore, ScopeLayers, StateMap};
pub use selectors::{SelectorContext, SelectorFn, SelectorRegistry};
pub use stack::{CardDefinition, CardKind, Stack};
