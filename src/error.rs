//! Runtime error taxonomy.
//!
//! Three caller-visible failure classes plus an internal invariant class:
//! - [`RuntimeError::TypeMismatch`] - a reactive cell written with an
//!   incompatible kind. Fatal to that write; the cell is unchanged.
//! - [`RuntimeError::InvalidCall`] - calling a non-callable cell, or feeding
//!   an operation a value shape it cannot consume.
//! - [`RuntimeError::ScopeError`] - a stateful hook invoked outside an open
//!   render scope. Indicates a compiler or call-order bug; aborts the render.
//! - [`RuntimeError::Internal`] - a work-loop invariant broke. Logged and
//!   surfaced to the host; no retry semantics.

use thiserror::Error;

use crate::reactive::CellKind;

/// Errors surfaced by the reconciler and the reactive layer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A reactive cell's scalar/structured/callable kind never changes after
    /// creation; a write of a mismatched kind fails here.
    #[error("type mismatch: cell holds {expected:?}, write attempted with {found:?}")]
    TypeMismatch { expected: CellKind, found: CellKind },

    /// Calling a non-function cell, or an operation fed an unusable value.
    #[error("invalid call: {0}")]
    InvalidCall(String),

    /// A stateful hook (`use_state`, `effect`) ran outside an active
    /// `begin_component_init` / `end_component` bracket.
    #[error("hook invoked outside an active render scope")]
    ScopeError,

    /// A work-loop invariant was violated. Render passes are expected to be
    /// idempotent, so the host may retry from a fresh schedule if it chooses.
    #[error("work loop invariant violated: {0}")]
    Internal(String),
}
