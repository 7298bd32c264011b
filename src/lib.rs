//! # amara-core
//!
//! Reactive UI runtime core: a fiber reconciler with priority-lane
//! scheduling over a retained, host-agnostic element tree.
//!
//! ## Architecture
//!
//! Compiled component functions run against an explicit [`RenderCtx`] and
//! build [`ElementRef`] trees. The work loop double-buffers a fiber tree over
//! an arena, walks it begin/complete, threads side effects onto a linked
//! effect list, and commits in three passes:
//!
//! ```text
//! dispatch → lanes → begin/complete work loop → effect list → commit → retained tree
//! ```
//!
//! State lives in [`ReactiveCell`]s (explicit read/write wrappers with fixed
//! scalar / struct / callable kinds); dependency-array effects re-run after
//! commit when one of their cells is written.
//!
//! ## Modules
//!
//! - [`types`] - Dynamic values, props, descriptors, child slots
//! - [`reactive`] - Cells and the effect registry
//! - [`element`] - The retained element tree and its insertion modes
//! - [`fiber`] - Fiber nodes, the arena, hook update queues
//! - [`scheduler`] - Priority lanes and the frame budget
//! - [`work_loop`] - Begin/complete traversal, reconciliation, commit
//! - [`runtime`] - The public `Runtime`, render context, dispatch

pub mod element;
pub mod error;
pub mod fiber;
pub mod reactive;
pub mod runtime;
pub mod scheduler;
pub mod types;
pub mod work_loop;

pub use element::{create_element, ElementRef, HOLDER_TAG};
pub use error::RuntimeError;
pub use fiber::{EffectFlags, FiberId, FiberTag, UpdateAction};
pub use reactive::{CellKind, EffectId, ReactiveCell};
pub use runtime::{
    reconcile_list, reconcile_list_cell, Dispatch, RenderCtx, RenderPolicy, Runtime,
};
pub use scheduler::{Lanes, WorkPriority};
pub use types::{
    Callback, ChildNode, ComponentDescriptor, ComponentFn, ComponentKind, Key, Props, Value,
};
pub use work_loop::CommittedEffect;
