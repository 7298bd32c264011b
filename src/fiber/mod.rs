//! Fiber tree - unit-of-work nodes, their arena, and hook update queues.
//!
//! A fiber is one node of the reconciler's internal work tree. Fibers live in
//! a [`FiberArena`] and point at each other through [`FiberId`] indices
//! (parent / child / sibling / alternate), which keeps the double-buffered
//! tree free of reference cycles.

mod arena;
mod node;
mod update_queue;

pub use arena::{FiberArena, FiberId};
pub use node::{EffectFlags, FiberNode, FiberTag, FiberType, Hook, StateNode};
pub use update_queue::{SharedQueue, Update, UpdateAction, UpdateQueue};
