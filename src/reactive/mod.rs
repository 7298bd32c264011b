//! Reactive primitives - cells and dependency-array effects.
//!
//! A [`ReactiveCell`] is the mutable, dependency-tracked value box backing
//! component state. The [`EffectRegistry`] holds per-component effect records
//! whose explicit dependency arrays decide re-execution when cells are
//! written.

mod cell;
mod effects;

pub use cell::{CellId, CellKind, ReactiveCell};
pub use effects::{EffectId, EffectRegistry};
