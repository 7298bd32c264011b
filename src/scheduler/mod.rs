//! Priority lanes and scheduling policy.
//!
//! Updates carry a [`WorkPriority`]; the work loop batches them per render
//! pass through [`Lanes`] bitsets and a cooperative time-slicing deadline.

mod lanes;

pub use lanes::{Lanes, WorkPriority, FRAME_BUDGET};
