//! Retained element tree - the host-agnostic output surface.
//!
//! A renderer materializes these; the reconciler mutates them through the
//! three insertion modes described on [`ElementRef`].

mod retained;

pub use retained::{ElementRef, RetainedElement, HOLDER_TAG};

use crate::types::Props;

/// The element constructor compiled component bodies call.
pub fn create_element(tag: impl Into<String>, props: Props) -> ElementRef {
    ElementRef::new(tag, props)
}
