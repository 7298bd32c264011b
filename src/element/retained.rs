//! Retained element - one node of the host-agnostic output tree.
//!
//! `{tag, properties, ordered children, id -> child index}`. Children may mix
//! sub-elements, component descriptors, plain strings and reactive cells.
//!
//! # Insertion modes
//!
//! Three child operations form the optimization surface:
//!
//! - **Static child** (`add_static_child`): appended once under a stable id;
//!   subsequent renders of the parent never recreate it.
//! - **Direct child** (`add_child`): appended without id tracking; used for
//!   children rebuilt fresh because an ancestor's own props changed.
//! - **Inserted child** (`insert_child`): looked up by id; an existing slot
//!   is replaced in place (position preserved), otherwise appended. The only
//!   path that triggers diff-style reuse, reserved for state-dependent
//!   subtrees. `set_child` is the single-slot variant; `remove_child`
//!   deletes the slot, a structural change the next pass commits as a
//!   Deletion.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::types::{ChildNode, ComponentDescriptor, Props, Value};

/// Tag of the single-slot wrapper created by `insert_children`.
pub const HOLDER_TAG: &str = "holder";

// =============================================================================
// RetainedElement
// =============================================================================

/// One retained tree node. Accessed through [`ElementRef`].
pub struct RetainedElement {
    tag: String,
    id: Option<String>,
    properties: Props,
    children: Vec<ChildNode>,
    children_by_id: HashMap<String, usize>,
    /// Set when a keyed list reconciler owns this element's children.
    is_list: bool,
}

impl RetainedElement {
    fn new(tag: impl Into<String>, properties: Props) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            properties,
            children: Vec::new(),
            children_by_id: HashMap::new(),
            is_list: false,
        }
    }

    /// Rebuild the id index from the slots that carry one.
    fn reindex(&mut self) {
        self.children_by_id.clear();
        for (i, child) in self.children.iter().enumerate() {
            if let Some(id) = child.slot_id() {
                self.children_by_id.insert(id, i);
            }
        }
    }
}

// =============================================================================
// ElementRef
// =============================================================================

/// Shared handle to a retained element. Identity is pointer identity: clones
/// observe the same node, equality means "the same node".
#[derive(Clone)]
pub struct ElementRef(Rc<RefCell<RetainedElement>>);

impl ElementRef {
    /// `createElement(tag, props)`.
    pub fn new(tag: impl Into<String>, properties: Props) -> Self {
        Self(Rc::new(RefCell::new(RetainedElement::new(tag, properties))))
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.0.borrow_mut().id = Some(id.into());
        self
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.0.borrow().id.clone()
    }

    pub fn properties(&self) -> Props {
        self.0.borrow().properties.clone()
    }

    /// Replace the attribute set (commit Update path).
    pub fn set_properties(&self, properties: Props) {
        self.0.borrow_mut().properties = properties;
    }

    /// Shallow style merge, the one direct property mutation the runtime
    /// supports between renders.
    pub fn merge_style(&self, style: HashMap<String, Value>) {
        self.0.borrow_mut().properties.merge_style(style);
    }

    pub fn is_list(&self) -> bool {
        self.0.borrow().is_list
    }

    pub fn mark_list(&self) {
        self.0.borrow_mut().is_list = true;
    }

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn children(&self) -> Vec<ChildNode> {
        self.0.borrow().children.clone()
    }

    pub fn child_at(&self, index: usize) -> Option<ChildNode> {
        self.0.borrow().children.get(index).cloned()
    }

    /// Index of the slot registered under `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.0.borrow().children_by_id.get(id).copied()
    }

    /// Append without id tracking.
    pub fn add_child(&self, child: ChildNode) {
        self.0.borrow_mut().children.push(child);
    }

    /// Append a text slot (`addText`).
    pub fn add_text(&self, text: impl Into<String>) {
        self.add_child(ChildNode::Text(text.into()));
    }

    /// Append once under the descriptor's stable id.
    pub fn add_static_child(&self, descriptor: ComponentDescriptor) {
        let mut el = self.0.borrow_mut();
        let index = el.children.len();
        if let Some(id) = descriptor.id.clone() {
            el.children_by_id.insert(id, index);
        }
        el.children.push(ChildNode::Descriptor(descriptor));
    }

    /// Replace the slot registered under `id` in place, or append when the
    /// id is new. Position of an existing slot is preserved.
    pub fn insert_child(&self, id: impl Into<String>, child: ChildNode) {
        let id = id.into();
        let mut el = self.0.borrow_mut();
        match el.children_by_id.get(&id).copied() {
            Some(index) => el.children[index] = child,
            None => {
                let index = el.children.len();
                el.children.push(child);
                el.children_by_id.insert(id, index);
            }
        }
    }

    /// Wrap a batch of descriptors in a single holder slot and append it.
    /// Returns the holder so callers can keep replacing through it.
    pub fn insert_children(&self, children: Vec<ComponentDescriptor>) -> ElementRef {
        let holder = ElementRef::new(HOLDER_TAG, Props::new());
        for child in children {
            holder.add_static_child(child);
        }
        self.add_child(ChildNode::Element(holder.clone()));
        holder
    }

    /// Single-slot variant: the whole children array becomes `[child]`.
    pub fn set_child(&self, child: ChildNode) {
        let mut el = self.0.borrow_mut();
        el.children.clear();
        el.children.push(child);
        el.reindex();
    }

    /// Delete the slot registered under `id`. Returns whether a slot was
    /// removed; the structural change surfaces as a Deletion on the next
    /// pass.
    pub fn remove_child(&self, id: &str) -> bool {
        let mut el = self.0.borrow_mut();
        let Some(index) = el.children_by_id.get(id).copied() else {
            return false;
        };
        el.children.remove(index);
        el.reindex();
        true
    }

    /// Replace the entire children collection (keyed list reconciliation).
    pub fn replace_children(&self, children: Vec<ChildNode>) {
        let mut el = self.0.borrow_mut();
        el.children = children;
        el.reindex();
    }

    /// Drop all children (commit-side rebuild).
    pub fn clear_children(&self) {
        let mut el = self.0.borrow_mut();
        el.children.clear();
        el.children_by_id.clear();
    }

    /// Snapshot of attributes plus children, the pending props of a host
    /// fiber created from this element.
    pub fn snapshot_props(&self) -> Props {
        let el = self.0.borrow();
        let mut props = el.properties.clone();
        props.children = el.children.clone();
        props
    }

    pub fn ptr_eq(&self, other: &ElementRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let el = self.0.borrow();
        f.debug_struct("Element")
            .field("tag", &el.tag)
            .field("children", &el.children.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentDescriptor;

    fn descriptor(id: &str) -> ComponentDescriptor {
        ComponentDescriptor::host("text", Props::new()).with_id(id)
    }

    #[test]
    fn test_insert_child_replaces_in_place() {
        let el = ElementRef::new("component", Props::new());
        el.add_text("first");
        el.insert_child("slot", ChildNode::Descriptor(descriptor("slot")));
        el.add_text("last");
        assert_eq!(el.child_count(), 3);
        assert_eq!(el.position_of("slot"), Some(1));

        // Same id again: count unchanged, position preserved.
        el.insert_child("slot", ChildNode::text("replacement"));
        assert_eq!(el.child_count(), 3);
        assert_eq!(el.child_at(1), Some(ChildNode::text("replacement")));
    }

    #[test]
    fn test_remove_child_removes_exactly_one() {
        let el = ElementRef::new("component", Props::new());
        el.insert_child("a", ChildNode::Descriptor(descriptor("a")));
        el.insert_child("b", ChildNode::Descriptor(descriptor("b")));
        assert_eq!(el.child_count(), 2);

        assert!(el.remove_child("a"));
        assert_eq!(el.child_count(), 1);
        assert_eq!(el.position_of("b"), Some(0));
        assert!(!el.remove_child("a"));
    }

    #[test]
    fn test_static_child_registers_id() {
        let el = ElementRef::new("component", Props::new());
        el.add_static_child(descriptor("stable"));
        assert_eq!(el.position_of("stable"), Some(0));

        // Inserting under the same id replaces the static slot in place.
        el.insert_child("stable", ChildNode::text("replaced"));
        assert_eq!(el.child_count(), 1);
    }

    #[test]
    fn test_insert_children_wraps_in_holder() {
        let el = ElementRef::new("component", Props::new());
        let holder = el.insert_children(vec![descriptor("x"), descriptor("y")]);
        assert_eq!(el.child_count(), 1);
        assert_eq!(holder.tag(), HOLDER_TAG);
        assert_eq!(holder.child_count(), 2);

        let Some(ChildNode::Element(slot)) = el.child_at(0) else {
            panic!("holder slot missing");
        };
        assert!(slot.ptr_eq(&holder));
    }

    #[test]
    fn test_set_child_is_single_slot() {
        let el = ElementRef::new("component", Props::new());
        el.add_text("a");
        el.add_text("b");
        el.set_child(ChildNode::Descriptor(descriptor("only")));
        assert_eq!(el.child_count(), 1);
        assert_eq!(el.position_of("only"), Some(0));
    }

    #[test]
    fn test_identity_is_pointer_identity() {
        let a = ElementRef::new("text", Props::new());
        let b = a.clone();
        let c = ElementRef::new("text", Props::new());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_snapshot_props_carries_children() {
        let el = ElementRef::new("button", Props::new().with("label", "ok"));
        el.add_text("ok");
        let props = el.snapshot_props();
        assert_eq!(props.get("label"), Some(&Value::str("ok")));
        assert_eq!(props.children.len(), 1);
    }
}
