//! Keyed list reconciliation over a retained element.
//!
//! Rebuilds a parent's children from a source collection, tagging each child
//! with an identity key so fiber reconciliation matches items across renders
//! by key rather than position. Descriptors without an explicit key fall
//! back to their index.

use crate::element::ElementRef;
use crate::error::RuntimeError;
use crate::reactive::ReactiveCell;
use crate::types::{ChildNode, ComponentDescriptor, Key, Value};

/// Replace `parent`'s children with one keyed descriptor per item.
pub fn reconcile_list(
    parent: &ElementRef,
    items: &[Value],
    render: impl Fn(&Value, usize) -> ComponentDescriptor,
) {
    let children = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let descriptor = render(item, i);
            let descriptor = if descriptor.key.is_none() {
                descriptor.with_key(Key::Index(i))
            } else {
                descriptor
            };
            ChildNode::Descriptor(descriptor)
        })
        .collect();
    parent.replace_children(children);
    parent.mark_list();
}

/// [`reconcile_list`] reading its items from a struct cell holding a list.
pub fn reconcile_list_cell(
    parent: &ElementRef,
    source: &ReactiveCell,
    render: impl Fn(&Value, usize) -> ComponentDescriptor,
) -> Result<(), RuntimeError> {
    let value = source.read();
    let items = value.as_list()?;
    reconcile_list(parent, items, render);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Props;

    fn item_descriptor(item: &Value, _i: usize) -> ComponentDescriptor {
        ComponentDescriptor::host("text", Props::new().with("label", item.to_string()))
            .with_key(Key::Str(item.to_string()))
    }

    #[test]
    fn test_list_children_carry_keys() {
        let parent = ElementRef::new("list", Props::new());
        reconcile_list(
            &parent,
            &[Value::str("a"), Value::str("b")],
            item_descriptor,
        );
        assert!(parent.is_list());
        assert_eq!(parent.child_count(), 2);

        let Some(ChildNode::Descriptor(first)) = parent.child_at(0) else {
            panic!("descriptor expected");
        };
        assert_eq!(first.key, Some(Key::Str("a".to_string())));
    }

    #[test]
    fn test_unkeyed_items_fall_back_to_index() {
        let parent = ElementRef::new("list", Props::new());
        reconcile_list(&parent, &[Value::Int(10), Value::Int(20)], |item, _| {
            ComponentDescriptor::host("text", Props::new().with("label", item.to_string()))
        });
        let Some(ChildNode::Descriptor(second)) = parent.child_at(1) else {
            panic!("descriptor expected");
        };
        assert_eq!(second.key, Some(Key::Index(1)));
    }

    #[test]
    fn test_rebuild_replaces_previous_children() {
        let parent = ElementRef::new("list", Props::new());
        reconcile_list(&parent, &[Value::str("a")], item_descriptor);
        reconcile_list(&parent, &[Value::str("b"), Value::str("c")], item_descriptor);
        assert_eq!(parent.child_count(), 2);
    }

    #[test]
    fn test_cell_source_must_hold_a_list() {
        let parent = ElementRef::new("list", Props::new());
        let cell = ReactiveCell::new(Value::Int(3));
        assert!(reconcile_list_cell(&parent, &cell, item_descriptor).is_err());

        let cell = ReactiveCell::new(Value::List(vec![Value::str("a")]));
        reconcile_list_cell(&parent, &cell, item_descriptor).unwrap();
        assert_eq!(parent.child_count(), 1);
    }
}
