//! End-to-end reconciler tests: mount, update, bailout, keyed lists and the
//! commit log, all observed through the retained container tree.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use amara_core::{
    ChildNode, ComponentDescriptor, ComponentFn, Dispatch, EffectFlags, ElementRef, Key, Props,
    ReactiveCell, RenderPolicy, Runtime, RuntimeError, Value,
};

type DispatchSlot = Rc<RefCell<Option<Dispatch>>>;

fn dispatch_slot() -> DispatchSlot {
    Rc::new(RefCell::new(None))
}

fn take_dispatch(slot: &DispatchSlot) -> Dispatch {
    slot.borrow().clone().expect("dispatch not captured")
}

/// A component rendering its integer state into a text element's `content`.
fn counter_component(slot: DispatchSlot) -> ComponentFn {
    Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (value, dispatch) = ctx.use_state(Value::Int(0))?;
        *slot.borrow_mut() = Some(dispatch);
        ctx.end_component();
        Ok(ElementRef::new(
            "text",
            Props::new().with("content", value.to_string()),
        ))
    })
}

fn child_element(container: &ElementRef, index: usize) -> ElementRef {
    match container.child_at(index) {
        Some(ChildNode::Element(el)) => el,
        other => panic!("expected element child at {index}, got {other:?}"),
    }
}

// =============================================================================
// Mount and update
// =============================================================================

#[test]
fn test_mount_renders_into_container() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();
    let container = runtime
        .render(counter_component(slot), Props::new())
        .unwrap();

    assert_eq!(container.child_count(), 1);
    let text = child_element(&container, 0);
    assert_eq!(text.tag(), "text");
    assert_eq!(text.properties().get("content"), Some(&Value::str("0")));
}

#[test]
fn test_dispatches_fold_in_order() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();
    let container = runtime
        .render(counter_component(slot.clone()), Props::new())
        .unwrap();

    let dispatch = take_dispatch(&slot);
    dispatch.update(|v| match v {
        Value::Int(n) => Value::Int(n + 1),
        other => other.clone(),
    });
    dispatch.set(Value::Int(10));
    dispatch.update(|v| match v {
        Value::Int(n) => Value::Int(n + 5),
        other => other.clone(),
    });

    let text = child_element(&container, 0);
    assert_eq!(text.properties().get("content"), Some(&Value::str("15")));
}

#[test]
fn test_element_identity_survives_update() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();
    let container = runtime
        .render(counter_component(slot.clone()), Props::new())
        .unwrap();

    let before = child_element(&container, 0);
    take_dispatch(&slot).set(Value::Int(7));
    let after = child_element(&container, 0);

    // The body built a fresh element, reconciliation kept the mounted one.
    assert!(before.ptr_eq(&after));
    assert_eq!(after.properties().get("content"), Some(&Value::str("7")));
}

#[test]
fn test_identical_rerender_commits_nothing() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();
    runtime
        .render(counter_component(slot.clone()), Props::new())
        .unwrap();
    runtime.take_committed();

    // Same value: the pass runs but produces an empty effect list.
    take_dispatch(&slot).set(Value::Int(0));
    assert!(runtime.take_committed().is_empty());
    assert!(runtime.pending_lanes().is_empty());
}

#[test]
fn test_rejected_write_leaves_state_unchanged() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();
    let container = runtime
        .render(counter_component(slot.clone()), Props::new())
        .unwrap();

    // Int cell, string write: the pass fails, the cell keeps its value, and
    // the next pass renders cleanly from the unchanged state.
    take_dispatch(&slot).set(Value::str("oops"));
    runtime.flush().unwrap();
    let text = child_element(&container, 0);
    assert_eq!(text.properties().get("content"), Some(&Value::str("0")));
}

// =============================================================================
// Hook scope
// =============================================================================

#[test]
fn test_hook_outside_scope_fails() {
    let runtime = Runtime::default();
    let component: ComponentFn = Rc::new(|ctx, _props| {
        // No begin_component_init.
        let (_value, _dispatch) = ctx.use_state(Value::Int(0))?;
        Ok(ElementRef::new("text", Props::new()))
    });
    let err = runtime.render(component, Props::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::ScopeError));
}

#[test]
fn test_unclosed_scope_fails() {
    let runtime = Runtime::default();
    let component: ComponentFn = Rc::new(|ctx, _props| {
        ctx.begin_component_init(None);
        Ok(ElementRef::new("text", Props::new()))
    });
    let err = runtime.render(component, Props::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::ScopeError));
}

#[test]
fn test_explicit_instance_id_is_used() {
    let runtime = Runtime::default();
    let seen = Rc::new(RefCell::new(String::new()));

    let seen_inner = seen.clone();
    let component: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(Some("header"));
        *seen_inner.borrow_mut() = ctx.instance().to_string();
        let (_value, _dispatch) = ctx.use_state(Value::Int(0))?;
        let cell = ctx.state_cell(0).ok_or(RuntimeError::ScopeError)?;
        ctx.effect(&[cell], || {})?;
        ctx.end_component();
        Ok(ElementRef::new("text", Props::new()))
    });

    runtime.render(component, Props::new()).unwrap();
    assert_eq!(seen.borrow().as_str(), "header");
    assert_eq!(runtime.effect_instances(), 1);
}

// =============================================================================
// Static bailout
// =============================================================================

#[test]
fn test_static_child_body_runs_once() {
    let runtime = Runtime::default();
    let runs = Rc::new(Cell::new(0));
    let slot = dispatch_slot();

    let runs_inner = runs.clone();
    let static_child: ComponentFn = Rc::new(move |ctx, _props| {
        runs_inner.set(runs_inner.get() + 1);
        ctx.begin_component_init(None);
        ctx.end_component();
        Ok(ElementRef::new(
            "text",
            Props::new().with("content", "static"),
        ))
    });

    let slot_inner = slot.clone();
    let parent: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (value, dispatch) = ctx.use_state(Value::Int(0))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("component", Props::new());
        el.add_static_child(
            ComponentDescriptor::static_function(static_child.clone(), Props::new())
                .with_id("banner"),
        );
        el.add_text(value.to_string());
        Ok(el)
    });

    let container = runtime.render(parent, Props::new()).unwrap();
    assert_eq!(runs.get(), 1);

    take_dispatch(&slot).set(Value::Int(1));
    assert_eq!(runs.get(), 1);

    // The bailed-out subtree is still materialized next to the updated text.
    let body = child_element(&container, 0);
    let banner = child_element(&body, 0);
    assert_eq!(banner.properties().get("content"), Some(&Value::str("static")));
    assert_eq!(body.child_at(1), Some(ChildNode::text("1")));
}

#[test]
fn test_static_child_with_dependencies_reinvokes() {
    let runtime = Runtime::default();
    let runs = Rc::new(Cell::new(0));
    let slot = dispatch_slot();
    let external = ReactiveCell::new(Value::Int(0));

    let runs_inner = runs.clone();
    let external_inner = external.clone();
    let static_child: ComponentFn = Rc::new(move |ctx, _props| {
        runs_inner.set(runs_inner.get() + 1);
        ctx.begin_component_init(None);
        ctx.effect(&[external_inner.clone()], || {})?;
        ctx.end_component();
        Ok(ElementRef::new("text", Props::new().with("content", "live")))
    });

    let slot_inner = slot.clone();
    let parent: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (value, dispatch) = ctx.use_state(Value::Int(0))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("component", Props::new());
        el.add_static_child(
            ComponentDescriptor::static_function(static_child.clone(), Props::new())
                .with_id("ticker"),
        );
        el.add_text(value.to_string());
        Ok(el)
    });

    runtime.render(parent, Props::new()).unwrap();
    assert_eq!(runs.get(), 1);

    // A cell-dependent static child is not eligible for the bailout: the
    // parent's re-render re-invokes its body.
    take_dispatch(&slot).set(Value::Int(1));
    assert_eq!(runs.get(), 2);
}

// =============================================================================
// Structural changes
// =============================================================================

#[test]
fn test_removed_slot_commits_a_deletion() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();

    let slot_inner = slot.clone();
    let toggle: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (show, dispatch) = ctx.use_state(Value::Bool(true))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("component", Props::new());
        el.add_text("always");
        if show == Value::Bool(true) {
            el.insert_child(
                "detail",
                ChildNode::Descriptor(
                    ComponentDescriptor::host("text", Props::new().with("content", "detail"))
                        .with_id("detail"),
                ),
            );
        }
        Ok(el)
    });

    let container = runtime.render(toggle, Props::new()).unwrap();
    let body = child_element(&container, 0);
    assert_eq!(body.child_count(), 2);
    runtime.take_committed();

    take_dispatch(&slot).set(Value::Bool(false));
    assert_eq!(body.child_count(), 1);
    assert_eq!(body.child_at(0), Some(ChildNode::text("always")));

    let committed = runtime.take_committed();
    let deletions: Vec<_> = committed
        .iter()
        .filter(|e| e.flags.contains(EffectFlags::DELETION))
        .collect();
    assert_eq!(deletions.len(), 1);
    assert_eq!(deletions[0].key, Some(Key::Str("detail".to_string())));

    // Toggling on and off again must not leak fibers.
    let settled = runtime.live_fibers();
    take_dispatch(&slot).set(Value::Bool(true));
    take_dispatch(&slot).set(Value::Bool(false));
    assert_eq!(runtime.live_fibers(), settled);
}

#[test]
fn test_keyed_list_reorders_with_one_placement_one_deletion() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();

    let slot_inner = slot.clone();
    let list: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (items, dispatch) = ctx.use_state(Value::List(vec![
            Value::str("a"),
            Value::str("b"),
            Value::str("c"),
        ]))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("list", Props::new());
        for item in items.as_list()? {
            el.add_child(ChildNode::Descriptor(
                ComponentDescriptor::host("text", Props::new().with("label", item.to_string()))
                    .with_key(Key::Str(item.to_string())),
            ));
        }
        Ok(el)
    });

    let container = runtime.render(list, Props::new()).unwrap();
    let list_el = child_element(&container, 0);
    assert_eq!(list_el.child_count(), 3);
    runtime.take_committed();

    take_dispatch(&slot).set(Value::List(vec![
        Value::str("b"),
        Value::str("c"),
        Value::str("d"),
    ]));

    let labels: Vec<_> = (0..list_el.child_count())
        .map(|i| {
            child_element(&list_el, i)
                .properties()
                .get("label")
                .cloned()
        })
        .collect();
    assert_eq!(
        labels,
        vec![
            Some(Value::str("b")),
            Some(Value::str("c")),
            Some(Value::str("d"))
        ]
    );

    let committed = runtime.take_committed();
    let deletions: Vec<_> = committed
        .iter()
        .filter(|e| e.flags.contains(EffectFlags::DELETION))
        .collect();
    let placements: Vec<_> = committed
        .iter()
        .filter(|e| e.flags.contains(EffectFlags::PLACEMENT))
        .collect();
    assert_eq!(deletions.len(), 1);
    assert_eq!(deletions[0].key, Some(Key::Str("a".to_string())));
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].key, Some(Key::Str("d".to_string())));
    // Deletions land in the log ahead of the subtree's placements.
    assert!(committed[0].flags.contains(EffectFlags::DELETION));
}

#[test]
fn test_pure_reorder_updates_host_order() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();

    let slot_inner = slot.clone();
    let list: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (items, dispatch) =
            ctx.use_state(Value::List(vec![Value::str("a"), Value::str("b")]))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("list", Props::new());
        for item in items.as_list()? {
            el.add_child(ChildNode::Descriptor(
                ComponentDescriptor::host("text", Props::new().with("label", item.to_string()))
                    .with_key(Key::Str(item.to_string())),
            ));
        }
        Ok(el)
    });

    let container = runtime.render(list, Props::new()).unwrap();
    let list_el = child_element(&container, 0);
    runtime.take_committed();

    // Swap with no additions or removals.
    take_dispatch(&slot).set(Value::List(vec![Value::str("b"), Value::str("a")]));

    let labels: Vec<_> = (0..list_el.child_count())
        .map(|i| child_element(&list_el, i).properties().get("label").cloned())
        .collect();
    assert_eq!(labels, vec![Some(Value::str("b")), Some(Value::str("a"))]);

    // The moved child alone carries the placement; nothing is deleted.
    let committed = runtime.take_committed();
    let placements: Vec<_> = committed
        .iter()
        .filter(|e| e.flags.contains(EffectFlags::PLACEMENT))
        .collect();
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].key, Some(Key::Str("a".to_string())));
    assert!(committed
        .iter()
        .all(|e| !e.flags.contains(EffectFlags::DELETION)));
}

#[test]
fn test_keyed_component_state_survives_reorder() {
    let runtime = Runtime::default();
    let list_slot = dispatch_slot();
    let item_slots: Rc<RefCell<HashMap<String, Dispatch>>> =
        Rc::new(RefCell::new(HashMap::new()));

    let item_slots_inner = item_slots.clone();
    let item: ComponentFn = Rc::new(move |ctx, props| {
        ctx.begin_component_init(None);
        let (count, dispatch) = ctx.use_state(Value::Int(0))?;
        ctx.end_component();
        let label = props.get("label").cloned().unwrap_or_default().to_string();
        item_slots_inner.borrow_mut().insert(label.clone(), dispatch);
        Ok(ElementRef::new(
            "item",
            Props::new().with("content", format!("{label}:{count}")),
        ))
    });

    let list_slot_inner = list_slot.clone();
    let item_fn = item.clone();
    let list: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (items, dispatch) = ctx.use_state(Value::List(vec![
            Value::str("a"),
            Value::str("b"),
            Value::str("c"),
        ]))?;
        *list_slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("list", Props::new());
        for item_value in items.as_list()? {
            el.add_child(ChildNode::Descriptor(
                ComponentDescriptor::function(
                    item_fn.clone(),
                    Props::new().with("label", item_value.to_string()),
                )
                .with_key(Key::Str(item_value.to_string())),
            ));
        }
        Ok(el)
    });

    let container = runtime.render(list, Props::new()).unwrap();
    let list_el = child_element(&container, 0);

    // Local state on b, then a reorder dropping a and appending d.
    let b_dispatch = item_slots
        .borrow()
        .get("b")
        .cloned()
        .expect("b dispatch not captured");
    b_dispatch.set(Value::Int(5));
    take_dispatch(&list_slot).set(Value::List(vec![
        Value::str("b"),
        Value::str("c"),
        Value::str("d"),
    ]));

    // Reused keyed components keep their hook state; the fresh mount starts
    // from the initial value.
    let contents: Vec<_> = (0..list_el.child_count())
        .map(|i| {
            child_element(&list_el, i)
                .properties()
                .get("content")
                .cloned()
        })
        .collect();
    assert_eq!(
        contents,
        vec![
            Some(Value::str("b:5")),
            Some(Value::str("c:0")),
            Some(Value::str("d:0"))
        ]
    );
}

#[test]
fn test_duplicate_keys_do_not_leak_fibers() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();

    let slot_inner = slot.clone();
    let dup: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (value, dispatch) = ctx.use_state(Value::Int(0))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("list", Props::new());
        el.add_text(value.to_string());
        for label in ["first", "second"] {
            el.add_child(ChildNode::Descriptor(
                ComponentDescriptor::host("text", Props::new().with("label", label))
                    .with_key(Key::Str("dup".to_string())),
            ));
        }
        Ok(el)
    });

    let container = runtime.render(dup, Props::new()).unwrap();
    let list_el = child_element(&container, 0);
    assert_eq!(list_el.child_count(), 3);

    // The shadowed duplicate falls back to positional identity, so every
    // pass reclaims it instead of stranding its arena slot.
    take_dispatch(&slot).set(Value::Int(1));
    let settled = runtime.live_fibers();
    take_dispatch(&slot).set(Value::Int(2));
    assert_eq!(runtime.live_fibers(), settled);
    assert_eq!(list_el.child_count(), 3);
}

#[test]
fn test_adding_a_todo_places_exactly_one_child() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();

    fn keyed_texts(parent: &ElementRef, items: &[Value]) {
        for item in items {
            parent.add_child(ChildNode::Descriptor(
                ComponentDescriptor::host("text", Props::new().with("label", item.to_string()))
                    .with_key(Key::Str(item.to_string())),
            ));
        }
    }

    let slot_inner = slot.clone();
    let board: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (state, dispatch) = ctx.use_state(Value::map([
            ("todo", Value::List(vec![Value::str("write")])),
            ("done", Value::List(vec![Value::str("ship")])),
        ]))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("component", Props::new());
        let todo_items = state.get("todo").cloned().unwrap_or_default();
        let done_items = state.get("done").cloned().unwrap_or_default();
        let todo = ElementRef::new("list", Props::new()).with_id("todo");
        keyed_texts(&todo, todo_items.as_list()?);
        let done = ElementRef::new("list", Props::new()).with_id("done");
        keyed_texts(&done, done_items.as_list()?);
        el.add_child(ChildNode::Element(todo));
        el.add_child(ChildNode::Element(done));
        Ok(el)
    });

    let container = runtime.render(board, Props::new()).unwrap();
    runtime.take_committed();

    // Struct state merges shallowly: only the todo list is written.
    take_dispatch(&slot).set(Value::map([(
        "todo",
        Value::List(vec![Value::str("write"), Value::str("test")]),
    )]));

    let committed = runtime.take_committed();
    assert_eq!(committed.len(), 1);
    assert!(committed[0].flags.contains(EffectFlags::PLACEMENT));
    assert_eq!(committed[0].key, Some(Key::Str("test".to_string())));

    // The sibling list is not aliased by the write.
    let body = child_element(&container, 0);
    let todo_el = child_element(&body, 0);
    let done_el = child_element(&body, 1);
    assert_eq!(todo_el.child_count(), 2);
    assert_eq!(done_el.child_count(), 1);
    assert_eq!(
        child_element(&done_el, 0).properties().get("label"),
        Some(&Value::str("ship"))
    );
}

// =============================================================================
// Effects
// =============================================================================

#[test]
fn test_effect_runs_per_registration() {
    let runtime = Runtime::default();
    let runs = Rc::new(Cell::new(0));
    let slot = dispatch_slot();

    let runs_inner = runs.clone();
    let slot_inner = slot.clone();
    let component: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (value, dispatch) = ctx.use_state(Value::Int(0))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        let cell = ctx.state_cell(0).ok_or(RuntimeError::ScopeError)?;
        let runs_effect = runs_inner.clone();
        ctx.effect(&[cell], move || {
            runs_effect.set(runs_effect.get() + 1);
        })?;
        ctx.end_component();
        Ok(ElementRef::new(
            "text",
            Props::new().with("content", value.to_string()),
        ))
    });

    runtime.render(component, Props::new()).unwrap();
    assert_eq!(runs.get(), 1);
    assert_eq!(runtime.effect_instances(), 1);

    take_dispatch(&slot).set(Value::Int(1));
    assert_eq!(runs.get(), 2);
}

#[test]
fn test_unmounted_instance_drops_its_effects() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();

    let effectful: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (_value, _dispatch) = ctx.use_state(Value::Int(0))?;
        let cell = ctx.state_cell(0).ok_or(RuntimeError::ScopeError)?;
        ctx.effect(&[cell], || {})?;
        ctx.end_component();
        Ok(ElementRef::new("text", Props::new()))
    });

    let slot_inner = slot.clone();
    let effectful_clone = effectful.clone();
    let parent: ComponentFn = Rc::new(move |ctx, _props| {
        ctx.begin_component_init(None);
        let (show, dispatch) = ctx.use_state(Value::Bool(true))?;
        *slot_inner.borrow_mut() = Some(dispatch);
        ctx.end_component();

        let el = ElementRef::new("component", Props::new());
        el.add_text("head");
        if show == Value::Bool(true) {
            el.insert_child(
                "inner",
                ChildNode::Descriptor(
                    ComponentDescriptor::function(effectful_clone.clone(), Props::new())
                        .with_id("inner"),
                ),
            );
        }
        Ok(el)
    });

    runtime.render(parent, Props::new()).unwrap();
    assert_eq!(runtime.effect_instances(), 1);

    take_dispatch(&slot).set(Value::Bool(false));
    assert_eq!(runtime.effect_instances(), 0);
}

// =============================================================================
// Policies
// =============================================================================

#[test]
fn test_concurrent_policy_reaches_the_same_tree() {
    let runtime = Runtime::new(RenderPolicy::Concurrent);
    let slot = dispatch_slot();
    let container = runtime
        .render(counter_component(slot.clone()), Props::new())
        .unwrap();

    // Resume until the budgeted passes settle.
    let mut guard = 0;
    while runtime.flush().unwrap() {
        guard += 1;
        assert!(guard < 1000, "work loop failed to settle");
    }

    take_dispatch(&slot).set(Value::Int(3));
    while runtime.flush().unwrap() {}

    let text = child_element(&container, 0);
    assert_eq!(text.properties().get("content"), Some(&Value::str("3")));
}

#[test]
fn test_second_mount_is_rejected() {
    let runtime = Runtime::default();
    let slot = dispatch_slot();
    runtime
        .render(counter_component(slot.clone()), Props::new())
        .unwrap();
    let err = runtime
        .render(counter_component(slot), Props::new())
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidCall(_)));
}
