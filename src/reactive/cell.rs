//! Reactive cell - the mutable value box behind component state.
//!
//! The source engine intercepted arbitrary property access on a proxy; here
//! the same contract is an explicit wrapper with `read()` / `write()` /
//! `is_reactive()` over a closed kind variant (scalar / struct / callable).
//!
//! # Kind stability
//!
//! A cell's kind is fixed at creation. Writing a value of a different kind
//! fails with `TypeMismatch` and leaves the cell unchanged.
//!
//! # Structured writes merge
//!
//! Writing a map into a struct cell shallow-merges into the existing shared
//! identity instead of replacing it, so every alias holding the cell observes
//! the update. Keys absent from the incoming map are NOT evicted; callers
//! must not rely on merge removing anything (unspecified behavior carried
//! over from the source engine).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RuntimeError;
use crate::reactive::EffectId;
use crate::types::Value;

/// Unique identifier of a cell, used for dependency sets.
pub type CellId = u64;

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_cell_id() -> CellId {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// Kind
// =============================================================================

/// The fixed kind of a cell, decided by its initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Null, bool, number or string.
    Scalar,
    /// List or map; writes merge into the existing identity.
    Struct,
    /// A function value; invoked through [`ReactiveCell::call`].
    Callable,
}

impl CellKind {
    /// Classify a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::List(_) | Value::Map(_) => Self::Struct,
            Value::Callback(_) => Self::Callable,
            _ => Self::Scalar,
        }
    }
}

// =============================================================================
// Cell
// =============================================================================

struct CellInner {
    value: Value,
    kind: CellKind,
    reactive: bool,
    /// Effect-id keyed notification callbacks. Invoked after a successful
    /// write so dependents can mark themselves for re-execution.
    subscribers: HashMap<EffectId, Rc<dyn Fn()>>,
}

/// A reactive value box. Cheap to clone; clones share the same identity.
#[derive(Clone)]
pub struct ReactiveCell {
    id: CellId,
    inner: Rc<RefCell<CellInner>>,
}

impl ReactiveCell {
    /// Create a dependency-tracked cell.
    pub fn new(initial: Value) -> Self {
        Self::with_reactivity(initial, true)
    }

    /// Create a plain value box that does not participate in tracking
    /// (`is_reactive()` returns false).
    pub fn new_plain(initial: Value) -> Self {
        Self::with_reactivity(initial, false)
    }

    fn with_reactivity(initial: Value, reactive: bool) -> Self {
        let kind = CellKind::of(&initial);
        Self {
            id: next_cell_id(),
            inner: Rc::new(RefCell::new(CellInner {
                value: initial,
                kind,
                reactive,
                subscribers: HashMap::new(),
            })),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn kind(&self) -> CellKind {
        self.inner.borrow().kind
    }

    /// The `_isStateVariable` capability of the source engine.
    pub fn is_reactive(&self) -> bool {
        self.inner.borrow().reactive
    }

    /// Snapshot of the current value.
    pub fn read(&self) -> Value {
        self.inner.borrow().value.clone()
    }

    /// Replace or merge the value.
    ///
    /// Scalar and callable cells replace outright. Struct cells merge: map
    /// entries overwrite shallowly, list contents are swapped wholesale. The
    /// cell identity never changes, so aliases keep observing it.
    pub fn write(&self, value: Value) -> Result<(), RuntimeError> {
        {
            let mut inner = self.inner.borrow_mut();
            let found = CellKind::of(&value);
            if found != inner.kind {
                return Err(RuntimeError::TypeMismatch {
                    expected: inner.kind,
                    found,
                });
            }

            match (&mut inner.value, value) {
                (Value::Map(current), Value::Map(incoming)) => {
                    // Shallow merge; stale keys are not evicted.
                    current.extend(incoming);
                }
                (Value::List(current), Value::List(incoming)) => {
                    *current = incoming;
                }
                (slot, incoming) => *slot = incoming,
            }
        }
        self.notify();
        Ok(())
    }

    /// Invoke a callable cell.
    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        let callback = {
            let inner = self.inner.borrow();
            match &inner.value {
                Value::Callback(cb) => cb.clone(),
                other => {
                    return Err(RuntimeError::InvalidCall(format!(
                        "cell is not a function, holds {other:?}"
                    )));
                }
            }
        };
        Ok(callback.invoke(args))
    }

    /// Register a notification callback under an effect id. Re-subscribing
    /// the same id replaces the callback.
    pub fn subscribe(&self, id: EffectId, notify: impl Fn() + 'static) {
        self.inner
            .borrow_mut()
            .subscribers
            .insert(id, Rc::new(notify));
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, id: EffectId) {
        self.inner.borrow_mut().subscribers.remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Run subscriber callbacks. The borrow is released first so callbacks
    /// may freely touch this cell again.
    fn notify(&self) {
        let callbacks: Vec<Rc<dyn Fn()>> = {
            let inner = self.inner.borrow();
            if !inner.reactive {
                return;
            }
            inner.subscribers.values().cloned().collect()
        };
        for callback in callbacks {
            callback();
        }
    }
}

impl PartialEq for ReactiveCell {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ReactiveCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ReactiveCell")
            .field("id", &self.id)
            .field("kind", &inner.kind)
            .field("value", &inner.value)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Callback;
    use std::cell::Cell;

    #[test]
    fn test_read_write_scalar() {
        let cell = ReactiveCell::new(Value::Int(1));
        assert_eq!(cell.read(), Value::Int(1));
        cell.write(Value::Int(2)).unwrap();
        assert_eq!(cell.read(), Value::Int(2));
    }

    #[test]
    fn test_kind_is_fixed() {
        let cell = ReactiveCell::new(Value::Int(1));
        let err = cell.write(Value::map([("a", Value::Int(1))])).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::TypeMismatch {
                expected: CellKind::Scalar,
                found: CellKind::Struct,
            }
        ));
        // Failed write leaves the cell untouched.
        assert_eq!(cell.read(), Value::Int(1));
    }

    #[test]
    fn test_struct_write_merges_shallowly() {
        let cell = ReactiveCell::new(Value::map([
            ("todo", Value::List(vec![Value::str("a")])),
            ("done", Value::List(vec![])),
        ]));

        cell.write(Value::map([(
            "todo",
            Value::List(vec![Value::str("a"), Value::str("b")]),
        )]))
        .unwrap();

        let value = cell.read();
        assert_eq!(
            value.get("todo"),
            Some(&Value::List(vec![Value::str("a"), Value::str("b")]))
        );
        // Keys absent from the write survive the merge.
        assert_eq!(value.get("done"), Some(&Value::List(vec![])));
    }

    #[test]
    fn test_aliases_observe_writes() {
        let cell = ReactiveCell::new(Value::map([("n", Value::Int(1))]));
        let alias = cell.clone();
        cell.write(Value::map([("n", Value::Int(2))])).unwrap();
        assert_eq!(alias.read().get("n"), Some(&Value::Int(2)));
        assert_eq!(cell, alias);
    }

    #[test]
    fn test_call_non_function_fails() {
        let cell = ReactiveCell::new(Value::Int(7));
        assert!(matches!(
            cell.call(&[]),
            Err(RuntimeError::InvalidCall(_))
        ));
    }

    #[test]
    fn test_call_function_cell() {
        let cell = ReactiveCell::new(Value::Callback(Callback::new(|args| {
            args.first().cloned().unwrap_or(Value::Null)
        })));
        assert_eq!(cell.kind(), CellKind::Callable);
        assert_eq!(cell.call(&[Value::Int(3)]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_subscribers_notified_on_write() {
        let cell = ReactiveCell::new(Value::Int(0));
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        cell.subscribe(1, move || hits_clone.set(hits_clone.get() + 1));

        cell.write(Value::Int(1)).unwrap();
        cell.write(Value::Int(2)).unwrap();
        assert_eq!(hits.get(), 2);

        cell.unsubscribe(1);
        cell.write(Value::Int(3)).unwrap();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_plain_cell_does_not_notify() {
        let cell = ReactiveCell::new_plain(Value::Int(0));
        assert!(!cell.is_reactive());
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        cell.subscribe(1, move || hits_clone.set(hits_clone.get() + 1));
        cell.write(Value::Int(1)).unwrap();
        assert_eq!(hits.get(), 0);
    }
}
