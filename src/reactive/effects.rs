//! Effect registry - per-component dependency-array effects.
//!
//! Compiled component bodies register effects with an explicit dependency
//! array. Registration runs the callback (state-dependent children are wired
//! inside effect bodies, so every render executes them); afterwards a cell
//! write marks every effect whose last-run dependency list contains that cell
//! dirty, and `flush_dirty` re-runs the marked callbacks outside a render
//! pass.
//!
//! Records are keyed by `(component instance, ordinal)` so a re-render of the
//! same instance replaces callback and dependencies in place while the
//! [`EffectId`] stays stable.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::trace;

use crate::reactive::ReactiveCell;

/// Stable identifier of one effect record.
pub type EffectId = u64;

static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_effect_id() -> EffectId {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// Records
// =============================================================================

struct EffectRecord {
    id: EffectId,
    deps: SmallVec<[ReactiveCell; 4]>,
    callback: Rc<dyn Fn()>,
    dirty: bool,
}

/// Ordered effect records per component instance.
#[derive(Default)]
pub struct EffectRegistry {
    instances: HashMap<String, Vec<EffectRecord>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) the effect at `ordinal` for `instance`.
    ///
    /// Subscribes the record to each dependency cell and runs the callback.
    /// Takes the registry `Rc` because the cell subscriptions hold a weak
    /// reference back to it.
    pub fn register(
        registry: &Rc<RefCell<Self>>,
        instance: &str,
        ordinal: usize,
        deps: &[ReactiveCell],
        callback: Rc<dyn Fn()>,
    ) -> EffectId {
        let (id, run) = {
            let mut reg = registry.borrow_mut();
            let records = reg.instances.entry(instance.to_string()).or_default();

            let id = if let Some(record) = records.get_mut(ordinal) {
                // Re-registration: drop stale subscriptions, keep the id.
                for dep in &record.deps {
                    dep.unsubscribe(record.id);
                }
                record.deps = deps.iter().cloned().collect();
                record.callback = callback.clone();
                record.dirty = false;
                record.id
            } else {
                let id = next_effect_id();
                records.push(EffectRecord {
                    id,
                    deps: deps.iter().cloned().collect(),
                    callback: callback.clone(),
                    dirty: false,
                });
                id
            };

            let weak: Weak<RefCell<Self>> = Rc::downgrade(registry);
            for dep in deps {
                let weak = weak.clone();
                dep.subscribe(id, move || {
                    if let Some(reg) = weak.upgrade() {
                        reg.borrow_mut().mark_dirty(id);
                    }
                });
            }
            (id, callback)
        };

        // Borrow released: effect bodies may write cells or register nested
        // work without re-entering the registry lock.
        run();
        id
    }

    /// Mark one effect for re-execution.
    pub fn mark_dirty(&mut self, id: EffectId) {
        for records in self.instances.values_mut() {
            if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                record.dirty = true;
                return;
            }
        }
    }

    pub fn is_dirty(&self, id: EffectId) -> bool {
        self.instances
            .values()
            .flatten()
            .any(|r| r.id == id && r.dirty)
    }

    /// Re-run every dirty effect callback once. Returns how many ran.
    pub fn flush_dirty(registry: &Rc<RefCell<Self>>) -> usize {
        let callbacks: Vec<Rc<dyn Fn()>> = {
            let mut reg = registry.borrow_mut();
            reg.instances
                .values_mut()
                .flatten()
                .filter(|r| r.dirty)
                .map(|r| {
                    r.dirty = false;
                    r.callback.clone()
                })
                .collect()
        };
        if !callbacks.is_empty() {
            trace!(count = callbacks.len(), "flushing dirty effects");
        }
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    /// Drop all records of a component instance (Deletion commit path).
    pub fn remove_instance(&mut self, instance: &str) {
        if let Some(records) = self.instances.remove(instance) {
            for record in records {
                for dep in &record.deps {
                    dep.unsubscribe(record.id);
                }
            }
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use std::cell::Cell;

    fn registry() -> Rc<RefCell<EffectRegistry>> {
        Rc::new(RefCell::new(EffectRegistry::new()))
    }

    #[test]
    fn test_registration_runs_callback() {
        let reg = registry();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        EffectRegistry::register(
            &reg,
            "c0",
            0,
            &[],
            Rc::new(move || runs_clone.set(runs_clone.get() + 1)),
        );
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_write_marks_dependent_dirty() {
        let reg = registry();
        let cell = ReactiveCell::new(Value::Int(0));

        let id = EffectRegistry::register(&reg, "c0", 0, &[cell.clone()], Rc::new(|| {}));
        assert!(!reg.borrow().is_dirty(id));

        cell.write(Value::Int(1)).unwrap();
        assert!(reg.borrow().is_dirty(id));
    }

    #[test]
    fn test_flush_reruns_dirty_once() {
        let reg = registry();
        let cell = ReactiveCell::new(Value::Int(0));
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        EffectRegistry::register(
            &reg,
            "c0",
            0,
            &[cell.clone()],
            Rc::new(move || runs_clone.set(runs_clone.get() + 1)),
        );
        assert_eq!(runs.get(), 1);

        cell.write(Value::Int(1)).unwrap();
        assert_eq!(EffectRegistry::flush_dirty(&reg), 1);
        assert_eq!(runs.get(), 2);

        // Nothing dirty left.
        assert_eq!(EffectRegistry::flush_dirty(&reg), 0);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_reregistration_keeps_id_and_replaces_deps() {
        let reg = registry();
        let a = ReactiveCell::new(Value::Int(0));
        let b = ReactiveCell::new(Value::Int(0));

        let id1 = EffectRegistry::register(&reg, "c0", 0, &[a.clone()], Rc::new(|| {}));
        let id2 = EffectRegistry::register(&reg, "c0", 0, &[b.clone()], Rc::new(|| {}));
        assert_eq!(id1, id2);

        // The old dependency no longer marks the record dirty.
        a.write(Value::Int(1)).unwrap();
        assert!(!reg.borrow().is_dirty(id1));
        b.write(Value::Int(1)).unwrap();
        assert!(reg.borrow().is_dirty(id1));
    }

    #[test]
    fn test_remove_instance_unsubscribes() {
        let reg = registry();
        let cell = ReactiveCell::new(Value::Int(0));
        EffectRegistry::register(&reg, "c0", 0, &[cell.clone()], Rc::new(|| {}));
        assert_eq!(cell.subscriber_count(), 1);

        reg.borrow_mut().remove_instance("c0");
        assert_eq!(cell.subscriber_count(), 0);
        assert_eq!(reg.borrow().instance_count(), 0);
    }
}
