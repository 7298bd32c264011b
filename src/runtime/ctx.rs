//! Render context - the explicit handle component bodies run against.
//!
//! Hooks thread through a `&mut RenderCtx` parameter instead of an implicit
//! "currently rendering fiber" global. The bracketing contract is explicit:
//! a body opens its scope with `begin_component_init`, calls `use_state` /
//! `effect` in a stable order, and closes with `end_component`. Stateful
//! calls outside the bracket fail with [`RuntimeError::ScopeError`], and a
//! body that returns with the scope still open is rejected by the work loop.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::element::ElementRef;
use crate::error::RuntimeError;
use crate::fiber::{FiberId, Hook, UpdateQueue};
use crate::reactive::{CellId, EffectId, EffectRegistry, ReactiveCell};
use crate::runtime::{Dispatch, RuntimeInner, SchedulerShared};
use crate::scheduler::Lanes;
use crate::types::Value;

/// Per-render hook state for one component invocation.
pub struct RenderCtx {
    fiber: FiberId,
    instance: String,
    hooks: Vec<Hook>,
    cursor: usize,
    is_mount: bool,
    scope_open: bool,
    dependencies: HashSet<CellId>,
    effect_ordinal: usize,
    render_lanes: Lanes,
    registry: Rc<RefCell<EffectRegistry>>,
    shared: Rc<RefCell<SchedulerShared>>,
    runtime: Weak<RefCell<RuntimeInner>>,
}

impl RenderCtx {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        fiber: FiberId,
        instance: String,
        hooks: Vec<Hook>,
        render_lanes: Lanes,
        registry: Rc<RefCell<EffectRegistry>>,
        shared: Rc<RefCell<SchedulerShared>>,
        runtime: Weak<RefCell<RuntimeInner>>,
    ) -> Self {
        let is_mount = hooks.is_empty();
        Self {
            fiber,
            instance,
            hooks,
            cursor: 0,
            is_mount,
            scope_open: false,
            dependencies: HashSet::new(),
            effect_ordinal: 0,
            render_lanes,
            registry,
            shared,
            runtime,
        }
    }

    /// Open the stateful scope. First call of every component body.
    ///
    /// An explicit `id` replaces the generated instance id on mount, so
    /// effect records carry an author-chosen name. Updates keep the identity
    /// the instance mounted under.
    pub fn begin_component_init(&mut self, id: Option<&str>) {
        if self.is_mount {
            if let Some(id) = id {
                self.instance = id.to_string();
            }
        }
        self.scope_open = true;
        trace!(instance = %self.instance, mount = self.is_mount, "component scope opened");
    }

    /// Close the stateful scope. Last call before returning the element.
    pub fn end_component(&mut self) {
        self.scope_open = false;
    }

    /// Whether this is the instance's first render.
    pub fn is_mount(&self) -> bool {
        self.is_mount
    }

    /// Stable per-mount instance id.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    // -------------------------------------------------------------------------
    // Hooks
    // -------------------------------------------------------------------------

    /// Declare a state slot.
    ///
    /// On mount the slot is created with `initial` backed by a fresh reactive
    /// cell. On update the slot's pending queue is folded (in enqueue order,
    /// filtered to the pass's lanes) and the result written through the cell,
    /// preserving its identity and merge semantics. Returns the current value
    /// and a [`Dispatch`] for enqueueing updates.
    pub fn use_state(&mut self, initial: Value) -> Result<(Value, Dispatch), RuntimeError> {
        if !self.scope_open {
            return Err(RuntimeError::ScopeError);
        }
        let slot = self.cursor;
        self.cursor += 1;

        let value = if slot < self.hooks.len() {
            let folded = self.hooks[slot].queue.process(self.render_lanes);
            if folded != self.hooks[slot].memoized {
                self.hooks[slot].cell.write(folded)?;
            }
            let memoized = self.hooks[slot].cell.read();
            self.hooks[slot].queue.set_base(memoized.clone());
            self.hooks[slot].memoized = memoized.clone();
            memoized
        } else {
            let cell = ReactiveCell::new(initial.clone());
            self.hooks.push(Hook {
                queue: UpdateQueue::new(initial.clone()),
                cell,
                memoized: initial.clone(),
            });
            initial
        };

        self.dependencies.insert(self.hooks[slot].cell.id());
        Ok((value, self.dispatch_for(slot)))
    }

    /// Register a dependency-array effect.
    ///
    /// The callback runs immediately (state-dependent children are wired
    /// inside effect bodies, so every render executes them) and re-runs after
    /// commit whenever one of `deps` is written.
    pub fn effect(
        &mut self,
        deps: &[ReactiveCell],
        callback: impl Fn() + 'static,
    ) -> Result<EffectId, RuntimeError> {
        if !self.scope_open {
            return Err(RuntimeError::ScopeError);
        }
        let ordinal = self.effect_ordinal;
        self.effect_ordinal += 1;
        for dep in deps {
            self.dependencies.insert(dep.id());
        }
        Ok(EffectRegistry::register(
            &self.registry,
            &self.instance,
            ordinal,
            deps,
            Rc::new(callback),
        ))
    }

    /// The reactive cell behind hook slot `slot`, for effect dependency
    /// arrays. Slots are numbered in `use_state` call order.
    pub fn state_cell(&self, slot: usize) -> Option<ReactiveCell> {
        self.hooks.get(slot).map(|h| h.cell.clone())
    }

    fn dispatch_for(&self, slot: usize) -> Dispatch {
        Dispatch {
            queue: self.hooks[slot].queue.shared(),
            fiber: self.fiber,
            shared: self.shared.clone(),
            runtime: self.runtime.clone(),
        }
    }

    /// Hand the render result back to the work loop. Fails when the body
    /// returned with its scope still open.
    pub(crate) fn finish(
        self,
        rendered: Result<ElementRef, RuntimeError>,
    ) -> Result<(Vec<Hook>, HashSet<CellId>, String, ElementRef), RuntimeError> {
        let element = rendered?;
        if self.scope_open {
            return Err(RuntimeError::ScopeError);
        }
        Ok((self.hooks, self.dependencies, self.instance, element))
    }
}
