//! Runtime - the public entry point tying the pieces together.
//!
//! A [`Runtime`] owns the fiber arena, the effect registry and the scheduler
//! state behind a single `Rc<RefCell<_>>`. Rendering and state dispatches all
//! funnel through [`RuntimeInner::drain`], which claims the scheduler, runs
//! render passes and commits, and keeps re-entrant dispatches (from effect
//! bodies or event handlers firing mid-commit) queued instead of recursing.

mod ctx;
mod list;

pub use ctx::RenderCtx;
pub use list::{reconcile_list, reconcile_list_cell};

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, error};

use crate::element::ElementRef;
use crate::error::RuntimeError;
use crate::fiber::{FiberArena, FiberId, FiberNode, FiberTag, StateNode, Update, UpdateAction};
use crate::fiber::{SharedQueue, UpdateQueue};
use crate::reactive::EffectRegistry;
use crate::scheduler::{Lanes, WorkPriority};
use crate::types::{ChildNode, ComponentDescriptor, ComponentFn, Props, Value};
use crate::work_loop::{CommittedEffect, RenderOutcome};

// =============================================================================
// Policy and scheduler state
// =============================================================================

/// How render passes consume the work budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPolicy {
    /// Render to completion in one pass.
    #[default]
    Sync,
    /// Yield between units of work once the frame budget is spent; the host
    /// resumes through [`Runtime::flush`].
    Concurrent,
}

pub(crate) struct ScheduleRequest {
    pub fiber: FiberId,
    pub priority: WorkPriority,
}

/// Scheduler state shared with dispatch handles. Lives outside `RuntimeInner`
/// so a dispatch fired from inside a render pass can enqueue without touching
/// the runtime borrow.
#[derive(Default)]
pub(crate) struct SchedulerShared {
    pub requests: Vec<ScheduleRequest>,
    /// Set while a drain is running; dispatches seeing it queue and return.
    pub busy: bool,
}

// =============================================================================
// RuntimeInner
// =============================================================================

pub struct RuntimeInner {
    pub(crate) arena: FiberArena,
    /// Current committed root fiber.
    pub(crate) root: Option<FiberId>,
    /// Next unit of work of the in-flight pass.
    pub(crate) wip: Option<FiberId>,
    /// Root of the tree the in-flight pass is building.
    pub(crate) wip_root: Option<FiberId>,
    pub(crate) render_lanes: Lanes,
    pub(crate) policy: RenderPolicy,
    pub(crate) effects: Rc<RefCell<EffectRegistry>>,
    pub(crate) shared: Rc<RefCell<SchedulerShared>>,
    /// Commit log, drained by [`Runtime::take_committed`].
    pub(crate) committed: Vec<CommittedEffect>,
    pub(crate) observer: Option<Rc<dyn Fn(&CommittedEffect)>>,
    pub(crate) instance_counter: u64,
    pub(crate) container: Option<ElementRef>,
    pub(crate) self_weak: Weak<RefCell<RuntimeInner>>,
}

impl RuntimeInner {
    /// Pending lanes across the whole tree, read off the root.
    pub(crate) fn pending_lanes(&self) -> Lanes {
        match self.root {
            Some(root) if self.arena.contains(root) => {
                let node = &self.arena[root];
                node.lanes | node.child_lanes
            }
            _ => Lanes::NONE,
        }
    }

    /// Claim the scheduler and run render passes until nothing is pending
    /// (or, under the concurrent policy, until the budget runs out).
    ///
    /// Re-entrant calls (a dispatch firing while `busy`) return immediately;
    /// the owning drain picks their requests up on its next iteration.
    pub(crate) fn drain(rt: &Rc<RefCell<RuntimeInner>>) -> Result<(), RuntimeError> {
        loop {
            let claimed = {
                let inner = rt.borrow();
                let mut shared = inner.shared.borrow_mut();
                if shared.busy {
                    return Ok(());
                }
                let requests = std::mem::take(&mut shared.requests);
                if requests.is_empty()
                    && inner.wip.is_none()
                    && inner.pending_lanes().is_empty()
                {
                    return Ok(());
                }
                shared.busy = true;
                requests
            };

            let result = {
                let mut inner = rt.borrow_mut();
                for request in claimed {
                    inner.schedule_work(request.fiber, request.priority);
                }
                inner.perform_pending()
            };

            {
                let inner = rt.borrow();
                inner.shared.borrow_mut().busy = false;
            }

            match result {
                Ok(RenderOutcome::Complete) => continue,
                Ok(RenderOutcome::Idle) => return Ok(()),
                // Budget spent; the host resumes through flush().
                Ok(RenderOutcome::Incomplete) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// State updater handed out by `use_state`. Cheap to clone; outlives the
/// render it was created in.
///
/// Calling it enqueues an update on the hook's shared queue and schedules the
/// owning fiber. When no render is in flight the update is processed before
/// `call` returns (sync policy); otherwise it is folded into the running or
/// next pass.
#[derive(Clone)]
pub struct Dispatch {
    pub(crate) queue: Rc<RefCell<SharedQueue>>,
    pub(crate) fiber: FiberId,
    pub(crate) shared: Rc<RefCell<SchedulerShared>>,
    pub(crate) runtime: Weak<RefCell<RuntimeInner>>,
}

impl Dispatch {
    /// Enqueue an update at an explicit priority.
    pub fn call(&self, action: UpdateAction, priority: WorkPriority) {
        UpdateQueue::enqueue_into(
            &self.queue,
            Update {
                lane: priority.lane(),
                action,
            },
        );
        let drain_now = {
            let mut shared = self.shared.borrow_mut();
            shared.requests.push(ScheduleRequest {
                fiber: self.fiber,
                priority,
            });
            !shared.busy
        };
        if drain_now {
            if let Some(rt) = self.runtime.upgrade() {
                if let Err(e) = RuntimeInner::drain(&rt) {
                    error!(error = %e, "dispatch-triggered render failed");
                }
            }
        }
    }

    /// Replace the state at normal priority.
    pub fn set(&self, value: Value) {
        self.call(UpdateAction::Replace(value), WorkPriority::Normal);
    }

    /// Derive the next state from the previous at normal priority.
    pub fn update(&self, f: impl Fn(&Value) -> Value + 'static) {
        self.call(UpdateAction::Transform(Rc::new(f)), WorkPriority::Normal);
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// Handle to a mounted reactive tree.
pub struct Runtime {
    inner: Rc<RefCell<RuntimeInner>>,
}

impl Runtime {
    pub fn new(policy: RenderPolicy) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<RefCell<RuntimeInner>>| {
            RefCell::new(RuntimeInner {
                arena: FiberArena::new(),
                root: None,
                wip: None,
                wip_root: None,
                render_lanes: Lanes::NONE,
                policy,
                effects: Rc::new(RefCell::new(EffectRegistry::new())),
                shared: Rc::new(RefCell::new(SchedulerShared::default())),
                committed: Vec::new(),
                observer: None,
                instance_counter: 0,
                container: None,
                self_weak: weak.clone(),
            })
        });
        Self { inner }
    }

    /// Mount `component` into a fresh container element and render it.
    ///
    /// Under the sync policy the returned container holds the fully rendered
    /// tree; under the concurrent policy call [`Runtime::flush`] until it
    /// reports no remaining work.
    pub fn render(&self, component: ComponentFn, props: Props) -> Result<ElementRef, RuntimeError> {
        let container = {
            let mut inner = self.inner.borrow_mut();
            if inner.root.is_some() {
                return Err(RuntimeError::InvalidCall(
                    "runtime already has a mounted root".to_string(),
                ));
            }
            let container = ElementRef::new("root", Props::new());

            let mut root_props = Props::new();
            root_props
                .children
                .push(ChildNode::Descriptor(ComponentDescriptor::function(
                    component, props,
                )));
            let mut root = FiberNode::new(FiberTag::HostRoot, root_props);
            root.state_node = Some(StateNode::Element(container.clone()));
            let id = inner.arena.alloc(root);
            inner.root = Some(id);
            inner.container = Some(container.clone());
            inner.schedule_work(id, WorkPriority::Normal);
            debug!(root = id.index(), "mounted root");
            container
        };
        RuntimeInner::drain(&self.inner)?;
        Ok(container)
    }

    /// Run pending work. Returns whether work remains (concurrent passes
    /// suspended on the frame budget leave work behind).
    pub fn flush(&self) -> Result<bool, RuntimeError> {
        RuntimeInner::drain(&self.inner)?;
        let inner = self.inner.borrow();
        Ok(inner.wip.is_some() || !inner.pending_lanes().is_empty())
    }

    /// The container element of the mounted tree.
    pub fn container(&self) -> Option<ElementRef> {
        self.inner.borrow().container.clone()
    }

    /// Drain the commit log accumulated since the last call.
    pub fn take_committed(&self) -> Vec<CommittedEffect> {
        std::mem::take(&mut self.inner.borrow_mut().committed)
    }

    /// Observe every committed effect as it lands.
    pub fn set_observer(&self, observer: impl Fn(&CommittedEffect) + 'static) {
        self.inner.borrow_mut().observer = Some(Rc::new(observer));
    }

    /// Lanes still pending across the tree.
    pub fn pending_lanes(&self) -> Lanes {
        self.inner.borrow().pending_lanes()
    }

    /// Live fibers in the arena, for leak assertions.
    pub fn live_fibers(&self) -> usize {
        self.inner.borrow().arena.live_count()
    }

    /// Component instances with registered effects.
    pub fn effect_instances(&self) -> usize {
        self.inner.borrow().effects.borrow().instance_count()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RenderPolicy::Sync)
    }
}
