//! Hook update queue - pending state transitions per hook.
//!
//! Dispatches append [`Update`]s; the next render folds them into the base
//! state **in enqueue order**, applying only the updates whose lane is part of
//! the pass and retaining the rest for a later pass.
//!
//! The queue is shared between a fiber and its alternate through an `Rc`, so
//! a dispatch created against one generation is visible to the next.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::scheduler::Lanes;
use crate::types::Value;

// =============================================================================
// Updates
// =============================================================================

/// A single pending state transition.
#[derive(Clone)]
pub enum UpdateAction {
    /// Set the state to this value.
    Replace(Value),
    /// Derive the next state from the previous one.
    Transform(Rc<dyn Fn(&Value) -> Value>),
}

impl UpdateAction {
    fn apply(&self, state: &Value) -> Value {
        match self {
            Self::Replace(v) => v.clone(),
            Self::Transform(f) => f(state),
        }
    }
}

impl fmt::Debug for UpdateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(v) => f.debug_tuple("Replace").field(v).finish(),
            Self::Transform(_) => f.write_str("Transform"),
        }
    }
}

/// An update tagged with the lane of the dispatch that produced it.
#[derive(Clone, Debug)]
pub struct Update {
    pub lane: Lanes,
    pub action: UpdateAction,
}

// =============================================================================
// Queue
// =============================================================================

/// Queue storage shared across fiber generations.
#[derive(Default)]
pub struct SharedQueue {
    pending: VecDeque<Update>,
    base_state: Value,
}

impl SharedQueue {
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Handle to a hook's update queue. Clones share storage.
#[derive(Clone, Default)]
pub struct UpdateQueue {
    shared: Rc<RefCell<SharedQueue>>,
}

impl UpdateQueue {
    pub fn new(base_state: Value) -> Self {
        Self {
            shared: Rc::new(RefCell::new(SharedQueue {
                pending: VecDeque::new(),
                base_state,
            })),
        }
    }

    /// The shared storage, handed to dispatch closures.
    pub fn shared(&self) -> Rc<RefCell<SharedQueue>> {
        self.shared.clone()
    }

    /// Append an update. O(1); ordering is enqueue order.
    pub fn enqueue(&self, update: Update) {
        self.shared.borrow_mut().pending.push_back(update);
    }

    pub fn enqueue_into(shared: &Rc<RefCell<SharedQueue>>, update: Update) {
        shared.borrow_mut().pending.push_back(update);
    }

    pub fn has_pending(&self) -> bool {
        !self.shared.borrow().pending.is_empty()
    }

    /// Fold pending updates whose lane is in `render_lanes` into the base
    /// state, in enqueue order. Skipped updates stay queued in their original
    /// order for a later pass; the base state is NOT advanced past them, so a
    /// deferred transform still sees every earlier update's result when it
    /// eventually runs.
    pub fn process(&self, render_lanes: Lanes) -> Value {
        let mut shared = self.shared.borrow_mut();
        let mut state = shared.base_state.clone();
        let mut deferred = VecDeque::new();

        while let Some(update) = shared.pending.pop_front() {
            if render_lanes.contains(update.lane) {
                state = update.action.apply(&state);
            } else {
                deferred.push_back(update);
            }
        }

        shared.pending = deferred;
        state
    }

    /// Record the committed state as the fold base of the next pass.
    pub fn set_base(&self, state: Value) {
        self.shared.borrow_mut().base_state = state;
    }

    pub fn base_state(&self) -> Value {
        self.shared.borrow().base_state.clone()
    }
}

impl fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.borrow();
        f.debug_struct("UpdateQueue")
            .field("pending", &shared.pending.len())
            .field("base_state", &shared.base_state)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
