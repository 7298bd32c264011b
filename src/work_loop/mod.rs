//! Work loop - scheduling, the begin/complete traversal, and time slicing.
//!
//! A render pass double-buffers the fiber tree: `prepare_fresh_stack` builds
//! a work-in-progress root off the committed one, `perform_unit_of_work`
//! walks it depth-first (begin on the way down, complete on the way up), and
//! completion threads every fiber with pending side effects onto a linked
//! effect list consumed by commit. Under the concurrent policy the loop
//! yields between units of work once the frame budget is spent; a unit in
//! progress is never interrupted.

mod begin;
mod commit;
mod reconcile;

pub use commit::CommittedEffect;

use std::time::Instant;

use tracing::{debug, error, trace};

use crate::error::RuntimeError;
use crate::fiber::{FiberId, FiberTag};
use crate::runtime::{RenderPolicy, RuntimeInner};
use crate::scheduler::{Lanes, WorkPriority, FRAME_BUDGET};

/// Result of one drain iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A pass rendered and committed.
    Complete,
    /// The frame budget ran out with work left on the stack.
    Incomplete,
    /// Nothing was pending.
    Idle,
}

impl RuntimeInner {
    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Mark pending work on `fiber` and bubble the lane up the parent chain
    /// (`child_lanes` on every ancestor, mirrored onto alternates so either
    /// generation observes it). Returns the root reached, or `None` for a
    /// stale fiber.
    pub(crate) fn schedule_work(
        &mut self,
        fiber: FiberId,
        priority: WorkPriority,
    ) -> Option<FiberId> {
        if !self.arena.contains(fiber) {
            trace!(fiber = fiber.index(), "dropping schedule on stale fiber");
            return None;
        }
        let lane = priority.lane();
        self.arena[fiber].lanes |= lane;
        if let Some(alt) = self.arena[fiber].alternate {
            if self.arena.contains(alt) {
                self.arena[alt].lanes |= lane;
            }
        }

        let mut node = fiber;
        while let Some(parent) = self.arena[node].parent {
            if !self.arena.contains(parent) {
                return None;
            }
            self.arena[parent].child_lanes |= lane;
            if let Some(alt) = self.arena[parent].alternate {
                if self.arena.contains(alt) {
                    self.arena[alt].child_lanes |= lane;
                }
            }
            node = parent;
        }

        if self.arena[node].tag == FiberTag::HostRoot {
            trace!(fiber = fiber.index(), ?lane, "scheduled work");
            Some(node)
        } else {
            None
        }
    }

    /// Lanes the next pass will render. Every pending lane is drained at
    /// once; per-lane deferral happens inside the hook update queues.
    pub(crate) fn get_next_lanes(&self, root: FiberId) -> Lanes {
        let node = &self.arena[root];
        node.lanes | node.child_lanes
    }

    /// Start a fresh pass: build the work-in-progress root and point the
    /// unit-of-work cursor at it.
    pub(crate) fn prepare_fresh_stack(&mut self, root: FiberId, lanes: Lanes) {
        let pending = self.arena[root].pending_props.clone();
        let wip_root = self.arena.create_work_in_progress(root, pending);
        self.wip_root = Some(wip_root);
        self.wip = Some(wip_root);
        self.render_lanes = lanes;
        debug!(root = root.index(), ?lanes, "render pass started");
    }

    // =========================================================================
    // The loop
    // =========================================================================

    /// Render and commit everything pending on the root, honoring the
    /// policy's budget. Called with the scheduler claimed.
    pub(crate) fn perform_pending(&mut self) -> Result<RenderOutcome, RuntimeError> {
        let Some(root) = self.root else {
            return Ok(RenderOutcome::Idle);
        };

        if self.wip.is_none() {
            let lanes = self.get_next_lanes(root);
            if lanes.is_empty() {
                return Ok(RenderOutcome::Idle);
            }
            self.prepare_fresh_stack(root, lanes);
        }

        if let Err(e) = self.work_loop() {
            return Err(self.handle_error(e));
        }

        if self.wip.is_some() {
            return Ok(RenderOutcome::Incomplete);
        }

        let finished = self
            .wip_root
            .take()
            .ok_or_else(|| RuntimeError::Internal("pass finished without a wip root".into()))?;
        self.commit_root(finished)?;
        Ok(RenderOutcome::Complete)
    }

    /// Process units of work. Sync runs to completion; concurrent checks the
    /// deadline between units only, so each unit runs uninterrupted.
    fn work_loop(&mut self) -> Result<(), RuntimeError> {
        match self.policy {
            RenderPolicy::Sync => {
                while let Some(unit) = self.wip {
                    self.wip = self.perform_unit_of_work(unit)?;
                }
            }
            RenderPolicy::Concurrent => {
                let deadline = Instant::now() + FRAME_BUDGET;
                while let Some(unit) = self.wip {
                    self.wip = self.perform_unit_of_work(unit)?;
                    if Instant::now() >= deadline {
                        if self.wip.is_some() {
                            trace!("frame budget spent, yielding");
                        }
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Begin one fiber, then either descend into its first child or complete
    /// up the tree until a sibling is found.
    fn perform_unit_of_work(&mut self, unit: FiberId) -> Result<Option<FiberId>, RuntimeError> {
        let next = self.begin_work(unit)?;
        let pending = self.arena[unit].pending_props.clone();
        self.arena[unit].memoized_props = Some(pending);
        match next {
            Some(child) => Ok(Some(child)),
            None => Ok(self.complete_unit_of_work(unit)),
        }
    }

    /// Post-order completion: finalize the fiber, splice its effect segment
    /// into the parent's list, and move to the sibling or keep unwinding.
    fn complete_unit_of_work(&mut self, start: FiberId) -> Option<FiberId> {
        let mut unit = start;
        loop {
            self.complete_work(unit);
            let parent = self.arena[unit].parent;
            if let Some(p) = parent {
                self.merge_effects(p, unit);
                if self.arena[unit].has_effects() {
                    self.append_effect(p, unit);
                }
            }
            if let Some(sibling) = self.arena[unit].sibling {
                return Some(sibling);
            }
            match parent {
                Some(p) => unit = p,
                None => return None,
            }
        }
    }

    /// Abandon the in-flight pass after a render error.
    fn handle_error(&mut self, e: RuntimeError) -> RuntimeError {
        error!(error = %e, "render pass failed, discarding work in progress");
        self.wip = None;
        self.wip_root = None;
        self.render_lanes = Lanes::NONE;
        e
    }

    // =========================================================================
    // Effect list plumbing
    // =========================================================================

    /// Append a single fiber to `owner`'s effect list.
    pub(crate) fn append_effect(&mut self, owner: FiberId, effect: FiberId) {
        self.arena[effect].next_effect = None;
        match self.arena[owner].last_effect {
            Some(last) => self.arena[last].next_effect = Some(effect),
            None => self.arena[owner].first_effect = Some(effect),
        }
        self.arena[owner].last_effect = Some(effect);
    }

    /// Splice `child`'s effect segment onto the end of `parent`'s list.
    fn merge_effects(&mut self, parent: FiberId, child: FiberId) {
        let Some(first) = self.arena[child].first_effect else {
            return;
        };
        let Some(last) = self.arena[child].last_effect else {
            return;
        };
        match self.arena[parent].last_effect {
            Some(parent_last) => self.arena[parent_last].next_effect = Some(first),
            None => self.arena[parent].first_effect = Some(first),
        }
        self.arena[parent].last_effect = Some(last);
    }
}
