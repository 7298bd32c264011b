//! Fiber arena - slot storage indexed by [`FiberId`].
//!
//! Fibers reference each other heavily (parent, child, sibling, alternate,
//! effect list), so they live in a slab of slots and link by index. Freed
//! slots are recycled through a free list.

use tracing::trace;

use crate::fiber::node::{FiberNode, FiberType};
use crate::types::Props;

// =============================================================================
// FiberId
// =============================================================================

/// Index of a fiber slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberId(u32);

impl FiberId {
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// FiberArena
// =============================================================================

/// Slab of fiber slots. Indexing with a freed or out-of-range id panics;
/// ids are only produced by `alloc` and stored in live fibers, so a bad
/// index is a reconciler bug, not a caller error.
#[derive(Default)]
pub struct FiberArena {
    slots: Vec<Option<FiberNode>>,
    free: Vec<FiberId>,
}

impl FiberArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fiber and return its id.
    pub fn alloc(&mut self, fiber: FiberNode) -> FiberId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(fiber);
                id
            }
            None => {
                let id = FiberId::from_index(self.slots.len());
                self.slots.push(Some(fiber));
                id
            }
        }
    }

    /// Release a slot for reuse. Freeing an already-free slot is a no-op.
    pub fn free(&mut self, id: FiberId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if slot.take().is_some() {
                self.free.push(id);
                trace!(fiber = id.index(), "freed fiber slot");
            }
        }
    }

    /// Whether `id` names a live fiber.
    pub fn contains(&self, id: FiberId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.is_some())
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn get(&self, id: FiberId) -> Option<&FiberNode> {
        self.slots.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut FiberNode> {
        self.slots.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    // -------------------------------------------------------------------------
    // Double buffering
    // -------------------------------------------------------------------------

    /// Produce the work-in-progress partner of `current` with `pending_props`
    /// applied.
    ///
    /// Reuses the existing alternate when one exists (clearing its effect
    /// output), otherwise allocates a new fiber and links the pair. Either
    /// way the partner starts from the current generation's committed state:
    /// memoized props, hooks, dependencies, child pointer, state node and
    /// pending lanes all carry over.
    pub fn create_work_in_progress(&mut self, current: FiberId, pending_props: Props) -> FiberId {
        let (tag, snapshot) = {
            let cur = &self[current];
            (cur.tag, cur.alternate)
        };

        let wip = match snapshot {
            Some(existing) if self.contains(existing) => {
                let cur = &self[current];
                let (
                    key,
                    fiber_type,
                    memoized_props,
                    text,
                    hooks,
                    dependencies,
                    child,
                    lanes,
                    child_lanes,
                    state_node,
                    instance,
                ) = (
                    cur.key.clone(),
                    cur.fiber_type.clone(),
                    cur.memoized_props.clone(),
                    cur.text.clone(),
                    cur.hooks.clone(),
                    cur.dependencies.clone(),
                    cur.child,
                    cur.lanes,
                    cur.child_lanes,
                    cur.state_node.clone(),
                    cur.instance.clone(),
                );

                let node = &mut self[existing];
                node.tag = tag;
                node.key = key;
                node.fiber_type = fiber_type;
                node.pending_props = pending_props;
                node.memoized_props = memoized_props;
                node.text = text;
                node.hooks = hooks;
                node.dependencies = dependencies;
                node.child = child;
                node.sibling = None;
                node.lanes = lanes;
                node.child_lanes = child_lanes;
                node.state_node = state_node;
                node.instance = instance;
                node.reset_effects();
                existing
            }
            _ => {
                let cur = &self[current];
                let mut node = FiberNode::new(tag, pending_props);
                node.key = cur.key.clone();
                node.fiber_type = cur.fiber_type.clone();
                node.memoized_props = cur.memoized_props.clone();
                node.text = cur.text.clone();
                node.hooks = cur.hooks.clone();
                node.dependencies = cur.dependencies.clone();
                node.child = cur.child;
                node.lanes = cur.lanes;
                node.child_lanes = cur.child_lanes;
                node.state_node = cur.state_node.clone();
                node.instance = cur.instance.clone();
                node.alternate = Some(current);
                let id = self.alloc(node);
                self[current].alternate = Some(id);
                id
            }
        };
        wip
    }

    /// Component function of a fiber, when it has one.
    pub fn component_fn(&self, id: FiberId) -> Option<crate::types::ComponentFn> {
        match &self[id].fiber_type {
            FiberType::Component { f, .. } => Some(f.clone()),
            _ => None,
        }
    }
}

impl std::ops::Index<FiberId> for FiberArena {
    type Output = FiberNode;

    fn index(&self, id: FiberId) -> &FiberNode {
        self.slots[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("fiber {} is not live", id.index()))
    }
}

impl std::ops::IndexMut<FiberId> for FiberArena {
    fn index_mut(&mut self, id: FiberId) -> &mut FiberNode {
        self.slots[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("fiber {} is not live", id.index()))
    }
}

// =============================================================================
// Tests
// =============================================================================
