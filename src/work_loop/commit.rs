//! Commit - applying a finished pass to the retained element tree.
//!
//! Three passes over the effect list, then the root swap:
//!
//! 1. **Before mutation**: reserved for snapshot effects; currently trace
//!    only.
//! 2. **Mutation**: placements and deletions mark their nearest host
//!    ancestor for a children rebuild, attribute updates write through the
//!    element, deletions tear their subtree down (effect records, arena
//!    slots). Host children are rebuilt from fiber order, which makes moves
//!    and removals fall out of the same rebuild.
//! 3. **Layout**: dirty dependency-array effects re-run. Dispatches fired
//!    here queue up for the next drain iteration.

use tracing::{debug, trace};

use crate::error::RuntimeError;
use crate::fiber::{EffectFlags, FiberId, FiberTag, StateNode};
use crate::reactive::EffectRegistry;
use crate::runtime::RuntimeInner;
use crate::types::{ChildNode, Key};

// =============================================================================
// CommittedEffect
// =============================================================================

/// One entry of the commit log, also handed to the observer as it lands.
#[derive(Clone, Debug)]
pub struct CommittedEffect {
    pub flags: EffectFlags,
    pub tag: FiberTag,
    pub key: Option<Key>,
    pub instance: String,
}

// =============================================================================
// Commit
// =============================================================================

impl RuntimeInner {
    /// Apply the finished work-in-progress tree.
    pub(crate) fn commit_root(&mut self, finished: FiberId) -> Result<(), RuntimeError> {
        let first = self.arena[finished].first_effect;

        // Pass 1: before mutation.
        let mut cursor = first;
        while let Some(id) = cursor {
            if self.arena[id].flags.contains(EffectFlags::SNAPSHOT) {
                trace!(fiber = id.index(), "snapshot effect");
            }
            cursor = self.arena[id].next_effect;
        }

        // Pass 2: mutation.
        let mut refresh: Vec<FiberId> = Vec::new();
        let mut deletions: Vec<FiberId> = Vec::new();
        let mut count = 0usize;
        let mut cursor = first;
        while let Some(id) = cursor {
            let next = self.arena[id].next_effect;
            let flags = self.arena[id].flags;
            let record = CommittedEffect {
                flags,
                tag: self.arena[id].tag,
                key: self.arena[id].key.clone(),
                instance: self.arena[id].instance.clone(),
            };

            if flags.contains(EffectFlags::DELETION) {
                if let Some(host) = self.host_ancestor(id) {
                    push_unique(&mut refresh, host);
                }
                deletions.push(id);
            } else {
                if flags.contains(EffectFlags::PLACEMENT) {
                    if let Some(host) = self.host_ancestor(id) {
                        push_unique(&mut refresh, host);
                    }
                }
                if flags.contains(EffectFlags::UPDATE) {
                    self.commit_update(id, &mut refresh);
                }
            }

            if let Some(observer) = &self.observer {
                observer(&record);
            }
            self.committed.push(record);
            count += 1;
            cursor = next;
        }

        for deleted in deletions {
            self.teardown_subtree(deleted);
        }

        // Root swap: the finished tree becomes current.
        self.root = Some(finished);
        self.wip_root = None;
        let consumed = self.render_lanes;
        self.render_lanes = crate::scheduler::Lanes::NONE;
        self.arena[finished].lanes.remove(consumed);
        self.arena[finished].child_lanes.remove(consumed);
        if let Some(alt) = self.arena[finished].alternate {
            if self.arena.contains(alt) {
                self.arena[alt].lanes.remove(consumed);
                self.arena[alt].child_lanes.remove(consumed);
            }
        }

        for host in refresh {
            if self.arena.contains(host) {
                self.refresh_element_children(host);
            }
        }
        if count > 0 {
            debug!(effects = count, "commit applied");
        }

        // Pass 3: layout.
        EffectRegistry::flush_dirty(&self.effects);
        Ok(())
    }

    /// Write a committed attribute (or text) change through to the host.
    fn commit_update(&mut self, id: FiberId, refresh: &mut Vec<FiberId>) {
        match self.arena[id].tag {
            FiberTag::HostText => {
                // Text lives in the parent's children array.
                if let Some(host) = self.host_ancestor(id) {
                    push_unique(refresh, host);
                }
            }
            _ => {
                if let Some(StateNode::Element(el)) = self.arena[id].state_node.clone() {
                    let mut attrs = self.arena[id].pending_props.clone();
                    attrs.children = Vec::new();
                    el.set_properties(attrs);
                }
            }
        }
    }

    /// Nearest ancestor fiber owning a host element.
    fn host_ancestor(&self, id: FiberId) -> Option<FiberId> {
        let mut cursor = self.arena[id].parent;
        while let Some(p) = cursor {
            if !self.arena.contains(p) {
                return None;
            }
            let node = &self.arena[p];
            let is_host = matches!(
                node.tag,
                FiberTag::HostComponent | FiberTag::ListComponent | FiberTag::HostRoot
            );
            if is_host && matches!(node.state_node, Some(StateNode::Element(_))) {
                return Some(p);
            }
            cursor = node.parent;
        }
        None
    }

    /// Rebuild a host fiber's element children from fiber order, recursing
    /// into nested host fibers so the retained subtree mirrors the tree.
    pub(crate) fn refresh_element_children(&self, host: FiberId) {
        let Some(StateNode::Element(el)) = self.arena[host].state_node.clone() else {
            return;
        };
        let mut children = Vec::new();
        self.collect_host_children(self.arena[host].child, &mut children);
        el.replace_children(children);
    }

    fn collect_host_children(&self, first: Option<FiberId>, out: &mut Vec<ChildNode>) {
        let mut cursor = first;
        while let Some(id) = cursor {
            let node = &self.arena[id];
            if !node.flags.contains(EffectFlags::DELETION) {
                match node.tag {
                    FiberTag::HostComponent | FiberTag::ListComponent => {
                        if let Some(StateNode::Element(el)) = &node.state_node {
                            self.refresh_element_children(id);
                            out.push(ChildNode::Element(el.clone()));
                        }
                    }
                    FiberTag::HostText => {
                        out.push(ChildNode::Text(node.text.clone().unwrap_or_default()));
                    }
                    // Component and fragment fibers are transparent to the
                    // host tree.
                    _ => self.collect_host_children(node.child, out),
                }
            }
            cursor = node.sibling;
        }
    }

    /// Free a deleted fiber's subtree: effect records of every component
    /// instance below, the fibers themselves, and their stale alternates.
    fn teardown_subtree(&mut self, root: FiberId) {
        let mut stack = vec![root];
        let mut subtree = Vec::new();
        while let Some(id) = stack.pop() {
            if !self.arena.contains(id) {
                continue;
            }
            subtree.push(id);
            let mut child = self.arena[id].child;
            while let Some(c) = child {
                if !self.arena.contains(c) {
                    break;
                }
                stack.push(c);
                child = self.arena[c].sibling;
            }
        }

        for id in subtree {
            let instance = self.arena[id].instance.clone();
            if !instance.is_empty() {
                self.effects.borrow_mut().remove_instance(&instance);
            }
            if let Some(alt) = self.arena[id].alternate {
                if self.arena.contains(alt) {
                    self.arena[alt].alternate = None;
                    self.arena.free(alt);
                }
            }
            self.arena.free(id);
            trace!(fiber = id.index(), "fiber torn down");
        }
    }
}

fn push_unique(list: &mut Vec<FiberId>, id: FiberId) {
    if !list.contains(&id) {
        list.push(id);
    }
}
