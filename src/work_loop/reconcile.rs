//! Child reconciliation - matching pending children against the committed
//! generation.
//!
//! Matching is keyed: explicit keys from descriptors, stable slot ids, or
//! the child's index as a fallback. A key match with the same component type
//! reuses the committed fiber (and thereby its hooks, instance and host
//! artifact); anything else mounts a new fiber.
//!
//! Side effects are only tracked when a committed generation exists: fresh
//! mounts under tracking get `PLACEMENT`, and so does a reused child that
//! moved left of the rightmost reused old position. The flag is what marks
//! the host parent for a children rebuild, so a pure reorder with no mounts
//! or removals still reaches the retained tree. Unmatched committed fibers
//! get `DELETION` and are threaded onto the effect list up front, so
//! deletions always precede the subtree effects that completion appends
//! later.

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::error::RuntimeError;
use crate::fiber::{EffectFlags, FiberId, FiberNode, FiberTag, FiberType, StateNode};
use crate::runtime::RuntimeInner;
use crate::types::{ChildNode, ComponentKind, Key, Props};

impl RuntimeInner {
    /// Reconcile `children` against `wip`'s committed children. Returns the
    /// first new child fiber.
    pub(crate) fn reconcile_children(
        &mut self,
        wip: FiberId,
        children: Vec<ChildNode>,
    ) -> Result<Option<FiberId>, RuntimeError> {
        let current = self.live_alternate(wip);
        let tracking = current.is_some();

        // Committed children, indexed by key.
        let mut old_by_key: HashMap<Key, FiberId> = HashMap::new();
        let mut cursor = current.and_then(|c| self.arena[c].child);
        let mut position = 0usize;
        while let Some(id) = cursor {
            let key = self.arena[id]
                .key
                .clone()
                .unwrap_or(Key::Index(position));
            if old_by_key.contains_key(&key) {
                // A shadowed entry would neither be reused nor deleted;
                // positional identity keeps the fiber reclaimable.
                warn!(key = %key, "duplicate key among committed children, using positional identity");
                old_by_key.insert(Key::Index(position), id);
            } else {
                old_by_key.insert(key, id);
            }
            cursor = self.arena[id].sibling;
            position += 1;
        }

        let mut first = None;
        let mut prev: Option<FiberId> = None;
        let mut last_placed = 0usize;
        for (i, child) in children.into_iter().enumerate() {
            let key = child_key(&child, i);
            let reusable = old_by_key
                .get(&key)
                .copied()
                .filter(|&old| self.child_matches(old, &child));

            let fiber = match reusable {
                Some(old) => {
                    old_by_key.remove(&key);
                    let old_index = self.arena[old].index;
                    let fiber = self.reuse_child(old, &child);
                    // A reuse landing left of the rightmost kept old index
                    // is a move; flag it so commit reorders the host.
                    if tracking && old_index < last_placed {
                        self.arena[fiber].flags |= EffectFlags::PLACEMENT;
                        trace!(fiber = fiber.index(), key = %key, "child moved");
                    } else {
                        last_placed = old_index;
                    }
                    fiber
                }
                None => {
                    let fiber = self.mount_child(&child);
                    if tracking {
                        self.arena[fiber].flags |= EffectFlags::PLACEMENT;
                        trace!(fiber = fiber.index(), key = %key, "child placed");
                    }
                    fiber
                }
            };

            self.arena[fiber].parent = Some(wip);
            self.arena[fiber].index = i;
            self.arena[fiber].key = Some(key);
            self.arena[fiber].sibling = None;
            match prev {
                None => {
                    first = Some(fiber);
                    self.arena[wip].child = first;
                }
                Some(p) => self.arena[p].sibling = Some(fiber),
            }
            prev = Some(fiber);
        }
        if first.is_none() {
            self.arena[wip].child = None;
        }

        // Unmatched committed fibers are deleted. Re-pointing their parent
        // at `wip` keeps the commit-phase ancestor walk inside the new tree.
        for (key, old) in old_by_key {
            if tracking {
                trace!(fiber = old.index(), key = %key, "child deleted");
                self.arena[old].flags |= EffectFlags::DELETION;
                self.arena[old].parent = Some(wip);
                self.arena[wip].deletions.push(old);
                self.append_effect(wip, old);
            } else {
                self.arena.free(old);
            }
        }

        Ok(first)
    }

    /// Whether a committed fiber can back this pending child.
    fn child_matches(&self, old: FiberId, child: &ChildNode) -> bool {
        let node = &self.arena[old];
        match child {
            ChildNode::Element(el) => match &node.fiber_type {
                FiberType::Host(tag) => *tag == el.tag(),
                _ => false,
            },
            ChildNode::Descriptor(d) => match (&d.component, &node.fiber_type) {
                (ComponentKind::Host(a), FiberType::Host(b)) => a == b,
                (ComponentKind::Function(a), FiberType::Component { f, .. }) => {
                    std::rc::Rc::ptr_eq(a, f)
                }
                _ => false,
            },
            ChildNode::Text(_) | ChildNode::Cell(_) => node.tag == FiberTag::HostText,
        }
    }

    /// Reuse a committed fiber for a matching pending child.
    fn reuse_child(&mut self, old: FiberId, child: &ChildNode) -> FiberId {
        match child {
            ChildNode::Element(el) => self.arena.create_work_in_progress(old, el.snapshot_props()),
            ChildNode::Descriptor(d) => self.arena.create_work_in_progress(old, d.props.clone()),
            ChildNode::Text(s) => {
                let fiber = self.arena.create_work_in_progress(old, Props::new());
                self.arena[fiber].text = Some(s.clone());
                fiber
            }
            ChildNode::Cell(cell) => {
                let fiber = self.arena.create_work_in_progress(old, Props::new());
                self.arena[fiber].text = Some(cell.read().to_string());
                fiber
            }
        }
    }

    /// Build a fresh fiber for a pending child.
    fn mount_child(&mut self, child: &ChildNode) -> FiberId {
        let node = match child {
            ChildNode::Element(el) => {
                let tag = if el.is_list() {
                    FiberTag::ListComponent
                } else {
                    FiberTag::HostComponent
                };
                let mut node = FiberNode::new(tag, el.snapshot_props());
                node.fiber_type = FiberType::Host(el.tag());
                // Adopt the element the renderer already built.
                node.state_node = Some(StateNode::Element(el.clone()));
                node
            }
            ChildNode::Descriptor(d) => match &d.component {
                ComponentKind::Host(tag) => {
                    let mut node = FiberNode::new(FiberTag::HostComponent, d.props.clone());
                    node.fiber_type = FiberType::Host(tag.clone());
                    node
                }
                ComponentKind::Function(f) => {
                    let tag = if d.internal {
                        FiberTag::StaticComponent
                    } else {
                        FiberTag::FunctionComponent
                    };
                    let mut node = FiberNode::new(tag, d.props.clone());
                    node.fiber_type = FiberType::Component {
                        f: f.clone(),
                        internal: d.internal,
                    };
                    node
                }
            },
            ChildNode::Text(s) => {
                let mut node = FiberNode::new(FiberTag::HostText, Props::new());
                node.text = Some(s.clone());
                node
            }
            ChildNode::Cell(cell) => {
                let mut node = FiberNode::new(FiberTag::HostText, Props::new());
                node.text = Some(cell.read().to_string());
                node
            }
        };
        self.arena.alloc(node)
    }
}

/// Identity key of a pending child: explicit descriptor key, stable slot id,
/// then position.
fn child_key(child: &ChildNode, index: usize) -> Key {
    if let ChildNode::Descriptor(d) = child {
        if let Some(key) = &d.key {
            return key.clone();
        }
    }
    match child.slot_id() {
        Some(id) => Key::Str(id),
        None => Key::Index(index),
    }
}
