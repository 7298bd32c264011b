//! Begin and complete work - per-fiber render phases.
//!
//! `begin_work` dispatches on the fiber tag: host-shaped fibers reconcile
//! their pending children, function components run their body against a
//! fresh [`RenderCtx`], and static components try the bailout first. Closed
//! enum dispatch; there is no dynamic registry of fiber behaviors.
//!
//! `complete_work` runs on the way back up: it materializes host state nodes
//! on mount and diffs attributes (or text) against the committed generation
//! to decide an `UPDATE` flag.

use std::mem;

use tracing::trace;

use crate::error::RuntimeError;
use crate::fiber::{EffectFlags, FiberId, FiberTag, StateNode};
use crate::runtime::{RenderCtx, RuntimeInner};
use crate::types::ChildNode;

impl RuntimeInner {
    /// Render one fiber, returning its first child (to descend into) or
    /// `None` when the subtree below needs no visit.
    pub(crate) fn begin_work(&mut self, wip: FiberId) -> Result<Option<FiberId>, RuntimeError> {
        let current = self.live_alternate(wip);
        let tag = self.arena[wip].tag;
        trace!(fiber = wip.index(), ?tag, "begin work");

        let next = match tag {
            FiberTag::HostRoot
            | FiberTag::Fragment
            | FiberTag::HostComponent
            | FiberTag::ListComponent => {
                let children = self.arena[wip].pending_props.children.clone();
                self.reconcile_children(wip, children)?
            }
            FiberTag::HostText => None,
            FiberTag::FunctionComponent => self.update_function_component(wip)?,
            FiberTag::StaticComponent => {
                if let Some(bailout) = self.try_static_bailout(wip, current) {
                    bailout
                } else {
                    self.update_function_component(wip)?
                }
            }
        };

        let render_lanes = self.render_lanes;
        self.arena[wip].lanes.remove(render_lanes);
        Ok(next)
    }

    /// The static-component fast path: when the committed generation exists,
    /// attributes are unchanged, the instance tracks no cell dependencies
    /// and no own work is pending, the previous output is reused without
    /// re-running the body. A non-empty dependency set always re-invokes;
    /// cell writes must be able to reach the body.
    ///
    /// `Some(None)` reuses the committed children wholesale (nothing below is
    /// visited); `Some(Some(child))` reuses this fiber but descends because a
    /// descendant has pending work; `None` means no bailout applies.
    fn try_static_bailout(
        &mut self,
        wip: FiberId,
        current: Option<FiberId>,
    ) -> Option<Option<FiberId>> {
        current?;
        let render_lanes = self.render_lanes;
        {
            let node = &self.arena[wip];
            let props_equal = node
                .memoized_props
                .as_ref()
                .is_some_and(|m| node.pending_props.attrs_eq(m));
            if !props_equal
                || !node.dependencies.is_empty()
                || node.lanes.intersects_lanes(render_lanes)
            {
                return None;
            }
        }

        if !self.arena[wip].child_lanes.intersects_lanes(render_lanes) {
            trace!(fiber = wip.index(), "static bailout, subtree reused");
            return Some(None);
        }
        trace!(fiber = wip.index(), "static bailout, descending for children");
        Some(self.clone_child_fibers(wip))
    }

    /// Rebuild work-in-progress children one-for-one from the committed
    /// generation, preserving props. Used when a bailing-out fiber still has
    /// pending work somewhere below.
    fn clone_child_fibers(&mut self, wip: FiberId) -> Option<FiberId> {
        let mut source = self.arena[wip].child;
        let mut first = None;
        let mut prev: Option<FiberId> = None;
        while let Some(src) = source {
            let next_source = self.arena[src].sibling;
            let props = self.arena[src].pending_props.clone();
            let clone = self.arena.create_work_in_progress(src, props);
            self.arena[clone].parent = Some(wip);
            self.arena[clone].index = self.arena[src].index;
            match prev {
                None => {
                    first = Some(clone);
                    self.arena[wip].child = first;
                }
                Some(p) => self.arena[p].sibling = Some(clone),
            }
            prev = Some(clone);
            source = next_source;
        }
        first
    }

    /// Run a component body and reconcile what it returned.
    fn update_function_component(&mut self, wip: FiberId) -> Result<Option<FiberId>, RuntimeError> {
        let f = self.arena.component_fn(wip).ok_or_else(|| {
            RuntimeError::Internal(format!(
                "fiber {} tagged as component but holds no function",
                wip.index()
            ))
        })?;

        if self.arena[wip].instance.is_empty() {
            self.instance_counter += 1;
            self.arena[wip].instance = format!("c{}", self.instance_counter);
        }
        let instance = self.arena[wip].instance.clone();
        let hooks = mem::take(&mut self.arena[wip].hooks);
        let props = self.arena[wip].pending_props.clone();

        let mut ctx = RenderCtx::new(
            wip,
            instance,
            hooks,
            self.render_lanes,
            self.effects.clone(),
            self.shared.clone(),
            self.self_weak.clone(),
        );
        let rendered = f(&mut ctx, &props);
        let (hooks, dependencies, instance, element) = ctx.finish(rendered)?;

        self.arena[wip].hooks = hooks;
        self.arena[wip].dependencies = dependencies;
        self.arena[wip].instance = instance;
        self.reconcile_children(wip, vec![ChildNode::Element(element)])
    }

    // =========================================================================
    // Complete
    // =========================================================================

    /// Finalize a fiber on the way back up the tree.
    pub(crate) fn complete_work(&mut self, unit: FiberId) {
        let current = self.live_alternate(unit);
        match self.arena[unit].tag {
            FiberTag::HostComponent | FiberTag::ListComponent => {
                if self.arena[unit].state_node.is_none() {
                    self.materialize_host(unit);
                } else if let Some(cur) = current {
                    let changed = {
                        let prev = self.arena[cur].memoized_props.clone().unwrap_or_default();
                        !self.arena[unit].pending_props.attrs_eq(&prev)
                    };
                    if changed {
                        self.arena[unit].flags |= EffectFlags::UPDATE;
                    }
                }
            }
            FiberTag::HostText => match current {
                None => {
                    let text = self.arena[unit].text.clone().unwrap_or_default();
                    self.arena[unit].state_node = Some(StateNode::Text(text));
                }
                Some(cur) => {
                    if self.arena[cur].text != self.arena[unit].text {
                        let text = self.arena[unit].text.clone().unwrap_or_default();
                        self.arena[unit].state_node = Some(StateNode::Text(text));
                        self.arena[unit].flags |= EffectFlags::UPDATE;
                    }
                }
            },
            FiberTag::HostRoot
            | FiberTag::Fragment
            | FiberTag::FunctionComponent
            | FiberTag::StaticComponent => {}
        }

        let render_lanes = self.render_lanes;
        self.arena[unit].child_lanes.remove(render_lanes);
    }

    /// First-mount element creation for a host fiber that was built from a
    /// descriptor (fibers built from an existing element adopt it instead).
    fn materialize_host(&mut self, unit: FiberId) {
        let tag = match &self.arena[unit].fiber_type {
            crate::fiber::FiberType::Host(tag) => tag.clone(),
            other => {
                // Reconcile only builds host fibers with a host type.
                trace!(fiber = unit.index(), ?other, "host fiber without host type");
                return;
            }
        };
        let mut attrs = self.arena[unit].pending_props.clone();
        attrs.children = Vec::new();
        let element = crate::element::ElementRef::new(tag, attrs);
        self.arena[unit].state_node = Some(StateNode::Element(element));
    }

    /// The committed-generation partner, when it is still live.
    pub(crate) fn live_alternate(&self, fiber: FiberId) -> Option<FiberId> {
        self.arena[fiber]
            .alternate
            .filter(|&alt| self.arena.contains(alt))
    }
}
