//! Fiber node - one unit of reconciliation work.
//!
//! Each fiber pairs "what to render" (`pending_props`) with "what was
//! rendered" (`memoized_props`, hooks) and links into both the tree shape
//! (parent / child / sibling) and the commit-phase effect list. The
//! double-buffer partner is `alternate`.

use std::collections::HashSet;
use std::fmt;

use bitflags::bitflags;

use crate::element::ElementRef;
use crate::fiber::{FiberId, UpdateQueue};
use crate::reactive::{CellId, ReactiveCell};
use crate::scheduler::Lanes;
use crate::types::{ComponentFn, Key, Props, Value};

// =============================================================================
// Effect flags
// =============================================================================

bitflags! {
    /// Side-effect markers accumulated during the render phase and consumed
    /// by commit. A fiber with `NONE` never enters the effect list.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EffectFlags: u16 {
        const NONE          = 0;
        const PLACEMENT     = 1 << 0;
        const UPDATE        = 1 << 1;
        const DELETION      = 1 << 2;
        const CONTENT_RESET = 1 << 3;
        const CALLBACK      = 1 << 4;
        const DID_CAPTURE   = 1 << 5;
        const REF           = 1 << 6;
        const SNAPSHOT      = 1 << 7;
    }
}

// =============================================================================
// Tags and payloads
// =============================================================================

/// What kind of node a fiber is; drives begin-work dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberTag {
    /// User component with the full hook lifecycle.
    FunctionComponent,
    /// Root of a fiber tree; its state node is the host container.
    HostRoot,
    /// Host primitive materialized as a retained element.
    HostComponent,
    /// Leaf text node.
    HostText,
    /// Transparent grouping node.
    Fragment,
    /// Internal component eligible for the props/deps bailout.
    StaticComponent,
    /// Parent of keyed list children.
    ListComponent,
}

/// The resolved type behind a fiber.
#[derive(Clone, Default)]
pub enum FiberType {
    #[default]
    None,
    Host(String),
    Component { f: ComponentFn, internal: bool },
}

impl FiberType {
    pub fn same_component(&self, other: &FiberType) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Host(a), Self::Host(b)) => a == b,
            (Self::Component { f: a, .. }, Self::Component { f: b, .. }) => {
                std::rc::Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for FiberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Host(tag) => write!(f, "Host({tag})"),
            Self::Component { internal, .. } => write!(f, "Component(internal={internal})"),
        }
    }
}

/// The host-facing artifact a fiber owns after completion.
#[derive(Clone, Debug)]
pub enum StateNode {
    Element(ElementRef),
    Text(String),
}

impl StateNode {
    pub fn element(&self) -> Option<&ElementRef> {
        match self {
            Self::Element(el) => Some(el),
            Self::Text(_) => None,
        }
    }
}

/// One `use_state` slot: the pending-update queue, the backing cell, and the
/// value the last completed render observed.
#[derive(Clone, Debug)]
pub struct Hook {
    pub queue: UpdateQueue,
    pub cell: ReactiveCell,
    pub memoized: Value,
}

// =============================================================================
// FiberNode
// =============================================================================

/// One node of the work tree. All links are arena indices.
pub struct FiberNode {
    pub tag: FiberTag,
    pub key: Option<Key>,
    pub fiber_type: FiberType,

    /// Props for the in-flight render.
    pub pending_props: Props,
    /// Props of the last completed render; `None` on first mount.
    pub memoized_props: Option<Props>,
    /// Text content for `HostText` fibers.
    pub text: Option<String>,

    /// Hook slots in call order.
    pub hooks: Vec<Hook>,
    /// Cells read during the component's last render.
    pub dependencies: HashSet<CellId>,

    // Tree links.
    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub alternate: Option<FiberId>,
    pub index: usize,

    // Effect list (render-phase output, commit-phase input).
    pub flags: EffectFlags,
    pub first_effect: Option<FiberId>,
    pub last_effect: Option<FiberId>,
    pub next_effect: Option<FiberId>,
    /// Fibers removed by this node's reconciliation, committed as Deletions.
    pub deletions: Vec<FiberId>,

    // Pending work.
    pub lanes: Lanes,
    pub child_lanes: Lanes,

    /// Host artifact (element or text) owned after complete-work.
    pub state_node: Option<StateNode>,
    /// Stable per-mount instance id; keys hook state and effect records.
    pub instance: String,
}

impl FiberNode {
    pub fn new(tag: FiberTag, pending_props: Props) -> Self {
        Self {
            tag,
            key: None,
            fiber_type: FiberType::None,
            pending_props,
            memoized_props: None,
            text: None,
            hooks: Vec::new(),
            dependencies: HashSet::new(),
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            index: 0,
            flags: EffectFlags::NONE,
            first_effect: None,
            last_effect: None,
            next_effect: None,
            deletions: Vec::new(),
            lanes: Lanes::NONE,
            child_lanes: Lanes::NONE,
            state_node: None,
            instance: String::new(),
        }
    }

    /// Clear render-phase output so a reused alternate starts clean.
    pub fn reset_effects(&mut self) {
        self.flags = EffectFlags::NONE;
        self.first_effect = None;
        self.last_effect = None;
        self.next_effect = None;
        self.deletions.clear();
    }

    /// Whether commit has anything to do for this fiber.
    pub fn has_effects(&self) -> bool {
        self.flags != EffectFlags::NONE
    }
}

impl fmt::Debug for FiberNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberNode")
            .field("tag", &self.tag)
            .field("type", &self.fiber_type)
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("lanes", &self.lanes)
            .field("instance", &self.instance)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
