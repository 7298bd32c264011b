//! Work priorities and lane bitsets.
//!
//! Every update is tagged with a priority that maps to a single lane bit.
//! Fibers accumulate pending lanes (`lanes` for own work, `child_lanes` for
//! subtree work) by OR-ing bits; a render pass picks a lane set and clears it
//! on commit. Lower bit value means higher priority.

use std::time::Duration;

use bitflags::bitflags;

/// Cooperative yield budget per slice of concurrent work.
pub const FRAME_BUDGET: Duration = Duration::from_millis(5);

// =============================================================================
// WorkPriority
// =============================================================================

/// Priority classes exposed to update producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkPriority {
    /// Synchronous, uninterruptible (discrete input).
    Immediate,
    /// Result of direct user interaction.
    UserBlocking,
    /// Default for state updates.
    Normal,
    /// Deferrable work.
    Low,
    /// Runs only when nothing else is pending.
    Idle,
}

impl WorkPriority {
    /// The single lane bit carrying this priority.
    pub fn lane(self) -> Lanes {
        match self {
            Self::Immediate => Lanes::IMMEDIATE,
            Self::UserBlocking => Lanes::USER_BLOCKING,
            Self::Normal => Lanes::NORMAL,
            Self::Low => Lanes::LOW,
            Self::Idle => Lanes::IDLE,
        }
    }
}

impl Default for WorkPriority {
    fn default() -> Self {
        Self::Normal
    }
}

// =============================================================================
// Lanes
// =============================================================================

bitflags! {
    /// Bitset of pending priority lanes. Bit position encodes priority:
    /// the lowest set bit is the most urgent lane.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Lanes: u32 {
        const NONE          = 0;
        const IMMEDIATE     = 1 << 0;
        const USER_BLOCKING = 1 << 1;
        const NORMAL        = 1 << 2;
        const LOW           = 1 << 3;
        const IDLE          = 1 << 4;
    }
}

impl Lanes {
    /// The most urgent lane in this set, or `NONE` when empty.
    pub fn highest_priority(self) -> Lanes {
        let bits = self.bits();
        if bits == 0 {
            return Lanes::NONE;
        }
        Lanes::from_bits_truncate(bits & bits.wrapping_neg())
    }

    /// Whether any lane in `self` is also in `other`.
    pub fn intersects_lanes(self, other: Lanes) -> bool {
        !(self & other).is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
