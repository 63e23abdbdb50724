//! Organisation of the configuration memory and the address lines it holds back for multiplexers.

use serde::{Deserialize, Serialize};

/// How configuration bits are connected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SramOrganization {
    /// Every bit is wired on its own.
    #[default]
    Standalone,
    /// Bits are shifted in through a chain of flip-flops.
    ScanChain,
    /// Bits addressed by bit lines and word lines.
    MemoryBank,
}

/// Configuration-memory state shared by the netlist generators.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SramOrgzInfo {
    /// How the bits are connected.
    pub organization: SramOrganization,
    /// Bit lines held back for multiplexers.
    pub reserved_bl: usize,
    /// Word lines held back for multiplexers.
    pub reserved_wl: usize,
}

impl SramOrgzInfo {
    /// A memory with nothing reserved.
    #[must_use]
    pub const fn new(organization: SramOrganization) -> Self {
        Self {
            organization,
            reserved_bl: 0,
            reserved_wl: 0,
        }
    }
}

/// Grow the reserved bit lines and word lines of a memory bank to at least the requested counts.
///
/// Standalone memories and scan chains have no address lines, so they come back unchanged.
#[must_use]
pub fn try_update_reserved_blwl(state: SramOrgzInfo, reserved_bl: usize, reserved_wl: usize) -> SramOrgzInfo {
    match state.organization {
        SramOrganization::Standalone | SramOrganization::ScanChain => state,
        SramOrganization::MemoryBank => SramOrgzInfo {
            reserved_bl: state.reserved_bl.max(reserved_bl),
            reserved_wl: state.reserved_wl.max(reserved_wl),
            ..state
        },
    }
}
