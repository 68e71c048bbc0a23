//! Core type definitions for role assignment

use serde::{Deserialize, Serialize};
use std::fmt;

/// Global rank of a process within the job
pub type Rank = usize;

/// Position of a process within its role
pub type RoleIndex = usize;

/// Advertised network address of a process
pub type Address = String;

/// Functional role of a process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Parameter server: stores and aggregates model state
    Server,

    /// Worker: computes gradients
    Worker,

    /// Unassigned rank
    Idle,
}

impl Role {
    /// Color used when splitting the global group by role
    ///
    /// Idle ranks take no color and end up outside every role group.
    pub fn split_color(&self) -> Option<u32> {
        match self {
            Role::Server => Some(0),
            Role::Worker => Some(1),
            Role::Idle => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => write!(f, "server"),
            Role::Worker => write!(f, "worker"),
            Role::Idle => write!(f, "idle"),
        }
    }
}

/// Placement policy mapping node blocks of ranks to roles
///
/// Serialized as its integer code: `0` for contiguous, `1` for interleaved.
/// Any other code is kept as `Unknown` and leaves every rank idle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "u8", into = "u8")]
pub enum PlacementMode {
    /// First half of the ranks are servers, second half workers
    #[default]
    Contiguous,

    /// Even offsets within each node are servers, odd offsets workers
    Interleaved,

    /// Unrecognized mode code
    Unknown(u8),
}

impl From<u8> for PlacementMode {
    fn from(code: u8) -> Self {
        match code {
            0 => PlacementMode::Contiguous,
            1 => PlacementMode::Interleaved,
            other => PlacementMode::Unknown(other),
        }
    }
}

impl From<PlacementMode> for u8 {
    fn from(mode: PlacementMode) -> Self {
        match mode {
            PlacementMode::Contiguous => 0,
            PlacementMode::Interleaved => 1,
            PlacementMode::Unknown(code) => code,
        }
    }
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementMode::Contiguous => write!(f, "contiguous"),
            PlacementMode::Interleaved => write!(f, "interleaved"),
            PlacementMode::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Role and role-local index assigned to one rank
///
/// Idle ranks carry no index at all, so there is nothing for a caller to
/// misread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleAssignment {
    Server { index: RoleIndex },
    Worker { index: RoleIndex },
    Idle,
}

impl RoleAssignment {
    /// Role of this assignment
    pub fn role(&self) -> Role {
        match self {
            RoleAssignment::Server { .. } => Role::Server,
            RoleAssignment::Worker { .. } => Role::Worker,
            RoleAssignment::Idle => Role::Idle,
        }
    }

    /// Role-local index, `None` for idle ranks
    pub fn index(&self) -> Option<RoleIndex> {
        match self {
            RoleAssignment::Server { index } | RoleAssignment::Worker { index } => Some(*index),
            RoleAssignment::Idle => None,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, RoleAssignment::Server { .. })
    }

    pub fn is_worker(&self) -> bool {
        matches!(self, RoleAssignment::Worker { .. })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RoleAssignment::Idle)
    }
}
