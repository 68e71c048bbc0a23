//! Role partitioning
//!
//! Maps a global rank to a [`RoleAssignment`] given the job topology. The
//! mapping is pure: every process computes the same layout from the same
//! `(world_size, processes_per_node, mode)` triple, so no coordination is
//! needed to agree on roles.
//!
//! Both real placement modes split the job into equally sized server and
//! worker halves:
//!
//! - **Contiguous**: ranks `[0, N/2)` are servers, `[N/2, N)` workers, and
//!   the role index is `rank % (N/2)`.
//! - **Interleaved**: within each node block of `P` ranks, even offsets are
//!   servers and odd offsets workers. The role index is the node ordinal
//!   `rank / P`, so all servers (or workers) of one node share an index.

use serde::Serialize;

use crate::{Error, PlacementMode, Rank, Result, RoleAssignment};

/// Validated shape of a job
///
/// Only constructible through [`JobTopology::new`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct JobTopology {
    /// Total number of processes
    world_size: usize,

    /// Processes launched on each node
    processes_per_node: usize,

    /// Placement policy
    mode: PlacementMode,
}

impl JobTopology {
    /// Validate and build a topology
    ///
    /// Rejects any shape whose ranks cannot be split into equal server and
    /// worker halves instead of flooring the remainder away.
    pub fn new(world_size: usize, processes_per_node: usize, mode: PlacementMode) -> Result<Self> {
        if processes_per_node == 0 {
            return Err(Error::invalid_topology(
                "processes per node must be positive",
            ));
        }
        if world_size == 0 {
            return Err(Error::invalid_topology("world size must be positive"));
        }

        match mode {
            PlacementMode::Contiguous => {
                if world_size % 2 != 0 {
                    return Err(Error::invalid_topology(format!(
                        "contiguous placement needs an even world size, got {}",
                        world_size
                    )));
                }
            }
            PlacementMode::Interleaved => {
                // Each node block contributes P/2 servers and P/2 workers.
                if processes_per_node % 2 != 0 {
                    return Err(Error::invalid_topology(format!(
                        "interleaved placement needs an even number of processes per node, got {}",
                        processes_per_node
                    )));
                }
                if world_size % processes_per_node != 0 {
                    return Err(Error::invalid_topology(format!(
                        "world size {} is not a multiple of {} processes per node",
                        world_size, processes_per_node
                    )));
                }
            }
            PlacementMode::Unknown(_) => {}
        }

        Ok(Self {
            world_size,
            processes_per_node,
            mode,
        })
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    pub fn processes_per_node(&self) -> usize {
        self.processes_per_node
    }

    pub fn mode(&self) -> PlacementMode {
        self.mode
    }

    /// Number of hosts the job spans, counting a partial trailing node
    pub fn nodes_spanned(&self) -> usize {
        self.world_size.div_ceil(self.processes_per_node)
    }

    /// Number of server ranks
    pub fn server_count(&self) -> usize {
        match self.mode {
            PlacementMode::Contiguous | PlacementMode::Interleaved => self.world_size / 2,
            PlacementMode::Unknown(_) => 0,
        }
    }

    /// Number of worker ranks
    pub fn worker_count(&self) -> usize {
        match self.mode {
            PlacementMode::Contiguous | PlacementMode::Interleaved => self.world_size / 2,
            PlacementMode::Unknown(_) => 0,
        }
    }

    /// Number of ranks that receive a server or worker role
    pub fn role_capacity(&self) -> usize {
        self.server_count() + self.worker_count()
    }

    /// Assign a role to `rank`
    ///
    /// Ranks at or beyond the role capacity are idle.
    pub fn derive(&self, rank: Rank) -> RoleAssignment {
        if rank >= self.role_capacity() {
            return RoleAssignment::Idle;
        }

        match self.mode {
            PlacementMode::Contiguous => {
                let half = self.server_count();
                if rank < half {
                    RoleAssignment::Server { index: rank % half }
                } else {
                    RoleAssignment::Worker { index: rank % half }
                }
            }
            PlacementMode::Interleaved => {
                let node = rank / self.processes_per_node;
                if (rank % self.processes_per_node) % 2 == 0 {
                    RoleAssignment::Server { index: node }
                } else {
                    RoleAssignment::Worker { index: node }
                }
            }
            PlacementMode::Unknown(_) => RoleAssignment::Idle,
        }
    }

    /// Assignments of every rank, indexed by rank
    pub fn layout(&self) -> Vec<RoleAssignment> {
        (0..self.world_size).map(|rank| self.derive(rank)).collect()
    }

    /// Lowest rank holding worker index 0
    ///
    /// In interleaved placement several workers of node 0 share index 0;
    /// the lowest of them is the designated first worker.
    pub fn first_worker(&self) -> Option<Rank> {
        (0..self.world_size)
            .find(|&rank| self.derive(rank) == RoleAssignment::Worker { index: 0 })
    }
}

/// Assign a role to `rank` in a job of `world_size` processes
///
/// Convenience wrapper validating the topology on every call.
pub fn derive(
    rank: Rank,
    world_size: usize,
    processes_per_node: usize,
    mode: PlacementMode,
) -> Result<RoleAssignment> {
    Ok(JobTopology::new(world_size, processes_per_node, mode)?.derive(rank))
}
