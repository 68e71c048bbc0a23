//! Per-process instance coordinator
//!
//! An [`InstanceCoordinator`] fixes this process's role at construction and
//! then offers job-scoped and role-scoped coordination on top of a
//! [`GroupService`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::group::{GroupHandle, GroupService};
use crate::{
    Address, Error, JobTopology, PlacementMode, Rank, Result, Role, RoleAssignment, RoleConfig,
    RoleIndex,
};

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstanceState {
    /// Role fixed and groups established
    Active,

    /// Group service released; every operation fails
    Finalized,
}

/// Sub-group of all ranks sharing this process's role
///
/// Obtained once from the role split and never recreated.
pub struct RoleGroup<G> {
    role: Role,
    group: G,
}

impl<G: GroupHandle> RoleGroup<G> {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Rank within the role group
    pub fn rank(&self) -> Rank {
        self.group.rank()
    }

    /// Number of ranks sharing the role
    pub fn size(&self) -> usize {
        self.group.size()
    }

    fn barrier(&self) -> Result<()> {
        self.group.barrier()
    }
}

/// Role-aware coordinator for one process of a parameter-server job
pub struct InstanceCoordinator<S: GroupService> {
    /// Collective runtime
    service: S,

    /// Group spanning the whole job
    world: S::Group,

    /// Group of ranks sharing this role, absent for idle ranks
    role_group: Option<RoleGroup<S::Group>>,

    /// Validated job shape
    topology: JobTopology,

    /// Global rank of this process
    rank: Rank,

    /// Role and role-local index
    assignment: RoleAssignment,

    /// Address advertised in the next gather
    address: Address,

    /// Result of the most recent gather
    addresses: Option<Vec<Address>>,

    state: InstanceState,
}

impl<S: GroupService> InstanceCoordinator<S> {
    /// Discover rank and size, fix the role, and split the job by role
    ///
    /// The topology is validated before the split, so an invalid shape fails
    /// identically on every process without entering any collective.
    pub fn new(service: S, mode: PlacementMode, processes_per_node: usize) -> Result<Self> {
        let world = service.world()?;
        let rank = world.rank();
        let topology = JobTopology::new(world.size(), processes_per_node, mode)?;
        let assignment = topology.derive(rank);
        let role = assignment.role();

        let role_group = world
            .split(role.split_color())
            .map_err(|e| Error::GroupServiceUnavailable {
                message: format!("role split failed: {}", e),
            })?
            .map(|group| RoleGroup { role, group });

        if role != Role::Idle && role_group.is_none() {
            return Err(Error::GroupServiceUnavailable {
                message: format!("no {} group returned for rank {}", role, rank),
            });
        }

        info!(
            rank = rank,
            world_size = topology.world_size(),
            mode = %topology.mode(),
            role = %role,
            index = ?assignment.index(),
            "Instance role assigned"
        );

        Ok(Self {
            service,
            world,
            role_group,
            topology,
            rank,
            assignment,
            address: Address::new(),
            addresses: None,
            state: InstanceState::Active,
        })
    }

    /// Build from a [`RoleConfig`], seeding the advertised address
    pub fn from_config(service: S, config: &RoleConfig) -> Result<Self> {
        config.validate()?;
        let mut instance = Self::new(
            service,
            config.server_worker_mode,
            config.processes_per_node,
        )?;
        if let Some(address) = &config.advertise_address {
            instance.address = address.clone();
        }
        Ok(instance)
    }

    fn ensure_active(&self, operation: &str) -> Result<()> {
        match self.state {
            InstanceState::Active => Ok(()),
            InstanceState::Finalized => Err(Error::InstanceFinalized {
                operation: operation.to_string(),
            }),
        }
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn role(&self) -> Role {
        self.assignment.role()
    }

    pub fn assignment(&self) -> RoleAssignment {
        self.assignment
    }

    pub fn topology(&self) -> &JobTopology {
        &self.topology
    }

    /// Number of processes in the job
    ///
    /// Counts every rank, not physical hosts. The number of hosts the job
    /// spans is [`JobTopology::nodes_spanned`].
    pub fn node_count(&self) -> usize {
        self.topology.world_size()
    }

    /// Role group handle, absent for idle ranks and after finalize
    pub fn role_group(&self) -> Option<&RoleGroup<S::Group>> {
        self.role_group.as_ref()
    }

    pub fn is_server(&self) -> bool {
        self.assignment.is_server()
    }

    pub fn is_worker(&self) -> bool {
        self.assignment.is_worker()
    }

    pub fn is_idle(&self) -> bool {
        self.assignment.is_idle()
    }

    /// True for exactly one worker in the job
    ///
    /// The worker must hold index 0 and be the lowest rank of the worker
    /// group; in interleaved placement several workers share index 0.
    pub fn is_first_worker(&self) -> bool {
        self.assignment == RoleAssignment::Worker { index: 0 }
            && self.role_group.as_ref().is_some_and(|group| group.rank() == 0)
    }

    /// Worker index of this process
    pub fn worker_index(&self) -> Result<RoleIndex> {
        self.ensure_active("worker_index")?;
        match self.assignment {
            RoleAssignment::Worker { index } => Ok(index),
            other => Err(Error::RoleMismatch {
                expected: Role::Worker,
                actual: other.role(),
            }),
        }
    }

    /// Server index of this process
    pub fn server_index(&self) -> Result<RoleIndex> {
        self.ensure_active("server_index")?;
        match self.assignment {
            RoleAssignment::Server { index } => Ok(index),
            other => Err(Error::RoleMismatch {
                expected: Role::Server,
                actual: other.role(),
            }),
        }
    }

    /// Address that the next gather will advertise
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Record this process's own address; local only
    pub fn set_address(&mut self, address: impl Into<Address>) -> Result<()> {
        self.ensure_active("set_address")?;
        let address = address.into();
        if self.addresses.is_some() {
            warn!(
                rank = self.rank,
                address = %address,
                "Address changed after gather; peers keep the old value until the next gather"
            );
        }
        self.address = address;
        Ok(())
    }

    /// Exchange addresses across the whole job
    ///
    /// Collective: every process, idle ones included, must call it. The
    /// result is indexed by global rank.
    pub fn gather_addresses(&mut self) -> Result<Vec<Address>> {
        self.ensure_active("gather_addresses")?;
        let addresses = self.world.all_gather(&self.address)?;
        debug!(rank = self.rank, count = addresses.len(), "Addresses gathered");
        self.addresses = Some(addresses.clone());
        Ok(addresses)
    }

    /// Result of the most recent gather
    pub fn addresses(&self) -> Option<&[Address]> {
        self.addresses.as_deref()
    }

    /// Synchronize every process of the job
    pub fn barrier_all(&self) -> Result<()> {
        self.ensure_active("barrier_all")?;
        debug!(rank = self.rank, "Entering job barrier");
        self.world.barrier()
    }

    /// Synchronize the processes sharing this role
    pub fn barrier_role(&self) -> Result<()> {
        self.ensure_active("barrier_role")?;
        let group = self
            .role_group
            .as_ref()
            .ok_or(Error::NoRoleGroup { rank: self.rank })?;
        debug!(rank = self.rank, role = %group.role(), "Entering role barrier");
        group.barrier()
    }

    /// Synchronize the workers; no-op for servers and idle ranks
    pub fn barrier_worker(&self) -> Result<()> {
        self.ensure_active("barrier_worker")?;
        if self.is_worker() {
            self.barrier_role()
        } else {
            Ok(())
        }
    }

    /// Release the group service
    pub fn finalize(&mut self) -> Result<()> {
        self.ensure_active("finalize")?;
        self.service.finalize()?;
        self.role_group = None;
        self.addresses = None;
        self.state = InstanceState::Finalized;
        info!(rank = self.rank, role = %self.role(), "Instance finalized");
        Ok(())
    }
}
