//! Simulated job execution

use std::thread;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::info;

use ps_core::net::{format_socket_addr, local_address};
use ps_core::{
    Address, InstanceCoordinator, JobTopology, LocalFabric, LocalGroupService, PlacementMode,
    Rank, RoleAssignment,
};

/// Shape of the job to launch
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub world_size: usize,
    pub processes_per_node: usize,
    pub mode: PlacementMode,

    /// Rank `r` advertises `base_port + r`
    pub base_port: u16,
}

impl JobSpec {
    pub fn new(world_size: usize, processes_per_node: usize, mode: PlacementMode) -> Self {
        Self {
            world_size,
            processes_per_node,
            mode,
            base_port: 8500,
        }
    }

    /// Port advertised by `rank`
    fn port(&self, rank: Rank) -> Result<u16> {
        u16::try_from(rank)
            .ok()
            .and_then(|offset| self.base_port.checked_add(offset))
            .ok_or_else(|| anyhow!("rank {} has no port above base port {}", rank, self.base_port))
    }

    fn topology(&self) -> Result<JobTopology> {
        Ok(JobTopology::new(
            self.world_size,
            self.processes_per_node,
            self.mode,
        )?)
    }
}

/// What one rank observed during the simulation
#[derive(Debug, Clone, Serialize)]
pub struct RankReport {
    pub rank: Rank,
    pub assignment: RoleAssignment,

    /// Rank within the role group, absent for idle ranks
    pub role_rank: Option<Rank>,

    /// Size of the role group, absent for idle ranks
    pub role_size: Option<usize>,

    pub first_worker: bool,

    /// Address table as gathered by this rank
    pub addresses: Vec<Address>,
}

/// Role layout of the job without starting any rank
pub fn plan(spec: &JobSpec) -> Result<Vec<RoleAssignment>> {
    Ok(spec.topology()?.layout())
}

/// Run every rank of the job on its own thread
///
/// Reports are returned in rank order.
pub fn run(spec: &JobSpec) -> Result<Vec<RankReport>> {
    // Fail before spawning; every rank would reject the same topology.
    let topology = spec.topology()?;
    let host = local_address().to_string();

    // Resolve every port up front so no rank is left waiting on a peer that
    // never started.
    let addresses = (0..spec.world_size)
        .map(|rank| -> Result<Address> { Ok(format_socket_addr(&host, spec.port(rank)?)) })
        .collect::<Result<Vec<_>>>()?;

    let fabric = LocalFabric::new(spec.world_size);

    info!(
        job_id = %fabric.job_id(),
        world_size = topology.world_size(),
        nodes = topology.nodes_spanned(),
        mode = %topology.mode(),
        "Launching simulated job"
    );

    let handles: Vec<_> = fabric
        .endpoints()?
        .into_iter()
        .zip(addresses)
        .enumerate()
        .map(|(rank, (endpoint, address))| {
            let spec = spec.clone();
            thread::Builder::new()
                .name(format!("rank-{}", rank))
                .spawn(move || run_rank(endpoint, &spec, address))
                .context("failed to spawn rank thread")
        })
        .collect::<Result<_>>()?;

    handles
        .into_iter()
        .enumerate()
        .map(|(rank, handle)| {
            handle
                .join()
                .map_err(|_| anyhow!("rank {} panicked", rank))?
                .with_context(|| format!("rank {} failed", rank))
        })
        .collect()
}

fn run_rank(endpoint: LocalGroupService, spec: &JobSpec, address: Address) -> Result<RankReport> {
    let mut instance =
        InstanceCoordinator::new(endpoint, spec.mode, spec.processes_per_node)?;

    instance.set_address(address)?;
    let addresses = instance.gather_addresses()?;

    if !instance.is_idle() {
        instance.barrier_role()?;
    }
    instance.barrier_all()?;

    if instance.is_first_worker() {
        info!(rank = instance.rank(), peers = addresses.len(), "First worker holds address table");
    }

    let report = RankReport {
        rank: instance.rank(),
        assignment: instance.assignment(),
        role_rank: instance.role_group().map(|g| g.rank()),
        role_size: instance.role_group().map(|g| g.size()),
        first_worker: instance.is_first_worker(),
        addresses,
    };

    instance.finalize()?;
    Ok(report)
}
