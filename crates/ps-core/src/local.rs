//! In-process group service
//!
//! [`LocalFabric`] runs a whole job inside one process, one thread per rank.
//! Each group owns a [`Rendezvous`]: a generation-counted round in which
//! every member deposits its contribution and blocks until the last member
//! arrives, mirroring the all-or-nothing semantics of an MPI collective.
//! Sub-groups created by `split` are registered on the fabric under a key
//! derived from the parent group and the round that created them, so every
//! member of a new group resolves the same rendezvous.
//!
//! A fabric serves exactly one job. Each rank may be claimed by a single
//! endpoint, and the sub-group registry is released with the fabric.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::group::{GroupHandle, GroupService};
use crate::{Address, Error, Rank, Result};

/// Value a member brings to a collective round
#[derive(Debug, Clone, PartialEq, Eq)]
enum Contribution {
    Barrier,
    Address(Address),
    Color(Option<u32>),
}

impl Contribution {
    fn kind(&self) -> &'static str {
        match self {
            Contribution::Barrier => "barrier",
            Contribution::Address(_) => "all_gather",
            Contribution::Color(_) => "split",
        }
    }
}

/// One collective round in progress
struct Round {
    /// Incremented each time a round completes
    generation: u64,

    /// Members that entered the current round
    arrived: usize,

    /// Contributions of the current round, indexed by group rank
    slots: Vec<Option<Contribution>>,

    /// Contributions of the last completed round
    completed: Arc<Vec<Contribution>>,
}

/// Reusable rendezvous point for a fixed set of members
struct Rendezvous {
    size: usize,
    round: Mutex<Round>,
    released: Condvar,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Self {
            size,
            round: Mutex::new(Round {
                generation: 0,
                arrived: 0,
                slots: vec![None; size],
                completed: Arc::new(Vec::new()),
            }),
            released: Condvar::new(),
        }
    }

    /// Deposit a contribution and wait for the round to complete
    ///
    /// Returns the generation of the completed round with every member's
    /// contribution. `completed` cannot be overwritten before all waiters
    /// read it, since the next round needs every one of them to arrive.
    fn exchange(
        &self,
        rank: Rank,
        contribution: Contribution,
    ) -> Result<(u64, Arc<Vec<Contribution>>)> {
        let mut round = self.round.lock();
        let generation = round.generation;

        if round.slots[rank].is_some() {
            return Err(Error::collective(
                contribution.kind(),
                format!("rank {} entered round {} twice", rank, generation),
            ));
        }
        round.slots[rank] = Some(contribution);
        round.arrived += 1;

        if round.arrived == self.size {
            let slots = std::mem::replace(&mut round.slots, vec![None; self.size]);
            round.completed = Arc::new(slots.into_iter().flatten().collect());
            round.arrived = 0;
            round.generation += 1;
            self.released.notify_all();
            return Ok((generation, Arc::clone(&round.completed)));
        }

        while round.generation == generation {
            self.released.wait(&mut round);
        }
        Ok((generation, Arc::clone(&round.completed)))
    }
}

struct FabricShared {
    job_id: Uuid,
    size: usize,
    world: Arc<Rendezvous>,

    /// Ranks already handed to an endpoint
    claimed: Vec<AtomicBool>,

    /// Sub-groups created by splits; entries live as long as the fabric
    groups: DashMap<String, Arc<Rendezvous>>,
}

/// Simulated collective runtime for a job running on threads
///
/// One fabric hosts one job. Create a new fabric for every job.
#[derive(Clone)]
pub struct LocalFabric {
    shared: Arc<FabricShared>,
}

impl LocalFabric {
    /// Create a fabric for a job of `size` processes
    pub fn new(size: usize) -> Self {
        let job_id = Uuid::new_v4();
        info!(job_id = %job_id, size = size, "Local fabric created");

        Self {
            shared: Arc::new(FabricShared {
                job_id,
                size,
                world: Arc::new(Rendezvous::new(size)),
                claimed: (0..size).map(|_| AtomicBool::new(false)).collect(),
                groups: DashMap::new(),
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }

    pub fn job_id(&self) -> Uuid {
        self.shared.job_id
    }

    /// Number of sub-groups registered by splits so far
    pub fn group_count(&self) -> usize {
        self.shared.groups.len()
    }

    /// Endpoint for the process holding `rank`
    ///
    /// A rank can be joined once per fabric.
    pub fn join(&self, rank: Rank) -> Result<LocalGroupService> {
        let claimed = self
            .shared
            .claimed
            .get(rank)
            .ok_or_else(|| Error::GroupServiceUnavailable {
                message: format!("rank {} outside job of size {}", rank, self.shared.size),
            })?;

        if claimed.swap(true, Ordering::SeqCst) {
            return Err(Error::GroupServiceUnavailable {
                message: format!("rank {} already joined job {}", rank, self.shared.job_id),
            });
        }

        Ok(LocalGroupService {
            fabric: Some(Arc::clone(&self.shared)),
            rank,
            finalized: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Endpoints for every rank, in rank order
    ///
    /// Fails if any rank was already joined.
    pub fn endpoints(&self) -> Result<Vec<LocalGroupService>> {
        (0..self.shared.size).map(|rank| self.join(rank)).collect()
    }
}

/// Per-process endpoint of a [`LocalFabric`]
pub struct LocalGroupService {
    fabric: Option<Arc<FabricShared>>,
    rank: Rank,
    finalized: Arc<AtomicBool>,
}

impl LocalGroupService {
    /// Endpoint attached to no fabric; rank discovery always fails
    pub fn unreachable() -> Self {
        Self {
            fabric: None,
            rank: 0,
            finalized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}

impl GroupService for LocalGroupService {
    type Group = LocalGroup;

    fn world(&self) -> Result<LocalGroup> {
        let fabric = self
            .fabric
            .as_ref()
            .ok_or_else(|| Error::GroupServiceUnavailable {
                message: "endpoint is not attached to a fabric".to_string(),
            })?;

        if self.is_finalized() {
            return Err(Error::GroupServiceUnavailable {
                message: "endpoint already finalized".to_string(),
            });
        }

        Ok(LocalGroup {
            id: format!("{}/world", fabric.job_id),
            rank: self.rank,
            size: fabric.size,
            rendezvous: Arc::clone(&fabric.world),
            fabric: Arc::clone(fabric),
            finalized: Arc::clone(&self.finalized),
        })
    }

    fn finalize(&self) -> Result<()> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Err(Error::GroupServiceUnavailable {
                message: "endpoint already finalized".to_string(),
            });
        }
        debug!(rank = self.rank, "Local endpoint finalized");
        Ok(())
    }
}

/// Group of ranks on a [`LocalFabric`]
pub struct LocalGroup {
    id: String,
    rank: Rank,
    size: usize,
    rendezvous: Arc<Rendezvous>,
    fabric: Arc<FabricShared>,
    finalized: Arc<AtomicBool>,
}

impl LocalGroup {
    /// Fabric-wide identifier of this group
    pub fn id(&self) -> &str {
        &self.id
    }

    fn exchange(&self, contribution: Contribution) -> Result<(u64, Arc<Vec<Contribution>>)> {
        let operation = contribution.kind();
        if self.finalized.load(Ordering::SeqCst) {
            return Err(Error::GroupServiceUnavailable {
                message: format!("{} on finalized endpoint", operation),
            });
        }

        let (generation, round) = self.rendezvous.exchange(self.rank, contribution)?;

        if let Some(other) = round.iter().find(|c| c.kind() != operation) {
            return Err(Error::collective(
                operation,
                format!(
                    "group {} round {} mixed {} with {}",
                    self.id,
                    generation,
                    operation,
                    other.kind()
                ),
            ));
        }
        Ok((generation, round))
    }
}

impl GroupHandle for LocalGroup {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        self.exchange(Contribution::Barrier)?;
        Ok(())
    }

    fn all_gather(&self, value: &str) -> Result<Vec<Address>> {
        let (_, round) = self.exchange(Contribution::Address(value.to_string()))?;

        Ok(round
            .iter()
            .filter_map(|c| match c {
                Contribution::Address(address) => Some(address.clone()),
                _ => None,
            })
            .collect())
    }

    fn split(&self, color: Option<u32>) -> Result<Option<Self>> {
        let (generation, round) = self.exchange(Contribution::Color(color))?;

        let Some(color) = color else {
            return Ok(None);
        };

        let members: Vec<Rank> = round
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Contribution::Color(Some(color)))
            .map(|(rank, _)| rank)
            .collect();

        let rank = members
            .iter()
            .position(|&member| member == self.rank)
            .ok_or_else(|| Error::collective("split", "member missing from its own color"))?;

        let id = format!("{}/{}:{}", self.id, generation, color);
        let rendezvous = Arc::clone(
            self.fabric
                .groups
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Rendezvous::new(members.len())))
                .value(),
        );

        debug!(
            group = %id,
            parent_rank = self.rank,
            rank = rank,
            size = members.len(),
            "Group split"
        );

        Ok(Some(LocalGroup {
            id,
            rank,
            size: members.len(),
            rendezvous,
            fabric: Arc::clone(&self.fabric),
            finalized: Arc::clone(&self.finalized),
        }))
    }
}
