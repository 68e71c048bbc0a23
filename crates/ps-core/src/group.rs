//! Group service interface
//!
//! Narrow view of the collective-communication runtime the coordinator is
//! built on. Every collective here is a blocking rendezvous: it returns only
//! once all members of the group have entered the same call, and it has no
//! timeout. A member that never arrives stalls the rest of its group.

use crate::{Address, Rank, Result};

/// Handle to a group of processes able to run collectives together
pub trait GroupHandle: Send + Sync + Sized {
    /// Rank of this process within the group
    fn rank(&self) -> Rank;

    /// Number of processes in the group
    fn size(&self) -> usize;

    /// Block until every member of the group has entered the barrier
    fn barrier(&self) -> Result<()>;

    /// Exchange one address per member
    ///
    /// The result is ordered by group rank and identical on every member.
    fn all_gather(&self, value: &str) -> Result<Vec<Address>>;

    /// Partition the group by color
    ///
    /// Collective over this group. Members passing the same `Some(color)`
    /// form a new group ordered by their rank here; members passing `None`
    /// take part in the exchange but receive no handle.
    fn split(&self, color: Option<u32>) -> Result<Option<Self>>;
}

/// Entry point to the collective runtime for one process
pub trait GroupService: Send + Sync {
    /// Group type produced by this service
    type Group: GroupHandle;

    /// Discover this process's rank and the job size
    ///
    /// Returns the group spanning the whole job.
    fn world(&self) -> Result<Self::Group>;

    /// Release the runtime's resources for this process
    fn finalize(&self) -> Result<()>;
}
