//! PS Core - role assignment for parameter-server training jobs
//!
//! Assigns every process of a fixed-size job a server, worker, or idle
//! role from its global rank, splits the job's communication group into
//! role groups, and exposes job-wide and role-scoped coordination on top of
//! a pluggable group service.

pub mod config;
pub mod error;
pub mod fs;
pub mod group;
pub mod instance;
pub mod local;
pub mod net;
pub mod partition;
pub mod types;

pub use config::RoleConfig;
pub use error::{Error, Result};
pub use fs::{FileSystem, FsClientDescriptor};
pub use group::{GroupHandle, GroupService};
pub use instance::{InstanceCoordinator, InstanceState, RoleGroup};
pub use local::{LocalFabric, LocalGroup, LocalGroupService};
pub use partition::{derive, JobTopology};
pub use types::*;
