//! Launcher for simulated parameter-server jobs
//!
//! Runs every rank of a job as a thread over an in-process group service:
//! - **Planning**: computes the role layout without starting any rank
//! - **Simulation**: builds an instance per rank, exchanges addresses, and
//!   runs role and job barriers before finalizing
//!
//! # Example
//!
//! ```ignore
//! use ps_core::PlacementMode;
//! use ps_launch::{run, JobSpec};
//!
//! let reports = run(&JobSpec::new(8, 4, PlacementMode::Interleaved))?;
//! assert_eq!(reports.len(), 8);
//! ```

pub mod job;

pub use job::{plan, run, JobSpec, RankReport};
