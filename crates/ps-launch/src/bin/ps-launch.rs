//! Launcher binary entry point
//!
//! Simulates a parameter-server job on threads and prints each rank's role.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ps_core::config::{ENV_PROC_PER_NODE, ENV_SERVER_WORKER_MODE};
use ps_core::{PlacementMode, RoleAssignment};
use ps_launch::{plan, run, JobSpec};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(default_value = "4", long, help = "total number of processes in the job")]
    world_size: usize,

    #[clap(
        default_value = "2",
        long,
        env = ENV_PROC_PER_NODE,
        help = "processes launched on each node"
    )]
    proc_per_node: usize,

    #[clap(
        default_value = "0",
        long,
        env = ENV_SERVER_WORKER_MODE,
        help = "placement mode: 0 contiguous, 1 interleaved"
    )]
    mode: u8,

    #[clap(default_value = "8500", long, help = "port advertised by rank 0")]
    base_port: u16,

    #[clap(long, help = "print the role layout without running the job")]
    dry_run: bool,

    #[clap(long, help = "print reports as JSON")]
    json: bool,
}

fn describe(assignment: &RoleAssignment) -> String {
    match assignment.index() {
        Some(index) => format!("{} #{}", assignment.role(), index),
        None => assignment.role().to_string(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ps_launch=info,ps_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut spec = JobSpec::new(
        args.world_size,
        args.proc_per_node,
        PlacementMode::from(args.mode),
    );
    spec.base_port = args.base_port;

    if args.dry_run {
        let layout = plan(&spec)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&layout)?);
        } else {
            for (rank, assignment) in layout.iter().enumerate() {
                println!("rank {:>4}: {}", rank, describe(assignment));
            }
        }
        return Ok(());
    }

    let reports = run(&spec)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!(
                "rank {:>4}: {:<12} address {}{}",
                report.rank,
                describe(&report.assignment),
                report.addresses[report.rank],
                if report.first_worker { "  (first worker)" } else { "" }
            );
        }
    }

    Ok(())
}
