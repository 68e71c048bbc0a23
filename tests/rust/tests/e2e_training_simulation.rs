//! End-to-end training simulation test
//!
//! This test simulates a parameter-server job the way a training driver
//! would use the core:
//! - Role assignment and address exchange at startup
//! - Per-step role barriers with workers and servers on their own cadence
//! - A single elected worker writing checkpoints
//! - Orderly finalize

use anyhow::Result;
use parking_lot::Mutex;
use ps_core::fs::FileSystem;
use ps_core::{InstanceCoordinator, LocalFabric, PlacementMode, RoleConfig};
use ps_launch::{plan, run, JobSpec};
use std::sync::Arc;
use std::thread;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ps_core=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn test_training_job_lifecycle() -> Result<()> {
    init_tracing();

    let world_size = 8;
    let steps = 4;
    let config = RoleConfig {
        server_worker_mode: PlacementMode::Interleaved,
        processes_per_node: 4,
        advertise_address: None,
    };
    let checkpoints = Arc::new(Mutex::new(Vec::<(usize, usize)>::new()));
    let fabric = LocalFabric::new(world_size);

    let handles: Vec<_> = fabric
        .endpoints()?
        .into_iter()
        .map(|endpoint| {
            let config = config.clone();
            let checkpoints = Arc::clone(&checkpoints);
            thread::spawn(move || -> Result<Vec<String>> {
                let mut instance = InstanceCoordinator::from_config(endpoint, &config)?;
                instance.set_address(format!("node{}:{}", instance.rank() / 4, 9000 + instance.rank()))?;
                let table = instance.gather_addresses()?;
                instance.barrier_all()?;

                for step in 0..steps {
                    if instance.is_worker() {
                        instance.barrier_worker()?;
                        if instance.is_first_worker() {
                            checkpoints.lock().push((instance.rank(), step));
                        }
                    } else {
                        instance.barrier_role()?;
                    }
                }

                instance.barrier_all()?;
                instance.finalize()?;
                Ok(table)
            })
        })
        .collect();

    let tables: Vec<Vec<String>> = handles
        .into_iter()
        .map(|h| h.join().expect("rank panicked"))
        .collect::<Result<_>>()?;

    for table in &tables {
        assert_eq!(table.len(), world_size);
        assert_eq!(table[5], "node1:9005");
        assert_eq!(table, &tables[0]);
    }

    let written = checkpoints.lock().clone();
    assert_eq!(written, (0..steps).map(|s| (1, s)).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_launcher_plan_matches_run() -> Result<()> {
    init_tracing();

    for spec in [
        JobSpec::new(8, 4, PlacementMode::Contiguous),
        JobSpec::new(8, 4, PlacementMode::Interleaved),
        JobSpec::new(4, 2, PlacementMode::Unknown(2)),
    ] {
        let layout = plan(&spec)?;
        let reports = run(&spec)?;

        assert_eq!(reports.len(), layout.len());
        for (report, assignment) in reports.iter().zip(&layout) {
            assert_eq!(report.assignment, *assignment);
            assert_eq!(report.addresses.len(), spec.world_size);
            assert_eq!(report.role_size.is_some(), !assignment.is_idle());
        }
    }
    Ok(())
}

#[test]
fn test_descriptor_handed_to_storage_client() -> Result<()> {
    let fs = FileSystem::builder()
        .uri("afs://cluster.example:9902")
        .user("trainer")
        .passwd("secret")
        .hadoop_bin("/opt/hadoop/bin/hadoop")
        .build()?;

    let desc = fs.into_descriptor();
    assert_eq!(desc.fs_type, "afs");
    assert_eq!(desc.user, "trainer");
    Ok(())
}
