//! Whole-job tests of the instance coordinator over the local fabric
//!
//! Every test runs one thread per rank, each owning its own coordinator,
//! the way separate processes would.

use anyhow::Result;
use parking_lot::{Condvar, Mutex};
use ps_core::{
    Error, InstanceCoordinator, LocalFabric, LocalGroupService, PlacementMode, Role,
    RoleAssignment,
};
use std::sync::Arc;
use std::thread;

type Instance = InstanceCoordinator<LocalGroupService>;

/// Run `body` on every rank of a fresh job and collect results in rank order
fn run_job<T, F>(world_size: usize, ppn: usize, mode: PlacementMode, body: F) -> Vec<Result<T>>
where
    T: Send + 'static,
    F: Fn(&mut Instance) -> Result<T> + Send + Sync + 'static,
{
    let fabric = LocalFabric::new(world_size);
    let body = Arc::new(body);

    let handles: Vec<_> = fabric
        .endpoints()
        .expect("fresh fabric hands out every rank")
        .into_iter()
        .map(|endpoint| {
            let body = Arc::clone(&body);
            thread::spawn(move || -> Result<T> {
                let mut instance = InstanceCoordinator::new(endpoint, mode, ppn)?;
                body(&mut instance)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked"))
        .collect()
}

fn unwrap_all<T>(results: Vec<Result<T>>) -> Vec<T> {
    results
        .into_iter()
        .enumerate()
        .map(|(rank, r)| r.unwrap_or_else(|e| panic!("rank {} failed: {:?}", rank, e)))
        .collect()
}

#[test]
fn test_gather_addresses_indexed_by_rank() {
    let results = unwrap_all(run_job(8, 4, PlacementMode::Contiguous, |instance| {
        let rank = instance.rank();
        instance.set_address(format!("stale-{}", rank))?;
        instance.set_address(format!("10.0.{}.1:8500", rank))?;
        Ok(instance.gather_addresses()?)
    }));

    let expected: Vec<String> = (0..8).map(|r| format!("10.0.{}.1:8500", r)).collect();
    for gathered in results {
        assert_eq!(gathered, expected);
    }
}

#[test]
fn test_regather_resynchronizes_addresses() {
    let results = unwrap_all(run_job(4, 2, PlacementMode::Interleaved, |instance| {
        let rank = instance.rank();
        instance.set_address(format!("a-{}", rank))?;
        let first = instance.gather_addresses()?;

        if rank == 3 {
            instance.set_address("moved")?;
        }
        let second = instance.gather_addresses()?;
        assert_eq!(instance.addresses(), Some(second.as_slice()));
        Ok((first, second))
    }));

    for (first, second) in results {
        assert_eq!(first[3], "a-3");
        assert_eq!(second[3], "moved");
        assert_eq!(second[0], "a-0");
    }
}

#[test]
fn test_role_barriers_release_independently() {
    // Servers finish all their role barriers before any worker enters one.
    // If role barriers spanned both roles this would deadlock.
    let servers_done = Arc::new((Mutex::new(0usize), Condvar::new()));
    let shared = Arc::clone(&servers_done);

    let results = unwrap_all(run_job(8, 4, PlacementMode::Contiguous, move |instance| {
        let (count, cond) = &*shared;
        let servers = instance.topology().server_count();

        if instance.is_server() {
            for _ in 0..3 {
                instance.barrier_role()?;
            }
            *count.lock() += 1;
            cond.notify_all();
        } else {
            let mut done = count.lock();
            while *done < servers {
                cond.wait(&mut done);
            }
            drop(done);
            for _ in 0..5 {
                instance.barrier_role()?;
            }
        }

        instance.barrier_all()?;
        Ok(instance.role())
    }));

    assert_eq!(results.iter().filter(|r| **r == Role::Server).count(), 4);
    assert_eq!(*servers_done.0.lock(), 4);
}

#[test]
fn test_first_worker_unique_per_job() {
    for (world_size, ppn, mode, expected) in [
        (8, 4, PlacementMode::Contiguous, 4),
        (8, 4, PlacementMode::Interleaved, 1),
        (12, 6, PlacementMode::Interleaved, 1),
        (2, 1, PlacementMode::Contiguous, 1),
    ] {
        let results = unwrap_all(run_job(world_size, ppn, mode, |instance| {
            Ok(instance.is_first_worker())
        }));

        let first: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, first)| **first)
            .map(|(rank, _)| rank)
            .collect();
        assert_eq!(first, vec![expected], "world_size={} mode={}", world_size, mode);
    }
}

#[test]
fn test_role_groups_are_dense_and_ordered() {
    let results = unwrap_all(run_job(8, 4, PlacementMode::Interleaved, |instance| {
        let group = instance.role_group().expect("active rank has a role group");
        Ok((instance.assignment(), group.rank(), group.size()))
    }));

    // Servers sit at ranks 0, 2, 4, 6; workers at 1, 3, 5, 7.
    assert_eq!(results[0], (RoleAssignment::Server { index: 0 }, 0, 4));
    assert_eq!(results[2], (RoleAssignment::Server { index: 0 }, 1, 4));
    assert_eq!(results[6], (RoleAssignment::Server { index: 1 }, 3, 4));
    assert_eq!(results[5], (RoleAssignment::Worker { index: 1 }, 2, 4));
}

#[test]
fn test_worker_barrier_skips_servers() {
    let results = unwrap_all(run_job(6, 2, PlacementMode::Contiguous, |instance| {
        // Only workers rendezvous; servers return immediately.
        instance.barrier_worker()?;
        instance.barrier_worker()?;
        instance.barrier_all()?;
        Ok(instance.is_worker())
    }));

    assert_eq!(results.iter().filter(|w| **w).count(), 3);
}

#[test]
fn test_idle_job() {
    let results = unwrap_all(run_job(3, 1, PlacementMode::Unknown(4), |instance| {
        assert!(instance.is_idle());
        assert!(!instance.is_first_worker());
        let no_group = matches!(instance.barrier_role(), Err(Error::NoRoleGroup { .. }));

        instance.set_address(format!("idle-{}", instance.rank()))?;
        let gathered = instance.gather_addresses()?;
        instance.barrier_all()?;
        Ok((no_group, gathered))
    }));

    for (no_group, gathered) in results {
        assert!(no_group);
        assert_eq!(gathered, vec!["idle-0", "idle-1", "idle-2"]);
    }
}

#[test]
fn test_invalid_topology_fails_on_every_rank() {
    let results = run_job(7, 2, PlacementMode::Contiguous, |_| Ok(()));

    assert_eq!(results.len(), 7);
    for result in results {
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidTopology { .. })
        ));
    }
}

#[test]
fn test_index_accessors_check_role() {
    let results = unwrap_all(run_job(4, 2, PlacementMode::Contiguous, |instance| {
        let worker = instance.worker_index();
        let server = instance.server_index();
        Ok((instance.role(), worker.ok(), server.map_err(|e| e.is_programmer_error())))
    }));

    assert_eq!(results[0], (Role::Server, None, Ok(0)));
    assert_eq!(results[1], (Role::Server, None, Ok(1)));
    assert_eq!(results[3], (Role::Worker, Some(1), Err(true)));
}

#[test]
fn test_finalize_every_rank() {
    let results = unwrap_all(run_job(4, 2, PlacementMode::Interleaved, |instance| {
        instance.barrier_all()?;
        instance.finalize()?;

        assert!(instance.role_group().is_none());
        let after = instance.barrier_role().unwrap_err();
        Ok(matches!(after, Error::InstanceFinalized { .. }))
    }));

    assert!(results.into_iter().all(|finalized| finalized));
}

#[test]
fn test_unreachable_group_service() {
    let result = InstanceCoordinator::new(
        LocalGroupService::unreachable(),
        PlacementMode::Interleaved,
        2,
    );
    assert!(matches!(result, Err(Error::GroupServiceUnavailable { .. })));
}
