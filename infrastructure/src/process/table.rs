//! OS process table snapshots.

use std::collections::BTreeSet;
use sysinfo::{ProcessStatus, RefreshKind, System};

/// Every live process as `(pid, parent pid)`.
///
/// Zombies are left out: they have exited and only wait to be reaped.
pub fn snapshot() -> Vec<(u32, Option<u32>)> {
    let sys = System::new_with_specifics(RefreshKind::everything().without_cpu().without_memory());

    sys.processes()
        .iter()
        .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
        .map(|(pid, process)| (pid.as_u32(), process.parent().map(|p| p.as_u32())))
        .collect()
}

/// Pids of every live process.
pub fn live_pids() -> BTreeSet<u32> {
    snapshot().into_iter().map(|(pid, _)| pid).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_contains_current_process() {
        let me = std::process::id();
        let table = snapshot();
        let (_, parent) = table
            .iter()
            .find(|(pid, _)| *pid == me)
            .expect("current process missing from snapshot");
        assert!(parent.is_some());
        assert!(live_pids().contains(&me));
    }
}
