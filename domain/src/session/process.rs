//! Supervised process lifecycle and process tree

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Lifecycle of the supervised server process.
///
/// `NotStarted → Starting → Running → Terminating → Terminated`. A process
/// that fails its startup handshake stays in `Starting` until it is reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    NotStarted,
    Starting,
    Running,
    Terminating,
    Terminated,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::NotStarted => "not_started",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Terminating => "terminating",
            ProcessState::Terminated => "terminated",
        }
    }

    pub fn can_transition_to(&self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (NotStarted, Starting)
                | (Starting, Running)
                | (Starting, Terminating)
                | (Starting, Terminated)
                | (Running, Terminating)
                | (Running, Terminated)
                | (Terminating, Terminated)
        )
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The supervised process and every descendant observed so far.
///
/// Append-only: pids are unioned in and never removed, so repeated or
/// concurrent tracking passes are harmless. Used for post-mortem leak checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessTree {
    root: Option<u32>,
    descendants: BTreeSet<u32>,
}

impl ProcessTree {
    pub fn new(root: u32) -> Self {
        Self {
            root: Some(root),
            descendants: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> Option<u32> {
        self.root
    }

    pub fn descendants(&self) -> &BTreeSet<u32> {
        &self.descendants
    }

    /// Root first, then descendants in ascending order.
    pub fn pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.root.into_iter().chain(self.descendants.iter().copied())
    }

    /// Union `pids` into the tree, returning how many were new.
    pub fn union(&mut self, pids: impl IntoIterator<Item = u32>) -> usize {
        let root = self.root;
        pids.into_iter()
            .filter(|pid| Some(*pid) != root)
            .filter(|pid| self.descendants.insert(*pid))
            .count()
    }

    /// Walk a process table snapshot of `(pid, parent)` pairs and union in
    /// every transitive child of the root.
    pub fn track(&mut self, table: impl IntoIterator<Item = (u32, Option<u32>)>) -> usize {
        let Some(root) = self.root else {
            return 0;
        };

        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for (pid, parent) in table {
            if let Some(parent) = parent {
                children.entry(parent).or_default().push(pid);
            }
        }

        let mut found = Vec::new();
        let mut stack = vec![root];
        let mut seen = BTreeSet::from([root]);
        while let Some(pid) = stack.pop() {
            for &child in children.get(&pid).into_iter().flatten() {
                if seen.insert(child) {
                    found.push(child);
                    stack.push(child);
                }
            }
        }
        self.union(found)
    }

    /// Pids of this tree that are present in `live`.
    pub fn survivors(&self, live: &BTreeSet<u32>) -> Vec<u32> {
        self.pids().filter(|pid| live.contains(pid)).collect()
    }

    pub fn len(&self) -> usize {
        self.root.iter().count() + self.descendants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
