use serde::Serialize;
use tracing::debug;

use crate::native::ProcessInspector;

/// Upper bound on ancestors followed from a single pid.
pub const MAX_ANCESTRY_DEPTH: usize = 64;

/// Pids from a starting process up to its topmost resolvable ancestor.
///
/// Always holds at least the starting pid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProcessAncestryChain {
    pids: Vec<u32>,
}

impl ProcessAncestryChain {
    pub fn start(&self) -> u32 {
        self.pids[0]
    }

    pub fn top_level_ancestor(&self) -> u32 {
        self.pids[self.pids.len() - 1]
    }

    pub fn pids(&self) -> &[u32] {
        &self.pids
    }

    /// Resolved ancestors, excluding the starting pid.
    pub fn ancestors(&self) -> &[u32] {
        &self.pids[1..]
    }

    pub fn depth(&self) -> usize {
        self.pids.len() - 1
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.pids.contains(&pid)
    }
}

/// Walks recorded parent pids.
///
/// Pids are reused by the OS after exit, so a recorded parent may not be the
/// process that actually spawned the child.
#[derive(Debug)]
pub struct ProcessAncestryResolver<'a, P: ProcessInspector + ?Sized> {
    inspector: &'a P,
    max_depth: usize,
}

impl<'a, P: ProcessInspector + ?Sized> ProcessAncestryResolver<'a, P> {
    pub fn new(inspector: &'a P) -> Self {
        Self {
            inspector,
            max_depth: MAX_ANCESTRY_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parent of `pid`. A recorded parent of 0 or of `pid` itself counts as
    /// no parent.
    pub fn parent_of(&self, pid: u32) -> Option<u32> {
        self.inspector
            .parent_of(pid)
            .filter(|parent| *parent != 0 && *parent != pid)
    }

    pub fn chain_of(&self, pid: u32) -> ProcessAncestryChain {
        let mut pids = vec![pid];
        let mut current = pid;

        while pids.len() <= self.max_depth {
            let Some(parent) = self.parent_of(current) else {
                break;
            };
            if pids.contains(&parent) {
                debug!(pid, parent, "process ancestry cycle detected");
                break;
            }
            pids.push(parent);
            current = parent;
        }

        ProcessAncestryChain { pids }
    }

    /// Root of the chain, or `pid` itself when no parent resolves.
    pub fn top_level_ancestor_of(&self, pid: u32) -> u32 {
        self.chain_of(pid).top_level_ancestor()
    }
}
