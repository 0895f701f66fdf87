//! Process tree discovery and termination.
//!
//! Flow tools routinely spawn their own helpers, so killing a worker is not
//! enough: every descendant has to go too. Workers are started as leaders of
//! their own process group, which lets a single `killpg` reach helpers even
//! after they have been re-parented, and the explicit descendant walk covers
//! tools that move themselves into a new group.

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessStatus, RefreshKind, System};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Snapshot of the live process table.
pub struct ProcessSnapshot {
    parents: HashMap<u32, u32>,
}

impl ProcessSnapshot {
    pub fn capture() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new()),
        );

        let parents = system
            .processes()
            .iter()
            // threads show up as children of their process on Linux
            .filter(|(_, p)| p.thread_kind().is_none())
            .filter(|(_, p)| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
            .map(|(pid, p)| (pid.as_u32(), p.parent().map_or(0, |pp| pp.as_u32())))
            .collect();
        Self { parents }
    }

    /// Whether `pid` is running. Zombies count as dead.
    pub fn is_alive(&self, pid: u32) -> bool {
        self.parents.contains_key(&pid)
    }

    /// All live descendants of `root`, breadth first, excluding `root`.
    pub fn descendants(&self, root: u32) -> Vec<u32> {
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for (&pid, &parent) in &self.parents {
            children.entry(parent).or_default().push(pid);
        }

        let mut found = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(pid) = queue.pop_front() {
            if let Some(kids) = children.get(&pid) {
                for &kid in kids {
                    if kid != root && !found.contains(&kid) {
                        found.push(kid);
                        queue.push_back(kid);
                    }
                }
            }
        }
        found
    }
}

/// What a reap did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapSummary {
    /// Processes signalled with SIGTERM
    pub terminated: usize,
    /// Processes still alive after the grace period and sent SIGKILL
    pub killed: usize,
}

/// Terminate `root` and all its descendants.
///
/// When `group` is set, `root` is also treated as a process group leader and
/// the whole group is signalled. Survivors of the grace period are killed.
pub async fn reap_tree(root: u32, group: bool, grace: Duration) -> ReapSummary {
    let mut members = ProcessSnapshot::capture().descendants(root);
    members.push(root);
    reap_pids(&members, group.then_some(root), grace).await
}

/// Terminate every descendant of the current process.
pub async fn reap_own_descendants(grace: Duration) -> ReapSummary {
    let me = std::process::id();
    let members = ProcessSnapshot::capture().descendants(me);
    if members.is_empty() {
        return ReapSummary::default();
    }
    debug!(count = members.len(), "Reaping leftover descendants");
    reap_pids(&members, None, grace).await
}

async fn reap_pids(members: &[u32], group: Option<u32>, grace: Duration) -> ReapSummary {
    if let Some(pgid) = group {
        signal_group(pgid, Signal::SIGTERM);
    }
    let mut summary = ReapSummary::default();
    for &pid in members {
        if signal_pid(pid, Signal::SIGTERM) {
            summary.terminated += 1;
        }
    }

    let deadline = Instant::now() + grace;
    let mut survivors: Vec<u32> = members.to_vec();
    loop {
        let snapshot = ProcessSnapshot::capture();
        survivors.retain(|&pid| snapshot.is_alive(pid));
        if survivors.is_empty() || Instant::now() >= deadline {
            break;
        }
        sleep(POLL_INTERVAL).await;
    }

    if !survivors.is_empty() {
        warn!(
            survivors = ?survivors,
            grace_ms = grace.as_millis() as u64,
            "Processes ignored SIGTERM, sending SIGKILL"
        );
    }
    if let Some(pgid) = group {
        signal_group(pgid, Signal::SIGKILL);
    }
    for &pid in &survivors {
        if signal_pid(pid, Signal::SIGKILL) {
            summary.killed += 1;
        }
    }
    summary
}

/// SIGKILL a process group without waiting. Safe to call from `Drop`.
pub fn kill_group_now(pgid: u32) {
    signal_group(pgid, Signal::SIGKILL);
}

fn signal_pid(pid: u32, signal: Signal) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), signal) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(e) => {
            debug!(pid, ?signal, error = %e, "Failed to signal process");
            false
        }
    }
}

fn signal_group(pgid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    if raw <= 1 {
        return;
    }
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pgid, ?signal, error = %e, "Failed to signal process group"),
    }
}
