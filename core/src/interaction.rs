//! Runs one interactor against one or more candidate nodes.
//!
//! In [`Wiring::Direct`] mode the single node and the interactor talk over two
//! anonymous pipes crossing their stdin/stdout. In [`Wiring::Fifo`] mode every
//! node gets its own pair of named pipes inside a scratch directory; a node
//! receives `to_node from_node [id]` and the interactor receives its extra
//! arguments followed by `from_node_i to_node_i` for each node in order.
//! Both ends open the node-to-interactor pipe first, which is what keeps the
//! blocking FIFO opens from deadlocking.

use std::{
    io,
    path::Path,
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use tokio::{sync::Semaphore, task::JoinSet};

use crate::program::{self, ExitKind, Program, ProgramError};

#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    #[error("Interaction needs at least one node")]
    NoNodes,

    #[error("Direct wiring supports exactly one node, got {0}")]
    DirectNeedsOneNode(usize),

    #[error("{participants} participants must run at once, but only {workers} workers are allowed")]
    TooFewWorkers { workers: usize, participants: usize },

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Fs(#[from] fsutil::Error),

    #[error("Failed to spawn {0}: {1}")]
    Spawn(Role, #[source] io::Error),

    #[error("Failed to wait for {0}: {1}")]
    Wait(Role, #[source] io::Error),

    #[error("Participant task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Wiring {
    #[default]
    Direct,
    Fifo,
}

/// Where candidate stderr goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StderrSink {
    #[default]
    Discard,
    Inherit,
}

impl StderrSink {
    pub(crate) fn stdio(self) -> Stdio {
        match self {
            StderrSink::Discard => Stdio::null(),
            StderrSink::Inherit => Stdio::inherit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Node(usize),
    Interactor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Node(i) => write!(f, "node {}", i),
            Role::Interactor => f.write_str("interactor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantResult {
    pub status: ExitKind,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct InteractionReport {
    pub nodes: Vec<ParticipantResult>,
    pub interactor: ParticipantResult,
    pub interactor_stderr: Vec<u8>,
}

impl InteractionReport {
    pub fn any_node_timed_out(&self) -> bool {
        self.nodes.iter().any(|n| n.status == ExitKind::TimedOut)
    }

    /// The first node that did not exit cleanly, if any.
    pub fn first_failed_node(&self) -> Option<(usize, ParticipantResult)> {
        self.nodes
            .iter()
            .copied()
            .enumerate()
            .find(|(_, n)| !n.status.success())
    }
}

pub struct Interaction<'a> {
    interactor: &'a Program,
    candidate: &'a Program,
    nodes: usize,
    wiring: Wiring,
    pass_node_id: bool,
    interactor_args: Vec<String>,
    timeout: Duration,
    interactor_timeout: Option<Duration>,
    slack: Duration,
    max_workers: usize,
    stderr_capture_max_bytes: usize,
    candidate_stderr: StderrSink,
}

impl<'a> Interaction<'a> {
    pub const DEFAULT_SLACK: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_WORKERS: usize = 16;

    pub fn new(interactor: &'a Program, candidate: &'a Program) -> Self {
        Self {
            interactor,
            candidate,
            nodes: 1,
            wiring: Wiring::Direct,
            pass_node_id: false,
            interactor_args: Vec::new(),
            timeout: Duration::from_secs(2),
            interactor_timeout: None,
            slack: Self::DEFAULT_SLACK,
            max_workers: Self::DEFAULT_MAX_WORKERS,
            stderr_capture_max_bytes: 64 * 1024,
            candidate_stderr: StderrSink::Discard,
        }
    }

    pub fn nodes(mut self, n: usize) -> Self {
        self.nodes = n;
        self
    }

    pub fn wiring(mut self, wiring: Wiring) -> Self {
        self.wiring = wiring;
        self
    }

    pub fn pass_node_id(mut self, yes: bool) -> Self {
        self.pass_node_id = yes;
        self
    }

    pub fn interactor_args(mut self, args: Vec<String>) -> Self {
        self.interactor_args = args;
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = limit;
        self
    }

    pub fn interactor_timeout(mut self, limit: Option<Duration>) -> Self {
        self.interactor_timeout = limit;
        self
    }

    pub fn slack(mut self, slack: Duration) -> Self {
        self.slack = slack;
        self
    }

    pub fn max_workers(mut self, cap: usize) -> Self {
        self.max_workers = cap.max(1);
        self
    }

    pub fn stderr_capture_max_bytes(mut self, n: usize) -> Self {
        self.stderr_capture_max_bytes = n;
        self
    }

    pub fn candidate_stderr(mut self, sink: StderrSink) -> Self {
        self.candidate_stderr = sink;
        self
    }

    /// The interactor must outlive the slowest node.
    pub fn interactor_time_limit(&self) -> Duration {
        let floor = self.timeout + self.slack;
        match self.interactor_timeout {
            Some(t) => t.max(floor),
            None => floor,
        }
    }

    fn pool_size(&self) -> usize {
        self.max_workers.min(self.nodes + 1)
    }

    pub async fn run(&self) -> Result<InteractionReport, InteractionError> {
        if self.nodes == 0 {
            return Err(InteractionError::NoNodes);
        }
        // Participants block on each other's pipes, so none of them may wait
        // for a worker.
        if self.pool_size() < self.nodes + 1 {
            return Err(InteractionError::TooFewWorkers {
                workers: self.max_workers,
                participants: self.nodes + 1,
            });
        }
        match self.wiring {
            Wiring::Direct => self.run_direct().await,
            Wiring::Fifo => self.run_fifo().await,
        }
    }

    async fn run_direct(&self) -> Result<InteractionReport, InteractionError> {
        if self.nodes != 1 {
            return Err(InteractionError::DirectNeedsOneNode(self.nodes));
        }
        let (to_interactor_r, to_interactor_w) = fsutil::pipe()?;
        let (to_node_r, to_node_w) = fsutil::pipe()?;

        let node = Launch {
            role: Role::Node(0),
            args: Vec::new(),
            stdin: Stdio::from(to_node_r),
            stdout: Stdio::from(to_interactor_w),
        };
        let interactor = Launch {
            role: Role::Interactor,
            args: self.interactor_args.clone(),
            stdin: Stdio::from(to_interactor_r),
            stdout: Stdio::from(to_node_w),
        };
        self.execute(vec![node], interactor).await
    }

    async fn run_fifo(&self) -> Result<InteractionReport, InteractionError> {
        // Removed on every return path when dropped.
        let scratch = fsutil::scratch_dir("kjudge-fifo-")?;
        let dir = scratch.path();

        let mut nodes = Vec::with_capacity(self.nodes);
        let mut interactor_args = self.interactor_args.clone();
        for i in 0..self.nodes {
            let to_node = fsutil::create_fifo(dir.join(format!("node{}.in", i)))?;
            let from_node = fsutil::create_fifo(dir.join(format!("node{}.out", i)))?;

            let mut args = vec![path_arg(&to_node), path_arg(&from_node)];
            if self.pass_node_id {
                args.push(i.to_string());
            }
            nodes.push(Launch {
                role: Role::Node(i),
                args,
                stdin: Stdio::null(),
                stdout: Stdio::null(),
            });
            interactor_args.push(path_arg(&from_node));
            interactor_args.push(path_arg(&to_node));
        }
        let interactor = Launch {
            role: Role::Interactor,
            args: interactor_args,
            stdin: Stdio::null(),
            stdout: Stdio::null(),
        };

        let report = self.execute(nodes, interactor).await;
        drop(scratch);
        report
    }

    async fn execute(
        &self,
        nodes: Vec<Launch>,
        interactor: Launch,
    ) -> Result<InteractionReport, InteractionError> {
        let permits = Arc::new(Semaphore::new(self.pool_size()));
        let mut set = JoinSet::new();

        let interactor_limit = self.interactor_time_limit();
        let mut launches: Vec<(Launch, &Program, Duration, Stdio)> = nodes
            .into_iter()
            .map(|l| (l, self.candidate, self.timeout, self.candidate_stderr.stdio()))
            .collect();
        launches.push((interactor, self.interactor, interactor_limit, Stdio::piped()));

        for (launch, program, limit, stderr) in launches {
            let Launch {
                role,
                args,
                stdin,
                stdout,
            } = launch;
            let mut cmd = program.command(&args)?;
            cmd.stdin(stdin).stdout(stdout).stderr(stderr);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let spawned = cmd.spawn();
                // Drops the parent's copies of the pipe ends.
                drop(cmd);
                let mut child = spawned.map_err(|e| InteractionError::Spawn(role, e))?;
                log::debug!("Spawned {}", role);
                let stderr = match role {
                    Role::Interactor => program::capture(child.stderr.take()),
                    Role::Node(_) => None,
                };
                let (status, elapsed) = program::wait_with_limit(&mut child, Some(limit))
                    .await
                    .map_err(|e| InteractionError::Wait(role, e))?;
                log::debug!("{} finished: {} in {:?}", role, status, elapsed);
                let stderr = program::collect(stderr).await;
                Ok::<_, InteractionError>((role, ParticipantResult { status, elapsed }, stderr))
            });
        }

        let mut node_results = vec![None; self.nodes];
        let mut interactor_result = None;
        let mut interactor_stderr = Vec::new();
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(InteractionError::from).and_then(|r| r);
            let (role, result, stderr) = match outcome {
                Ok(v) => v,
                Err(e) => {
                    set.abort_all();
                    return Err(e);
                }
            };
            match role {
                Role::Node(i) => node_results[i] = Some(result),
                Role::Interactor => {
                    interactor_result = Some(result);
                    interactor_stderr = stderr;
                }
            }
        }
        interactor_stderr.truncate(self.stderr_capture_max_bytes);

        let nodes = node_results
            .into_iter()
            .map(|r| r.unwrap_or(MISSING))
            .collect();
        Ok(InteractionReport {
            nodes,
            interactor: interactor_result.unwrap_or(MISSING),
            interactor_stderr,
        })
    }
}

// Every spawned participant reports back, so this only fills holes that
// cannot be observed.
const MISSING: ParticipantResult = ParticipantResult {
    status: ExitKind::Exited(-1),
    elapsed: Duration::ZERO,
};

struct Launch {
    role: Role,
    args: Vec<String>,
    stdin: Stdio,
    stdout: Stdio,
}

fn path_arg(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}
