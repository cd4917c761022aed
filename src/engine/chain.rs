//! Stage descriptors and the messages that flow back from running stages
//!
//! A cut chain is a tree of immutable [`StageSpec`]s. A node's children may
//! only start after the node itself exits successfully. Running stages report
//! their lifecycle as [`StageEvent`]s over a channel; the orchestrator is the
//! only consumer.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

use crate::domain::model::{ChainId, Time};

/// Which step of a cut a stage performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Cut,
    Reverse,
    Merge,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Cut => "cutter",
            StageKind::Reverse => "reverser",
            StageKind::Merge => "merger",
        };
        f.write_str(name)
    }
}

/// File written by the launcher right before the stage's process spawns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchFile {
    pub path: PathBuf,
    pub contents: String,
}

/// One external-process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub kind: StageKind,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Expected length of the produced media, used to clamp progress
    pub target_duration: Time,
    pub scratch: Option<ScratchFile>,
}

impl StageSpec {
    pub fn new(kind: StageKind, program: impl Into<PathBuf>, target_duration: Time) -> Self {
        Self {
            kind,
            program: program.into(),
            args: Vec::new(),
            target_duration,
            scratch: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_scratch(mut self, scratch: ScratchFile) -> Self {
        self.scratch = Some(scratch);
        self
    }

    /// Program and arguments as one line, for logs
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// A stage and the stages gated on its success. Children are owned
/// exclusively, so a plan is always a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNode {
    pub spec: StageSpec,
    pub children: Vec<StageNode>,
}

impl StageNode {
    pub fn leaf(spec: StageSpec) -> Self {
        Self {
            spec,
            children: Vec::new(),
        }
    }

    pub fn then(mut self, child: StageNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of stages in this subtree
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(StageNode::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Stages in pre-order (parent before children)
    pub fn preorder(&self) -> Vec<&StageSpec> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(&node.spec);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// Everything needed to run one cut
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPlan {
    pub root: StageNode,
    /// Final export, recorded on the sequence when the chain succeeds
    pub output: PathBuf,
    /// Intermediate files deleted after the whole chain succeeds
    pub artifacts: Vec<PathBuf>,
}

impl ChainPlan {
    /// Every file the chain may create
    pub fn written_paths(&self) -> impl Iterator<Item = &PathBuf> + '_ {
        self.artifacts.iter().chain(std::iter::once(&self.output))
    }
}

/// Addresses one stage of one running chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageTicket {
    pub chain: ChainId,
    pub stage: usize,
}

impl fmt::Display for StageTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/stage#{}", self.chain, self.stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How a stage ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageExit {
    /// Process exited; `-1` when it was terminated by a signal
    Exited(i32),
    /// Process could not be started (or its scratch file not written)
    SpawnFailed(String),
    Cancelled,
    TimedOut,
}

impl StageExit {
    pub fn is_success(&self) -> bool {
        matches!(self, StageExit::Exited(0))
    }
}

impl fmt::Display for StageExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageExit::Exited(code) => write!(f, "exit code {}", code),
            StageExit::SpawnFailed(message) => write!(f, "failed to start: {}", message),
            StageExit::Cancelled => write!(f, "cancelled"),
            StageExit::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Lifecycle message from a running stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    Started {
        ticket: StageTicket,
    },
    Output {
        ticket: StageTicket,
        stream: OutputStream,
        chunk: String,
    },
    Finished {
        ticket: StageTicket,
        exit: StageExit,
    },
}

impl StageEvent {
    pub fn ticket(&self) -> StageTicket {
        match self {
            StageEvent::Started { ticket }
            | StageEvent::Output { ticket, .. }
            | StageEvent::Finished { ticket, .. } => *ticket,
        }
    }
}

pub type StageEventSender = mpsc::UnboundedSender<StageEvent>;
pub type StageEventReceiver = mpsc::UnboundedReceiver<StageEvent>;

/// Owner's handle on a launched stage. Cancelling or dropping it tells the
/// launcher to terminate the process.
#[derive(Debug, Default)]
pub struct StageControl {
    cancel: Option<oneshot::Sender<()>>,
}

impl StageControl {
    pub fn new(cancel: oneshot::Sender<()>) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    /// Control for a stage with nothing to stop
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: StageKind) -> StageSpec {
        StageSpec::new(kind, "ffmpeg", Time::from_secs(1))
    }

    #[test]
    fn test_preorder_visits_parent_first() {
        let tree = StageNode::leaf(spec(StageKind::Cut))
            .then(StageNode::leaf(spec(StageKind::Reverse)).then(StageNode::leaf(spec(StageKind::Merge))));
        let kinds: Vec<StageKind> = tree.preorder().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StageKind::Cut, StageKind::Reverse, StageKind::Merge]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_command_line() {
        let spec = spec(StageKind::Reverse).args(["-i", "a.mp4"]).arg("-y");
        assert_eq!(spec.command_line(), "ffmpeg -i a.mp4 -y");
    }

    #[test]
    fn test_cancel_signals_receiver() {
        let (tx, mut rx) = oneshot::channel();
        StageControl::new(tx).cancel();
        assert_eq!(rx.try_recv(), Ok(()));
    }

    #[test]
    fn test_only_zero_exit_is_success() {
        assert!(StageExit::Exited(0).is_success());
        assert!(!StageExit::Exited(1).is_success());
        assert!(!StageExit::Cancelled.is_success());
        assert!(!StageExit::SpawnFailed("missing".into()).is_success());
    }
}
