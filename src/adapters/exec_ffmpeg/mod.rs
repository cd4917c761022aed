//! FFmpeg process launcher
//!
//! Runs one stage as a child process on the tokio runtime. Output is read
//! as raw chunks from both pipes, because ffmpeg rewrites its status line
//! with carriage returns and never terminates it with a newline.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::chain::{
    OutputStream, StageControl, StageEvent, StageEventSender, StageExit, StageSpec, StageTicket,
};
use crate::ports::StageLauncher;

const READ_CHUNK: usize = 4096;
const MAX_PENDING: usize = 4 * READ_CHUNK;

/// Spawns ffmpeg (or any stage program) with `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct FfmpegLauncher {
    timeout: Option<Duration>,
}

impl FfmpegLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill stages that run longer than `timeout`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl StageLauncher for FfmpegLauncher {
    fn launch(&self, ticket: StageTicket, spec: &StageSpec, events: StageEventSender) -> StageControl {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        tokio::spawn(run_stage(ticket, spec.clone(), events, cancel_rx, self.timeout));
        StageControl::new(cancel_tx)
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
    TimedOut,
}

async fn run_stage(
    ticket: StageTicket,
    spec: StageSpec,
    events: StageEventSender,
    mut cancel: oneshot::Receiver<()>,
    timeout: Option<Duration>,
) {
    let finish = |exit: StageExit| {
        let _ = events.send(StageEvent::Finished { ticket, exit });
    };

    if let Some(scratch) = &spec.scratch {
        if let Err(e) = tokio::fs::write(&scratch.path, &scratch.contents).await {
            warn!("{}: cannot write {}: {}", ticket, scratch.path.display(), e);
            finish(StageExit::SpawnFailed(format!(
                "cannot write {}: {}",
                scratch.path.display(),
                e
            )));
            return;
        }
    }

    debug!("{}: {}", ticket, spec.command_line());
    let mut child = match Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!("{}: failed to start {}: {}", ticket, spec.program.display(), e);
            finish(StageExit::SpawnFailed(format!("{}: {}", spec.program.display(), e)));
            return;
        }
    };

    info!("{} {} started (pid {:?})", ticket, spec.kind, child.id());
    let _ = events.send(StageEvent::Started { ticket });

    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_output(
            stdout,
            ticket,
            OutputStream::Stdout,
            events.clone(),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_output(
            stderr,
            ticket,
            OutputStream::Stderr,
            events.clone(),
        )));
    }

    let watchdog = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        // a dropped control also counts as cancellation
        _ = &mut cancel => Outcome::Cancelled,
        _ = watchdog => Outcome::TimedOut,
    };

    let exit = match outcome {
        Outcome::Exited(Ok(status)) => StageExit::Exited(status.code().unwrap_or(-1)),
        Outcome::Exited(Err(e)) => {
            warn!("{}: wait failed: {}", ticket, e);
            StageExit::Exited(-1)
        }
        Outcome::Cancelled => {
            terminate(&mut child).await;
            StageExit::Cancelled
        }
        Outcome::TimedOut => {
            warn!("{}: no exit after {:?}, killing", ticket, timeout.unwrap_or_default());
            terminate(&mut child).await;
            StageExit::TimedOut
        }
    };

    for reader in readers {
        let _ = reader.await;
    }

    info!("{} {} finished: {}", ticket, spec.kind, exit);
    finish(exit);
}

async fn terminate(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        debug!("kill failed: {}", e);
    }
}

async fn forward_output<R>(mut pipe: R, ticket: StageTicket, stream: OutputStream, events: StageEventSender)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_CHUNK];
    let mut pending = Vec::new();
    loop {
        match pipe.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buffer[..n]);
                let Some(chunk) = take_complete(&mut pending) else {
                    continue;
                };
                if events
                    .send(StageEvent::Output {
                        ticket,
                        stream,
                        chunk,
                    })
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                debug!("{}: read error on {:?}: {}", ticket, stream, e);
                break;
            }
        }
    }
    if !pending.is_empty() {
        let chunk = String::from_utf8_lossy(&pending).into_owned();
        let _ = events.send(StageEvent::Output {
            ticket,
            stream,
            chunk,
        });
    }
}

/// Split off everything up to the last line break (`\r` or `\n`), keeping
/// the unfinished tail in `pending`. A tail longer than [`MAX_PENDING`] with
/// no break is released whole.
fn take_complete(pending: &mut Vec<u8>) -> Option<String> {
    let cut = match pending.iter().rposition(|&b| b == b'\r' || b == b'\n') {
        Some(position) => position + 1,
        None if pending.len() > MAX_PENDING => pending.len(),
        None => return None,
    };
    let rest = pending.split_off(cut);
    let complete = std::mem::replace(pending, rest);
    Some(String::from_utf8_lossy(&complete).into_owned())
}
