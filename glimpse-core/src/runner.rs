//! Runs the external recognizer on one dedicated worker thread.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use async_channel::{Receiver, Sender};
use log::{debug, info, warn};

/// Exit code and trimmed combined stdout/stderr of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self::new(-1, message)
    }
}

/// Run `command` to completion with stderr merged into stdout.
///
/// Spawn and I/O failures come back as exit code -1 with the error text,
/// as does termination by a signal.
pub fn run(command: &[String]) -> CommandOutput {
    let Some((program, args)) = command.split_first() else {
        return CommandOutput::failed("empty command");
    };

    debug!("Running {:?}", command);

    let (mut reader, writer) = match std::io::pipe() {
        Ok(pipe) => pipe,
        Err(e) => return CommandOutput::failed(format!("Failed to create pipe: {}", e)),
    };
    let stderr_writer = match writer.try_clone() {
        Ok(w) => w,
        Err(e) => return CommandOutput::failed(format!("Failed to create pipe: {}", e)),
    };

    // The Command owns the parent's copies of the write end; it has to be
    // dropped before reading or the read never sees EOF.
    let spawned = {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer);
        cmd.spawn()
    };

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to start {}: {}", program, e);
            return CommandOutput::failed(format!("Failed to start {}: {}", program, e));
        }
    };

    let mut raw = Vec::new();
    if let Err(e) = reader.read_to_end(&mut raw) {
        let _ = child.kill();
        let _ = child.wait();
        return CommandOutput::failed(format!("Failed to read output of {}: {}", program, e));
    }

    let status = match child.wait() {
        Ok(status) => status,
        Err(e) => return CommandOutput::failed(format!("Failed to wait for {}: {}", program, e)),
    };

    let output = String::from_utf8_lossy(&raw).trim().to_string();
    let exit_code = status.code().unwrap_or(-1);
    debug!("{} exited with {}", program, exit_code);

    CommandOutput::new(exit_code, output)
}

type Callback = Box<dyn FnOnce(CommandOutput) + Send>;

struct Job {
    command: Vec<String>,
    callback: Callback,
}

/// Serializes invocations onto a single worker thread. Callbacks are
/// delivered on that thread, once per submitted command, in submission order.
pub struct ProcessRunner {
    jobs: Sender<Job>,
    cancelled: Arc<AtomicBool>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        let (jobs, queue) = async_channel::unbounded::<Job>();
        let cancelled = Arc::new(AtomicBool::new(false));

        let worker_cancelled = Arc::clone(&cancelled);
        let spawned = thread::Builder::new()
            .name("process-runner".to_string())
            .spawn(move || worker(queue, worker_cancelled));
        if let Err(e) = spawned {
            // Jobs sent to a closed queue are reported through their callback.
            warn!("Failed to spawn process runner thread: {}", e);
        }

        Self { jobs, cancelled }
    }

    pub fn execute_async<F>(&self, command: Vec<String>, callback: F)
    where
        F: FnOnce(CommandOutput) + Send + 'static,
    {
        if self.cancelled.load(Ordering::SeqCst) {
            debug!("Runner shut down, dropping {:?}", command);
            return;
        }
        let job = Job {
            command,
            callback: Box::new(callback),
        };
        if let Err(async_channel::SendError(job)) = self.jobs.send_blocking(job) {
            (job.callback)(CommandOutput::failed("process runner is not available"));
        }
    }

    /// Message-passing form of [`execute_async`](Self::execute_async): the
    /// returned channel receives exactly one result, or closes empty if the
    /// runner is shut down first.
    pub fn submit(&self, command: Vec<String>) -> Receiver<CommandOutput> {
        let (tx, rx) = async_channel::bounded(1);
        self.execute_async(command, move |result| {
            let _ = tx.send_blocking(result);
        });
        rx
    }

    /// Stop accepting work and abandon queued and in-flight callbacks.
    pub fn shutdown(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("Shutting down process runner");
        }
        self.jobs.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        self.jobs.close();
    }
}

fn worker(queue: Receiver<Job>, cancelled: Arc<AtomicBool>) {
    // `recv_blocking` keeps returning queued jobs after close; the cancel
    // flag is what abandons them.
    while let Ok(job) = queue.recv_blocking() {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
        let result = run(&job.command);
        if cancelled.load(Ordering::SeqCst) {
            debug!("Dropping result of {:?} after shutdown", job.command);
            break;
        }
        (job.callback)(result);
    }
    // Drop abandoned jobs so their callbacks (and result channels) go away.
    queue.close();
    while queue.try_recv().is_ok() {}
    debug!("Process runner worker exited");
}
