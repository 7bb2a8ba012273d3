//! Child process plumbing shared by the package installer and the code executor.
//!
//! Children are spawned in their own process group (unix) so that a deadline
//! kill also takes down anything they forked. The same happens to anything
//! still running in the group once the child itself has exited. A
//! [`ChildGuard`] owns the child and kills + reaps it on drop unless it was
//! already waited for.

use std::io::{self, Read};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting on a child with a deadline.
pub const WAIT_POLL_INTERVAL_MS: u64 = 50;

/// Output of a child that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or -1 when terminated by a signal.
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of [`wait_with_timeout`].
#[derive(Debug)]
pub enum WaitOutcome {
    Exited(ProcessOutput),
    /// Deadline hit; the child (and its group) was killed and reaped.
    TimedOut { stdout: String, stderr: String },
}

/// Put the child in a fresh process group so it can be killed as a unit.
pub fn isolate_process_group(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd
}

/// Owns a spawned child. Dropping the guard kills and reaps the child unless
/// it already exited and was waited for.
pub struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Kill the child's process group (falling back to the child alone) and reap it.
    pub fn kill(&mut self) {
        if self.reaped {
            return;
        }
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            if let Err(e) = killpg(Pid::from_raw(self.child.id() as i32), Signal::SIGKILL) {
                tracing::debug!("killpg({}) failed: {}, killing child only", self.child.id(), e);
                let _ = self.child.kill();
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
        self.reaped = true;
    }

    fn mark_reaped(&mut self) {
        self.reaped = true;
    }

    /// Kill whatever is left in the child's process group after the child
    /// itself exited, so background processes cannot hold the pipes open.
    fn kill_leftovers(&self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            // ESRCH just means the group is already empty.
            let _ = killpg(Pid::from_raw(self.child.id() as i32), Signal::SIGKILL);
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Wait for the guarded child, draining stdout/stderr on background threads
/// so a chatty child cannot block on a full pipe. With `timeout = None` the
/// wait is unbounded.
pub fn wait_with_timeout(guard: &mut ChildGuard, timeout: Option<Duration>) -> io::Result<WaitOutcome> {
    let start = Instant::now();
    let poll = Duration::from_millis(WAIT_POLL_INTERVAL_MS);

    let stdout_handle = guard.child_mut().stdout.take().map(spawn_reader);
    let stderr_handle = guard.child_mut().stderr.take().map(spawn_reader);
    let collect = |h: Option<thread::JoinHandle<String>>| {
        h.map(|h| h.join().unwrap_or_default()).unwrap_or_default()
    };

    loop {
        match guard.child_mut().try_wait() {
            Ok(Some(status)) => {
                guard.mark_reaped();
                guard.kill_leftovers();
                return Ok(WaitOutcome::Exited(ProcessOutput {
                    stdout: collect(stdout_handle),
                    stderr: collect(stderr_handle),
                    exit_code: status.code().unwrap_or(-1),
                }));
            }
            Ok(None) => {}
            Err(e) => {
                guard.kill();
                let _ = collect(stdout_handle);
                let _ = collect(stderr_handle);
                return Err(e);
            }
        }

        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                guard.kill();
                return Ok(WaitOutcome::TimedOut {
                    stdout: collect(stdout_handle),
                    stderr: collect(stderr_handle),
                });
            }
        }

        thread::sleep(poll);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}
