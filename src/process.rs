//! Cancellable external processes.
//!
//! [`ManagedProcess`] wraps a [`std::process::Child`] that can be asked to
//! stop, waited on for a bounded grace period, and force-killed when the grace
//! period runs out.  The recorder and the speech synthesiser both run through
//! it.
//!
//! The handle is a RAII guard: dropping a process that is still running kills
//! and reaps it, so no child outlives its owner on an error or unwind path.

use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

use thiserror::Error;

/// How often [`ManagedProcess::stop`] checks whether the child has exited.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// ProcessError
// ---------------------------------------------------------------------------

/// Errors raised while driving an external process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The termination request could not be delivered.
    #[error("failed to signal `{label}`: {message}")]
    Signal { label: String, message: String },

    /// Waiting on the child failed.
    #[error("failed to wait for `{label}`: {source}")]
    Wait {
        label: String,
        #[source]
        source: std::io::Error,
    },

    /// The child did not exit within the grace period and was killed.
    #[error("`{label}` did not exit within {grace:?}; killed")]
    Timeout { label: String, grace: Duration },
}

// ---------------------------------------------------------------------------
// ManagedProcess
// ---------------------------------------------------------------------------

/// A running child process with a bounded, escalating shutdown.
#[derive(Debug)]
pub struct ManagedProcess {
    label: String,
    child: Option<Child>,
}

impl ManagedProcess {
    /// Spawn `command`.  `label` names the process in logs and errors.
    pub fn spawn(command: &mut Command, label: impl Into<String>) -> Result<Self, ProcessError> {
        let label = label.into();
        let child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: command.get_program().to_string_lossy().into_owned(),
            source,
        })?;

        log::debug!("process: spawned {label} (pid {})", child.id());

        Ok(Self {
            label,
            child: Some(child),
        })
    }

    /// OS process id of the child.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Mutable access to the child, e.g. to take its stdin.
    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    /// Returns the exit status if the child has already exited.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        match self.child.as_mut() {
            Some(child) => child.try_wait().map_err(|source| ProcessError::Wait {
                label: self.label.clone(),
                source,
            }),
            None => Ok(None),
        }
    }

    /// Ask the child to terminate gracefully (SIGTERM on Unix).
    ///
    /// On platforms without signals this is a hard kill.
    pub fn request_stop(&mut self) -> Result<(), ProcessError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            match kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
                // ESRCH: already gone, nothing to signal.
                Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
                Err(e) => Err(ProcessError::Signal {
                    label: self.label.clone(),
                    message: e.to_string(),
                }),
            }
        }

        #[cfg(not(unix))]
        {
            child.kill().map_err(|e| ProcessError::Signal {
                label: self.label.clone(),
                message: e.to_string(),
            })
        }
    }

    /// Wait up to `grace` for the child to exit on its own.
    ///
    /// Returns `Ok(None)` when the grace period elapsed with the child still
    /// running.  The handle stays owned either way.
    pub fn wait_timeout(&mut self, grace: Duration) -> Result<Option<ExitStatus>, ProcessError> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(EXIT_POLL_INTERVAL.min(remaining));
        }
    }

    /// Request termination, wait up to `grace`, then force-kill.
    ///
    /// The handle is consumed and the child is always reaped before this
    /// returns, including on [`ProcessError::Timeout`].
    pub fn stop(mut self, grace: Duration) -> Result<ExitStatus, ProcessError> {
        if let Err(e) = self.request_stop() {
            log::warn!("process: {e}; escalating to kill");
            return Err(self.kill_and_reap().err().unwrap_or(e));
        }

        if let Some(status) = self.wait_timeout(grace)? {
            self.child = None;
            log::debug!("process: {} exited with {status}", self.label);
            return Ok(status);
        }

        log::warn!(
            "process: {} ignored termination for {grace:?}, killing",
            self.label
        );
        self.kill_and_reap()?;
        Err(ProcessError::Timeout {
            label: self.label.clone(),
            grace,
        })
    }

    /// Wait for the child to exit, killing it if `limit` elapses first.
    pub fn wait_or_kill(mut self, limit: Duration) -> Result<ExitStatus, ProcessError> {
        if let Some(status) = self.wait_timeout(limit)? {
            self.child = None;
            return Ok(status);
        }

        self.kill_and_reap()?;
        Err(ProcessError::Timeout {
            label: self.label.clone(),
            grace: limit,
        })
    }

    fn kill_and_reap(&mut self) -> Result<(), ProcessError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        // kill() fails with InvalidInput when the child already exited; the
        // wait below reaps it in both cases.
        let _ = child.kill();
        child.wait().map_err(|source| ProcessError::Wait {
            label: self.label.clone(),
            source,
        })?;
        Ok(())
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.child.is_some() {
            log::debug!("process: dropping live {}, killing", self.label);
            if let Err(e) = self.kill_and_reap() {
                log::error!("process: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
