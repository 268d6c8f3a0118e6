//! Push-to-talk recording through an external recorder process.
//!
//! [`CaptureManager::capture_while_held`] starts `arecord` (or whatever the
//! config names), samples the trigger pin until it is released, then stops the
//! recorder with a bounded grace period.  It is the only owner of a live
//! recorder handle; the handle is released on every return path, and on
//! unwind by [`ManagedProcess`]'s `Drop`.
//!
//! ```text
//! spawn recorder ──▶ poll trigger (≤100 ms) ──released──▶ SIGTERM
//!                                                           │
//!                               exited within grace ◀───────┤
//!                                                           └─▶ kill → Timeout
//! ```

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::CaptureConfig;
use crate::gpio::{DigitalInput, Level, Pin};
use crate::process::{ManagedProcess, ProcessError};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that end a recording attempt.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The recorder ignored the termination request and was force-killed.
    #[error("recorder did not stop within {grace:?}; killed")]
    Timeout { grace: Duration },

    /// The recorder could not be started, signalled or reaped.
    #[error("recorder failed: {0}")]
    Process(#[source] ProcessError),

    /// The buffer location could not be prepared.
    #[error("cannot prepare audio buffer {path}: {source}")]
    Buffer {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<ProcessError> for CaptureError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::Timeout { grace, .. } => CaptureError::Timeout { grace },
            other => CaptureError::Process(other),
        }
    }
}

// ---------------------------------------------------------------------------
// CapturedAudio
// ---------------------------------------------------------------------------

/// A finished recording, handed to recognition by path.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// The shared buffer file.  May be missing if the recorder failed early.
    pub path: PathBuf,
    /// How long the trigger was held.
    pub held_for: Duration,
}

impl CapturedAudio {
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

// ---------------------------------------------------------------------------
// Recorder trait
// ---------------------------------------------------------------------------

/// Anything that records one utterance while the trigger is held.
///
/// Blocking; the orchestrator runs it on `spawn_blocking`.
pub trait Recorder: Send + Sync {
    fn capture_while_held(&self) -> Result<CapturedAudio, CaptureError>;

    /// End an in-progress capture as if the trigger had been released.
    /// Captures started afterwards stop immediately.
    fn cancel(&self) {}
}

// ---------------------------------------------------------------------------
// CaptureManager
// ---------------------------------------------------------------------------

/// Records from the configured ALSA device while the trigger pin reads High.
pub struct CaptureManager {
    pins: Arc<dyn DigitalInput>,
    trigger: Pin,
    program: String,
    args: Vec<String>,
    buffer: PathBuf,
    poll_interval: Duration,
    grace: Duration,
    max_recording: Duration,
    cancelled: AtomicBool,
}

impl CaptureManager {
    /// Build a manager that runs the recorder described by `config`:
    ///
    /// `arecord -D <device> -f <format> -r <rate> -c <channels> <buffer_file>`
    pub fn new(config: &CaptureConfig, pins: Arc<dyn DigitalInput>, trigger: Pin) -> Self {
        Self {
            pins,
            trigger,
            program: config.program.clone(),
            args: recorder_args(config),
            buffer: config.buffer_file.clone(),
            poll_interval: config.poll_interval(),
            grace: config.grace(),
            max_recording: config.max_recording(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Replace the recorder invocation, keeping timing and buffer settings.
    pub fn with_command(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    fn prepare_buffer(&self) -> Result<(), CaptureError> {
        let err = |source| CaptureError::Buffer {
            path: self.buffer.display().to_string(),
            source,
        };

        if let Some(parent) = self.buffer.parent() {
            std::fs::create_dir_all(parent).map_err(err)?;
        }
        match std::fs::remove_file(&self.buffer) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(err(e)),
        }
    }

    fn wait_for_release(&self, started: Instant) {
        while self.pins.read_level(self.trigger) == Level::High {
            if self.cancelled.load(Ordering::SeqCst) {
                log::info!("capture: cancelled while trigger held");
                break;
            }
            if started.elapsed() >= self.max_recording {
                log::warn!(
                    "capture: trigger still held after {:?}, stopping",
                    self.max_recording
                );
                break;
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

impl Recorder for CaptureManager {
    fn capture_while_held(&self) -> Result<CapturedAudio, CaptureError> {
        self.prepare_buffer()?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let recorder = ManagedProcess::spawn(&mut cmd, "recorder")?;
        let started = Instant::now();
        log::info!("capture: recording started");

        self.wait_for_release(started);
        let held_for = started.elapsed();

        let status = recorder.stop(self.grace)?;
        log::info!(
            "capture: recording stopped after {:.1}s ({status})",
            held_for.as_secs_f32()
        );

        Ok(CapturedAudio {
            path: self.buffer.clone(),
            held_for,
        })
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Argument list for an `arecord`-compatible recorder.
pub fn recorder_args(config: &CaptureConfig) -> Vec<String> {
    vec![
        "-D".into(),
        config.device.clone(),
        "-f".into(),
        config.format.clone(),
        "-r".into(),
        config.sample_rate.to_string(),
        "-c".into(),
        config.channels.to_string(),
        config.buffer_file.display().to_string(),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::FakePins;
    use std::path::Path;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> CaptureConfig {
        CaptureConfig {
            buffer_file: dir.join("input.wav"),
            poll_interval_ms: 10,
            grace_secs: 5,
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn recorder_args_match_arecord_invocation() {
        let mut cfg = CaptureConfig::default();
        cfg.buffer_file = PathBuf::from("/tmp/input.wav");
        assert_eq!(
            recorder_args(&cfg),
            vec![
                "-D",
                "plughw:1,0",
                "-f",
                "S16_LE",
                "-r",
                "16000",
                "-c",
                "1",
                "/tmp/input.wav"
            ]
        );
    }

    #[test]
    fn missing_recorder_is_process_error() {
        let dir = tempdir().unwrap();
        let pins = Arc::new(FakePins::held_for(Level::Low, 1));
        let trigger = pins.trigger;
        let manager = CaptureManager::new(&config_in(dir.path()), pins, trigger)
            .with_command("/nonexistent/arecord", vec![]);

        let err = manager.capture_while_held().unwrap_err();
        assert!(matches!(err, CaptureError::Process(ProcessError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn stale_buffer_is_removed_before_recording() {
        let dir = tempdir().unwrap();
        let cfg = config_in(dir.path());
        std::fs::write(&cfg.buffer_file, b"old session").unwrap();

        let pins = Arc::new(FakePins::held_for(Level::Low, 0));
        let trigger = pins.trigger;
        // Recorder that never writes the buffer.
        let manager = CaptureManager::new(&cfg, pins, trigger)
            .with_command("sh", vec!["-c".into(), "exec sleep 30".into()]);

        let audio = manager.capture_while_held().unwrap();
        assert!(!audio.exists());
    }

    #[cfg(unix)]
    #[test]
    fn release_stops_recorder_and_keeps_buffer() {
        let dir = tempdir().unwrap();
        let cfg = config_in(dir.path());
        let out = cfg.buffer_file.display().to_string();

        // Held for ~20 polls (200 ms) so the shell has written the buffer.
        let pins = Arc::new(FakePins::held_for(Level::Low, 20));
        let trigger = pins.trigger;
        let manager = CaptureManager::new(&cfg, pins, trigger).with_command(
            "sh",
            vec![
                "-c".into(),
                format!("printf 'RIFFdata' > '{out}'; exec sleep 30"),
            ],
        );

        let started = Instant::now();
        let audio = manager.capture_while_held().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(audio.exists());
        assert!(std::fs::metadata(&audio.path).unwrap().len() > 0);
        assert!(audio.held_for >= Duration::from_millis(100));
    }

    #[cfg(unix)]
    #[test]
    fn stubborn_recorder_times_out_and_is_killed() {
        let dir = tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.grace_secs = 1;
        let pid_file = dir.path().join("pid");

        let pins = Arc::new(FakePins::held_for(Level::Low, 10));
        let trigger = pins.trigger;
        let manager = CaptureManager::new(&cfg, pins, trigger).with_command(
            "sh",
            vec![
                "-c".into(),
                format!(
                    "echo $$ > '{}'; trap '' TERM; while true; do sleep 0.05; done",
                    pid_file.display()
                ),
            ],
        );

        let err = manager.capture_while_held().unwrap_err();
        assert!(matches!(err, CaptureError::Timeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        assert!(
            !Path::new(&format!("/proc/{pid}")).exists(),
            "recorder {pid} still in process table"
        );
    }

    #[cfg(unix)]
    #[test]
    fn max_recording_ends_held_trigger() {
        let dir = tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.max_recording_secs = 0;

        // Trigger never released.
        let pins = Arc::new(FakePins::new(Level::Low, [Level::High]));
        let trigger = pins.trigger;
        let manager = CaptureManager::new(&cfg, pins, trigger)
            .with_command("sh", vec!["-c".into(), "exec sleep 30".into()]);

        let audio = manager.capture_while_held().unwrap();
        assert!(audio.held_for < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn cancel_ends_capture_with_trigger_held() {
        let dir = tempdir().unwrap();
        let cfg = config_in(dir.path());

        // Trigger never released; only cancel() can end the recording.
        let pins = Arc::new(FakePins::new(Level::Low, [Level::High]));
        let trigger = pins.trigger;
        let manager = Arc::new(
            CaptureManager::new(&cfg, pins, trigger)
                .with_command("sh", vec!["-c".into(), "exec sleep 30".into()]),
        );

        let canceller = Arc::clone(&manager);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            canceller.cancel();
        });

        let started = Instant::now();
        let audio = manager.capture_while_held().unwrap();
        handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(audio.held_for >= Duration::from_millis(100));

        // Later captures stop at once.
        let again = manager.capture_while_held().unwrap();
        assert!(again.held_for < Duration::from_millis(100));
    }
}
