//! Speech synthesis with the Piper command-line tool.
//!
//! ```text
//! text ──stdin──▶ piper --model <voice.onnx> --output_file <output.wav>
//! ```
//!
//! Piper runs as a [`ManagedProcess`] with a hard time limit; the output file
//! is shared and overwritten by every session.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::config::TtsConfig;
use crate::language::Language;
use crate::process::ManagedProcess;

use super::SpeakError;

/// Renders text to a WAV file.  Blocking.
pub trait Synthesizer: Send + Sync {
    /// Synthesise `text` with the voice for `language` and return the path
    /// of the finished WAV.
    fn synthesize(&self, text: &str, language: Language) -> Result<PathBuf, SpeakError>;
}

/// Piper voices for both languages.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    program: String,
    leading_args: Vec<String>,
    vi_voice: PathBuf,
    en_voice: PathBuf,
    output: PathBuf,
    timeout: Duration,
}

impl PiperSynthesizer {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            program: config.program.clone(),
            leading_args: Vec::new(),
            vi_voice: config.vi_voice.clone(),
            en_voice: config.en_voice.clone(),
            output: config.output_file.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run `program leading_args…` in place of the configured executable.
    /// The Piper arguments are appended after `leading_args`.
    pub fn with_command(mut self, program: impl Into<String>, leading_args: Vec<String>) -> Self {
        self.program = program.into();
        self.leading_args = leading_args;
        self
    }

    pub fn voice(&self, language: Language) -> &Path {
        match language {
            Language::Vietnamese => &self.vi_voice,
            Language::English => &self.en_voice,
        }
    }

    fn prepare_output(&self) -> Result<(), SpeakError> {
        if let Some(parent) = self.output.parent() {
            std::fs::create_dir_all(parent).map_err(SpeakError::Io)?;
        }
        match std::fs::remove_file(&self.output) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(SpeakError::Io(e)),
            _ => Ok(()),
        }
    }
}

impl Synthesizer for PiperSynthesizer {
    fn synthesize(&self, text: &str, language: Language) -> Result<PathBuf, SpeakError> {
        self.prepare_output()?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("--model")
            .arg(self.voice(language))
            .arg("--output_file")
            .arg(&self.output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut piper = ManagedProcess::spawn(&mut cmd, "synthesizer")?;

        // Dropping stdin closes the pipe so Piper sees EOF.
        if let Some(mut stdin) = piper.child_mut().and_then(|c| c.stdin.take()) {
            stdin
                .write_all(text.as_bytes())
                .and_then(|()| stdin.write_all(b"\n"))
                .map_err(SpeakError::Io)?;
        }

        let status = piper.wait_or_kill(self.timeout)?;
        if !status.success() {
            return Err(SpeakError::SynthesisFailed(status.to_string()));
        }

        let written = std::fs::metadata(&self.output)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(SpeakError::MissingOutput(self.output.clone()));
        }

        log::debug!(
            "tts: synthesised {} chars with {}",
            text.chars().count(),
            self.voice(language).display()
        );
        Ok(self.output.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
