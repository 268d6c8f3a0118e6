//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// InputBackend / InputConfig
// ---------------------------------------------------------------------------

/// Where the trigger and mode "pins" come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputBackend {
    /// Two keyboard keys emulate the pins (development hosts).
    #[default]
    Keyboard,
    /// Raspberry Pi GPIO header (requires the `rpi` cargo feature).
    Gpio,
}

/// Trigger / mode input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Which backend provides the two inputs.
    pub backend: InputBackend,
    /// BCM number of the record trigger pin (active-high).
    pub trigger_pin: u8,
    /// BCM number of the mode pin (Low = Vietnamese → English).
    pub mode_pin: u8,
    /// Key that acts as the trigger pin in keyboard mode.
    pub trigger_key: String,
    /// Key that toggles the mode pin level in keyboard mode.
    pub mode_key: String,
    /// Minimum spacing between two accepted trigger edges.
    pub debounce_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            backend: InputBackend::default(),
            trigger_pin: 17,
            mode_pin: 27,
            trigger_key: "F9".into(),
            mode_key: "F10".into(),
            debounce_ms: 200,
        }
    }
}

impl InputConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for the external recorder process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recorder executable (ALSA `arecord`).
    pub program: String,
    /// Capture device passed with `-D`.
    pub device: String,
    /// Sample format passed with `-f`.
    pub format: String,
    /// Sample rate in Hz passed with `-r`.
    pub sample_rate: u32,
    /// Channel count passed with `-c`.
    pub channels: u16,
    /// Recorded utterance, overwritten every session.
    pub buffer_file: PathBuf,
    /// How often the trigger level is sampled while recording.  Capped at
    /// 100 ms by [`CaptureConfig::poll_interval`].
    pub poll_interval_ms: u64,
    /// Seconds the recorder gets to exit after SIGTERM before it is killed.
    pub grace_secs: u64,
    /// Recording stops automatically after this many seconds.
    pub max_recording_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: "arecord".into(),
            device: "plughw:1,0".into(),
            format: "S16_LE".into(),
            sample_rate: 16_000,
            channels: 1,
            buffer_file: AppPaths::new().work_dir.join("input.wav"),
            poll_interval_ms: 50,
            grace_secs: 5,
            max_recording_secs: 60,
        }
    }
}

impl CaptureConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(1, 100))
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn max_recording(&self) -> Duration {
        Duration::from_secs(self.max_recording_secs)
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper recognisers (one model per language).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// GGML model used for Vietnamese speech.
    pub vi_model: PathBuf,
    /// GGML model used for English speech.
    pub en_model: PathBuf,
    /// Frames fed to the recogniser per chunk.
    pub chunk_frames: usize,
    /// Attempt GPU-accelerated inference when available.
    pub use_gpu: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        let models = AppPaths::new().models_dir;
        Self {
            vi_model: models.join("ggml-small-vi.bin"),
            en_model: models.join("ggml-small.en.bin"),
            chunk_frames: 4_000,
            use_gpu: false,
        }
    }
}

// ---------------------------------------------------------------------------
// TranslateConfig
// ---------------------------------------------------------------------------

/// Settings for the translation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// When `false` the recognised text is spoken untranslated.
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API (`/v1/chat/completions`).
    ///
    /// - Ollama default: `http://localhost:11434`
    pub base_url: String,
    /// API key; `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Maximum seconds to wait for a translation.
    pub timeout_secs: u64,
    /// Input is cut to this many whitespace-delimited tokens.
    pub max_input_tokens: usize,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:3b".into(),
            temperature: 0.2,
            timeout_secs: 15,
            max_input_tokens: 128,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for Piper synthesis and playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Piper executable.
    pub program: String,
    /// Voice used when speaking Vietnamese.
    pub vi_voice: PathBuf,
    /// Voice used when speaking English.
    pub en_voice: PathBuf,
    /// Synthesised speech, overwritten every session.
    pub output_file: PathBuf,
    /// Samples per frame written to the output device.
    pub frame_size: usize,
    /// Seconds Piper may take for one utterance before it is killed.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        let paths = AppPaths::new();
        Self {
            program: "piper".into(),
            vi_voice: paths.voices_dir.join("vi_VN-vais1000-medium.onnx"),
            en_voice: paths.voices_dir.join("en_US-amy-medium.onnx"),
            output_file: paths.work_dir.join("output.wav"),
            frame_size: 1_024,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// StartupError
// ---------------------------------------------------------------------------

/// Fatal errors detected before the first trigger is accepted.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A model or voice file is missing.
    #[error("{label} not found at {}", .path.display())]
    ResourceMissing { label: &'static str, path: PathBuf },
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_translate::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.ensure_resources().expect("models and voices installed");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Trigger / mode inputs.
    pub input: InputConfig,
    /// External recorder.
    pub capture: CaptureConfig,
    /// Speech recognition.
    pub stt: SttConfig,
    /// Translation backend.
    pub translate: TranslateConfig,
    /// Speech synthesis and playback.
    pub tts: TtsConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Model and voice files that must exist before the appliance starts.
    pub fn required_resources(&self) -> [(&'static str, &Path); 4] {
        [
            ("Vietnamese recognition model", self.stt.vi_model.as_path()),
            ("English recognition model", self.stt.en_model.as_path()),
            ("Vietnamese voice", self.tts.vi_voice.as_path()),
            ("English voice", self.tts.en_voice.as_path()),
        ]
    }

    /// Fails with the first missing resource.
    pub fn ensure_resources(&self) -> Result<(), StartupError> {
        for (label, path) in self.required_resources() {
            if !path.exists() {
                return Err(StartupError::ResourceMissing {
                    label,
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.input.backend = InputBackend::Gpio;
        cfg.input.trigger_pin = 5;
        cfg.capture.device = "hw:0,0".into();
        cfg.capture.grace_secs = 2;
        cfg.translate.api_key = Some("sk-test".into());
        cfg.translate.base_url = "https://api.openai.com".into();
        cfg.tts.frame_size = 512;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.input.backend, InputBackend::Gpio);
        assert_eq!(loaded.input.trigger_pin, 5);
        assert_eq!(loaded.capture.device, "hw:0,0");
        assert_eq!(loaded.capture.grace_secs, 2);
        assert_eq!(loaded.translate.api_key.as_deref(), Some("sk-test"));
        assert_eq!(loaded.translate.base_url, "https://api.openai.com");
        assert_eq!(loaded.tts.frame_size, 512);
        assert_eq!(loaded.stt.vi_model, cfg.stt.vi_model);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.input.trigger_pin, 17);
        assert_eq!(config.capture.program, "arecord");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[capture]\ndevice = \"hw:2,0\"\n").unwrap();

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.capture.device, "hw:2,0");
        assert_eq!(config.capture.sample_rate, 16_000);
        assert_eq!(config.input.debounce_ms, 200);
        assert_eq!(config.translate.max_input_tokens, 128);
    }

    #[test]
    fn default_values_match_appliance_wiring() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.input.trigger_pin, 17);
        assert_eq!(cfg.input.mode_pin, 27);
        assert_eq!(cfg.input.debounce(), Duration::from_millis(200));
        assert_eq!(cfg.capture.device, "plughw:1,0");
        assert_eq!(cfg.capture.format, "S16_LE");
        assert_eq!(cfg.capture.sample_rate, 16_000);
        assert_eq!(cfg.capture.channels, 1);
        assert_eq!(cfg.capture.grace(), Duration::from_secs(5));
        assert_eq!(cfg.stt.chunk_frames, 4_000);
        assert_eq!(cfg.translate.max_input_tokens, 128);
        assert_eq!(cfg.tts.frame_size, 1_024);
    }

    #[test]
    fn poll_interval_is_capped_at_100ms() {
        let mut cfg = CaptureConfig::default();
        cfg.poll_interval_ms = 500;
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        cfg.poll_interval_ms = 0;
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn ensure_resources_reports_first_missing() {
        let dir = tempdir().expect("temp dir");
        let mut cfg = AppConfig::default();
        cfg.stt.vi_model = dir.path().join("vi.bin");
        cfg.stt.en_model = dir.path().join("en.bin");
        cfg.tts.vi_voice = dir.path().join("vi.onnx");
        cfg.tts.en_voice = dir.path().join("en.onnx");

        for p in [&cfg.stt.vi_model, &cfg.stt.en_model, &cfg.tts.vi_voice] {
            std::fs::write(p, b"model").unwrap();
        }

        match cfg.ensure_resources() {
            Err(StartupError::ResourceMissing { label, path }) => {
                assert_eq!(label, "English voice");
                assert_eq!(path, cfg.tts.en_voice);
            }
            other => panic!("expected ResourceMissing, got {other:?}"),
        }

        std::fs::write(&cfg.tts.en_voice, b"voice").unwrap();
        assert!(cfg.ensure_resources().is_ok());
    }
}
