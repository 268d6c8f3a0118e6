//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Linux:   ~/.config/voice-translate/
//!   macOS:   ~/Library/Application Support/voice-translate/
//!
//! Data dir (Whisper models, Piper voices):
//!   Linux:   ~/.local/share/voice-translate/
//!   macOS:   ~/Library/Application Support/voice-translate/
//!
//! Work dir (transient input / output WAV buffers):
//!   Linux:   ~/.cache/voice-translate/
//!   macOS:   ~/Library/Caches/voice-translate/

use std::path::PathBuf;

/// Environment variable that overrides the location of `settings.toml`.
pub const CONFIG_ENV_VAR: &str = "VOICE_TRANSLATE_CONFIG";

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding the GGML Whisper models.
    pub models_dir: PathBuf,
    /// Directory holding the Piper `.onnx` voices.
    pub voices_dir: PathBuf,
    /// Directory for the recorded and synthesised WAV buffers.
    pub work_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-translate";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.  `VOICE_TRANSLATE_CONFIG` replaces the settings file.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let work_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(Self::APP_NAME);

        let settings_file = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("settings.toml"));

        Self {
            config_dir,
            settings_file,
            models_dir: data_dir.join("models"),
            voices_dir: data_dir.join("voices"),
            work_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.models_dir.ends_with("models"));
        assert!(paths.voices_dir.ends_with("voices"));
        assert!(paths.work_dir.ends_with("voice-translate"));
    }

    #[test]
    fn model_and_voice_dirs_share_data_root() {
        let paths = AppPaths::new();
        assert_eq!(paths.models_dir.parent(), paths.voices_dir.parent());
    }
}
