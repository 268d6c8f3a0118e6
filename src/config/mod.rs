//! Configuration module for the voice translator.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform data directories, TOML persistence via
//! `AppConfig::load` / `AppConfig::save`, and the startup resource check.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, CONFIG_ENV_VAR};
pub use settings::{
    AppConfig, CaptureConfig, InputBackend, InputConfig, StartupError, SttConfig,
    TranslateConfig, TtsConfig,
};
