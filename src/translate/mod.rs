//! Text translation between the session's source and target languages.
//!
//! * [`Translator`]: async trait implemented by every backend.
//! * [`ApiTranslator`]: OpenAI-compatible chat completions backend.
//! * [`FallbackTranslator`]: wraps a backend; returns the input on failure.
//! * [`PassThrough`]: used when translation is disabled.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_translate::config::AppConfig;
//! use voice_translate::language::Direction;
//! use voice_translate::translate::{from_config, Translator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let translator = from_config(&config.translate);
//!     let english = translator
//!         .translate("xin chào", Direction::ViToEn)
//!         .await
//!         .unwrap();
//!     println!("{english}");
//! }
//! ```

pub mod fallback;
pub mod prompt;
pub mod translator;

use std::sync::Arc;

pub use fallback::{FallbackTranslator, PassThrough};
pub use prompt::{truncate_tokens, PromptBuilder};
pub use translator::{ApiTranslator, TranslateError, Translator};

use crate::config::TranslateConfig;

/// Build the translator the pipeline uses for `config`.
///
/// The result never returns an error.
pub fn from_config(config: &TranslateConfig) -> Arc<dyn Translator> {
    if config.enabled {
        log::info!(
            "translate: {} via {}",
            config.model,
            config.base_url
        );
        Arc::new(FallbackTranslator::new(ApiTranslator::from_config(config)))
    } else {
        log::info!("translate: disabled, speaking recognised text");
        Arc::new(PassThrough)
    }
}
