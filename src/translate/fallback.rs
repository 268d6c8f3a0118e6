//! Translators that never fail.
//!
//! [`FallbackTranslator`] wraps any [`Translator`] and returns the original
//! text when the backend fails, so a session with an unreachable translation
//! server still speaks (the source text, in the source language).
//! [`PassThrough`] is used directly when translation is disabled.

use async_trait::async_trait;

use crate::language::Direction;
use crate::translate::translator::{TranslateError, Translator};

// ---------------------------------------------------------------------------
// FallbackTranslator
// ---------------------------------------------------------------------------

/// Wraps a translator; on any error returns the untruncated input unchanged.
pub struct FallbackTranslator<T: Translator> {
    inner: T,
}

impl<T: Translator> FallbackTranslator<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: Translator> Translator for FallbackTranslator<T> {
    /// Never returns `Err(_)`.
    async fn translate(&self, text: &str, direction: Direction) -> Result<String, TranslateError> {
        match self.inner.translate(text, direction).await {
            Ok(translated) => Ok(translated),
            Err(e) => {
                log::warn!("translate: {e}; speaking source text (len={})", text.len());
                Ok(text.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PassThrough
// ---------------------------------------------------------------------------

/// Returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

#[async_trait]
impl Translator for PassThrough {
    async fn translate(&self, text: &str, _direction: Direction) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
