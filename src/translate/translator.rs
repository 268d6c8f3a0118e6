//! Core [`Translator`] trait and the [`ApiTranslator`] backend.
//!
//! `ApiTranslator` calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint: Ollama (OpenAI mode), LM Studio, vLLM, OpenAI.  Connection
//! details come from [`TranslateConfig`].

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TranslateConfig;
use crate::language::Direction;
use crate::translate::prompt::{truncate_tokens, PromptBuilder};

// ---------------------------------------------------------------------------
// TranslateError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TranslateError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("translation request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("translation endpoint returned {0}")]
    Status(u16),

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse translation response: {0}")]
    Parse(String),

    /// The model returned no usable text.
    #[error("translation backend returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for TranslateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranslateError::Timeout
        } else {
            TranslateError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Translator trait
// ---------------------------------------------------------------------------

/// Translates recognised text for one session direction.
///
/// Shared as `Arc<dyn Translator>` between sessions.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, direction: Direction) -> Result<String, TranslateError>;
}

// ---------------------------------------------------------------------------
// ApiTranslator
// ---------------------------------------------------------------------------

/// Translates through an OpenAI-compatible chat completions endpoint.
pub struct ApiTranslator {
    client: reqwest::Client,
    config: TranslateConfig,
}

impl ApiTranslator {
    /// Build from config.  The HTTP client carries the per-request timeout
    /// from `config.timeout_secs`.
    pub fn from_config(config: &TranslateConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Translator for ApiTranslator {
    /// Input is cut to `max_input_tokens` tokens before it is sent.
    ///
    /// `Authorization: Bearer …` is attached only when `api_key` is a
    /// non-empty string.
    async fn translate(&self, text: &str, direction: Direction) -> Result<String, TranslateError> {
        let bounded = truncate_tokens(text, self.config.max_input_tokens);
        let (system_msg, user_msg) = PromptBuilder::new(direction).build_chat(&bounded);

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  512
        });

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(TranslateError::Status(response.status().as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TranslateError::Parse(e.to_string()))?;

        let translated = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(TranslateError::EmptyResponse)?
            .trim()
            .trim_matches('"')
            .trim()
            .to_string();

        if translated.is_empty() {
            return Err(TranslateError::EmptyResponse);
        }

        log::info!("translate: [{direction}] {translated:?}");
        Ok(translated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// One-shot HTTP server: answers a single request with `status` and
    /// `body`, and hands back the raw request it received.
    async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            // Read headers, then exactly Content-Length bytes of body.
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break buf.len();
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });

        (format!("http://{addr}"), rx)
    }

    fn config(base_url: String, api_key: Option<&str>) -> TranslateConfig {
        TranslateConfig {
            base_url,
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
            ..TranslateConfig::default()
        }
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": content } } ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn returns_trimmed_completion() {
        let (url, _req) = serve_once("200 OK", completion("  \"Hello, friend.\" \n")).await;
        let t = ApiTranslator::from_config(&config(url, None));

        let out = t.translate("xin chào bạn", Direction::ViToEn).await.unwrap();
        assert_eq!(out, "Hello, friend.");
    }

    #[tokio::test]
    async fn sends_direction_prompt_and_truncated_input() {
        let (url, req) = serve_once("200 OK", completion("ok")).await;
        let mut cfg = config(url, None);
        cfg.max_input_tokens = 3;
        let t = ApiTranslator::from_config(&cfg);

        t.translate("one two three four five", Direction::EnToVi)
            .await
            .unwrap();

        let raw = req.await.unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert!(raw.contains("English to Vietnamese"));
        assert!(raw.contains("one two three"));
        assert!(!raw.contains("four five"));
        assert!(!raw.to_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn attaches_bearer_only_with_key() {
        let (url, req) = serve_once("200 OK", completion("ok")).await;
        let t = ApiTranslator::from_config(&config(url, Some("sk-test")));
        t.translate("hi", Direction::EnToVi).await.unwrap();
        assert!(req.await.unwrap().contains("Bearer sk-test"));
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let (url, _req) = serve_once("500 Internal Server Error", "{}".into()).await;
        let t = ApiTranslator::from_config(&config(url, None));
        let err = t.translate("hi", Direction::EnToVi).await.unwrap_err();
        assert!(matches!(err, TranslateError::Status(500)));
    }

    #[tokio::test]
    async fn empty_content_is_error() {
        let (url, _req) = serve_once("200 OK", completion("   ")).await;
        let t = ApiTranslator::from_config(&config(url, None));
        let err = t.translate("hi", Direction::EnToVi).await.unwrap_err();
        assert!(matches!(err, TranslateError::EmptyResponse));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let t = ApiTranslator::from_config(&config(format!("http://127.0.0.1:{port}"), None));
        let err = t.translate("hi", Direction::ViToEn).await.unwrap_err();
        assert!(matches!(
            err,
            TranslateError::Request(_) | TranslateError::Timeout
        ));
    }

    #[test]
    fn translator_is_object_safe() {
        let t: Box<dyn Translator> =
            Box::new(ApiTranslator::from_config(&TranslateConfig::default()));
        drop(t);
    }
}
