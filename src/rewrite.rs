//! Rewrite provider interaction with exponential backoff retry logic.
//!
//! - [`RewriteProvider`]: core trait, title and content in, rewritten text out
//! - [`OpenAiRewriter`]: client for any OpenAI-compatible `/chat/completions` API
//! - [`RetryRewrite`]: decorator that retries transient provider errors
//!
//! Retries always resend the same title and content; a rewrite failure never
//! causes a different article to be fetched.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::ProviderConfig;
use crate::error::RewriteError;
use crate::utils::{char_len, truncate_for_log};

/// Prefixes some providers use to report errors inside a normal reply.
const ERROR_SENTINELS: &[&str] = &["error:", "lỗi:"];

#[async_trait]
pub trait RewriteProvider: Send + Sync {
    async fn rewrite(&self, title: &str, content: &str) -> Result<String, RewriteError>;
}

/// True when a reply is an error message dressed up as text.
pub fn is_error_sentinel(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(8).collect::<String>().to_lowercase();
    ERROR_SENTINELS.iter().any(|s| head.starts_with(s))
}

/// Reject replies that cannot stand in for an article: blank text or an
/// error sentinel. Returns the trimmed reply otherwise.
pub fn check_reply(text: &str) -> Result<String, RewriteError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RewriteError::EmptyResponse);
    }
    if is_error_sentinel(text) {
        return Err(RewriteError::Sentinel(truncate_for_log(text, 300)));
    }
    Ok(text.to_string())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiRewriter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    system_prompt: String,
    temperature: f32,
    timeout: Duration,
}

impl fmt::Debug for OpenAiRewriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiRewriter")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiRewriter {
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> RewriteError {
        if e.is_timeout() {
            RewriteError::Timeout(self.timeout.as_secs())
        } else {
            RewriteError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl RewriteProvider for OpenAiRewriter {
    #[instrument(level = "info", skip_all, fields(model = %self.model, title = %truncate_for_log(title, 80)))]
    async fn rewrite(&self, title: &str, content: &str) -> Result<String, RewriteError> {
        let t0 = Instant::now();
        let user = format!("{title}\n\n{content}");
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
            stream: false,
        };

        let mut request = self.client.post(&self.endpoint).timeout(self.timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, 300),
                "Provider returned non-success status"
            );
            return Err(RewriteError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RewriteError::Timeout(self.timeout.as_secs())
            } else {
                RewriteError::Malformed(e.to_string())
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let text = check_reply(&text)?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            input_chars = char_len(content),
            output_chars = char_len(&text),
            "Rewrite succeeded"
        );
        Ok(text)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`RewriteProvider`].
///
/// Only [`RewriteError::is_transient`] errors are retried. The delay between
/// retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryRewrite<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryRewrite<T>
where
    T: RewriteProvider,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryRewrite<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryRewrite")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> RewriteProvider for RetryRewrite<T>
where
    T: RewriteProvider,
{
    #[instrument(level = "info", skip_all)]
    async fn rewrite(&self, title: &str, content: &str) -> Result<String, RewriteError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.rewrite(title, content).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64;
                    let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;

                    if !e.is_transient() {
                        error!(attempt, elapsed_ms_total, error = %e, "rewrite() failed permanently");
                        return Err(e);
                    }
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt,
                            elapsed_ms_total,
                            error = %e,
                            "rewrite() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "rewrite() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Build the configured provider stack: the HTTP client wrapped in retries.
pub fn from_config(client: Client, config: &ProviderConfig) -> RetryRewrite<OpenAiRewriter> {
    RetryRewrite::new(
        OpenAiRewriter::new(client, config),
        config.max_retries,
        Duration::from_millis(config.retry_base_delay_ms),
    )
}
