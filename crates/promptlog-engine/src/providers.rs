use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use promptlog_contracts::prompts::{ProviderRequest, Role};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Twelve hours.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 12);

/// Sends one request and hands back the raw JSON payload.
///
/// Vendor error bodies are returned as payloads carrying an `error` key so
/// the caller decodes success and failure in one place. `Err` is reserved
/// for transport problems.
pub trait CompletionProvider {
    fn name(&self) -> &str;
    fn call(&self, request: &ProviderRequest) -> Result<Value>;
}

pub struct OpenAiProvider {
    api_base: String,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
            http,
        })
    }

    pub fn endpoint_url(&self, request: &ProviderRequest) -> String {
        format!("{}/{}", self.api_base, request.endpoint())
    }
}

impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn call(&self, request: &ProviderRequest) -> Result<Value> {
        let endpoint = self.endpoint_url(request);
        let payload = request.payload();
        info!(
            "POST {endpoint} model={} timeout={}s",
            request.model(),
            self.timeout.as_secs()
        );
        debug!("request body: {payload}");

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .with_context(|| format!("OpenAI request failed ({endpoint})"))?;
        let status_code = response.status().as_u16();
        let body = response
            .text()
            .context("OpenAI response body read failed")?;
        debug!("response {status_code}: {body}");

        payload_from_http(status_code, &body)
    }
}

/// Parses a response body, folding non-2xx JSON without an `error` key into one.
fn payload_from_http(status_code: u16, body: &str) -> Result<Value> {
    let success = (200..300).contains(&status_code);
    let parsed: Value = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) if success => {
            return Err(err).context("OpenAI returned invalid JSON payload");
        }
        Err(_) => bail!(
            "OpenAI request failed ({status_code}): {}",
            truncate_text(body, 512)
        ),
    };

    if success || parsed.get("error").is_some() {
        return Ok(parsed);
    }
    Ok(json!({
        "error": {
            "message": format!("OpenAI request failed ({status_code})"),
            "body": parsed,
        }
    }))
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Offline provider answering with well-formed payloads that echo the prompt.
#[derive(Debug, Default)]
pub struct DryrunProvider;

impl CompletionProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn call(&self, request: &ProviderRequest) -> Result<Value> {
        let created = unix_seconds();
        let payload = match request {
            ProviderRequest::Image {
                model,
                prompt,
                size,
                quality,
            } => json!({
                "created": created,
                "data": [{
                    "url": format!("https://dryrun.invalid/{model}/{size}/{quality}/{created}.png"),
                    "revised_prompt": prompt,
                }],
            }),
            ProviderRequest::Chat {
                model, messages, ..
            } => {
                let prompt = messages
                    .iter()
                    .rev()
                    .find(|message| message.role == Role::User)
                    .map(|message| message.content.as_str())
                    .unwrap_or_default();
                json!({
                    "id": format!("dryrun-{created}"),
                    "object": "chat.completion",
                    "created": created,
                    "model": model,
                    "choices": [{
                        "index": 0,
                        "finish_reason": "stop",
                        "message": {
                            "role": "assistant",
                            "content": format!("[dryrun] {}", prompt.trim()),
                        },
                    }],
                    "usage": {
                        "prompt_tokens": prompt.split_whitespace().count(),
                        "completion_tokens": 0,
                    },
                })
            }
        };
        debug!("dryrun response: {payload}");
        Ok(payload)
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
