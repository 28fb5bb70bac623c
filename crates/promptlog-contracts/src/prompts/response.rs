use serde_json::{Map, Value};
use thiserror::Error;

use super::request::Mode;

/// Everything in a success payload except the answer content itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMetadata {
    /// The full payload minus the answer container (`data` or `choices`).
    pub response: Map<String, Value>,
    /// The chosen answer minus its content field.
    pub answer: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    Success {
        primary_content: String,
        metadata: ResponseMetadata,
    },
    Failure {
        message: String,
    },
}

/// A payload with no error indicator that still lacks the expected field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct MalformedResponse {
    pub detail: String,
}

impl MalformedResponse {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl ProviderResponse {
    /// Decodes a raw provider payload. Any `error` key wins over content.
    pub fn decode(mode: Mode, payload: &Value) -> Result<Self, MalformedResponse> {
        let Some(root) = payload.as_object() else {
            return Err(MalformedResponse::new("Response payload is not a JSON object."));
        };

        if let Some(error) = root.get("error") {
            return Ok(ProviderResponse::Failure {
                message: failure_message(error),
            });
        }

        match mode {
            Mode::Image => decode_image(root),
            Mode::Chat => decode_chat(root),
        }
    }
}

fn decode_image(root: &Map<String, Value>) -> Result<ProviderResponse, MalformedResponse> {
    let first = root
        .get("data")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_object);
    let Some((item, url)) = first.and_then(|item| {
        item.get("url")
            .and_then(Value::as_str)
            .map(|url| (item, url.to_string()))
    }) else {
        return Err(MalformedResponse::new("No image URL found in response."));
    };

    Ok(ProviderResponse::Success {
        primary_content: url,
        metadata: ResponseMetadata {
            response: without(root, "data"),
            answer: without(item, "url"),
        },
    })
}

fn decode_chat(root: &Map<String, Value>) -> Result<ProviderResponse, MalformedResponse> {
    let Some(choice) = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_object)
    else {
        return Err(MalformedResponse::new("No choices found in response."));
    };
    let Some(message) = choice.get("message").and_then(Value::as_object) else {
        return Err(MalformedResponse::new("No message found in the first choice."));
    };
    let Some(content) = message.get("content").and_then(Value::as_str) else {
        return Err(MalformedResponse::new("No message content found in response."));
    };

    let mut answer = without(choice, "message");
    answer.insert(
        "message".to_string(),
        Value::Object(without(message, "content")),
    );

    Ok(ProviderResponse::Success {
        primary_content: content.to_string(),
        metadata: ResponseMetadata {
            response: without(root, "choices"),
            answer,
        },
    })
}

fn failure_message(error: &Value) -> String {
    match error {
        Value::String(text) => text.clone(),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

fn without(map: &Map<String, Value>, key: &str) -> Map<String, Value> {
    map.iter()
        .filter(|(name, _)| name.as_str() != key)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
