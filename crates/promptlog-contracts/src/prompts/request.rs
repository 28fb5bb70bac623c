use std::path::Path;

use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Option name -> value, in the order options were supplied.
pub type Parameters = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Image,
    Chat,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Image => "image",
            Mode::Chat => "chat",
        }
    }

    /// Registry capability a model needs to serve this mode.
    pub fn capability(&self) -> &'static str {
        self.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A prompt file's text plus the options it runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    id: String,
    text: String,
    parameters: Parameters,
}

impl PromptRequest {
    pub fn new(id: impl Into<String>, text: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            parameters,
        }
    }

    /// Reads the whole prompt file; the id is the file's base name.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected.
    pub fn from_file(path: &Path, parameters: Parameters) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Self::new(prompt_id_from_path(path), text, parameters))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

pub fn prompt_id_from_path(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "prompt".to_string())
}

/// The call sent across the provider boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderRequest {
    Image {
        model: String,
        prompt: String,
        size: String,
        quality: String,
    },
    Chat {
        model: String,
        messages: Vec<ChatMessage>,
        reasoning_effort: Option<String>,
    },
}

impl ProviderRequest {
    pub const DEFAULT_SIZE: &'static str = "1024x1024";
    pub const DEFAULT_QUALITY: &'static str = "standard";

    /// Builds the request for `mode`. Chat requests lead with `preamble` as a
    /// developer message when one is given.
    pub fn from_prompt(mode: Mode, prompt: &PromptRequest, preamble: Option<&str>) -> Result<Self> {
        let Some(model) = prompt.parameter_str("model") else {
            bail!("prompt '{}' has no model parameter", prompt.id());
        };

        match mode {
            Mode::Image => Ok(ProviderRequest::Image {
                model: model.to_string(),
                prompt: prompt.text().to_string(),
                size: prompt
                    .parameter_str("size")
                    .unwrap_or(Self::DEFAULT_SIZE)
                    .to_string(),
                quality: prompt
                    .parameter_str("quality")
                    .unwrap_or(Self::DEFAULT_QUALITY)
                    .to_string(),
            }),
            Mode::Chat => {
                let mut messages = Vec::new();
                if let Some(preamble) = preamble {
                    messages.push(ChatMessage::new(Role::Developer, preamble));
                }
                messages.push(ChatMessage::new(Role::User, prompt.text()));
                Ok(ProviderRequest::Chat {
                    model: model.to_string(),
                    messages,
                    reasoning_effort: prompt.parameter_str("reasoning_effort").map(str::to_string),
                })
            }
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderRequest::Image { model, .. } | ProviderRequest::Chat { model, .. } => model,
        }
    }

    /// Path below the API base, without a leading slash.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ProviderRequest::Image { .. } => "images/generations",
            ProviderRequest::Chat { .. } => "chat/completions",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            ProviderRequest::Image {
                model,
                prompt,
                size,
                quality,
            } => json!({
                "prompt": prompt,
                "model": model,
                "size": size,
                "quality": quality,
            }),
            ProviderRequest::Chat {
                model,
                messages,
                reasoning_effort,
            } => {
                let mut payload = json!({
                    "model": model,
                    "messages": messages,
                });
                if let (Some(effort), Some(obj)) = (reasoning_effort, payload.as_object_mut()) {
                    obj.insert(
                        "reasoning_effort".to_string(),
                        Value::String(effort.clone()),
                    );
                }
                payload
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::{json, Value};

    use super::{prompt_id_from_path, Mode, Parameters, PromptRequest, ProviderRequest};

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect()
    }

    #[test]
    fn from_file_reads_text_and_uses_base_name_as_id() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("o1-000001");
        std::fs::write(&path, "Describe a sunset.\n")?;

        let prompt = PromptRequest::from_file(&path, params(&[("model", "o1")]))?;
        assert_eq!(prompt.id(), "o1-000001");
        assert_eq!(prompt.text(), "Describe a sunset.\n");
        assert_eq!(prompt.parameter_str("model"), Some("o1"));
        Ok(())
    }

    #[test]
    fn from_file_replaces_invalid_utf8() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("latin1");
        std::fs::write(&path, [0x63, 0x61, 0x66, 0xE9])?;

        let prompt = PromptRequest::from_file(&path, Parameters::new())?;
        assert_eq!(prompt.text(), "caf\u{FFFD}");
        Ok(())
    }

    #[test]
    fn from_file_reports_missing_path() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let err = PromptRequest::from_file(&temp.path().join("absent"), Parameters::new())
            .err()
            .map(|err| err.kind());
        assert_eq!(err, Some(std::io::ErrorKind::NotFound));
        Ok(())
    }

    #[test]
    fn prompt_id_falls_back_for_bare_root() {
        assert_eq!(prompt_id_from_path(Path::new("prompts/dall-e-3-000000")), "dall-e-3-000000");
        assert_eq!(prompt_id_from_path(Path::new("/")), "prompt");
    }

    #[test]
    fn image_request_fills_size_and_quality_defaults() -> anyhow::Result<()> {
        let prompt = PromptRequest::new("p", "a red boat", params(&[("model", "dall-e-3")]));
        let request = ProviderRequest::from_prompt(Mode::Image, &prompt, None)?;
        assert_eq!(request.endpoint(), "images/generations");
        assert_eq!(
            request.payload(),
            json!({
                "prompt": "a red boat",
                "model": "dall-e-3",
                "size": "1024x1024",
                "quality": "standard",
            })
        );
        Ok(())
    }

    #[test]
    fn chat_request_leads_with_developer_preamble_and_effort() -> anyhow::Result<()> {
        let prompt = PromptRequest::new(
            "p",
            "fix the bug",
            params(&[("model", "o1"), ("reasoning_effort", "high")]),
        );
        let request = ProviderRequest::from_prompt(Mode::Chat, &prompt, Some("be terse"))?;
        assert_eq!(request.model(), "o1");
        assert_eq!(
            request.payload(),
            json!({
                "model": "o1",
                "messages": [
                    {"role": "developer", "content": "be terse"},
                    {"role": "user", "content": "fix the bug"},
                ],
                "reasoning_effort": "high",
            })
        );
        Ok(())
    }

    #[test]
    fn chat_request_without_effort_omits_the_key() -> anyhow::Result<()> {
        let prompt = PromptRequest::new("p", "hi", params(&[("model", "o1-preview")]));
        let payload = ProviderRequest::from_prompt(Mode::Chat, &prompt, None)?.payload();
        assert!(payload.get("reasoning_effort").is_none());
        assert_eq!(payload["messages"].as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[test]
    fn request_without_model_is_rejected() {
        let prompt = PromptRequest::new("p", "hi", Parameters::new());
        assert!(ProviderRequest::from_prompt(Mode::Chat, &prompt, None).is_err());
    }
}
