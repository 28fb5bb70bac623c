use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use promptlog_contracts::events::{EventPayload, RunEventLog};
use promptlog_contracts::models::ModelSelector;
use promptlog_contracts::prompts::{
    prompt_id_from_path, Mode, Parameters, PromptRequest, ProviderRequest, ProviderResponse,
    ResponseMetadata,
};
use promptlog_contracts::runs::artifacts::write_answer_artifact;
use promptlog_contracts::runs::conversation::{ConversationLog, ConversationLogEntry};
use promptlog_contracts::runs::timestamp::{Clock, RunTimestamp, SystemClock};
use serde_json::{json, Map, Value};

mod error;
mod providers;

pub use error::RunError;
pub use providers::{
    CompletionProvider, DryrunProvider, OpenAiProvider, DEFAULT_API_BASE, DEFAULT_TIMEOUT,
};

/// Developer message for the reasoning variant. The first line turns markdown
/// back on for o1-family models.
pub const REASONING_DEVELOPER_PREAMBLE: &str = "\
Formatting re-enabled.

As a general note when replying to me with code, for every file that
needs to change, just write out the entire file for me, or at least large
relevant chunks of it, so I can copy-paste it to my local file system.

Never ever send me a diff or a patch file, even if I provide you with
one. I will not be able to apply it. Instead, just send me the entire
file(s) that need to change.

However, in order to facilitate rapid code reviews, let's not change
unrelated code for e.g. style reasons.
";

/// A preset matching one of the prompt scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub name: &'static str,
    pub mode: Mode,
    pub default_model: &'static str,
    pub developer_preamble: Option<&'static str>,
    pub default_reasoning_effort: Option<&'static str>,
}

impl Variant {
    pub const DALL_E_3: Variant = Variant {
        name: "dall-e-3",
        mode: Mode::Image,
        default_model: "dall-e-3",
        developer_preamble: None,
        default_reasoning_effort: None,
    };

    pub const O1_PREVIEW: Variant = Variant {
        name: "o1-preview",
        mode: Mode::Chat,
        default_model: "o1-preview",
        developer_preamble: None,
        default_reasoning_effort: None,
    };

    pub const REASONING: Variant = Variant {
        name: "reasoning",
        mode: Mode::Chat,
        default_model: "o1",
        developer_preamble: Some(REASONING_DEVELOPER_PREAMBLE),
        default_reasoning_effort: Some("high"),
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub variant: Variant,
    pub model: Option<String>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub reasoning_effort: Option<String>,
}

impl RunOptions {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            model: None,
            size: None,
            quality: None,
            reasoning_effort: None,
        }
    }

    /// Options that apply to the variant's mode, with the resolved model first.
    fn parameters(&self, model: &str) -> Parameters {
        let mut parameters = Parameters::new();
        parameters.insert("model".to_string(), Value::String(model.to_string()));
        match self.variant.mode {
            Mode::Image => {
                let size = self.size.as_deref().unwrap_or(ProviderRequest::DEFAULT_SIZE);
                let quality = self
                    .quality
                    .as_deref()
                    .unwrap_or(ProviderRequest::DEFAULT_QUALITY);
                parameters.insert("size".to_string(), Value::String(size.to_string()));
                parameters.insert("quality".to_string(), Value::String(quality.to_string()));
            }
            Mode::Chat => {
                let effort = self
                    .reasoning_effort
                    .as_deref()
                    .or(self.variant.default_reasoning_effort);
                if let Some(effort) = effort {
                    parameters.insert(
                        "reasoning_effort".to_string(),
                        Value::String(effort.to_string()),
                    );
                }
            }
        }
        parameters
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub prompt_id: String,
    pub mode: Mode,
    pub model: String,
    pub model_note: Option<String>,
    pub timestamp: RunTimestamp,
    pub primary_content: String,
    pub metadata: ResponseMetadata,
    pub answer_path: PathBuf,
    pub conversation_path: PathBuf,
}

impl RunOutcome {
    /// Human-readable summary printed after a successful run.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Metadata: {}", Value::Object(self.metadata.response.clone())),
            format!("Answer metadata: {}", Value::Object(self.metadata.answer.clone())),
        ];
        let label = match self.mode {
            Mode::Image => "Image URL",
            Mode::Chat => "Response",
        };
        lines.push(format!(
            "{label} saved to {} and appended to {}",
            self.answer_path.display(),
            self.conversation_path.display()
        ));
        if self.mode == Mode::Image {
            lines.push(format!("Image URL: {}", self.primary_content));
        }
        lines
    }
}

/// Runs one prompt file through a provider and records the exchange.
///
/// Either both the answer artifact and the conversation entry are written,
/// or nothing in the log directory changes. An artifact whose conversation
/// append fails is removed again.
pub struct InteractionRunner {
    provider: Box<dyn CompletionProvider>,
    log_dir: PathBuf,
    clock: Box<dyn Clock>,
    events: Option<RunEventLog>,
    model_selector: ModelSelector,
}

impl InteractionRunner {
    pub fn new(provider: Box<dyn CompletionProvider>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            log_dir: log_dir.into(),
            clock: Box::new(SystemClock),
            events: None,
            model_selector: ModelSelector::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: RunEventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Handled failures come back as a [`RunError`] inside the `anyhow::Error`;
    /// anything else (transport, disk) is unexpected.
    pub fn execute(&self, prompt_path: &Path, options: &RunOptions) -> Result<RunOutcome> {
        let variant = options.variant;
        let mode = variant.mode;
        let prompt_id = prompt_id_from_path(prompt_path);
        let requested_at = self.clock.now();
        let run_id = format!("{prompt_id}-{requested_at}");

        let selection = self.model_selector.select(
            options.model.as_deref(),
            mode.capability(),
            variant.default_model,
        );
        if let Some(note) = &selection.note {
            warn!("{note}");
            self.emit(
                &run_id,
                "model_fallback",
                json!({
                    "requested": selection.requested,
                    "model": selection.model,
                    "note": note,
                }),
            );
        }

        let parameters = options.parameters(&selection.model);
        let prompt = match PromptRequest::from_file(prompt_path, parameters) {
            Ok(prompt) => prompt,
            Err(err) if err.kind() == ErrorKind::NotFound || !prompt_path.is_file() => {
                info!("cannot read {}: {err}", prompt_path.display());
                return Err(self.fail(
                    &run_id,
                    RunError::NotFound {
                        path: prompt_path.to_path_buf(),
                    },
                ));
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", prompt_path.display()));
            }
        };
        let request = ProviderRequest::from_prompt(mode, &prompt, variant.developer_preamble)?;

        self.emit(
            &run_id,
            "run_started",
            json!({
                "variant": variant.name,
                "prompt_id": prompt.id(),
                "provider": self.provider.name(),
                "parameters": prompt
                    .parameters()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<Map<String, Value>>(),
            }),
        );

        let raw = self.provider.call(&request)?;
        self.emit(
            &run_id,
            "provider_called",
            json!({ "endpoint": request.endpoint(), "model": request.model() }),
        );

        let (primary_content, metadata) = match ProviderResponse::decode(mode, &raw) {
            Ok(ProviderResponse::Success {
                primary_content,
                metadata,
            }) => (primary_content, metadata),
            Ok(ProviderResponse::Failure { message }) => {
                return Err(self.fail(&run_id, RunError::ProviderFailure { message }));
            }
            Err(malformed) => return Err(self.fail(&run_id, malformed.into())),
        };

        let answered_at = self.clock.now();
        let entry = match mode {
            Mode::Image => ConversationLogEntry::image_exchange(
                answered_at.clone(),
                prompt.text(),
                &primary_content,
            ),
            Mode::Chat => ConversationLogEntry::chat_exchange(
                requested_at,
                prompt.text(),
                answered_at.clone(),
                &primary_content,
            ),
        };

        let answer_path = write_answer_artifact(
            &self.log_dir,
            mode,
            prompt.id(),
            &answered_at,
            &primary_content,
        )?;
        let conversation = ConversationLog::new(&self.log_dir, prompt.id());
        if let Err(err) = conversation.append(&entry) {
            if let Err(cleanup) = std::fs::remove_file(&answer_path) {
                warn!("failed to remove {}: {cleanup}", answer_path.display());
            }
            return Err(err);
        }

        self.emit(
            &run_id,
            "answer_written",
            json!({
                "answer_path": answer_path.to_string_lossy(),
                "conversation_path": conversation.path().to_string_lossy(),
                "chars": primary_content.chars().count(),
            }),
        );

        Ok(RunOutcome {
            prompt_id: prompt.id().to_string(),
            mode,
            model: selection.model,
            model_note: selection.note,
            timestamp: answered_at,
            primary_content,
            metadata,
            answer_path,
            conversation_path: conversation.path().to_path_buf(),
        })
    }

    fn fail(&self, run_id: &str, err: RunError) -> anyhow::Error {
        self.emit(
            run_id,
            "run_failed",
            json!({ "kind": err.kind(), "message": err.to_string() }),
        );
        err.into()
    }

    /// Event records are diagnostics; a failed write is logged, never fatal.
    fn emit(&self, run_id: &str, event_type: &str, payload: Value) {
        let Some(events) = &self.events else {
            return;
        };
        let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
        if let Err(err) = events.emit(run_id, event_type, payload) {
            warn!(
                "failed to record {event_type} in {}: {err:#}",
                events.path().display()
            );
        }
    }
}
