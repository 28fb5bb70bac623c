use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::timestamp::RunTimestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryLayout {
    /// One timestamp, then each block under a `Label:` heading, then a blank line.
    Labeled,
    /// Each block under its own timestamp line.
    Stamped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBlock {
    pub label: Option<String>,
    pub timestamp: Option<RunTimestamp>,
    pub content: String,
}

/// One exchange in a conversation log. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationLogEntry {
    pub timestamp: RunTimestamp,
    pub layout: EntryLayout,
    pub blocks: Vec<LogBlock>,
}

impl ConversationLogEntry {
    pub fn image_exchange(timestamp: RunTimestamp, prompt: &str, image_url: &str) -> Self {
        Self {
            timestamp,
            layout: EntryLayout::Labeled,
            blocks: vec![
                LogBlock {
                    label: Some("Prompt".to_string()),
                    timestamp: None,
                    content: prompt.to_string(),
                },
                LogBlock {
                    label: Some("Image URL".to_string()),
                    timestamp: None,
                    content: image_url.to_string(),
                },
            ],
        }
    }

    pub fn chat_exchange(
        requested_at: RunTimestamp,
        prompt: &str,
        answered_at: RunTimestamp,
        answer: &str,
    ) -> Self {
        Self {
            timestamp: requested_at.clone(),
            layout: EntryLayout::Stamped,
            blocks: vec![
                LogBlock {
                    label: None,
                    timestamp: Some(requested_at),
                    content: prompt.to_string(),
                },
                LogBlock {
                    label: None,
                    timestamp: Some(answered_at),
                    content: answer.to_string(),
                },
            ],
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.layout {
            EntryLayout::Labeled => {
                push_line(&mut out, self.timestamp.as_str());
                for block in &self.blocks {
                    if let Some(label) = &block.label {
                        push_line(&mut out, &format!("{label}:"));
                    }
                    push_line(&mut out, &block.content);
                }
                out.push('\n');
            }
            EntryLayout::Stamped => {
                for block in &self.blocks {
                    let stamp = block.timestamp.as_ref().unwrap_or(&self.timestamp);
                    out.push_str(stamp.as_str());
                    out.push('\n');
                    out.push_str(&block.content);
                    out.push('\n');
                }
            }
        }
        out
    }
}

fn push_line(out: &mut String, text: &str) {
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
}

/// Append-only `<prompt-id>_conversation` file.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    path: PathBuf,
}

impl ConversationLog {
    pub fn file_name(prompt_id: &str) -> String {
        format!("{prompt_id}_conversation")
    }

    pub fn new(log_dir: &Path, prompt_id: &str) -> Self {
        Self {
            path: log_dir.join(Self::file_name(prompt_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the rendered entry with a single write on an append-mode handle,
    /// so concurrent runs interleave whole entries and never truncate.
    pub fn append(&self, entry: &ConversationLogEntry) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(entry.render().as_bytes())
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        Ok(())
    }
}
