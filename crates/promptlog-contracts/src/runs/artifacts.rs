use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use super::timestamp::RunTimestamp;
use crate::prompts::Mode;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// File name for one run's answer. `attempt` > 0 adds a `-N` collision suffix.
pub fn artifact_file_name(
    mode: Mode,
    prompt_id: &str,
    timestamp: &RunTimestamp,
    attempt: u32,
) -> String {
    let suffix = if attempt == 0 {
        String::new()
    } else {
        format!("-{attempt}")
    };
    match mode {
        Mode::Image => format!("{prompt_id}_image_url_{timestamp}{suffix}.txt"),
        Mode::Chat => format!("{prompt_id}_openai_response_{timestamp}{suffix}"),
    }
}

/// Writes `content` to a fresh artifact file and returns its path.
///
/// Never overwrites: a name already taken (two runs in the same second)
/// moves on to the next suffix.
pub fn write_answer_artifact(
    log_dir: &Path,
    mode: Mode,
    prompt_id: &str,
    timestamp: &RunTimestamp,
    content: &str,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = log_dir.join(artifact_file_name(mode, prompt_id, timestamp, attempt));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to create {}", path.display()))
            }
        };
        file.write_all(content.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        return Ok(path);
    }

    bail!(
        "no free artifact name for '{prompt_id}' at {timestamp} after {MAX_NAME_ATTEMPTS} attempts"
    );
}
