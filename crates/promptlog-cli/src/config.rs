use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use promptlog_engine::{RunError, DEFAULT_API_BASE, DEFAULT_TIMEOUT};

/// Checked in order; the first non-empty value wins.
pub const ACCESS_TOKEN_VARS: [&str; 2] = ["OPENAI_ACCESS_TOKEN", "OPENAI_API_KEY"];
pub const API_BASE_VAR: &str = "OPENAI_API_BASE";
pub const TIMEOUT_VAR: &str = "PROMPTLOG_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = ACCESS_TOKEN_VARS.iter().copied().find_map(&non_empty);
        let api_base = non_empty(API_BASE_VAR)
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let timeout = match non_empty(TIMEOUT_VAR) {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("{TIMEOUT_VAR} must be whole seconds, got '{raw}'"))?,
            ),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_key,
            api_base,
            timeout,
        })
    }

    pub fn require_api_key(&self) -> Result<&str, RunError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| RunError::MissingCredential {
                var: ACCESS_TOKEN_VARS[0].to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use promptlog_engine::{RunError, DEFAULT_API_BASE, DEFAULT_TIMEOUT};

    use super::RuntimeConfig;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<RuntimeConfig> {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<String, String>>();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() -> anyhow::Result<()> {
        let config = config_from(&[])?;
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(matches!(
            config.require_api_key(),
            Err(RunError::MissingCredential { var }) if var == "OPENAI_ACCESS_TOKEN"
        ));
        Ok(())
    }

    #[test]
    fn access_token_wins_over_api_key_and_blank_values_are_ignored() -> anyhow::Result<()> {
        let config = config_from(&[("OPENAI_ACCESS_TOKEN", "  "), ("OPENAI_API_KEY", "sk-2")])?;
        assert_eq!(config.require_api_key().ok(), Some("sk-2"));

        let config = config_from(&[("OPENAI_ACCESS_TOKEN", "sk-1"), ("OPENAI_API_KEY", "sk-2")])?;
        assert_eq!(config.require_api_key().ok(), Some("sk-1"));
        Ok(())
    }

    #[test]
    fn api_base_and_timeout_overrides() -> anyhow::Result<()> {
        let config = config_from(&[
            ("OPENAI_API_BASE", "http://localhost:8080/v1/"),
            ("PROMPTLOG_TIMEOUT_SECS", "90"),
        ])?;
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.timeout, Duration::from_secs(90));
        Ok(())
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        assert!(config_from(&[("PROMPTLOG_TIMEOUT_SECS", "soon")]).is_err());
    }
}
