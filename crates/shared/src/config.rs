use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::config_env::{
    optional_trimmed_env, parse_optional_u64_env, parse_u64_env, require_env,
};
use crate::llm::CompletionClientConfig;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_API_KEY_HEADER: &str = "api-key";
const DEFAULT_TIMESTAMP_TOLERANCE_SECONDS: u64 = 150;

#[derive(Debug, Clone)]
pub struct SkillConfig {
    pub bind_addr: String,
    pub log_format: LogFormat,
    pub system_prompt_path: PathBuf,
    pub completion: CompletionClientConfig,
    pub skill_id: Option<String>,
    /// Zero disables the request timestamp check.
    pub timestamp_tolerance_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("LOG_FORMAT must be text or json, got '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SkillConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint_url = require_env("COMPLETION_ENDPOINT_URL")?;
        validate_endpoint_url("COMPLETION_ENDPOINT_URL", &endpoint_url)?;

        let log_format = match optional_trimmed_env("LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(ConfigError::InvalidConfiguration)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr: optional_trimmed_env("SKILL_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            log_format,
            system_prompt_path: PathBuf::from(require_env("SYSTEM_PROMPT_PATH")?),
            completion: CompletionClientConfig {
                endpoint_url,
                api_key: require_env("COMPLETION_API_KEY")?,
                api_key_header: optional_trimmed_env("COMPLETION_API_KEY_HEADER")
                    .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string()),
                timeout_ms: parse_optional_u64_env("COMPLETION_TIMEOUT_MS")?,
            },
            skill_id: optional_trimmed_env("ALEXA_SKILL_ID"),
            timestamp_tolerance_seconds: parse_u64_env(
                "ALEXA_TIMESTAMP_TOLERANCE_SECONDS",
                DEFAULT_TIMESTAMP_TOLERANCE_SECONDS,
            )?,
        })
    }
}

pub(crate) fn validate_endpoint_url(key: &str, raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw)
        .map_err(|err| ConfigError::InvalidConfiguration(format!("{key} is not a URL: {err}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidConfiguration(format!(
            "{key} must use http:// or https://, got {scheme}://"
        ))),
    }
}
