//! Run configuration, resolved once before anything starts.

use std::env;
use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use terminal_agent_openai_model::DEFAULT_BASE_URL;

/// The model used when no override is given.
pub const DEFAULT_MODEL: &str = "openrouter/anthropic/claude-opus-4-6";

/// How long a shell command may run before it is killed.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// The value shipped in example `.env` files.
const API_KEY_PLACEHOLDER: &str = "sk-or-paste-your-key-here";

/// Routing prefix accepted in model ids but not sent to the endpoint.
const ROUTING_PREFIX: &str = "openrouter/";

/// Errors found while resolving the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No usable API key was provided.
    #[error("OPENROUTER_API_KEY is not set")]
    MissingApiKey,
    /// The API key is still the placeholder.
    #[error("OPENROUTER_API_KEY still holds the placeholder value")]
    PlaceholderApiKey,
    /// A variable is set to something that cannot be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// The variable name.
        name: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Builder for [`AgentConfig`].
#[derive(Clone)]
pub struct AgentConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    command_timeout: Option<Duration>,
    vision_model: Option<String>,
    max_turns: Option<usize>,
    staging_dir: Option<PathBuf>,
}

impl AgentConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::empty()
        }
    }

    /// Creates a builder from the process environment.
    ///
    /// | variable | setting |
    /// | --- | --- |
    /// | `OPENROUTER_API_KEY` | API key |
    /// | `TERMINAL_AGENT_MODEL` | model id |
    /// | `TERMINAL_AGENT_BASE_URL` | endpoint base URL |
    /// | `TERMINAL_AGENT_COMMAND_TIMEOUT` | shell timeout in seconds |
    /// | `TERMINAL_AGENT_VISION_MODEL` | model id for `read_image` |
    /// | `TERMINAL_AGENT_MAX_TURNS` | turn limit |
    ///
    /// Empty variables count as unset. The API key is only checked by
    /// [`AgentConfigBuilder::build`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`AgentConfigBuilder::from_env`], reading variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        Ok(Self {
            api_key: var("OPENROUTER_API_KEY"),
            model: var("TERMINAL_AGENT_MODEL"),
            base_url: var("TERMINAL_AGENT_BASE_URL"),
            command_timeout: parse_var(
                "TERMINAL_AGENT_COMMAND_TIMEOUT",
                var("TERMINAL_AGENT_COMMAND_TIMEOUT"),
            )?
            .map(Duration::from_secs),
            vision_model: var("TERMINAL_AGENT_VISION_MODEL"),
            max_turns: parse_var(
                "TERMINAL_AGENT_MAX_TURNS",
                var("TERMINAL_AGENT_MAX_TURNS"),
            )?,
            staging_dir: None,
        })
    }

    fn empty() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: None,
            command_timeout: None,
            vision_model: None,
            max_turns: None,
            staging_dir: None,
        }
    }

    /// Overrides the model id.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom endpoint base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the shell command timeout.
    #[inline]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Uses a different model for `read_image`.
    #[inline]
    pub fn with_vision_model<S: Into<String>>(mut self, model: S) -> Self {
        self.vision_model = Some(model.into());
        self
    }

    /// Limits the number of model turns per run.
    #[inline]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Stages transferred files in `dir` instead of the OS temp directory.
    #[inline]
    pub fn with_staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<AgentConfig, ConfigError> {
        let api_key = match self.api_key.as_deref().map(str::trim) {
            None | Some("") => return Err(ConfigError::MissingApiKey),
            Some(API_KEY_PLACEHOLDER) => {
                return Err(ConfigError::PlaceholderApiKey);
            }
            Some(key) => key.to_owned(),
        };
        if self.max_turns == Some(0) {
            return Err(ConfigError::InvalidValue {
                name: "max_turns",
                value: "0".to_owned(),
            });
        }
        Ok(AgentConfig {
            api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            command_timeout: self
                .command_timeout
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
            vision_model: self.vision_model,
            max_turns: self.max_turns,
            staging_dir: self.staging_dir,
        })
    }
}

impl Debug for AgentConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfigBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("command_timeout", &self.command_timeout)
            .field("vision_model", &self.vision_model)
            .field("max_turns", &self.max_turns)
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}

/// Everything needed to run a task, validated.
#[derive(Clone)]
pub struct AgentConfig {
    api_key: String,
    model: String,
    base_url: String,
    command_timeout: Duration,
    vision_model: Option<String>,
    max_turns: Option<usize>,
    staging_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Resolves the configuration from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        AgentConfigBuilder::from_env()?.build()
    }

    /// Returns the API key.
    #[inline]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the model id as configured.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the model id as sent to the endpoint.
    #[inline]
    pub fn api_model(&self) -> &str {
        strip_routing_prefix(&self.model)
    }

    /// Returns the model id `read_image` sends to the endpoint, if it
    /// differs from the agent's model.
    pub fn vision_api_model(&self) -> Option<&str> {
        self.vision_model
            .as_deref()
            .map(strip_routing_prefix)
            .filter(|model| *model != self.api_model())
    }

    /// Returns the endpoint base URL.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the shell command timeout.
    #[inline]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Returns the turn limit, if any.
    #[inline]
    pub fn max_turns(&self) -> Option<usize> {
        self.max_turns
    }

    /// Returns the staging directory, if not the OS default.
    #[inline]
    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }
}

impl Debug for AgentConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("command_timeout", &self.command_timeout)
            .field("vision_model", &self.vision_model)
            .field("max_turns", &self.max_turns)
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}

#[inline]
fn strip_routing_prefix(model: &str) -> &str {
    model.strip_prefix(ROUTING_PREFIX).unwrap_or(model)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfigBuilder::from_lookup(|name| vars.get(name).cloned())?
            .build()
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[("OPENROUTER_API_KEY", "sk-or-123")]).unwrap();
        assert_eq!(config.api_key(), "sk-or-123");
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.api_model(), "anthropic/claude-opus-4-6");
        assert_eq!(config.base_url(), "https://openrouter.ai/api/v1");
        assert_eq!(config.command_timeout(), Duration::from_secs(300));
        assert_eq!(config.vision_api_model(), None);
        assert_eq!(config.max_turns(), None);
    }

    #[test]
    fn test_credential_is_required() {
        assert!(matches!(from_vars(&[]), Err(ConfigError::MissingApiKey)));
        assert!(matches!(
            from_vars(&[("OPENROUTER_API_KEY", "")]),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(matches!(
            from_vars(&[("OPENROUTER_API_KEY", "sk-or-paste-your-key-here")]),
            Err(ConfigError::PlaceholderApiKey)
        ));
    }

    #[test]
    fn test_overrides() {
        let config = from_vars(&[
            ("OPENROUTER_API_KEY", "sk-or-123"),
            ("TERMINAL_AGENT_MODEL", "openai/gpt-4o"),
            ("TERMINAL_AGENT_COMMAND_TIMEOUT", "60"),
            ("TERMINAL_AGENT_VISION_MODEL", "openrouter/google/gemini-2.5-pro"),
            ("TERMINAL_AGENT_MAX_TURNS", "40"),
        ])
        .unwrap();
        assert_eq!(config.api_model(), "openai/gpt-4o");
        assert_eq!(config.command_timeout(), Duration::from_secs(60));
        assert_eq!(config.vision_api_model(), Some("google/gemini-2.5-pro"));
        assert_eq!(config.max_turns(), Some(40));

        // An explicit override beats the environment.
        let config = AgentConfigBuilder::with_api_key("sk-or-123")
            .with_model("openrouter/anthropic/claude-sonnet-4-5")
            .build()
            .unwrap();
        assert_eq!(config.api_model(), "anthropic/claude-sonnet-4-5");
    }

    #[test]
    fn test_invalid_values() {
        let err = from_vars(&[
            ("OPENROUTER_API_KEY", "sk-or-123"),
            ("TERMINAL_AGENT_COMMAND_TIMEOUT", "soon"),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for TERMINAL_AGENT_COMMAND_TIMEOUT: \"soon\""
        );
    }

    #[test]
    fn test_debug_redacts_the_key() {
        let config = AgentConfigBuilder::with_api_key("sk-or-secret")
            .build()
            .unwrap();
        assert!(!format!("{config:?}").contains("sk-or-secret"));
    }
}
