use std::fmt::{self, Debug, Formatter};

/// The OpenRouter endpoint, which speaks the OpenAI chat completions API.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    app_title: Option<String>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            app_title: None,
        }
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL. A trailing slash is ignored.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the application name reported to routers that attribute
    /// traffic (sent as `X-Title`).
    #[inline]
    pub fn with_app_title<S: Into<String>>(mut self, title: S) -> Self {
        self.app_title = Some(title.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OpenAIConfig {
        let base_url = self
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_owned();
        OpenAIConfig {
            api_key: self.api_key,
            model: self
                .model
                .unwrap_or_else(|| "anthropic/claude-opus-4-6".to_owned()),
            base_url,
            app_title: self.app_title,
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("app_title", &self.app_title)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) app_title: Option<String>,
}

impl OpenAIConfig {
    /// Returns the model id sent with every request.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the base URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("app_title", &self.app_title)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OpenAIConfigBuilder::with_api_key("sk-or-test").build();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(
            config.completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let config = OpenAIConfigBuilder::with_api_key("sk-or-secret")
            .with_base_url("http://localhost:8080/v1/")
            .with_model("local")
            .build();
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-or-secret"));
        assert!(debug.contains("local"));
    }
}
