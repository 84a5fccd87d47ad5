//! Process configuration.
//!
//! Resolved once at startup and passed explicitly into the edit client.
//! A missing API key is a fatal startup error.

use crate::error::{EditError, Result};
use crate::image::providers::{GeminiModel, DEFAULT_BASE_URL};
use std::time::Duration;

/// Required: API credential for the generative image service.
pub const API_KEY_ENV: &str = "API_KEY";
/// Optional: model alias (`nano-banana`, `nano-banana-pro`) or raw model id.
pub const MODEL_ENV: &str = "GENEDIT_MODEL";
/// Optional: API base URL, e.g. for a proxy.
pub const BASE_URL_ENV: &str = "GENEDIT_BASE_URL";
/// Optional: request timeout in whole seconds.
pub const TIMEOUT_ENV: &str = "GENEDIT_TIMEOUT_SECS";
/// Optional: program used to share an edited image.
pub const SHARE_COMMAND_ENV: &str = "GENEDIT_SHARE_COMMAND";

/// Configuration for an editing session.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    api_key: String,
    model: GeminiModel,
    base_url: String,
    request_timeout: Option<Duration>,
    share_command: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("share_command", &self.share_command)
            .finish()
    }
}

impl Config {
    /// Creates a configuration with the given API key and defaults elsewhere.
    ///
    /// No request timeout is set: a slow request is awaited indefinitely.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: GeminiModel::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            share_command: None,
        }
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get(API_KEY_ENV).ok_or_else(|| {
            EditError::Config(format!("{API_KEY_ENV} environment variable is not set"))
        })?;

        let mut config = Self::new(api_key);
        if let Some(model) = get(MODEL_ENV) {
            config.model = model.parse()?;
        }
        if let Some(url) = get(BASE_URL_ENV) {
            config.base_url = url;
        }
        if let Some(secs) = get(TIMEOUT_ENV) {
            config.request_timeout = Some(parse_timeout_secs(&secs)?);
        }
        config.share_command = get(SHARE_COMMAND_ENV);

        Ok(config)
    }

    /// Sets the model variant.
    pub fn with_model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets a timeout for each edit request.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the program used by the share action.
    pub fn with_share_command(mut self, command: impl Into<String>) -> Self {
        self.share_command = Some(command.into());
        self
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the model variant.
    pub fn model(&self) -> &GeminiModel {
        &self.model
    }

    /// Returns the API base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns the request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Returns the share program, if one is configured.
    pub fn share_command(&self) -> Option<&str> {
        self.share_command.as_deref()
    }
}

/// Parses a positive number of seconds.
pub fn parse_timeout_secs(value: &str) -> Result<Duration> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(EditError::Config(format!(
            "{TIMEOUT_ENV} must be a positive number of seconds, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, EditError::Config(_)));
        assert!(err.to_string().contains("API_KEY"));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let err = Config::from_lookup(lookup(&[(API_KEY_ENV, "  ")])).unwrap_err();
        assert!(matches!(err, EditError::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[(API_KEY_ENV, "k")])).unwrap();
        assert_eq!(config.api_key(), "k");
        assert_eq!(config.model(), &GeminiModel::default());
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.share_command(), None);
    }

    #[test]
    fn test_optional_overrides() {
        let config = Config::from_lookup(lookup(&[
            (API_KEY_ENV, "k"),
            (MODEL_ENV, "nano-banana-pro"),
            (BASE_URL_ENV, "http://localhost:8080/v1beta/"),
            (TIMEOUT_ENV, "45"),
            (SHARE_COMMAND_ENV, "xdg-open"),
        ]))
        .unwrap();
        assert_eq!(config.model(), &GeminiModel::NanoBananaPro);
        assert_eq!(config.base_url(), "http://localhost:8080/v1beta");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.share_command(), Some("xdg-open"));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = Config::from_lookup(lookup(&[(API_KEY_ENV, "k"), (TIMEOUT_ENV, "0")]))
            .unwrap_err();
        assert!(matches!(err, EditError::Config(_)));
        assert!(parse_timeout_secs("soon").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config::new("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
