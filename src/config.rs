//! Client configuration read from the environment.

use crate::error::ConfigError;
use crate::types::ModelHint;
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1";
const DEFAULT_LOG_LEVEL: Level = Level::INFO;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL the `/token`, `/upload` and `/ask` paths are joined onto.
    pub api_url: Url,
    pub model: ModelHint,
    /// Overrides the platform data directory for the credential store.
    pub data_dir: Option<PathBuf>,
    pub log_level: Level,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            model: ModelHint::default(),
            data_dir: None,
            log_level: DEFAULT_LOG_LEVEL,
        }
    }

    /// Build configuration from `SYNAPSE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = env::var("SYNAPSE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&raw_url)?;

        let mut config = Self::new(api_url);

        if let Ok(model) = env::var("SYNAPSE_MODEL")
            && !model.trim().is_empty()
        {
            config.model = ModelHint::new(model.trim());
        }

        config.data_dir = env::var_os("SYNAPSE_DATA_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        if let Ok(level) = env::var("SYNAPSE_LOG") {
            config.log_level = level
                .trim()
                .parse::<Level>()
                .map_err(|e| ConfigError::InvalidVar {
                    var: "SYNAPSE_LOG",
                    reason: e.to_string(),
                })?;
        }

        Ok(config)
    }

    /// Resolve an endpoint path against the base URL.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.api_url.clone();
        {
            let base = url.path().trim_end_matches('/').to_string();
            url.set_path(&format!("{}/{}", base, path.trim_start_matches('/')));
        }
        url
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidVar {
        var: "SYNAPSE_API_URL",
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidVar {
            var: "SYNAPSE_API_URL",
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_path() {
        let config = ClientConfig::new(Url::parse(DEFAULT_API_URL).unwrap());
        assert_eq!(
            config.endpoint("/token").as_str(),
            "http://127.0.0.1:8000/api/v1/token"
        );
        assert_eq!(
            config.endpoint("ask").as_str(),
            "http://127.0.0.1:8000/api/v1/ask"
        );
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let config = ClientConfig::new(Url::parse("https://synapse.example/api/v1/").unwrap());
        assert_eq!(
            config.endpoint("upload").as_str(),
            "https://synapse.example/api/v1/upload"
        );
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(parse_api_url("ftp://example.com").is_err());
        assert!(parse_api_url("not a url").is_err());
        assert!(parse_api_url(" http://localhost:8000 ").is_ok());
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = ClientConfig::new(Url::parse(DEFAULT_API_URL).unwrap());
        assert_eq!(config.model.as_str(), "flash");
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.data_dir.is_none());
    }
}
