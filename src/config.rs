use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::WebinCredentials;
use crate::error::UploaderError;

pub const WEBIN_USERNAME_VAR: &str = "ENA_WEBIN";
pub const WEBIN_PASSWORD_VAR: &str = "ENA_WEBIN_PASSWORD";

const DEFAULT_CONFIG_FILE: &str = "ena-uploader.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: EndpointsEntry,
    #[serde(default)]
    pub retry: RetryEntry,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointsEntry {
    #[serde(default)]
    pub public_search: Option<String>,
    #[serde(default)]
    pub private_report: Option<String>,
    #[serde(default)]
    pub dropbox: Option<String>,
    #[serde(default)]
    pub dropbox_test: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetryEntry {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub run_not_found_retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub public_search: String,
    /// Base of the Webin reports API, without a trailing slash.
    pub private_report: String,
    pub dropbox: String,
    pub dropbox_test: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            public_search: "https://www.ebi.ac.uk/ena/portal/api/search".to_string(),
            private_report: "https://www.ebi.ac.uk/ena/submit/report".to_string(),
            dropbox: "https://www.ebi.ac.uk/ena/submit/drop-box/submit/".to_string(),
            dropbox_test: "https://wwwdev.ebi.ac.uk/ena/submit/drop-box/submit".to_string(),
        }
    }
}

impl Endpoints {
    pub fn dropbox_for(&self, test_server: bool) -> &str {
        if test_server {
            &self.dropbox_test
        } else {
            &self.dropbox
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts on transport failure, first one included.
    pub max_attempts: u32,
    pub delay: Duration,
    /// Extra attempts when a run query answers 204.
    pub run_not_found_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            run_not_found_retries: 2,
        }
    }
}

impl RetryPolicy {
    pub fn without_delay(mut self) -> Self {
        self.delay = Duration::ZERO;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoints: Endpoints,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist. Without one, `ena-uploader.json` in the
    /// working directory is used when present, defaults otherwise.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, UploaderError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| UploaderError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| UploaderError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, UploaderError> {
        let defaults = ResolvedConfig::default();

        let endpoints = Endpoints {
            public_search: config
                .endpoints
                .public_search
                .unwrap_or(defaults.endpoints.public_search),
            private_report: config
                .endpoints
                .private_report
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoints.private_report),
            dropbox: config.endpoints.dropbox.unwrap_or(defaults.endpoints.dropbox),
            dropbox_test: config
                .endpoints
                .dropbox_test
                .unwrap_or(defaults.endpoints.dropbox_test),
        };

        let max_attempts = config
            .retry
            .max_attempts
            .unwrap_or(defaults.retry.max_attempts);
        if max_attempts == 0 {
            return Err(UploaderError::ConfigParse(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        let retry = RetryPolicy {
            max_attempts,
            delay: config
                .retry
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.delay),
            run_not_found_retries: config
                .retry
                .run_not_found_retries
                .unwrap_or(defaults.retry.run_not_found_retries),
        };

        Ok(ResolvedConfig {
            endpoints,
            retry,
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        })
    }
}

/// Reads the Webin account from `ENA_WEBIN` and `ENA_WEBIN_PASSWORD`.
pub fn credentials_from_env() -> Result<WebinCredentials, UploaderError> {
    credentials_from_lookup(|name| std::env::var(name).ok())
}

pub fn credentials_from_lookup<F>(lookup: F) -> Result<WebinCredentials, UploaderError>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
    match (read(WEBIN_USERNAME_VAR), read(WEBIN_PASSWORD_VAR)) {
        (Some(username), Some(password)) => Ok(WebinCredentials::new(username, password)),
        _ => Err(UploaderError::MissingCredentials),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.endpoints, Endpoints::default());
        assert_eq!(resolved.retry, RetryPolicy::default());
    }

    #[test]
    fn report_base_loses_trailing_slash() {
        let config: Config =
            serde_json::from_str(r#"{"endpoints": {"private_report": "http://host/report/"}}"#)
                .unwrap();
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.endpoints.private_report, "http://host/report");
    }
}
