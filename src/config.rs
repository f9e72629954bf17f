use std::env;
use std::fmt;

use thiserror::Error;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),
}

/// Static credentials and endpoint settings for the S3 backend.
///
/// Validated on construction, so a `StoreConfig` always carries both keys.
#[derive(Clone)]
pub struct StoreConfig {
    access_key_id: String,
    secret_access_key: String,
    region: String,
    endpoint: Option<String>,
    force_path_style: bool,
    max_attempts: Option<u32>,
}

impl StoreConfig {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();
        if access_key_id.trim().is_empty() {
            return Err(ConfigError::MissingCredential("access key id"));
        }
        if secret_access_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("secret access key"));
        }

        let region = region.into();
        let region = if region.trim().is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            region.trim().to_ascii_lowercase()
        };

        Ok(Self {
            access_key_id,
            secret_access_key,
            region,
            endpoint: None,
            force_path_style: false,
            max_attempts: None,
        })
    }

    /// Reads credentials from the environment after loading `.env`, if any.
    ///
    /// `AWS_ACCESS_KEY` wins over `AWS_ACCESS_KEY_ID`, `REGION_NAME` over
    /// `AWS_REGION`. `S3_ENDPOINT_URL` points at an S3-compatible service and
    /// switches to path-style addressing.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let access_key_id = first_var(&["AWS_ACCESS_KEY", "AWS_ACCESS_KEY_ID"])
            .ok_or(ConfigError::MissingCredential("AWS_ACCESS_KEY"))?;
        let secret_access_key = first_var(&["AWS_SECRET_ACCESS_KEY"])
            .ok_or(ConfigError::MissingCredential("AWS_SECRET_ACCESS_KEY"))?;
        let region = first_var(&["REGION_NAME", "AWS_REGION"]).unwrap_or_default();

        let mut config = Self::new(access_key_id, secret_access_key, region)?;
        if let Some(endpoint) = first_var(&["S3_ENDPOINT_URL"]) {
            config = config.with_endpoint(endpoint);
        }
        Ok(config)
    }

    /// Targets an S3-compatible endpoint with path-style addressing.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self.force_path_style = true;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        let region = region.into();
        if !region.trim().is_empty() {
            self.region = region.trim().to_ascii_lowercase();
        }
        self
    }

    /// Caps SDK attempts per request, the first try included.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn force_path_style(&self) -> bool {
        self.force_path_style
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

fn first_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_missing_keys() {
        assert_eq!(
            StoreConfig::new("", "secret", "us-east-1").unwrap_err(),
            ConfigError::MissingCredential("access key id")
        );
        assert_eq!(
            StoreConfig::new("AKID", "  ", "us-east-1").unwrap_err(),
            ConfigError::MissingCredential("secret access key")
        );
    }

    #[test]
    fn test_region_defaults_and_normalizes() {
        let config = StoreConfig::new("AKID", "secret", "").unwrap();
        assert_eq!(config.region(), DEFAULT_REGION);

        let config = StoreConfig::new("AKID", "secret", "US-EAST-1").unwrap();
        assert_eq!(config.region(), "us-east-1");

        let config = config.with_region("eu-central-1");
        assert_eq!(config.region(), "eu-central-1");
    }

    #[test]
    fn test_endpoint_enables_path_style() {
        let config = StoreConfig::new("AKID", "secret", "auto")
            .unwrap()
            .with_endpoint("http://127.0.0.1:9000");
        assert_eq!(config.endpoint(), Some("http://127.0.0.1:9000"));
        assert!(config.force_path_style());
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        let config = StoreConfig::new("AKID", "secret", "us-east-1").unwrap();
        assert_eq!(config.max_attempts(), None);
        assert_eq!(config.clone().with_max_attempts(3).max_attempts(), Some(3));
        assert_eq!(config.with_max_attempts(0).max_attempts(), Some(1));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = StoreConfig::new("AKID", "top-secret-value", "us-east-1").unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("top-secret-value"));
    }
}
