use serde::Deserialize;
use std::time::Duration;

use crate::services::{lifecycle, poller, transport};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Status server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// R2 bucket name
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// Base URL under which objects in the bucket are publicly served
    pub public_base_url: String,

    /// Key prefix for edited images
    #[serde(default = "default_artifact_namespace")]
    pub artifact_namespace: String,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Processing jobs created longer ago than this are reset at startup
    #[serde(default = "default_recovery_cutoff_minutes")]
    pub recovery_cutoff_minutes: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Fail jobs whose settings fall outside the editor's slider ranges
    #[serde(default)]
    pub strict_settings: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_artifact_namespace() -> String {
    transport::DEFAULT_NAMESPACE.to_string()
}

fn default_jpeg_quality() -> u8 {
    transport::DEFAULT_JPEG_QUALITY
}

fn default_poll_interval_secs() -> u64 {
    poller::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_recovery_cutoff_minutes() -> u64 {
    lifecycle::DEFAULT_RECOVERY_WINDOW.as_secs() / 60
}

fn default_fetch_timeout_secs() -> u64 {
    transport::DEFAULT_FETCH_TIMEOUT.as_secs()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn recovery_window(&self) -> Duration {
        Duration::from_secs(self.recovery_cutoff_minutes.saturating_mul(60))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<(String, String)> {
        [
            ("DATABASE_URL", "postgres://localhost/edits"),
            ("R2_BUCKET", "photos"),
            ("R2_ACCESS_KEY", "key"),
            ("R2_SECRET_KEY", "secret"),
            ("R2_ENDPOINT", "https://account.r2.cloudflarestorage.com"),
            ("PUBLIC_BASE_URL", "https://pub.example.r2.dev"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = envy::from_iter(required()).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.artifact_namespace, "edited");
        assert_eq!(config.jpeg_quality, 92);
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.recovery_window(), Duration::from_secs(600));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert!(!config.strict_settings);
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.push(("POLL_INTERVAL_SECS".to_string(), "10".to_string()));
        vars.push(("RECOVERY_CUTOFF_MINUTES".to_string(), "30".to_string()));
        vars.push(("STRICT_SETTINGS".to_string(), "true".to_string()));

        let config: AppConfig = envy::from_iter(vars).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.recovery_window(), Duration::from_secs(1800));
        assert!(config.strict_settings);
    }

    #[test]
    fn test_huge_recovery_cutoff_saturates() {
        let mut vars = required();
        vars.push((
            "RECOVERY_CUTOFF_MINUTES".to_string(),
            u64::MAX.to_string(),
        ));

        let config: AppConfig = envy::from_iter(vars).unwrap();

        assert_eq!(config.recovery_window(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_missing_required_variable() {
        let vars: Vec<_> = required()
            .into_iter()
            .filter(|(k, _)| k != "PUBLIC_BASE_URL")
            .collect();
        assert!(envy::from_iter::<_, AppConfig>(vars).is_err());
    }
}
