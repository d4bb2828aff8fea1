//! Process configuration, read from `HOOKSINK_*` environment variables.

use std::time::Duration;

use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hooksink_core::ProjectId;

use crate::provision::{SchemaProvisioner, VisibilityPoll};
use crate::store::BigQueryOptions;
use crate::store::bigquery::DEFAULT_BASE_URL;
use crate::workers::WorkerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HooksinkConfig {
    /// Default tracing filter when `RUST_LOG` is unset; `info` when absent
    #[serde(default)]
    pub log_level: Option<String>,

    // BigQuery client
    #[serde(default = "default_bigquery_base_url")]
    pub bigquery_base_url: String,

    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempts per store call, including the first one
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    // Provisioning
    #[serde(default = "default_visibility_poll_attempts")]
    pub visibility_poll_attempts: u32,

    #[serde(default = "default_visibility_poll_interval_ms")]
    pub visibility_poll_interval_ms: u64,

    /// Remember provisioned (project, day) pairs for the life of the process
    #[serde(default)]
    pub provision_cache: bool,

    // Worker
    #[serde(default = "default_worker_name")]
    pub worker_name: String,

    /// Only ingest messages for this project
    #[serde(default)]
    pub project_filter: Option<String>,
}

fn default_bigquery_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_visibility_poll_attempts() -> u32 {
    15
}

fn default_visibility_poll_interval_ms() -> u64 {
    5
}

fn default_worker_name() -> String {
    "hooksink-ingest".to_string()
}

impl Default for HooksinkConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            bigquery_base_url: default_bigquery_base_url(),
            connect_timeout_ms: default_timeout_ms(),
            request_timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            visibility_poll_attempts: default_visibility_poll_attempts(),
            visibility_poll_interval_ms: default_visibility_poll_interval_ms(),
            provision_cache: false,
            worker_name: default_worker_name(),
            project_filter: None,
        }
    }
}

impl HooksinkConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("HOOKSINK"))
            .build()?
            .try_deserialize::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid("retry_attempts must be at least 1".to_string()));
        }
        if !(self.bigquery_base_url.starts_with("https://")
            || self.bigquery_base_url.starts_with("http://"))
        {
            return Err(ConfigError::Invalid(format!(
                "bigquery_base_url '{}' is not an http(s) url",
                self.bigquery_base_url
            )));
        }
        Ok(())
    }

    pub fn bigquery_options(&self) -> BigQueryOptions {
        BigQueryOptions {
            base_url: self.bigquery_base_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_attempts: self.retry_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn visibility_poll(&self) -> VisibilityPoll {
        VisibilityPoll {
            attempts: self.visibility_poll_attempts,
            interval: Duration::from_millis(self.visibility_poll_interval_ms),
        }
    }

    pub fn provisioner(&self) -> SchemaProvisioner {
        let provisioner = SchemaProvisioner::new(self.visibility_poll());
        if self.provision_cache {
            provisioner.with_cache()
        } else {
            provisioner
        }
    }

    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        let config = WorkerConfig::default().with_name(self.worker_name.clone());
        match self.project_filter.as_deref().map(str::trim) {
            None | Some("") => Ok(config),
            Some(raw) => ProjectId::parse(raw)
                .map(|p| config.with_project(p))
                .map_err(|e| ConfigError::Invalid(format!("project_filter: {e}"))),
        }
    }
}
