//! Orchestrator configuration
//!
//! Everything the orchestrator needs from its surroundings is passed in
//! through [`OrchestratorConfig`], usually loaded from a YAML file and then
//! overridden from the command line:
//!
//! ```yaml
//! image_name: registry.local/shop
//! image_tag: "1.4.2"
//! target_url: https://staging.shop.local
//! compliance_mode: weak
//! default_timeout: 900000
//!
//! webhook:
//!   url: https://hooks.slack.com/services/T000/B000/XXXX
//!   timeout: 10000
//!   retry:
//!     max_attempts: 3
//!     initial_delay: 500
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How the compliance artifact is inspected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceMode {
    /// Literal substring search for the marker text
    #[default]
    Weak,
    /// Require a complete element named after the marker, outside comments
    Strict,
}

/// Retry policy for webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay in milliseconds, doubled on each attempt
    #[serde(default = "default_initial_delay")]
    pub initial_delay: u64,

    /// Upper bound on the delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    10_000
}

impl Default for WebhookRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
        }
    }
}

/// Webhook notification target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout: u64,

    /// No retry unless configured
    #[serde(default)]
    pub retry: Option<WebhookRetryConfig>,
}

fn default_webhook_timeout() -> u64 {
    10_000
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: default_webhook_timeout(),
            retry: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Container image name, exposed as `${{ config.image_name }}`
    #[serde(default)]
    pub image_name: Option<String>,

    /// Container image tag, exposed as `${{ config.image_tag }}`
    #[serde(default)]
    pub image_tag: Option<String>,

    /// Target for dynamic scanning, exposed as `${{ config.target_url }}`
    #[serde(default)]
    pub target_url: Option<String>,

    #[serde(default)]
    pub webhook: Option<WebhookConfig>,

    #[serde(default)]
    pub compliance_mode: ComplianceMode,

    /// Timeout in milliseconds for stages that don't set their own
    #[serde(default)]
    pub default_timeout: Option<u64>,

    /// Max bytes of stdout/stderr kept per stage result
    #[serde(default = "default_excerpt_limit")]
    pub output_excerpt_limit: usize,

    /// Copy the process environment into the template context
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,
}

fn default_excerpt_limit() -> usize {
    4096
}

fn default_inherit_env() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            image_name: None,
            image_tag: None,
            target_url: None,
            webhook: None,
            compliance_mode: ComplianceMode::default(),
            default_timeout: None,
            output_excerpt_limit: default_excerpt_limit(),
            inherit_env: default_inherit_env(),
        }
    }
}

impl OrchestratorConfig {
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml {
            file: path.display().to_string(),
            error: e,
        })
    }

    /// `name:tag`, or just the name when no tag is set
    pub fn image_ref(&self) -> Option<String> {
        let name = self.image_name.as_ref()?;
        Some(match &self.image_tag {
            Some(tag) => format!("{}:{}", name, tag),
            None => name.clone(),
        })
    }

    /// Effective timeout for a stage
    pub fn stage_timeout(&self, stage_timeout: Option<u64>) -> Option<u64> {
        stage_timeout.or(self.default_timeout)
    }
}
