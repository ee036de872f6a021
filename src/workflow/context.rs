//! Execution context for a pipeline run
//!
//! Holds the values that argument templates can reference: environment,
//! secrets, configuration values, and run metadata.

use std::collections::HashMap;

use super::config::OrchestratorConfig;

/// Runtime context for template evaluation
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Environment variables
    pub env: HashMap<String, String>,

    /// Secrets (not logged)
    pub secrets: HashMap<String, String>,

    /// Configuration values (`image_name`, `image_tag`, `image`, `target_url`)
    pub config: HashMap<String, String>,

    /// Current stage name
    pub current_stage: Option<String>,

    /// Run ID
    pub run_id: String,
}

impl ExecutionContext {
    /// Create a new execution context with a generated run ID
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    /// Build a context seeded from the orchestrator configuration
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let mut ctx = Self::new();
        if config.inherit_env {
            // Non-UTF-8 variables are skipped
            ctx.env.extend(std::env::vars_os().filter_map(|(k, v)| {
                Some((k.into_string().ok()?, v.into_string().ok()?))
            }));
        }
        if let Some(name) = &config.image_name {
            ctx.set_config("image_name", name.clone());
        }
        if let Some(tag) = &config.image_tag {
            ctx.set_config("image_tag", tag.clone());
        }
        if let Some(image) = config.image_ref() {
            ctx.set_config("image", image);
        }
        if let Some(url) = &config.target_url {
            ctx.set_config("target_url", url.clone());
        }
        ctx
    }

    /// Set an environment variable
    pub fn set_env(&mut self, key: &str, value: String) {
        self.env.insert(key.to_string(), value);
    }

    /// Get an environment variable
    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }

    /// Set a secret
    pub fn set_secret(&mut self, key: &str, value: String) {
        self.secrets.insert(key.to_string(), value);
    }

    /// Get a secret
    pub fn get_secret(&self, key: &str) -> Option<&String> {
        self.secrets.get(key)
    }

    pub fn set_config(&mut self, key: &str, value: String) {
        self.config.insert(key.to_string(), value);
    }

    pub fn get_config(&self, key: &str) -> Option<&String> {
        self.config.get(key)
    }

    /// Merge environment variables from another source
    pub fn merge_env(&mut self, env: &HashMap<String, String>) {
        for (key, value) in env {
            self.env.insert(key.clone(), value.clone());
        }
    }

    /// Replace every secret value in `text` with `***`
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in self.secrets.values().filter(|s| !s.is_empty()) {
            out = out.replace(secret.as_str(), "***");
        }
        out
    }
}
