//! Client runtime configuration.
//!
//! Values here are public (base URLs, paths, schema, policies). The session
//! credential is not part of it; it lives in the transport cookie jar.

use crate::channel::SnapshotSchema;
use crate::identity::PolicyRegistry;
use std::time::Duration;

/// Default request timeout applied to every resource-service call.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Default login entry point used by the unauthorized-response handler.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    api_base_url: String,
    login_path: String,
    timeout: Duration,
    schema: SnapshotSchema,
    policies: PolicyRegistry,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            schema: SnapshotSchema::default(),
            policies: PolicyRegistry::default(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_base_url(mut self, base_url: &str) -> Self {
        if let Some(value) = normalize_value(base_url) {
            self.api_base_url = value;
        }
        self
    }

    /// Blank paths keep the current login path.
    #[must_use]
    pub fn with_login_path(mut self, login_path: &str) -> Self {
        if let Some(value) = normalize_value(login_path) {
            self.login_path = value;
        }
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: SnapshotSchema) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub fn with_policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = policies;
        self
    }

    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn schema(&self) -> &SnapshotSchema {
        &self.schema
    }

    #[must_use]
    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// Join `path` onto the configured API base URL.
    #[must_use]
    pub fn build_url(&self, path: &str) -> String {
        build_url_with_base(&self.api_base_url, path)
    }
}

pub(crate) fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

fn normalize_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
