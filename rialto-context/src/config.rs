//! Domain context configuration.

use rialto_types::LoadBehavior;
use serde::Deserialize;

/// Configuration for a [`DomainContext`](crate::DomainContext).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Endpoint handed to the client factory.
    pub service_uri: String,
    /// Reject endpoints that are not secure.
    pub requires_secure_endpoint: bool,
    /// Behaviour used by loads that do not name one.
    pub load_behavior: LoadBehavior,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            service_uri: "https://localhost/DomainService".to_string(),
            requires_secure_endpoint: false,
            load_behavior: LoadBehavior::KeepCurrent,
        }
    }
}

impl ContextConfig {
    #[must_use]
    pub fn with_service_uri(mut self, service_uri: impl Into<String>) -> Self {
        self.service_uri = service_uri.into();
        self
    }

    #[must_use]
    pub fn with_secure_endpoint(mut self, required: bool) -> Self {
        self.requires_secure_endpoint = required;
        self
    }

    #[must_use]
    pub fn with_load_behavior(mut self, behavior: LoadBehavior) -> Self {
        self.load_behavior = behavior;
        self
    }
}
