//! Query and invoke request descriptions.

use rialto_model::StateMap;
use serde::{Deserialize, Serialize};

/// A named server query returning entities of one root type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityQuery {
    pub query_name: String,
    /// Type token of the entities the query returns.
    pub entity_type: String,
    #[serde(default)]
    pub parameters: StateMap,
    /// Ask the server to report the total count before paging.
    #[serde(default)]
    pub include_total_count: bool,
    #[serde(default)]
    pub skip: Option<u32>,
    #[serde(default)]
    pub take: Option<u32>,
}

impl EntityQuery {
    #[must_use]
    pub fn new(query_name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            entity_type: entity_type.into(),
            parameters: StateMap::new(),
            include_total_count: false,
            skip: None,
            take: None,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_total_count(mut self) -> Self {
        self.include_total_count = true;
        self
    }

    #[must_use]
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn with_take(mut self, take: u32) -> Self {
        self.take = Some(take);
        self
    }
}

/// Arguments of a service operation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeArgs {
    pub operation_name: String,
    /// Name of the expected return type, informational only.
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub parameters: StateMap,
    #[serde(default)]
    pub has_side_effects: bool,
}

impl InvokeArgs {
    #[must_use]
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            return_type: None,
            parameters: StateMap::new(),
            has_side_effects: false,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    #[must_use]
    pub fn with_side_effects(mut self) -> Self {
        self.has_side_effects = true;
        self
    }

    /// Parameter values ordered by name, for method validation.
    #[must_use]
    pub fn parameter_values(&self) -> Vec<serde_json::Value> {
        self.parameters.values().cloned().collect()
    }
}
