//! Validation results and the pluggable validation hook.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::entity::Entity;
use crate::metadata::EntityType;

/// A single validation failure, optionally tied to members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationResult {
    pub message: String,
    #[serde(default)]
    pub member_names: Vec<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn new(message: impl Into<String>, member_names: &[&str]) -> Self {
        Self {
            message: message.into(),
            member_names: member_names.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.member_names.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} ({})", self.message, self.member_names.join(", "))
        }
    }
}

/// Client-side validation run before a submit or invoke leaves the process.
///
/// Both methods default to accepting everything; implement only what you
/// need. Returning an empty list means the target is valid.
pub trait EntityValidator: Send + Sync {
    /// Object-level validation of an added or modified entity.
    fn validate_entity(&self, entity: &Entity) -> Vec<ValidationResult> {
        let _ = entity;
        Vec::new()
    }

    /// Validation of a method call. `entity_type` is set for custom update
    /// methods recorded on an entity and `None` for service operations.
    fn validate_method(
        &self,
        entity_type: Option<&EntityType>,
        method: &str,
        parameters: &[serde_json::Value],
    ) -> Vec<ValidationResult> {
        let _ = (entity_type, method, parameters);
        Vec::new()
    }
}

/// Accepts every entity and method call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveValidator;

impl EntityValidator for PermissiveValidator {}

/// Rejects entities whose required members are null or empty strings.
#[derive(Debug, Clone, Default)]
pub struct RequiredMembersValidator {
    required: HashMap<String, Vec<String>>,
}

impl RequiredMembersValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `member` of `entity_type` as required.
    #[must_use]
    pub fn require(mut self, entity_type: &str, member: &str) -> Self {
        self.required
            .entry(entity_type.to_string())
            .or_default()
            .push(member.to_string());
        self
    }
}

impl EntityValidator for RequiredMembersValidator {
    fn validate_entity(&self, entity: &Entity) -> Vec<ValidationResult> {
        let Some(members) = self.required.get(entity.type_name()) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|member| {
                entity.get(member).is_none_or(|value| {
                    value.is_null() || value.as_scalar().and_then(|v| v.as_str()) == Some("")
                })
            })
            .map(|member| ValidationResult::new(format!("{member} is required"), &[member.as_str()]))
            .collect()
    }
}
