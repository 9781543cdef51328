//! Entity type metadata.
//!
//! An [`EntityType`] describes everything the tracking layer needs to know
//! about a class of entities: which members form the identity key, how each
//! member is stored and merged, how the type relates to others, and which
//! custom update methods it exposes.

use serde::{Deserialize, Serialize};

/// Storage shape of a member value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// A plain JSON value.
    Scalar,
    /// A nested object merged field by field.
    Complex,
    /// A list of nested objects replaced element-wise.
    ComplexList,
}

impl MemberKind {
    /// Short name used in error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Complex => "complex",
            Self::ComplexList => "complex list",
        }
    }
}

/// Metadata for a single data member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberMetadata {
    pub name: String,
    pub kind: MemberKind,
    /// Whether server values may overwrite this member during a merge.
    #[serde(default = "default_true")]
    pub mergeable: bool,
    /// Whether the original value is sent back with updates.
    #[serde(default = "default_true")]
    pub round_trip_original: bool,
}

fn default_true() -> bool {
    true
}

impl MemberMetadata {
    fn with_kind(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mergeable: true,
            round_trip_original: true,
        }
    }

    #[must_use]
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::with_kind(name, MemberKind::Scalar)
    }

    #[must_use]
    pub fn complex(name: impl Into<String>) -> Self {
        Self::with_kind(name, MemberKind::Complex)
    }

    #[must_use]
    pub fn complex_list(name: impl Into<String>) -> Self {
        Self::with_kind(name, MemberKind::ComplexList)
    }

    /// Excludes the member from server merges.
    #[must_use]
    pub fn not_mergeable(mut self) -> Self {
        self.mergeable = false;
        self
    }

    /// Stops the original value from being round-tripped on update.
    #[must_use]
    pub fn without_original(mut self) -> Self {
        self.round_trip_original = false;
        self
    }
}

/// Whether an association resolves to one entity or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    One,
    Many,
}

/// A relationship from one entity type to another.
///
/// The association matches when every `this_key` member of the source equals
/// the corresponding `other_key` member of the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationMetadata {
    pub name: String,
    pub target_type: String,
    pub this_key: Vec<String>,
    pub other_key: Vec<String>,
    /// True when the source side holds the foreign key.
    #[serde(default)]
    pub is_foreign_key: bool,
    /// True when the target's lifecycle is owned by the source.
    #[serde(default)]
    pub is_composition: bool,
    pub multiplicity: Multiplicity,
}

impl AssociationMetadata {
    fn new(
        name: impl Into<String>,
        target_type: impl Into<String>,
        this_key: &[&str],
        other_key: &[&str],
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            this_key: this_key.iter().map(|s| (*s).to_string()).collect(),
            other_key: other_key.iter().map(|s| (*s).to_string()).collect(),
            is_foreign_key: false,
            is_composition: false,
            multiplicity,
        }
    }

    /// A to-one association.
    #[must_use]
    pub fn reference(
        name: impl Into<String>,
        target_type: impl Into<String>,
        this_key: &[&str],
        other_key: &[&str],
    ) -> Self {
        Self::new(name, target_type, this_key, other_key, Multiplicity::One)
    }

    /// A to-many association.
    #[must_use]
    pub fn collection(
        name: impl Into<String>,
        target_type: impl Into<String>,
        this_key: &[&str],
        other_key: &[&str],
    ) -> Self {
        Self::new(name, target_type, this_key, other_key, Multiplicity::Many)
    }

    #[must_use]
    pub fn foreign_key(mut self) -> Self {
        self.is_foreign_key = true;
        self
    }

    #[must_use]
    pub fn composition(mut self) -> Self {
        self.is_composition = true;
        self
    }
}

/// Declared type of a custom method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Bool,
    Integer,
    Number,
    Text,
    Object,
    Array,
    Any,
}

impl ParameterType {
    /// Returns true if `value` is acceptable for this parameter. Null is
    /// accepted for every type.
    #[must_use]
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value as J;
        match (self, value) {
            (_, J::Null) | (Self::Any, _) => true,
            (Self::Bool, J::Bool(_)) => true,
            (Self::Integer, J::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Number, J::Number(_)) => true,
            (Self::Text, J::String(_)) => true,
            (Self::Object, J::Object(_)) => true,
            (Self::Array, J::Array(_)) => true,
            _ => false,
        }
    }
}

/// A custom update method that may be recorded against an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMethod {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterType>,
}

impl CustomMethod {
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: Vec<ParameterType>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Checks arity and parameter types.
    #[must_use]
    pub fn matches(&self, arguments: &[serde_json::Value]) -> bool {
        self.parameters.len() == arguments.len()
            && self
                .parameters
                .iter()
                .zip(arguments)
                .all(|(ty, value)| ty.accepts(value))
    }
}

/// Metadata describing one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    /// Ordered key member names.
    pub key_members: Vec<String>,
    pub members: Vec<MemberMetadata>,
    #[serde(default)]
    pub associations: Vec<AssociationMetadata>,
    #[serde(default)]
    pub custom_methods: Vec<CustomMethod>,
}

impl EntityType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_members: Vec::new(),
            members: Vec::new(),
            associations: Vec::new(),
            custom_methods: Vec::new(),
        }
    }

    /// Declares the key members. Each is added as a scalar member if not
    /// already declared.
    #[must_use]
    pub fn with_key(mut self, members: &[&str]) -> Self {
        for name in members {
            if self.member(name).is_none() {
                self.members.push(MemberMetadata::scalar(*name));
            }
        }
        self.key_members = members.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_member(mut self, member: MemberMetadata) -> Self {
        self.members.retain(|m| m.name != member.name);
        self.members.push(member);
        self
    }

    /// Shorthand for adding several scalar members.
    #[must_use]
    pub fn with_scalars(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.with_member(MemberMetadata::scalar(*name));
        }
        self
    }

    #[must_use]
    pub fn with_association(mut self, association: AssociationMetadata) -> Self {
        self.associations.push(association);
        self
    }

    #[must_use]
    pub fn with_custom_method(mut self, method: CustomMethod) -> Self {
        self.custom_methods.push(method);
        self
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberMetadata> {
        self.members.iter().find(|m| m.name == name)
    }

    #[must_use]
    pub fn is_key_member(&self, name: &str) -> bool {
        self.key_members.iter().any(|k| k == name)
    }

    #[must_use]
    pub fn association(&self, name: &str) -> Option<&AssociationMetadata> {
        self.associations.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn custom_method(&self, name: &str) -> Option<&CustomMethod> {
        self.custom_methods.iter().find(|m| m.name == name)
    }

    /// Returns true if `member` takes part in any association predicate
    /// declared on this type.
    #[must_use]
    pub fn is_association_member(&self, member: &str) -> bool {
        self.associations
            .iter()
            .any(|a| a.this_key.iter().any(|k| k == member))
    }
}
