//! Member values.
//!
//! Scalars are plain JSON. Nested objects are shared through [`ComplexRef`]
//! so one object can be reachable from several places, which also means an
//! object graph may loop back on itself; state extraction detects that.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::metadata::MemberKind;

/// Serialized member values keyed by member name.
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// The value of an entity or complex-object member.
#[derive(Clone)]
pub enum Value {
    Scalar(serde_json::Value),
    Complex(ComplexRef),
    ComplexList(Vec<ComplexRef>),
}

impl Value {
    /// The null scalar.
    #[must_use]
    pub fn null() -> Self {
        Self::Scalar(serde_json::Value::Null)
    }

    /// Default value for a member of the given kind.
    #[must_use]
    pub fn empty(kind: MemberKind) -> Self {
        match kind {
            MemberKind::Scalar | MemberKind::Complex => Self::null(),
            MemberKind::ComplexList => Self::ComplexList(Vec::new()),
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_complex(&self) -> Option<&ComplexRef> {
        match self {
            Self::Complex(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[ComplexRef]> {
        match self {
            Self::ComplexList(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(serde_json::Value::Null))
    }

    /// Builds a value of `kind` from its serialized state.
    pub fn from_state(member: &str, kind: MemberKind, state: &serde_json::Value) -> ModelResult<Self> {
        use serde_json::Value as J;
        match (kind, state) {
            (MemberKind::Scalar, v) => Ok(Self::Scalar(v.clone())),
            (MemberKind::Complex, J::Null) => Ok(Self::null()),
            (MemberKind::Complex, J::Object(map)) => {
                Ok(Self::Complex(ComplexRef::new(ComplexObject::from_state(map))))
            }
            (MemberKind::ComplexList, J::Null) => Ok(Self::ComplexList(Vec::new())),
            (MemberKind::ComplexList, J::Array(items)) => items
                .iter()
                .map(|item| match item {
                    J::Object(map) => Ok(ComplexRef::new(ComplexObject::from_state(map))),
                    _ => Err(ModelError::KindMismatch {
                        member: member.to_string(),
                        expected: "complex list",
                    }),
                })
                .collect::<ModelResult<Vec<_>>>()
                .map(Self::ComplexList),
            (kind, _) => Err(ModelError::KindMismatch {
                member: member.to_string(),
                expected: kind.as_str(),
            }),
        }
    }

    /// Returns true if the value's shape fits `kind`. Null fits complex members.
    #[must_use]
    pub fn fits(&self, kind: MemberKind) -> bool {
        match (self, kind) {
            (Self::Scalar(serde_json::Value::Null), MemberKind::Complex) => true,
            (Self::Scalar(_), MemberKind::Scalar) => true,
            (Self::Complex(_), MemberKind::Complex) => true,
            (Self::ComplexList(_), MemberKind::ComplexList) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    // Complex values print by address; following them could recurse forever.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Complex(c) => write!(f, "{c:?}"),
            Self::ComplexList(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Scalar(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Scalar(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Scalar(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Scalar(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Scalar(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Scalar(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Scalar(v.into())
    }
}

impl From<ComplexRef> for Value {
    fn from(v: ComplexRef) -> Self {
        Self::Complex(v)
    }
}

impl From<ComplexObject> for Value {
    fn from(v: ComplexObject) -> Self {
        Self::Complex(ComplexRef::new(v))
    }
}

/// A nested object: named member values without identity of its own.
#[derive(Debug, Clone, Default)]
pub struct ComplexObject {
    members: BTreeMap<String, Value>,
}

impl ComplexObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style member assignment.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    /// Infers member shapes from a state map: objects become nested objects,
    /// non-empty arrays of objects become complex lists, anything else is a
    /// scalar.
    #[must_use]
    pub fn from_state(state: &StateMap) -> Self {
        let members = state
            .iter()
            .map(|(name, v)| (name.clone(), infer_value(v)))
            .collect();
        Self { members }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.members.insert(name.into(), value.into());
    }

    pub fn members(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.members.iter()
    }

    pub(crate) fn members_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.members
    }
}

pub(crate) fn infer_value(state: &serde_json::Value) -> Value {
    match state {
        serde_json::Value::Object(map) => Value::Complex(ComplexRef::new(ComplexObject::from_state(map))),
        serde_json::Value::Array(items)
            if !items.is_empty() && items.iter().all(serde_json::Value::is_object) =>
        {
            Value::ComplexList(
                items
                    .iter()
                    .filter_map(serde_json::Value::as_object)
                    .map(|map| ComplexRef::new(ComplexObject::from_state(map)))
                    .collect(),
            )
        }
        other => Value::Scalar(other.clone()),
    }
}

/// Shared handle to a [`ComplexObject`].
#[derive(Clone)]
pub struct ComplexRef(Arc<RwLock<ComplexObject>>);

impl ComplexRef {
    #[must_use]
    pub fn new(object: ComplexObject) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ComplexObject> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ComplexObject> {
        self.0.write()
    }

    /// Identity of the underlying object.
    #[must_use]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &ComplexRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComplexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComplexRef({:#x})", self.id())
    }
}
