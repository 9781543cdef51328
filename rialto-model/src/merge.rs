//! Apply-state merge engine.
//!
//! Applies server state to member values under a [`LoadBehavior`]. Decisions
//! are made before anything is built: a nested object is only constructed
//! once the merge has established that the member will be overwritten.
//!
//! Callers must reject cyclic object graphs before merging; nested objects
//! are write-locked while their fields are merged.

use rialto_types::LoadBehavior;
use serde_json::Value as J;

use crate::error::{ModelError, ModelResult};
use crate::metadata::MemberKind;
use crate::snapshot::value_state;
use crate::value::{ComplexObject, ComplexRef, StateMap, Value};

pub(crate) struct Merger {
    behavior: LoadBehavior,
}

impl Merger {
    pub(crate) fn new(behavior: LoadBehavior) -> Self {
        Self { behavior }
    }

    /// Merges `incoming` into `current`. Returns true if the value changed.
    pub(crate) fn member(
        &self,
        name: &str,
        kind: MemberKind,
        current: &mut Value,
        incoming: &J,
        original: Option<&J>,
    ) -> ModelResult<bool> {
        let overwrite = match self.behavior {
            LoadBehavior::KeepCurrent => return Ok(false),
            LoadBehavior::RefreshCurrent => true,
            LoadBehavior::MergeIntoCurrent => !client_changed(current, original)?,
        };

        match (kind, &*current, incoming) {
            // Existing nested objects merge field by field at every depth.
            (MemberKind::Complex, Value::Complex(object), J::Object(fields)) => {
                let object = object.clone();
                self.complex(&object, fields, original.and_then(J::as_object))
            }
            (MemberKind::ComplexList, _, _) if overwrite => replace_list(name, current, incoming),
            _ if overwrite => {
                if value_state(current)? == *incoming {
                    return Ok(false);
                }
                *current = Value::from_state(name, kind, incoming)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn complex(
        &self,
        object: &ComplexRef,
        incoming: &StateMap,
        original: Option<&StateMap>,
    ) -> ModelResult<bool> {
        let mut changed = false;
        let mut guard = object.write();
        for (field, value) in incoming {
            let current = guard
                .members_mut()
                .entry(field.clone())
                .or_insert_with(Value::null);
            let kind = nested_kind(current, value);
            let nested_original = original.and_then(|o| o.get(field));
            changed |= self.member(field, kind, current, value, nested_original)?;
        }
        Ok(changed)
    }
}

/// True when the current value differs from the recorded original. Members
/// without an original count as unchanged.
fn client_changed(current: &Value, original: Option<&J>) -> ModelResult<bool> {
    match original {
        Some(original) => Ok(value_state(current)? != *original),
        None => Ok(false),
    }
}

fn nested_kind(current: &Value, incoming: &J) -> MemberKind {
    match current {
        Value::Complex(_) => MemberKind::Complex,
        Value::ComplexList(_) => MemberKind::ComplexList,
        Value::Scalar(_) => match incoming {
            J::Object(_) => MemberKind::Complex,
            J::Array(items) if !items.is_empty() && items.iter().all(J::is_object) => {
                MemberKind::ComplexList
            }
            _ => MemberKind::Scalar,
        },
    }
}

/// Replaces a complex list element by element, reusing existing objects so
/// outstanding references observe the new state.
fn replace_list(name: &str, current: &mut Value, incoming: &J) -> ModelResult<bool> {
    let items: &[J] = match incoming {
        J::Array(items) => items,
        J::Null => &[],
        _ => {
            return Err(ModelError::KindMismatch {
                member: name.to_string(),
                expected: "complex list",
            });
        }
    };
    let before = value_state(current)?;
    if before == J::Array(items.to_vec()) {
        return Ok(false);
    }

    let existing = current.as_list().map(<[ComplexRef]>::to_vec).unwrap_or_default();
    let mut next = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let J::Object(fields) = item else {
            return Err(ModelError::KindMismatch {
                member: name.to_string(),
                expected: "complex list",
            });
        };
        let object = ComplexObject::from_state(fields);
        match existing.get(index) {
            Some(element) => {
                *element.write() = object;
                next.push(element.clone());
            }
            None => next.push(ComplexRef::new(object)),
        }
    }
    *current = Value::ComplexList(next);
    Ok(true)
}
