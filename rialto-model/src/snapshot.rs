//! State extraction.
//!
//! Converts member values into plain JSON. Nested objects are followed by
//! identity; meeting an object that is already on the current traversal path
//! is a cycle and fails with [`ModelError::CyclicReference`]. The same object
//! reached twice along different paths is fine.

use std::collections::BTreeMap;

use crate::error::{ModelError, ModelResult};
use crate::value::{ComplexRef, StateMap, Value};

/// Extracts the state of a member map.
pub fn extract_state(members: &BTreeMap<String, Value>) -> ModelResult<StateMap> {
    let mut walker = Walker::default();
    let mut state = StateMap::new();
    for (name, value) in members {
        walker.names.push(name.clone());
        state.insert(name.clone(), walker.value(value)?);
        walker.names.pop();
    }
    Ok(state)
}

/// Extracts the state of a single value.
pub fn value_state(value: &Value) -> ModelResult<serde_json::Value> {
    Walker::default().value(value)
}

#[derive(Default)]
struct Walker {
    // object ids on the current path
    path: Vec<usize>,
    // member names on the current path, for error messages
    names: Vec<String>,
}

impl Walker {
    fn value(&mut self, value: &Value) -> ModelResult<serde_json::Value> {
        match value {
            Value::Scalar(v) => Ok(v.clone()),
            Value::Complex(c) => self.complex(c),
            Value::ComplexList(items) => items
                .iter()
                .map(|item| self.complex(item))
                .collect::<ModelResult<Vec<_>>>()
                .map(serde_json::Value::Array),
        }
    }

    fn complex(&mut self, object: &ComplexRef) -> ModelResult<serde_json::Value> {
        let id = object.id();
        if self.path.contains(&id) {
            return Err(ModelError::CyclicReference {
                path: self.names.join("."),
            });
        }
        self.path.push(id);
        let guard = object.read();
        let mut state = StateMap::new();
        for (name, value) in guard.members() {
            self.names.push(name.clone());
            let extracted = self.value(value);
            self.names.pop();
            state.insert(name.clone(), extracted?);
        }
        drop(guard);
        self.path.pop();
        Ok(serde_json::Value::Object(state))
    }
}
