//! Partial room updates.
//!
//! A [`RoomPatch`] is a JSON merge patch over the room document: a key with
//! a value sets that field, a key with `null` clears it back to absent.
//! Patches are always computed as the difference between two rooms, so the
//! bytes that reach the store are exactly what the state machine changed.

use serde_json::{Map, Value};

use super::room::Room;

/// Document key of the immutable room identity.
const ID_FIELD: &str = "id";

/// Merge patch against a room document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomPatch {
    fields: Map<String, Value>,
}

impl RoomPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields that differ from `before` to `after`. Identity is never patched.
    pub fn diff(before: &Room, after: &Room) -> Result<Self, serde_json::Error> {
        let before = to_object(before)?;
        let after = to_object(after)?;
        let mut fields = Map::new();

        for (key, value) in &after {
            if key != ID_FIELD && before.get(key) != Some(value) {
                fields.insert(key.clone(), value.clone());
            }
        }
        for key in before.keys() {
            if !after.contains_key(key) {
                fields.insert(key.clone(), Value::Null);
            }
        }

        Ok(Self { fields })
    }

    /// Merge this patch into `room`, returning the patched copy.
    pub fn apply(&self, room: &Room) -> Result<Room, serde_json::Error> {
        let mut document = to_object(room)?;
        for (key, value) in &self.fields {
            if key == ID_FIELD {
                continue;
            }
            if value.is_null() {
                document.remove(key);
            } else {
                document.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(document))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the patch writes or clears `field`.
    pub fn touches(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Value written for `field`; `Some(Value::Null)` means cleared.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Patched field names.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Serialize a room into its document object.
pub(crate) fn to_object(room: &Room) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(room)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
