//! Object identities and field values.

use serde::{Deserialize, Serialize};

/// Identity of an object in an [`ObjectHeap`](crate::heap::ObjectHeap).
///
/// An `ObjectId` is a stable arena index. It is the object's identity:
/// two objects with equal contents still have different ids, and the
/// clone engine keys every decision on the id, never on contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Create an id from a raw arena index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Arena index of this object.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value held by a field, a collection slot, or a map entry.
///
/// Primitives are copied by value. Only [`Value::Ref`] carries identity and
/// is subject to aliasing or cloning.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absent reference.
    #[default]
    Null,
    /// Boolean primitive.
    Bool(bool),
    /// Integer primitive.
    Int(i64),
    /// Floating point primitive.
    Float(f64),
    /// Reference to a heap object.
    Ref(ObjectId),
}

impl Value {
    /// The referenced object, if this is a reference.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether this is the absent reference.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Ref(id)
    }
}

impl From<Option<ObjectId>> for Value {
    fn from(id: Option<ObjectId>) -> Self {
        id.map_or(Self::Null, Self::Ref)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}
