//! Canonical graph shapes for deterministic hashing.
//!
//! A [`GraphShape`] describes everything reachable from a root without
//! referring to heap identities: objects are numbered in breadth-first
//! discovery order and references point at those local indices. Two graphs
//! with the same shape are structurally identical, whichever heap slots they
//! occupy and whether their exempt members are shared or not.
//!
//! ## Determinism Guarantees
//!
//! - Discovery order follows field declaration order, then payload order
//! - Fields serialize most-derived type first, in declaration order
//! - Maps are never serialized from hash containers

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::heap::{HeapError, ObjectHeap, Payload};
use crate::types::{ObjectId, Value};

/// A value with object references replaced by local node indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ShapeValue {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Reference to node `n` of the shape.
    Node(usize),
}

/// Payload with references replaced by local node indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ShapePayload {
    /// Plain record.
    None,
    /// Text contents.
    Text(String),
    /// Elements in order.
    Elements(Vec<ShapeValue>),
    /// Entries in order.
    Entries(Vec<(ShapeValue, ShapeValue)>),
    /// Primitive contents.
    Primitives(Vec<i64>),
    /// Native handle.
    Native(u64),
}

/// One object of a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeNode {
    /// Qualified runtime type name.
    pub type_name: String,
    /// Instance fields by name, in declaration order.
    pub fields: Vec<(String, ShapeValue)>,
    /// Payload.
    pub payload: ShapePayload,
}

/// Identity-free description of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphShape {
    /// The root value.
    pub root: ShapeValue,
    /// Reachable objects in discovery order.
    pub nodes: Vec<ShapeNode>,
}

struct ShapeBuilder {
    index: BTreeMap<ObjectId, usize>,
    queue: VecDeque<ObjectId>,
}

impl ShapeBuilder {
    fn visit(&mut self, value: Value) -> ShapeValue {
        match value {
            Value::Null => ShapeValue::Null,
            Value::Bool(b) => ShapeValue::Bool(b),
            Value::Int(i) => ShapeValue::Int(i),
            Value::Float(x) => ShapeValue::Float(x),
            Value::Ref(id) => {
                let next = self.index.len();
                let n = *self.index.entry(id).or_insert_with(|| {
                    self.queue.push_back(id);
                    next
                });
                ShapeValue::Node(n)
            }
        }
    }
}

/// Describe the graph reachable from `root`.
pub fn shape_of(heap: &ObjectHeap, root: Value) -> Result<GraphShape, HeapError> {
    let mut builder = ShapeBuilder {
        index: BTreeMap::new(),
        queue: VecDeque::new(),
    };
    let root = builder.visit(root);
    let types = heap.types();
    let mut nodes = Vec::new();

    while let Some(id) = builder.queue.pop_front() {
        let object = heap.get(id)?;
        let fields = types
            .instance_fields(object.ty())
            .map(|f| {
                let value = object.slot(f.id).unwrap_or_else(|| f.kind.zero());
                (f.name.clone(), builder.visit(value))
            })
            .collect();
        let payload = match object.payload() {
            Payload::None => ShapePayload::None,
            Payload::Text(t) => ShapePayload::Text(t.to_string()),
            Payload::Elements(v) => {
                ShapePayload::Elements(v.iter().map(|e| builder.visit(*e)).collect())
            }
            Payload::Entries(v) => ShapePayload::Entries(
                v.iter()
                    .map(|(k, e)| (builder.visit(*k), builder.visit(*e)))
                    .collect(),
            ),
            Payload::Primitives(v) => ShapePayload::Primitives(v.clone()),
            Payload::Native(h) => ShapePayload::Native(*h),
        };
        nodes.push(ShapeNode {
            type_name: types.name(object.ty()).to_string(),
            fields,
            payload,
        });
    }

    Ok(GraphShape { root, nodes })
}

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Hex fingerprint of the shape reachable from `root`.
pub fn shape_fingerprint(heap: &ObjectHeap, root: Value) -> Result<String, HeapError> {
    Ok(canonical_hash_hex(&shape_of(heap, root)?))
}
