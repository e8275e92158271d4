//! # clone-kernel
//!
//! Policy-driven deep cloning of object graphs.
//!
//! The Clone Kernel answers one question:
//!
//! > Given a root object, which reachable objects are **copied**, and which
//! > are **shared** with the original?
//!
//! ## Core Contract
//!
//! 1. Every object reachable from the root is cloned at most once per pass,
//!    so shared references stay shared and cycles terminate
//! 2. Exempt objects (immutable text, behavioral objects, OS resources,
//!    restricted vendor types) are aliased, never copied
//! 3. Override hooks replace generic cloning for specially-handled types;
//!    a failing hook degrades to generic cloning
//! 4. Designated back-reference fields come out as fresh empty containers
//!
//! ## Architecture
//!
//! ```text
//! root → CloneEngine ─┬→ HookDispatcher (OverrideHook…)
//!                     ├→ PolicyRegistry (types, capabilities, field rules)
//!                     └→ FieldClassifier per field
//!                               ↓
//!                     ObjectHeap (TypeRegistry) ← clones appended
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same heap + same engine + same root → identical [`GraphShape`]
//! - Fields are visited most-derived type first, in declaration order
//! - Hooks are consulted in registration order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod heap;
pub mod policy;
pub mod engine;
pub mod config;
pub mod canonical;

// Re-exports
pub use types::{
    builtin, Accessibility, Capability, CollectionKind, FieldDef, FieldDescriptor, FieldId,
    FieldKind, Layout, ObjectId, TypeDef, TypeDescriptor, TypeKey, TypeKind, TypeRegistry,
    TypeRegistryBuilder, TypeRegistryError, Value,
};
pub use heap::{HeapError, Object, ObjectHeap, Payload};
pub use policy::{
    FieldValueContext, PolicyError, PolicyRegistry, PolicySummary, ResetField, ValueRule,
};
pub use engine::{
    CloneContext, CloneEngine, CloneEngineBuilder, CloneError, CloneHook, CloneMap, CloneStats,
    ClonedGraph, EngineOptions, FieldClassifier, FieldDecision, HandleResult, HookDispatcher,
    HookError, OverrideHook, ResetFieldsHook, TypeMatcher,
};
pub use config::{CloneConfig, ConfigError, ResetHookConfig};
pub use canonical::{
    canonical_hash, canonical_hash_hex, shape_fingerprint, shape_of, to_canonical_bytes,
    GraphShape, ShapeNode, ShapePayload, ShapeValue,
};

/// Schema version of serialized configuration, shapes and statistics.
/// Increment on breaking changes to any of them.
pub const CLONE_KERNEL_SCHEMA_VERSION: &str = "1.0.0";
