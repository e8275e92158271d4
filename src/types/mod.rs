//! Core types for the clone kernel: identities, values, and type tables.

pub mod value;
pub mod descriptor;
pub mod registry;

pub use value::{ObjectId, Value};
pub use descriptor::{
    Accessibility, Capability, CollectionKind, FieldDescriptor, FieldId, FieldKind, Layout,
    TypeDescriptor, TypeKey, TypeKind,
};
pub use registry::{builtin, FieldDef, TypeDef, TypeRegistry, TypeRegistryBuilder, TypeRegistryError};
