//! Per-type descriptor tables.
//!
//! Every type that can live in an [`ObjectHeap`](crate::heap::ObjectHeap) is
//! described once, at startup, by a [`TypeDescriptor`]. The clone engine
//! never introspects values at runtime; it walks these tables instead.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Index of a type in a [`TypeRegistry`](super::registry::TypeRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeKey(u32);

impl TypeKey {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Registry index of this type.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a type can be instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Concrete type.
    Class,
    /// Abstract type; has no instances of its own.
    Abstract,
    /// Interface; has no instances of its own.
    Interface,
    /// Concrete type whose instances only come from its own constructors.
    FactoryOnly,
}

impl TypeKind {
    /// Whether a blank instance of this kind can be created.
    pub fn is_instantiable(&self) -> bool {
        matches!(self, Self::Class)
    }

    /// Whether instances of this kind exist at all.
    pub fn is_concrete(&self) -> bool {
        matches!(self, Self::Class | Self::FactoryOnly)
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Abstract => write!(f, "abstract"),
            Self::Interface => write!(f, "interface"),
            Self::FactoryOnly => write!(f, "factory-only"),
        }
    }
}

/// Behavioural capability categories.
///
/// A value whose type carries one of these represents behaviour rather than
/// data (a closure, a task, a callback) and is a candidate for aliasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// One-argument function.
    Function,
    /// Runnable action with no result.
    Runnable,
    /// Zero-argument invocable with a result.
    Callable,
    /// Value supplier.
    Supplier,
    /// Value consumer.
    Consumer,
    /// Boolean predicate.
    Predicate,
}

impl Capability {
    /// Every capability category.
    pub const ALL: [Capability; 6] = [
        Self::Function,
        Self::Runnable,
        Self::Callable,
        Self::Supplier,
        Self::Consumer,
        Self::Predicate,
    ];
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Runnable => write!(f, "runnable"),
            Self::Callable => write!(f, "callable"),
            Self::Supplier => write!(f, "supplier"),
            Self::Consumer => write!(f, "consumer"),
            Self::Predicate => write!(f, "predicate"),
        }
    }
}

/// Kind of a collection payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Ordered sequence.
    List,
    /// Set of references.
    Set,
    /// Set whose membership is a weak association to its elements.
    WeakSet,
    /// Key/value entries.
    Map,
}

impl CollectionKind {
    /// Name of the built-in type with this layout.
    pub fn builtin_type(self) -> &'static str {
        match self {
            Self::List => super::builtin::LIST,
            Self::Set => super::builtin::SET,
            Self::WeakSet => super::builtin::WEAK_SET,
            Self::Map => super::builtin::MAP,
        }
    }
}

/// Storage layout of a type's instances beyond their fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Fields only.
    Record,
    /// Immutable text.
    Text,
    /// Collection of values.
    Collection(CollectionKind),
    /// Array of integer primitives.
    PrimitiveArray,
    /// Opaque native handle the engine has no field model for.
    Native,
}

/// Primitive kind of a field; determines its zero value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Boolean field, zero value `false`.
    Bool,
    /// Integer field, zero value `0`.
    Int,
    /// Float field, zero value `0.0`.
    Float,
    /// Reference field, zero value null.
    Reference,
}

impl FieldKind {
    /// Zero value of a field of this kind.
    pub fn zero(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Reference => Value::Null,
        }
    }
}

/// Reflective accessibility of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    /// Freely readable and writable.
    #[default]
    Public,
    /// Readable and writable after an access override.
    Private,
    /// Refuses reflective access entirely.
    Sealed,
}

/// Identity of a declared field: its declaring type and declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId {
    /// Type that declares the field.
    pub owner: TypeKey,
    /// Position in the declaring type's field list.
    pub index: u16,
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Stable identity of the field.
    pub id: FieldId,
    /// Declaring type.
    pub declaring_type: TypeKey,
    /// Field name, unique within its declaring type.
    pub name: String,
    /// Primitive kind.
    pub kind: FieldKind,
    /// Static fields belong to the type, not to instances.
    pub is_static: bool,
    /// Reflective accessibility.
    pub access: Accessibility,
}

/// Descriptor of a registered type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Registry key.
    pub key: TypeKey,
    /// Fully-qualified name, e.g. `store.index.SegmentReader`.
    pub name: String,
    /// Parent type; `None` only for the root type.
    pub parent: Option<TypeKey>,
    /// Instantiability.
    pub kind: TypeKind,
    /// Capabilities declared on this type (not including inherited ones).
    pub capabilities: BTreeSet<Capability>,
    /// Compiler-generated type, such as a closure class.
    pub synthetic: bool,
    /// Anonymous type declared inline.
    pub anonymous: bool,
    /// Storage layout of instances.
    pub layout: Layout,
    /// Fields declared on this type, in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Find a field declared directly on this type.
    pub fn declared_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Namespace part of the qualified name (everything before the last `.`).
    pub fn namespace(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(ns, _)| ns)
    }
}
