//! Type registry: the field-descriptor tables for every known type.
//!
//! The registry is assembled once with a [`TypeRegistryBuilder`] and is
//! immutable afterwards. Heaps and clone engines share it behind an `Arc`.
//!
//! ## Hierarchy
//!
//! Types form a single-inheritance tree rooted at [`builtin::OBJECT`].
//! Field walks start at the most-derived type and stop before the root,
//! which declares no fields.

use std::collections::{BTreeSet, HashMap};

use super::descriptor::{
    Accessibility, Capability, CollectionKind, FieldDescriptor, FieldId, FieldKind, Layout,
    TypeDescriptor, TypeKey, TypeKind,
};

/// Names of the built-in types every registry starts with.
pub mod builtin {
    /// The universal root type.
    pub const OBJECT: &str = "core.Object";
    /// Immutable text.
    pub const STRING: &str = "core.String";
    /// Ordered list.
    pub const LIST: &str = "core.List";
    /// Set.
    pub const SET: &str = "core.Set";
    /// Set with weak membership.
    pub const WEAK_SET: &str = "core.WeakSet";
    /// Key/value map.
    pub const MAP: &str = "core.Map";
}

/// Error type for type registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeRegistryError {
    /// A type with this name is already registered.
    #[error("Type already registered: {0}")]
    DuplicateType(String),
    /// The named parent type is not registered.
    #[error("Unknown parent type `{parent}` for `{type_name}`")]
    UnknownParent {
        /// Type being registered.
        type_name: String,
        /// Missing parent.
        parent: String,
    },
    /// A field name is declared twice on the same type.
    #[error("Duplicate field `{field}` on `{type_name}`")]
    DuplicateField {
        /// Declaring type.
        type_name: String,
        /// Field name.
        field: String,
    },
}

/// Definition of a field, used when registering a type.
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    kind: FieldKind,
    is_static: bool,
    access: Accessibility,
}

impl FieldDef {
    /// Define a field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_static: false,
            access: Accessibility::Public,
        }
    }

    /// Reference field.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Reference)
    }

    /// Integer field.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    /// Boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    /// Float field.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    /// Mark the field static.
    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Set reflective accessibility.
    pub fn access(mut self, access: Accessibility) -> Self {
        self.access = access;
        self
    }
}

/// Definition of a type, used when registering it.
#[derive(Debug, Clone)]
pub struct TypeDef {
    name: String,
    parent: Option<String>,
    kind: TypeKind,
    capabilities: BTreeSet<Capability>,
    synthetic: bool,
    anonymous: bool,
    layout: Option<Layout>,
    fields: Vec<FieldDef>,
}

impl TypeDef {
    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            parent: None,
            kind,
            capabilities: BTreeSet::new(),
            synthetic: false,
            anonymous: false,
            layout: None,
            fields: Vec::new(),
        }
    }

    /// Concrete type.
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    /// Abstract type.
    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Abstract)
    }

    /// Interface type.
    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    /// Concrete type that cannot be blank-instantiated.
    pub fn factory_only(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::FactoryOnly)
    }

    /// Set the parent type (defaults to the root type).
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a capability.
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Mark as compiler-generated.
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    /// Mark as anonymous.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Override the layout inherited from the parent.
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Declare a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// Builder for a [`TypeRegistry`].
///
/// Starts with the built-in types already registered.
#[derive(Debug, Clone)]
pub struct TypeRegistryBuilder {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeKey>,
}

impl TypeRegistryBuilder {
    /// Create a builder holding only the built-in types.
    pub fn new() -> Self {
        let mut builder = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
        };
        builder.insert_root();

        let builtins = [
            TypeDef::class(builtin::STRING).layout(Layout::Text),
            TypeDef::class(builtin::LIST).layout(Layout::Collection(CollectionKind::List)),
            TypeDef::class(builtin::SET).layout(Layout::Collection(CollectionKind::Set)),
            TypeDef::class(builtin::WEAK_SET).layout(Layout::Collection(CollectionKind::WeakSet)),
            TypeDef::class(builtin::MAP).layout(Layout::Collection(CollectionKind::Map)),
        ];
        for def in builtins {
            let registered = builder.register(def);
            debug_assert!(registered.is_ok(), "built-in rejected: {:?}", registered);
        }
        builder
    }

    fn insert_root(&mut self) {
        let key = TypeKey::new(0);
        self.types.push(TypeDescriptor {
            key,
            name: builtin::OBJECT.to_string(),
            parent: None,
            kind: TypeKind::Class,
            capabilities: BTreeSet::new(),
            synthetic: false,
            anonymous: false,
            layout: Layout::Record,
            fields: Vec::new(),
        });
        self.by_name.insert(builtin::OBJECT.to_string(), key);
    }

    /// Register a type and return its key.
    pub fn register(&mut self, def: TypeDef) -> Result<TypeKey, TypeRegistryError> {
        if self.by_name.contains_key(&def.name) {
            return Err(TypeRegistryError::DuplicateType(def.name));
        }

        let parent_name = def.parent.as_deref().unwrap_or(builtin::OBJECT);
        let parent = *self
            .by_name
            .get(parent_name)
            .ok_or_else(|| TypeRegistryError::UnknownParent {
                type_name: def.name.clone(),
                parent: parent_name.to_string(),
            })?;

        let key = TypeKey::new(self.types.len());
        let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(def.fields.len());
        for (index, field) in def.fields.into_iter().enumerate() {
            if fields.iter().any(|f| f.name == field.name) {
                return Err(TypeRegistryError::DuplicateField {
                    type_name: def.name,
                    field: field.name,
                });
            }
            fields.push(FieldDescriptor {
                id: FieldId {
                    owner: key,
                    index: index as u16,
                },
                declaring_type: key,
                name: field.name,
                kind: field.kind,
                is_static: field.is_static,
                access: field.access,
            });
        }

        let layout = def
            .layout
            .unwrap_or_else(|| self.types[parent.index()].layout);

        self.by_name.insert(def.name.clone(), key);
        self.types.push(TypeDescriptor {
            key,
            name: def.name,
            parent: Some(parent),
            kind: def.kind,
            capabilities: def.capabilities,
            synthetic: def.synthetic,
            anonymous: def.anonymous,
            layout,
            fields,
        });
        Ok(key)
    }

    /// Finish registration.
    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            types: self.types,
            by_name: self.by_name,
        }
    }
}

impl Default for TypeRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable table of type descriptors.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeKey>,
}

impl TypeRegistry {
    /// Start building a registry.
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::new()
    }

    /// The universal root type.
    pub fn root(&self) -> TypeKey {
        TypeKey::new(0)
    }

    /// Look up a type by qualified name.
    pub fn lookup(&self, name: &str) -> Option<TypeKey> {
        self.by_name.get(name).copied()
    }

    /// Get a type descriptor.
    pub fn get(&self, key: TypeKey) -> Option<&TypeDescriptor> {
        self.types.get(key.index())
    }

    /// Qualified name of a type, or `"<unknown>"` for a foreign key.
    pub fn name(&self, key: TypeKey) -> &str {
        self.get(key).map_or("<unknown>", |t| t.name.as_str())
    }

    /// Number of registered types, including built-ins.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false: the root type is always present.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Walk from `key` up through every ancestor, root included.
    pub fn ancestors(&self, key: TypeKey) -> Ancestors<'_> {
        Ancestors {
            registry: self,
            next: Some(key),
        }
    }

    /// Every field declared on `key` or an ancestor, most-derived type first,
    /// excluding the root type. Static fields are included.
    pub fn hierarchy_fields(&self, key: TypeKey) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        let root = self.root();
        self.ancestors(key)
            .take_while(move |t| t.key != root)
            .flat_map(|t| t.fields.iter())
    }

    /// Instance (non-static) fields of `key` and its ancestors.
    pub fn instance_fields(&self, key: TypeKey) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.hierarchy_fields(key).filter(|f| !f.is_static)
    }

    /// Find a field by name, searching from the most-derived type upwards.
    pub fn field_by_name(&self, key: TypeKey, name: &str) -> Option<&FieldDescriptor> {
        self.hierarchy_fields(key).find(|f| f.name == name)
    }

    /// Get a field descriptor by id.
    pub fn field(&self, id: FieldId) -> Option<&FieldDescriptor> {
        self.get(id.owner)?.fields.get(id.index as usize)
    }

    /// Whether `key` is the named type or inherits from it.
    ///
    /// Matching is by qualified name, so callers can test against types
    /// that may not be registered at all.
    pub fn is_subtype_of(&self, key: TypeKey, name: &str) -> bool {
        self.ancestors(key).any(|t| t.name == name)
    }

    /// Capabilities of `key`, including inherited ones.
    pub fn capabilities(&self, key: TypeKey) -> BTreeSet<Capability> {
        self.ancestors(key)
            .flat_map(|t| t.capabilities.iter().copied())
            .collect()
    }

    /// Whether `key` or an ancestor declares `capability`.
    pub fn has_capability(&self, key: TypeKey, capability: Capability) -> bool {
        self.ancestors(key)
            .any(|t| t.capabilities.contains(&capability))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistryBuilder::new().build()
    }
}

/// Iterator over a type and its ancestors.
pub struct Ancestors<'a> {
    registry: &'a TypeRegistry,
    next: Option<TypeKey>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a TypeDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.registry.get(self.next?)?;
        self.next = current.parent;
        Some(current)
    }
}
