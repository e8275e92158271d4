//! Arena of objects.
//!
//! The heap owns every object; references between objects are
//! [`ObjectId`]s. Cloning allocates new objects in the same heap, so an
//! aliased value in a clone is literally the same id as in the original.
//!
//! Field access comes in two flavours:
//!
//! - [`ObjectHeap::field`] / [`ObjectHeap::set_field`] are constructor-level
//!   accessors used by application code that owns the type.
//! - [`ObjectHeap::read_field`] / [`ObjectHeap::write_field`] are the
//!   reflective accessors used by the clone engine. They honour
//!   [`Accessibility::Sealed`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{
    builtin, Accessibility, CollectionKind, FieldDescriptor, FieldId, Layout, ObjectId,
    TypeDescriptor, TypeKey, TypeKind, TypeRegistry, Value,
};

/// Error type for heap operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HeapError {
    /// The id does not refer to an object in this heap.
    #[error("Dangling reference: {0}")]
    DanglingReference(ObjectId),
    /// The named type is not registered.
    #[error("Unknown type: {0}")]
    UnknownType(String),
    /// The type key does not belong to this heap's registry.
    #[error("Type key {0:?} is not registered with this heap")]
    ForeignType(TypeKey),
    /// The type has no such field.
    #[error("Unknown field `{field}` on `{type_name}`")]
    UnknownField {
        /// Type searched.
        type_name: String,
        /// Field name.
        field: String,
    },
    /// Reflective access to the field is not permitted.
    #[error("Access denied to field `{field}` of `{type_name}`")]
    FieldAccessDenied {
        /// Declaring type.
        type_name: String,
        /// Field name.
        field: String,
    },
    /// A blank instance of the type cannot be created.
    #[error("Cannot instantiate {kind} type `{type_name}`")]
    NotInstantiable {
        /// Type name.
        type_name: String,
        /// Its kind.
        kind: TypeKind,
    },
    /// The type's layout does not hold the requested payload.
    #[error("Type `{type_name}` does not have a {expected} layout")]
    LayoutMismatch {
        /// Type name.
        type_name: String,
        /// Layout the operation required.
        expected: &'static str,
    },
}

/// Non-field contents of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain record.
    None,
    /// Immutable text.
    Text(Arc<str>),
    /// List or set elements.
    Elements(Vec<Value>),
    /// Map entries.
    Entries(Vec<(Value, Value)>),
    /// Primitive array contents.
    Primitives(Vec<i64>),
    /// Opaque native handle.
    Native(u64),
}

impl Payload {
    /// Empty payload for a layout.
    pub fn empty_for(layout: Layout) -> Self {
        match layout {
            Layout::Record => Self::None,
            Layout::Text => Self::Text(Arc::from("")),
            Layout::Collection(CollectionKind::Map) => Self::Entries(Vec::new()),
            Layout::Collection(_) => Self::Elements(Vec::new()),
            Layout::PrimitiveArray => Self::Primitives(Vec::new()),
            Layout::Native => Self::Native(0),
        }
    }

    /// Whether the payload holds no elements, entries or primitives.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Elements(v) => v.is_empty(),
            Self::Entries(v) => v.is_empty(),
            Self::Primitives(v) => v.is_empty(),
            Self::Text(t) => t.is_empty(),
            Self::None | Self::Native(_) => true,
        }
    }
}

/// A heap object.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    ty: TypeKey,
    fields: BTreeMap<FieldId, Value>,
    payload: Payload,
}

impl Object {
    /// Runtime type.
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    /// Instance field slot by id.
    pub fn slot(&self, id: FieldId) -> Option<Value> {
        self.fields.get(&id).copied()
    }

    /// All instance field slots.
    pub fn slots(&self) -> impl Iterator<Item = (FieldId, Value)> + '_ {
        self.fields.iter().map(|(id, v)| (*id, *v))
    }

    /// Non-field contents.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// Arena of objects sharing one type registry.
#[derive(Debug, Clone)]
pub struct ObjectHeap {
    types: Arc<TypeRegistry>,
    objects: Vec<Object>,
    statics: BTreeMap<FieldId, Value>,
}

impl ObjectHeap {
    /// Create an empty heap.
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            objects: Vec::new(),
            statics: BTreeMap::new(),
        }
    }

    /// The type registry.
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Shared handle to the type registry.
    pub fn shared_types(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.types)
    }

    /// Number of objects ever allocated.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no object has been allocated.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Get an object.
    pub fn get(&self, id: ObjectId) -> Result<&Object, HeapError> {
        self.objects
            .get(id.index())
            .ok_or(HeapError::DanglingReference(id))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut Object, HeapError> {
        self.objects
            .get_mut(id.index())
            .ok_or(HeapError::DanglingReference(id))
    }

    /// Runtime type of an object.
    pub fn type_of(&self, id: ObjectId) -> Result<TypeKey, HeapError> {
        Ok(self.get(id)?.ty)
    }

    /// Descriptor of an object's runtime type.
    pub fn descriptor_of(&self, id: ObjectId) -> Result<&TypeDescriptor, HeapError> {
        let ty = self.type_of(id)?;
        self.types.get(ty).ok_or(HeapError::ForeignType(ty))
    }

    fn resolve(&self, type_name: &str) -> Result<TypeKey, HeapError> {
        self.types
            .lookup(type_name)
            .ok_or_else(|| HeapError::UnknownType(type_name.to_string()))
    }

    /// Create a blank instance of `ty` without running any construction logic.
    ///
    /// Every instance field holds its zero value and the payload is the empty
    /// payload of the type's layout. Abstract, interface and factory-only
    /// types fail with [`HeapError::NotInstantiable`].
    pub fn blank_instance(&mut self, ty: TypeKey) -> Result<ObjectId, HeapError> {
        let desc = self.types.get(ty).ok_or(HeapError::ForeignType(ty))?;
        if !desc.kind.is_instantiable() {
            return Err(HeapError::NotInstantiable {
                type_name: desc.name.clone(),
                kind: desc.kind,
            });
        }
        self.allocate(ty)
    }

    /// Constructor-level allocation. Only abstract and interface types fail.
    fn allocate(&mut self, ty: TypeKey) -> Result<ObjectId, HeapError> {
        let desc = self.types.get(ty).ok_or(HeapError::ForeignType(ty))?;
        if !desc.kind.is_concrete() {
            return Err(HeapError::NotInstantiable {
                type_name: desc.name.clone(),
                kind: desc.kind,
            });
        }

        let fields = self
            .types
            .instance_fields(ty)
            .map(|f| (f.id, f.kind.zero()))
            .collect();
        let payload = Payload::empty_for(desc.layout);

        let id = ObjectId::new(self.objects.len() as u32);
        self.objects.push(Object { ty, fields, payload });
        Ok(id)
    }

    /// A freshly constructed, empty instance of the same type as `id`.
    pub fn fresh_like(&mut self, id: ObjectId) -> Result<ObjectId, HeapError> {
        let ty = self.type_of(id)?;
        self.blank_instance(ty)
    }

    /// Allocate a record of the named type and initialise the given fields.
    pub fn new_object(
        &mut self,
        type_name: &str,
        fields: &[(&str, Value)],
    ) -> Result<ObjectId, HeapError> {
        let ty = self.resolve(type_name)?;
        let id = self.allocate(ty)?;
        for (name, value) in fields {
            self.set_field(id, name, *value)?;
        }
        Ok(id)
    }

    /// Allocate a `core.String`.
    pub fn new_text(&mut self, text: &str) -> Result<ObjectId, HeapError> {
        self.new_text_of(builtin::STRING, text)
    }

    /// Allocate a text object of a text-layout type.
    pub fn new_text_of(&mut self, type_name: &str, text: &str) -> Result<ObjectId, HeapError> {
        self.with_payload(type_name, Payload::Text(Arc::from(text)))
    }

    /// Allocate a list or set of the named collection type.
    pub fn new_collection(
        &mut self,
        type_name: &str,
        elements: Vec<Value>,
    ) -> Result<ObjectId, HeapError> {
        self.with_payload(type_name, Payload::Elements(elements))
    }

    /// Allocate a map of the named map type.
    pub fn new_map(
        &mut self,
        type_name: &str,
        entries: Vec<(Value, Value)>,
    ) -> Result<ObjectId, HeapError> {
        self.with_payload(type_name, Payload::Entries(entries))
    }

    /// Allocate a primitive array of the named array type.
    pub fn new_primitive_array(
        &mut self,
        type_name: &str,
        values: Vec<i64>,
    ) -> Result<ObjectId, HeapError> {
        self.with_payload(type_name, Payload::Primitives(values))
    }

    /// Allocate a native handle of the named native type.
    pub fn new_native(&mut self, type_name: &str, handle: u64) -> Result<ObjectId, HeapError> {
        self.with_payload(type_name, Payload::Native(handle))
    }

    fn with_payload(&mut self, type_name: &str, payload: Payload) -> Result<ObjectId, HeapError> {
        let ty = self.resolve(type_name)?;
        let desc = self.types.get(ty).ok_or(HeapError::ForeignType(ty))?;
        check_layout(desc, &payload)?;
        let id = self.allocate(ty)?;
        self.get_mut(id)?.payload = payload;
        Ok(id)
    }

    /// Replace an object's payload. The payload must match the type's layout.
    pub fn set_payload(&mut self, id: ObjectId, payload: Payload) -> Result<(), HeapError> {
        check_layout(self.descriptor_of(id)?, &payload)?;
        self.get_mut(id)?.payload = payload;
        Ok(())
    }

    /// An object's payload.
    pub fn payload(&self, id: ObjectId) -> Result<&Payload, HeapError> {
        Ok(&self.get(id)?.payload)
    }

    /// Text of a text object.
    pub fn text(&self, id: ObjectId) -> Option<&str> {
        match self.get(id).ok()?.payload() {
            Payload::Text(t) => Some(t.as_ref()),
            _ => None,
        }
    }

    /// Elements of a list or set.
    pub fn elements(&self, id: ObjectId) -> Option<&[Value]> {
        match self.get(id).ok()?.payload() {
            Payload::Elements(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn field_descriptor(&self, id: ObjectId, name: &str) -> Result<FieldDescriptor, HeapError> {
        let desc = self.descriptor_of(id)?;
        self.types
            .field_by_name(desc.key, name)
            .cloned()
            .ok_or_else(|| HeapError::UnknownField {
                type_name: desc.name.clone(),
                field: name.to_string(),
            })
    }

    /// Constructor-level read by field name. Ignores accessibility.
    pub fn field(&self, id: ObjectId, name: &str) -> Result<Value, HeapError> {
        let field = self.field_descriptor(id, name)?;
        self.slot(id, &field)
    }

    /// Constructor-level write by field name. Ignores accessibility.
    pub fn set_field(&mut self, id: ObjectId, name: &str, value: Value) -> Result<(), HeapError> {
        let field = self.field_descriptor(id, name)?;
        self.store(id, &field, value)
    }

    /// Reflective read. Fails for sealed fields.
    pub fn read_field(&self, id: ObjectId, field: &FieldDescriptor) -> Result<Value, HeapError> {
        self.check_access(field)?;
        self.slot(id, field)
    }

    /// Reflective write. Fails for sealed fields.
    pub fn write_field(
        &mut self,
        id: ObjectId,
        field: &FieldDescriptor,
        value: Value,
    ) -> Result<(), HeapError> {
        self.check_access(field)?;
        self.store(id, field, value)
    }

    /// Value of a static field.
    pub fn static_value(&self, type_name: &str, name: &str) -> Result<Value, HeapError> {
        let field = self.static_descriptor(type_name, name)?;
        Ok(self.statics.get(&field.id).copied().unwrap_or_else(|| field.kind.zero()))
    }

    /// Set a static field.
    pub fn set_static(&mut self, type_name: &str, name: &str, value: Value) -> Result<(), HeapError> {
        let field = self.static_descriptor(type_name, name)?;
        self.statics.insert(field.id, value);
        Ok(())
    }

    fn static_descriptor(&self, type_name: &str, name: &str) -> Result<FieldDescriptor, HeapError> {
        let ty = self.resolve(type_name)?;
        self.types
            .field_by_name(ty, name)
            .filter(|f| f.is_static)
            .cloned()
            .ok_or_else(|| HeapError::UnknownField {
                type_name: type_name.to_string(),
                field: name.to_string(),
            })
    }

    fn check_access(&self, field: &FieldDescriptor) -> Result<(), HeapError> {
        if field.access == Accessibility::Sealed {
            return Err(HeapError::FieldAccessDenied {
                type_name: self.types.name(field.declaring_type).to_string(),
                field: field.name.clone(),
            });
        }
        Ok(())
    }

    fn slot(&self, id: ObjectId, field: &FieldDescriptor) -> Result<Value, HeapError> {
        if field.is_static {
            return Ok(self
                .statics
                .get(&field.id)
                .copied()
                .unwrap_or_else(|| field.kind.zero()));
        }
        let object = self.get(id)?;
        object.slot(field.id).ok_or_else(|| HeapError::UnknownField {
            type_name: self.types.name(object.ty).to_string(),
            field: field.name.clone(),
        })
    }

    fn store(&mut self, id: ObjectId, field: &FieldDescriptor, value: Value) -> Result<(), HeapError> {
        if field.is_static {
            self.statics.insert(field.id, value);
            return Ok(());
        }
        if let Some(slot) = self.get_mut(id)?.fields.get_mut(&field.id) {
            *slot = value;
            return Ok(());
        }
        Err(HeapError::UnknownField {
            type_name: self.descriptor_of(id)?.name.clone(),
            field: field.name.clone(),
        })
    }
}

fn check_layout(desc: &TypeDescriptor, payload: &Payload) -> Result<(), HeapError> {
    let expected = match (desc.layout, payload) {
        (Layout::Record, Payload::None)
        | (Layout::Text, Payload::Text(_))
        | (Layout::Collection(CollectionKind::Map), Payload::Entries(_))
        | (Layout::PrimitiveArray, Payload::Primitives(_))
        | (Layout::Native, Payload::Native(_)) => return Ok(()),
        (Layout::Collection(kind), Payload::Elements(_)) if kind != CollectionKind::Map => {
            return Ok(())
        }
        (Layout::Record, _) => "record",
        (Layout::Text, _) => "text",
        (Layout::Collection(_), _) => "collection",
        (Layout::PrimitiveArray, _) => "primitive array",
        (Layout::Native, _) => "native",
    };
    Err(HeapError::LayoutMismatch {
        type_name: desc.name.clone(),
        expected,
    })
}
