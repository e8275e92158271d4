//! Per-pass clone state.
//!
//! A [`CloneContext`] exists for exactly one `clone_graph` call. It owns the
//! pass's [`CloneMap`] and work queue and borrows the heap mutably, so two
//! passes can never share a map.
//!
//! ## Traversal
//!
//! Cloning an object allocates a blank instance, records the identity
//! mapping, and queues the (original, clone) pair. Fields are populated when
//! the queue drains. Because the mapping exists before any field is
//! populated, every cycle back to the object resolves to its clone, and the
//! native stack stays flat however deep the graph is.

use std::collections::VecDeque;
use std::fmt;

use uuid::Uuid;

use crate::heap::{HeapError, ObjectHeap, Payload};
use crate::types::{FieldDescriptor, Layout, ObjectId, TypeKey, TypeRegistry, Value};

use super::classifier::FieldDecision;
use super::clone_map::CloneMap;
use super::hooks::HandleResult;
use super::{CloneEngine, CloneError, CloneStats};

/// State of one clone pass, handed to override hooks.
pub struct CloneContext<'a> {
    engine: &'a CloneEngine,
    heap: &'a mut ObjectHeap,
    clones: CloneMap,
    pending: VecDeque<(ObjectId, ObjectId)>,
    stats: CloneStats,
    pass_id: Uuid,
}

impl<'a> CloneContext<'a> {
    pub(crate) fn new(engine: &'a CloneEngine, heap: &'a mut ObjectHeap, pass_id: Uuid) -> Self {
        Self {
            engine,
            heap,
            clones: CloneMap::new(),
            pending: VecDeque::new(),
            stats: CloneStats::default(),
            pass_id,
        }
    }

    /// The engine running this pass.
    pub fn engine(&self) -> &'a CloneEngine {
        self.engine
    }

    /// Identifier of this pass, as recorded in logs.
    pub fn pass_id(&self) -> Uuid {
        self.pass_id
    }

    /// The heap being cloned within.
    pub fn heap(&self) -> &ObjectHeap {
        self.heap
    }

    /// Mutable heap access for hooks that build their own clones.
    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        self.heap
    }

    /// The type registry of the heap.
    pub fn types(&self) -> &TypeRegistry {
        self.heap.types()
    }

    /// Identity map of this pass.
    pub fn clones(&self) -> &CloneMap {
        &self.clones
    }

    /// Counters for this pass.
    pub fn stats(&self) -> &CloneStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut CloneStats {
        &mut self.stats
    }

    /// Record `clone` as the clone of `original`.
    pub fn record(&mut self, original: ObjectId, clone: ObjectId) {
        self.clones.record(original, clone);
    }

    pub(crate) fn rollback(&mut self, original: ObjectId) {
        if self.clones.forget(original).is_some() {
            tracing::debug!(object = %original, "Rolled back partial clone mapping");
        }
    }

    /// Emit a diagnostic about special-case activity.
    ///
    /// Routed to `info` under `clone_kernel::diagnostics` when the engine's
    /// diagnostics flag is set, to `debug` otherwise.
    pub fn note(&self, message: fmt::Arguments<'_>) {
        if self.engine.options().diagnostics {
            tracing::info!(
                target: "clone_kernel::diagnostics",
                pass_id = %self.pass_id,
                "{}",
                message
            );
        } else {
            tracing::debug!(pass_id = %self.pass_id, "{}", message);
        }
    }

    /// Clone a value: primitives and null copy, references go through
    /// [`clone_object`](Self::clone_object).
    pub fn clone_value(&mut self, value: Value) -> Result<Value, CloneError> {
        match value {
            Value::Ref(id) => Ok(Value::Ref(self.clone_object(id)?)),
            other => Ok(other),
        }
    }

    /// Clone an object reachable from the root.
    ///
    /// Returns the existing clone when the object was seen before in this
    /// pass, the object itself when it is exempt, or a new clone whose fields
    /// are populated before the pass returns.
    pub fn clone_object(&mut self, original: ObjectId) -> Result<ObjectId, CloneError> {
        self.clone_inner(original, false)
    }

    pub(crate) fn clone_root(&mut self, root: ObjectId) -> Result<ObjectId, CloneError> {
        self.clone_inner(root, true)
    }

    fn clone_inner(&mut self, original: ObjectId, is_root: bool) -> Result<ObjectId, CloneError> {
        if let Some(existing) = self.clones.lookup(original) {
            return Ok(existing);
        }
        if let Some(replacement) = self.dispatch_hook(original) {
            return Ok(replacement);
        }
        self.clone_generic(original, is_root)
    }

    fn dispatch_hook(&mut self, original: ObjectId) -> Option<ObjectId> {
        let hooks = self.engine.hooks();
        match hooks.dispatch(self, original) {
            HandleResult::ReplaceObject(replacement) => {
                self.clones.record(original, replacement);
                self.stats.hook_replacements += 1;
                Some(replacement)
            }
            _ => None,
        }
    }

    /// Alias exempt and native objects, otherwise allocate and queue a clone.
    fn clone_generic(&mut self, original: ObjectId, is_root: bool) -> Result<ObjectId, CloneError> {
        let ty = self.heap.type_of(original)?;
        let types = self.heap.types();
        let exempt = self.engine.policy().is_exempt_object(types, ty);
        let native = types.get(ty).is_some_and(|t| t.layout == Layout::Native);
        if exempt || native {
            if native {
                self.note(format_args!(
                    "no field model for native {} ({}), aliasing",
                    types.name(ty),
                    original
                ));
            }
            self.stats.aliased += 1;
            return Ok(original);
        }

        match self.heap.blank_instance(ty) {
            Ok(clone) => {
                self.clones.record(original, clone);
                self.pending.push_back((original, clone));
                self.stats.objects_cloned += 1;
                Ok(clone)
            }
            Err(source) if is_root => Err(CloneError::RootInstantiation {
                id: original,
                source,
            }),
            Err(source) if self.engine.options().alias_on_instantiation_failure => {
                tracing::warn!(
                    object = %original,
                    error = %source,
                    "Cannot instantiate clone, aliasing original"
                );
                self.stats.instantiation_fallbacks += 1;
                self.stats.aliased += 1;
                Ok(original)
            }
            Err(source) => Err(CloneError::Heap(source)),
        }
    }

    /// A blank instance of `ty`, with no identity recorded.
    pub fn blank_instance(&mut self, ty: TypeKey) -> Result<ObjectId, CloneError> {
        Ok(self.heap.blank_instance(ty)?)
    }

    /// A blank instance of `original`'s runtime type, with no identity recorded.
    pub fn blank_like(&mut self, original: ObjectId) -> Result<ObjectId, CloneError> {
        Ok(self.heap.fresh_like(original)?)
    }

    /// Replacement for a back-reference value of `field`: a fresh, empty
    /// instance of the same type. Null and primitives are returned unchanged.
    ///
    /// If the type cannot be blank-instantiated the field's zero value is
    /// returned. The original value is never carried into the clone.
    pub fn reset_value(&mut self, field: &FieldDescriptor, value: Value) -> Result<Value, CloneError> {
        let Some(id) = value.as_object() else {
            return Ok(value);
        };
        match self.heap.fresh_like(id) {
            Ok(fresh) => {
                self.stats.fields_reset += 1;
                Ok(Value::Ref(fresh))
            }
            Err(e @ HeapError::NotInstantiable { .. }) => {
                tracing::warn!(
                    object = %id,
                    field = %field.name,
                    error = %e,
                    "Cannot instantiate empty back-reference, clone keeps zero value"
                );
                self.stats.fields_reset += 1;
                self.stats.instantiation_fallbacks += 1;
                Ok(field.kind.zero())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Carry one field of `original` into `clone` following the classifier.
    pub fn apply_field(
        &mut self,
        original: ObjectId,
        clone: ObjectId,
        field: &FieldDescriptor,
    ) -> Result<(), CloneError> {
        let decision = self.engine.classifier().classify(self.heap, original, field)?;
        let value = match &decision {
            FieldDecision::Skip => return Ok(()),
            FieldDecision::Denied(e) => {
                tracing::warn!(
                    object = %original,
                    field = %field.name,
                    error = %e,
                    "Field not readable, clone keeps zero value"
                );
                self.stats.access_denied += 1;
                return Ok(());
            }
            FieldDecision::Reset(value) => {
                let fresh = self.reset_value(field, *value)?;
                self.note(format_args!(
                    "field {} of {} reset to empty instance",
                    field.name, original
                ));
                return self.store(clone, field, fresh);
            }
            FieldDecision::Alias(value)
            | FieldDecision::Recurse(value)
            | FieldDecision::Dispatch(value) => *value,
        };

        let hooks = self.engine.hooks();
        if !hooks.is_empty() {
            let owner_ty = self.heap.type_of(original)?;
            if hooks.claims(self.heap.types(), owner_ty) {
                if let HandleResult::ReplaceField(v) =
                    hooks.dispatch_field(self, original, field, value)
                {
                    return self.store(clone, field, v);
                }
            }
        }

        let value = match decision {
            FieldDecision::Recurse(value) => self.clone_value(value)?,
            FieldDecision::Dispatch(value) => self.clone_claimed(original, field, value)?,
            _ => {
                self.stats.aliased += 1;
                value
            }
        };
        self.store(clone, field, value)
    }

    /// Clone a field value whose type an override hook claims. The hook runs
    /// first; if it declines, the value is classified like any other.
    fn clone_claimed(
        &mut self,
        owner: ObjectId,
        field: &FieldDescriptor,
        value: Value,
    ) -> Result<Value, CloneError> {
        let Some(target) = value.as_object() else {
            return Ok(value);
        };
        if let Some(existing) = self.clones.lookup(target) {
            return Ok(Value::Ref(existing));
        }
        if let Some(replacement) = self.dispatch_hook(target) {
            return Ok(Value::Ref(replacement));
        }
        match self
            .engine
            .classifier()
            .classify_value(self.heap, owner, field, value)?
        {
            FieldDecision::Alias(value) => {
                self.stats.aliased += 1;
                Ok(value)
            }
            _ => Ok(Value::Ref(self.clone_generic(target, false)?)),
        }
    }

    fn store(&mut self, clone: ObjectId, field: &FieldDescriptor, value: Value) -> Result<(), CloneError> {
        match self.heap.write_field(clone, field, value) {
            Ok(()) => Ok(()),
            Err(e @ HeapError::FieldAccessDenied { .. }) => {
                tracing::warn!(
                    object = %clone,
                    field = %field.name,
                    error = %e,
                    "Field not writable, clone keeps zero value"
                );
                self.stats.access_denied += 1;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Clone the payload of `original` (text, elements, entries) into `clone`.
    ///
    /// Elements and entries go through [`clone_value`](Self::clone_value),
    /// so type and capability exemptions apply to them; field-value rules do
    /// not, since an element has no field.
    pub fn copy_payload(&mut self, original: ObjectId, clone: ObjectId) -> Result<(), CloneError> {
        let payload = match self.heap.payload(original)? {
            Payload::None => return Ok(()),
            other => other.clone(),
        };
        let cloned = match payload {
            Payload::Elements(elements) => Payload::Elements(
                elements
                    .into_iter()
                    .map(|v| self.clone_value(v))
                    .collect::<Result<_, _>>()?,
            ),
            Payload::Entries(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    out.push((self.clone_value(k)?, self.clone_value(v)?));
                }
                Payload::Entries(out)
            }
            other => other,
        };
        self.heap.set_payload(clone, cloned)?;
        Ok(())
    }

    /// Populate every field and the payload of a generic clone.
    fn populate(&mut self, original: ObjectId, clone: ObjectId) -> Result<(), CloneError> {
        let types = self.heap.shared_types();
        let ty = self.heap.type_of(original)?;
        for field in types.hierarchy_fields(ty) {
            self.apply_field(original, clone, field)?;
        }
        self.copy_payload(original, clone)
    }

    /// Populate queued clones until none remain.
    pub(crate) fn drain(&mut self) -> Result<(), CloneError> {
        while let Some((original, clone)) = self.pending.pop_front() {
            self.populate(original, clone)?;
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> (CloneMap, CloneStats) {
        (self.clones, self.stats)
    }
}
