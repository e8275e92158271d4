//! Per-field clone decisions.
//!
//! ## Order of evaluation
//!
//! 1. Static fields are skipped.
//! 2. The field is read reflectively; a denied read is reported as
//!    [`FieldDecision::Denied`] and the clone keeps the zero value.
//! 3. Designated back-reference fields are reset.
//! 4. Null and primitive values recurse trivially (they copy as-is).
//! 5. A reference claimed by an override hook is dispatched; steps 6 to 9
//!    apply only if the hook declines.
//! 6. Type and capability exemptions alias the value.
//! 7. Native values alias (the engine has no field model for them).
//! 8. Field-value rules alias the value.
//! 9. Everything else recurses.

use crate::heap::{HeapError, ObjectHeap};
use crate::policy::{FieldValueContext, PolicyRegistry};
use crate::types::{FieldDescriptor, Layout, ObjectId, Value};

use super::hooks::HookDispatcher;

/// Decision for a single field of the object being cloned.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDecision {
    /// Static field; the clone does not touch it.
    Skip,
    /// Back-reference field; replace with a fresh empty instance of the value's type.
    Reset(Value),
    /// Copy the value into the clone verbatim.
    Alias(Value),
    /// Clone the value through the engine.
    Recurse(Value),
    /// An override hook claims the value's type. The hook runs first; if it
    /// declines, [`FieldClassifier::classify_value`] decides.
    Dispatch(Value),
    /// The field cannot be read; the clone keeps the zero value.
    Denied(HeapError),
}

/// Classifies fields against a policy registry and hook set.
#[derive(Debug, Clone, Copy)]
pub struct FieldClassifier<'a> {
    policy: &'a PolicyRegistry,
    hooks: &'a HookDispatcher,
}

impl<'a> FieldClassifier<'a> {
    /// Create a classifier.
    pub fn new(policy: &'a PolicyRegistry, hooks: &'a HookDispatcher) -> Self {
        Self { policy, hooks }
    }

    /// Decide how `field` of `owner` is carried into the clone.
    ///
    /// Only structural heap errors (dangling ids, foreign types) are returned
    /// as `Err`; access denial is a decision.
    pub fn classify(
        &self,
        heap: &ObjectHeap,
        owner: ObjectId,
        field: &FieldDescriptor,
    ) -> Result<FieldDecision, HeapError> {
        if field.is_static {
            return Ok(FieldDecision::Skip);
        }

        let types = heap.types();
        let owner_desc = heap.descriptor_of(owner)?;

        let value = match heap.read_field(owner, field) {
            Ok(value) => value,
            Err(e @ HeapError::FieldAccessDenied { .. }) => return Ok(FieldDecision::Denied(e)),
            Err(e) => return Err(e),
        };

        if self.policy.is_reset_field(types, owner_desc.key, field) {
            return Ok(FieldDecision::Reset(value));
        }

        let Some(target) = value.as_object() else {
            return Ok(FieldDecision::Recurse(value));
        };

        if self.hooks.claims(types, heap.type_of(target)?) {
            return Ok(FieldDecision::Dispatch(value));
        }
        self.classify_value(heap, owner, field, value)
    }

    /// Exemption checks for `value` stored in `field` of `owner`, ignoring
    /// hook claims. Yields [`FieldDecision::Alias`] or [`FieldDecision::Recurse`].
    pub fn classify_value(
        &self,
        heap: &ObjectHeap,
        owner: ObjectId,
        field: &FieldDescriptor,
        value: Value,
    ) -> Result<FieldDecision, HeapError> {
        let Some(target) = value.as_object() else {
            return Ok(FieldDecision::Recurse(value));
        };
        let types = heap.types();
        let owner_desc = heap.descriptor_of(owner)?;
        let value_desc = heap.descriptor_of(target)?;
        if self.policy.is_exempt_object(types, value_desc.key) {
            return Ok(FieldDecision::Alias(value));
        }
        if value_desc.layout == Layout::Native {
            return Ok(FieldDecision::Alias(value));
        }

        let cx = FieldValueContext {
            types,
            owner: owner_desc,
            field,
            value: target,
            value_type: value_desc,
        };
        if self.policy.is_exempt_field_value(&cx) {
            return Ok(FieldDecision::Alias(value));
        }

        Ok(FieldDecision::Recurse(value))
    }
}
