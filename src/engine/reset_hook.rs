//! Built-in hook for types that track who points at them.
//!
//! Readers, caches and similar objects keep back-reference collections whose
//! entries name identities in the original graph. [`ResetFieldsHook`] clones
//! such an object generically, except that the named fields receive fresh
//! empty instances of their collection type. A hook built
//! [`with_empty`](ResetFieldsHook::with_empty) also fills null fields with a
//! fresh empty collection.

use std::collections::BTreeSet;

use crate::heap::HeapError;
use crate::types::{CollectionKind, ObjectId, Value};

use super::context::CloneContext;
use super::hooks::{CloneHook, HandleResult, HookError, OverrideHook, TypeMatcher};

/// Clone hook that resets the named fields and clones everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetFieldsHook {
    fields: BTreeSet<String>,
    empty: Option<CollectionKind>,
}

impl ResetFieldsHook {
    /// Hook resetting `fields` on every matched object.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            empty: None,
        }
    }

    /// Give null reset fields a fresh empty collection of `kind`.
    pub fn with_empty(mut self, kind: CollectionKind) -> Self {
        self.empty = Some(kind);
        self
    }

    /// Collection installed in null reset fields, if any.
    pub fn empty(&self) -> Option<CollectionKind> {
        self.empty
    }

    /// Fields reset by this hook.
    pub fn fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(String::as_str)
    }

    /// Register this hook for `type_name` and its subtypes.
    pub fn into_override(self, type_name: impl Into<String>) -> OverrideHook {
        let type_name = type_name.into();
        let name = format!("reset-fields:{}", type_name);
        OverrideHook::new(name, TypeMatcher::SubtypeOf(type_name), self)
    }
}

impl CloneHook for ResetFieldsHook {
    fn clone_object(
        &self,
        cx: &mut CloneContext<'_>,
        original: ObjectId,
    ) -> Result<HandleResult, HookError> {
        let clone = cx.blank_like(original)?;
        cx.record(original, clone);

        let types = cx.heap().shared_types();
        let ty = cx.heap().type_of(original)?;
        for field in types.hierarchy_fields(ty) {
            if field.is_static {
                continue;
            }
            if !self.fields.contains(&field.name) {
                cx.apply_field(original, clone, field)?;
                continue;
            }

            let value = cx.heap().read_field(original, field)?;
            let fresh = match (value, self.empty) {
                (Value::Null, Some(kind)) => empty_collection(cx, kind)?,
                (value, _) => cx.reset_value(field, value)?,
            };
            cx.heap_mut().write_field(clone, field, fresh)?;
            cx.note(format_args!(
                "field {} of {} reset to empty instance",
                field.name, original
            ));
        }

        cx.copy_payload(original, clone)?;
        Ok(HandleResult::ReplaceObject(clone))
    }
}

fn empty_collection(cx: &mut CloneContext<'_>, kind: CollectionKind) -> Result<Value, HookError> {
    let name = kind.builtin_type();
    let ty = cx
        .types()
        .lookup(name)
        .ok_or_else(|| HeapError::UnknownType(name.to_string()))?;
    let fresh = cx.blank_instance(ty)?;
    cx.stats_mut().fields_reset += 1;
    Ok(Value::Ref(fresh))
}
