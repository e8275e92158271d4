//! Override hooks: custom cloning for specially-handled types.
//!
//! Hooks are registered once, at engine build time, and consulted in
//! registration order. The first hook whose [`TypeMatcher`] accepts the
//! object's type (or any ancestor, for [`TypeMatcher::SubtypeOf`]) wins.
//!
//! A hook that fails never aborts the pass: the dispatcher logs the failure,
//! rolls back any identity mapping the hook recorded for the object, and
//! reports [`HandleResult::UseDefault`] so the generic path takes over.

use std::fmt;
use std::sync::Arc;

use crate::heap::HeapError;
use crate::types::{FieldDescriptor, ObjectId, TypeKey, TypeRegistry, Value};

use super::context::CloneContext;
use super::CloneError;

/// Outcome of an override hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandleResult {
    /// The hook produced the clone of the whole object.
    ReplaceObject(ObjectId),
    /// The hook produced the value of a single field.
    ReplaceField(Value),
    /// Fall through to generic cloning.
    UseDefault,
}

/// Error raised by a hook.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Hook-specific failure.
    #[error("{0}")]
    Failed(String),
    /// Heap access failed inside the hook.
    #[error(transparent)]
    Heap(#[from] HeapError),
    /// A nested clone failed inside the hook.
    #[error(transparent)]
    Clone(Box<CloneError>),
}

impl From<CloneError> for HookError {
    fn from(e: CloneError) -> Self {
        Self::Clone(Box::new(e))
    }
}

/// Custom cloning logic for a matched type.
///
/// Implementations may clone sub-structures through the context. A hook
/// that builds its own clone must [`record`](CloneContext::record) the
/// original → clone mapping before cloning anything reachable from the
/// original, or cycles back to the original will not resolve to it.
pub trait CloneHook: Send + Sync {
    /// Clone a whole object.
    fn clone_object(
        &self,
        cx: &mut CloneContext<'_>,
        original: ObjectId,
    ) -> Result<HandleResult, HookError>;

    /// Produce the clone's value for one field of a matched owner.
    fn clone_field(
        &self,
        _cx: &mut CloneContext<'_>,
        _owner: ObjectId,
        _field: &FieldDescriptor,
        _value: Value,
    ) -> Result<HandleResult, HookError> {
        Ok(HandleResult::UseDefault)
    }
}

struct FnHook<F>(F);

impl<F> CloneHook for FnHook<F>
where
    F: Fn(&mut CloneContext<'_>, ObjectId) -> Result<HandleResult, HookError> + Send + Sync,
{
    fn clone_object(
        &self,
        cx: &mut CloneContext<'_>,
        original: ObjectId,
    ) -> Result<HandleResult, HookError> {
        (self.0)(cx, original)
    }
}

/// Which types a hook applies to, by qualified name.
///
/// Matching by name lets a hook target a type that is not registered in
/// every heap's type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMatcher {
    /// Only the named type.
    Exact(String),
    /// The named type and all of its subtypes.
    SubtypeOf(String),
}

impl TypeMatcher {
    /// Match the named type and its subtypes.
    pub fn subtype_of(type_name: impl Into<String>) -> Self {
        Self::SubtypeOf(type_name.into())
    }

    /// Match exactly the named type.
    pub fn exact(type_name: impl Into<String>) -> Self {
        Self::Exact(type_name.into())
    }

    /// Whether `ty` is accepted.
    pub fn matches(&self, types: &TypeRegistry, ty: TypeKey) -> bool {
        match self {
            Self::Exact(name) => types.name(ty) == name,
            Self::SubtypeOf(name) => types.is_subtype_of(ty, name),
        }
    }
}

impl fmt::Display for TypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => write!(f, "{}", name),
            Self::SubtypeOf(name) => write!(f, "{}+", name),
        }
    }
}

/// A registered (matcher, cloner) pair.
#[derive(Clone)]
pub struct OverrideHook {
    name: String,
    matcher: TypeMatcher,
    cloner: Arc<dyn CloneHook>,
}

impl OverrideHook {
    /// Create a hook.
    pub fn new(name: impl Into<String>, matcher: TypeMatcher, cloner: impl CloneHook + 'static) -> Self {
        Self {
            name: name.into(),
            matcher,
            cloner: Arc::new(cloner),
        }
    }

    /// Hook for the named type and its subtypes, named after the type.
    pub fn for_subtypes_of(type_name: impl Into<String>, cloner: impl CloneHook + 'static) -> Self {
        let type_name = type_name.into();
        Self::new(type_name.clone(), TypeMatcher::SubtypeOf(type_name), cloner)
    }

    /// Hook backed by a closure.
    pub fn from_fn<F>(matcher: TypeMatcher, f: F) -> Self
    where
        F: Fn(&mut CloneContext<'_>, ObjectId) -> Result<HandleResult, HookError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(matcher.to_string(), matcher, FnHook(f))
    }

    /// Hook name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The matcher.
    pub fn matcher(&self) -> &TypeMatcher {
        &self.matcher
    }
}

impl fmt::Debug for OverrideHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideHook")
            .field("name", &self.name)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// Ordered set of override hooks.
#[derive(Debug, Clone, Default)]
pub struct HookDispatcher {
    hooks: Vec<OverrideHook>,
}

impl HookDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. Earlier hooks take precedence.
    pub fn register(&mut self, hook: OverrideHook) {
        self.hooks.push(hook);
    }

    /// Number of hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Registered hooks in precedence order.
    pub fn hooks(&self) -> &[OverrideHook] {
        &self.hooks
    }

    /// First hook matching `ty`.
    pub fn find(&self, types: &TypeRegistry, ty: TypeKey) -> Option<&OverrideHook> {
        self.hooks.iter().find(|h| h.matcher.matches(types, ty))
    }

    /// Whether some hook matches `ty`.
    pub fn claims(&self, types: &TypeRegistry, ty: TypeKey) -> bool {
        self.find(types, ty).is_some()
    }

    /// Offer `original` to the first matching hook.
    pub fn dispatch(&self, cx: &mut CloneContext<'_>, original: ObjectId) -> HandleResult {
        let Ok(ty) = cx.heap().type_of(original) else {
            return HandleResult::UseDefault;
        };
        let Some(hook) = self.find(cx.heap().types(), ty) else {
            return HandleResult::UseDefault;
        };
        let type_name = cx.heap().types().name(ty).to_string();
        cx.note(format_args!(
            "detected special type {} ({}), delegating to hook `{}`",
            type_name, original, hook.name
        ));

        match hook.cloner.clone_object(cx, original) {
            Ok(HandleResult::ReplaceField(_)) => {
                tracing::warn!(
                    hook = %hook.name,
                    type_name = %type_name,
                    "Hook returned a field replacement for a whole object, using default cloning"
                );
                cx.rollback(original);
                HandleResult::UseDefault
            }
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    hook = %hook.name,
                    type_name = %type_name,
                    object = %original,
                    error = %e,
                    "Override hook failed, falling back to default cloning"
                );
                cx.rollback(original);
                cx.stats_mut().hook_failures += 1;
                HandleResult::UseDefault
            }
        }
    }

    /// Offer one field of `owner` to the first hook matching the owner's type.
    pub fn dispatch_field(
        &self,
        cx: &mut CloneContext<'_>,
        owner: ObjectId,
        field: &FieldDescriptor,
        value: Value,
    ) -> HandleResult {
        let Ok(ty) = cx.heap().type_of(owner) else {
            return HandleResult::UseDefault;
        };
        let Some(hook) = self.find(cx.heap().types(), ty) else {
            return HandleResult::UseDefault;
        };

        match hook.cloner.clone_field(cx, owner, field, value) {
            Ok(HandleResult::ReplaceField(v)) => {
                cx.note(format_args!("field {} of {} replaced by hook `{}`", field.name, owner, hook.name));
                HandleResult::ReplaceField(v)
            }
            Ok(HandleResult::ReplaceObject(_)) => {
                tracing::warn!(
                    hook = %hook.name,
                    field = %field.name,
                    "Hook returned an object replacement for a single field, using default cloning"
                );
                HandleResult::UseDefault
            }
            Ok(HandleResult::UseDefault) => HandleResult::UseDefault,
            Err(e) => {
                tracing::warn!(
                    hook = %hook.name,
                    field = %field.name,
                    error = %e,
                    "Field hook failed, using default cloning"
                );
                cx.stats_mut().hook_failures += 1;
                HandleResult::UseDefault
            }
        }
    }
}
