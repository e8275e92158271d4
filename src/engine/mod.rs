//! Policy-driven graph cloning.
//!
//! ## Pipeline
//!
//! ```text
//! root → HookDispatcher ─ReplaceObject→ clone
//!            │ UseDefault
//!            ▼
//!        exemption? ─yes→ alias
//!            │ no
//!            ▼
//!        blank instance → CloneMap → queue
//!                                      │
//!        FieldClassifier per field ◀───┘
//!          Skip | Reset | Alias | Recurse | Denied
//! ```
//!
//! ## Guarantees
//!
//! - Each original reachable from the root is cloned at most once per pass
//! - Cycles resolve to the clone recorded for the object
//! - Exempt objects are shared, never copied
//! - Originals are never written; statics are never touched
//! - A failing hook degrades to generic cloning and never aborts the pass

pub mod classifier;
pub mod clone_map;
pub mod context;
pub mod hooks;
pub mod reset_hook;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::heap::{HeapError, ObjectHeap};
use crate::policy::PolicyRegistry;
use crate::types::{ObjectId, Value};

pub use classifier::{FieldClassifier, FieldDecision};
pub use clone_map::CloneMap;
pub use context::CloneContext;
pub use hooks::{CloneHook, HandleResult, HookDispatcher, HookError, OverrideHook, TypeMatcher};
pub use reset_hook::ResetFieldsHook;

/// Engine behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Log special-case activity at `info` under `clone_kernel::diagnostics`.
    pub diagnostics: bool,
    /// Alias a non-root object whose type cannot be instantiated instead of
    /// failing the pass.
    pub alias_on_instantiation_failure: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            diagnostics: false,
            alias_on_instantiation_failure: true,
        }
    }
}

/// Counters collected over one clone pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneStats {
    /// Objects cloned through the generic path.
    pub objects_cloned: usize,
    /// References shared with the original graph.
    pub aliased: usize,
    /// Objects cloned by an override hook.
    pub hook_replacements: usize,
    /// Hook invocations that failed and fell back to generic cloning.
    pub hook_failures: usize,
    /// Back-reference fields replaced with empty instances.
    pub fields_reset: usize,
    /// Fields that could not be read or written.
    pub access_denied: usize,
    /// Non-root objects aliased because they could not be instantiated.
    pub instantiation_fallbacks: usize,
}

/// Errors that abort a clone pass.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    /// The root object's type cannot be instantiated.
    #[error("cannot instantiate clone of root {id}: {source}")]
    RootInstantiation {
        /// The root object.
        id: ObjectId,
        /// Underlying heap error.
        #[source]
        source: HeapError,
    },
    /// Structural heap error (dangling reference, foreign type).
    #[error(transparent)]
    Heap(#[from] HeapError),
}

/// Result of [`CloneEngine::clone_graph`].
#[derive(Debug, Clone)]
pub struct ClonedGraph {
    /// Identifier of the pass, as recorded in logs.
    pub pass_id: Uuid,
    /// Clone of the root value.
    pub root: Value,
    /// Identity map of the pass.
    pub clones: CloneMap,
    /// Counters.
    pub stats: CloneStats,
}

impl ClonedGraph {
    /// Clone produced for `original`, if it was cloned by identity.
    pub fn clone_of(&self, original: ObjectId) -> Option<ObjectId> {
        self.clones.lookup(original)
    }
}

/// The cloning engine: a policy, a hook set and options.
///
/// An engine is immutable once built and is `Send + Sync`; concurrent passes
/// over distinct heaps share it freely.
#[derive(Debug, Clone, Default)]
pub struct CloneEngine {
    policy: PolicyRegistry,
    hooks: HookDispatcher,
    options: EngineOptions,
}

impl CloneEngine {
    /// Start building an engine.
    pub fn builder() -> CloneEngineBuilder {
        CloneEngineBuilder::default()
    }

    /// Engine with the given policy, no hooks and default options.
    pub fn new(policy: PolicyRegistry) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The exemption policy.
    pub fn policy(&self) -> &PolicyRegistry {
        &self.policy
    }

    /// The registered hooks.
    pub fn hooks(&self) -> &HookDispatcher {
        &self.hooks
    }

    /// Engine options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Field classifier over this engine's policy and hooks.
    pub fn classifier(&self) -> FieldClassifier<'_> {
        FieldClassifier::new(&self.policy, &self.hooks)
    }

    /// Deep-clone the graph reachable from `root` into `heap`.
    ///
    /// Null and primitive roots are returned as-is. The original graph is left
    /// unmodified; clones are appended to the heap.
    pub fn clone_graph(&self, heap: &mut ObjectHeap, root: Value) -> Result<ClonedGraph, CloneError> {
        let pass_id = Uuid::new_v4();
        let span = tracing::debug_span!("clone_graph", pass_id = %pass_id);
        let _guard = span.enter();

        let Some(root_id) = root.as_object() else {
            return Ok(ClonedGraph {
                pass_id,
                root,
                clones: CloneMap::new(),
                stats: CloneStats::default(),
            });
        };

        let heap_before = heap.len();
        let mut cx = CloneContext::new(self, heap, pass_id);
        let cloned_root = cx.clone_root(root_id)?;
        cx.drain()?;
        let (clones, stats) = cx.finish();

        tracing::debug!(
            root = %root_id,
            clone = %cloned_root,
            objects_cloned = stats.objects_cloned,
            aliased = stats.aliased,
            hook_replacements = stats.hook_replacements,
            allocated = heap.len() - heap_before,
            "Clone pass complete"
        );

        Ok(ClonedGraph {
            pass_id,
            root: Value::Ref(cloned_root),
            clones,
            stats,
        })
    }

    /// Deep-clone a single object, returning the clone's id.
    pub fn clone_object(&self, heap: &mut ObjectHeap, id: ObjectId) -> Result<ObjectId, CloneError> {
        let graph = self.clone_graph(heap, Value::Ref(id))?;
        Ok(graph.root.as_object().unwrap_or(id))
    }
}

/// Builder for [`CloneEngine`].
#[derive(Debug, Default)]
pub struct CloneEngineBuilder {
    engine: CloneEngine,
}

impl CloneEngineBuilder {
    /// Set the exemption policy.
    pub fn policy(mut self, policy: PolicyRegistry) -> Self {
        self.engine.policy = policy;
        self
    }

    /// Register an override hook. Earlier hooks take precedence.
    pub fn hook(mut self, hook: OverrideHook) -> Self {
        self.engine.hooks.register(hook);
        self
    }

    /// Replace all options.
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.engine.options = options;
        self
    }

    /// Enable diagnostic logging.
    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.engine.options.diagnostics = enabled;
        self
    }

    /// Choose aliasing or failure for non-instantiable non-root objects.
    pub fn alias_on_instantiation_failure(mut self, enabled: bool) -> Self {
        self.engine.options.alias_on_instantiation_failure = enabled;
        self
    }

    /// Finish building.
    pub fn build(self) -> CloneEngine {
        self.engine
    }
}
