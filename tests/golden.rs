//! Golden tests for the Clone Kernel.
//!
//! These tests verify identity preservation, exemption decisions and hook
//! behavior of full clone passes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clone_kernel::{
    builtin, shape_fingerprint, Accessibility, Capability, CloneConfig, CloneContext, CloneEngine,
    CloneError, CloneHook, FieldDef, HandleResult, HeapError, HookError, Layout, ObjectHeap,
    ObjectId, OverrideHook, PolicyRegistry, ResetField, ResetFieldsHook, TypeDef, TypeMatcher,
    TypeRegistry, Value, ValueRule,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn registry() -> Arc<TypeRegistry> {
    let mut b = TypeRegistry::builder();
    b.register(
        TypeDef::class("app.Resource")
            .field(FieldDef::reference("peer"))
            .field(FieldDef::reference("tag")),
    )
    .unwrap();
    b.register(
        TypeDef::class("app.Node")
            .field(FieldDef::reference("next"))
            .field(FieldDef::reference("other"))
            .field(FieldDef::int("value"))
            .field(FieldDef::int("instances").static_field()),
    )
    .unwrap();
    b.register(TypeDef::class("app.Leaf").extends("app.Node")).unwrap();
    b.register(
        TypeDef::class("app.Holder")
            .field(FieldDef::reference("first"))
            .field(FieldDef::reference("second"))
            .field(FieldDef::reference("items"))
            .field(FieldDef::reference("hidden").access(Accessibility::Sealed)),
    )
    .unwrap();
    b.register(
        TypeDef::class("app.Task")
            .capability(Capability::Runnable)
            .field(FieldDef::int("priority")),
    )
    .unwrap();
    b.register(TypeDef::class("io.fs.Path").field(FieldDef::reference("raw")))
        .unwrap();
    b.register(TypeDef::class("sync.Lock")).unwrap();
    b.register(TypeDef::class("sync.FairLock").extends("sync.Lock")).unwrap();
    b.register(TypeDef::class("os.FileHandle").layout(Layout::Native))
        .unwrap();
    b.register(TypeDef::factory_only("net.Session").field(FieldDef::int("epoch")))
        .unwrap();
    b.register(
        TypeDef::abstract_type("index.Reader")
            .field(FieldDef::reference("parentReaders"))
            .field(FieldDef::reference("segment")),
    )
    .unwrap();
    b.register(TypeDef::class("index.LeafReader").extends("index.Reader"))
        .unwrap();
    b.register(TypeDef::class("index.Segment").field(FieldDef::int("docs")))
        .unwrap();
    Arc::new(b.build())
}

fn heap() -> ObjectHeap {
    ObjectHeap::new(registry())
}

fn obj(value: Value) -> ObjectId {
    value.as_object().expect("expected an object reference")
}

fn field_obj(heap: &ObjectHeap, id: ObjectId, name: &str) -> ObjectId {
    obj(heap.field(id, name).unwrap())
}

fn default_engine() -> CloneEngine {
    CloneEngine::new(PolicyRegistry::with_defaults())
}

// ─────────────────────────────────────────────────────────────────────────────
// SCENARIO TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_self_peer_and_exempt_tag() {
    let mut heap = heap();
    let tag = heap.new_text("x").unwrap();
    let r = heap
        .new_object("app.Resource", &[("tag", Value::Ref(tag))])
        .unwrap();
    heap.set_field(r, "peer", Value::Ref(r)).unwrap();

    let graph = default_engine().clone_graph(&mut heap, Value::Ref(r)).unwrap();
    let r2 = obj(graph.root);

    assert_ne!(r2, r);
    assert_eq!(field_obj(&heap, r2, "peer"), r2);
    assert_eq!(field_obj(&heap, r2, "tag"), tag);
    // Original untouched
    assert_eq!(field_obj(&heap, r, "peer"), r);
}

#[test]
fn test_reader_hook_resets_parent_readers() {
    let mut heap = heap();
    let stale = heap.new_object("app.Node", &[]).unwrap();
    let parents = heap
        .new_collection(builtin::WEAK_SET, vec![Value::Ref(stale)])
        .unwrap();
    let segment = heap
        .new_object("index.Segment", &[("docs", Value::Int(40))])
        .unwrap();
    let reader = heap
        .new_object(
            "index.LeafReader",
            &[("parentReaders", Value::Ref(parents)), ("segment", Value::Ref(segment))],
        )
        .unwrap();

    let engine = CloneEngine::builder()
        .policy(PolicyRegistry::with_defaults())
        .hook(ResetFieldsHook::new(["parentReaders"]).into_override("index.Reader"))
        .build();
    let graph = engine.clone_graph(&mut heap, Value::Ref(reader)).unwrap();
    let reader2 = obj(graph.root);

    let parents2 = field_obj(&heap, reader2, "parentReaders");
    assert_ne!(parents2, parents);
    assert_eq!(heap.type_of(parents2).unwrap(), heap.type_of(parents).unwrap());
    assert!(heap.elements(parents2).unwrap().is_empty());
    assert_eq!(heap.elements(parents).unwrap(), &[Value::Ref(stale)]);

    let segment2 = field_obj(&heap, reader2, "segment");
    assert_ne!(segment2, segment);
    assert_eq!(heap.field(segment2, "docs").unwrap(), Value::Int(40));
    assert_eq!(graph.clone_of(reader), Some(reader2));
}

#[test]
fn test_policy_reset_field_without_hook() {
    let mut heap = heap();
    let stale = heap.new_object("app.Node", &[]).unwrap();
    let parents = heap
        .new_collection(builtin::SET, vec![Value::Ref(stale)])
        .unwrap();
    let node = heap
        .new_object("app.Node", &[("other", Value::Ref(parents))])
        .unwrap();

    let mut policy = PolicyRegistry::with_defaults();
    policy.reset_field(ResetField::on("app.Node", "other"));
    let engine = CloneEngine::new(policy);
    let graph = engine.clone_graph(&mut heap, Value::Ref(node)).unwrap();

    let parents2 = field_obj(&heap, obj(graph.root), "other");
    assert_ne!(parents2, parents);
    assert!(heap.elements(parents2).unwrap().is_empty());
    assert_eq!(graph.stats.fields_reset, 1);
    assert!(graph.clone_of(stale).is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// IDENTITY TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_shared_reference_cloned_once() {
    let mut heap = heap();
    let c = heap.new_object("app.Node", &[("value", Value::Int(9))]).unwrap();
    let a = heap.new_object("app.Node", &[("next", Value::Ref(c))]).unwrap();
    let b = heap.new_object("app.Node", &[("next", Value::Ref(c))]).unwrap();
    let holder = heap
        .new_object("app.Holder", &[("first", Value::Ref(a)), ("second", Value::Ref(b))])
        .unwrap();

    let graph = default_engine()
        .clone_graph(&mut heap, Value::Ref(holder))
        .unwrap();
    let holder2 = obj(graph.root);
    let a2 = field_obj(&heap, holder2, "first");
    let b2 = field_obj(&heap, holder2, "second");
    let c_via_a = field_obj(&heap, a2, "next");
    let c_via_b = field_obj(&heap, b2, "next");

    assert_eq!(c_via_a, c_via_b);
    assert_ne!(c_via_a, c);
    assert_eq!(heap.field(c_via_a, "value").unwrap(), Value::Int(9));
    assert_eq!(graph.stats.objects_cloned, 4);
}

#[test]
fn test_two_cycle() {
    let mut heap = heap();
    let a = heap.new_object("app.Node", &[("value", Value::Int(1))]).unwrap();
    let b = heap
        .new_object("app.Node", &[("value", Value::Int(2)), ("next", Value::Ref(a))])
        .unwrap();
    heap.set_field(a, "next", Value::Ref(b)).unwrap();

    let graph = default_engine().clone_graph(&mut heap, Value::Ref(a)).unwrap();
    let a2 = obj(graph.root);
    let b2 = field_obj(&heap, a2, "next");

    assert_ne!(b2, b);
    assert_eq!(field_obj(&heap, b2, "next"), a2);
    assert_eq!(heap.field(b2, "value").unwrap(), Value::Int(2));
    assert_eq!(graph.clones.len(), 2);
}

#[test]
fn test_deep_chain_does_not_overflow() {
    let mut heap = heap();
    let mut head = Value::Null;
    for i in 0..100_000 {
        let node = heap
            .new_object("app.Node", &[("value", Value::Int(i)), ("next", head)])
            .unwrap();
        head = Value::Ref(node);
    }

    let graph = default_engine().clone_graph(&mut heap, head).unwrap();
    assert_eq!(graph.stats.objects_cloned, 100_000);

    let mut cursor = graph.root;
    let mut steps = 0;
    while let Some(id) = cursor.as_object() {
        assert!(graph.clone_of(id).is_none(), "clone chain must not reach originals");
        cursor = heap.field(id, "next").unwrap();
        steps += 1;
    }
    assert_eq!(steps, 100_000);
}

#[test]
fn test_collections_cloned_elementwise() {
    let mut heap = heap();
    let node = heap.new_object("app.Node", &[]).unwrap();
    let text = heap.new_text("k").unwrap();
    let list = heap
        .new_collection(builtin::LIST, vec![Value::Ref(node), Value::Int(3), Value::Ref(node)])
        .unwrap();
    let map = heap
        .new_map(builtin::MAP, vec![(Value::Ref(text), Value::Ref(list))])
        .unwrap();
    let holder = heap
        .new_object("app.Holder", &[("items", Value::Ref(map))])
        .unwrap();

    let graph = default_engine()
        .clone_graph(&mut heap, Value::Ref(holder))
        .unwrap();
    let map2 = field_obj(&heap, obj(graph.root), "items");
    assert_ne!(map2, map);

    let node2 = graph.clone_of(node).unwrap();
    let list2 = graph.clone_of(list).unwrap();
    assert_eq!(
        heap.elements(list2).unwrap(),
        &[Value::Ref(node2), Value::Int(3), Value::Ref(node2)]
    );
    assert_eq!(
        heap.payload(map2).unwrap(),
        &clone_kernel::Payload::Entries(vec![(Value::Ref(text), Value::Ref(list2))])
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// EXEMPTION TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_type_family_and_capability_aliasing() {
    let mut heap = heap();
    let lock = heap.new_object("sync.FairLock", &[]).unwrap();
    let task = heap.new_object("app.Task", &[("priority", Value::Int(5))]).unwrap();
    let holder = heap
        .new_object("app.Holder", &[("first", Value::Ref(lock)), ("second", Value::Ref(task))])
        .unwrap();

    let mut policy = PolicyRegistry::with_defaults();
    policy.exempt_type_family("sync.Lock");
    let graph = CloneEngine::new(policy)
        .clone_graph(&mut heap, Value::Ref(holder))
        .unwrap();
    let holder2 = obj(graph.root);

    assert_eq!(field_obj(&heap, holder2, "first"), lock);
    assert_eq!(field_obj(&heap, holder2, "second"), task);
    assert_eq!(graph.stats.aliased, 2);
}

#[test]
fn test_field_value_rules_alias() {
    let mut heap = heap();
    let path = heap.new_object("io.fs.Path", &[]).unwrap();
    let node = heap.new_object("app.Node", &[("next", Value::Ref(path))]).unwrap();

    let mut policy = PolicyRegistry::with_defaults();
    policy
        .add_value_rule(ValueRule::NamespacePrefix {
            prefix: "io.fs.".to_string(),
        })
        .unwrap();
    let graph = CloneEngine::new(policy)
        .clone_graph(&mut heap, Value::Ref(node))
        .unwrap();

    assert_eq!(field_obj(&heap, obj(graph.root), "next"), path);

    // Without the rule the path is copied
    let graph = default_engine().clone_graph(&mut heap, Value::Ref(node)).unwrap();
    assert_ne!(field_obj(&heap, obj(graph.root), "next"), path);
}

#[test]
fn test_native_values_aliased() {
    let mut heap = heap();
    let fd = heap.new_native("os.FileHandle", 7).unwrap();
    let list = heap.new_collection(builtin::LIST, vec![Value::Ref(fd)]).unwrap();
    let node = heap
        .new_object("app.Node", &[("next", Value::Ref(fd)), ("other", Value::Ref(list))])
        .unwrap();

    let graph = CloneEngine::new(PolicyRegistry::new())
        .clone_graph(&mut heap, Value::Ref(node))
        .unwrap();
    let node2 = obj(graph.root);

    assert_eq!(field_obj(&heap, node2, "next"), fd);
    let list2 = field_obj(&heap, node2, "other");
    assert_eq!(heap.elements(list2).unwrap(), &[Value::Ref(fd)]);
}

#[test]
fn test_exempt_root_returned_as_is() {
    let mut heap = heap();
    let task = heap.new_object("app.Task", &[]).unwrap();

    let graph = default_engine().clone_graph(&mut heap, Value::Ref(task)).unwrap();
    assert_eq!(graph.root, Value::Ref(task));
    assert_eq!(graph.stats.objects_cloned, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// OVERRIDE HOOK TESTS
// ─────────────────────────────────────────────────────────────────────────────

/// Replaces every task with a copy whose priority is bumped.
struct BumpPriority;

impl CloneHook for BumpPriority {
    fn clone_object(
        &self,
        cx: &mut CloneContext<'_>,
        original: ObjectId,
    ) -> Result<HandleResult, HookError> {
        let priority = cx.heap().field(original, "priority")?;
        let Value::Int(p) = priority else {
            return Err(HookError::Failed("priority is not an int".to_string()));
        };
        let clone = cx.blank_like(original)?;
        cx.record(original, clone);
        cx.heap_mut().set_field(clone, "priority", Value::Int(p + 1))?;
        Ok(HandleResult::ReplaceObject(clone))
    }
}

#[test]
fn test_hook_overrides_exemption() {
    let mut heap = heap();
    let task = heap.new_object("app.Task", &[("priority", Value::Int(1))]).unwrap();
    let holder = heap
        .new_object("app.Holder", &[("first", Value::Ref(task)), ("second", Value::Ref(task))])
        .unwrap();

    let engine = CloneEngine::builder()
        .policy(PolicyRegistry::with_defaults())
        .hook(OverrideHook::for_subtypes_of("app.Task", BumpPriority))
        .build();
    let graph = engine.clone_graph(&mut heap, Value::Ref(holder)).unwrap();
    let holder2 = obj(graph.root);
    let task2 = field_obj(&heap, holder2, "first");

    assert_ne!(task2, task);
    assert_eq!(field_obj(&heap, holder2, "second"), task2);
    assert_eq!(heap.field(task2, "priority").unwrap(), Value::Int(2));
    assert_eq!(graph.stats.hook_replacements, 1);
}

#[test]
fn test_hook_use_default_keeps_exemption() {
    let mut heap = heap();
    let task = heap.new_object("app.Task", &[]).unwrap();
    let holder = heap
        .new_object("app.Holder", &[("first", Value::Ref(task))])
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let engine = CloneEngine::builder()
        .policy(PolicyRegistry::with_defaults())
        .hook(OverrideHook::from_fn(TypeMatcher::subtype_of("app.Task"), move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(HandleResult::UseDefault)
        }))
        .build();
    let graph = engine.clone_graph(&mut heap, Value::Ref(holder)).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(field_obj(&heap, obj(graph.root), "first"), task);
}

#[test]
fn test_hook_use_default_keeps_field_value_rule() {
    let mut heap = heap();
    let path = heap.new_object("io.fs.Path", &[]).unwrap();
    let holder = heap
        .new_object("app.Holder", &[("first", Value::Ref(path))])
        .unwrap();
    let mut policy = PolicyRegistry::with_defaults();
    policy
        .add_value_rule(ValueRule::NamespacePrefix {
            prefix: "io.fs.".to_string(),
        })
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let engine = CloneEngine::builder()
        .policy(policy)
        .hook(OverrideHook::from_fn(TypeMatcher::subtype_of("io.fs.Path"), move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(HandleResult::UseDefault)
        }))
        .build();
    let graph = engine.clone_graph(&mut heap, Value::Ref(holder)).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(field_obj(&heap, obj(graph.root), "first"), path);
    assert!(graph.clone_of(path).is_none());
}

#[test]
fn test_failing_hook_keeps_field_value_rule() {
    let mut heap = heap();
    let path = heap.new_object("io.fs.Path", &[]).unwrap();
    let holder = heap
        .new_object("app.Holder", &[("first", Value::Ref(path)), ("second", Value::Ref(path))])
        .unwrap();
    let mut policy = PolicyRegistry::with_defaults();
    policy
        .add_value_rule(ValueRule::SubtypeOf {
            type_name: "io.fs.Path".to_string(),
        })
        .unwrap();

    let engine = CloneEngine::builder()
        .policy(policy)
        .hook(OverrideHook::from_fn(TypeMatcher::exact("io.fs.Path"), |_, _| {
            Err(HookError::Failed("unsupported".to_string()))
        }))
        .build();
    let graph = engine.clone_graph(&mut heap, Value::Ref(holder)).unwrap();
    let holder2 = obj(graph.root);

    assert_eq!(field_obj(&heap, holder2, "first"), path);
    assert_eq!(field_obj(&heap, holder2, "second"), path);
    assert_eq!(graph.stats.hook_failures, 2);
    assert_eq!(graph.stats.objects_cloned, 1);
}

#[test]
fn test_failing_hook_falls_back_to_generic() {
    let mut heap = heap();
    let leaf = heap.new_object("app.Leaf", &[("value", Value::Int(8))]).unwrap();
    heap.set_field(leaf, "next", Value::Ref(leaf)).unwrap();

    let engine = CloneEngine::builder()
        .policy(PolicyRegistry::with_defaults())
        .hook(OverrideHook::from_fn(TypeMatcher::subtype_of("app.Node"), |cx, original| {
            // Record a partial clone, then fail.
            let partial = cx.blank_like(original)?;
            cx.record(original, partial);
            Err(HookError::Failed("boom".to_string()))
        }))
        .build();
    let graph = engine.clone_graph(&mut heap, Value::Ref(leaf)).unwrap();
    let leaf2 = obj(graph.root);

    assert_ne!(leaf2, leaf);
    assert_eq!(field_obj(&heap, leaf2, "next"), leaf2);
    assert_eq!(heap.field(leaf2, "value").unwrap(), Value::Int(8));
    assert_eq!(graph.stats.hook_failures, 1);
    assert_eq!(graph.clone_of(leaf), Some(leaf2));
}

/// Replaces the `value` field of every node with zero.
struct ZeroValues;

impl CloneHook for ZeroValues {
    fn clone_object(
        &self,
        _cx: &mut CloneContext<'_>,
        _original: ObjectId,
    ) -> Result<HandleResult, HookError> {
        Ok(HandleResult::UseDefault)
    }

    fn clone_field(
        &self,
        _cx: &mut CloneContext<'_>,
        _owner: ObjectId,
        field: &clone_kernel::FieldDescriptor,
        _value: Value,
    ) -> Result<HandleResult, HookError> {
        if field.name == "value" {
            Ok(HandleResult::ReplaceField(Value::Int(0)))
        } else {
            Ok(HandleResult::UseDefault)
        }
    }
}

#[test]
fn test_field_granularity_hook() {
    let mut heap = heap();
    let next = heap.new_object("app.Node", &[("value", Value::Int(3))]).unwrap();
    let node = heap
        .new_object("app.Node", &[("value", Value::Int(5)), ("next", Value::Ref(next))])
        .unwrap();

    let engine = CloneEngine::builder()
        .hook(OverrideHook::for_subtypes_of("app.Node", ZeroValues))
        .build();
    let graph = engine.clone_graph(&mut heap, Value::Ref(node)).unwrap();
    let node2 = obj(graph.root);
    let next2 = field_obj(&heap, node2, "next");

    assert_eq!(heap.field(node2, "value").unwrap(), Value::Int(0));
    assert_eq!(heap.field(next2, "value").unwrap(), Value::Int(0));
    assert_ne!(next2, next);
    // Originals untouched
    assert_eq!(heap.field(node, "value").unwrap(), Value::Int(5));
}

// ─────────────────────────────────────────────────────────────────────────────
// DEGRADED-PATH TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sealed_field_keeps_zero_value() {
    let mut heap = heap();
    let secret = heap.new_object("app.Node", &[]).unwrap();
    let holder = heap
        .new_object("app.Holder", &[("hidden", Value::Ref(secret))])
        .unwrap();

    let graph = default_engine()
        .clone_graph(&mut heap, Value::Ref(holder))
        .unwrap();

    assert_eq!(heap.field(obj(graph.root), "hidden").unwrap(), Value::Null);
    assert_eq!(graph.stats.access_denied, 1);
}

#[test]
fn test_non_instantiable_child_aliased() {
    let mut heap = heap();
    let session = heap.new_object("net.Session", &[("epoch", Value::Int(2))]).unwrap();
    let node = heap.new_object("app.Node", &[("next", Value::Ref(session))]).unwrap();

    let graph = default_engine().clone_graph(&mut heap, Value::Ref(node)).unwrap();

    assert_eq!(field_obj(&heap, obj(graph.root), "next"), session);
    assert_eq!(graph.stats.instantiation_fallbacks, 1);
}

#[test]
fn test_non_instantiable_child_fails_when_configured() {
    let mut heap = heap();
    let session = heap.new_object("net.Session", &[]).unwrap();
    let node = heap.new_object("app.Node", &[("next", Value::Ref(session))]).unwrap();

    let engine = CloneEngine::builder()
        .policy(PolicyRegistry::with_defaults())
        .alias_on_instantiation_failure(false)
        .build();
    let err = engine.clone_graph(&mut heap, Value::Ref(node)).unwrap_err();

    assert!(matches!(err, CloneError::Heap(HeapError::NotInstantiable { .. })));
}

#[test]
fn test_policy_reset_of_non_instantiable_value_clears_field() {
    let mut heap = heap();
    let session = heap.new_object("net.Session", &[]).unwrap();
    let node = heap.new_object("app.Node", &[("next", Value::Ref(session))]).unwrap();

    let mut policy = PolicyRegistry::with_defaults();
    policy.reset_field(ResetField::named("next"));
    let graph = CloneEngine::new(policy)
        .clone_graph(&mut heap, Value::Ref(node))
        .unwrap();

    assert_eq!(heap.field(obj(graph.root), "next").unwrap(), Value::Null);
    assert_eq!(graph.stats.instantiation_fallbacks, 1);
    assert_eq!(field_obj(&heap, node, "next"), session);
}

#[test]
fn test_reader_hook_reset_of_non_instantiable_value_clears_field() {
    let mut heap = heap();
    let session = heap.new_object("net.Session", &[]).unwrap();
    let reader = heap
        .new_object("index.LeafReader", &[("parentReaders", Value::Ref(session))])
        .unwrap();

    let engine = CloneEngine::builder()
        .policy(PolicyRegistry::with_defaults())
        .hook(ResetFieldsHook::new(["parentReaders"]).into_override("index.Reader"))
        .build();
    let graph = engine.clone_graph(&mut heap, Value::Ref(reader)).unwrap();

    assert_eq!(heap.field(obj(graph.root), "parentReaders").unwrap(), Value::Null);
    assert_eq!(graph.stats.hook_replacements, 1);
    assert_eq!(graph.stats.hook_failures, 0);
    assert_eq!(graph.stats.instantiation_fallbacks, 1);
}

#[test]
fn test_non_instantiable_root_is_error() {
    let mut heap = heap();
    let session = heap.new_object("net.Session", &[]).unwrap();

    let err = default_engine()
        .clone_graph(&mut heap, Value::Ref(session))
        .unwrap_err();
    assert!(matches!(err, CloneError::RootInstantiation { id, .. } if id == session));
}

#[test]
fn test_statics_untouched() {
    let mut heap = heap();
    heap.set_static("app.Node", "instances", Value::Int(11)).unwrap();
    let node = heap.new_object("app.Node", &[]).unwrap();

    default_engine().clone_graph(&mut heap, Value::Ref(node)).unwrap();
    assert_eq!(heap.static_value("app.Node", "instances").unwrap(), Value::Int(11));
}

// ─────────────────────────────────────────────────────────────────────────────
// DETERMINISM TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_clone_of_clone_has_same_shape() {
    let mut heap = heap();
    let tag = heap.new_text("t").unwrap();
    let task = heap.new_object("app.Task", &[]).unwrap();
    let a = heap
        .new_object("app.Resource", &[("tag", Value::Ref(tag))])
        .unwrap();
    let list = heap
        .new_collection(builtin::LIST, vec![Value::Ref(a), Value::Ref(task)])
        .unwrap();
    let holder = heap
        .new_object(
            "app.Holder",
            &[("first", Value::Ref(a)), ("second", Value::Ref(task)), ("items", Value::Ref(list))],
        )
        .unwrap();
    heap.set_field(a, "peer", Value::Ref(holder)).unwrap();

    let engine = default_engine();
    let first = engine.clone_graph(&mut heap, Value::Ref(holder)).unwrap();
    let second = engine.clone_graph(&mut heap, first.root).unwrap();

    let original = shape_fingerprint(&heap, Value::Ref(holder)).unwrap();
    assert_eq!(shape_fingerprint(&heap, first.root).unwrap(), original);
    assert_eq!(shape_fingerprint(&heap, second.root).unwrap(), original);
    assert_eq!(first.stats, second.stats);
}

#[test]
fn test_concurrent_passes_share_engine() {
    let engine = default_engine();
    let types = registry();

    std::thread::scope(|scope| {
        for n in 0..4 {
            let engine = &engine;
            let types = Arc::clone(&types);
            scope.spawn(move || {
                let mut heap = ObjectHeap::new(types);
                let a = heap.new_object("app.Node", &[("value", Value::Int(n))]).unwrap();
                heap.set_field(a, "next", Value::Ref(a)).unwrap();

                let graph = engine.clone_graph(&mut heap, Value::Ref(a)).unwrap();
                let a2 = obj(graph.root);
                assert_eq!(field_obj(&heap, a2, "next"), a2);
                assert_eq!(heap.field(a2, "value").unwrap(), Value::Int(n));
            });
        }
    });
}

#[test]
fn test_engine_from_config() {
    let config = CloneConfig::from_json(
        r#"{
            "exempt_type_families": ["sync.Lock"],
            "reset_hooks": [{ "type_name": "index.Reader", "fields": ["parentReaders"] }]
        }"#,
    )
    .unwrap();
    let engine = config.build_engine().unwrap();

    let mut heap = heap();
    let lock = heap.new_object("sync.Lock", &[]).unwrap();
    let parents = heap.new_collection(builtin::WEAK_SET, vec![Value::Ref(lock)]).unwrap();
    let reader = heap
        .new_object("index.LeafReader", &[("parentReaders", Value::Ref(parents))])
        .unwrap();
    let holder = heap
        .new_object("app.Holder", &[("first", Value::Ref(reader)), ("second", Value::Ref(lock))])
        .unwrap();

    let graph = engine.clone_graph(&mut heap, Value::Ref(holder)).unwrap();
    let holder2 = obj(graph.root);
    let reader2 = field_obj(&heap, holder2, "first");

    assert_eq!(field_obj(&heap, holder2, "second"), lock);
    assert!(heap.elements(field_obj(&heap, reader2, "parentReaders")).unwrap().is_empty());
}
