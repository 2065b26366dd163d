use super::*;

fn name<const N: usize>(segments: [&str; N]) -> Name {
    Name::from(segments)
}

#[test]
fn initial_context_is_named_root() {
    let root = NamingContext::initial();
    assert_eq!(root.name().expect("root name"), &Name::root());
    assert!(root.list().contains(&CONSTANT.to_string()));
}

#[test]
fn bind_returns_qualified_name_and_resolves() {
    let root = NamingContext::initial();
    let bound = root
        .bind(&name(["admin", "person"]), Arc::new(42_i64))
        .expect("bind");
    assert_eq!(bound, name(["admin", "person"]));
    let value = root.resolve_as::<i64>(&bound).expect("resolve");
    assert_eq!(*value, 42);
}

#[test]
fn binding_through_missing_context_fails() {
    let root = NamingContext::initial();
    let err = root
        .bind(&name(["nowhere", "thing"]), Arc::new(1_u8))
        .expect_err("missing intermediate context");
    assert_eq!(err, NamingError::NameNotFound(name(["nowhere"])));
}

#[test]
fn binding_through_an_object_is_name_not_found() {
    let root = NamingContext::initial();
    root.bind(&name(["admin", "leaf"]), Arc::new(1_u8))
        .expect("bind");
    let err = root
        .bind(&name(["admin", "leaf", "child"]), Arc::new(2_u8))
        .expect_err("object is not a context");
    assert!(matches!(err, NamingError::NameNotFound(_)));
}

#[test]
fn empty_names_and_segments_are_invalid() {
    let root = NamingContext::initial();
    assert!(matches!(
        root.bind(&Name::root(), Arc::new(1_u8)),
        Err(NamingError::InvalidName(_))
    ));
    assert!(matches!(
        root.resolve(&name(["admin", ""])),
        Err(NamingError::InvalidName(_))
    ));
}

#[test]
fn double_bind_is_rejected_but_rebind_replaces() {
    let root = NamingContext::initial();
    let target = name(["admin", "x"]);
    root.bind(&target, Arc::new(1_i32)).expect("bind");
    assert_eq!(
        root.bind(&target, Arc::new(2_i32)),
        Err(NamingError::AlreadyBound(target.clone()))
    );
    root.rebind(&target, Arc::new(3_i32)).expect("rebind");
    assert_eq!(*root.resolve_as::<i32>(&target).expect("resolve"), 3);
}

#[test]
fn objects_and_contexts_never_share_a_name() {
    let root = NamingContext::initial();
    root.bind_new_context(&name(["admin", "shared"]), ContextKind::Mutable)
        .expect("context");
    assert!(matches!(
        root.bind(&name(["admin", "shared"]), Arc::new(1_u8)),
        Err(NamingError::AlreadyBound(_))
    ));
}

#[test]
fn a_context_is_bound_exactly_once() {
    let root = NamingContext::initial();
    let ctx = NamingContext::new();
    let first = root
        .bind_context(&name(["admin", "one"]), ctx.clone())
        .expect("first bind");
    let err = root
        .bind_context(&name(["admin", "two"]), ctx.clone())
        .expect_err("second bind");
    assert_eq!(err, NamingError::AlreadyBound(first.clone()));
    assert_eq!(ctx.name().expect("frozen name"), &first);
}

#[test]
fn unbound_context_cannot_qualify_names() {
    let detached = NamingContext::new();
    assert_eq!(
        detached.bind(&name(["x"]), Arc::new(1_u8)),
        Err(NamingError::Unbound)
    );
}

#[test]
fn immutable_context_accepts_binds_but_refuses_changes() {
    let root = NamingContext::initial();
    let catalog = name(["crud_action", "row_count"]);
    root.bind(&catalog, Arc::new("action")).expect("bind");
    assert!(matches!(
        root.rebind(&catalog, Arc::new("other")),
        Err(NamingError::Immutable(_))
    ));
    assert!(matches!(root.unbind(&catalog), Err(NamingError::Immutable(_))));
}

#[test]
fn unbind_removes_and_second_unbind_fails() {
    let root = NamingContext::initial();
    let target = name(["model_run", "1"]);
    root.bind(&target, Arc::new(1_u8)).expect("bind");
    root.unbind(&target).expect("unbind");
    assert_eq!(root.unbind(&target), Err(NamingError::NameNotFound(target.clone())));
    assert!(matches!(root.resolve(&target), Err(NamingError::NameNotFound(_))));
}

#[test]
fn resolve_context_rejects_objects() {
    let root = NamingContext::initial();
    root.bind(&name(["admin", "plain"]), Arc::new(1_u8))
        .expect("bind");
    assert!(matches!(
        root.resolve_context(&name(["admin", "plain"])),
        Err(NamingError::ContextExpected(_))
    ));
    assert!(root.resolve_context(&name(["admin"])).is_ok());
}

#[test]
fn resolve_as_reports_wrong_type() {
    let root = NamingContext::initial();
    let target = name(["admin", "typed"]);
    root.bind(&target, Arc::new(1_u8)).expect("bind");
    assert_eq!(
        root.resolve_as::<String>(&target).map(|_| ()),
        Err(NamingError::InvalidBindingType(target))
    );
}

#[test]
fn constant_names_resolve_without_registry_slots() {
    let root = NamingContext::initial();
    let constants = root
        .resolve_context(&name([CONSTANT]))
        .expect("constant context");
    let value = serde_json::json!({ "first_name": "Stanley", "id": 1 });
    let bound = constants.bind_value(&value).expect("bind value");
    assert_eq!(bound.first(), Some(CONSTANT));
    assert_eq!(bound, constant_name(&value));
    assert!(constants.list().is_empty());
    let resolved = root
        .resolve_as::<serde_json::Value>(&bound)
        .expect("resolve");
    assert_eq!(*resolved, value);
}

#[test]
fn null_constant_is_the_null_name() {
    let root = NamingContext::initial();
    assert_eq!(constant_name(&serde_json::Value::Null), Name::null());
    let resolved = root
        .resolve_as::<serde_json::Value>(&Name::null())
        .expect("resolve null");
    assert!(resolved.is_null());
}

#[test]
fn constant_context_refuses_binds() {
    let root = NamingContext::initial();
    assert!(matches!(
        root.bind(&name([CONSTANT, "x"]), Arc::new(1_u8)),
        Err(NamingError::Immutable(_))
    ));
}

#[test]
fn object_context_holds_weak_references() {
    let root = NamingContext::initial();
    let objects = root.resolve_context(&name([OBJECT])).expect("objects");
    let obj: Bound = Arc::new(String::from("transient"));
    let bound = objects.bind_weak("7", &obj).expect("bind weak");
    assert_eq!(bound, name([OBJECT, "7"]));
    assert_eq!(
        *root.resolve_as::<String>(&bound).expect("alive"),
        "transient"
    );
    drop(obj);
    assert!(matches!(root.resolve(&bound), Err(NamingError::NameNotFound(_))));
}
