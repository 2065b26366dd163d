use super::*;
use crate::{
    admin::{EntityAdmin, FieldDefinition},
    delegate::Delegate,
    proxy::ListModelProxy,
    value::Entity,
};

fn numbered(count: i64) -> Vec<ObjectRef> {
    (0..count)
        .map(|n| Entity::build("a", [("x", Value::Int(n))]))
        .collect()
}

fn model_context(objects: Vec<ObjectRef>) -> ModelContext {
    let admin: AdminRef = Arc::new(
        EntityAdmin::new("a", "a").field(FieldDefinition::new("x", Delegate::Integer)),
    );
    ModelContext::new(
        admin,
        Name::from(["admin", "1", "a"]),
        Box::new(ListModelProxy::new(objects)),
    )
}

#[test]
fn object_at_is_none_past_the_end() {
    let objects = numbered(2);
    let mut mc = model_context(objects.clone());
    assert_eq!(
        mc.object_at(1).expect("row").map(|obj| obj.id()),
        Some(objects[1].id())
    );
    assert!(mc.object_at(2).expect("row").is_none());
}

#[test]
fn selection_iterates_ranges_in_order() {
    let objects = numbered(6);
    let mut mc = model_context(objects.clone());
    mc.selected_rows = vec![SelectionRange::new(4, 5), SelectionRange::new(1, 1)];
    let selected: Vec<_> = mc
        .selected_objects()
        .expect("selection")
        .iter()
        .map(|obj| obj.id())
        .collect();
    assert_eq!(
        selected,
        vec![objects[4].id(), objects[5].id(), objects[1].id()]
    );
}

#[test]
fn rows_at_the_end_of_the_address_space() {
    let objects = numbered(3);
    let mut mc = model_context(objects.clone());
    assert!(mc.object_at(usize::MAX).expect("row").is_none());
    mc.selected_rows = vec![SelectionRange::new(2, usize::MAX)];
    let selected = mc.selected_objects().expect("selection");
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id(), objects[2].id());
}

#[test]
fn collection_is_fetched_in_pages() {
    let objects = numbered(7);
    let mut mc = model_context(objects.clone());
    let collection = mc.collection_objects(3).expect("collection");
    assert_eq!(collection.len(), 7);
    assert!(mc.collection_objects(0).expect("zero page size").len() == 7);
}

#[test]
fn current_object_follows_the_current_row() {
    let objects = numbered(3);
    let mut mc = model_context(objects.clone());
    assert!(mc.get_object().expect("current").is_none());
    mc.current_row = Some(2);
    assert_eq!(
        mc.get_object().expect("current").map(|obj| obj.id()),
        Some(objects[2].id())
    );
}

#[test]
fn bound_contexts_resolve_to_the_same_instance() {
    let root = NamingContext::initial();
    let mc = model_context(numbered(1)).with_cache_size(10).into_ref();
    let name = bind_model_context(&root, mc.clone()).expect("bind");
    assert_eq!(name.first(), Some(MODEL_CONTEXT));
    let resolved = resolve_model_context(&root, &name).expect("resolve");
    assert!(Arc::ptr_eq(&mc, &resolved));
    assert_eq!(lock(&resolved).edit_cache.max_entries(), 10);
}

#[test]
fn field_context_writes_through_the_admin() {
    let admin: AdminRef = Arc::new(
        EntityAdmin::new("a", "a").field(FieldDefinition::new("x", Delegate::Integer)),
    );
    let obj = Entity::build("a", [("x", Value::Int(1))]);
    let mut field_context = FieldActionModelContext {
        admin: admin.clone(),
        admin_route: Name::from(["admin", "1", "a"]),
        obj: obj.clone(),
        field: "x".to_string(),
        value: Value::Int(1),
        field_attributes: admin.get_static_field_attributes("x").expect("attributes"),
        dynamic_attributes: admin.get_dynamic_field_attributes(&obj, "x"),
    };
    field_context.set_value(Value::Int(2)).expect("set");
    assert_eq!(obj.get("x"), Value::Int(2));
    assert_eq!(field_context.value, Value::Int(2));
}
