use super::*;
use serde_json::json;
use shared::{
    domain::{ItemRole, SelectionRange},
    mode::SetDataItem,
};

use crate::{
    action::{
        crud::{crud_action_route, register_crud_actions, SET_DATA, UPDATE},
        resolve_action, StepResult,
    },
    admin::{register_admin, top_action_route, EntityAdmin, FieldDefinition},
    delegate::Delegate,
    model_context::{resolve_model_context, ModelContextRef},
    proxy::ListModelProxy,
    session::MemorySession,
    value::{bind_object, Entity, PersistenceState},
};

fn admin() -> EntityAdmin {
    EntityAdmin::new("a", "a")
        .field(FieldDefinition::new("x", Delegate::Integer))
        .list_action(Arc::new(InsertObject))
        .list_action(Arc::new(DeleteSelection))
        .list_action(Arc::new(ApplyFilter))
}

fn numbered(count: i64) -> Vec<ObjectRef> {
    (0..count)
        .map(|x| Entity::build("a", [("x", Value::Int(x))]))
        .collect()
}

fn table(admin: EntityAdmin, objects: Vec<ObjectRef>) -> (Arc<NamingContext>, ModelContextRef) {
    let root = NamingContext::initial();
    register_crud_actions(&root).expect("crud actions");
    let admin: AdminRef = Arc::new(admin);
    let route = register_admin(&root, admin.clone()).expect("admin");
    let mut mc = ModelContext::new(
        admin.clone(),
        route,
        Box::new(ListModelProxy::new(objects)),
    );
    mc.static_field_attributes = admin
        .get_columns()
        .iter()
        .map(|field| admin.get_static_field_attributes(field).expect("attributes"))
        .collect();
    (root, mc.into_ref())
}

fn drain(generator: &mut Box<dyn StepGenerator>) -> Vec<ActionStep> {
    let mut steps = Vec::new();
    while let Some(step) = generator.resume(Resume::Next).expect("step") {
        steps.push(step);
    }
    steps
}

fn run(
    root: &Arc<NamingContext>,
    action: &dyn Action,
    model_context: &ModelContextRef,
    mode: serde_json::Value,
) -> Vec<ActionStep> {
    let mut generator = action
        .model_run(root, ActionContext::Model(model_context.clone()), mode)
        .expect("model_run");
    drain(&mut generator)
}

fn run_crud(
    root: &Arc<NamingContext>,
    action: &str,
    model_context: &ModelContextRef,
    mode: serde_json::Value,
) -> Vec<ActionStep> {
    let action = resolve_action(root, &crud_action_route(action)).expect("action");
    run(root, action.as_ref(), model_context, mode)
}

#[test]
fn insert_then_edit_the_new_row() {
    let (root, mc) = table(admin(), numbered(3));
    let steps = run(&root, &InsertObject, &mc, serde_json::Value::Null);
    assert_eq!(steps.len(), 2);
    let ActionStep::Created(created) = &steps[0] else {
        panic!("expected created rows");
    };
    let header = created.changed_ranges[0].header.clone().expect("header");
    assert_eq!(created.changed_ranges[0].row, 3);
    assert_eq!(steps[1], ActionStep::RowCount(step::RowCount { rows: 4 }));
    assert_eq!(lock(&mc).proxy.len().expect("len"), 4);

    let id = header.object_id.expect("object id");
    let item = SetDataItem {
        row: 3,
        object_id: id,
        column: 0,
        value: json!(5),
    };
    let steps = run_crud(&root, SET_DATA, &mc, json!([item]));
    let ActionStep::CreateUpdateDelete(changes) = &steps[0] else {
        panic!("expected a change notification");
    };
    assert_eq!(changes.objects_updated.len(), 1);

    let steps = run_crud(&root, UPDATE, &mc, json!(changes.objects_updated));
    let ActionStep::Update(update) = &steps[0] else {
        panic!("expected an update");
    };
    assert_eq!(update.changed_ranges[0].row, 3);
    assert_eq!(
        update.changed_ranges[0].cells[0].role(ItemRole::Edit),
        Some(&json!(5))
    );
}

#[test]
fn insert_applies_defaults() {
    let admin = admin().defaults(|obj| {
        obj.set("x", Value::Int(42));
        true
    });
    let (root, mc) = table(admin, Vec::new());
    run(&root, &InsertObject, &mc, serde_json::Value::Null);
    let obj = lock(&mc).object_at(0).expect("row").expect("object");
    assert_eq!(obj.get("x"), Value::Int(42));
}

#[test]
fn delete_is_enabled_by_a_selection() {
    let (_, mc) = table(admin(), numbered(3));
    assert!(!DeleteSelection.get_state(None).enabled);
    let mut guard = lock(&mc);
    assert!(!DeleteSelection.get_state(Some(&*guard)).enabled);
    guard.selection_count = 1;
    assert!(DeleteSelection.get_state(Some(&*guard)).enabled);
}

#[test]
fn confirmed_delete_removes_the_selection() {
    let objects = numbered(3);
    let (root, mc) = table(admin(), objects.clone());
    {
        let mut guard = lock(&mc);
        guard.selected_rows = vec![SelectionRange::new(0, 1)];
        guard.selection_count = 2;
    }
    let mut generator = DeleteSelection
        .model_run(&root, ActionContext::Model(mc.clone()), serde_json::Value::Null)
        .expect("model_run");

    let question = generator.resume(Resume::Next).expect("step").expect("question");
    let ActionStep::MessageBox(message) = &question else {
        panic!("expected a confirmation");
    };
    assert_eq!(message.text, "Delete 2 as?");
    assert!(question.blocking());

    let changes = generator
        .resume(Resume::Send(StepResult::Button(StandardButton::Yes)))
        .expect("step")
        .expect("changes");
    let ActionStep::CreateUpdateDelete(changes) = changes else {
        panic!("expected a change notification");
    };
    assert_eq!(
        changes.objects_deleted,
        vec![
            bind_object(&root, &objects[0]).expect("name"),
            bind_object(&root, &objects[1]).expect("name"),
        ]
    );
    assert_eq!(
        generator.resume(Resume::Next).expect("step"),
        Some(ActionStep::RowCount(step::RowCount { rows: 1 }))
    );
    assert_eq!(generator.resume(Resume::Next).expect("step"), None);

    assert_eq!(objects[0].state(), PersistenceState::Deleted);
    let guard = lock(&mc);
    assert!(guard.selected_rows.is_empty());
    assert_eq!(guard.selection_count, 0);
}

#[test]
fn declined_delete_keeps_everything() {
    let (root, mc) = table(admin(), numbered(3));
    lock(&mc).selected_rows = vec![SelectionRange::new(2, 2)];
    let mut generator = DeleteSelection
        .model_run(&root, ActionContext::Model(mc.clone()), serde_json::Value::Null)
        .expect("model_run");
    generator.resume(Resume::Next).expect("question");
    let next = generator
        .resume(Resume::Send(StepResult::Button(StandardButton::No)))
        .expect("step");
    assert_eq!(next, None);
    assert_eq!(lock(&mc).proxy.len().expect("len"), 3);
}

#[test]
fn delete_without_selection_does_nothing() {
    let (root, mc) = table(admin(), numbered(2));
    assert!(run(&root, &DeleteSelection, &mc, serde_json::Value::Null).is_empty());
}

#[test]
fn delete_propagates_thrown_errors() {
    let (root, mc) = table(admin(), numbered(2));
    lock(&mc).selected_rows = vec![SelectionRange::new(0, 0)];
    let mut generator = DeleteSelection
        .model_run(&root, ActionContext::Model(mc.clone()), serde_json::Value::Null)
        .expect("model_run");
    generator.resume(Resume::Next).expect("question");
    assert!(matches!(
        generator.resume(Resume::Throw(ActionError::Cancel)),
        Err(ActionError::Cancel)
    ));
    assert_eq!(lock(&mc).proxy.len().expect("len"), 2);
}

fn person(first_name: &str, last_name: &str) -> ObjectRef {
    Entity::build(
        "person",
        [
            ("first_name", Value::from(first_name)),
            ("last_name", Value::from(last_name)),
        ],
    )
}

fn people() -> EntityAdmin {
    let session = Arc::new(MemorySession::new().with_default_order("person", &["last_name"]));
    session
        .add_all(&[
            person("Stanley", "Kubrick"),
            person("Alfred", "Hitchcock"),
            person("Agnes", "Varda"),
        ])
        .expect("fixtures");
    EntityAdmin::new("person", "person")
        .field(FieldDefinition::new("id", Delegate::Integer).storage_key())
        .field(FieldDefinition::new("first_name", Delegate::text()))
        .field(FieldDefinition::new("last_name", Delegate::text()))
        .session(session.clone())
        .query_source(session)
        .list_action(Arc::new(ApplyFilter))
}

fn query_table() -> (Arc<NamingContext>, ModelContextRef) {
    let root = NamingContext::initial();
    let admin: AdminRef = Arc::new(people());
    let route = register_admin(&root, admin.clone()).expect("admin");
    let mc = ModelContext::new(admin.clone(), route, admin.get_proxy());
    (root, mc.into_ref())
}

#[test]
fn filter_on_primary_key() {
    let (root, mc) = query_table();
    let steps = run(
        &root,
        &ApplyFilter,
        &mc,
        json!({"field": "id", "operator": "eq", "value": 1}),
    );
    assert_eq!(steps, vec![ActionStep::RowCount(step::RowCount { rows: 1 })]);
    let mut guard = lock(&mc);
    let rows = guard.proxy.get(0..1).expect("rows");
    assert_eq!(rows[0].get("first_name"), Value::from("Stanley"));
}

#[test]
fn clearing_a_filter_restores_the_rows() {
    let (root, mc) = query_table();
    run(
        &root,
        &ApplyFilter,
        &mc,
        json!({"field": "last_name", "operator": "starts_with", "value": "K"}),
    );
    assert_eq!(lock(&mc).proxy.len().expect("len"), 1);
    let steps = run(
        &root,
        &ApplyFilter,
        &mc,
        json!({"field": "last_name", "operator": "starts_with", "clear": true}),
    );
    assert_eq!(steps, vec![ActionStep::RowCount(step::RowCount { rows: 3 })]);
    assert_eq!(lock(&mc).collection_count, 3);
}

#[test]
fn filter_with_unconvertible_value_fails() {
    let (root, mc) = query_table();
    let mut generator = ApplyFilter
        .model_run(
            &root,
            ActionContext::Model(mc),
            json!({"field": "id", "operator": "eq", "value": "one"}),
        )
        .expect("model_run");
    assert!(matches!(
        generator.resume(Resume::Next),
        Err(ActionError::InvalidMode { .. })
    ));
}

#[test]
fn open_table_view_binds_a_model_context() {
    let root = NamingContext::initial();
    let admin: AdminRef = Arc::new(people());
    let route = register_admin(&root, admin).expect("admin");
    let action = resolve_action(&root, &top_action_route(&route, OPEN_TABLE_VIEW)).expect("action");
    assert_eq!(action.verbose_name().as_deref(), Some("Persons"));

    let mut generator = action
        .model_run(&root, ActionContext::Empty, serde_json::Value::Null)
        .expect("model_run");
    let steps = drain(&mut generator);
    let ActionStep::OpenTableView(view) = &steps[0] else {
        panic!("expected a table view");
    };
    assert_eq!(view.admin_route, route);
    assert_eq!(view.columns, vec!["id", "first_name", "last_name"]);
    assert_eq!(
        view.list_actions,
        vec![list_action_route(&route, APPLY_FILTER)]
    );

    let mc = resolve_model_context(&root, &view.model_context).expect("model context");
    let mut guard = lock(&mc);
    assert_eq!(guard.static_field_attributes.len(), 3);
    assert_eq!(guard.proxy.len().expect("len"), 3);
}
