//! End-to-end table scenarios driven through the request protocol.

use std::{sync::Arc, thread, time::Duration};

use camelot_core::{
    action::{
        crud::{
            crud_action_route, register_crud_actions, COMPLETION, DELETED, ROW_DATA, SET_DATA,
            UPDATE,
        },
        bind_action, from_fn,
        list_actions::{ApplyFilter, InsertObject, APPLY_FILTER, INSERT_OBJECT, OPEN_TABLE_VIEW},
        Action, ActionContext, Resume, StepGenerator,
    },
    admin::{list_action_route, register_admin, top_action_route, AdminRef, EntityAdmin, FieldDefinition},
    delegate::Delegate,
    model_context::{bind_model_context, ModelContext},
    naming::ContextKind,
    proxy::{ListModelProxy, ModelProxy, QueryModelProxy},
    runner::ActionRunner,
    session::MemorySession,
    value::bind_object,
    worker::{Worker, WorkerSettings},
    ActionError, Entity, NamingContext, ObjectRef, Value,
};
use crossbeam_channel::{unbounded, Receiver};
use serde_json::json;
use shared::{
    domain::ItemRole,
    error::WireException,
    mode::SetDataItem,
    protocol::{AbstractRequest, AbstractResponse},
    step::{ActionStep, UpdateProgress},
    Name,
};

struct Harness {
    root: Arc<NamingContext>,
    runner: ActionRunner,
    responses: Receiver<AbstractResponse>,
}

impl Harness {
    fn new() -> Self {
        let root = NamingContext::initial();
        register_crud_actions(&root).expect("crud actions");
        let (tx, rx) = unbounded();
        Self {
            runner: ActionRunner::new(root.clone(), tx),
            root,
            responses: rx,
        }
    }

    /// Run an action to completion and return the steps it produced,
    /// without the progress brackets.
    fn initiate(&self, action: Name, model_context: &Name, mode: serde_json::Value) -> Vec<ActionStep> {
        self.runner.handle(AbstractRequest::InitiateAction {
            gui_run_name: Name::from(["gui", "1"]),
            action_name: action,
            model_context_name: model_context.clone(),
            mode,
        });
        let mut steps = Vec::new();
        for response in self.responses.try_iter() {
            match response {
                AbstractResponse::ActionStepped { step, .. } => match step {
                    ActionStep::PushProgressLevel(_) | ActionStep::PopProgressLevel => {}
                    step => steps.push(step),
                },
                AbstractResponse::ActionStopped { exception, .. } => {
                    assert!(exception.is_none(), "run failed: {exception:?}");
                }
                AbstractResponse::Busy { .. } => {}
            }
        }
        steps
    }

    fn crud(&self, action: &str, model_context: &Name, mode: serde_json::Value) -> Vec<ActionStep> {
        self.initiate(crud_action_route(action), model_context, mode)
    }

    /// Bind a list-backed table, returning the admin route and model context name.
    fn list_table(&self, admin: EntityAdmin, objects: Vec<ObjectRef>) -> (Name, Name) {
        let admin: AdminRef = Arc::new(admin);
        let route = register_admin(&self.root, admin.clone()).expect("admin");
        let mut mc = ModelContext::new(
            admin.clone(),
            route.clone(),
            Box::new(ListModelProxy::new(objects)),
        );
        mc.static_field_attributes = admin
            .get_columns()
            .iter()
            .map(|field| admin.get_static_field_attributes(field).expect("attributes"))
            .collect();
        let name = bind_model_context(&self.root, mc.into_ref()).expect("bind");
        (route, name)
    }
}

fn a_admin() -> EntityAdmin {
    EntityAdmin::new("a", "a")
        .field(FieldDefinition::new("x", Delegate::Integer))
        .field(FieldDefinition::new(
            "w",
            Delegate::ManyToOne {
                display_field: Some("name".to_string()),
            },
        ))
        .identifier("name")
        .list_action(Arc::new(InsertObject))
}

fn numbered(count: i64) -> Vec<ObjectRef> {
    (0..count)
        .map(|x| Entity::build("a", [("x", Value::Int(x))]))
        .collect()
}

fn cell_value(step: &ActionStep, row: usize, column: usize) -> Option<serde_json::Value> {
    let ranges = match step {
        ActionStep::Update(ranges) | ActionStep::Created(ranges) => &ranges.changed_ranges,
        _ => return None,
    };
    ranges
        .iter()
        .find(|range| range.row == row)?
        .cells
        .iter()
        .find(|cell| cell.column == column)?
        .role(ItemRole::Edit)
        .cloned()
}

#[test]
fn insert_and_edit() {
    let harness = Harness::new();
    let (admin_route, mc) = harness.list_table(a_admin(), numbered(3));

    let steps = harness.initiate(list_action_route(&admin_route, INSERT_OBJECT), &mc, json!(null));
    let ActionStep::Created(created) = &steps[0] else {
        panic!("expected created rows, got {}", steps[0].step_type());
    };
    assert_eq!(created.changed_ranges[0].row, 3);
    let id = created.changed_ranges[0]
        .header
        .as_ref()
        .and_then(|header| header.object_id)
        .expect("object id");
    assert!(matches!(steps[1], ActionStep::RowCount(ref count) if count.rows == 4));

    let edit = SetDataItem {
        row: 3,
        object_id: id,
        column: 0,
        value: json!(5),
    };
    let steps = harness.crud(SET_DATA, &mc, json!([edit]));
    let ActionStep::CreateUpdateDelete(changes) = &steps[0] else {
        panic!("expected a change notification");
    };
    assert_eq!(changes.objects_updated.len(), 1);

    let steps = harness.crud(UPDATE, &mc, json!(changes.objects_updated));
    assert_eq!(cell_value(&steps[0], 3, 0), Some(json!(5)));
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

fn people_session() -> Arc<MemorySession> {
    let session = Arc::new(MemorySession::new().with_default_order("person", &["last_name"]));
    session
        .add_all(&[
            person("Stanley", "Kubrick"),
            person("Alfred", "Hitchcock"),
            person("Agnes", "Varda"),
            person("Akira", "Kurosawa"),
        ])
        .expect("fixtures");
    session
}

#[test]
fn query_proxy_with_filter() {
    let harness = Harness::new();
    let session = people_session();
    let admin: AdminRef = Arc::new(
        EntityAdmin::new("person", "person")
            .field(FieldDefinition::new("id", Delegate::Integer).storage_key())
            .field(FieldDefinition::new("first_name", Delegate::text()))
            .field(FieldDefinition::new("last_name", Delegate::text()))
            .session(session.clone())
            .query_source(session)
            .list_action(Arc::new(ApplyFilter)),
    );
    let route = register_admin(&harness.root, admin).expect("admin");

    let steps = harness.initiate(top_action_route(&route, OPEN_TABLE_VIEW), &Name::null(), json!(null));
    let ActionStep::OpenTableView(view) = &steps[0] else {
        panic!("expected a table view");
    };
    let mc = view.model_context.clone();

    let steps = harness.initiate(
        list_action_route(&route, APPLY_FILTER),
        &mc,
        json!({"field": "id", "operator": "eq", "value": 1}),
    );
    assert!(matches!(steps[0], ActionStep::RowCount(ref count) if count.rows == 1));

    let steps = harness.crud(ROW_DATA, &mc, json!({"rows": [0]}));
    assert_eq!(cell_value(&steps[0], 0, 1), Some(json!("Stanley")));
}

#[test]
fn sort_then_append() {
    for descending in [false, true] {
        let mut proxy = QueryModelProxy::new(people_session(), "person");
        proxy.sort(Some("last_name"), descending).expect("sort");
        let newcomer = person("Zed", "zzz");
        proxy.append(newcomer.clone()).expect("append");
        let len = proxy.len().expect("len");
        assert_eq!(len, 5);
        let last = proxy.get(len - 1..len).expect("rows");
        assert_eq!(last[0].id(), newcomer.id());
    }
}

#[test]
fn deletion_outside_the_proxy() {
    let harness = Harness::new();
    let objects = numbered(3);
    let (_, mc) = harness.list_table(a_admin(), objects.clone());
    harness.crud(ROW_DATA, &mc, json!({"rows": [0, 1, 2]}));

    let name = bind_object(&harness.root, &objects[1]).expect("name");
    let steps = harness.crud(DELETED, &mc, json!({"objects": [name], "rows": 3}));
    assert_eq!(steps.len(), 2);
    match &steps[0] {
        ActionStep::Update(update) => {
            assert_eq!(update.changed_ranges[0].row, 1);
            assert!(update.changed_ranges[0].header.as_ref().is_some_and(|h| h.object_id.is_none()));
        }
        other => panic!("unexpected {}", other.step_type()),
    }
    assert!(matches!(steps[1], ActionStep::RowCount(ref count) if count.rows == 2));
}

#[test]
fn completion_candidates() {
    let harness = Harness::new();
    let admin = a_admin().completions(|obj, _field, prefix| {
        let x = obj.get("x");
        (1..=3)
            .map(|i| Entity::build("b", [("name", Value::from(format!("{prefix}_{x}_{i}")))]))
            .collect()
    });
    let (_, mc) = harness.list_table(admin, vec![Entity::build("a", [("x", Value::Int(1))])]);
    let steps = harness.crud(COMPLETION, &mc, json!({"row": 0, "column": 1, "prefix": "foo"}));
    let ActionStep::Completion(completion) = &steps[0] else {
        panic!("expected completions");
    };
    let names: Vec<_> = completion
        .completions
        .iter()
        .map(|item| item.verbose_name.clone())
        .collect();
    assert_eq!(names, vec!["foo_1_1", "foo_1_2", "foo_1_3"]);
}

/// Progress steps spaced out in time.
struct CancelableAction;

impl Action for CancelableAction {
    fn name(&self) -> &str {
        "cancelable"
    }

    fn model_run(
        &self,
        _root: &Arc<NamingContext>,
        _context: ActionContext,
        _mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let mut i = 0;
        Ok(from_fn(move |resume| {
            if let Resume::Throw(err) = resume {
                return Err(err);
            }
            if i == 10 {
                return Ok(None);
            }
            thread::sleep(Duration::from_millis(40));
            i += 1;
            Ok(Some(ActionStep::UpdateProgress(UpdateProgress::new(i, 10))))
        }))
    }
}

#[test]
fn cancellable_progress() {
    let root = NamingContext::initial();
    let catalog = root
        .bind_new_context(&Name::from(["demo"]), ContextKind::Immutable)
        .expect("catalog");
    bind_action(&catalog, Arc::new(CancelableAction)).expect("bind");
    let worker = Worker::spawn(root, WorkerSettings::default()).expect("spawn");
    worker
        .post(AbstractRequest::InitiateAction {
            gui_run_name: Name::from(["gui", "4"]),
            action_name: Name::from(["demo", "cancelable"]),
            model_context_name: Name::null(),
            mode: json!(null),
        })
        .expect("post");

    let mut progress = 0;
    let mut cancelled = false;
    let exception = loop {
        let response = worker
            .responses()
            .recv_timeout(Duration::from_secs(5))
            .expect("response");
        match response {
            AbstractResponse::ActionStepped {
                run_name,
                step: ActionStep::UpdateProgress(_),
                ..
            } => {
                progress += 1;
                if progress == 3 && !cancelled {
                    worker
                        .post(AbstractRequest::CancelAction { run_name })
                        .expect("cancel");
                    cancelled = true;
                }
            }
            AbstractResponse::ActionStopped { exception, .. } => break exception,
            _ => {}
        }
    };
    assert!(progress < 10);
    assert_eq!(exception, Some(WireException::cancel()));
}
