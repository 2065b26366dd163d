use super::*;
use shared::step::{MessageBox, RowCount, StandardButton, UpdateProgress};

use crate::{
    error::UserException,
    value::{bind_object, Entity},
};

fn progress(current: u64) -> ActionStep {
    ActionStep::UpdateProgress(UpdateProgress::new(current, 3))
}

#[test]
fn steps_yield_in_order_then_exhaust() {
    let mut generator = steps([progress(1), progress(2)]);
    assert_eq!(generator.resume(Resume::Next).expect("1"), Some(progress(1)));
    assert_eq!(generator.resume(Resume::Next).expect("2"), Some(progress(2)));
    assert_eq!(generator.resume(Resume::Next).expect("end"), None);
}

#[test]
fn thrown_errors_terminate_fixed_steps() {
    let mut generator = steps([progress(1), progress(2)]);
    generator.resume(Resume::Next).expect("first");
    assert_eq!(
        generator.resume(Resume::Throw(ActionError::Cancel)),
        Err(ActionError::Cancel)
    );
    assert_eq!(generator.resume(Resume::Next).expect("end"), None);
}

#[test]
fn deferred_computes_on_first_resume_only() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = calls.clone();
    let mut generator = deferred(move || {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(vec![ActionStep::RowCount(RowCount { rows: 4 })])
    });
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(generator.resume(Resume::Next).expect("step").is_some());
    assert!(generator.resume(Resume::Next).expect("end").is_none());
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn deferred_errors_surface_on_resume() {
    let mut generator = deferred(|| Err(UserException::new("nope").into()));
    assert!(matches!(
        generator.resume(Resume::Next),
        Err(ActionError::User(_))
    ));
}

#[test]
fn from_fn_sees_sent_values() {
    let mut asked = false;
    let mut generator = from_fn(move |resume| match resume {
        Resume::Next if !asked => {
            asked = true;
            Ok(Some(ActionStep::MessageBox(MessageBox::new("q", "continue?"))))
        }
        Resume::Send(answer) if answer.is_accepted() => Ok(Some(progress(3))),
        Resume::Throw(err) => Err(err),
        _ => Ok(None),
    });
    assert!(generator.resume(Resume::Next).expect("ask").is_some());
    assert_eq!(
        generator
            .resume(Resume::Send(StepResult::Button(StandardButton::Yes)))
            .expect("answer"),
        Some(progress(3))
    );
    assert_eq!(generator.resume(Resume::Next).expect("end"), None);
}

#[test]
fn parse_mode_reports_the_action() {
    let parsed: Vec<usize> = parse_mode("row_data", serde_json::json!([1, 2])).expect("mode");
    assert_eq!(parsed, vec![1, 2]);
    let err = parse_mode::<Vec<usize>>("row_data", serde_json::json!("x")).expect_err("bad mode");
    assert!(matches!(err, ActionError::InvalidMode { ref action, .. } if action == "row_data"));
}

#[test]
fn bound_actions_resolve_by_route() {
    let root = NamingContext::initial();
    let catalog = NamingContext::new();
    root.bind_context(&Name::from(["catalog"]), catalog.clone())
        .expect("bind catalog");
    let action: ActionRef = Arc::new(crate::action::crud::RowCount);
    let route = bind_action(&catalog, action).expect("bind");
    assert_eq!(route, Name::from(["catalog", "row_count"]));
    assert_eq!(resolve_action(&root, &route).expect("resolve").name(), "row_count");
    assert!(resolve_action(&root, &Name::from(["catalog", "missing"])).is_err());
}

#[test]
fn default_state_is_visible_and_enabled() {
    let state = crate::action::crud::RowCount.get_state(None);
    assert!(state.visible);
    assert!(state.enabled);
}

#[test]
fn message_box_answers_become_buttons() {
    let root = NamingContext::initial();
    let question = ActionStep::MessageBox(MessageBox::new("q", "?"));
    let result = deserialize_result(&root, Some(&question), serde_json::json!("ok")).expect("ok");
    assert!(result.is_accepted());
    assert!(deserialize_result(&root, Some(&question), serde_json::json!(3)).is_err());
}

#[test]
fn selected_object_names_are_resolved() {
    let root = NamingContext::initial();
    let obj = Entity::new("person");
    let name = bind_object(&root, &obj).expect("bind");
    let step = ActionStep::SelectObjects(shared::step::SelectObjects {
        admin_route: Name::from(["admin", "1", "person"]),
        verbose_name_plural: "Persons".to_string(),
        search_text: None,
        single: false,
    });
    match deserialize_result(&root, Some(&step), serde_json::json!([name])).expect("objects") {
        StepResult::Objects(objects) => assert_eq!(objects[0].id(), obj.id()),
        other => panic!("unexpected result {other:?}"),
    }
    match deserialize_result(&root, None, serde_json::json!({"free": "form"})).expect("value") {
        StepResult::Value(value) => assert_eq!(value["free"], "form"),
        other => panic!("unexpected result {other:?}"),
    }
}
