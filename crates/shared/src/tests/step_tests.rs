use super::*;
use crate::domain::{
    ActionState, ChangedRange, DataCell, FocusPolicy, ItemFlags, ItemRole, RowHeader,
};

fn all_steps() -> Vec<ActionStep> {
    let mut cell = DataCell::new(3, 0);
    cell.flags = ItemFlags::ENABLED | ItemFlags::EDITABLE | ItemFlags::SELECTABLE;
    cell.set_role(ItemRole::Edit, serde_json::json!(5));
    cell.set_role(ItemRole::Preview, serde_json::json!("5"));
    let ranges = ChangedRanges {
        changed_ranges: vec![ChangedRange {
            row: 3,
            header: Some(RowHeader {
                object_id: Some(crate::domain::ObjectId(11)),
                verbose_identifier: "A 3".to_string(),
                valid: true,
                message: None,
            }),
            cells: vec![cell],
        }],
    };
    vec![
        UpdateProgress::new(1, 10).with_text("working").into(),
        ActionStep::PushProgressLevel(PushProgressLevel {
            title: "Insert".to_string(),
        }),
        ActionStep::PopProgressLevel,
        ActionStep::RowCount(RowCount { rows: 4 }),
        ActionStep::SetColumns(SetColumns {
            admin_route: Name::from(["admin", "1", "person"]),
            columns: vec![ColumnAttributes {
                field_name: "first_name".to_string(),
                verbose_name: "First name".to_string(),
                delegate: "text".to_string(),
                editable: true,
                nullable: false,
                tooltip: None,
                column_width: Some(20),
                focus_policy: FocusPolicy::StrongFocus,
                action_routes: Vec::new(),
                choices: Vec::new(),
            }],
        }),
        ActionStep::Update(ranges.clone()),
        ActionStep::Created(ranges),
        ActionStep::Completion(Completion {
            row: 0,
            column: 1,
            prefix: "foo".to_string(),
            completions: vec![CompletionItem {
                name: Name::from(["object", "12"]),
                verbose_name: "foo_1_1".to_string(),
                tooltip: None,
            }],
        }),
        ActionStep::ChangeSelection(ChangeSelection {
            action_states: vec![RouteState {
                route: Name::from(["admin", "1", "person", "list", "actions", "delete"]),
                state: ActionState::default(),
            }],
        }),
        ActionStep::CreateUpdateDelete(CreateUpdateDelete {
            objects_created: vec![Name::from(["object", "1"])],
            objects_updated: vec![Name::from(["object", "2"])],
            objects_deleted: Vec::new(),
        }),
        MessageBox::new("Error", "Something happened").into(),
        ActionStep::SelectItem(SelectItem {
            title: "Pick".to_string(),
            subtitle: None,
            items: vec![ChoiceItem {
                value: serde_json::json!(1),
                verbose_name: "One".to_string(),
            }],
            value: serde_json::json!(1),
        }),
        ActionStep::SelectObjects(SelectObjects {
            admin_route: Name::from(["admin", "1", "person"]),
            verbose_name_plural: "Persons".to_string(),
            search_text: Some("st".to_string()),
            single: true,
        }),
        ActionStep::ChangeObject(ChangeObject {
            admin_route: Name::from(["admin", "1", "person"]),
            object: Name::from(["object", "1"]),
            title: "Edit".to_string(),
            subtitle: None,
        }),
        ActionStep::OpenFormView(OpenFormView {
            admin_route: Name::from(["admin", "1", "person"]),
            objects: vec![Name::from(["object", "1"])],
            row: 0,
            title: "Person".to_string(),
        }),
        ActionStep::MainWindow(MainWindow {
            title: "Camelot".to_string(),
        }),
        ActionStep::OpenTableView(OpenTableView {
            admin_route: Name::from(["admin", "1", "person"]),
            model_context: Name::from(["model_context", "1"]),
            title: "Persons".to_string(),
            columns: vec!["first_name".to_string()],
            list_actions: Vec::new(),
        }),
        ActionStep::Exit(Exit { return_code: 0 }),
        ActionStep::InstallTranslator(InstallTranslator {
            language: "nl_BE".to_string(),
        }),
    ]
}

#[test]
fn every_step_survives_the_wire() {
    for step in all_steps() {
        let bytes = step.to_bytes().expect("encode");
        let decoded = ActionStep::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded, step, "{} changed over the wire", step.step_type());
    }
}

#[test]
fn step_tag_matches_step_type() {
    for step in all_steps() {
        let value = serde_json::to_value(&step).expect("json");
        assert_eq!(value["__type__"], step.step_type());
    }
}

#[test]
fn only_dialog_steps_block() {
    let blocking: Vec<_> = all_steps()
        .into_iter()
        .filter(ActionStep::blocking)
        .map(|step| step.step_type())
        .collect();
    assert_eq!(
        blocking,
        vec!["MessageBox", "SelectItem", "SelectObjects", "ChangeObject"]
    );
}

#[test]
fn null_roles_are_not_stored() {
    let mut cell = DataCell::new(0, 0);
    cell.set_role(ItemRole::Edit, serde_json::json!(1));
    cell.set_role(ItemRole::Edit, serde_json::Value::Null);
    assert!(cell.roles.is_empty());
    let value = serde_json::to_value(&cell).expect("json");
    assert_eq!(value["roles"], serde_json::json!({}));
}
