use super::*;
use crate::{session::MemorySession, validator::EntityValidator};

fn person_admin() -> EntityAdmin {
    EntityAdmin::new("person", "person")
        .field(
            FieldDefinition::new("id", Delegate::Integer)
                .storage_key()
                .verbose_name("Id"),
        )
        .field(FieldDefinition::new("first_name", Delegate::text()))
        .field(
            FieldDefinition::new("age", Delegate::Integer)
                .dynamic(|obj| DynamicAttributes {
                    editable: Some(obj.get("first_name").as_str() != Some("Locked")),
                    ..DynamicAttributes::default()
                }),
        )
        .list_columns(&["first_name", "age"])
        .identifier("first_name")
}

#[test]
fn columns_default_to_all_fields_unless_listed() {
    let admin = person_admin();
    assert_eq!(admin.get_columns(), vec!["first_name", "age"]);
    assert_eq!(admin.get_fields(), vec!["id", "first_name", "age"]);
    let bare = EntityAdmin::new("city", "city").field(FieldDefinition::new("name", Delegate::text()));
    assert_eq!(bare.get_columns(), vec!["name"]);
}

#[test]
fn verbose_names_derive_from_the_admin_name() {
    let admin = EntityAdmin::new("movie_title", "movie");
    assert_eq!(admin.verbose_name(), "Movie title");
    assert_eq!(admin.verbose_name_plural(), "Movie titles");
    let admin = admin.verbose_names("Movie", "Movies");
    assert_eq!(admin.verbose_name_plural(), "Movies");
}

#[test]
fn unknown_fields_are_reported() {
    let admin = person_admin();
    assert_eq!(
        admin.get_static_field_attributes("nope"),
        Err(AdminError::UnknownField("nope".to_string()))
    );
}

#[test]
fn dynamic_editability_overlays_static_attributes() {
    let admin = person_admin();
    let open = Entity::build("person", [("first_name", Value::from("Ann"))]);
    let locked = Entity::build("person", [("first_name", Value::from("Locked"))]);
    assert_eq!(
        admin.get_dynamic_field_attributes(&open, "age").editable,
        Some(true)
    );
    assert_eq!(
        admin.get_dynamic_field_attributes(&locked, "age").editable,
        Some(false)
    );
    assert_eq!(
        admin.get_dynamic_field_attributes(&open, "id").editable,
        Some(false)
    );
}

#[test]
fn storage_keys_cannot_be_set() {
    let admin = person_admin();
    let person = Entity::new("person");
    assert_eq!(
        admin.set_field_value(&person, "id", Value::Int(4)),
        Err(AdminError::NotEditable("id".to_string()))
    );
    admin
        .set_field_value(&person, "first_name", Value::from("Bo"))
        .expect("set");
    assert_eq!(person.get("first_name"), Value::from("Bo"));
}

#[test]
fn verbose_identifier_falls_back_to_the_primary_key() {
    let admin = person_admin();
    let named = Entity::build("person", [("first_name", Value::from("Ann"))]);
    assert_eq!(admin.get_verbose_identifier(&named), "Ann");
    let fresh = Entity::new("person");
    assert_eq!(admin.get_verbose_identifier(&fresh), "New Person");
    fresh.set("id", Value::Int(9));
    assert_eq!(admin.get_verbose_identifier(&fresh), "Person 9");
}

#[test]
fn flush_goes_through_the_session() {
    let session = Arc::new(MemorySession::new());
    let admin = person_admin()
        .session(session.clone())
        .query_source(session.clone())
        .validator(Arc::new(EntityValidator::new().require("first_name", "First name")));
    let person = admin.new_object().expect("new");
    assert_eq!(person.kind(), "person");
    assert!(!admin.get_validator().is_valid(&person));
    person.set("first_name", Value::from("Ann"));
    assert!(admin.flush(&person).expect("flush").created);
    assert!(admin.is_persistent(&person));

    let mut proxy = admin.get_proxy();
    assert_eq!(proxy.len().expect("len"), 1);

    admin.delete(&person).expect("delete");
    assert!(admin.is_deleted(&person));
}

#[test]
fn without_session_flush_is_a_no_op() {
    let admin = person_admin();
    let person = admin.new_object().expect("new");
    assert_eq!(admin.flush(&person).expect("flush"), FlushOutcome::default());
    assert!(!admin.is_persistent(&person));
    assert_eq!(admin.get_proxy().len().expect("len"), 0);
}

#[test]
fn hooks_are_consulted() {
    let admin = person_admin()
        .defaults(|obj| {
            if obj.get("age").is_null() {
                obj.set("age", Value::Int(18));
                true
            } else {
                false
            }
        })
        .completions(|_, _, prefix| vec![Entity::build("person", [("first_name", Value::from(prefix))])]);
    let person = admin.new_object().expect("new");
    assert!(admin.set_defaults(&person).expect("defaults"));
    assert!(!admin.set_defaults(&person).expect("defaults"));
    assert_eq!(person.get("age"), Value::Int(18));
    let completions = admin
        .get_completions(&person, "first_name", "An")
        .expect("completions");
    assert_eq!(completions[0].get("first_name"), Value::from("An"));
}
