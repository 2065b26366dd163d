use super::*;
use chrono::{NaiveDate, TimeZone};

fn person(first_name: &str, last_name: &str) -> ObjectRef {
    Entity::build(
        "person",
        [
            ("first_name", Value::from(first_name)),
            ("last_name", Value::from(last_name)),
        ],
    )
}

fn memory_session() -> SqliteSession {
    SqliteSession::open("sqlite::memory:")
        .expect("session")
        .with_default_order("person", &["last_name"])
}

#[test]
fn flush_assigns_keys_and_state() {
    let session = memory_session();
    let stanley = person("Stanley", "Kubrick");
    let outcome = session.flush(&stanley).expect("flush");
    assert!(outcome.created);
    assert_eq!(stanley.get(PRIMARY_KEY), Value::Int(1));
    assert_eq!(stanley.state(), PersistenceState::Persistent);

    stanley.set("first_name", Value::from("S."));
    assert!(!session.flush(&stanley).expect("flush").created);
}

#[test]
fn identity_map_returns_the_same_object() {
    let session = memory_session();
    let agnes = person("Agnes", "Varda");
    session.add_all(&[agnes.clone()]).expect("add");
    let spec = QuerySpec::new("person");
    let loaded = QuerySource::get(&session, &spec, &Value::Int(1))
        .expect("get")
        .expect("row");
    assert_eq!(loaded.id(), agnes.id());
}

#[test]
fn position_follows_the_query_order() {
    let session = memory_session();
    let kurosawa = person("Akira", "Kurosawa");
    session
        .add_all(&[
            person("Stanley", "Kubrick"),
            kurosawa.clone(),
            person("Alfred", "Hitchcock"),
        ])
        .expect("fixtures");
    let mut spec = QuerySpec::new("person");
    spec.order = vec![camelot_core::proxy::SortTerm::ascending(vec![
        "last_name".to_string(),
    ])];
    assert_eq!(session.position(&spec, &kurosawa).expect("position"), Some(2));
    assert_eq!(
        session
            .position(&spec, &person("Nobody", "Here"))
            .expect("position"),
        None
    );
}

#[test]
fn queries_filter_and_order_documents() {
    let session = memory_session();
    session
        .add_all(&[
            person("Stanley", "Kubrick"),
            person("Alfred", "Hitchcock"),
            person("Akira", "Kurosawa"),
        ])
        .expect("fixtures");
    let mut spec = QuerySpec::new("person");
    spec.order = session
        .default_order("person")
        .into_iter()
        .map(|field| camelot_core::proxy::SortTerm::ascending(vec![field]))
        .collect();
    assert_eq!(session.count(&spec).expect("count"), 3);
    let names: Vec<String> = session
        .fetch(&spec, 1, 5)
        .expect("fetch")
        .iter()
        .map(|obj| obj.get("last_name").to_string())
        .collect();
    assert_eq!(names, vec!["Kubrick", "Kurosawa"]);
}

#[test]
fn refresh_discards_unflushed_changes() {
    let session = memory_session();
    let akira = person("Akira", "Kurosawa");
    session.flush(&akira).expect("flush");
    akira.set("first_name", Value::from("A."));
    session.refresh(&akira).expect("refresh");
    assert_eq!(akira.get("first_name"), Value::from("Akira"));
}

#[test]
fn deleted_objects_cannot_be_flushed() {
    let session = memory_session();
    let alfred = person("Alfred", "Hitchcock");
    session.flush(&alfred).expect("flush");
    session.delete(&alfred).expect("delete");
    assert_eq!(alfred.state(), PersistenceState::Deleted);
    assert!(session.flush(&alfred).is_err());
    assert_eq!(session.all("person").expect("all").len(), 0);
}

#[test]
fn typed_values_survive_a_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("store.db").display());
    let released = NaiveDate::from_ymd_opt(1958, 5, 9).expect("date");
    let screened = chrono::Utc
        .with_ymd_and_hms(1958, 5, 9, 20, 0, 0)
        .single()
        .expect("datetime");
    {
        let session = SqliteSession::open(&url).expect("session");
        let director = person("Alfred", "Hitchcock");
        session.flush(&director).expect("director");
        let movie = Entity::build(
            "movie",
            [
                ("title", Value::from("Vertigo")),
                ("released", Value::Date(released)),
                ("screened", Value::DateTime(screened)),
                ("director", Value::Object(director)),
                ("cast", Value::Objects(Vec::new())),
            ],
        );
        session.flush(&movie).expect("movie");
    }

    let session = SqliteSession::open(&url).expect("reopen");
    let movies = session.all("movie").expect("movies");
    assert_eq!(movies.len(), 1);
    let movie = &movies[0];
    assert_eq!(movie.get("released"), Value::Date(released));
    assert_eq!(movie.get("screened"), Value::DateTime(screened));
    assert!(movie.get("cast").is_null());
    let director = movie.get("director");
    let director = director.as_object().expect("director");
    assert_eq!(director.get("last_name"), Value::from("Hitchcock"));
    assert_eq!(
        session.all("person").expect("people")[0].id(),
        director.id()
    );
}

#[test]
fn references_to_unsaved_objects_are_dropped() {
    let movie = Entity::build(
        "movie",
        [("director", Value::Object(person("Nobody", "Yet")))],
    );
    let body = encode(&movie);
    assert!(body["director"].is_null());
}
