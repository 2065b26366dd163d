//! The `Person` table the shell administers, on either backend.

use std::sync::Arc;

use anyhow::Context;
use camelot_core::{
    action::list_actions::{ApplyFilter, DeleteSelection, InsertObject},
    admin::{EntityAdmin, FieldDefinition},
    delegate::Delegate,
    proxy::QuerySource,
    session::{MemorySession, Session},
    validator::EntityValidator,
    Entity, ObjectRef, Value,
};
use storage::SqliteSession;

use crate::config::{prepare_database_url, Backend, Settings};

pub const PERSON: &str = "person";

const DEFAULT_ORDER: &[&str] = &["last_name", "first_name"];

pub fn person(first_name: &str, last_name: &str, birth_year: Option<i64>) -> ObjectRef {
    Entity::build(
        PERSON,
        [
            ("first_name", Value::from(first_name)),
            ("last_name", Value::from(last_name)),
            ("birth_year", Value::from(birth_year)),
        ],
    )
}

pub fn seed_people() -> Vec<ObjectRef> {
    vec![
        person("Stanley", "Kubrick", Some(1928)),
        person("Alfred", "Hitchcock", Some(1899)),
        person("Agnes", "Varda", Some(1928)),
        person("Akira", "Kurosawa", Some(1910)),
        person("Chantal", "Akerman", None),
    ]
}

pub struct Backing {
    pub session: Arc<dyn Session>,
    pub source: Arc<dyn QuerySource>,
}

/// Open the configured backend, seeding it when it holds no person yet.
pub fn open_backend(settings: &Settings) -> anyhow::Result<Backing> {
    match settings.backend {
        Backend::Memory => {
            let session = Arc::new(MemorySession::new().with_default_order(PERSON, DEFAULT_ORDER));
            session.add_all(&seed_people())?;
            tracing::info!(people = session.all(PERSON).len(), "in-memory backend ready");
            Ok(Backing {
                session: session.clone(),
                source: session,
            })
        }
        Backend::Sqlite => {
            let database_url = prepare_database_url(&settings.database_url)?;
            let session = Arc::new(
                SqliteSession::open(&database_url)
                    .with_context(|| format!("cannot open '{database_url}'"))?
                    .with_default_order(PERSON, DEFAULT_ORDER),
            );
            if session.all(PERSON)?.is_empty() {
                tracing::info!(%database_url, "seeding empty database");
                session.add_all(&seed_people())?;
            }
            Ok(Backing {
                session: session.clone(),
                source: session,
            })
        }
    }
}

pub fn person_admin(backing: &Backing, settings: &Settings) -> EntityAdmin {
    let validator = EntityValidator::new()
        .require("last_name", "Last name")
        .rule(|obj| match obj.get("birth_year").as_i64() {
            Some(year) if !(1800..=2100).contains(&year) => {
                Some(format!("{year} is not a plausible birth year"))
            }
            _ => None,
        });
    EntityAdmin::new(PERSON, PERSON)
        .field(FieldDefinition::new("id", Delegate::Integer).storage_key())
        .field(FieldDefinition::new("first_name", Delegate::Text { max_length: Some(40) }))
        .field(
            FieldDefinition::new("last_name", Delegate::Text { max_length: Some(40) })
                .nullable(false),
        )
        .field(FieldDefinition::new("birth_year", Delegate::Integer))
        .identifier("last_name")
        .session(backing.session.clone())
        .query_source(backing.source.clone())
        .validator(Arc::new(validator))
        .page_size(settings.page_size)
        .cache_size(settings.cache_max_entries)
        .list_action(Arc::new(InsertObject))
        .list_action(Arc::new(DeleteSelection))
        .list_action(Arc::new(ApplyFilter))
}
