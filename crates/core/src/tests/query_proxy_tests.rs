use super::*;
use crate::{
    proxy::FilterOp,
    session::{MemorySession, Session},
    value::Entity,
};

fn person(first_name: &str, last_name: &str) -> ObjectRef {
    Entity::build(
        "person",
        [
            ("first_name", Value::from(first_name)),
            ("last_name", Value::from(last_name)),
        ],
    )
}

fn populated() -> Arc<MemorySession> {
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

fn last_names(proxy: &mut QueryModelProxy) -> Vec<String> {
    let len = proxy.len().expect("len");
    proxy
        .get(0..len)
        .expect("get")
        .iter()
        .map(|obj| obj.get("last_name").to_string())
        .collect()
}

#[test]
fn rows_follow_default_order() {
    let mut proxy = QueryModelProxy::new(populated(), "person");
    assert_eq!(proxy.len().expect("len"), 4);
    assert_eq!(
        last_names(&mut proxy),
        vec!["Hitchcock", "Kubrick", "Kurosawa", "Varda"]
    );
}

#[test]
fn filter_by_primary_key() {
    let mut proxy = QueryModelProxy::new(populated(), "person");
    proxy
        .filter(Predicate::eq("id"), Value::Int(1))
        .expect("filter");
    assert_eq!(proxy.len().expect("len"), 1);
    let first = proxy.get(0..1).expect("get");
    assert_eq!(first[0].get("first_name"), Value::from("Stanley"));

    proxy.remove_filter(&Predicate::eq("id")).expect("remove");
    assert_eq!(proxy.len().expect("len"), 4);
}

#[test]
fn appended_objects_stay_at_the_tail_in_both_directions() {
    let mut proxy = QueryModelProxy::new(populated(), "person");
    for descending in [false, true] {
        proxy.sort(Some("last_name"), descending).expect("sort");
        let newcomer = person("Zed", "zzz");
        proxy.append(newcomer.clone()).expect("append");
        let len = proxy.len().expect("len");
        assert_eq!(proxy.index(&newcomer).expect("index"), len - 1);
        proxy.remove(&newcomer).expect("remove");
    }
}

#[test]
fn length_counts_query_and_appended() {
    let session = populated();
    let mut proxy = QueryModelProxy::new(session.clone(), "person");
    proxy
        .filter(Predicate::new("last_name", FilterOp::StartsWith), Value::from("K"))
        .expect("filter");
    proxy.append(person("New", "Person")).expect("append");
    assert_eq!(proxy.len().expect("len"), 3);
    assert_eq!(proxy.appended().len(), 1);
}

#[test]
fn flushed_appended_object_is_not_counted_twice() {
    let session = populated();
    let mut proxy = QueryModelProxy::new(session.clone(), "person").with_page_size(2);
    let newcomer = person("Jane", "Campion");
    proxy.append(newcomer.clone()).expect("append");
    assert_eq!(proxy.len().expect("len"), 5);

    session.flush(&newcomer).expect("flush");
    let len = proxy.len().expect("len");
    let rows = proxy.get(0..len).expect("get");
    assert_eq!(rows.len(), 5);
    assert_eq!(
        rows.iter().filter(|obj| obj.id() == newcomer.id()).count(),
        1
    );
    assert!(proxy.appended().is_empty());
}

#[test]
fn rows_deleted_behind_the_view_keep_the_slice_dense() {
    let session = populated();
    let mut proxy = QueryModelProxy::new(session.clone(), "person");
    let newcomer = person("Jane", "Campion");
    proxy.append(newcomer.clone()).expect("append");
    assert_eq!(proxy.len().expect("len"), 5);

    let gone = proxy.get(0..1).expect("get").remove(0);
    session.delete(&gone).expect("delete");

    let rows = proxy.get(0..5).expect("get");
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|obj| obj.id() != gone.id()));
    assert_eq!(
        rows.iter().position(|obj| obj.id() == newcomer.id()),
        Some(3)
    );
    assert_eq!(proxy.index(&newcomer).expect("index"), 3);
    assert_eq!(proxy.len().expect("len"), 4);
}

#[test]
fn persistent_objects_already_in_the_query_are_not_appended() {
    let session = populated();
    let existing = session.all("person").remove(0);
    let mut proxy = QueryModelProxy::new(session, "person");
    proxy.append(existing.clone()).expect("append");
    assert_eq!(proxy.len().expect("len"), 4);
    assert!(proxy.appended().is_empty());
}

#[test]
fn transient_objects_are_not_found_by_index() {
    let mut proxy = QueryModelProxy::new(populated(), "person");
    assert_eq!(
        proxy.index(&person("Nobody", "Here")),
        Err(ProxyError::NotInCollection)
    );
}

#[test]
fn relationship_sort_uses_target_order() {
    let session = Arc::new(
        MemorySession::new()
            .with_default_order("city", &["name"])
            .with_relationship("person", "city", "city"),
    );
    let proxy = {
        let mut proxy = QueryModelProxy::new(session, "person");
        proxy.sort(Some("city"), true).expect("sort");
        proxy
    };
    let spec = proxy.get_query(true);
    assert_eq!(
        spec.order[0],
        SortTerm {
            path: vec!["city".to_string(), "name".to_string()],
            descending: true,
        }
    );
    assert_eq!(spec.order.last(), Some(&SortTerm::ascending(vec!["id".to_string()])));
}

#[test]
fn index_pages_through_the_query() {
    let session = populated();
    let varda = session
        .all("person")
        .into_iter()
        .find(|obj| obj.get("last_name") == Value::from("Varda"))
        .expect("fixture");
    let mut proxy = QueryModelProxy::new(session, "person").with_page_size(1);
    assert_eq!(proxy.index(&varda).expect("index"), 3);
    assert_eq!(proxy.find(varda.id()).map(|obj| obj.id()), Some(varda.id()));
}

/// Forwards to a memory session and counts the pages fetched.
struct CountingSource {
    inner: Arc<MemorySession>,
    positions: bool,
    fetches: std::sync::atomic::AtomicUsize,
}

impl CountingSource {
    fn new(inner: Arc<MemorySession>, positions: bool) -> Arc<Self> {
        Arc::new(Self {
            inner,
            positions,
            fetches: Default::default(),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl QuerySource for CountingSource {
    fn count(&self, spec: &QuerySpec) -> Result<usize, ProxyError> {
        self.inner.count(spec)
    }

    fn fetch(
        &self,
        spec: &QuerySpec,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ObjectRef>, ProxyError> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.fetch(spec, offset, limit)
    }

    fn get(&self, spec: &QuerySpec, primary_key: &Value) -> Result<Option<ObjectRef>, ProxyError> {
        self.inner.get(spec, primary_key)
    }

    fn primary_key(&self, obj: &Entity) -> Option<Value> {
        self.inner.primary_key(obj)
    }

    fn position(&self, spec: &QuerySpec, obj: &Entity) -> Result<Option<usize>, ProxyError> {
        if self.positions {
            self.inner.position(spec, obj)
        } else {
            Ok(None)
        }
    }

    fn relationship(&self, kind: &str, field: &str) -> Option<String> {
        self.inner.relationship(kind, field)
    }

    fn default_order(&self, kind: &str) -> Vec<String> {
        self.inner.default_order(kind)
    }
}

fn varda(session: &MemorySession) -> ObjectRef {
    session
        .all("person")
        .into_iter()
        .find(|obj| obj.get("last_name") == Value::from("Varda"))
        .expect("fixture")
}

#[test]
fn index_asks_the_source_for_the_row() {
    let session = populated();
    let target = varda(&session);
    let source = CountingSource::new(session, true);
    let mut proxy = QueryModelProxy::new(source.clone(), "person").with_page_size(1);
    assert_eq!(proxy.index(&target).expect("index"), 3);
    assert_eq!(source.fetches(), 0);
    assert_eq!(proxy.index(&target).expect("cached"), 3);
}

#[test]
fn index_pages_when_the_source_cannot_place_the_row() {
    let session = populated();
    let target = varda(&session);
    let source = CountingSource::new(session, false);
    let mut proxy = QueryModelProxy::new(source.clone(), "person").with_page_size(1);
    assert_eq!(proxy.index(&target).expect("index"), 3);
    assert_eq!(source.fetches(), 4);
}

#[test]
fn objects_outside_the_filter_are_rejected_without_paging() {
    let session = populated();
    let target = varda(&session);
    let source = CountingSource::new(session, false);
    let mut proxy = QueryModelProxy::new(source.clone(), "person").with_page_size(1);
    proxy
        .filter(Predicate::new("last_name", FilterOp::StartsWith), Value::from("K"))
        .expect("filter");
    assert_eq!(proxy.index(&target), Err(ProxyError::NotInCollection));
    assert_eq!(source.fetches(), 0);
}
