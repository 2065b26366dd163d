use super::*;
use crate::{proxy::FilterOp, value::Entity};

fn letters(names: &[&str]) -> Vec<ObjectRef> {
    names
        .iter()
        .map(|name| Entity::build("letter", [("name", Value::from(*name))]))
        .collect()
}

fn names(proxy: &mut ListModelProxy) -> Vec<String> {
    let len = proxy.len().expect("len");
    proxy
        .get(0..len)
        .expect("get")
        .iter()
        .map(|obj| obj.get("name").to_string())
        .collect()
}

#[test]
fn duplicates_are_dropped_on_construction() {
    let objects = letters(&["a", "b"]);
    let mut proxy = ListModelProxy::new(vec![
        objects[0].clone(),
        objects[1].clone(),
        objects[0].clone(),
    ]);
    assert_eq!(proxy.len().expect("len"), 2);
}

#[test]
fn append_adds_to_the_tail_once() {
    let mut proxy = ListModelProxy::new(letters(&["b", "c"]));
    let extra = Entity::build("letter", [("name", Value::from("a"))]);
    proxy.append(extra.clone()).expect("append");
    proxy.append(extra.clone()).expect("append again");
    assert_eq!(proxy.len().expect("len"), 3);
    assert_eq!(proxy.index(&extra).expect("index"), 2);
    assert!(proxy.contains(&extra));
}

#[test]
fn sort_orders_nulls_first_and_descending_reverses() {
    let mut objects = letters(&["b", "a", "c"]);
    objects.push(Entity::new("letter"));
    let mut proxy = ListModelProxy::new(objects);

    proxy.sort(Some("name"), false).expect("sort");
    assert_eq!(names(&mut proxy), vec!["", "a", "b", "c"]);

    proxy.sort(Some("name"), true).expect("sort");
    assert_eq!(names(&mut proxy), vec!["c", "b", "a", ""]);

    proxy.sort(None, false).expect("unsort");
    assert_eq!(names(&mut proxy), vec!["b", "a", "c", ""]);
}

#[test]
fn filters_hide_rows_but_not_appended_ones() {
    let mut proxy = ListModelProxy::new(letters(&["apple", "banana", "avocado"]));
    let predicate = Predicate::new("name", FilterOp::StartsWith);
    proxy
        .filter(predicate.clone(), Value::from("a"))
        .expect("filter");
    assert_eq!(names(&mut proxy), vec!["apple", "avocado"]);

    let cherry = Entity::build("letter", [("name", Value::from("cherry"))]);
    proxy.append(cherry.clone()).expect("append");
    assert_eq!(names(&mut proxy), vec!["apple", "avocado", "cherry"]);

    proxy.remove_filter(&predicate).expect("remove filter");
    assert_eq!(proxy.len().expect("len"), 4);
}

#[test]
fn remove_shifts_later_rows() {
    let objects = letters(&["a", "b", "c"]);
    let mut proxy = ListModelProxy::new(objects.clone());
    assert_eq!(proxy.index(&objects[2]).expect("index"), 2);
    proxy.remove(&objects[1]).expect("remove");
    assert_eq!(proxy.index(&objects[2]).expect("index"), 1);
    assert!(!proxy.contains(&objects[1]));
    assert_eq!(
        proxy.remove(&objects[1]),
        Err(ProxyError::NotInCollection)
    );
}

#[test]
fn get_clamps_to_length() {
    let mut proxy = ListModelProxy::new(letters(&["a", "b"]));
    assert_eq!(proxy.get(1..10).expect("get").len(), 1);
    assert!(proxy.get(5..10).expect("get").is_empty());
}

#[test]
fn find_returns_held_objects_only() {
    let objects = letters(&["a"]);
    let proxy = ListModelProxy::new(objects.clone());
    assert!(proxy.find(objects[0].id()).is_some());
    assert!(proxy.find(Entity::new("letter").id()).is_none());
}
