use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::Name;

use crate::{
    action::{bind_action, list_actions::OpenTableView, ActionRef},
    admin::AdminRef,
    error::NamingError,
    naming::{ContextKind, NamingContext, ADMIN},
};

static NEXT_ADMIN_ID: AtomicU64 = AtomicU64::new(1);

pub const ACTIONS: &str = "actions";
pub const LIST: &str = "list";
pub const FIELDS: &str = "fields";

/// Context holding an admin and its action catalogs: `('admin', '<n>')`.
pub fn admin_scope(admin_route: &Name) -> Name {
    let segments = admin_route.segments();
    Name::new(segments[..segments.len().saturating_sub(1)].iter().cloned())
}

pub fn top_action_route(admin_route: &Name, action: &str) -> Name {
    admin_scope(admin_route).join([ACTIONS, action])
}

pub fn list_action_route(admin_route: &Name, action: &str) -> Name {
    admin_scope(admin_route).join([LIST, ACTIONS, action])
}

pub fn field_action_route(admin_route: &Name, field: &str, action: &str) -> Name {
    admin_scope(admin_route).join([FIELDS, field, ACTIONS, action])
}

/// Bind `admin` under `('admin', '<n>', '<name>')` together with its actions.
///
/// Every admin gets an `open_table_view` action next to its own top-level
/// actions. The catalogs are immutable once populated.
pub fn register_admin(root: &NamingContext, admin: AdminRef) -> Result<Name, NamingError> {
    let id = NEXT_ADMIN_ID.fetch_add(1, Ordering::Relaxed).to_string();
    let scope = Name::from([ADMIN, id.as_str()]);
    root.bind_new_context(&scope, ContextKind::Mutable)?;
    let admin_route = root.bind(&scope.child(admin.name()), Arc::new(admin.clone()))?;

    let actions = root.bind_new_context(&scope.child(ACTIONS), ContextKind::Immutable)?;
    let open: ActionRef = Arc::new(OpenTableView::new(admin.clone(), admin_route.clone()));
    bind_action(&actions, open)?;
    for action in admin.get_actions() {
        bind_action(&actions, action)?;
    }

    root.bind_new_context(&scope.child(LIST), ContextKind::Mutable)?;
    let list_actions =
        root.bind_new_context(&scope.join([LIST, ACTIONS]), ContextKind::Immutable)?;
    for action in admin.get_list_actions() {
        bind_action(&list_actions, action)?;
    }

    root.bind_new_context(&scope.child(FIELDS), ContextKind::Mutable)?;
    for field in admin.get_fields() {
        let field_actions = admin.get_field_actions(&field);
        if field_actions.is_empty() {
            continue;
        }
        let field_scope = scope.join([FIELDS, field.as_str()]);
        root.bind_new_context(&field_scope, ContextKind::Mutable)?;
        let catalog = root.bind_new_context(&field_scope.child(ACTIONS), ContextKind::Immutable)?;
        for action in field_actions {
            bind_action(&catalog, action)?;
        }
    }
    tracing::debug!(admin = %admin_route, "registered admin");
    Ok(admin_route)
}

#[cfg(test)]
#[path = "../tests/registry_tests.rs"]
mod tests;
