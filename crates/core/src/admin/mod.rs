//! Metadata oracle describing how a kind of object is shown and edited.

use std::sync::Arc;

use shared::{
    domain::{ChoiceItem, ColumnAttributes, FocusPolicy},
    Name,
};

use crate::{
    action::ActionRef,
    cache::DEFAULT_MAX_ENTRIES,
    delegate::Delegate,
    error::{AdminError, NamingError},
    naming::NamingContext,
    proxy::{filter::split_path, ModelProxy},
    session::FlushOutcome,
    validator::Validator,
    value::{ObjectRef, Value},
};

pub mod entity_admin;
pub mod registry;

pub use entity_admin::{EntityAdmin, FieldDefinition};
pub use registry::{
    admin_scope, field_action_route, list_action_route, register_admin, top_action_route,
};

/// Attributes of a field that do not depend on the object shown.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAttributes {
    pub name: String,
    pub verbose_name: String,
    pub delegate: Delegate,
    pub editable: bool,
    pub nullable: bool,
    /// Primary key columns are never written through the table.
    pub storage_key: bool,
    pub tooltip: Option<String>,
    pub column_width: Option<u32>,
    pub focus_policy: FocusPolicy,
    pub choices: Vec<ChoiceItem>,
    /// Names of the field actions bound for this field.
    pub actions: Vec<String>,
}

impl FieldAttributes {
    pub fn new(name: impl Into<String>, delegate: Delegate) -> Self {
        let name = name.into();
        Self {
            verbose_name: verbose_from_name(&name),
            name,
            delegate,
            editable: true,
            nullable: true,
            storage_key: false,
            tooltip: None,
            column_width: None,
            focus_policy: FocusPolicy::default(),
            choices: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn to_column(&self, admin_route: &Name) -> ColumnAttributes {
        ColumnAttributes {
            field_name: self.name.clone(),
            verbose_name: self.verbose_name.clone(),
            delegate: self.delegate.name().to_string(),
            editable: self.editable && !self.storage_key,
            nullable: self.nullable,
            tooltip: self.tooltip.clone(),
            column_width: self.column_width,
            focus_policy: self.focus_policy,
            action_routes: self
                .actions
                .iter()
                .map(|action| field_action_route(admin_route, &self.name, action))
                .collect(),
            choices: self.choices.clone(),
        }
    }
}

/// Attributes evaluated per object; `None` falls back to the static value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicAttributes {
    pub editable: Option<bool>,
    pub visible: Option<bool>,
    pub nullable: Option<bool>,
    pub tooltip: Option<String>,
    pub choices: Option<Vec<ChoiceItem>>,
}

impl DynamicAttributes {
    /// Values set in `other` win.
    pub fn overlay(mut self, other: DynamicAttributes) -> Self {
        self.editable = other.editable.or(self.editable);
        self.visible = other.visible.or(self.visible);
        self.nullable = other.nullable.or(self.nullable);
        self.tooltip = other.tooltip.or(self.tooltip);
        self.choices = other.choices.or(self.choices);
        self
    }
}

pub type AdminRef = Arc<dyn Admin>;

pub trait Admin: Send + Sync {
    fn name(&self) -> &str;

    fn verbose_name(&self) -> String;

    fn verbose_name_plural(&self) -> String {
        format!("{}s", self.verbose_name())
    }

    fn entity_kind(&self) -> &str;

    /// Fields shown as table columns, in order.
    fn get_columns(&self) -> Vec<String>;

    /// Every field that may carry actions; defaults to the columns.
    fn get_fields(&self) -> Vec<String> {
        self.get_columns()
    }

    fn get_static_field_attributes(&self, field: &str) -> Result<FieldAttributes, AdminError>;

    fn get_dynamic_field_attributes(&self, obj: &ObjectRef, field: &str) -> DynamicAttributes;

    fn get_field_value(&self, obj: &ObjectRef, field: &str) -> Result<Value, AdminError> {
        Ok(obj.get_path(&split_path(field)))
    }

    fn set_field_value(&self, obj: &ObjectRef, field: &str, value: Value)
        -> Result<(), AdminError>;

    fn get_completions(
        &self,
        _obj: &ObjectRef,
        _field: &str,
        _prefix: &str,
    ) -> Result<Vec<ObjectRef>, AdminError> {
        Ok(Vec::new())
    }

    /// Objects whose state depends on `obj` and must be refreshed with it.
    fn get_depending_objects(&self, _obj: &ObjectRef) -> Vec<ObjectRef> {
        Vec::new()
    }

    /// Objects that are part of `obj` and are flushed along with it.
    fn get_compounding_objects(&self, _obj: &ObjectRef) -> Vec<ObjectRef> {
        Vec::new()
    }

    fn get_verbose_identifier(&self, obj: &ObjectRef) -> String;

    fn get_validator(&self) -> Arc<dyn Validator>;

    /// Fill computed fields; returns whether anything changed.
    fn set_defaults(&self, _obj: &ObjectRef) -> Result<bool, AdminError> {
        Ok(false)
    }

    fn is_persistent(&self, obj: &ObjectRef) -> bool;

    fn is_deleted(&self, obj: &ObjectRef) -> bool;

    fn flush(&self, obj: &ObjectRef) -> Result<FlushOutcome, AdminError>;

    fn delete(&self, obj: &ObjectRef) -> Result<(), AdminError>;

    fn refresh(&self, _obj: &ObjectRef) -> Result<(), AdminError> {
        Ok(())
    }

    fn new_object(&self) -> Result<ObjectRef, AdminError>;

    fn get_field_actions(&self, _field: &str) -> Vec<ActionRef> {
        Vec::new()
    }

    fn get_list_actions(&self) -> Vec<ActionRef> {
        Vec::new()
    }

    fn get_actions(&self) -> Vec<ActionRef> {
        Vec::new()
    }

    fn get_cache_size(&self) -> usize {
        DEFAULT_MAX_ENTRIES
    }

    /// A fresh view over every object of this kind.
    fn get_proxy(&self) -> Box<dyn ModelProxy>;
}

pub fn resolve_admin(root: &NamingContext, name: &Name) -> Result<AdminRef, NamingError> {
    root.resolve_as::<AdminRef>(name).map(|admin| (*admin).clone())
}

/// `first_name` becomes `First name`.
pub fn verbose_from_name(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
