use std::sync::Arc;

use shared::domain::{ChoiceItem, FocusPolicy};

use crate::{
    action::ActionRef,
    admin::{Admin, DynamicAttributes, FieldAttributes},
    delegate::Delegate,
    error::AdminError,
    proxy::{ListModelProxy, ModelProxy, QueryModelProxy, QuerySource},
    session::{FlushOutcome, Session},
    validator::{NoValidation, Validator},
    value::{Entity, ObjectRef, PersistenceState, Value},
};

type DynamicHook = Arc<dyn Fn(&Entity) -> DynamicAttributes + Send + Sync>;
type CompletionHook =
    Arc<dyn Fn(&ObjectRef, &str, &str) -> Vec<ObjectRef> + Send + Sync>;
type RelatedHook = Arc<dyn Fn(&ObjectRef) -> Vec<ObjectRef> + Send + Sync>;
type DefaultsHook = Arc<dyn Fn(&ObjectRef) -> bool + Send + Sync>;

pub struct FieldDefinition {
    attributes: FieldAttributes,
    dynamic: Option<DynamicHook>,
    actions: Vec<ActionRef>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, delegate: Delegate) -> Self {
        Self {
            attributes: FieldAttributes::new(name, delegate),
            dynamic: None,
            actions: Vec::new(),
        }
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.attributes.verbose_name = verbose_name.into();
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.attributes.editable = editable;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.attributes.nullable = nullable;
        self
    }

    pub fn storage_key(mut self) -> Self {
        self.attributes.storage_key = true;
        self.attributes.editable = false;
        self
    }

    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.attributes.tooltip = Some(tooltip.into());
        self
    }

    pub fn column_width(mut self, width: u32) -> Self {
        self.attributes.column_width = Some(width);
        self
    }

    pub fn focus_policy(mut self, policy: FocusPolicy) -> Self {
        self.attributes.focus_policy = policy;
        self
    }

    pub fn choices(mut self, choices: Vec<ChoiceItem>) -> Self {
        self.attributes.choices = choices;
        self
    }

    pub fn dynamic(
        mut self,
        hook: impl Fn(&Entity) -> DynamicAttributes + Send + Sync + 'static,
    ) -> Self {
        self.dynamic = Some(Arc::new(hook));
        self
    }

    pub fn action(mut self, action: ActionRef) -> Self {
        self.attributes.actions.push(action.name().to_string());
        self.actions.push(action);
        self
    }

    pub fn attributes(&self) -> &FieldAttributes {
        &self.attributes
    }
}

/// Admin configured from field definitions and optional hooks.
pub struct EntityAdmin {
    name: String,
    kind: String,
    verbose_name: String,
    verbose_name_plural: Option<String>,
    fields: Vec<FieldDefinition>,
    list_columns: Vec<String>,
    identifier_field: Option<String>,
    session: Option<Arc<dyn Session>>,
    query_source: Option<Arc<dyn QuerySource>>,
    page_size: usize,
    cache_size: usize,
    validator: Arc<dyn Validator>,
    completions: Option<CompletionHook>,
    depending: Option<RelatedHook>,
    compounding: Option<RelatedHook>,
    defaults: Option<DefaultsHook>,
    list_actions: Vec<ActionRef>,
    actions: Vec<ActionRef>,
}

impl EntityAdmin {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            verbose_name: super::verbose_from_name(&name),
            name,
            kind: kind.into(),
            verbose_name_plural: None,
            fields: Vec::new(),
            list_columns: Vec::new(),
            identifier_field: None,
            session: None,
            query_source: None,
            page_size: crate::proxy::query::DEFAULT_PAGE_SIZE,
            cache_size: crate::cache::DEFAULT_MAX_ENTRIES,
            validator: Arc::new(NoValidation),
            completions: None,
            depending: None,
            compounding: None,
            defaults: None,
            list_actions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn verbose_names(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
        self.verbose_name = singular.into();
        self.verbose_name_plural = Some(plural.into());
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn list_columns(mut self, columns: &[&str]) -> Self {
        self.list_columns = columns.iter().map(|column| column.to_string()).collect();
        self
    }

    pub fn identifier(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = Some(field.into());
        self
    }

    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn query_source(mut self, source: Arc<dyn QuerySource>) -> Self {
        self.query_source = Some(source);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Row capacity of the value caches of every view on this admin.
    pub fn cache_size(mut self, max_entries: usize) -> Self {
        self.cache_size = max_entries;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn completions(
        mut self,
        hook: impl Fn(&ObjectRef, &str, &str) -> Vec<ObjectRef> + Send + Sync + 'static,
    ) -> Self {
        self.completions = Some(Arc::new(hook));
        self
    }

    pub fn depending_objects(
        mut self,
        hook: impl Fn(&ObjectRef) -> Vec<ObjectRef> + Send + Sync + 'static,
    ) -> Self {
        self.depending = Some(Arc::new(hook));
        self
    }

    pub fn compounding_objects(
        mut self,
        hook: impl Fn(&ObjectRef) -> Vec<ObjectRef> + Send + Sync + 'static,
    ) -> Self {
        self.compounding = Some(Arc::new(hook));
        self
    }

    pub fn defaults(mut self, hook: impl Fn(&ObjectRef) -> bool + Send + Sync + 'static) -> Self {
        self.defaults = Some(Arc::new(hook));
        self
    }

    pub fn list_action(mut self, action: ActionRef) -> Self {
        self.list_actions.push(action);
        self
    }

    pub fn action(mut self, action: ActionRef) -> Self {
        self.actions.push(action);
        self
    }

    fn definition(&self, field: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|definition| definition.attributes.name == field)
    }
}

impl Admin for EntityAdmin {
    fn name(&self) -> &str {
        &self.name
    }

    fn verbose_name(&self) -> String {
        self.verbose_name.clone()
    }

    fn verbose_name_plural(&self) -> String {
        self.verbose_name_plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.verbose_name))
    }

    fn entity_kind(&self) -> &str {
        &self.kind
    }

    fn get_columns(&self) -> Vec<String> {
        if self.list_columns.is_empty() {
            self.get_fields()
        } else {
            self.list_columns.clone()
        }
    }

    fn get_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|definition| definition.attributes.name.clone())
            .collect()
    }

    fn get_static_field_attributes(&self, field: &str) -> Result<FieldAttributes, AdminError> {
        self.definition(field)
            .map(|definition| definition.attributes.clone())
            .ok_or_else(|| AdminError::UnknownField(field.to_string()))
    }

    fn get_dynamic_field_attributes(&self, obj: &ObjectRef, field: &str) -> DynamicAttributes {
        let Some(definition) = self.definition(field) else {
            return DynamicAttributes::default();
        };
        let attributes = &definition.attributes;
        let base = DynamicAttributes {
            editable: Some(attributes.editable && !attributes.storage_key),
            visible: Some(true),
            nullable: Some(attributes.nullable),
            ..DynamicAttributes::default()
        };
        match &definition.dynamic {
            Some(hook) => {
                let dynamic = base.overlay(hook(obj.as_ref()));
                if attributes.storage_key {
                    DynamicAttributes {
                        editable: Some(false),
                        ..dynamic
                    }
                } else {
                    dynamic
                }
            }
            None => base,
        }
    }

    fn set_field_value(
        &self,
        obj: &ObjectRef,
        field: &str,
        value: Value,
    ) -> Result<(), AdminError> {
        let definition = self
            .definition(field)
            .ok_or_else(|| AdminError::UnknownField(field.to_string()))?;
        if definition.attributes.storage_key {
            return Err(AdminError::NotEditable(field.to_string()));
        }
        obj.set(field, value);
        Ok(())
    }

    fn get_completions(
        &self,
        obj: &ObjectRef,
        field: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectRef>, AdminError> {
        if self.definition(field).is_none() {
            return Err(AdminError::UnknownField(field.to_string()));
        }
        Ok(self
            .completions
            .as_ref()
            .map(|hook| hook(obj, field, prefix))
            .unwrap_or_default())
    }

    fn get_depending_objects(&self, obj: &ObjectRef) -> Vec<ObjectRef> {
        self.depending
            .as_ref()
            .map(|hook| hook(obj))
            .unwrap_or_default()
    }

    fn get_compounding_objects(&self, obj: &ObjectRef) -> Vec<ObjectRef> {
        self.compounding
            .as_ref()
            .map(|hook| hook(obj))
            .unwrap_or_default()
    }

    fn get_verbose_identifier(&self, obj: &ObjectRef) -> String {
        if let Some(field) = &self.identifier_field {
            let identifier = obj.get(field).to_string();
            if !identifier.is_empty() {
                return identifier;
            }
        }
        match obj.get(crate::session::PRIMARY_KEY) {
            Value::Null => format!("New {}", self.verbose_name),
            key => format!("{} {key}", self.verbose_name),
        }
    }

    fn get_validator(&self) -> Arc<dyn Validator> {
        self.validator.clone()
    }

    fn set_defaults(&self, obj: &ObjectRef) -> Result<bool, AdminError> {
        Ok(self.defaults.as_ref().map(|hook| hook(obj)).unwrap_or(false))
    }

    fn is_persistent(&self, obj: &ObjectRef) -> bool {
        match &self.session {
            Some(session) => session.is_persistent(obj),
            None => obj.state() == PersistenceState::Persistent,
        }
    }

    fn is_deleted(&self, obj: &ObjectRef) -> bool {
        match &self.session {
            Some(session) => session.is_deleted(obj),
            None => obj.state() == PersistenceState::Deleted,
        }
    }

    fn flush(&self, obj: &ObjectRef) -> Result<FlushOutcome, AdminError> {
        let Some(session) = &self.session else {
            return Ok(FlushOutcome::default());
        };
        let outcome = session.flush(obj)?;
        for part in self.get_compounding_objects(obj) {
            session.flush(&part)?;
        }
        Ok(outcome)
    }

    fn delete(&self, obj: &ObjectRef) -> Result<(), AdminError> {
        match &self.session {
            Some(session) => session.delete(obj),
            None => {
                obj.set_state(PersistenceState::Deleted);
                Ok(())
            }
        }
    }

    fn refresh(&self, obj: &ObjectRef) -> Result<(), AdminError> {
        match &self.session {
            Some(session) => session.refresh(obj),
            None => Ok(()),
        }
    }

    fn new_object(&self) -> Result<ObjectRef, AdminError> {
        Ok(Entity::new(self.kind.clone()))
    }

    fn get_field_actions(&self, field: &str) -> Vec<ActionRef> {
        self.definition(field)
            .map(|definition| definition.actions.clone())
            .unwrap_or_default()
    }

    fn get_list_actions(&self) -> Vec<ActionRef> {
        self.list_actions.clone()
    }

    fn get_actions(&self) -> Vec<ActionRef> {
        self.actions.clone()
    }

    fn get_cache_size(&self) -> usize {
        self.cache_size
    }

    fn get_proxy(&self) -> Box<dyn ModelProxy> {
        match &self.query_source {
            Some(source) => Box::new(
                QueryModelProxy::new(source.clone(), self.kind.clone())
                    .with_page_size(self.page_size),
            ),
            None => Box::new(ListModelProxy::new(Vec::new())),
        }
    }
}

#[cfg(test)]
#[path = "../tests/entity_admin_tests.rs"]
mod tests;
