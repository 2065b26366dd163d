//! Actions offered on a table as a whole.

use std::{collections::VecDeque, sync::Arc};

use shared::{
    domain::ActionState,
    mode::ApplyFilterMode,
    step::{self, ActionStep, MessageBox, MessageIcon, StandardButton},
    Name,
};

use crate::{
    action::{
        crud::{created_steps, ChangeSet},
        deferred, from_fn, parse_mode, Action, ActionContext, Resume, StepGenerator,
    },
    admin::{list_action_route, AdminRef},
    error::ActionError,
    model_context::{bind_model_context, lock, ModelContext},
    naming::NamingContext,
    proxy::Predicate,
    value::{ObjectRef, Value},
};

pub const INSERT_OBJECT: &str = "insert_object";
pub const DELETE_SELECTION: &str = "delete_selection";
pub const APPLY_FILTER: &str = "apply_filter";
pub const OPEN_TABLE_VIEW: &str = "open_table_view";

/// Create a new object through the admin and append it to the view.
pub struct InsertObject;

impl Action for InsertObject {
    fn name(&self) -> &str {
        INSERT_OBJECT
    }

    fn verbose_name(&self) -> Option<String> {
        Some("New".to_string())
    }

    fn icon(&self) -> Option<String> {
        Some("plus".to_string())
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        _mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let model_context = context.model()?.clone();
        let root = root.clone();
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let obj = mc.admin.new_object()?;
            mc.admin.set_defaults(&obj)?;
            tracing::debug!(object = obj.id().0, kind = obj.kind(), "inserting object");
            created_steps(&root, &mut mc, vec![obj])
        }))
    }
}

enum DeleteState {
    Start,
    Confirming(Vec<ObjectRef>),
    Emitting(VecDeque<ActionStep>),
}

/// Ask for confirmation, then delete the selected objects.
pub struct DeleteSelection;

impl DeleteSelection {
    fn delete(
        root: &NamingContext,
        mc: &mut ModelContext,
        selected: &[ObjectRef],
    ) -> Result<VecDeque<ActionStep>, ActionError> {
        let admin = mc.admin.clone();
        let mut changes = ChangeSet::default();
        for obj in selected {
            let depending = admin.get_depending_objects(obj);
            admin.delete(obj)?;
            if mc.proxy.contains(obj) {
                mc.proxy.remove(obj)?;
            }
            changes.deleted(obj);
            changes.dependents(admin.as_ref(), depending);
        }
        mc.clear_caches();
        mc.selected_rows.clear();
        mc.selection_count = 0;
        let rows = mc.proxy.len()?;
        mc.collection_count = rows;

        let mut pending: VecDeque<ActionStep> = changes.into_step(root)?.into_iter().collect();
        pending.push_back(ActionStep::RowCount(step::RowCount { rows }));
        Ok(pending)
    }
}

impl Action for DeleteSelection {
    fn name(&self) -> &str {
        DELETE_SELECTION
    }

    fn verbose_name(&self) -> Option<String> {
        Some("Delete".to_string())
    }

    fn icon(&self) -> Option<String> {
        Some("trash".to_string())
    }

    fn get_state(&self, model_context: Option<&ModelContext>) -> ActionState {
        ActionState {
            verbose_name: self.verbose_name(),
            icon: self.icon(),
            enabled: model_context.is_some_and(|mc| mc.selection_count > 0),
            ..ActionState::default()
        }
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        _mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let model_context = context.model()?.clone();
        let root = root.clone();
        let mut state = DeleteState::Start;
        Ok(from_fn(move |resume| {
            if let Resume::Throw(err) = resume {
                state = DeleteState::Emitting(VecDeque::new());
                return Err(err);
            }
            match &mut state {
                DeleteState::Start => {
                    let mut mc = lock(&model_context);
                    let selected = mc.selected_objects()?;
                    if selected.is_empty() {
                        state = DeleteState::Emitting(VecDeque::new());
                        return Ok(None);
                    }
                    let what = if selected.len() == 1 {
                        mc.admin.verbose_name()
                    } else {
                        mc.admin.verbose_name_plural()
                    };
                    let text = format!("Delete {} {}?", selected.len(), what.to_lowercase());
                    state = DeleteState::Confirming(selected);
                    Ok(Some(ActionStep::MessageBox(MessageBox {
                        icon: MessageIcon::Question,
                        standard_buttons: vec![StandardButton::Yes, StandardButton::No],
                        ..MessageBox::new("Please confirm", text)
                    })))
                }
                DeleteState::Confirming(selected) => {
                    let accepted = matches!(&resume, Resume::Send(answer) if answer.is_accepted());
                    let pending = if accepted {
                        let mut mc = lock(&model_context);
                        Self::delete(&root, &mut mc, selected)?
                    } else {
                        tracing::debug!("deletion declined");
                        VecDeque::new()
                    };
                    state = DeleteState::Emitting(pending);
                    match &mut state {
                        DeleteState::Emitting(pending) => Ok(pending.pop_front()),
                        _ => Ok(None),
                    }
                }
                DeleteState::Emitting(pending) => Ok(pending.pop_front()),
            }
        }))
    }
}

/// Set or drop a filter on the view. Mode: `{field, operator, value, clear}`.
pub struct ApplyFilter;

impl Action for ApplyFilter {
    fn name(&self) -> &str {
        APPLY_FILTER
    }

    fn verbose_name(&self) -> Option<String> {
        Some("Filter".to_string())
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let mode: ApplyFilterMode = parse_mode(APPLY_FILTER, mode)?;
        let model_context = context.model()?.clone();
        let root = root.clone();
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let predicate = Predicate::new(mode.field.as_str(), mode.operator);
            if mode.clear {
                mc.proxy.remove_filter(&predicate)?;
            } else {
                let value = match mc.admin.get_static_field_attributes(&mode.field) {
                    Ok(attributes) => attributes
                        .delegate
                        .from_wire(&mode.value, &root)
                        .map_err(|message| ActionError::invalid_mode(APPLY_FILTER, message))?,
                    Err(_) => Value::from_json(&mode.value),
                };
                tracing::debug!(field = %mode.field, operator = ?mode.operator, "applying filter");
                mc.proxy.filter(predicate, value)?;
            }
            let rows = mc.proxy.len()?;
            mc.clear_caches();
            mc.collection_count = rows;
            Ok(vec![ActionStep::RowCount(step::RowCount { rows })])
        }))
    }
}

/// Open a table over every object of an admin.
pub struct OpenTableView {
    admin: AdminRef,
    admin_route: Name,
}

impl OpenTableView {
    pub fn new(admin: AdminRef, admin_route: Name) -> Self {
        Self { admin, admin_route }
    }
}

impl Action for OpenTableView {
    fn name(&self) -> &str {
        OPEN_TABLE_VIEW
    }

    fn verbose_name(&self) -> Option<String> {
        Some(self.admin.verbose_name_plural())
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        _context: ActionContext,
        _mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let admin = self.admin.clone();
        let admin_route = self.admin_route.clone();
        let root = root.clone();
        Ok(deferred(move || {
            let columns = admin.get_columns();
            let attributes = columns
                .iter()
                .map(|field| admin.get_static_field_attributes(field))
                .collect::<Result<Vec<_>, _>>()?;
            let list_actions = admin
                .get_list_actions()
                .iter()
                .map(|action| list_action_route(&admin_route, action.name()))
                .collect();
            let mut model_context =
                ModelContext::new(admin.clone(), admin_route.clone(), admin.get_proxy())
                    .with_cache_size(admin.get_cache_size());
            model_context.static_field_attributes = attributes;
            let model_context_name = bind_model_context(&root, model_context.into_ref())?;
            tracing::debug!(admin = %admin_route, model_context = %model_context_name, "opened table view");
            Ok(vec![ActionStep::OpenTableView(step::OpenTableView {
                admin_route,
                model_context: model_context_name,
                title: admin.verbose_name_plural(),
                columns,
                list_actions,
            })])
        }))
    }
}

#[cfg(test)]
#[path = "../tests/list_actions_tests.rs"]
mod tests;
