//! Actions patching a table view: scrolling, editing, selecting and sorting.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
};

use serde_json::json;
use shared::{
    domain::{
        ChangedRange, CompletionItem, DataCell, ItemFlags, ItemRole, ObjectId, RouteState,
        RowHeader, SelectionRange,
    },
    mode::{
        ChangeSelectionMode, CompletionMode, DeletedMode, RowDataMode, RunFieldActionMode,
        SetDataItem, SortMode,
    },
    step::{self, ActionStep, ChangedRanges, CreateUpdateDelete},
    Name,
};

use crate::{
    action::{
        deferred, parse_mode, resolve_action, Action, ActionContext, ActionRef, Resume,
        StepGenerator,
    },
    admin::{field_action_route, Admin, DynamicAttributes},
    error::{ActionError, NamingError},
    model_context::{lock, FieldActionModelContext, ModelContext, ModelContextRef},
    naming::{NamingContext, CRUD_ACTION},
    value::{bind_object, object_id_of, resolve_object, ObjectRef, Value},
};

pub const CHANGE_SELECTION: &str = "change_selection";
pub const COMPLETION: &str = "completion";
pub const ROW_COUNT: &str = "row_count";
pub const UPDATE: &str = "update";
pub const CREATED: &str = "created";
pub const DELETED: &str = "deleted";
pub const ROW_DATA: &str = "row_data";
pub const SET_COLUMNS: &str = "set_columns";
pub const SET_DATA: &str = "set_data";
pub const SORT: &str = "sort";
pub const RUN_FIELD_ACTION: &str = "run_field_action";

pub fn crud_action_route(action: &str) -> Name {
    Name::from([CRUD_ACTION, action])
}

/// Fill the `('crud_action', ...)` catalog; actions already present are kept.
pub fn register_crud_actions(root: &NamingContext) -> Result<(), NamingError> {
    let catalog = root.resolve_context(&Name::from([CRUD_ACTION]))?;
    let actions: Vec<ActionRef> = vec![
        Arc::new(ChangeSelection),
        Arc::new(Completion),
        Arc::new(RowCount),
        Arc::new(Update),
        Arc::new(Created),
        Arc::new(Deleted),
        Arc::new(RowData),
        Arc::new(SetColumns),
        Arc::new(SetData),
        Arc::new(Sort),
        Arc::new(RunFieldAction),
    ];
    for action in actions {
        if catalog.resolve(&Name::from([action.name()])).is_ok() {
            continue;
        }
        super::bind_action(&catalog, action)?;
    }
    Ok(())
}

fn row_header(model_context: &ModelContext, obj: &ObjectRef) -> RowHeader {
    let messages = model_context.validator.validate_object(obj);
    RowHeader {
        object_id: Some(obj.id()),
        verbose_identifier: model_context.admin.get_verbose_identifier(obj),
        valid: messages.is_empty(),
        message: messages.into_iter().next(),
    }
}

fn build_cell(
    root: &NamingContext,
    model_context: &ModelContext,
    row: usize,
    column: usize,
    obj: &ObjectRef,
    value: Option<&Value>,
    dynamic: &DynamicAttributes,
) -> DataCell {
    let mut cell = DataCell::new(row, column);
    let (Some(attributes), Some(value)) = (model_context.field_attributes(column), value) else {
        return cell;
    };
    let mut flags = ItemFlags::ENABLED
        | ItemFlags::SELECTABLE
        | ItemFlags::DRAG_ENABLED
        | ItemFlags::DROP_ENABLED;
    if dynamic.editable.unwrap_or(false) {
        flags = flags | ItemFlags::EDITABLE;
    }
    cell.flags = flags;
    attributes
        .delegate
        .fill_roles(&mut cell, value, attributes, dynamic, root);
    cell.set_role(ItemRole::Object, json!(obj.id().0));
    if !attributes.actions.is_empty() {
        let routes: Vec<Name> = attributes
            .actions
            .iter()
            .map(|action| field_action_route(&model_context.admin_route, &attributes.name, action))
            .collect();
        let states: Vec<_> = model_context
            .admin
            .get_field_actions(&attributes.name)
            .iter()
            .map(|action| action.get_state(None))
            .collect();
        cell.set_role(ItemRole::ActionRoutes, json!(routes));
        cell.set_role(ItemRole::ActionStates, json!(states));
    }
    cell
}

/// Push fresh values of `columns` into the caches and build the row patch.
///
/// Without `force` only cells whose value or attributes changed are included.
/// A field that cannot be read yields a cell without flags or roles.
pub(crate) fn add_data(
    root: &NamingContext,
    model_context: &mut ModelContext,
    row: usize,
    obj: &ObjectRef,
    columns: &[usize],
    force: bool,
) -> ChangedRange {
    let mut values = BTreeMap::new();
    let mut attributes = BTreeMap::new();
    let mut failed = BTreeSet::new();
    for &column in columns {
        let Some(field) = model_context.field_attributes(column).map(|a| a.name.clone()) else {
            continue;
        };
        match model_context.admin.get_field_value(obj, &field) {
            Ok(value) => {
                values.insert(column, value);
            }
            Err(err) => {
                tracing::warn!(row, field = %field, "cannot read field value: {err}");
                values.insert(column, Value::Null);
                failed.insert(column);
            }
        }
        attributes.insert(
            column,
            model_context.admin.get_dynamic_field_attributes(obj, &field),
        );
    }

    let mut changed = model_context
        .edit_cache
        .add_data(row, obj.id(), values.clone());
    changed.extend(
        model_context
            .attributes_cache
            .add_data(row, obj.id(), attributes.clone()),
    );
    let emitted: Vec<usize> = if force {
        values.keys().copied().collect()
    } else {
        changed.into_iter().collect()
    };

    let default_attributes = DynamicAttributes::default();
    let cells = emitted
        .into_iter()
        .map(|column| {
            let value = (!failed.contains(&column))
                .then(|| values.get(&column))
                .flatten();
            let dynamic = attributes.get(&column).unwrap_or(&default_attributes);
            build_cell(root, model_context, row, column, obj, value, dynamic)
        })
        .collect();
    ChangedRange {
        row,
        header: Some(row_header(model_context, obj)),
        cells,
    }
}

fn all_columns(model_context: &ModelContext) -> Vec<usize> {
    (0..model_context.static_field_attributes.len()).collect()
}

/// Resolve an object name, falling back to objects the view still holds.
fn locate(root: &NamingContext, model_context: &ModelContext, name: &Name) -> Option<ObjectRef> {
    match resolve_object(root, name) {
        Ok(obj) => Some(obj),
        Err(_) => object_id_of(name).and_then(|id| model_context.proxy.find(id)),
    }
}

fn row_count_step(model_context: &mut ModelContext) -> Result<ActionStep, ActionError> {
    let rows = model_context.proxy.len()?;
    model_context.clear_caches();
    model_context.collection_count = rows;
    Ok(ActionStep::RowCount(step::RowCount { rows }))
}

fn model_context_of(context: &ActionContext) -> Result<ModelContextRef, ActionError> {
    context.model().cloned()
}

/// Objects created, updated and deleted by a unit of work, each listed once.
#[derive(Default)]
pub(crate) struct ChangeSet {
    created: Vec<ObjectRef>,
    updated: Vec<ObjectRef>,
    deleted: Vec<ObjectRef>,
    seen: HashSet<ObjectId>,
}

impl ChangeSet {
    pub(crate) fn created(&mut self, obj: &ObjectRef) {
        if self.seen.insert(obj.id()) {
            self.created.push(obj.clone());
        }
    }

    pub(crate) fn updated(&mut self, obj: &ObjectRef) {
        if self.seen.insert(obj.id()) {
            self.updated.push(obj.clone());
        }
    }

    pub(crate) fn deleted(&mut self, obj: &ObjectRef) {
        if self.seen.insert(obj.id()) {
            self.deleted.push(obj.clone());
        } else if !self.deleted.iter().any(|o| o.id() == obj.id()) {
            self.created.retain(|o| o.id() != obj.id());
            self.updated.retain(|o| o.id() != obj.id());
            self.deleted.push(obj.clone());
        }
    }

    /// Partition depending objects by whether the admin reports them deleted.
    pub(crate) fn dependents(&mut self, admin: &dyn Admin, objects: Vec<ObjectRef>) {
        for obj in objects {
            if admin.is_deleted(&obj) {
                self.deleted(&obj);
            } else {
                self.updated(&obj);
            }
        }
    }

    pub(crate) fn into_step(self, root: &NamingContext) -> Result<Option<ActionStep>, ActionError> {
        let names = |objects: &[ObjectRef]| {
            objects
                .iter()
                .map(|obj| bind_object(root, obj))
                .collect::<Result<Vec<_>, _>>()
        };
        let step = CreateUpdateDelete {
            objects_created: names(&self.created)?,
            objects_updated: names(&self.updated)?,
            objects_deleted: names(&self.deleted)?,
        };
        Ok((!step.is_empty()).then_some(ActionStep::CreateUpdateDelete(step)))
    }
}

/// Defaults, validation, flush and dependents of an edited object.
///
/// Invalid objects are not flushed but still reported as updated, so their
/// header shows the validation message. A failed flush reverts the object
/// and leaves it out of the change set.
pub(crate) fn commit_object(
    admin: &dyn Admin,
    obj: &ObjectRef,
    depending_before: Vec<ObjectRef>,
    changes: &mut ChangeSet,
) {
    if let Err(err) = admin.set_defaults(obj) {
        tracing::warn!(object = obj.id().0, "setting defaults failed: {err}");
    }
    let messages = admin.get_validator().validate_object(obj);
    if messages.is_empty() {
        match admin.flush(obj) {
            Ok(outcome) if outcome.created => changes.created(obj),
            Ok(_) => changes.updated(obj),
            Err(err) => {
                tracing::warn!(object = obj.id().0, "flush failed: {err}");
                if let Err(err) = admin.refresh(obj) {
                    tracing::warn!(object = obj.id().0, "refresh after failed flush: {err}");
                }
                return;
            }
        }
    } else {
        tracing::debug!(object = obj.id().0, message = %messages[0], "object not flushed, invalid");
        changes.updated(obj);
    }
    let mut related = depending_before;
    related.extend(admin.get_depending_objects(obj));
    related.extend(admin.get_compounding_objects(obj));
    related.retain(|other| other.id() != obj.id());
    changes.dependents(admin, related);
}

pub struct ChangeSelection;

impl Action for ChangeSelection {
    fn name(&self) -> &str {
        CHANGE_SELECTION
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let mode: ChangeSelectionMode = parse_mode(CHANGE_SELECTION, mode)?;
        let model_context = model_context_of(&context)?;
        let root = root.clone();
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let mut current_row = mode.current_row;
            if let (Some(row), Some(expected)) = (mode.current_row, mode.current_row_id) {
                let actual = mc.object_at(row)?.map(|obj| obj.id());
                if actual != Some(expected) {
                    tracing::warn!(row, "current row no longer holds the selected object");
                    current_row = None;
                }
            }
            let mut selected_rows = Vec::with_capacity(mode.selected_rows.len());
            for range in &mode.selected_rows {
                let first = match range.first_id {
                    Some(id) => mc.object_at(range.first_row)?.map(|obj| obj.id()) == Some(id),
                    None => true,
                };
                let last = match range.last_id {
                    Some(id) => mc.object_at(range.last_row)?.map(|obj| obj.id()) == Some(id),
                    None => true,
                };
                if first && last {
                    selected_rows.push(SelectionRange::new(range.first_row, range.last_row));
                } else {
                    tracing::warn!(
                        first_row = range.first_row,
                        last_row = range.last_row,
                        "dropping stale selection range"
                    );
                }
            }
            mc.current_row = current_row;
            mc.current_column = mode.current_column;
            mc.current_field_name = mode.current_field_name.clone();
            mc.selection_count = selected_rows.iter().map(SelectionRange::row_count).sum();
            mc.selected_rows = selected_rows;
            mc.collection_count = mode.collection_count;

            let mut action_states = Vec::with_capacity(mode.action_routes.len());
            for route in &mode.action_routes {
                match resolve_action(&root, route) {
                    Ok(action) => action_states.push(RouteState {
                        route: route.clone(),
                        state: action.get_state(Some(&*mc)),
                    }),
                    Err(err) => tracing::warn!(route = %route, "skipping action state: {err}"),
                }
            }
            Ok(vec![ActionStep::ChangeSelection(step::ChangeSelection {
                action_states,
            })])
        }))
    }
}

pub struct Completion;

impl Action for Completion {
    fn name(&self) -> &str {
        COMPLETION
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let mode: CompletionMode = parse_mode(COMPLETION, mode)?;
        let model_context = model_context_of(&context)?;
        let root = root.clone();
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let mut completions = Vec::new();
            let field = mc.field_attributes(mode.column).map(|a| a.name.clone());
            if let (Some(obj), Some(field)) = (mc.object_at(mode.row)?, field) {
                let candidates = mc.admin.get_completions(&obj, &field, &mode.prefix)?;
                for candidate in &candidates {
                    completions.push(CompletionItem {
                        name: bind_object(&root, candidate)?,
                        verbose_name: mc.admin.get_verbose_identifier(candidate),
                        tooltip: None,
                    });
                }
                mc.completions = candidates;
            }
            Ok(vec![ActionStep::Completion(step::Completion {
                row: mode.row,
                column: mode.column,
                prefix: mode.prefix,
                completions,
            })])
        }))
    }
}

pub struct RowCount;

impl Action for RowCount {
    fn name(&self) -> &str {
        ROW_COUNT
    }

    fn model_run(
        &self,
        _root: &Arc<NamingContext>,
        context: ActionContext,
        _mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let model_context = model_context_of(&context)?;
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            Ok(vec![row_count_step(&mut mc)?])
        }))
    }
}

pub struct Update;

impl Action for Update {
    fn name(&self) -> &str {
        UPDATE
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let names: Vec<Name> = parse_mode(UPDATE, mode)?;
        let model_context = model_context_of(&context)?;
        let root = root.clone();
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let mut changed_ranges = Vec::new();
            for name in &names {
                let Some(obj) = locate(&root, &mc, name) else {
                    continue;
                };
                let Ok(row) = mc.proxy.index(&obj) else {
                    continue;
                };
                if mc.edit_cache.get_owner(row) != Some(obj.id()) {
                    continue;
                }
                let columns: Vec<usize> = mc.edit_cache.get_data(row)?.keys().copied().collect();
                changed_ranges.push(add_data(&root, &mut mc, row, &obj, &columns, false));
            }
            if changed_ranges.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![ActionStep::Update(ChangedRanges { changed_ranges })])
        }))
    }
}

pub struct Created;

impl Action for Created {
    fn name(&self) -> &str {
        CREATED
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let names: Vec<Name> = parse_mode(CREATED, mode)?;
        let model_context = model_context_of(&context)?;
        let root = root.clone();
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let objects: Vec<ObjectRef> = names
                .iter()
                .filter_map(|name| locate(&root, &mc, name))
                .filter(|obj| obj.kind() == mc.admin.entity_kind())
                .collect();
            created_steps(&root, &mut mc, objects)
        }))
    }
}

/// Append `objects` to the view and ship their full rows.
pub(crate) fn created_steps(
    root: &NamingContext,
    model_context: &mut ModelContext,
    objects: Vec<ObjectRef>,
) -> Result<Vec<ActionStep>, ActionError> {
    let rows_before = model_context.proxy.len()?;
    let columns = all_columns(model_context);
    let mut changed_ranges = Vec::with_capacity(objects.len());
    for obj in objects {
        if !model_context.proxy.contains(&obj) {
            model_context.proxy.append(obj.clone())?;
        }
        let row = match model_context.proxy.index(&obj) {
            Ok(row) => row,
            Err(err) => {
                tracing::debug!(object = obj.id().0, "created object not in view: {err}");
                continue;
            }
        };
        changed_ranges.push(add_data(root, model_context, row, &obj, &columns, true));
    }
    let mut steps = Vec::new();
    if !changed_ranges.is_empty() {
        steps.push(ActionStep::Created(ChangedRanges { changed_ranges }));
    }
    let rows = model_context.proxy.len()?;
    if rows != rows_before {
        model_context.collection_count = rows;
        steps.push(ActionStep::RowCount(step::RowCount { rows }));
    }
    Ok(steps)
}

pub struct Deleted;

impl Action for Deleted {
    fn name(&self) -> &str {
        DELETED
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let mode: DeletedMode = parse_mode(DELETED, mode)?;
        let model_context = model_context_of(&context)?;
        let root = root.clone();
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let rows_before = mc.proxy.len()?;
            let mut changed_ranges = Vec::new();
            for name in &mode.objects {
                let Some(obj) = locate(&root, &mc, name) else {
                    continue;
                };
                let Ok(row) = mc.proxy.index(&obj) else {
                    continue;
                };
                mc.proxy.remove(&obj)?;
                changed_ranges.push(ChangedRange {
                    row,
                    header: Some(RowHeader::emptied()),
                    cells: Vec::new(),
                });
            }
            let mut steps = Vec::new();
            if !changed_ranges.is_empty() {
                mc.clear_caches();
                steps.push(ActionStep::Update(ChangedRanges { changed_ranges }));
            }
            let rows = mc.proxy.len()?;
            if rows != mode.rows.unwrap_or(rows_before) {
                steps.push(row_count_step(&mut mc)?);
            }
            Ok(steps)
        }))
    }
}

pub struct RowData;

impl Action for RowData {
    fn name(&self) -> &str {
        ROW_DATA
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let mode: RowDataMode = parse_mode(ROW_DATA, mode)?;
        let model_context = model_context_of(&context)?;
        let root = root.clone();
        Ok(deferred(move || {
            let rows: BTreeSet<usize> = mode.rows.iter().copied().collect();
            let (Some(&first), Some(&last)) = (rows.first(), rows.last()) else {
                return Ok(Vec::new());
            };
            let mut mc = lock(&model_context);
            let columns: Vec<usize> = if mode.columns.is_empty() {
                all_columns(&mc)
            } else {
                mode.columns
                    .iter()
                    .copied()
                    .filter(|&column| column < mc.static_field_attributes.len())
                    .collect()
            };
            let objects = mc.proxy.get(first..last.saturating_add(1))?;
            let mut changed_ranges = Vec::with_capacity(rows.len());
            for row in rows {
                if let Some(obj) = objects.get(row - first) {
                    changed_ranges.push(add_data(&root, &mut mc, row, obj, &columns, true));
                }
            }
            if changed_ranges.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![ActionStep::Update(ChangedRanges { changed_ranges })])
        }))
    }
}

pub struct SetColumns;

impl Action for SetColumns {
    fn name(&self) -> &str {
        SET_COLUMNS
    }

    fn model_run(
        &self,
        _root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let fields: Vec<String> = parse_mode(SET_COLUMNS, mode)?;
        let model_context = model_context_of(&context)?;
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let attributes = fields
                .iter()
                .map(|field| mc.admin.get_static_field_attributes(field))
                .collect::<Result<Vec<_>, _>>()?;
            if attributes != mc.static_field_attributes {
                mc.static_field_attributes = attributes;
                mc.clear_caches();
            }
            let columns = mc
                .static_field_attributes
                .iter()
                .map(|attributes| attributes.to_column(&mc.admin_route))
                .collect();
            Ok(vec![ActionStep::SetColumns(step::SetColumns {
                admin_route: mc.admin_route.clone(),
                columns,
            })])
        }))
    }
}

pub struct SetData;

impl Action for SetData {
    fn name(&self) -> &str {
        SET_DATA
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let items: Vec<SetDataItem> = parse_mode(SET_DATA, mode)?;
        let model_context = model_context_of(&context)?;
        let root = root.clone();
        Ok(deferred(move || {
            let mut by_row: BTreeMap<usize, Vec<SetDataItem>> = BTreeMap::new();
            for item in items {
                by_row.entry(item.row).or_default().push(item);
            }
            let mut mc = lock(&model_context);
            let admin = mc.admin.clone();
            let mut changes = ChangeSet::default();
            for (row, items) in by_row {
                let Some(obj) = mc.object_at(row)? else {
                    tracing::warn!(row, "set data on a row past the end");
                    continue;
                };
                let mut depending_before = None;
                for item in items {
                    if item.object_id != obj.id() {
                        tracing::warn!(row, "row no longer holds the edited object");
                        continue;
                    }
                    let Some(attributes) = mc.field_attributes(item.column).cloned() else {
                        continue;
                    };
                    if attributes.storage_key {
                        continue;
                    }
                    let dynamic = admin.get_dynamic_field_attributes(&obj, &attributes.name);
                    if dynamic.editable != Some(true) {
                        tracing::debug!(row, field = %attributes.name, "skipping write to read-only field");
                        continue;
                    }
                    let value = match attributes.delegate.from_wire(&item.value, &root) {
                        Ok(value) => value,
                        Err(message) => {
                            tracing::warn!(row, field = %attributes.name, "rejected value: {message}");
                            continue;
                        }
                    };
                    if !attributes.delegate.is_collection() {
                        match admin.get_field_value(&obj, &attributes.name) {
                            Ok(old) if old == value => continue,
                            Ok(_) => {}
                            Err(err) => {
                                tracing::warn!(row, field = %attributes.name, "cannot read field value: {err}");
                            }
                        }
                    }
                    if depending_before.is_none() {
                        depending_before = Some(admin.get_depending_objects(&obj));
                    }
                    if let Err(err) = admin.set_field_value(&obj, &attributes.name, value) {
                        tracing::warn!(row, field = %attributes.name, "cannot set field value: {err}");
                    }
                }
                if let Some(depending_before) = depending_before {
                    commit_object(admin.as_ref(), &obj, depending_before, &mut changes);
                }
            }
            Ok(changes.into_step(&root)?.into_iter().collect())
        }))
    }
}

pub struct Sort;

impl Action for Sort {
    fn name(&self) -> &str {
        SORT
    }

    fn model_run(
        &self,
        _root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let mode: SortMode = parse_mode(SORT, mode)?;
        let model_context = model_context_of(&context)?;
        Ok(deferred(move || {
            let mut mc = lock(&model_context);
            let field = match mode.column {
                Some(column) => Some(
                    mc.field_attributes(column)
                        .map(|attributes| attributes.name.clone())
                        .ok_or_else(|| {
                            ActionError::invalid_mode(SORT, format!("no column {column}"))
                        })?,
                ),
                None => None,
            };
            let descending = mode.order == shared::domain::SortOrder::Descending;
            mc.proxy.sort(field.as_deref(), descending)?;
            Ok(vec![row_count_step(&mut mc)?])
        }))
    }
}

pub struct RunFieldAction;

impl Action for RunFieldAction {
    fn name(&self) -> &str {
        RUN_FIELD_ACTION
    }

    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError> {
        let mode: RunFieldActionMode = parse_mode(RUN_FIELD_ACTION, mode)?;
        Ok(Box::new(FieldActionRun {
            root: root.clone(),
            model_context: model_context_of(&context)?,
            mode: Some(mode),
            running: None,
            finished: false,
        }))
    }
}

struct RunningFieldAction {
    inner: Box<dyn StepGenerator>,
    admin: Arc<dyn Admin>,
    obj: ObjectRef,
    field: String,
    collection: bool,
    value_before: Value,
    depending_before: Vec<ObjectRef>,
}

/// Forwards the steps of a field action, then reports the edited object if
/// its field value changed.
struct FieldActionRun {
    root: Arc<NamingContext>,
    model_context: ModelContextRef,
    mode: Option<RunFieldActionMode>,
    running: Option<RunningFieldAction>,
    finished: bool,
}

impl FieldActionRun {
    fn start(&mut self, mode: RunFieldActionMode) -> Result<RunningFieldAction, ActionError> {
        let mut mc = lock(&self.model_context);
        let obj = mc
            .object_at(mode.row)?
            .filter(|obj| obj.id() == mode.object_id)
            .ok_or_else(|| {
                ActionError::programming(format!(
                    "row {} does not hold object {}",
                    mode.row, mode.object_id.0
                ))
            })?;
        let attributes = mc.field_attributes(mode.column).cloned().ok_or_else(|| {
            ActionError::invalid_mode(RUN_FIELD_ACTION, format!("no column {}", mode.column))
        })?;
        let admin = mc.admin.clone();
        let admin_route = mc.admin_route.clone();
        drop(mc);

        let value = admin.get_field_value(&obj, &attributes.name)?;
        let field_context = FieldActionModelContext {
            admin: admin.clone(),
            admin_route,
            obj: obj.clone(),
            field: attributes.name.clone(),
            value: value.clone(),
            dynamic_attributes: admin.get_dynamic_field_attributes(&obj, &attributes.name),
            field_attributes: attributes.clone(),
        };
        let action = resolve_action(&self.root, &mode.action_route)?;
        let depending_before = admin.get_depending_objects(&obj);
        let inner = action.model_run(
            &self.root,
            ActionContext::Field(field_context),
            mode.action_mode,
        )?;
        Ok(RunningFieldAction {
            inner,
            admin,
            obj,
            field: attributes.name,
            collection: attributes.delegate.is_collection(),
            value_before: value,
            depending_before,
        })
    }
}

impl StepGenerator for FieldActionRun {
    fn resume(&mut self, resume: Resume) -> Result<Option<ActionStep>, ActionError> {
        if self.finished {
            return match resume {
                Resume::Throw(err) => Err(err),
                _ => Ok(None),
            };
        }
        if let Some(mode) = self.mode.take() {
            if let Resume::Throw(err) = resume {
                self.finished = true;
                return Err(err);
            }
            self.running = Some(self.start(mode)?);
        }
        let Some(running) = self.running.as_mut() else {
            return Ok(None);
        };
        if let Some(step) = running.inner.resume(resume)? {
            return Ok(Some(step));
        }

        self.finished = true;
        let Some(running) = self.running.take() else {
            return Ok(None);
        };
        let value_after = running.admin.get_field_value(&running.obj, &running.field)?;
        if !running.collection && value_after == running.value_before {
            return Ok(None);
        }
        let mut changes = ChangeSet::default();
        commit_object(
            running.admin.as_ref(),
            &running.obj,
            running.depending_before,
            &mut changes,
        );
        changes.into_step(&self.root)
    }
}

#[cfg(test)]
#[path = "../tests/crud_tests.rs"]
mod tests;
