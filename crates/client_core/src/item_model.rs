//! UI-side cache of a table, patched by the steps the worker sends.

use std::collections::BTreeMap;

use shared::{
    domain::{ColumnAttributes, DataCell, ItemRole, ObjectId, RouteState, RowHeader},
    step::{ActionStep, ChangedRanges, Completion, OpenTableView},
    Name,
};

/// Table model mirroring the rows a view has been sent so far.
#[derive(Debug, Clone)]
pub struct ItemModel {
    model_context: Name,
    admin_route: Name,
    title: String,
    fields: Vec<String>,
    list_actions: Vec<Name>,
    columns: Vec<ColumnAttributes>,
    rows: usize,
    headers: BTreeMap<usize, RowHeader>,
    cells: BTreeMap<(usize, usize), DataCell>,
    completion: Option<Completion>,
    action_states: Vec<RouteState>,
}

impl ItemModel {
    pub fn new(model_context: Name, admin_route: Name, fields: Vec<String>) -> Self {
        Self {
            model_context,
            admin_route,
            title: String::new(),
            fields,
            list_actions: Vec::new(),
            columns: Vec::new(),
            rows: 0,
            headers: BTreeMap::new(),
            cells: BTreeMap::new(),
            completion: None,
            action_states: Vec::new(),
        }
    }

    pub fn from_open_table_view(step: &OpenTableView) -> Self {
        let mut model = Self::new(
            step.model_context.clone(),
            step.admin_route.clone(),
            step.columns.clone(),
        );
        model.title = step.title.clone();
        model.list_actions = step.list_actions.clone();
        model
    }

    pub fn model_context(&self) -> &Name {
        &self.model_context
    }

    pub fn admin_route(&self) -> &Name {
        &self.admin_route
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn list_actions(&self) -> &[Name] {
        &self.list_actions
    }

    pub fn columns(&self) -> &[ColumnAttributes] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn header(&self, row: usize) -> Option<&RowHeader> {
        self.headers.get(&row)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&DataCell> {
        self.cells.get(&(row, column))
    }

    /// Edit role of a cell, the value a view displays.
    pub fn data(&self, row: usize, column: usize) -> Option<&serde_json::Value> {
        self.cell(row, column)?.role(ItemRole::Edit)
    }

    pub fn object_id(&self, row: usize) -> Option<ObjectId> {
        self.header(row)?.object_id
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn action_states(&self) -> &[RouteState] {
        &self.action_states
    }

    /// Rows below `rows` that were never received.
    pub fn missing_rows(&self, rows: impl IntoIterator<Item = usize>) -> Vec<usize> {
        rows.into_iter()
            .filter(|row| *row < self.rows && !self.headers.contains_key(row))
            .collect()
    }

    /// Apply a model patch. Returns false for steps that do not patch a model.
    pub fn apply(&mut self, step: &ActionStep) -> bool {
        match step {
            ActionStep::RowCount(count) => {
                // a row count resets the view, rows may have moved
                self.headers.clear();
                self.cells.clear();
                self.rows = count.rows;
            }
            ActionStep::SetColumns(set_columns) => {
                if self.columns != set_columns.columns {
                    self.cells.clear();
                }
                self.fields = set_columns
                    .columns
                    .iter()
                    .map(|column| column.field_name.clone())
                    .collect();
                self.columns = set_columns.columns.clone();
            }
            ActionStep::Update(ranges) => self.patch(ranges),
            ActionStep::Created(ranges) => {
                self.patch(ranges);
                if let Some(last) = ranges.changed_ranges.iter().map(|range| range.row).max() {
                    self.rows = self.rows.max(last + 1);
                }
            }
            ActionStep::Completion(completion) => self.completion = Some(completion.clone()),
            ActionStep::ChangeSelection(selection) => {
                self.action_states = selection.action_states.clone();
            }
            _ => return false,
        }
        true
    }

    fn patch(&mut self, ranges: &ChangedRanges) {
        for range in &ranges.changed_ranges {
            if let Some(header) = &range.header {
                if header.object_id.is_none() {
                    self.cells.retain(|(row, _), _| *row != range.row);
                }
                self.headers.insert(range.row, header.clone());
            }
            for cell in &range.cells {
                self.cells.insert((cell.row, cell.column), cell.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/item_model_tests.rs"]
mod tests;
