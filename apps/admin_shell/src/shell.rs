//! Table operations of the console, each driven to completion through the
//! client bridge.

use std::{
    fmt::Write as _,
    io::{self, BufRead, Write as _},
    time::Duration,
};

use anyhow::{anyhow, bail, Context};
use camelot_core::{
    action::list_actions::{APPLY_FILTER, DELETE_SELECTION, INSERT_OBJECT},
    admin::list_action_route,
};
use client_core::{ClientBridge, ClientEvent, DialogAnswer, DialogHandler, RunOutcome};
use serde_json::json;
use shared::{
    domain::SortOrder,
    mode::{ApplyFilterMode, ChangeSelectionMode, FilterOp, SelectedRows, SetDataItem},
    step::{ActionStep, MessageBox, StandardButton},
    Name,
};

pub const RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Prints dialogs on the terminal and reads a yes/no answer from stdin.
pub struct ConsoleDialogs {
    assume_yes: bool,
}

impl ConsoleDialogs {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    fn confirm(&self) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("[y/N] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => matches!(line.trim(), "y" | "Y" | "yes"),
            Err(err) => {
                tracing::warn!("cannot read answer: {err}");
                false
            }
        }
    }
}

fn pick(message: &MessageBox, preferred: [StandardButton; 2]) -> Option<StandardButton> {
    preferred
        .into_iter()
        .find(|button| message.standard_buttons.contains(button))
}

impl DialogHandler for ConsoleDialogs {
    fn answer(&mut self, step: &ActionStep) -> DialogAnswer {
        let ActionStep::MessageBox(message) = step else {
            println!("cannot show {} in the console, cancelling", step.step_type());
            return DialogAnswer::cancel();
        };
        println!("{}: {}", message.title, message.text);
        let accepted = self.confirm();
        let button = if accepted {
            pick(message, [StandardButton::Yes, StandardButton::Ok])
        } else {
            pick(message, [StandardButton::No, StandardButton::Cancel])
        };
        match button {
            Some(button) => DialogAnswer::button(button),
            None => DialogAnswer::cancel(),
        }
    }

    fn notify(&mut self, step: &ActionStep) {
        if let ActionStep::MessageBox(message) = step {
            eprintln!("{}: {}", message.title, message.text);
            if let Some(resolution) = &message.resolution {
                eprintln!("  {resolution}");
            }
        }
    }
}

pub struct Shell<D: DialogHandler> {
    bridge: ClientBridge<D>,
    admin_route: Name,
    timeout: Duration,
}

impl<D: DialogHandler> Shell<D> {
    pub fn new(bridge: ClientBridge<D>, admin_route: Name) -> Self {
        Self {
            bridge,
            admin_route,
            timeout: RUN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bridge(&self) -> &ClientBridge<D> {
        &self.bridge
    }

    /// Wait for `gui_run` and for the follow-up runs it caused.
    fn finish(&mut self, gui_run: Name) -> anyhow::Result<RunOutcome> {
        let outcome = self.bridge.wait_for(&gui_run, self.timeout)?;
        self.bridge.settle(self.timeout)?;
        self.bridge.clear_stopped();
        if let RunOutcome::Failed(exception) = &outcome {
            bail!("{}", exception.text);
        }
        Ok(outcome)
    }

    /// Open a table view on the person admin and load every row.
    pub fn open(&mut self) -> anyhow::Result<Name> {
        let gui_run = self.bridge.open_table(&self.admin_route)?;
        self.finish(gui_run)?;
        let table = self
            .bridge
            .events()
            .try_iter()
            .filter_map(|event| match event {
                ClientEvent::TableOpened { model_context, .. } => Some(model_context),
                _ => None,
            })
            .last()
            .ok_or_else(|| anyhow!("the table view did not open"))?;
        self.fetch_all(&table)?;
        Ok(table)
    }

    pub fn fetch_all(&mut self, table: &Name) -> anyhow::Result<()> {
        let rows = self.row_count(table)?;
        if let Some(gui_run) = self.bridge.request_rows(table, 0..rows)? {
            self.finish(gui_run)?;
        }
        Ok(())
    }

    pub fn row_count(&self, table: &Name) -> anyhow::Result<usize> {
        Ok(self
            .bridge
            .model(table)
            .with_context(|| format!("table {table} is not open"))?
            .row_count())
    }

    fn column_of(&self, table: &Name, field: &str) -> anyhow::Result<usize> {
        let model = self
            .bridge
            .model(table)
            .with_context(|| format!("table {table} is not open"))?;
        model
            .fields()
            .iter()
            .position(|name| name == field)
            .with_context(|| format!("no column named '{field}'"))
    }

    pub fn sort(&mut self, table: &Name, field: &str, descending: bool) -> anyhow::Result<()> {
        let column = self.column_of(table, field)?;
        let order = if descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        let gui_run = self.bridge.sort(table, Some(column), order)?;
        self.finish(gui_run)?;
        self.fetch_all(table)
    }

    pub fn filter(
        &mut self,
        table: &Name,
        field: &str,
        operator: FilterOp,
        value: serde_json::Value,
    ) -> anyhow::Result<()> {
        let mode = ApplyFilterMode {
            field: field.to_string(),
            operator,
            value,
            clear: false,
        };
        let gui_run = self.bridge.initiate(
            list_action_route(&self.admin_route, APPLY_FILTER),
            table.clone(),
            serde_json::to_value(mode)?,
        )?;
        self.finish(gui_run)?;
        self.fetch_all(table)
    }

    /// Insert a row, then write `values` into it; returns the new row.
    pub fn add(
        &mut self,
        table: &Name,
        values: &[(&str, serde_json::Value)],
    ) -> anyhow::Result<usize> {
        let gui_run = self.bridge.initiate(
            list_action_route(&self.admin_route, INSERT_OBJECT),
            table.clone(),
            serde_json::Value::Null,
        )?;
        self.finish(gui_run)?;
        self.fetch_all(table)?;

        let row = self
            .row_count(table)?
            .checked_sub(1)
            .context("insert left the table empty")?;
        let object_id = self
            .bridge
            .model(table)
            .and_then(|model| model.object_id(row))
            .context("inserted row has no object")?;
        let mut items = Vec::with_capacity(values.len());
        for (field, value) in values {
            items.push(SetDataItem {
                row,
                object_id,
                column: self.column_of(table, field)?,
                value: value.clone(),
            });
        }
        let gui_run = self.bridge.set_data(table, items)?;
        self.finish(gui_run)?;
        self.fetch_all(table)?;
        Ok(row)
    }

    pub fn edit(
        &mut self,
        table: &Name,
        row: usize,
        field: &str,
        value: serde_json::Value,
    ) -> anyhow::Result<()> {
        let object_id = self
            .bridge
            .model(table)
            .and_then(|model| model.object_id(row))
            .with_context(|| format!("no row {row}"))?;
        let item = SetDataItem {
            row,
            object_id,
            column: self.column_of(table, field)?,
            value,
        };
        let gui_run = self.bridge.set_data(table, vec![item])?;
        self.finish(gui_run)?;
        self.fetch_all(table)
    }

    /// Select `row` and run the delete action on it; the dialog handler
    /// decides whether it goes through.
    pub fn remove(&mut self, table: &Name, row: usize) -> anyhow::Result<bool> {
        let rows = self.row_count(table)?;
        if row >= rows {
            bail!("no row {row}, the table has {rows}");
        }
        let mode = ChangeSelectionMode {
            current_row: Some(row),
            selected_rows: vec![SelectedRows {
                first_row: row,
                last_row: row,
                first_id: self.bridge.model(table).and_then(|model| model.object_id(row)),
                last_id: None,
            }],
            collection_count: rows,
            ..ChangeSelectionMode::default()
        };
        let gui_run = self.bridge.change_selection(table, mode)?;
        self.finish(gui_run)?;

        let gui_run = self.bridge.initiate(
            list_action_route(&self.admin_route, DELETE_SELECTION),
            table.clone(),
            serde_json::Value::Null,
        )?;
        self.finish(gui_run)?;
        self.fetch_all(table)?;
        Ok(self.row_count(table)? < rows)
    }

    /// The table as aligned text, one line per row.
    pub fn render(&self, table: &Name) -> anyhow::Result<String> {
        let model = self
            .bridge
            .model(table)
            .with_context(|| format!("table {table} is not open"))?;
        let headings: Vec<String> = if model.columns().is_empty() {
            model.fields().to_vec()
        } else {
            model
                .columns()
                .iter()
                .map(|column| column.verbose_name.clone())
                .collect()
        };
        let mut grid = vec![headings];
        for row in 0..model.row_count() {
            grid.push(
                (0..model.fields().len())
                    .map(|column| display(model.data(row, column)))
                    .collect(),
            );
        }
        let widths: Vec<usize> = (0..grid[0].len())
            .map(|column| grid.iter().map(|line| line[column].len()).max().unwrap_or(0))
            .collect();

        let mut out = format!("{} ({} rows)\n", model.title(), model.row_count());
        for (index, line) in grid.iter().enumerate() {
            let label = if index == 0 {
                "#".to_string()
            } else {
                (index - 1).to_string()
            };
            let _ = write!(out, "{label:>3} ");
            for (cell, width) in line.iter().zip(&widths) {
                let _ = write!(out, " {cell:<width$}");
            }
            out.truncate(out.trim_end().len());
            out.push('\n');
        }
        Ok(out)
    }

    pub fn shutdown(self) {
        self.bridge.shutdown();
    }
}

fn display(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Parse a filter operator the way it is spelled on the wire.
pub fn parse_operator(raw: &str) -> anyhow::Result<FilterOp> {
    serde_json::from_value(json!(raw)).with_context(|| format!("unknown filter operator '{raw}'"))
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
