//! UI side of the worker protocol: starts runs, answers dialogs and keeps
//! the open item models in sync.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::{Duration, Instant},
};

use camelot_core::{
    action::{
        crud::{
            crud_action_route, CHANGE_SELECTION, COMPLETION, CREATED, DELETED, ROW_COUNT,
            ROW_DATA, SET_COLUMNS, SET_DATA, SORT, UPDATE,
        },
        list_actions::OPEN_TABLE_VIEW,
    },
    admin::top_action_route,
    worker::WorkerHandle,
    NamingContext,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use shared::{
    domain::SortOrder,
    error::WireException,
    mode::{ChangeSelectionMode, CompletionMode, DeletedMode, RowDataMode, SetDataItem, SortMode},
    protocol::{AbstractRequest, AbstractResponse},
    step::{ActionStep, CreateUpdateDelete, OpenTableView, UpdateProgress},
    Name,
};

use crate::{
    dialog::{DialogAnswer, DialogHandler},
    error::{ClientError, Result},
    item_model::ItemModel,
};

pub const GUI_RUN: &str = "gui_run";

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed(WireException),
}

impl RunOutcome {
    fn from_exception(exception: Option<WireException>) -> Self {
        match exception {
            None => RunOutcome::Completed,
            Some(exception) if exception.is_cancel() => RunOutcome::Cancelled,
            Some(exception) => RunOutcome::Failed(exception),
        }
    }
}

/// A run as the UI sees it, keyed by the name the UI gave it.
#[derive(Debug, Clone)]
pub struct GuiRun {
    pub gui_run_name: Name,
    pub action_name: Name,
    pub model_context: Name,
    /// Worker-side name, known once the first step arrives.
    pub run_name: Option<Name>,
    pub progress_titles: Vec<String>,
    pub last_progress: Option<UpdateProgress>,
    pub outcome: Option<RunOutcome>,
}

impl GuiRun {
    pub fn is_stopped(&self) -> bool {
        self.outcome.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Busy(bool),
    TableOpened {
        model_context: Name,
        title: String,
    },
    ModelPatched {
        model_context: Name,
        step_type: &'static str,
    },
    Progress {
        gui_run_name: Name,
        progress: UpdateProgress,
    },
    ObjectsChanged(CreateUpdateDelete),
    /// Steps the bridge has no handling for, such as `OpenFormView`.
    Step {
        gui_run_name: Name,
        step: ActionStep,
    },
    RunStopped {
        gui_run_name: Name,
        outcome: RunOutcome,
    },
}

pub struct ClientBridge<D: DialogHandler> {
    worker: WorkerHandle,
    dialogs: D,
    next_gui_run: u64,
    runs: HashMap<Name, GuiRun>,
    models: BTreeMap<Name, ItemModel>,
    events: Sender<ClientEvent>,
    events_rx: Receiver<ClientEvent>,
    busy: bool,
}

impl<D: DialogHandler> ClientBridge<D> {
    pub fn new(worker: WorkerHandle, dialogs: D) -> Self {
        let (events, events_rx) = unbounded();
        Self {
            worker,
            dialogs,
            next_gui_run: 1,
            runs: HashMap::new(),
            models: BTreeMap::new(),
            events,
            events_rx,
            busy: false,
        }
    }

    pub fn root(&self) -> &Arc<NamingContext> {
        self.worker.root()
    }

    pub fn events(&self) -> &Receiver<ClientEvent> {
        &self.events_rx
    }

    pub fn dialogs(&self) -> &D {
        &self.dialogs
    }

    pub fn dialogs_mut(&mut self) -> &mut D {
        &mut self.dialogs
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn run(&self, gui_run_name: &Name) -> Option<&GuiRun> {
        self.runs.get(gui_run_name)
    }

    pub fn pending_runs(&self) -> usize {
        self.runs.values().filter(|run| !run.is_stopped()).count()
    }

    /// Forget the bookkeeping of runs that have stopped.
    pub fn clear_stopped(&mut self) {
        self.runs.retain(|_, run| !run.is_stopped());
    }

    pub fn model(&self, model_context: &Name) -> Option<&ItemModel> {
        self.models.get(model_context)
    }

    pub fn models(&self) -> impl Iterator<Item = &ItemModel> {
        self.models.values()
    }

    pub fn register_model(&mut self, model: ItemModel) {
        tracing::debug!(model_context = %model.model_context(), "item model registered");
        self.models.insert(model.model_context().clone(), model);
    }

    pub fn close_model(&mut self, model_context: &Name) -> Option<ItemModel> {
        self.models.remove(model_context)
    }

    /// Post `InitiateAction` under a fresh `('gui_run', '<id>')` name.
    pub fn initiate(
        &mut self,
        action_name: Name,
        model_context: Name,
        mode: serde_json::Value,
    ) -> Result<Name> {
        let id = self.next_gui_run.to_string();
        self.next_gui_run += 1;
        let gui_run_name = Name::from([GUI_RUN, id.as_str()]);
        self.worker.post(AbstractRequest::InitiateAction {
            gui_run_name: gui_run_name.clone(),
            action_name: action_name.clone(),
            model_context_name: model_context.clone(),
            mode,
        })?;
        tracing::debug!(gui_run = %gui_run_name, action = %action_name, "action initiated");
        self.runs.insert(
            gui_run_name.clone(),
            GuiRun {
                gui_run_name: gui_run_name.clone(),
                action_name,
                model_context,
                run_name: None,
                progress_titles: Vec::new(),
                last_progress: None,
                outcome: None,
            },
        );
        Ok(gui_run_name)
    }

    /// Initiate one of the table actions on an open item model.
    pub fn crud(&mut self, model_context: &Name, action: &str, mode: impl Serialize) -> Result<Name> {
        if !self.models.contains_key(model_context) {
            return Err(ClientError::UnknownModel(model_context.clone()));
        }
        let mode = serde_json::to_value(mode)?;
        self.initiate(crud_action_route(action), model_context.clone(), mode)
    }

    pub fn open_table(&mut self, admin_route: &Name) -> Result<Name> {
        self.initiate(
            top_action_route(admin_route, OPEN_TABLE_VIEW),
            Name::null(),
            serde_json::Value::Null,
        )
    }

    /// Ask for the rows in `rows` the model has not received yet.
    pub fn request_rows(
        &mut self,
        model_context: &Name,
        rows: impl IntoIterator<Item = usize>,
    ) -> Result<Option<Name>> {
        let model = self
            .models
            .get(model_context)
            .ok_or_else(|| ClientError::UnknownModel(model_context.clone()))?;
        let missing = model.missing_rows(rows);
        if missing.is_empty() {
            return Ok(None);
        }
        let mode = RowDataMode {
            rows: missing,
            columns: Vec::new(),
        };
        self.crud(model_context, ROW_DATA, mode).map(Some)
    }

    pub fn set_data(&mut self, model_context: &Name, items: Vec<SetDataItem>) -> Result<Name> {
        self.crud(model_context, SET_DATA, items)
    }

    pub fn sort(
        &mut self,
        model_context: &Name,
        column: Option<usize>,
        order: SortOrder,
    ) -> Result<Name> {
        self.crud(model_context, SORT, SortMode { column, order })
    }

    pub fn complete(
        &mut self,
        model_context: &Name,
        row: usize,
        column: usize,
        prefix: impl Into<String>,
    ) -> Result<Name> {
        let mode = CompletionMode {
            row,
            column,
            prefix: prefix.into(),
        };
        self.crud(model_context, COMPLETION, mode)
    }

    pub fn change_selection(
        &mut self,
        model_context: &Name,
        mut mode: ChangeSelectionMode,
    ) -> Result<Name> {
        if mode.action_routes.is_empty() {
            if let Some(model) = self.models.get(model_context) {
                mode.action_routes = model.list_actions().to_vec();
            }
        }
        self.crud(model_context, CHANGE_SELECTION, mode)
    }

    /// Cancel a run that is still going; a stopped run is left alone.
    pub fn cancel(&self, gui_run_name: &Name) -> Result<()> {
        let run = self
            .runs
            .get(gui_run_name)
            .ok_or_else(|| ClientError::UnknownRun(gui_run_name.clone()))?;
        if run.is_stopped() {
            return Ok(());
        }
        let run_name = run
            .run_name
            .clone()
            .ok_or_else(|| ClientError::RunNotStarted(gui_run_name.clone()))?;
        self.worker.post(AbstractRequest::CancelAction { run_name })?;
        Ok(())
    }

    /// Handle every response already waiting, without blocking.
    pub fn process_pending(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Ok(response) = self.worker.responses().try_recv() {
            self.handle(response)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Handle responses until `gui_run_name` stops.
    pub fn wait_for(&mut self, gui_run_name: &Name, timeout: Duration) -> Result<RunOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let run = self
                .runs
                .get(gui_run_name)
                .ok_or_else(|| ClientError::UnknownRun(gui_run_name.clone()))?;
            if let Some(outcome) = &run.outcome {
                return Ok(outcome.clone());
            }
            self.receive(deadline)?;
        }
    }

    /// Handle responses until no run is pending, including the ones the
    /// bridge started itself.
    pub fn settle(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.pending_runs() > 0 {
            self.receive(deadline)?;
        }
        self.process_pending()?;
        Ok(())
    }

    fn receive(&mut self, deadline: Instant) -> Result<()> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.worker.responses().recv_timeout(remaining) {
            Ok(response) => self.handle(response),
            Err(RecvTimeoutError::Timeout) => Err(ClientError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(ClientError::Disconnected),
        }
    }

    pub fn handle(&mut self, response: AbstractResponse) -> Result<()> {
        match response {
            AbstractResponse::Busy { busy } => {
                self.busy = busy;
                self.emit(ClientEvent::Busy(busy));
                Ok(())
            }
            AbstractResponse::ActionStepped {
                run_name,
                gui_run_name,
                step,
                ..
            } => self.stepped(run_name, gui_run_name, step),
            AbstractResponse::ActionStopped {
                run_name,
                gui_run_name,
                exception,
            } => {
                let outcome = RunOutcome::from_exception(exception);
                match self.runs.get_mut(&gui_run_name) {
                    Some(run) => {
                        if !run_name.is_null() {
                            run.run_name = Some(run_name);
                        }
                        run.outcome = Some(outcome.clone());
                    }
                    None => tracing::warn!(gui_run = %gui_run_name, "stop of an unknown gui run"),
                }
                match &outcome {
                    RunOutcome::Failed(exception) => {
                        tracing::warn!(gui_run = %gui_run_name, "run failed: {}", exception.text)
                    }
                    _ => tracing::debug!(gui_run = %gui_run_name, ?outcome, "run stopped"),
                }
                self.emit(ClientEvent::RunStopped {
                    gui_run_name,
                    outcome,
                });
                Ok(())
            }
        }
    }

    fn stepped(&mut self, run_name: Name, gui_run_name: Name, step: ActionStep) -> Result<()> {
        let Some(run) = self.runs.get_mut(&gui_run_name) else {
            tracing::warn!(gui_run = %gui_run_name, step = step.step_type(), "step of an unknown gui run");
            return Ok(());
        };
        if !run_name.is_null() && run.run_name.is_none() {
            run.run_name = Some(run_name.clone());
        }
        match &step {
            ActionStep::PushProgressLevel(level) => {
                run.progress_titles.push(level.title.clone());
                return Ok(());
            }
            ActionStep::PopProgressLevel => {
                run.progress_titles.pop();
                return Ok(());
            }
            ActionStep::UpdateProgress(progress) => {
                run.last_progress = Some(progress.clone());
                self.emit(ClientEvent::Progress {
                    gui_run_name,
                    progress: progress.clone(),
                });
                return Ok(());
            }
            _ => {}
        }
        let model_context = run.model_context.clone();

        match step {
            ActionStep::OpenTableView(view) => self.table_opened(&view),
            ActionStep::CreateUpdateDelete(changes) => self.objects_changed(changes),
            step if step.is_model_patch() => {
                match self.models.get_mut(&model_context) {
                    Some(model) => {
                        model.apply(&step);
                        self.emit(ClientEvent::ModelPatched {
                            model_context,
                            step_type: step.step_type(),
                        });
                    }
                    None => tracing::debug!(
                        model_context = %model_context,
                        step = step.step_type(),
                        "patch for a closed item model"
                    ),
                }
                Ok(())
            }
            step if step.blocking() => {
                if run_name.is_null() {
                    self.dialogs.notify(&step);
                    return Ok(());
                }
                let request = match self.dialogs.answer(&step) {
                    DialogAnswer::Respond(response) => {
                        AbstractRequest::SendActionResponse { run_name, response }
                    }
                    DialogAnswer::Throw(exception) => AbstractRequest::ThrowActionException {
                        run_name,
                        exception,
                    },
                };
                self.worker.post(request)?;
                Ok(())
            }
            step => {
                self.emit(ClientEvent::Step { gui_run_name, step });
                Ok(())
            }
        }
    }

    fn table_opened(&mut self, view: &OpenTableView) -> Result<()> {
        let model = ItemModel::from_open_table_view(view);
        let model_context = model.model_context().clone();
        let fields = model.fields().to_vec();
        self.register_model(model);
        self.emit(ClientEvent::TableOpened {
            model_context: model_context.clone(),
            title: view.title.clone(),
        });
        self.crud(&model_context, SET_COLUMNS, fields)?;
        self.crud(&model_context, ROW_COUNT, serde_json::Value::Null)?;
        Ok(())
    }

    /// Let every open item model pick up objects changed elsewhere.
    fn objects_changed(&mut self, changes: CreateUpdateDelete) -> Result<()> {
        let open: Vec<(Name, usize)> = self
            .models
            .values()
            .map(|model| (model.model_context().clone(), model.row_count()))
            .collect();
        for (model_context, rows) in open {
            if !changes.objects_created.is_empty() {
                self.crud(&model_context, CREATED, &changes.objects_created)?;
            }
            if !changes.objects_updated.is_empty() {
                self.crud(&model_context, UPDATE, &changes.objects_updated)?;
            }
            if !changes.objects_deleted.is_empty() {
                let mode = DeletedMode {
                    objects: changes.objects_deleted.clone(),
                    rows: Some(rows),
                };
                self.crud(&model_context, DELETED, mode)?;
            }
        }
        tracing::debug!(
            created = changes.objects_created.len(),
            updated = changes.objects_updated.len(),
            deleted = changes.objects_deleted.len(),
            "objects changed"
        );
        self.emit(ClientEvent::ObjectsChanged(changes));
        Ok(())
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    /// Stop the worker after the queued requests.
    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
