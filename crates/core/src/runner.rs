//! Drives action generators on behalf of the UI and relays their steps.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use crossbeam_channel::Sender;
use shared::{
    error::WireException,
    protocol::{AbstractRequest, AbstractResponse},
    step::{ActionStep, MessageBox, MessageIcon, PushProgressLevel, StandardButton},
    Name,
};

use crate::{
    action::{deserialize_result, resolve_action, ActionContext, Resume, StepGenerator},
    error::{ActionError, NamingError},
    model_context::resolve_model_context,
    naming::{NamingContext, MODEL_RUN},
};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

struct RunState {
    generator: Option<Box<dyn StepGenerator>>,
    last_step: Option<ActionStep>,
}

/// A live generator paired with the UI handle that started it.
pub struct Run {
    run_name: Name,
    gui_run_name: Name,
    cancel: AtomicBool,
    state: Mutex<RunState>,
}

impl Run {
    pub fn run_name(&self) -> &Name {
        &self.run_name
    }

    pub fn gui_run_name(&self) -> &Name {
        &self.gui_run_name
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn last_step(&self) -> Option<ActionStep> {
        self.state().last_step.clone()
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn resolve_run(root: &NamingContext, run_name: &Name) -> Result<Arc<Run>, NamingError> {
    root.resolve_as::<Run>(run_name)
}

/// Flag a run for cancellation; a run that already stopped is left alone.
pub fn cancel_run(root: &NamingContext, run_name: &Name) -> bool {
    match resolve_run(root, run_name) {
        Ok(run) => {
            run.request_cancel();
            true
        }
        Err(_) => false,
    }
}

/// Executes requests against the naming context on the calling thread.
pub struct ActionRunner {
    root: Arc<NamingContext>,
    responses: Sender<AbstractResponse>,
}

impl ActionRunner {
    pub fn new(root: Arc<NamingContext>, responses: Sender<AbstractResponse>) -> Self {
        Self { root, responses }
    }

    pub fn root(&self) -> &Arc<NamingContext> {
        &self.root
    }

    pub fn handle(&self, request: AbstractRequest) {
        tracing::debug!(request = request.request_type(), "handling request");
        match request {
            AbstractRequest::InitiateAction {
                gui_run_name,
                action_name,
                model_context_name,
                mode,
            } => self.initiate(gui_run_name, &action_name, &model_context_name, mode),
            AbstractRequest::SendActionResponse { run_name, response } => {
                let Some(run) = self.lookup(&run_name) else {
                    return;
                };
                let last_step = run.last_step();
                match deserialize_result(&self.root, last_step.as_ref(), response) {
                    Ok(result) => self.pump(&run, Resume::Send(result)),
                    Err(err) => self.pump(&run, Resume::Throw(err)),
                }
            }
            AbstractRequest::ThrowActionException {
                run_name,
                exception,
            } => {
                if let Some(run) = self.lookup(&run_name) {
                    self.pump(&run, Resume::Throw(exception.into()));
                }
            }
            AbstractRequest::CancelAction { run_name } => {
                if !cancel_run(&self.root, &run_name) {
                    tracing::debug!(run = %run_name, "cancel for a run that already stopped");
                }
            }
        }
    }

    fn lookup(&self, run_name: &Name) -> Option<Arc<Run>> {
        match resolve_run(&self.root, run_name) {
            Ok(run) => Some(run),
            Err(err) => {
                tracing::warn!(run = %run_name, "response for unknown run: {err}");
                None
            }
        }
    }

    fn initiate(
        &self,
        gui_run_name: Name,
        action_name: &Name,
        model_context_name: &Name,
        mode: serde_json::Value,
    ) {
        let started = self.start(gui_run_name.clone(), action_name, model_context_name, mode);
        match started {
            Ok(run) => self.pump(&run, Resume::Next),
            Err(err) => {
                tracing::error!(action = %action_name, "cannot initiate action: {err}");
                self.emit(AbstractResponse::stepped(
                    Name::null(),
                    gui_run_name.clone(),
                    error_message_box(&err),
                ));
                self.emit(AbstractResponse::ActionStopped {
                    run_name: Name::null(),
                    gui_run_name,
                    exception: Some(err.to_wire()),
                });
            }
        }
    }

    fn start(
        &self,
        gui_run_name: Name,
        action_name: &Name,
        model_context_name: &Name,
        mode: serde_json::Value,
    ) -> Result<Arc<Run>, ActionError> {
        let action = resolve_action(&self.root, action_name)?;
        let context = if model_context_name.is_null() {
            ActionContext::Empty
        } else {
            ActionContext::Model(resolve_model_context(&self.root, model_context_name)?)
        };
        let generator = contained(|| action.model_run(&self.root, context, mode))?;

        let id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed).to_string();
        let run = Arc::new(Run {
            run_name: Name::from([MODEL_RUN, id.as_str()]),
            gui_run_name,
            cancel: AtomicBool::new(false),
            state: Mutex::new(RunState {
                generator: Some(generator),
                last_step: None,
            }),
        });
        self.root.bind(&run.run_name, run.clone())?;
        tracing::debug!(run = %run.run_name, action = action.name(), "run started");

        let title = action
            .verbose_name()
            .unwrap_or_else(|| action.name().to_string());
        self.emit(AbstractResponse::stepped(
            run.run_name.clone(),
            run.gui_run_name.clone(),
            ActionStep::PushProgressLevel(PushProgressLevel { title }),
        ));
        Ok(run)
    }

    /// Advance `run` until it blocks, stops or fails.
    fn pump(&self, run: &Run, first: Resume) {
        let mut state = run.state();
        let mut resume = first;
        loop {
            let Some(generator) = state.generator.as_mut() else {
                tracing::warn!(run = %run.run_name, "run resumed after it stopped");
                return;
            };
            match contained(|| generator.resume(resume)) {
                Ok(Some(step)) => {
                    let blocking = step.blocking();
                    state.last_step = Some(step.clone());
                    self.emit(AbstractResponse::stepped(
                        run.run_name.clone(),
                        run.gui_run_name.clone(),
                        step,
                    ));
                    if blocking {
                        return;
                    }
                    resume = if run.cancel_requested() {
                        tracing::debug!(run = %run.run_name, "cancelling run");
                        Resume::Throw(ActionError::Cancel)
                    } else {
                        Resume::Next
                    };
                }
                Ok(None) => {
                    self.stop(run, &mut state, None);
                    return;
                }
                Err(ActionError::Cancel) => {
                    self.stop(run, &mut state, Some(WireException::cancel()));
                    return;
                }
                Err(err) => {
                    tracing::error!(run = %run.run_name, kind = err.kind_name(), "action failed: {err}");
                    self.emit(AbstractResponse::stepped(
                        Name::null(),
                        run.gui_run_name.clone(),
                        error_message_box(&err),
                    ));
                    self.stop(run, &mut state, Some(err.to_wire()));
                    return;
                }
            }
        }
    }

    fn stop(&self, run: &Run, state: &mut RunState, exception: Option<WireException>) {
        self.emit(AbstractResponse::stepped(
            run.run_name.clone(),
            run.gui_run_name.clone(),
            ActionStep::PopProgressLevel,
        ));
        state.generator = None;
        if !run.run_name.is_null() {
            if let Err(err) = self.root.unbind(&run.run_name) {
                tracing::warn!(run = %run.run_name, "cannot unbind stopped run: {err}");
            }
        }
        tracing::debug!(run = %run.run_name, cancelled = exception.as_ref().is_some_and(WireException::is_cancel), "run stopped");
        self.emit(AbstractResponse::ActionStopped {
            run_name: run.run_name.clone(),
            gui_run_name: run.gui_run_name.clone(),
            exception,
        });
    }

    fn emit(&self, response: AbstractResponse) {
        if self.responses.send(response).is_err() {
            tracing::warn!("response receiver dropped");
        }
    }
}

/// Run action code, turning a panic into a programming error of that run.
fn contained<T>(body: impl FnOnce() -> Result<T, ActionError>) -> Result<T, ActionError> {
    panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(ActionError::programming(panic_text(payload.as_ref()))))
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("action panicked: {message}")
}

fn error_message_box(err: &ActionError) -> ActionStep {
    let (title, icon) = match err {
        ActionError::User(_) => ("Could not proceed", MessageIcon::Warning),
        _ => ("Exception", MessageIcon::Critical),
    };
    let wire = err.to_wire();
    ActionStep::MessageBox(MessageBox {
        icon,
        standard_buttons: vec![StandardButton::Ok],
        resolution: wire.resolution,
        detail: wire.detail,
        ..MessageBox::new(title, wire.text)
    })
}

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;
