//! Named units of work whose bodies are resumable step generators.

use std::{collections::VecDeque, sync::Arc};

use shared::{
    domain::{ActionState, ModeRecord},
    step::ActionStep,
    Name,
};

use crate::{
    error::{ActionError, NamingError},
    model_context::{FieldActionModelContext, ModelContext, ModelContextRef},
    naming::NamingContext,
};

pub mod crud;
pub mod list_actions;
pub mod step;

pub use step::{deserialize_result, StepResult};

pub type ActionRef = Arc<dyn Action>;

/// What an action runs against.
#[derive(Clone)]
pub enum ActionContext {
    Model(ModelContextRef),
    Field(FieldActionModelContext),
    /// Actions initiated with the null model context name.
    Empty,
}

impl ActionContext {
    pub fn model(&self) -> Result<&ModelContextRef, ActionError> {
        match self {
            ActionContext::Model(model_context) => Ok(model_context),
            _ => Err(ActionError::programming("action requires a model context")),
        }
    }
}

/// Operand a suspended generator is resumed with.
#[derive(Debug)]
pub enum Resume {
    Next,
    Send(StepResult),
    Throw(ActionError),
}

/// A pull-based coroutine yielding action steps.
///
/// `Ok(None)` means the generator is exhausted. Errors returned from
/// `resume` terminate the run; a `Resume::Throw` the generator does not
/// handle should be returned unchanged.
pub trait StepGenerator: Send {
    fn resume(&mut self, resume: Resume) -> Result<Option<ActionStep>, ActionError>;
}

/// Yields a fixed sequence of steps, failing with any thrown error.
pub struct Steps(VecDeque<ActionStep>);

impl StepGenerator for Steps {
    fn resume(&mut self, resume: Resume) -> Result<Option<ActionStep>, ActionError> {
        if let Resume::Throw(err) = resume {
            self.0.clear();
            return Err(err);
        }
        Ok(self.0.pop_front())
    }
}

pub fn steps(steps: impl IntoIterator<Item = ActionStep>) -> Box<dyn StepGenerator> {
    Box::new(Steps(steps.into_iter().collect()))
}

pub struct FnGenerator<F>(F);

impl<F> StepGenerator for FnGenerator<F>
where
    F: FnMut(Resume) -> Result<Option<ActionStep>, ActionError> + Send,
{
    fn resume(&mut self, resume: Resume) -> Result<Option<ActionStep>, ActionError> {
        (self.0)(resume)
    }
}

/// Generator driven by a closure called once per resumption.
pub fn from_fn<F>(f: F) -> Box<dyn StepGenerator>
where
    F: FnMut(Resume) -> Result<Option<ActionStep>, ActionError> + Send + 'static,
{
    Box::new(FnGenerator(f))
}

/// Computes its steps on the first resumption, then yields them in order.
pub struct Deferred<F> {
    compute: Option<F>,
    pending: VecDeque<ActionStep>,
}

impl<F> StepGenerator for Deferred<F>
where
    F: FnOnce() -> Result<Vec<ActionStep>, ActionError> + Send,
{
    fn resume(&mut self, resume: Resume) -> Result<Option<ActionStep>, ActionError> {
        if let Resume::Throw(err) = resume {
            self.compute = None;
            self.pending.clear();
            return Err(err);
        }
        if let Some(compute) = self.compute.take() {
            self.pending = compute()?.into();
        }
        Ok(self.pending.pop_front())
    }
}

pub fn deferred<F>(compute: F) -> Box<dyn StepGenerator>
where
    F: FnOnce() -> Result<Vec<ActionStep>, ActionError> + Send + 'static,
{
    Box::new(Deferred {
        compute: Some(compute),
        pending: VecDeque::new(),
    })
}

pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn verbose_name(&self) -> Option<String> {
        None
    }

    fn icon(&self) -> Option<String> {
        None
    }

    fn tooltip(&self) -> Option<String> {
        None
    }

    fn modes(&self) -> Vec<ModeRecord> {
        Vec::new()
    }

    fn get_state(&self, _model_context: Option<&ModelContext>) -> ActionState {
        ActionState {
            verbose_name: self.verbose_name(),
            icon: self.icon(),
            tooltip: self.tooltip(),
            modes: self.modes(),
            ..ActionState::default()
        }
    }

    /// Start a run. Work should happen when the generator is resumed.
    fn model_run(
        &self,
        root: &Arc<NamingContext>,
        context: ActionContext,
        mode: serde_json::Value,
    ) -> Result<Box<dyn StepGenerator>, ActionError>;
}

/// Bind `action` in `catalog` under its own name.
pub fn bind_action(catalog: &NamingContext, action: ActionRef) -> Result<Name, NamingError> {
    let name = Name::from([action.name()]);
    catalog.bind(&name, Arc::new(action))
}

pub fn resolve_action(root: &NamingContext, name: &Name) -> Result<ActionRef, NamingError> {
    root.resolve_as::<ActionRef>(name)
        .map(|action| (*action).clone())
}

/// Decode an action mode, reporting failures against the action name.
pub fn parse_mode<T: serde::de::DeserializeOwned>(
    action: &str,
    mode: serde_json::Value,
) -> Result<T, ActionError> {
    serde_json::from_value(mode).map_err(|err| ActionError::invalid_mode(action, err))
}

#[cfg(test)]
#[path = "../tests/action_tests.rs"]
mod tests;
