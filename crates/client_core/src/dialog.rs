//! Answers to the steps that park a run until the user responds.

use std::collections::VecDeque;

use serde_json::json;
use shared::{
    error::WireException,
    step::{ActionStep, StandardButton},
};

#[derive(Debug, Clone, PartialEq)]
pub enum DialogAnswer {
    /// Posted back as `SendActionResponse`.
    Respond(serde_json::Value),
    /// Posted back as `ThrowActionException`.
    Throw(WireException),
}

impl DialogAnswer {
    pub fn button(button: StandardButton) -> Self {
        DialogAnswer::Respond(json!(button))
    }

    pub fn cancel() -> Self {
        DialogAnswer::Throw(WireException::cancel())
    }
}

pub trait DialogHandler: Send {
    fn answer(&mut self, step: &ActionStep) -> DialogAnswer;

    /// Informational dialogs of runs that already failed; nothing is posted back.
    fn notify(&mut self, step: &ActionStep) {
        tracing::info!(step = step.step_type(), "dialog without a run");
    }
}

/// Accepts every message box and cancels every other blocking step.
#[derive(Debug, Default)]
pub struct AcceptAll;

impl DialogHandler for AcceptAll {
    fn answer(&mut self, step: &ActionStep) -> DialogAnswer {
        match step {
            ActionStep::MessageBox(message) => {
                let accept = [StandardButton::Yes, StandardButton::Ok]
                    .into_iter()
                    .find(|button| message.standard_buttons.contains(button))
                    .unwrap_or(StandardButton::Ok);
                DialogAnswer::button(accept)
            }
            _ => DialogAnswer::cancel(),
        }
    }
}

/// Replays a prepared list of answers, cancelling once it runs out.
#[derive(Debug, Default)]
pub struct ScriptedDialogs {
    answers: VecDeque<DialogAnswer>,
    seen: Vec<ActionStep>,
}

impl ScriptedDialogs {
    pub fn new(answers: impl IntoIterator<Item = DialogAnswer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            seen: Vec::new(),
        }
    }

    pub fn seen(&self) -> &[ActionStep] {
        &self.seen
    }
}

impl DialogHandler for ScriptedDialogs {
    fn answer(&mut self, step: &ActionStep) -> DialogAnswer {
        self.seen.push(step.clone());
        self.answers.pop_front().unwrap_or_else(DialogAnswer::cancel)
    }

    fn notify(&mut self, step: &ActionStep) {
        self.seen.push(step.clone());
    }
}
