use serde::{Deserialize, Serialize};

use crate::{
    error::{ProtocolError, WireException},
    name::Name,
    step::ActionStep,
};

/// Requests queued from the UI to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__")]
pub enum AbstractRequest {
    InitiateAction {
        gui_run_name: Name,
        action_name: Name,
        model_context_name: Name,
        #[serde(default)]
        mode: serde_json::Value,
    },
    SendActionResponse {
        run_name: Name,
        #[serde(default)]
        response: serde_json::Value,
    },
    ThrowActionException {
        run_name: Name,
        exception: WireException,
    },
    CancelAction {
        run_name: Name,
    },
}

impl AbstractRequest {
    pub fn request_type(&self) -> &'static str {
        match self {
            AbstractRequest::InitiateAction { .. } => "InitiateAction",
            AbstractRequest::SendActionResponse { .. } => "SendActionResponse",
            AbstractRequest::ThrowActionException { .. } => "ThrowActionException",
            AbstractRequest::CancelAction { .. } => "CancelAction",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Events emitted by the worker towards the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__")]
pub enum AbstractResponse {
    Busy {
        busy: bool,
    },
    ActionStepped {
        run_name: Name,
        gui_run_name: Name,
        step_type: String,
        blocking: bool,
        step: ActionStep,
    },
    ActionStopped {
        run_name: Name,
        gui_run_name: Name,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exception: Option<WireException>,
    },
}

impl AbstractResponse {
    pub fn stepped(run_name: Name, gui_run_name: Name, step: ActionStep) -> Self {
        AbstractResponse::ActionStepped {
            run_name,
            gui_run_name,
            step_type: step.step_type().to_string(),
            blocking: step.blocking(),
            step,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
