use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    Cancel,
    User,
    Programming,
}

/// Exception travelling between UI and worker, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireException {
    pub kind: ExceptionKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WireException {
    pub fn cancel() -> Self {
        Self {
            kind: ExceptionKind::Cancel,
            text: "cancel request".to_string(),
            resolution: None,
            detail: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            kind: ExceptionKind::User,
            text: text.into(),
            resolution: None,
            detail: None,
        }
    }

    pub fn is_cancel(&self) -> bool {
        self.kind == ExceptionKind::Cancel
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed wire record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected response for {step_type}: {message}")]
    UnexpectedResponse { step_type: String, message: String },
}
