use shared::{
    error::{ExceptionKind, WireException},
    Name,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("naming context is not bound")]
    Unbound,
    #[error("invalid name {0:?}")]
    InvalidName(Vec<String>),
    #[error("binding at {0} has an unexpected type")]
    InvalidBindingType(Name),
    #[error("name {0} not found")]
    NameNotFound(Name),
    #[error("name {0} is already bound")]
    AlreadyBound(Name),
    #[error("a naming context was expected at {0}")]
    ContextExpected(Name),
    #[error("naming context {0} is immutable")]
    Immutable(Name),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("row {0} is not in cache")]
    NotInCache(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("query failed: {0}")]
    Query(String),
    #[error("object is not in the collection")]
    NotInCollection,
    #[error("row {row} is out of range, the collection has {len} rows")]
    RowOutOfRange { row: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("unknown field {0}")]
    UnknownField(String),
    #[error("field {field} rejected value: {message}")]
    InvalidValue { field: String, message: String },
    #[error("field {0} is not editable")]
    NotEditable(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
}

/// Recoverable error shown to the user in a message box.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{text}")]
pub struct UserException {
    pub text: String,
    pub resolution: Option<String>,
    pub detail: Option<String>,
}

impl UserException {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            resolution: None,
            detail: None,
        }
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("cancel request")]
    Cancel,
    #[error(transparent)]
    User(#[from] UserException),
    #[error(transparent)]
    Naming(#[from] NamingError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("invalid mode for {action}: {message}")]
    InvalidMode { action: String, message: String },
    #[error("{0}")]
    Programming(String),
}

impl ActionError {
    pub fn programming(message: impl Into<String>) -> Self {
        ActionError::Programming(message.into())
    }

    pub fn invalid_mode(action: &str, err: impl std::fmt::Display) -> Self {
        ActionError::InvalidMode {
            action: action.to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self, ActionError::Cancel)
    }

    /// Error category name used in message boxes.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ActionError::Cancel => "CancelRequest",
            ActionError::User(_) => "UserException",
            ActionError::Naming(_) => "NamingException",
            ActionError::Proxy(_) => "ProxyError",
            ActionError::Admin(_) => "AdminError",
            ActionError::Cache(_) => "CacheError",
            ActionError::InvalidMode { .. } => "InvalidMode",
            ActionError::Programming(_) => "ProgrammingError",
        }
    }

    pub fn to_wire(&self) -> WireException {
        match self {
            ActionError::Cancel => WireException::cancel(),
            ActionError::User(user) => WireException {
                kind: ExceptionKind::User,
                text: user.text.clone(),
                resolution: user.resolution.clone(),
                detail: user.detail.clone(),
            },
            other => WireException {
                kind: ExceptionKind::Programming,
                text: other.to_string(),
                resolution: None,
                detail: Some(format!("{}: {other}", other.kind_name())),
            },
        }
    }
}

impl From<WireException> for ActionError {
    fn from(value: WireException) -> Self {
        match value.kind {
            ExceptionKind::Cancel => ActionError::Cancel,
            ExceptionKind::User => ActionError::User(UserException {
                text: value.text,
                resolution: value.resolution,
                detail: value.detail,
            }),
            ExceptionKind::Programming => ActionError::Programming(value.text),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("request queue is full")]
    QueueFull,
    #[error("worker has stopped")]
    Disconnected,
    #[error(transparent)]
    Protocol(#[from] shared::error::ProtocolError),
    #[error("cannot start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
