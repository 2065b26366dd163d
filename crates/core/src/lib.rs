pub mod action;
pub mod admin;
pub mod cache;
pub mod delegate;
pub mod error;
pub mod model_context;
pub mod naming;
pub mod proxy;
pub mod runner;
pub mod session;
pub mod validator;
pub mod value;
pub mod worker;

pub use error::{
    ActionError, AdminError, CacheError, NamingError, ProxyError, UserException, WorkerError,
};
pub use model_context::{ModelContext, ModelContextRef};
pub use naming::{initial_naming_context, NamingContext};
pub use value::{Entity, ObjectRef, PersistenceState, Value};
