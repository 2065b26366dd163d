//! Wire records shared by the worker and the UI side: composite names,
//! requests, responses and action steps.

pub mod domain;
pub mod error;
pub mod mode;
pub mod name;
pub mod protocol;
pub mod step;

pub use name::Name;
