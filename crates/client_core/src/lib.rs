//! Client-side half of the model/action protocol.

pub mod bridge;
pub mod dialog;
pub mod error;
pub mod item_model;

pub use bridge::{ClientBridge, ClientEvent, GuiRun, RunOutcome, GUI_RUN};
pub use dialog::{AcceptAll, DialogAnswer, DialogHandler, ScriptedDialogs};
pub use error::ClientError;
pub use item_model::ItemModel;
