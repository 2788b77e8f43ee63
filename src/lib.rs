pub mod args;
pub mod client;
pub mod config;
pub mod date;
pub mod error;
pub mod es;
pub mod inventory;
pub mod orchestrator;
pub mod selector;
pub mod snapshot;

pub use error::{MoveError, Result};
