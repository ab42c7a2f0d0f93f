#![doc = "Common types shared across the clock jump monitor workspace."]

pub mod config;
pub mod error;
pub mod event;
pub mod state;
pub mod time;

pub use config::*;
pub use error::*;
pub use event::*;
pub use state::*;
pub use time::*;
