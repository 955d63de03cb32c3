//! Track rotation and simulated tool-call workflow engine.
//!
//! The [`engine::Engine`] is a plain state struct driven by a reducer: every
//! input is an [`engine::Event`], every side effect comes back out as an
//! [`engine::Effect`].  [`core::StationCore`] is the async loop that feeds it
//! events and carries out the effects against a real [`output::AudioOutput`].

pub mod catalog;
pub mod core;
pub mod engine;
pub mod error;
pub mod log;
pub mod output;
pub mod playback;
pub mod playlist;
pub mod scheduler;
pub mod workflow;

pub use crate::core::{StationCore, StationHandle, StationUpdate};
pub use crate::engine::{Effect, Engine, EngineSettings, Event};
pub use crate::error::{CatalogError, EngineError};
