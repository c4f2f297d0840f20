//! Core logic of the marketing pipeline: roles, tools, the conversation
//! history and the hand-off engine driving them.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod conversation;
mod engine;
mod error;
mod model_client;
pub mod role;
pub mod tool;

pub use engine::{
    DEFAULT_MAX_CORRECTION_CYCLES, Engine, EngineBuilder, Event, Outcome, Run,
    Stage,
};
pub use error::{Error, ErrorKind};
pub use model_client::{Completion, ModelClient};
