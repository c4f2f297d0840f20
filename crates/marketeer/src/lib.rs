//! A marketing pipeline of five hand-off roles: it scrapes a website,
//! analyzes it, proposes a campaign and writes the copy.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to embed the pipeline into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod config;
mod context;
mod pipeline;
pub mod tools;

pub use config::{AgentConfig, AgentsConfig};
pub use context::{Context, ContextOptions, Credentials};
pub use pipeline::{PipelineBuilder, role_definitions};

/// Re-exports of [`marketeer_core`] crate.
pub mod core {
    pub use marketeer_core::*;
}
