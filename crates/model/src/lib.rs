//! The protocol spoken between the hand-off engine and a completion
//! backend.
//!
//! A backend receives the active role's instructions, the full history
//! and the tools the role may call, and answers with a stream of events:
//! text deltas, tool call requests and a final completion marker. Nothing
//! in this crate knows which concrete service sits behind the protocol.
//!
//! Types here carry no behavior of their own. They are the contract that
//! provider crates implement and the core crate consumes.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
