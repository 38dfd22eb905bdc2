//! The protocol between the research agent and language-model providers.
//!
//! A provider receives a [`ModelRequest`] (the assembled prompt plus the
//! catalog of callable tools) and streams back [`ModelResponseEvent`]s:
//! text deltas, tool call requests, and a completion marker. The agent
//! only depends on this crate, so providers can be swapped without
//! touching the agent loop.
//!
//! Types in this crate carry no behavior. They are the contract that
//! provider implementations must honor.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
