//! A research assistant that answers questions with web search,
//! encyclopedia lookups and a notes file, and returns its answer as a
//! validated [`ResearchRecord`](research_agent_core::ResearchRecord).
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring research functionality into your own apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod researcher;
pub mod tools;

pub use error::ResearchError;
pub use researcher::{Research, Researcher, ResearcherBuilder};

/// Re-exports of [`research_agent_core`] crate.
pub mod core {
    pub use research_agent_core::*;
}
