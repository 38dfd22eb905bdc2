//! The tools offered to the research model.

mod lookup;
mod save;
mod search;

pub use lookup::LookupTool;
pub use save::{DEFAULT_DESTINATION, SaveTool};
pub use search::SearchTool;

/// The `User-Agent` sent to public web services.
const USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
