//! Message pipeline: inbound platform message → backend → platform-shaped
//! reply, with every failure translated into something safe to show.

pub mod backend;
pub mod pipeline;
pub mod platform;
pub mod translate;

pub use backend::Backend;
pub use pipeline::{Pipeline, ProcessError, MESSAGE_ID_KEY};
pub use platform::{format_response, truncate_chars, TRUNCATION_MARKER};
pub use translate::handle_error;
