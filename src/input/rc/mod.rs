//! Normalization of remote-control key events.

mod codes;
mod dispatcher;
mod event;

pub use codes::*;
pub use dispatcher::*;
pub use event::*;
