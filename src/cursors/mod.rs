pub mod command;
pub mod controller;
pub mod cursor_set;
pub mod host;
pub mod session;

pub use command::{AddOptions, CursorCommand};
pub use controller::{Controller, CursorState, NoOpReason, Outcome};
pub use host::{Host, ViewId};
pub use session::CursorSessions;
