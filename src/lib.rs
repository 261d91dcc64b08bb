//! Incrementally compose a set of cursors before editing with them.
//!
//! [`cursors::session::CursorSessions`] keeps one
//! [`cursors::controller::Controller`] per view and talks to the editor through
//! the [`cursors::host::Host`] trait.

pub mod cursors;
pub mod keymap;
pub mod model;
