use crossterm::event::KeyEvent;

use power_cursors::cursors::command::CursorCommand;
use power_cursors::model::buffer::Direction;
use power_cursors::model::mode::Mode;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize(u16, u16),

    // -- Buffer operations
    InsertChar(char),
    InsertText(String),
    DeleteChar,
    NewLine,
    MoveCursor { dir: Direction, extend: bool },

    // -- Cursor transitions
    Cursor(CursorCommand),

    // -- Mode and views
    SetMode(Mode),
    SwitchView(isize),

    // -- File I/O
    SaveActiveBuffer,
    SaveAllBuffers,

    // -- System
    Quit,
}
