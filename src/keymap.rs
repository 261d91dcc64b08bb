//! Key chords bound to cursor commands.

use std::fmt;
use std::str::FromStr;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::Deserialize;
use thiserror::Error;

use crate::cursors::command::{CommandError, CursorCommand};
use crate::cursors::session::IN_CURSOR_TRANSITION;

/// A key binding as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyBindingDef {
    pub keys: String,
    pub command: String,
    #[serde(default)]
    pub args: toml::Table,
    /// `in_cursor_transition` or `!in_cursor_transition`.
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("invalid key chord `{chord}`: {reason}")]
    InvalidChord { chord: String, reason: String },
    #[error("unknown binding context `{0}`")]
    UnknownContext(String),
    #[error("binding `{keys}`: {source}")]
    Command {
        keys: String,
        #[source]
        source: CommandError,
    },
}

/// A key with its modifiers, normalized so it compares equal to the events
/// crossterm reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyChord {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        let mut modifiers =
            modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT);
        let code = match code {
            KeyCode::Char(ch) if ch.is_ascii_uppercase() => {
                modifiers |= KeyModifiers::SHIFT;
                KeyCode::Char(ch.to_ascii_lowercase())
            }
            // Terminals report shift+tab as its own key.
            KeyCode::BackTab => {
                modifiers |= KeyModifiers::SHIFT;
                KeyCode::Tab
            }
            other => other,
        };
        Self { code, modifiers }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        Self::new(event.code, event.modifiers)
    }
}

impl FromStr for KeyChord {
    type Err = KeymapError;

    fn from_str(chord: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| KeymapError::InvalidChord {
            chord: chord.to_string(),
            reason: reason.to_string(),
        };

        let mut parts: Vec<&str> = chord.split('+').map(str::trim).collect();
        // "ctrl++" binds the plus key.
        if chord.ends_with("++") {
            parts.pop();
            parts.pop();
            parts.push("+");
        }
        let Some(key) = parts.pop().filter(|k| !k.is_empty()) else {
            return Err(invalid("missing key"));
        };

        let mut modifiers = KeyModifiers::NONE;
        for part in parts {
            modifiers |= match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => KeyModifiers::CONTROL,
                "alt" | "option" => KeyModifiers::ALT,
                "shift" => KeyModifiers::SHIFT,
                other => return Err(invalid(&format!("unknown modifier `{other}`"))),
            };
        }

        let lower = key.to_ascii_lowercase();
        let code = match lower.as_str() {
            "enter" | "return" => KeyCode::Enter,
            "esc" | "escape" => KeyCode::Esc,
            "backspace" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "tab" => KeyCode::Tab,
            "space" => KeyCode::Char(' '),
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" => KeyCode::PageUp,
            "pagedown" => KeyCode::PageDown,
            f if f.len() > 1 && f.starts_with('f') => {
                let n = f[1..]
                    .parse::<u8>()
                    .map_err(|_| invalid(&format!("unknown key `{key}`")))?;
                KeyCode::F(n)
            }
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => KeyCode::Char(ch),
                    _ => return Err(invalid(&format!("unknown key `{key}`"))),
                }
            }
        };

        Ok(Self::new(code, modifiers))
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            f.write_str("ctrl+")?;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            f.write_str("alt+")?;
        }
        if self.modifiers.contains(KeyModifiers::SHIFT) {
            f.write_str("shift+")?;
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("space"),
            KeyCode::Char(ch) => write!(f, "{ch}"),
            KeyCode::F(n) => write!(f, "f{n}"),
            other => f.write_str(&format!("{other:?}").to_ascii_lowercase()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub chord: KeyChord,
    pub command: CursorCommand,
    /// `Some(true)` only fires in transition, `Some(false)` only outside it.
    pub in_transition: Option<bool>,
}

impl Binding {
    pub fn from_def(def: &KeyBindingDef) -> Result<Self, KeymapError> {
        let chord: KeyChord = def.keys.parse()?;
        let command =
            CursorCommand::from_name(&def.command, &def.args).map_err(|source| {
                KeymapError::Command {
                    keys: def.keys.clone(),
                    source,
                }
            })?;
        let in_transition = match def.context.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(ctx) => match ctx.strip_prefix('!') {
                Some(IN_CURSOR_TRANSITION) => Some(false),
                None if ctx == IN_CURSOR_TRANSITION => Some(true),
                _ => return Err(KeymapError::UnknownContext(ctx.to_string())),
            },
        };

        Ok(Self {
            chord,
            command,
            in_transition,
        })
    }

    fn matches(&self, chord: &KeyChord, in_transition: bool) -> bool {
        self.chord == *chord && self.in_transition.is_none_or(|want| want == in_transition)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Keymap {
    bindings: Vec<Binding>,
}

impl Keymap {
    pub fn from_defs(defs: &[KeyBindingDef]) -> Result<Self, KeymapError> {
        let bindings = defs
            .iter()
            .map(Binding::from_def)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bindings })
    }

    /// The command bound to `event`, honouring binding contexts. Later
    /// bindings win over earlier ones.
    pub fn lookup(&self, event: &KeyEvent, in_transition: bool) -> Option<CursorCommand> {
        let chord = KeyChord::from_event(event);
        self.bindings
            .iter()
            .rev()
            .find(|binding| binding.matches(&chord, in_transition))
            .map(|binding| binding.command)
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
