use serde::Deserialize;
use thiserror::Error;

use crate::model::region::KeepAlive;

/// How `add` picks the live region that stays Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddOptions {
    /// Index into the host's live regions; negative values count from the end.
    pub keep_alive_index: isize,
    pub keep_alive_position: KeepAlive,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            keep_alive_index: -1,
            keep_alive_position: KeepAlive::Region,
        }
    }
}

impl AddOptions {
    /// Resolve `keep_alive_index` against `len` live regions.
    ///
    /// Out-of-range indices fall back to the last region. `len` must be non-zero.
    pub fn resolve_index(&self, len: usize) -> usize {
        let len_i = len as isize;
        let resolved = if self.keep_alive_index < 0 {
            len_i + self.keep_alive_index
        } else {
            self.keep_alive_index
        };
        if (0..len_i).contains(&resolved) {
            resolved as usize
        } else {
            len - 1
        }
    }
}

/// The six cursor-transition commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorCommand {
    /// Freeze the Active region and start a new one. `None` uses the
    /// configured options.
    Add(Option<AddOptions>),
    Remove,
    Select { forward: bool },
    Activate,
    Exit,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown cursor command: {0}")]
    Unknown(String),
    #[error("invalid argument `{arg}` for {command}: {reason}")]
    InvalidArgument {
        command: &'static str,
        arg: String,
        reason: String,
    },
}

impl CursorCommand {
    /// Resolve a command by name with its argument table, as written in key
    /// binding definitions.
    pub fn from_name(name: &str, args: &toml::Table) -> Result<Self, CommandError> {
        match name {
            "add" => {
                if args.is_empty() {
                    return Ok(Self::Add(None));
                }
                let options = toml::Value::Table(args.clone())
                    .try_into::<AddOptions>()
                    .map_err(|err| CommandError::InvalidArgument {
                        command: "add",
                        arg: args.keys().cloned().collect::<Vec<_>>().join(", "),
                        reason: err.to_string(),
                    })?;
                Ok(Self::Add(Some(options)))
            }
            "remove" => Ok(Self::Remove),
            "select" => {
                let forward = match args.get("forward") {
                    None => false,
                    Some(value) => {
                        value
                            .as_bool()
                            .ok_or_else(|| CommandError::InvalidArgument {
                                command: "select",
                                arg: "forward".to_string(),
                                reason: format!("expected a boolean, found {value}"),
                            })?
                    }
                };
                Ok(Self::Select { forward })
            }
            "select_next" => Ok(Self::Select { forward: true }),
            "select_previous" => Ok(Self::Select { forward: false }),
            "activate" => Ok(Self::Activate),
            "exit" => Ok(Self::Exit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove => "remove",
            Self::Select { forward: true } => "select_next",
            Self::Select { forward: false } => "select_previous",
            Self::Activate => "activate",
            Self::Exit => "exit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> toml::Table {
        toml::from_str(src).expect("valid toml table")
    }

    #[test]
    fn resolves_negative_index_from_end() {
        let options = AddOptions::default();
        assert_eq!(options.resolve_index(3), 2);

        let options = AddOptions {
            keep_alive_index: -3,
            ..Default::default()
        };
        assert_eq!(options.resolve_index(3), 0);
    }

    #[test]
    fn out_of_range_index_falls_back_to_last() {
        let options = AddOptions {
            keep_alive_index: 7,
            ..Default::default()
        };
        assert_eq!(options.resolve_index(2), 1);

        let options = AddOptions {
            keep_alive_index: -9,
            ..Default::default()
        };
        assert_eq!(options.resolve_index(2), 1);
    }

    #[test]
    fn parses_select_direction() {
        let cmd = CursorCommand::from_name("select", &table("forward = true")).unwrap();
        assert_eq!(cmd, CursorCommand::Select { forward: true });

        let cmd = CursorCommand::from_name("select", &toml::Table::new()).unwrap();
        assert_eq!(cmd, CursorCommand::Select { forward: false });

        let err = CursorCommand::from_name("select", &table("forward = 1")).unwrap_err();
        assert!(err.to_string().contains("forward"));
    }

    #[test]
    fn parses_add_overrides() {
        let cmd = CursorCommand::from_name(
            "add",
            &table("keep_alive_index = 0\nkeep_alive_position = \"head\""),
        )
        .unwrap();
        assert_eq!(
            cmd,
            CursorCommand::Add(Some(AddOptions {
                keep_alive_index: 0,
                keep_alive_position: KeepAlive::Head,
            }))
        );
        assert_eq!(
            CursorCommand::from_name("add", &toml::Table::new()).unwrap(),
            CursorCommand::Add(None)
        );
    }

    #[test]
    fn rejects_unknown_names() {
        let err = CursorCommand::from_name("teleport", &toml::Table::new()).unwrap_err();
        assert!(matches!(err, CommandError::Unknown(name) if name == "teleport"));
    }
}
