use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::cursors::command::AddOptions;
use crate::keymap::{KeyBindingDef, Keymap, KeymapError};

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid built-in config: {0}")]
    Defaults(#[source] toml::de::Error),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Keymap(#[from] KeymapError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub editor: EditorConfig,
    pub cursors: AddOptions,
    #[serde(default)]
    pub keybindings: Vec<KeyBindingDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    pub scroll_off: u16,
    pub tab_width: u16,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    ///
    /// An explicit path must exist; otherwise the platform config file is
    /// used when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => user_config_path().filter(|path| path.exists()),
        };

        let Some(path) = path else {
            return Self::defaults();
        };

        let user_src = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        tracing::info!("loading config from {}", path.display());
        Self::with_overlay(&user_src, &path)
    }

    pub fn defaults() -> Result<Self, ConfigError> {
        toml::from_str(DEFAULT_CONFIG).map_err(ConfigError::Defaults)
    }

    /// Merge a user config over the defaults. Tables merge key by key and
    /// arrays append, so user key bindings extend (and override) the
    /// built-in ones.
    pub fn with_overlay(user_src: &str, path: &Path) -> Result<Self, ConfigError> {
        let parse_err = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let mut base: toml::Table = toml::from_str(DEFAULT_CONFIG).map_err(ConfigError::Defaults)?;
        let overlay: toml::Table = toml::from_str(user_src).map_err(parse_err)?;
        merge_tables(&mut base, overlay);

        toml::Value::Table(base).try_into().map_err(parse_err)
    }

    pub fn keymap(&self) -> Result<Keymap, KeymapError> {
        Keymap::from_defs(&self.keybindings)
    }
}

/// Platform config file location.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "power-cursors")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, incoming) in overlay {
        let merged = match (base.remove(&key), incoming) {
            (Some(toml::Value::Table(mut existing)), toml::Value::Table(incoming)) => {
                merge_tables(&mut existing, incoming);
                toml::Value::Table(existing)
            }
            (Some(toml::Value::Array(mut existing)), toml::Value::Array(incoming)) => {
                existing.extend(incoming);
                toml::Value::Array(existing)
            }
            (_, incoming) => incoming,
        };
        base.insert(key, merged);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::*;
    use crate::cursors::command::CursorCommand;
    use crate::model::region::KeepAlive;

    #[test]
    fn built_in_defaults_parse() {
        let config = AppConfig::defaults().unwrap();
        assert_eq!(config.cursors, AddOptions::default());
        assert_eq!(config.general.log_filter, "power_cursors=info");
        assert_eq!(config.keymap().unwrap().len(), config.keybindings.len());
    }

    #[test]
    fn overlay_merges_sections_key_by_key() {
        let config = AppConfig::with_overlay(
            "[cursors]\nkeep_alive_position = \"head\"\n[editor]\nscroll_off = 8\n",
            Path::new("user.toml"),
        )
        .unwrap();

        assert_eq!(config.cursors.keep_alive_position, KeepAlive::Head);
        assert_eq!(config.cursors.keep_alive_index, -1);
        assert_eq!(config.editor.scroll_off, 8);
        assert_eq!(config.editor.tab_width, 4);
    }

    #[test]
    fn user_bindings_override_defaults() {
        let config = AppConfig::with_overlay(
            "[[keybindings]]\nkeys = \"alt+enter\"\ncommand = \"activate\"\n",
            Path::new("user.toml"),
        )
        .unwrap();
        let keymap = config.keymap().unwrap();
        let event = KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT);

        assert_eq!(keymap.lookup(&event, true), Some(CursorCommand::Activate));
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nlog_filter = \"power_cursors=debug\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.general.log_filter, "power_cursors=debug");
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = AppConfig::load(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[editor]\nscroll_off = \"lots\"\n").unwrap();
        let err = AppConfig::load(Some(&broken)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}
