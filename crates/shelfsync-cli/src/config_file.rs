use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shelfsync_core::ShelfsyncConfig;

pub const CONFIG_ENV: &str = "SHELFSYNC_CONFIG";

/// `--config`, then `SHELFSYNC_CONFIG`, then `<config_dir>/shelfsync/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("shelfsync")
        .join("config.toml")
}

/// Load and validate the config, falling back to defaults if the file doesn't exist.
pub fn load_from(path: &Path) -> Result<ShelfsyncConfig> {
    if !path.exists() {
        return Ok(ShelfsyncConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    ShelfsyncConfig::from_toml_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))
}

/// Write the default config. An existing file is left alone unless `force`.
pub fn init_at(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let toml_str = ShelfsyncConfig::default().to_toml_string()?;
    std::fs::write(path, toml_str).with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/elsewhere.toml");
        assert_eq!(config_path(Some(path)), path);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ShelfsyncConfig::default());
    }

    #[test]
    fn init_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(init_at(&path, false).unwrap());
        assert!(!init_at(&path, false).unwrap());
        assert_eq!(load_from(&path).unwrap(), ShelfsyncConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[batch]\nbatch_size = 7\n").unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.batch.batch_size, 7);
        assert_eq!(config.title, ShelfsyncConfig::default().title);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[progress.thresholds]\nlow = 90.0\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }
}
