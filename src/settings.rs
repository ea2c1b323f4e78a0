use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::DB_FILE;
use crate::error::{CycleError, Result};
use crate::vault::KEY_FILE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Program invoked once per due schedule by `cardcycle run`.
    #[serde(default)]
    pub downloader: Option<String>,
    #[serde(default)]
    pub downloader_args: Vec<String>,
    /// Seconds before a running downloader is killed.
    #[serde(default = "default_downloader_timeout")]
    pub downloader_timeout_secs: u64,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_downloader_timeout() -> u64 {
    300
}

fn default_log_filter() -> String {
    "cardcycle=warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            downloader: None,
            downloader_args: Vec::new(),
            downloader_timeout_secs: default_downloader_timeout(),
            log_filter: default_log_filter(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("cardcycle")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("cardcycle")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CycleError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join(DB_FILE)
}

pub fn key_path() -> PathBuf {
    get_data_dir().join(KEY_FILE)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            downloader: Some("/usr/local/bin/fetch-statement".to_string()),
            downloader_args: vec!["--headless".to_string()],
            downloader_timeout_secs: 90,
            log_filter: "cardcycle=debug".to_string(),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.downloader.as_deref(), Some("/usr/local/bin/fetch-statement"));
        assert_eq!(loaded.downloader_args, vec!["--headless"]);
        assert_eq!(loaded.downloader_timeout_secs, 90);
        assert_eq!(loaded.log_filter, "cardcycle=debug");
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.downloader.is_none());
        assert!(s.downloader_args.is_empty());
        assert_eq!(s.log_filter, "cardcycle=warn");
        assert!(s.data_dir.ends_with("cardcycle"));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.log_filter, "cardcycle=warn");
        assert_eq!(s.downloader_timeout_secs, 300);
        assert!(s.downloader.is_none());
    }

    #[test]
    fn test_shellexpand_keeps_unknown_paths() {
        assert_eq!(shellexpand_path("/definitely/not/here"), "/definitely/not/here");
    }
}
