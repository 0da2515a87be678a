use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://octopus-app-8lwy6.ondigitalocean.app/";

const DB_VAR: &str = "NUTRIK_DB";
const API_URL_VAR: &str = "NUTRIK_API_URL";

pub struct Config {
    pub db_path: PathBuf,
    pub api_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::resolve(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    fn resolve(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = if let Some(path) = var(DB_VAR) {
            info!("{DB_VAR} set, using database at {path}");
            PathBuf::from(path)
        } else {
            let proj_dirs = ProjectDirs::from("", "", "nutrik")
                .context("Could not determine home directory")?;
            let data_dir = proj_dirs.data_dir().to_path_buf();
            debug!("{DB_VAR} not set, using data directory {}", data_dir.display());
            data_dir.join("nutrik.db")
        };

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory: {}", parent.display())
            })?;
        }

        let api_url = var(API_URL_VAR).unwrap_or_else(|| {
            debug!("{API_URL_VAR} not set, using default: {DEFAULT_API_URL}");
            DEFAULT_API_URL.to_string()
        });

        Ok(Config { db_path, api_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("ledger.db");
        let db_str = db.to_string_lossy().to_string();

        let config = Config::resolve(|key| match key {
            DB_VAR => Some(db_str.clone()),
            API_URL_VAR => Some("http://localhost:3000/".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.db_path, db);
        assert_eq!(config.api_url, "http://localhost:3000/");
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_default_api_url() {
        let dir = tempfile::tempdir().unwrap();
        let db_str = dir.path().join("n.db").to_string_lossy().to_string();
        let config = Config::resolve(|key| (key == DB_VAR).then(|| db_str.clone())).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }
}
