pub mod settings;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "https://api.cluster-fluster.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Env,
    File,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::File => "file",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub data_dir: PathBuf,
    pub settings_file: PathBuf,
    pub local_state_file: PathBuf,
    pub server_url: String,
    pub server_url_source: ConfigSource,
    pub machine_id: Option<String>,
}

impl Configuration {
    pub fn create() -> Result<Self> {
        // Resolve data directory: HAPPY_HOME_DIR env or ~/.happy
        let data_dir = if let Ok(home) = std::env::var("HAPPY_HOME_DIR") {
            PathBuf::from(home)
        } else {
            let home = dirs_next::home_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
            home.join(".happy")
        };
        std::fs::create_dir_all(&data_dir)?;

        Self::load(&data_dir, std::env::var("HAPPY_SERVER_URL").ok())
    }

    /// Resolve configuration for `data_dir`: env > file > default.
    pub fn load(data_dir: &Path, env_server_url: Option<String>) -> Result<Self> {
        let settings_file = settings::settings_file_path(data_dir);
        let stored = settings::read_settings(&settings_file)?;

        let (server_url, server_url_source) = match (env_server_url, stored.server_url) {
            (Some(url), _) if !url.trim().is_empty() => (url, ConfigSource::Env),
            (_, Some(url)) => (url, ConfigSource::File),
            _ => (DEFAULT_SERVER_URL.to_string(), ConfigSource::Default),
        };

        Ok(Configuration {
            data_dir: data_dir.to_path_buf(),
            local_state_file: data_dir.join("local-state.json"),
            settings_file,
            server_url: server_url.trim_end_matches('/').to_string(),
            server_url_source,
            machine_id: stored.machine_id,
        })
    }
}
