use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_api_base() -> String {
    "https://stream.resonate.coop/api/v2".to_string()
}

fn default_stream_base() -> String {
    "https://stream.resonate.coop/api/v2/stream".to_string()
}

fn default_user_agent() -> String {
    format!("playhead/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_stream_base")]
    pub stream_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Log directory override; relative paths resolve against the working directory.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            stream_base: default_stream_base(),
            user_agent: default_user_agent(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn get_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("playhead");
        std::fs::create_dir_all(&path).ok();
        path.push("config.toml");
        path
    }

    pub fn load() -> Self {
        let path = Self::get_config_path();
        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str(&content) {
                    return config;
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) {
        let path = Self::get_config_path();
        if let Ok(content) = toml::to_string_pretty(self) {
            let _ = fs::write(path, content);
        }
    }
}
