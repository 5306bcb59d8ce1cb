use std::env;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "MedTwin";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn default_log_filter() -> &'static str {
    "medtwin=info,tower_http=info"
}

/// Get the application data directory (~/MedTwin/)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("MedTwin")
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join("medtwin.db")
}

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub agent_base_url: String,
    pub agent_api_key: String,
    pub agent_model: String,
    pub agent_timeout_secs: u64,
    pub calendar_base_url: String,
    pub calendar_timeout_secs: u64,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("MEDTWIN_BIND").unwrap_or_else(|_| "127.0.0.1:8700".to_string()),
            database_path: env::var("MEDTWIN_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_db_path()),
            agent_base_url: env::var("DEEPSEEK_BASE_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com".to_string()),
            agent_api_key: env::var("DEEPSEEK_API_KEY").unwrap_or_default(),
            agent_model: env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),
            agent_timeout_secs: parse_env("MEDTWIN_AGENT_TIMEOUT_SECS", 20),
            calendar_base_url: env::var("MEDTWIN_CALENDAR_URL")
                .unwrap_or_else(|_| "http://localhost:8791".to_string()),
            calendar_timeout_secs: parse_env("MEDTWIN_CALENDAR_TIMEOUT_SECS", 10),
        }
    }
}

fn parse_env(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
