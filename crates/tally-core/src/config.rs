use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TESTS_FOLDER: &str = "tests";
pub const OUTPUTS_FOLDER: &str = "outputs";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5005";
pub const DEFAULT_MODELS: &[&str] = &["openai:gpt-4.1"];

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub backend_url: String,
    pub auth_file: PathBuf,
    pub request_timeout: Duration,
    pub log_level: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            auth_file: default_auth_file(),
            request_timeout: Duration::from_secs(300),
            log_level: "warn".to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("BACKEND_URL") {
            if !v.trim().is_empty() {
                cfg.backend_url = v.trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = env::var("TALLY_AUTH_FILE") {
            cfg.auth_file = PathBuf::from(v);
        }
        if let Ok(v) = env::var("TALLY_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                cfg.request_timeout = Duration::from_secs(n);
            }
        }
        if let Ok(v) = env::var("TALLY_LOG") {
            cfg.log_level = v;
        }
        cfg
    }
}

fn default_auth_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tally")
        .join("auth.json")
}

pub fn tests_dir(project: &Path) -> PathBuf {
    project.join(TESTS_FOLDER)
}

pub fn outputs_dir(project: &Path) -> PathBuf {
    tests_dir(project).join(OUTPUTS_FOLDER)
}
