use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8765;

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub port: u16,
    /// Folder holding `results_*.json` run summaries.
    pub outputs_dir: PathBuf,
}

impl ViewerConfig {
    pub fn new(outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: DEFAULT_PORT,
            outputs_dir: outputs_dir.into(),
        }
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}
