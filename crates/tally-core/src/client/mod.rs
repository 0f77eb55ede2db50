use crate::model::{ModelConfig, TestCase, TestResult};
use async_trait::async_trait;

pub mod auth;
pub mod fake;
pub mod http;

pub use http::HttpAgentClient;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentClientError {
    /// The backend answered 401: the session is missing or expired.
    #[error("Unauthorized. Please check your credentials.")]
    Unauthorized,
    #[error("Request failed: {status} {body}")]
    Request { status: u16, body: String },
    #[error("Connection error: {0}")]
    Network(String),
    #[error("Invalid response from backend: {0}")]
    Decode(String),
}

/// The remote service that executes a prompt for a given model.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn run_test(
        &self,
        test_case: &TestCase,
        model: &ModelConfig,
    ) -> Result<TestResult, AgentClientError>;

    /// Drops the current session and logs in again. Returns true when a fresh
    /// session was obtained.
    async fn reauthenticate(&self) -> bool;
}
