use super::auth::{cookie_header, sign_in, Cookies, CredentialPrompt, CredentialStore};
use super::{AgentBackend, AgentClientError};
use crate::config::RunnerConfig;
use crate::model::{ModelConfig, TestCase, TestResult};
use crate::report::console;
use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;

/// reqwest-backed client for the agent backend. Built once per run and shared
/// by every worker; the session lives here instead of in process globals.
pub struct HttpAgentClient {
    base_url: String,
    http: reqwest::Client,
    store: CredentialStore,
    prompt: Arc<dyn CredentialPrompt>,
    session: RwLock<Option<Cookies>>,
}

impl HttpAgentClient {
    pub fn new(cfg: &RunnerConfig, prompt: Arc<dyn CredentialPrompt>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            base_url: cfg.backend_url.trim_end_matches('/').to_string(),
            http,
            store: CredentialStore::new(&cfg.auth_file),
            prompt,
            session: RwLock::new(None),
        })
    }

    /// Current session cookies. The first call reads the credential store and
    /// falls back to a login prompt; an empty set is kept when login fails so
    /// the backend's 401 drives the retry path.
    async fn session(&self) -> Cookies {
        if let Some(c) = self.session.read().await.as_ref() {
            return c.clone();
        }

        let cookies = match self.store.load() {
            Some(c) => c,
            None => self.login().await.unwrap_or_default(),
        };
        *self.session.write().await = Some(cookies.clone());
        cookies
    }

    async fn login(&self) -> Option<Cookies> {
        let prompt = self.prompt.clone();
        let creds = tokio::task::spawn_blocking(move || prompt.ask())
            .await
            .ok()
            .flatten()?;

        console::dim("Authenticating...");
        match sign_in(&self.http, &self.base_url, &creds).await {
            Ok(cookies) => {
                if let Err(e) = self.store.store(&cookies) {
                    tracing::warn!(event = "auth_store_failed", error = %e);
                }
                console::success("Logged in successfully!");
                Some(cookies)
            }
            Err(e) => {
                console::error(&e.to_string());
                None
            }
        }
    }
}

#[async_trait]
impl AgentBackend for HttpAgentClient {
    async fn run_test(
        &self,
        test_case: &TestCase,
        model: &ModelConfig,
    ) -> Result<TestResult, AgentClientError> {
        let cookies = self.session().await;

        let body = json!({
            "model": {
                "provider": model.provider,
                "modelId": model.model_id,
            },
            "prompt": test_case.prompt,
            "sql": test_case.sql,
        });

        let mut req = self
            .http
            .post(format!("{}/api/test/run", self.base_url))
            .json(&body);
        if !cookies.is_empty() {
            req = req.header(COOKIE, cookie_header(&cookies));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AgentClientError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(AgentClientError::Unauthorized),
            status => {
                let body = resp.text().await.unwrap_or_default();
                return Err(AgentClientError::Request {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        resp.json::<TestResult>()
            .await
            .map_err(|e| AgentClientError::Decode(e.to_string()))
    }

    async fn reauthenticate(&self) -> bool {
        console::warn("Session expired or unauthorized.");
        if let Err(e) = self.store.clear() {
            tracing::warn!(event = "auth_clear_failed", error = %e);
        }
        *self.session.write().await = None;

        match self.login().await {
            Some(cookies) => {
                *self.session.write().await = Some(cookies);
                true
            }
            None => false,
        }
    }
}
