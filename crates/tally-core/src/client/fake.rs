use super::{AgentBackend, AgentClientError};
use crate::model::{ModelConfig, TestCase, TestResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted backend for tests and dry runs. Responses are queued per test
/// name; an empty queue answers with a plain result without verification.
#[derive(Default)]
pub struct FakeBackend {
    scripts: Mutex<HashMap<String, VecDeque<Result<TestResult, AgentClientError>>>>,
    delays: HashMap<String, Duration>,
    reauth_ok: bool,
    calls: AtomicUsize,
    reauths: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            reauth_ok: true,
            ..Default::default()
        }
    }

    pub fn with_reauth(mut self, ok: bool) -> Self {
        self.reauth_ok = ok;
        self
    }

    pub fn with_delay(mut self, test_name: &str, delay: Duration) -> Self {
        self.delays.insert(test_name.to_string(), delay);
        self
    }

    pub fn push(self, test_name: &str, reply: Result<TestResult, AgentClientError>) -> Self {
        if let Ok(mut s) = self.scripts.lock() {
            s.entry(test_name.to_string()).or_default().push_back(reply);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reauths(&self) -> usize {
        self.reauths.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentBackend for FakeBackend {
    async fn run_test(
        &self,
        test_case: &TestCase,
        _model: &ModelConfig,
    ) -> Result<TestResult, AgentClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delays.get(&test_case.name) {
            tokio::time::sleep(*d).await;
        }
        let next = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut s| s.get_mut(&test_case.name).and_then(|q| q.pop_front()));
        next.unwrap_or_else(|| {
            Ok(TestResult {
                text: format!("answer for {}", test_case.name),
                finish_reason: "stop".into(),
                ..Default::default()
            })
        })
    }

    async fn reauthenticate(&self) -> bool {
        self.reauths.fetch_add(1, Ordering::SeqCst);
        self.reauth_ok
    }
}
