use crate::client::{AgentBackend, AgentClientError};
use crate::model::{ModelConfig, RunSummary, TestCase, TestResult, TestRunDetails, TestRunResult};
use crate::report::console;
use crate::verify::{self, Tolerance};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

const RESPONSE_PREVIEW_CHARS: usize = 200;

pub struct Runner {
    pub client: Arc<dyn AgentBackend>,
    pub tolerance: Tolerance,
    /// Print per-pair progress to the terminal.
    pub verbose: bool,
}

impl Runner {
    pub fn new(client: Arc<dyn AgentBackend>) -> Self {
        Self {
            client,
            tolerance: Tolerance::default(),
            verbose: true,
        }
    }

    /// Every (test, model) pair, models in the outer loop.
    pub fn pairs(test_cases: &[TestCase], models: &[ModelConfig]) -> Vec<(TestCase, ModelConfig)> {
        models
            .iter()
            .flat_map(|m| test_cases.iter().map(move |tc| (tc.clone(), m.clone())))
            .collect()
    }

    /// Runs the full matrix. With `concurrency <= 1` results follow the pair
    /// order; otherwise they arrive in completion order.
    pub async fn run_all(
        &self,
        test_cases: &[TestCase],
        models: &[ModelConfig],
        concurrency: usize,
    ) -> RunSummary {
        let pairs = Self::pairs(test_cases, models);
        tracing::info!(event = "run_start", pairs = pairs.len(), concurrency);

        let results = if concurrency <= 1 {
            let mut results = Vec::with_capacity(pairs.len());
            for (tc, model) in &pairs {
                results.push(self.run_pair(tc, model).await);
                if self.verbose {
                    eprintln!();
                }
            }
            results
        } else {
            self.run_parallel(pairs, concurrency).await
        };

        let summary = RunSummary::new(results);
        tracing::info!(
            event = "run_finished",
            total = summary.summary.total,
            passed = summary.summary.passed,
            failed = summary.summary.failed
        );
        summary
    }

    /// `run_all` followed by writing the summary into `output_dir`.
    pub async fn run_and_persist(
        &self,
        test_cases: &[TestCase],
        models: &[ModelConfig],
        concurrency: usize,
        output_dir: &Path,
    ) -> anyhow::Result<(RunSummary, PathBuf)> {
        let summary = self.run_all(test_cases, models, concurrency).await;
        let path = crate::report::json::write_summary(&summary, output_dir)?;
        Ok((summary, path))
    }

    async fn run_parallel(
        &self,
        pairs: Vec<(TestCase, ModelConfig)>,
        concurrency: usize,
    ) -> Vec<TestRunResult> {
        let sem = Arc::new(Semaphore::new(concurrency));
        let mut set = JoinSet::new();
        let shared = self.clone_for_task();
        let mut labels: HashMap<task::Id, (String, String)> = HashMap::with_capacity(pairs.len());

        for (tc, model) in pairs {
            let label = (tc.name.clone(), model.to_string());
            let sem = sem.clone();
            let this = shared.clone();
            let handle = set.spawn(async move {
                // The semaphore is never closed, so acquire only fails on shutdown.
                let _permit = sem.acquire_owned().await.ok();
                this.run_pair(&tc, &model).await
            });
            labels.insert(handle.id(), label);
        }

        let mut results = Vec::with_capacity(labels.len());
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, row)) => results.push(row),
                Err(e) => {
                    tracing::error!(event = "task_failed", error = %e);
                    let (name, model) = labels
                        .remove(&e.id())
                        .unwrap_or_else(|| ("unknown".into(), "unknown".into()));
                    results.push(TestRunResult::failed(
                        &name,
                        &model,
                        format!("task error: {}", e),
                    ));
                }
            }
            if self.verbose {
                eprintln!();
            }
        }
        results
    }

    /// One pair: call the backend (re-authenticating once on 401) and verify
    /// the returned rows. Never fails; errors become a failed result.
    pub async fn run_pair(&self, tc: &TestCase, model: &ModelConfig) -> TestRunResult {
        let label = model.to_string();
        if self.verbose {
            eprintln!("Running: {} ({})", tc.name, label);
            console::dim(&format!("  Prompt: {}", tc.prompt));
        }

        let outcome = match self.client.run_test(tc, model).await {
            Err(AgentClientError::Unauthorized) => {
                if self.client.reauthenticate().await {
                    self.client.run_test(tc, model).await
                } else {
                    Err(AgentClientError::Unauthorized)
                }
            }
            other => other,
        };

        let row = match outcome {
            Ok(result) => self.evaluate(tc, &label, result),
            Err(e) => {
                if self.verbose {
                    console::error(&e.to_string());
                }
                TestRunResult::failed(&tc.name, &label, e.to_string())
            }
        };

        tracing::debug!(
            event = "pair_finished",
            test = %row.name,
            model = %row.model,
            passed = row.passed,
            message = %row.message
        );
        row
    }

    fn evaluate(&self, tc: &TestCase, label: &str, result: TestResult) -> TestRunResult {
        let tool_call_count = result.tool_calls.len();
        if self.verbose {
            self.print_response(&result);
        }

        let Some(payload) = result.verification.as_ref() else {
            if self.verbose {
                console::warn("  ⚠ no verification data");
            }
            return TestRunResult {
                name: tc.name.clone(),
                model: label.to_string(),
                passed: true,
                message: "no verification".into(),
                tokens: result.usage.total_tokens,
                cost: result.cost.total_cost,
                duration_ms: Some(result.duration_ms),
                tool_call_count: Some(tool_call_count),
                error: None,
                details: Some(TestRunDetails {
                    response_text: Some(result.text),
                    tool_calls: Some(result.tool_calls),
                    ..Default::default()
                }),
            };
        };

        let verdict = verify::verify_with(
            &payload.data,
            &payload.expected_data,
            &payload.expected_columns,
            self.tolerance,
        );
        if self.verbose {
            eprintln!("  {} {}", console::status_icon(verdict.passed), verdict.message);
            if let Some(diff) = &verdict.diff {
                console::dim(diff);
            }
        }

        let payload = payload.clone();
        TestRunResult {
            name: tc.name.clone(),
            model: label.to_string(),
            passed: verdict.passed,
            message: verdict.message,
            tokens: result.usage.total_tokens,
            cost: result.cost.total_cost,
            duration_ms: Some(result.duration_ms),
            tool_call_count: Some(tool_call_count),
            error: None,
            details: Some(TestRunDetails {
                response_text: Some(result.text),
                actual_data: Some(payload.data),
                expected_data: Some(payload.expected_data),
                comparison: verdict.diff,
                tool_calls: Some(result.tool_calls),
            }),
        }
    }

    fn print_response(&self, result: &TestResult) {
        if !result.text.is_empty() {
            let preview: String = result.text.chars().take(RESPONSE_PREVIEW_CHARS).collect();
            console::dim(&format!("  Response: {}...", preview));
        }
        if !result.tool_calls.is_empty() {
            console::dim(&format!(
                "  Tool calls: {} [{}]",
                result.tool_calls.len(),
                result.tool_names().join(", ")
            ));
        }
        let tokens = result
            .usage
            .total_tokens
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".into());
        let cost = result
            .cost
            .total_cost
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into());
        console::dim(&format!("  Tokens: {}", tokens));
        console::dim(&format!("  Cost: ${}", cost));
        console::dim(&format!("  Time: {}ms", result.duration_ms));
    }

    fn clone_for_task(&self) -> Arc<Runner> {
        Arc::new(Runner {
            client: self.client.clone(),
            tolerance: self.tolerance,
            verbose: self.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeBackend;
    use crate::model::VerificationPayload;
    use serde_json::json;

    fn case(name: &str) -> TestCase {
        TestCase {
            name: name.into(),
            prompt: format!("prompt for {}", name),
            sql: None,
            file_path: PathBuf::from(format!("tests/{}.yml", name)),
        }
    }

    fn model(s: &str) -> ModelConfig {
        ModelConfig::parse(s).unwrap()
    }

    fn with_rows(actual: serde_json::Value, expected: serde_json::Value) -> TestResult {
        TestResult {
            text: "done".into(),
            tool_calls: vec![json!({"toolName": "execute_sql"})],
            usage: serde_json::from_value(json!({"totalTokens": 50})).unwrap(),
            cost: serde_json::from_value(json!({"totalCost": 0.5})).unwrap(),
            finish_reason: "stop".into(),
            duration_ms: 1200,
            verification: Some(VerificationPayload {
                data: serde_json::from_value(actual).unwrap(),
                expected_data: serde_json::from_value(expected).unwrap(),
                expected_columns: vec![],
            }),
        }
    }

    fn quiet(client: Arc<dyn AgentBackend>) -> Runner {
        Runner {
            verbose: false,
            ..Runner::new(client)
        }
    }

    #[test]
    fn pairs_put_models_in_the_outer_loop() {
        let pairs = Runner::pairs(
            &[case("a"), case("b")],
            &[model("openai:gpt-4.1"), model("anthropic:claude")],
        );
        let labels: Vec<_> = pairs
            .iter()
            .map(|(t, m)| format!("{}@{}", t.name, m))
            .collect();
        assert_eq!(
            labels,
            vec![
                "a@openai:gpt-4.1",
                "b@openai:gpt-4.1",
                "a@anthropic:claude",
                "b@anthropic:claude"
            ]
        );
    }

    #[tokio::test]
    async fn verification_drives_the_verdict() {
        let fake = FakeBackend::new()
            .push("ok", Ok(with_rows(json!([{"n": 1}]), json!([{"n": 1}]))))
            .push("bad", Ok(with_rows(json!([{"n": 1}]), json!([{"n": 2}]))));
        let runner = quiet(Arc::new(fake));

        let s = runner
            .run_all(&[case("ok"), case("bad")], &[model("openai:gpt-4.1")], 1)
            .await;
        assert_eq!(s.results[0].message, "match");
        assert!(s.results[0].passed);
        assert!(!s.results[1].passed);
        assert_eq!(s.results[1].message, "values differ");

        let details = s.results[1].details.as_ref().unwrap();
        assert!(details.comparison.as_ref().unwrap().contains("n (actual)"));
        assert_eq!(details.actual_data.as_ref().unwrap().len(), 1);
        assert_eq!(s.results[1].tokens, Some(50));
        assert_eq!(s.results[1].tool_call_count, Some(1));
        assert_eq!(s.summary.total_tokens, 100);
    }

    #[tokio::test]
    async fn missing_verification_passes() {
        let runner = quiet(Arc::new(FakeBackend::new()));
        let s = runner
            .run_all(&[case("plain")], &[model("openai:gpt-4.1")], 1)
            .await;
        let r = &s.results[0];
        assert!(r.passed);
        assert_eq!(r.message, "no verification");
        let d = r.details.as_ref().unwrap();
        assert_eq!(d.response_text.as_deref(), Some("answer for plain"));
        assert!(d.actual_data.is_none());
    }

    #[tokio::test]
    async fn one_unauthorized_is_retried_after_reauth() {
        let fake = Arc::new(
            FakeBackend::new()
                .push("t", Err(AgentClientError::Unauthorized))
                .push("t", Ok(with_rows(json!([{"a": 1}]), json!([{"a": 1}])))),
        );
        let runner = quiet(fake.clone());
        let r = runner.run_pair(&case("t"), &model("openai:gpt-4.1")).await;
        assert!(r.passed);
        assert_eq!(r.error, None);
        assert_eq!(fake.calls(), 2);
        assert_eq!(fake.reauths(), 1);
    }

    #[tokio::test]
    async fn second_unauthorized_fails_the_pair_only() {
        let fake = Arc::new(
            FakeBackend::new()
                .push("t", Err(AgentClientError::Unauthorized))
                .push("t", Err(AgentClientError::Unauthorized)),
        );
        let runner = quiet(fake.clone());
        let s = runner
            .run_all(&[case("t"), case("other")], &[model("openai:gpt-4.1")], 1)
            .await;
        assert!(!s.results[0].passed);
        assert_eq!(s.results[0].message, "error");
        assert!(s.results[0].error.as_ref().unwrap().contains("Unauthorized"));
        assert!(s.results[1].passed);
        assert_eq!(fake.reauths(), 1);
    }

    #[tokio::test]
    async fn failed_reauth_does_not_retry() {
        let fake = Arc::new(
            FakeBackend::new()
                .with_reauth(false)
                .push("t", Err(AgentClientError::Unauthorized)),
        );
        let runner = quiet(fake.clone());
        let r = runner.run_pair(&case("t"), &model("openai:gpt-4.1")).await;
        assert!(!r.passed);
        assert_eq!(fake.calls(), 1);
        assert_eq!(
            r.error.as_deref(),
            Some("Unauthorized. Please check your credentials.")
        );
    }

    #[tokio::test]
    async fn backend_errors_are_isolated() {
        let fake = FakeBackend::new().push(
            "boom",
            Err(AgentClientError::Request {
                status: 500,
                body: "internal".into(),
            }),
        );
        let runner = quiet(Arc::new(fake));
        let s = runner
            .run_all(
                &[case("boom"), case("fine")],
                &[model("openai:gpt-4.1")],
                4,
            )
            .await;
        assert_eq!(s.summary.total, 2);
        assert_eq!(s.summary.failed, 1);
        let boom = s.results.iter().find(|r| r.name == "boom").unwrap();
        assert_eq!(boom.error.as_deref(), Some("Request failed: 500 internal"));
        assert!(boom.details.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_results_arrive_in_completion_order() {
        let fake = FakeBackend::new()
            .with_delay("slow", std::time::Duration::from_millis(300))
            .with_delay("fast", std::time::Duration::from_millis(10));
        let runner = quiet(Arc::new(fake));
        let s = runner
            .run_all(&[case("slow"), case("fast")], &[model("openai:gpt-4.1")], 2)
            .await;
        let names: Vec<_> = s.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn persisted_run_lands_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = quiet(Arc::new(FakeBackend::new()));
        let (summary, path) = runner
            .run_and_persist(
                &[case("a"), case("b")],
                &[model("openai:gpt-4.1")],
                1,
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(summary.summary.total, 2);
        assert!(path.exists());
        assert!(crate::report::json::is_result_file_name(
            &path.file_name().unwrap().to_string_lossy()
        ));
    }

    struct PanicsOn(&'static str);

    #[async_trait::async_trait]
    impl AgentBackend for PanicsOn {
        async fn run_test(
            &self,
            test_case: &TestCase,
            _model: &ModelConfig,
        ) -> Result<TestResult, AgentClientError> {
            if test_case.name == self.0 {
                panic!("backend blew up on {}", test_case.name);
            }
            Ok(TestResult {
                text: "ok".into(),
                ..Default::default()
            })
        }

        async fn reauthenticate(&self) -> bool {
            false
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicked_task_keeps_its_own_label() {
        let runner = quiet(Arc::new(PanicsOn("x")));
        let s = runner
            .run_all(
                &[case("unknown"), case("x"), case("x")],
                &[model("openai:gpt-4.1")],
                2,
            )
            .await;
        assert_eq!(s.summary.total, 3);

        let unknown: Vec<_> = s.results.iter().filter(|r| r.name == "unknown").collect();
        assert_eq!(unknown.len(), 1);
        assert!(unknown[0].passed);
        assert_eq!(unknown[0].error, None);

        let crashed: Vec<_> = s.results.iter().filter(|r| r.name == "x").collect();
        assert_eq!(crashed.len(), 2);
        for r in crashed {
            assert!(!r.passed);
            assert_eq!(r.model, "openai:gpt-4.1");
            assert!(r.error.as_ref().unwrap().starts_with("task error:"));
        }
    }
}
