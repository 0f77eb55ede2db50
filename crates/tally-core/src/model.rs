use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub prompt: String,
    pub sql: Option<String>,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelConfig {
    pub provider: String,
    pub model_id: String,
}

impl ModelConfig {
    /// Parses a `provider:model_id` string. Only the first `:` separates, so
    /// model ids may themselves contain colons.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let Some((provider, model_id)) = s.split_once(':') else {
            anyhow::bail!("Invalid model format: {}. Use 'provider:model_id'", s);
        };
        Ok(Self {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
        })
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default)]
    pub input_total_tokens: Option<u64>,
    #[serde(default)]
    pub input_no_cache_tokens: Option<u64>,
    #[serde(default)]
    pub input_cache_read_tokens: Option<u64>,
    #[serde(default)]
    pub input_cache_write_tokens: Option<u64>,
    #[serde(default)]
    pub output_total_tokens: Option<u64>,
    #[serde(default)]
    pub output_text_tokens: Option<u64>,
    #[serde(default)]
    pub output_reasoning_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenCost {
    #[serde(default)]
    pub input_no_cache: Option<f64>,
    #[serde(default)]
    pub input_cache_read: Option<f64>,
    #[serde(default)]
    pub input_cache_write: Option<f64>,
    #[serde(default)]
    pub output: Option<f64>,
    #[serde(default)]
    pub total_cost: Option<f64>,
}

/// Actual vs. expected rows as returned by the backend for one test.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Row>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_data: Vec<Row>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_columns: Vec<String>,
}

/// Raw backend response for one (test, model) invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tool_calls: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: TokenUsage,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cost: TokenCost,
    #[serde(default, deserialize_with = "null_as_default")]
    pub finish_reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration_ms: u64,
    /// `null` and `{}` both mean the backend had nothing to verify.
    #[serde(default, deserialize_with = "non_empty_verification")]
    pub verification: Option<VerificationPayload>,
}

/// The backend sends explicit `null` for fields it has no value for.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn non_empty_verification<'de, D>(d: D) -> Result<Option<VerificationPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(d)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(m)) if m.is_empty() => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|e| <D::Error as serde::de::Error>::custom(e)),
    }
}

impl TestResult {
    pub fn tool_names(&self) -> Vec<String> {
        self.tool_calls
            .iter()
            .map(|tc| {
                tc.get("toolName")
                    .and_then(|v| v.as_str())
                    .unwrap_or("?")
                    .to_string()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestRunDetails {
    pub response_text: Option<String>,
    pub actual_data: Option<Vec<Row>>,
    pub expected_data: Option<Vec<Row>>,
    pub comparison: Option<String>,
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

/// Final verdict for one (test, model) pair. Serialized as-is into the run
/// summary, nulls included, since the viewer reads every field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRunResult {
    pub name: String,
    pub model: String,
    pub passed: bool,
    pub message: String,
    pub tokens: Option<u64>,
    pub cost: Option<f64>,
    pub duration_ms: Option<u64>,
    pub tool_call_count: Option<usize>,
    pub error: Option<String>,
    pub details: Option<TestRunDetails>,
}

impl TestRunResult {
    pub fn failed(name: &str, model: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            passed: false,
            message: "error".into(),
            tokens: None,
            cost: None,
            duration_ms: None,
            tool_call_count: None,
            error: Some(error),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SummaryTotals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_duration_ms: u64,
    pub total_duration_s: f64,
    pub total_tool_calls: usize,
    pub avg_duration_ms: f64,
    pub avg_tool_calls: f64,
}

impl SummaryTotals {
    pub fn compute(results: &[TestRunResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let total_duration_ms: u64 = results.iter().map(|r| r.duration_ms.unwrap_or(0)).sum();
        let total_tool_calls: usize = results.iter().map(|r| r.tool_call_count.unwrap_or(0)).sum();

        let (avg_duration_ms, avg_tool_calls) = if total > 0 {
            (
                round_to(total_duration_ms as f64 / total as f64, 0),
                round_to(total_tool_calls as f64 / total as f64, 1),
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            total,
            passed,
            failed: total - passed,
            total_tokens: results.iter().map(|r| r.tokens.unwrap_or(0)).sum(),
            total_cost: results.iter().map(|r| r.cost.unwrap_or(0.0)).sum(),
            total_duration_ms,
            total_duration_s: round_to(total_duration_ms as f64 / 1000.0, 2),
            total_tool_calls,
            avg_duration_ms,
            avg_tool_calls,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub timestamp: String,
    pub results: Vec<TestRunResult>,
    pub summary: SummaryTotals,
}

impl RunSummary {
    pub fn new(results: Vec<TestRunResult>) -> Self {
        let summary = SummaryTotals::compute(&results);
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            results,
            summary,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let p = 10f64.powi(decimals);
    (v * p).round_ties_even() / p
}
