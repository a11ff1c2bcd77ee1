// src/models.rs
use serde::{Deserialize, Deserializer, Serialize};

/// One input/expected-output example sent to the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub name: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// `None` when no expected value was given; compares equal only to `undefined`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
}

/// Keeps an explicit `null` as `Some(Null)`; only a missing field is `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// Everything the sandbox needs for one run. Built fresh per dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub code: String,
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl TestResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pass: true,
            error: None,
            expected: None,
            actual: None,
        }
    }

    pub fn errored(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pass: false,
            error: Some(error.into()),
            expected: None,
            actual: None,
        }
    }

    pub fn mismatch(name: impl Into<String>, expected: String, actual: String) -> Self {
        Self {
            name: name.into(),
            pass: false,
            error: Some("Output mismatch.".to_string()),
            expected: Some(expected),
            actual: Some(actual),
        }
    }
}

/// Outcome of one sandbox run.
///
/// On the wire this is `{ "ok": true, "results", "logs" }` or
/// `{ "ok": false, "error", "logs" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResponse", try_from = "WireResponse")]
pub enum RunResponse {
    Success {
        results: Vec<TestResult>,
        logs: Vec<String>,
    },
    Failure {
        error: String,
        logs: Vec<String>,
    },
}

impl RunResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        RunResponse::Failure {
            error: error.into(),
            logs: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RunResponse::Success { .. })
    }

    pub fn logs(&self) -> &[String] {
        match self {
            RunResponse::Success { logs, .. } | RunResponse::Failure { logs, .. } => logs,
        }
    }

    pub fn results(&self) -> &[TestResult] {
        match self {
            RunResponse::Success { results, .. } => results,
            RunResponse::Failure { .. } => &[],
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireResponse {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    results: Option<Vec<TestResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    logs: Vec<String>,
}

impl From<RunResponse> for WireResponse {
    fn from(response: RunResponse) -> Self {
        match response {
            RunResponse::Success { results, logs } => WireResponse {
                ok: true,
                results: Some(results),
                error: None,
                logs,
            },
            RunResponse::Failure { error, logs } => WireResponse {
                ok: false,
                results: None,
                error: Some(error),
                logs,
            },
        }
    }
}

impl TryFrom<WireResponse> for RunResponse {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        if wire.ok {
            let results = wire
                .results
                .ok_or_else(|| "response with ok=true is missing `results`".to_string())?;
            Ok(RunResponse::Success {
                results,
                logs: wire.logs,
            })
        } else {
            let error = wire
                .error
                .ok_or_else(|| "response with ok=false is missing `error`".to_string())?;
            Ok(RunResponse::Failure {
                error,
                logs: wire.logs,
            })
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerdictSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl VerdictSummary {
    pub fn of(response: &RunResponse) -> Self {
        let results = response.results();
        let passed = results.iter().filter(|r| r.pass).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }

    /// `passed`, `failed`, or `error` for a load failure.
    pub fn status(&self, response: &RunResponse) -> &'static str {
        if !response.is_ok() {
            "error"
        } else if self.failed == 0 {
            "passed"
        } else {
            "failed"
        }
    }
}
