// src/host.rs
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Case, RunRequest, RunResponse, VerdictSummary};
use crate::worker::SandboxWorker;

/// A case as the user typed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCase {
    /// Stable identifier for UI tracking; never sent to the sandbox.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub expected: String,
}

impl RawCase {
    pub fn new(args: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            args: args.into(),
            expected: expected.into(),
        }
    }
}

/// Blank text is absent. Otherwise JSON if it parses, else the trimmed text as a string literal.
pub fn parse_case_value(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| serde_json::Value::String(trimmed.to_string())))
}

/// Argument vector for a case. Arrays are used verbatim, absent text means no arguments,
/// anything else becomes a single argument.
pub fn parse_args(text: &str) -> Vec<serde_json::Value> {
    match parse_case_value(text) {
        None => Vec::new(),
        Some(serde_json::Value::Array(items)) => items,
        Some(single) => vec![single],
    }
}

/// Human-readable case label; `position` is 1-based.
pub fn case_name(position: usize, raw_args: &str) -> String {
    format!("Test {}: {}", position, raw_args.trim())
}

pub fn build_case(position: usize, raw: &RawCase) -> Case {
    Case {
        name: case_name(position, &raw.args),
        args: parse_args(&raw.args),
        expected: parse_case_value(&raw.expected),
    }
}

pub fn build_request(code: &str, raw_cases: &[RawCase]) -> RunRequest {
    RunRequest {
        code: code.to_string(),
        cases: raw_cases
            .iter()
            .enumerate()
            .map(|(i, raw)| build_case(i + 1, raw))
            .collect(),
    }
}

/// One completed dispatch as the host records it.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub request_id: u64,
    pub response: RunResponse,
    /// Ids of the submitted cases, aligned with `response` results.
    pub case_ids: Vec<Uuid>,
    pub summary: VerdictSummary,
    pub completed_at: String,
}

impl Verdict {
    pub fn status(&self) -> &'static str {
        self.summary.status(&self.response)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dispatch {
    pub request_id: u64,
    /// A newer dispatch was issued while this one was in flight.
    pub superseded: bool,
    pub verdict: Verdict,
}

/// Owns dispatching to the sandbox and which verdict is current.
pub struct HostController {
    worker: SandboxWorker,
    issued: AtomicU64,
    current: RwLock<Option<Verdict>>,
}

impl HostController {
    pub fn new(worker: SandboxWorker) -> Self {
        Self {
            worker,
            issued: AtomicU64::new(0),
            current: RwLock::new(None),
        }
    }

    /// Sends one request for the given program and cases. Never retries.
    pub async fn dispatch(&self, code: &str, raw_cases: &[RawCase]) -> Dispatch {
        let request_id = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let request = build_request(code, raw_cases);
        log::info!(
            "Dispatching run #{} with {} case(s) via {:?} isolation",
            request_id,
            request.cases.len(),
            self.worker.isolation()
        );

        let response = self.worker.execute(request).await;
        let summary = VerdictSummary::of(&response);
        let verdict = Verdict {
            request_id,
            response,
            case_ids: raw_cases.iter().map(|c| c.id).collect(),
            summary,
            completed_at: chrono::Utc::now().to_rfc3339(),
        };

        {
            let mut current = self.current.write().await;
            let newer_completed = current.as_ref().is_some_and(|v| v.request_id > request_id);
            if !newer_completed {
                *current = Some(verdict.clone());
            }
        }

        let superseded = self.issued.load(Ordering::SeqCst) > request_id;
        if superseded {
            log::debug!("Run #{} finished after a newer dispatch; not current", request_id);
        } else {
            log::info!(
                "Run #{} {}: {}/{} passed",
                request_id,
                verdict.status(),
                summary.passed,
                summary.total
            );
        }

        Dispatch {
            request_id,
            superseded,
            verdict,
        }
    }

    pub fn worker(&self) -> &SandboxWorker {
        &self.worker
    }

    /// The most recent verdict no newer dispatch has replaced.
    pub async fn current(&self) -> Option<Verdict> {
        self.current.read().await.clone()
    }
}
