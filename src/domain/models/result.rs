//! Chaos result domain model and result-object decoding.
//!
//! Result reporting is the least reliable part of the framework surface:
//! result objects appear under non-deterministic names, sometimes late,
//! sometimes never. A [`ChaosResult`] therefore records which of the four
//! candidate sources actually produced it, and a run always resolves to
//! one, even when every observation fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one run. `Awaited` is an honest answer, not a defect: it
/// means the framework never reported a terminal verdict inside the wait
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail,
    Awaited,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::Awaited => "Awaited",
        }
    }

    /// Parse a verdict string as reported by the framework. Anything not
    /// recognizably terminal maps to `Awaited`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pass" | "passed" => Self::Pass,
            "fail" | "failed" => Self::Fail,
            _ => Self::Awaited,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which candidate source resolved the result, per the fixed precedence:
/// named result object, namespace-wide scan, engine status reconstruction,
/// diagnostic-only fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultSource {
    NamedResult,
    NamespaceScan,
    EngineStatus,
    DiagnosticOnly,
}

/// Resolved outcome of a run, with diagnostics accumulated along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosResult {
    pub verdict: Verdict,
    pub fail_step: Option<String>,
    pub probe_success_percentage: Option<String>,
    pub source: ResultSource,
    /// True when the run ended in the stuck condition: verdict `Awaited`
    /// with the engine still in its initial phase past the wait window.
    pub stuck: bool,
    pub diagnostics: Vec<String>,
}

impl ChaosResult {
    /// The diagnostic-only fallback: nothing was observable, which is an
    /// expected mode, not an error.
    pub fn diagnostic_only(diagnostics: Vec<String>) -> Self {
        Self {
            verdict: Verdict::Awaited,
            fail_step: None,
            probe_success_percentage: None,
            source: ResultSource::DiagnosticOnly,
            stuck: false,
            diagnostics,
        }
    }
}

/// Decoded view of a ChaosResult object from the control plane, failing
/// closed on payloads without an identity.
#[derive(Debug, Clone)]
pub enum ResultObservation {
    Result {
        name: String,
        verdict: Option<String>,
        fail_step: Option<String>,
        probe_success_percentage: Option<String>,
        created_at: Option<DateTime<Utc>>,
    },
    Unparseable {
        reason: String,
    },
}

impl ResultObservation {
    pub fn decode(value: &Value) -> Self {
        let Some(name) = value
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
        else {
            return Self::Unparseable {
                reason: "result payload has no metadata.name".to_string(),
            };
        };
        let created_at = value
            .get("metadata")
            .and_then(|m| m.get("creationTimestamp"))
            .and_then(Value::as_str)
            .and_then(|ts| ts.parse::<DateTime<Utc>>().ok());
        let exp_status = value.get("status").and_then(|s| s.get("experimentStatus"));
        let field = |key: &str| {
            exp_status
                .and_then(|e| e.get(key))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };
        Self::Result {
            name: name.to_string(),
            verdict: field("verdict"),
            fail_step: field("failStep"),
            probe_success_percentage: field("probeSuccessPercentage"),
            created_at,
        }
    }

    /// Convert into a [`ChaosResult`] when the payload parsed, recording
    /// the source that found it.
    pub fn into_result(self, source: ResultSource, diagnostics: Vec<String>) -> Option<ChaosResult> {
        match self {
            Self::Result {
                verdict,
                fail_step,
                probe_success_percentage,
                ..
            } => Some(ChaosResult {
                verdict: verdict.as_deref().map_or(Verdict::Awaited, Verdict::parse),
                fail_step: fail_step.filter(|s| !s.is_empty() && s != "N/A"),
                probe_success_percentage,
                source,
                stuck: false,
                diagnostics,
            }),
            Self::Unparseable { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_parse_is_honest() {
        assert_eq!(Verdict::parse("Pass"), Verdict::Pass);
        assert_eq!(Verdict::parse("failed"), Verdict::Fail);
        // Unknown and pending states stay Awaited; nothing fabricates Pass.
        assert_eq!(Verdict::parse("Running"), Verdict::Awaited);
        assert_eq!(Verdict::parse(""), Verdict::Awaited);
    }

    #[test]
    fn test_decode_result_object() {
        let value = json!({
            "metadata": {"name": "web-chaos-1-pod-delete"},
            "status": {"experimentStatus": {
                "verdict": "Pass",
                "failStep": "N/A",
                "probeSuccessPercentage": "100"
            }}
        });
        let result = ResultObservation::decode(&value)
            .into_result(ResultSource::NamedResult, vec![])
            .unwrap();
        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(result.fail_step, None, "N/A fail step is filtered");
        assert_eq!(result.probe_success_percentage.as_deref(), Some("100"));
        assert_eq!(result.source, ResultSource::NamedResult);
    }

    #[test]
    fn test_unparseable_result_yields_none() {
        let value = json!({"status": {}});
        assert!(ResultObservation::decode(&value)
            .into_result(ResultSource::NamespaceScan, vec![])
            .is_none());
    }

    #[test]
    fn test_diagnostic_only_is_awaited() {
        let result = ChaosResult::diagnostic_only(vec!["no result object found".to_string()]);
        assert_eq!(result.verdict, Verdict::Awaited);
        assert_eq!(result.source, ResultSource::DiagnosticOnly);
        assert!(!result.stuck);
    }
}
