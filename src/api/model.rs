//! Wire types for the HTTP surface. Field names follow the JSON
//! convention the endpoint has always spoken (camelCase).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::application::pipeline::{ChaosRunReport, ChaosRunRequest};
use crate::domain::errors::HavocError;
use crate::domain::models::result::ResultSource;

/// Body of `POST /chaos-test`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosTestRequest {
    pub github_url: String,
    pub chaos_type: Option<String>,
    /// Chaos window in seconds.
    pub duration: Option<u64>,
    pub target_namespace: Option<String>,
    pub target_deployment: Option<String>,
    #[serde(default)]
    pub deploy_parallel: bool,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub auto_recover: Option<bool>,
}

impl From<ChaosTestRequest> for ChaosRunRequest {
    fn from(req: ChaosTestRequest) -> Self {
        Self {
            repo_url: req.github_url,
            chaos_type: req.chaos_type,
            duration_secs: req.duration,
            target_namespace: req.target_namespace,
            target_deployment: req.target_deployment,
            deploy_parallel: req.deploy_parallel,
            params: req.params,
            auto_recover: req.auto_recover,
        }
    }
}

/// Body of the `POST /chaos-test` response, success or failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosTestResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_step: Option<String>,
    /// Coarse run state: "completed", "awaiting-result", or "stuck".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ChaosTestResponse {
    pub fn from_report(report: &ChaosRunReport) -> Self {
        let status = if report.result.stuck {
            "stuck"
        } else if report.result.source == ResultSource::DiagnosticOnly {
            "awaiting-result"
        } else {
            "completed"
        };
        Self {
            success: report.success(),
            run_id: Some(report.run_id.to_string()),
            verdict: Some(report.result.verdict.to_string()),
            fail_step: report.result.fail_step.clone(),
            experiment_status: Some(status.to_string()),
            error: None,
            result: serde_json::to_value(report).ok(),
        }
    }

    /// Failed runs carry the pipeline stage as `failStep` so callers can
    /// tell "nothing was attacked" from "attack ran, reporting incomplete".
    pub fn from_error(err: &HavocError) -> Self {
        Self {
            success: false,
            run_id: None,
            verdict: None,
            fail_step: Some(err.stage().as_str().to_string()),
            experiment_status: None,
            error: Some(err.to_string()),
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_decodes_camel_case() {
        let body = serde_json::json!({
            "githubUrl": "https://github.com/acme/shop",
            "chaosType": "pod-delete",
            "duration": 30,
            "targetNamespace": "shop",
            "deployParallel": true
        });
        let req: ChaosTestRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.github_url, "https://github.com/acme/shop");
        assert_eq!(req.chaos_type.as_deref(), Some("pod-delete"));
        assert!(req.deploy_parallel);
        assert!(req.auto_recover.is_none(), "defaults come from config");
    }

    #[test]
    fn test_error_response_carries_stage() {
        let err = HavocError::RepoClone("timed out".into());
        let resp = ChaosTestResponse::from_error(&err);
        assert!(!resp.success);
        assert_eq!(resp.fail_step.as_deref(), Some("repository-cloning"));
        assert!(resp.verdict.is_none());
    }
}
