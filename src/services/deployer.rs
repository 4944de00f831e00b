//! Manifest Deployer: classifies a repository's deployment mechanism,
//! orders and applies its resources, and reports the outcome.
//!
//! Per-file failures never abort a deploy; the report carries partial
//! success. A repository with nothing deployable gets the bundled minimal
//! fallback workload so the rest of the pipeline always has a target.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::errors::{ClusterError, HavocError};
use crate::domain::models::manifest::{self, split_manifests};
use crate::domain::models::plan::{DeployReport, DeploymentPlan};
use crate::domain::models::target::TargetWorkload;
use crate::domain::ports::{ChartInstaller, ClusterClient, OverlayBuilder};
use crate::infrastructure::kube::resources::{
    fallback_deployment, fallback_service, namespace, to_manifest, FALLBACK_LABEL, FALLBACK_NAME,
};

/// How deep classification digs into the repository tree.
const MAX_SCAN_DEPTH: usize = 3;

/// Cluster-scoped kinds that must not have a namespace defaulted in.
const CLUSTER_SCOPED: &[&str] = &[
    "Namespace",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "PersistentVolume",
    "StorageClass",
    "PodSecurityPolicy",
];

/// Detected deployment mechanism for a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStrategy {
    /// Packaged chart rooted at this directory.
    Chart(PathBuf),
    /// Overlay composition rooted at this directory.
    Overlay(PathBuf),
    /// Plain resource files, applied directly.
    PlainFiles(Vec<PathBuf>),
    /// Nothing deployable found.
    None,
}

pub struct ManifestDeployer {
    cluster: Arc<dyn ClusterClient>,
    charts: Arc<dyn ChartInstaller>,
    overlays: Arc<dyn OverlayBuilder>,
    namespace: String,
}

impl ManifestDeployer {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        charts: Arc<dyn ChartInstaller>,
        overlays: Arc<dyn OverlayBuilder>,
        namespace: String,
    ) -> Self {
        Self {
            cluster,
            charts,
            overlays,
            namespace,
        }
    }

    pub fn target_namespace(&self) -> &str {
        &self.namespace
    }

    /// Classify the repository: chart beats overlay beats plain files.
    pub fn classify(repo_dir: &Path) -> DeployStrategy {
        if let Some(dir) = find_marker(repo_dir, "Chart.yaml", 0) {
            return DeployStrategy::Chart(dir);
        }
        if let Some(dir) = find_marker(repo_dir, "kustomization.yaml", 0)
            .or_else(|| find_marker(repo_dir, "kustomization.yml", 0))
        {
            return DeployStrategy::Overlay(dir);
        }
        let mut files = Vec::new();
        collect_yaml_files(repo_dir, 0, &mut files);
        files.sort();
        if files.is_empty() {
            DeployStrategy::None
        } else {
            DeployStrategy::PlainFiles(files)
        }
    }

    /// Deploy the repository, reporting per-resource outcomes.
    pub async fn deploy(&self, repo_dir: &Path, parallel: bool) -> Result<DeployReport, HavocError> {
        self.ensure_namespace().await?;

        match Self::classify(repo_dir) {
            DeployStrategy::Chart(dir) => self.deploy_chart(&dir).await,
            DeployStrategy::Overlay(dir) => self.deploy_overlay(&dir).await,
            DeployStrategy::PlainFiles(files) => self.deploy_plain(&files, parallel).await,
            DeployStrategy::None => {
                warn!(repo = %repo_dir.display(), "no deployable files, applying fallback workload");
                let (_, report) = self.deploy_fallback().await?;
                Ok(report)
            }
        }
    }

    /// Apply the bundled minimal fallback workload (2 replicas + service)
    /// and return it as a target.
    pub async fn deploy_fallback(&self) -> Result<(TargetWorkload, DeployReport), HavocError> {
        self.ensure_namespace().await?;
        let mut report = DeployReport {
            total: 2,
            ..DeployReport::default()
        };
        report
            .warnings
            .push(format!("no deployable manifests; applied fallback workload {FALLBACK_NAME}"));

        for built in [
            to_manifest(&fallback_deployment(&self.namespace)),
            to_manifest(&fallback_service(&self.namespace)),
        ] {
            let manifest = built.map_err(HavocError::Cluster)?;
            match self.cluster.apply(&manifest).await {
                Ok(()) => report.applied += 1,
                Err(err) => report.errors.push(format!("fallback: {err}")),
            }
        }
        if report.applied == 0 {
            return Err(HavocError::Deployment(
                "fallback workload could not be applied".to_string(),
            ));
        }

        let (k, v) = FALLBACK_LABEL;
        let target = TargetWorkload {
            name: FALLBACK_NAME.to_string(),
            namespace: self.namespace.clone(),
            selector: std::collections::BTreeMap::from([(k.to_string(), v.to_string())]),
        };
        Ok((target, report))
    }

    async fn deploy_chart(&self, dir: &Path) -> Result<DeployReport, HavocError> {
        let release = dir
            .file_name()
            .map_or_else(|| "app".to_string(), |n| n.to_string_lossy().to_lowercase());
        let log = self.charts.install(&release, dir, &self.namespace).await?;
        info!(release, "chart installed");
        Ok(DeployReport {
            applied: 1,
            total: 1,
            errors: Vec::new(),
            warnings: log
                .lines()
                .filter(|l| l.to_lowercase().contains("warning"))
                .map(ToString::to_string)
                .collect(),
        })
    }

    async fn deploy_overlay(&self, dir: &Path) -> Result<DeployReport, HavocError> {
        let rendered = self.overlays.build(dir).await?;
        let (docs, parse_errors) = split_manifests(&rendered);
        let plan = DeploymentPlan::build(
            docs.into_iter()
                .enumerate()
                .map(|(idx, doc)| (dir.to_path_buf(), idx, doc))
                .collect(),
        );
        let mut report = self.apply_plan(plan, false).await;
        report.warnings.extend(parse_errors);
        Ok(report)
    }

    async fn deploy_plain(
        &self,
        files: &[PathBuf],
        parallel: bool,
    ) -> Result<DeployReport, HavocError> {
        let mut docs = Vec::new();
        let mut read_errors = Vec::new();
        for path in files {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    let (parsed, parse_errors) = split_manifests(&text);
                    for err in parse_errors {
                        read_errors.push(format!("{}: {err}", path.display()));
                    }
                    docs.extend(
                        parsed
                            .into_iter()
                            .enumerate()
                            .map(|(idx, doc)| (path.clone(), idx, doc)),
                    );
                }
                Err(err) => read_errors.push(format!("{}: {err}", path.display())),
            }
        }

        let plan = DeploymentPlan::build(docs);
        if plan.is_empty() {
            warn!("yaml files present but none deployable, applying fallback workload");
            let (_, mut report) = self.deploy_fallback().await?;
            report.warnings.extend(read_errors);
            return Ok(report);
        }

        let mut report = self.apply_plan(plan, parallel).await;
        report.warnings.extend(read_errors);
        Ok(report)
    }

    /// Apply a plan. Strict-order mode walks the rank order one resource
    /// at a time; parallel mode applies everything concurrently and joins,
    /// which is safe precisely because the files declared no ordering.
    async fn apply_plan(&self, plan: DeploymentPlan, parallel: bool) -> DeployReport {
        let items = plan.into_items();
        let mut report = DeployReport {
            total: items.len(),
            ..DeployReport::default()
        };

        if parallel {
            let applies = items.into_iter().map(|item| async move {
                let outcome = self.apply_one(item.manifest.clone()).await;
                (item, outcome)
            });
            for (item, outcome) in join_all(applies).await {
                match outcome {
                    Ok(()) => report.applied += 1,
                    Err(err) => report.errors.push(format!(
                        "{} {} ({}): {err}",
                        item.kind,
                        item.name,
                        item.path.display()
                    )),
                }
            }
        } else {
            for item in items {
                match self.apply_one(item.manifest.clone()).await {
                    Ok(()) => report.applied += 1,
                    Err(err) => report.errors.push(format!(
                        "{} {} ({}): {err}",
                        item.kind,
                        item.name,
                        item.path.display()
                    )),
                }
            }
        }

        info!(
            applied = report.applied,
            total = report.total,
            failed = report.errors.len(),
            "deploy pass finished"
        );
        report
    }

    async fn apply_one(&self, mut doc: Value) -> Result<(), ClusterError> {
        let cluster_scoped = manifest::kind_of(&doc)
            .is_some_and(|kind| CLUSTER_SCOPED.contains(&kind));
        if !cluster_scoped {
            manifest::default_namespace(&mut doc, &self.namespace);
        }
        self.cluster.apply(&doc).await
    }

    async fn ensure_namespace(&self) -> Result<(), HavocError> {
        if self.namespace == "default" {
            return Ok(());
        }
        let ns = to_manifest(&namespace(&self.namespace)).map_err(HavocError::Cluster)?;
        self.cluster
            .apply(&ns)
            .await
            .map_err(|err| HavocError::Deployment(format!("namespace {}: {err}", self.namespace)))
    }
}

fn find_marker(dir: &Path, marker: &str, depth: usize) -> Option<PathBuf> {
    if depth > MAX_SCAN_DEPTH {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if path.is_file() && name == marker {
            return Some(dir.to_path_buf());
        }
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    subdirs.sort();
    for sub in subdirs {
        if let Some(found) = find_marker(&sub, marker, depth + 1) {
            return Some(found);
        }
    }
    None
}

fn collect_yaml_files(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            collect_yaml_files(&path, depth + 1, out);
        } else if name.ends_with(".yaml") || name.ends_with(".yml") {
            out.push(path);
        }
    }
}
