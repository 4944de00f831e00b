//! Packaging tool adapters: chart install and overlay build.
//!
//! Both shell out to the standard CLIs and hand structured output back to
//! the deployer. They are deliberately thin; classification and apply
//! logic live in the deployer service.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::domain::errors::HavocError;
use crate::domain::ports::{ChartInstaller, OverlayBuilder};

async fn run_tool(mut cmd: Command, what: &str) -> Result<String, HavocError> {
    let output = cmd
        .output()
        .await
        .map_err(|err| HavocError::Deployment(format!("failed to spawn {what}: {err}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HavocError::Deployment(format!(
            "{what} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Installs packaged charts with the helm CLI.
pub struct HelmCli;

#[async_trait]
impl ChartInstaller for HelmCli {
    async fn install(
        &self,
        name: &str,
        path: &Path,
        namespace: &str,
    ) -> Result<String, HavocError> {
        info!(release = name, chart = %path.display(), namespace, "installing chart");
        let mut cmd = Command::new("helm");
        cmd.arg("upgrade")
            .arg("--install")
            .arg(name)
            .arg(path)
            .arg("--namespace")
            .arg(namespace)
            .arg("--create-namespace")
            .arg("--wait")
            .arg("--timeout")
            .arg("120s");
        run_tool(cmd, "helm").await
    }
}

/// Renders kustomize overlays to a resource stream.
pub struct KustomizeCli;

#[async_trait]
impl OverlayBuilder for KustomizeCli {
    async fn build(&self, path: &Path) -> Result<String, HavocError> {
        info!(overlay = %path.display(), "rendering kustomize overlay");
        let mut cmd = Command::new("kubectl");
        cmd.arg("kustomize").arg(path);
        run_tool(cmd, "kubectl kustomize").await
    }
}
