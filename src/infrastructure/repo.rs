//! Repository acquisition: a thin git shell-out.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::domain::errors::HavocError;
use crate::domain::ports::RepoFetcher;

/// Shallow-clones a repository under a scratch directory.
pub struct GitFetcher {
    workdir: PathBuf,
}

impl GitFetcher {
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }

    fn checkout_dir(&self, url: &str) -> PathBuf {
        let slug: String = url
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or("repo")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        let stamp = chrono::Utc::now().timestamp_millis();
        self.workdir.join(format!("{slug}-{stamp}"))
    }
}

#[async_trait]
impl RepoFetcher for GitFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf, HavocError> {
        if !url.starts_with("https://") && !url.starts_with("http://") && !url.starts_with("git@") {
            return Err(HavocError::RepoClone(format!(
                "unsupported repository url: {url}"
            )));
        }

        tokio::fs::create_dir_all(&self.workdir)
            .await
            .map_err(|err| HavocError::RepoClone(format!("scratch dir: {err}")))?;

        let dest = self.checkout_dir(url);
        info!(url, dest = %dest.display(), "cloning repository");

        let output = Command::new("git")
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg(url)
            .arg(&dest)
            .output()
            .await
            .map_err(|err| HavocError::RepoClone(format!("failed to spawn git: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HavocError::RepoClone(format!(
                "git clone exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_git_url() {
        let fetcher = GitFetcher::new(std::env::temp_dir());
        let err = fetcher.fetch("ftp://example.com/repo").await.unwrap_err();
        assert!(matches!(err, HavocError::RepoClone(_)));
    }

    #[test]
    fn test_checkout_dir_is_timestamped_slug() {
        let fetcher = GitFetcher::new(PathBuf::from("/tmp/havoc"));
        let dir = fetcher.checkout_dir("https://github.com/acme/shop-app.git");
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("shop-app-"));
    }
}
