//! Idempotent Gitea repo/file operations (§4.D).
//!
//! File path is always `{hostname}.txt` on branch `main`; content is
//! base64-encoded in the request body per the Gitea v1 contents API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::domain::NetBackupError;

/// A thin async client over a Gitea v1 REST base URL.
pub struct GiteaClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    org: String,
}

impl GiteaClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, org: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("netbackup-orchestrator/0.1.0")
            .build()
            .expect("failed to build Gitea HTTP client");
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            org: org.into(),
        }
    }

    fn auth_header(&self) -> String {
        format!("token {}", self.token)
    }

    /// Ensure `{org}/{repo_name}` exists, creating the org and repo as
    /// needed. Returns the `"{org}/{repo_name}"` identifier.
    #[instrument(skip(self), fields(repo = %repo_name))]
    pub async fn ensure_repo(
        &self,
        site_code: &str,
        repo_name: &str,
    ) -> Result<String, NetBackupError> {
        let repo = format!("{}/{repo_name}", self.org);

        let check = self
            .http
            .get(format!("{}/api/v1/repos/{repo}", self.base_url))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| NetBackupError::Transport(e.to_string()))?;

        if check.status().is_success() {
            return Ok(repo);
        }

        let org_check = self
            .http
            .get(format!("{}/api/v1/orgs/{}", self.base_url, self.org))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| NetBackupError::Transport(e.to_string()))?;

        if !org_check.status().is_success() {
            let create_org = self
                .http
                .post(format!("{}/api/v1/admin/orgs", self.base_url))
                .header("Authorization", self.auth_header())
                .json(&json!({ "username": self.org }))
                .send()
                .await
                .map_err(|e| NetBackupError::Transport(e.to_string()))?;
            if !create_org.status().is_success() {
                warn!(status = %create_org.status(), org = %self.org, "org creation best-effort failed");
            }
        }

        let create_repo = self
            .http
            .post(format!("{}/api/v1/orgs/{}/repos", self.base_url, self.org))
            .header("Authorization", self.auth_header())
            .json(&json!({
                "name": repo_name,
                "private": true,
                "auto_init": true,
                "default_branch": "main",
                "description": format!("Config backups — site {site_code}"),
            }))
            .send()
            .await
            .map_err(|e| NetBackupError::Transport(e.to_string()))?;

        if !create_repo.status().is_success() {
            return Err(NetBackupError::Protocol(format!(
                "gitea repo creation failed: {}",
                create_repo.status()
            )));
        }

        info!(%repo, "ensured gitea repository");
        Ok(repo)
    }

    /// Write `{hostname}.txt` on `main`, reusing the existing blob SHA if
    /// present so identical content is a no-op commit. Returns the
    /// resulting commit SHA.
    #[instrument(skip(self, text, message), fields(repo = %repo))]
    pub async fn commit_config(
        &self,
        repo: &str,
        hostname: &str,
        text: &str,
        message: &str,
    ) -> Result<String, NetBackupError> {
        let path = format!("{hostname}.txt");
        let contents_url = format!("{}/api/v1/repos/{repo}/contents/{path}", self.base_url);

        let existing_sha = self.existing_file_sha(&contents_url).await?;

        let mut body = json!({
            "content": STANDARD.encode(text),
            "message": message,
            "branch": "main",
        });
        if let Some(sha) = existing_sha {
            body["sha"] = Value::String(sha);
        }

        let response = self
            .http
            .put(&contents_url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| NetBackupError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NetBackupError::Protocol(format!(
                "gitea commit failed: {}",
                response.status()
            )));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| NetBackupError::Protocol(e.to_string()))?;

        parsed["commit"]["sha"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                NetBackupError::Protocol("gitea response missing commit.sha".to_string())
            })
    }

    async fn existing_file_sha(&self, contents_url: &str) -> Result<Option<String>, NetBackupError> {
        let response = self
            .http
            .get(contents_url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| NetBackupError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| NetBackupError::Protocol(e.to_string()))?;
        Ok(parsed["sha"].as_str().map(str::to_string))
    }

    /// Render the unified diff for `{hostname}.txt`'s last two commits, or
    /// a human-readable message when history is insufficient.
    #[instrument(skip(self), fields(repo = %repo))]
    pub async fn get_diff(&self, repo: &str, hostname: &str) -> Result<String, NetBackupError> {
        let path = format!("{hostname}.txt");
        let commits_url = format!(
            "{}/api/v1/repos/{repo}/commits?path={path}&limit=2",
            self.base_url
        );

        let response = self
            .http
            .get(&commits_url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| NetBackupError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NetBackupError::Protocol(format!(
                "gitea commit history fetch failed: {}",
                response.status()
            )));
        }

        let commits: Vec<Value> = response
            .json()
            .await
            .map_err(|e| NetBackupError::Protocol(e.to_string()))?;

        if commits.len() < 2 {
            return Ok("Insufficient commit history to compute a diff.".to_string());
        }

        let latest_sha = commits[0]["sha"].as_str().unwrap_or_default();
        let prev_sha = commits[1]["sha"].as_str().unwrap_or_default();

        let compare_url = format!(
            "{}/api/v1/repos/{repo}/compare/{prev_sha}...{latest_sha}",
            self.base_url
        );
        let response = self
            .http
            .get(&compare_url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| NetBackupError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NetBackupError::Protocol(format!(
                "gitea compare fetch failed: {}",
                response.status()
            )));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| NetBackupError::Protocol(e.to_string()))?;

        let files = parsed["files"].as_array().cloned().unwrap_or_default();
        let patch = files
            .iter()
            .find(|f| {
                f["filename"]
                    .as_str()
                    .map(|name| name.contains(hostname))
                    .unwrap_or(false)
            })
            .and_then(|f| f["patch"].as_str());

        match patch {
            Some(p) if !p.is_empty() => Ok(p.to_string()),
            _ => Ok("No differences found.".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_header_uses_gitea_token_scheme() {
        let client = GiteaClient::new("https://gitea.example.com", "tok123", "agncf");
        assert_eq!(client.auth_header(), "token tok123");
    }
}
