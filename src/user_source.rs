use crate::storage::firestore::ensure_success;
use crate::types::{UserExport, UserRecord};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

pub const IDENTITY_TOOLKIT_HOST: &str = "https://identitytoolkit.googleapis.com";
const PAGE_SIZE: usize = 1000;

// ============================================================================
// UserSource trait
// ============================================================================

#[allow(async_fn_in_trait)]
pub trait UserSource: Send + Sync {
    /// All users to migrate, in the order they should be processed.
    async fn list_users(&self) -> Result<Vec<UserRecord>>;
}

// ============================================================================
// JsonFileSource — `firebase auth:export` file
// ============================================================================

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UserSource for JsonFileSource {
    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let load = async {
            let raw = tokio::fs::read_to_string(&self.path).await?;
            let export: UserExport = serde_json::from_str(&raw)?;
            anyhow::Ok(export.users)
        };
        let users = load
            .await
            .with_context(|| format!("Failed to load {}", self.path.display()))?;

        info!(path = %self.path.display(), users = users.len(), "Loaded user export");
        Ok(users)
    }
}

// ============================================================================
// AuthUserSource — Identity Toolkit accounts:batchGet
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
    next_page_token: Option<String>,
}

pub struct AuthUserSource {
    client: Client,
    base_url: String,
    project_id: String,
    bearer_token: String,
}

impl AuthUserSource {
    /// `base_url` is the API root that `/v1/projects/...` hangs off; for the
    /// emulator that is `http://{host}/identitytoolkit.googleapis.com`.
    pub fn new(client: Client, base_url: String, project_id: String, bearer_token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            bearer_token,
        }
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<BatchGetResponse> {
        let url = format!(
            "{}/v1/projects/{}/accounts:batchGet",
            self.base_url, self.project_id
        );
        let max_results = PAGE_SIZE.to_string();
        let mut query = vec![("maxResults", max_results.as_str())];
        if let Some(token) = page_token {
            query.push(("nextPageToken", token));
        }
        debug!(url = %url, page_token = ?page_token, "Listing auth users");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .context("Failed to list users from Firebase Auth")?;

        ensure_success(response)
            .await
            .context("Failed to list users from Firebase Auth")?
            .json()
            .await
            .context("Invalid accounts:batchGet response")
    }
}

impl UserSource for AuthUserSource {
    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let mut users = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;
            users.extend(page.users);

            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        info!(users = users.len(), "Found users in Firebase Auth");
        Ok(users)
    }
}
