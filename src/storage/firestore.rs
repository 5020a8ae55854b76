use super::{Document, Fields, Storage};
use anyhow::{Context, Result, bail};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::debug;

pub const FIRESTORE_HOST: &str = "https://firestore.googleapis.com";
/// The emulators accept this token as an admin credential.
pub const EMULATOR_TOKEN: &str = "owner";

const UPDATE_MASK_PARAM: &str = "updateMask.fieldPaths";
const EXISTS_PRECONDITION_PARAM: &str = "currentDocument.exists";

// ============================================================================
// FirestoreStorage — Firestore REST v1 implementation
// ============================================================================

pub struct FirestoreStorage {
    client: Client,
    documents_url: String,
    bearer_token: Option<String>,
}

#[derive(Serialize)]
struct WriteBody<'a> {
    fields: &'a Fields,
}

impl FirestoreStorage {
    /// `documents_url` is the `.../databases/{db}/documents` root, see [`documents_url`].
    pub fn new(client: Client, documents_url: String, bearer_token: Option<String>) -> Self {
        Self {
            client,
            documents_url: documents_url.trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_url,
            collection.trim_matches('/'),
            urlencoding::encode(id)
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn patch(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        query: &[(&str, &str)],
    ) -> Result<()> {
        let url = self.document_url(collection, id);
        debug!(url = %url, params = ?query, "PATCH document");

        let response = self
            .request(Method::PATCH, &url)
            .query(query)
            .json(&WriteBody { fields })
            .send()
            .await
            .with_context(|| format!("Failed to write document {}/{}", collection, id))?;

        ensure_success(response).await?;
        Ok(())
    }
}

pub fn documents_url(host: &str, project_id: &str, database: &str) -> String {
    format!(
        "{}/v1/projects/{}/databases/{}/documents",
        host.trim_end_matches('/'),
        project_id,
        database
    )
}

fn mask_params<'a>(mask: &[&'a str]) -> Vec<(&'static str, &'a str)> {
    mask.iter().map(|path| (UPDATE_MASK_PARAM, *path)).collect()
}

/// Turn a non-2xx response into an error carrying `"{status} - {body}"`.
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("{} - {}", status.as_u16(), body.trim())
}

impl Storage for FirestoreStorage {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = self.document_url(collection, id);
        debug!(url = %url, "GET document");

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .with_context(|| format!("Failed to read document {}/{}", collection, id))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc = ensure_success(response)
            .await?
            .json::<Document>()
            .await
            .with_context(|| format!("Invalid document body for {}/{}", collection, id))?;
        Ok(Some(doc))
    }

    async fn set_document(&self, collection: &str, id: &str, fields: &Fields) -> Result<()> {
        self.patch(collection, id, fields, &[]).await
    }

    async fn merge_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        mask: &[&str],
    ) -> Result<()> {
        self.patch(collection, id, fields, &mask_params(mask)).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        mask: &[&str],
    ) -> Result<()> {
        let mut query = mask_params(mask);
        query.push((EXISTS_PRECONDITION_PARAM, "true"));
        self.patch(collection, id, fields, &query).await
    }
}

// ============================================================================
// Tests — against a local mock server
// ============================================================================
