use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use url::Url;

use super::{
    access_token::AccessTokenProvider,
    service_account::ServiceAccountKey,
    values::{Document, Value},
};

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

/// How the service authenticates against Firestore.
#[derive(Debug, Clone)]
pub enum FirestoreCredentials {
    ServiceAccount(ServiceAccountKey),
    /// Local emulator at `host:port`; no credentials.
    Emulator { host: String },
}

/// Write precondition, evaluated atomically by Firestore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Exists(bool),
    /// RFC3339 `updateTime` the document must still have.
    UpdateTime(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOutcome {
    Applied(Document),
    PreconditionFailed,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorEnvelope {
    error: FirestoreErrorDetails,
}

#[derive(Debug, Deserialize)]
struct FirestoreErrorDetails {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryResponse {
    #[serde(default)]
    document: Option<Document>,
}

struct FirestoreApiError {
    status: Option<String>,
}

/// Minimal Firestore REST v1 client built on reqwest.
pub struct FirestoreClient {
    http: reqwest::Client,
    documents_url: Url,
    tokens: AccessTokenProvider,
}

pub fn establish_connection(
    project_id: &str,
    credentials: FirestoreCredentials,
) -> Result<FirestoreClient> {
    let http = reqwest::Client::new();

    match credentials {
        FirestoreCredentials::ServiceAccount(key) => {
            info!(
                %project_id,
                client_email = %key.client_email,
                "firestore: using service account credentials"
            );
            FirestoreClient::new(
                FIRESTORE_BASE_URL,
                project_id,
                AccessTokenProvider::service_account(http, key),
            )
        }
        FirestoreCredentials::Emulator { host } => {
            info!(%project_id, %host, "firestore: using emulator");
            FirestoreClient::new(
                &format!("http://{host}"),
                project_id,
                AccessTokenProvider::emulator(http),
            )
        }
    }
}

impl FirestoreClient {
    pub fn new(base_url: &str, project_id: &str, tokens: AccessTokenProvider) -> Result<Self> {
        let documents_url = Url::parse(&format!(
            "{}/v1/projects/{}/databases/(default)/documents",
            base_url.trim_end_matches('/'),
            project_id
        ))
        .with_context(|| format!("invalid firestore base url `{base_url}`"))?;

        // Shares the token provider's connection pool.
        Ok(Self {
            http: tokens.http().clone(),
            documents_url,
            tokens,
        })
    }

    fn document_url(&self, collection: &str, document_id: &str) -> Result<Url> {
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("firestore documents url cannot be a base"))?
            .push(collection)
            .push(document_id);
        Ok(url)
    }

    async fn read_api_error(resp: reqwest::Response, context: &str) -> FirestoreApiError {
        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (error_code, error_status, error_message) =
            match serde_json::from_str::<FirestoreErrorEnvelope>(&body) {
                Ok(envelope) => (
                    envelope.error.code,
                    envelope.error.status,
                    envelope.error.message,
                ),
                Err(_) => (None, None, None),
            };

        error!(
            status = %status,
            firestore_error_code = ?error_code,
            firestore_error_status = ?error_status,
            firestore_error_message = ?error_message,
            context = %context,
            "firestore api request failed"
        );

        FirestoreApiError {
            status: error_status,
        }
    }

    /// Returns `None` when the document does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<Document>> {
        let url = self.document_url(collection, document_id)?;
        let token = self.tokens.bearer_token().await?;

        let resp = self.http.get(url).bearer_auth(token).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            Self::read_api_error(resp, "get document").await;
            anyhow::bail!("Firestore get document failed: {collection}/{document_id} (status {status})");
        }

        let document: Document = resp.json().await?;
        Ok(Some(document))
    }

    /// Writes only the given fields (merge), creating the document if needed.
    pub async fn patch_document(
        &self,
        collection: &str,
        document_id: &str,
        fields: HashMap<String, Value>,
        precondition: Option<Precondition>,
    ) -> Result<PatchOutcome> {
        let mut url = self.document_url(collection, document_id)?;
        {
            let mut query = url.query_pairs_mut();
            let mut field_paths: Vec<&String> = fields.keys().collect();
            field_paths.sort();
            for field_path in field_paths {
                query.append_pair("updateMask.fieldPaths", field_path);
            }
            match &precondition {
                Some(Precondition::Exists(exists)) => {
                    query.append_pair("currentDocument.exists", &exists.to_string());
                }
                Some(Precondition::UpdateTime(update_time)) => {
                    query.append_pair("currentDocument.updateTime", update_time);
                }
                None => {}
            }
        }

        let token = self.tokens.bearer_token().await?;
        let resp = self
            .http
            .patch(url)
            .bearer_auth(token)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let api_error = Self::read_api_error(resp, "patch document").await;
            let precondition_failed = matches!(
                api_error.status.as_deref(),
                Some("FAILED_PRECONDITION" | "ALREADY_EXISTS" | "NOT_FOUND")
            );
            if precondition.is_some() && precondition_failed {
                return Ok(PatchOutcome::PreconditionFailed);
            }
            anyhow::bail!("Firestore patch document failed: {collection}/{document_id} (status {status})");
        }

        let document: Document = resp.json().await?;
        Ok(PatchOutcome::Applied(document))
    }

    /// First document in `collection` whose `field_path` equals `value`.
    pub async fn find_first_by_field(
        &self,
        collection: &str,
        field_path: &str,
        value: Value,
    ) -> Result<Option<Document>> {
        let url = format!("{}:runQuery", self.documents_url);
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field_path },
                        "op": "EQUAL",
                        "value": value,
                    }
                },
                "limit": 1,
            }
        });

        let token = self.tokens.bearer_token().await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            Self::read_api_error(resp, "run query").await;
            anyhow::bail!("Firestore query failed: {collection}.{field_path} (status {status})");
        }

        let results: Vec<RunQueryResponse> = resp.json().await?;
        Ok(results.into_iter().find_map(|result| result.document))
    }
}
