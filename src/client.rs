//! HTTP client for the question-answering service.
//!
//! Every request carries `Authorization: Bearer <token>` when a token is
//! configured. Non-2xx responses become [`ApiError::Status`] with the body
//! kept verbatim, so the caller can log exactly what the service said.
//!
//! # Endpoints
//!
//! | Method | Path | Backend op |
//! |--------|------|------------|
//! | `POST` | `/query` | [`Backend::submit_query`] |
//! | `GET` | `/conversations` | [`Backend::list_conversations`] |
//! | `GET` | `/conversations/{id}` | [`Backend::get_conversation`] |
//! | `GET` | `/tenants/{tenant}/documents` | [`Backend::list_documents`] |
//! | `POST` | `/tenants/{tenant}/documents` | [`Backend::upload_document`] |
//! | `POST` | `/tenants/{tenant}/documents/index` | [`Backend::trigger_indexing`] |
//! | `DELETE` | `/tenants/{tenant}/documents/{filename}` | [`Backend::delete_document`] |
//! | `GET` | `/health` | [`Backend::health`] |

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::backend::Backend;
use crate::config::{ApiConfig, DEFAULT_TENANT_ID};
use crate::error::ApiError;
use crate::models::{
    Conversation, ConversationDetail, ConversationsListResponse, DeleteResponse, Document,
    DocumentsListResponse, IndexingResponse, QueryRequest, QueryResponse, UploadResponse,
};
use crate::token;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    tenant_id: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid api.base_url: {}", config.base_url))?;

        Ok(Self {
            http,
            base_url,
            token: config.bearer_token().map(str::to_string),
            tenant_id: resolve_tenant(config),
        })
    }

    /// Base URL joined with percent-encoded path segments.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<(reqwest::StatusCode, String, String), ApiError> {
        let resp = builder.send().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let status = resp.status();
        let url = resp.url().to_string();
        debug!(%url, %status, "api response");
        let body = resp.text().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok((status, url, body))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let (status, url, body) = self.execute(endpoint, builder).await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                body,
                url,
                endpoint: endpoint.to_string(),
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    fn query_builder(&self, query: &str, conversation_id: &str, debug: bool) -> RequestBuilder {
        let url = self.url(&["query"]);
        debug!(%url, conversation_id, "submitting query");
        self.request(Method::POST, url).json(&QueryRequest {
            query: query.to_string(),
            conversation_id: conversation_id.to_string(),
            tenant_id: self.tenant_id.clone(),
            debug,
        })
    }
}

/// Tenant for document paths and query bodies: explicit config, then the
/// token's claim, then the service default.
pub fn resolve_tenant(config: &ApiConfig) -> String {
    if let Some(tenant) = config.tenant_id.as_deref().filter(|t| !t.is_empty()) {
        return tenant.to_string();
    }
    config
        .bearer_token()
        .and_then(|t| token::decode_claims(t).ok())
        .and_then(|claims| token::tenant_claim(&claims).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_TENANT_ID.to_string())
}

#[async_trait]
impl Backend for ApiClient {
    fn name(&self) -> &str {
        self.base_url.as_str()
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    async fn submit_query(
        &self,
        query: &str,
        conversation_id: &str,
        debug: bool,
    ) -> Result<QueryResponse, ApiError> {
        let builder = self.query_builder(query, conversation_id, debug);
        self.call("/query", builder).await
    }

    async fn submit_query_raw(
        &self,
        query: &str,
        conversation_id: &str,
        debug: bool,
    ) -> Result<(u16, String), ApiError> {
        let builder = self.query_builder(query, conversation_id, debug);
        let (status, _, body) = self.execute("/query", builder).await?;
        Ok((status.as_u16(), body))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let url = self.url(&["conversations"]);
        let resp: ConversationsListResponse = self
            .call("/conversations", self.request(Method::GET, url))
            .await?;
        Ok(resp.conversations.into_iter().map(Conversation::from).collect())
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ApiError> {
        let endpoint = format!("/conversations/{}", conversation_id);
        let url = self.url(&["conversations", conversation_id]);
        let detail: ConversationDetail = self
            .call(&endpoint, self.request(Method::GET, url))
            .await?;
        detail.into_conversation()
    }

    async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        let endpoint = format!("/tenants/{}/documents", self.tenant_id);
        let url = self.url(&["tenants", self.tenant_id.as_str(), "documents"]);
        let resp: DocumentsListResponse = self
            .call(&endpoint, self.request(Method::GET, url))
            .await?;
        Ok(resp.documents.into_iter().map(Document::from).collect())
    }

    async fn upload_document(&self, path: &Path) -> Result<UploadResponse, ApiError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                ApiError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file: {}", path.display()),
                ))
            })?;
        let bytes = tokio::fs::read(path).await?;
        debug!(file = %filename, size = bytes.len(), "uploading document");

        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);
        let form = reqwest::multipart::Form::new().part("file", part);

        let endpoint = format!("/tenants/{}/documents", self.tenant_id);
        let url = self.url(&["tenants", self.tenant_id.as_str(), "documents"]);
        self.call(&endpoint, self.request(Method::POST, url).multipart(form))
            .await
    }

    async fn trigger_indexing(&self) -> Result<IndexingResponse, ApiError> {
        let endpoint = format!("/tenants/{}/documents/index", self.tenant_id);
        let url = self.url(&["tenants", self.tenant_id.as_str(), "documents", "index"]);
        self.call(&endpoint, self.request(Method::POST, url)).await
    }

    async fn delete_document(&self, filename: &str) -> Result<DeleteResponse, ApiError> {
        let endpoint = format!("/tenants/{}/documents/{}", self.tenant_id, filename);
        let url = self.url(&["tenants", self.tenant_id.as_str(), "documents", filename]);
        self.call(&endpoint, self.request(Method::DELETE, url)).await
    }

    async fn health(&self) -> Result<serde_json::Value, ApiError> {
        let url = self.url(&["health"]);
        self.call("/health", self.request(Method::GET, url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_url_encodes_segments() {
        let client = ApiClient::new(&config("http://localhost:8000")).unwrap();
        let url = client.url(&["tenants", "acme", "documents", "Q4 report/v2.pdf"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/tenants/acme/documents/Q4%20report%2Fv2.pdf"
        );
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        let client = ApiClient::new(&config("https://p1.example.com/api/")).unwrap();
        assert_eq!(
            client.url(&["query"]).as_str(),
            "https://p1.example.com/api/query"
        );
    }

    #[test]
    fn test_resolve_tenant_precedence() {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"tenant_id":"from_token"}"#);
        let mut cfg = config("http://localhost:8000");
        assert_eq!(resolve_tenant(&cfg), "acme");

        cfg.token = Some(format!("Bearer h.{}.s", payload));
        assert_eq!(resolve_tenant(&cfg), "from_token");

        cfg.tenant_id = Some("explicit".to_string());
        assert_eq!(resolve_tenant(&cfg), "explicit");
    }
}
