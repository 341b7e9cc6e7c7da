//! The seam between the client and the question-answering service.
//!
//! [`Backend`] is implemented by [`crate::client::ApiClient`] (real HTTP) and
//! [`crate::mock::MockBackend`] (in-memory demo data). The state-wiring layer
//! in [`crate::app`] only ever talks to this trait.

use async_trait::async_trait;
use std::path::Path;

use crate::error::ApiError;
use crate::models::{
    Conversation, DeleteResponse, Document, IndexingResponse, QueryResponse, UploadResponse,
};

/// The operations the client needs from the service.
///
/// Tenant scoping is a property of the implementation (token + tenant id),
/// not a per-call argument.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A short label for logs and `p1 whoami`.
    fn name(&self) -> &str;

    /// The tenant this backend scopes document calls to.
    fn tenant_id(&self) -> &str;

    /// `POST /query`.
    async fn submit_query(
        &self,
        query: &str,
        conversation_id: &str,
        debug: bool,
    ) -> Result<QueryResponse, ApiError>;

    /// `POST /query`, returning the raw status and body untouched.
    async fn submit_query_raw(
        &self,
        query: &str,
        conversation_id: &str,
        debug: bool,
    ) -> Result<(u16, String), ApiError> {
        let resp = self.submit_query(query, conversation_id, debug).await?;
        let body = serde_json::to_string(&resp).map_err(|e| ApiError::Decode {
            endpoint: "/query".to_string(),
            message: e.to_string(),
        })?;
        Ok((200, body))
    }

    /// `GET /conversations`. Turns are left empty.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// `GET /conversations/{id}`, reshaped into turns.
    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ApiError>;

    /// `GET /tenants/{tenant}/documents`.
    async fn list_documents(&self) -> Result<Vec<Document>, ApiError>;

    /// `POST /tenants/{tenant}/documents` with the file as multipart field `file`.
    async fn upload_document(&self, path: &Path) -> Result<UploadResponse, ApiError>;

    /// `POST /tenants/{tenant}/documents/index`.
    async fn trigger_indexing(&self) -> Result<IndexingResponse, ApiError>;

    /// `DELETE /tenants/{tenant}/documents/{filename}`.
    async fn delete_document(&self, filename: &str) -> Result<DeleteResponse, ApiError>;

    /// `GET /health`.
    async fn health(&self) -> Result<serde_json::Value, ApiError>;
}
