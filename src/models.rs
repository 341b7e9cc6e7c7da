//! Data-transfer shapes mirrored from the backend's JSON, plus the
//! view-models the client derives from them.
//!
//! Nothing here enforces invariants the backend owns; the types exist so the
//! rest of the crate can work with named fields instead of raw JSON.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Which of the three answer strategies the backend chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    DirectAnswer,
    GuidedFallback,
    HardRefusal,
    /// A mode string this client does not know. Rendered as nothing.
    #[serde(other)]
    Unknown,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::DirectAnswer => "direct_answer",
            ResponseMode::GuidedFallback => "guided_fallback",
            ResponseMode::HardRefusal => "hard_refusal",
            ResponseMode::Unknown => "unknown",
        }
    }
}

/// A pointer into a source document attached to a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCitation {
    /// Stored path, e.g. `data/tenants/acme/docs/volvo.pdf`.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub page: Option<i64>,
    /// Distance score; lower is closer.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Side-channel data the backend attaches to a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_resources: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub conversation_id: String,
    pub tenant_id: String,
    pub debug: bool,
}

/// Response of `POST /query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub request_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub query: String,
    pub mode: ResponseMode,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<DocumentCitation>,
    #[serde(default)]
    pub artifacts: Artifacts,
    #[serde(default)]
    pub debug: Value,
}

/// One row of `GET /conversations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationListItem {
    pub conversation_id: String,
    pub created_at: String,
    pub last_activity_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationsListResponse {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub conversations: Vec<ConversationListItem>,
}

/// Persisted query result inside `GET /conversations/{id}`.
///
/// The structured fields arrive as serialized JSON strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetailItem {
    pub request_id: String,
    pub created_at: String,
    pub query: String,
    pub mode: ResponseMode,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub citations_json: Option<String>,
    #[serde(default)]
    pub artifacts_json: Option<String>,
    #[serde(default)]
    pub debug_json: Option<String>,
    #[serde(default)]
    pub response_json: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub tenant_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub items: Vec<ConversationDetailItem>,
}

/// A question and the response it got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: QueryResponse,
}

/// Conversation view-model. List endpoints leave `turns` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub created_at: String,
    pub last_activity_at: String,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
}

impl From<ConversationListItem> for Conversation {
    fn from(item: ConversationListItem) -> Self {
        Self {
            conversation_id: item.conversation_id,
            created_at: item.created_at,
            last_activity_at: item.last_activity_at,
            turns: Vec::new(),
        }
    }
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().filter(|s| !s.trim().is_empty())
}

impl ConversationDetail {
    /// Reshape the persisted rows into turns, parsing each item's embedded
    /// JSON strings.
    pub fn into_conversation(self) -> Result<Conversation, ApiError> {
        let ConversationDetail {
            tenant_id,
            conversation_id,
            items,
        } = self;

        let created_at = items
            .first()
            .map(|i| i.created_at.clone())
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        let last_activity_at = items
            .last()
            .map(|i| i.created_at.clone())
            .unwrap_or_else(|| created_at.clone());

        let mut turns = Vec::with_capacity(items.len());
        for item in items {
            let citations: Vec<DocumentCitation> = match non_empty(&item.citations_json) {
                Some(raw) => serde_json::from_str(raw).map_err(|source| ApiError::EmbeddedJson {
                    request_id: item.request_id.clone(),
                    field: "citations_json",
                    source,
                })?,
                None => Vec::new(),
            };
            let artifacts: Artifacts = match non_empty(&item.artifacts_json) {
                Some(raw) => serde_json::from_str(raw).map_err(|source| ApiError::EmbeddedJson {
                    request_id: item.request_id.clone(),
                    field: "artifacts_json",
                    source,
                })?,
                None => Artifacts::default(),
            };
            let debug: Value = match non_empty(&item.debug_json) {
                Some(raw) => serde_json::from_str(raw).map_err(|source| ApiError::EmbeddedJson {
                    request_id: item.request_id.clone(),
                    field: "debug_json",
                    source,
                })?,
                None => Value::Null,
            };

            turns.push(ConversationTurn {
                query: item.query.clone(),
                response: QueryResponse {
                    request_id: item.request_id,
                    created_at: item.created_at,
                    tenant_id: tenant_id.clone(),
                    conversation_id: conversation_id.clone(),
                    query: item.query,
                    mode: item.mode,
                    answer: item.answer,
                    citations,
                    artifacts,
                    debug,
                },
            });
        }

        Ok(Conversation {
            conversation_id,
            created_at,
            last_activity_at,
            turns,
        })
    }
}

/// One row of `GET /tenants/{id}/documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentListItem {
    pub filename: String,
    pub size_bytes: u64,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsListResponse {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub documents: Vec<DocumentListItem>,
}

/// Document view-model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub uploaded_at: String,
    pub size_bytes: u64,
    pub indexed: bool,
}

impl From<DocumentListItem> for Document {
    /// The list endpoint only returns documents that went through ingestion,
    /// so they are reported as indexed.
    fn from(item: DocumentListItem) -> Self {
        Self {
            filename: item.filename,
            uploaded_at: item.uploaded_at,
            size_bytes: item.size_bytes,
            indexed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub tenant_id: String,
    pub filename: String,
    #[serde(default)]
    pub stored_path: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingResponse {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub deleted: bool,
    pub filename: String,
    #[serde(default)]
    pub message: String,
}

/// Whether the current credentials let the user in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Unauthorized,
    Authenticated,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail_item(request_id: &str, created_at: &str) -> ConversationDetailItem {
        ConversationDetailItem {
            request_id: request_id.to_string(),
            created_at: created_at.to_string(),
            query: "What was Q4 revenue?".to_string(),
            mode: ResponseMode::DirectAnswer,
            answer: "$12.4M".to_string(),
            citations_json: Some(
                r#"[{"source":"data/tenants/acme/docs/q4.pdf","page":3,"score":0.21,"snippet":"revenue"}]"#
                    .to_string(),
            ),
            artifacts_json: Some(r#"{"best_score":0.21}"#.to_string()),
            debug_json: None,
            response_json: Some("{}".to_string()),
        }
    }

    #[test]
    fn test_unknown_mode_does_not_fail() {
        let resp: QueryResponse = serde_json::from_value(json!({
            "request_id": "r1",
            "mode": "something_new",
            "answer": "x"
        }))
        .unwrap();
        assert_eq!(resp.mode, ResponseMode::Unknown);
        assert!(resp.citations.is_empty());
        assert_eq!(resp.debug, Value::Null);
    }

    #[test]
    fn test_query_response_parses_backend_shape() {
        let resp: QueryResponse = serde_json::from_value(json!({
            "request_id": "4b1c",
            "created_at": "2026-01-26T10:00:00Z",
            "tenant_id": "acme",
            "conversation_id": "conv_1",
            "query": "warranty?",
            "mode": "guided_fallback",
            "answer": "Related information exists in ...",
            "citations": [{"source": "data/tenants/acme/docs/volvo.pdf", "page": 18, "score": 0.4, "snippet": "..."}],
            "artifacts": {"reason": "no_verbatim", "additional_resources": [], "best_score": 0.4, "extra_key": 1},
            "debug": null
        }))
        .unwrap();
        assert_eq!(resp.mode, ResponseMode::GuidedFallback);
        assert_eq!(resp.citations[0].page, Some(18));
        assert_eq!(resp.artifacts.reason.as_deref(), Some("no_verbatim"));
        assert_eq!(resp.artifacts.extra.get("extra_key"), Some(&json!(1)));
    }

    #[test]
    fn test_into_conversation_parses_embedded_json() {
        let detail = ConversationDetail {
            tenant_id: "acme".to_string(),
            conversation_id: "conv_1".to_string(),
            items: vec![
                detail_item("r1", "2026-01-01T10:00:00Z"),
                detail_item("r2", "2026-01-01T10:05:00Z"),
            ],
        };
        let conv = detail.into_conversation().unwrap();
        assert_eq!(conv.turns.len(), 2);
        assert_eq!(conv.created_at, "2026-01-01T10:00:00Z");
        assert_eq!(conv.last_activity_at, "2026-01-01T10:05:00Z");
        let first = &conv.turns[0].response;
        assert_eq!(first.tenant_id, "acme");
        assert_eq!(first.conversation_id, "conv_1");
        assert_eq!(first.citations[0].source, "data/tenants/acme/docs/q4.pdf");
        assert_eq!(first.artifacts.best_score, Some(0.21));
        assert_eq!(first.debug, Value::Null);
    }

    #[test]
    fn test_into_conversation_empty_strings_default() {
        let mut item = detail_item("r1", "2026-01-01T10:00:00Z");
        item.citations_json = Some(String::new());
        item.artifacts_json = None;
        item.debug_json = Some(r#"{"k":5}"#.to_string());
        let conv = ConversationDetail {
            tenant_id: "acme".to_string(),
            conversation_id: "c".to_string(),
            items: vec![item],
        }
        .into_conversation()
        .unwrap();
        let resp = &conv.turns[0].response;
        assert!(resp.citations.is_empty());
        assert_eq!(resp.artifacts, Artifacts::default());
        assert_eq!(resp.debug, json!({"k": 5}));
    }

    #[test]
    fn test_into_conversation_rejects_malformed_citations() {
        let mut item = detail_item("r9", "2026-01-01T10:00:00Z");
        item.citations_json = Some("[{not json".to_string());
        let err = ConversationDetail {
            tenant_id: "acme".to_string(),
            conversation_id: "c".to_string(),
            items: vec![item],
        }
        .into_conversation()
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("citations_json"));
        assert!(msg.contains("r9"));
    }

    #[test]
    fn test_into_conversation_without_items_uses_now() {
        let conv = ConversationDetail {
            tenant_id: "acme".to_string(),
            conversation_id: "c".to_string(),
            items: vec![],
        }
        .into_conversation()
        .unwrap();
        assert!(conv.turns.is_empty());
        assert!(!conv.created_at.is_empty());
        assert_eq!(conv.created_at, conv.last_activity_at);
    }

    #[test]
    fn test_list_item_becomes_indexed_document() {
        let doc: Document = DocumentListItem {
            filename: "a.pdf".to_string(),
            size_bytes: 10,
            uploaded_at: "2025-12-15T10:30:00Z".to_string(),
        }
        .into();
        assert!(doc.indexed);
    }
}
