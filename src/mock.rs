//! In-memory stand-in for the service, used by `--offline` and tests.
//!
//! Responses are keyword-driven so each of the three modes can be shown
//! without a backend: `revenue`/`sales` gets a direct answer, `employee`/
//! `headcount` a guided fallback, `future`/`predict` (and anything else) a
//! hard refusal. Unlike a fixture, the state is live: queries append turns,
//! uploads and deletes change the document table.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::backend::Backend;
use crate::error::ApiError;
use crate::models::{
    Artifacts, Conversation, ConversationTurn, DeleteResponse, Document, DocumentCitation,
    IndexingResponse, QueryResponse, ResponseMode, UploadResponse,
};

#[derive(Default)]
struct MockState {
    conversations: Vec<Conversation>,
    documents: Vec<Document>,
    /// Every call, in order, as `"METHOD /path"`.
    calls: Vec<String>,
}

pub struct MockBackend {
    tenant_id: String,
    state: Mutex<MockState>,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl MockBackend {
    /// A backend seeded with the demo conversations and documents.
    pub fn seeded(tenant_id: &str) -> Self {
        let backend = Self::empty(tenant_id);
        {
            let mut state = backend.lock();
            state.conversations = seed_conversations(tenant_id);
            state.documents = seed_documents();
        }
        backend
    }

    /// A backend with no conversations or documents.
    pub fn empty(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Calls received so far, e.g. `["GET /conversations", "POST /query"]`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: String) -> MutexGuard<'_, MockState> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }

    fn source_path(&self, filename: &str) -> String {
        format!("data/tenants/{}/docs/{}", self.tenant_id, filename)
    }

    fn answer(&self, query: &str, conversation_id: &str, debug: bool) -> QueryResponse {
        let q = query.to_lowercase();
        let (mode, answer, citations, reason) = if q.contains("revenue") || q.contains("sales") {
            (
                ResponseMode::DirectAnswer,
                "Based on the Q4 2024 Financial Report, total revenue was $12.4M, representing a \
                 23% increase year-over-year. Sales were driven primarily by enterprise contracts \
                 in North America."
                    .to_string(),
                vec![
                    DocumentCitation {
                        source: self.source_path("Q4-2024-Financial-Report.pdf"),
                        page: Some(3),
                        score: Some(0.18),
                        snippet: Some("Total revenue for Q4 2024 was $12.4M".to_string()),
                    },
                    DocumentCitation {
                        source: self.source_path("Q4-2024-Financial-Report.pdf"),
                        page: Some(7),
                        score: Some(0.27),
                        snippet: Some("Enterprise contracts in North America".to_string()),
                    },
                ],
                None,
            )
        } else if q.contains("employee") || q.contains("headcount") {
            (
                ResponseMode::GuidedFallback,
                "No exact answer found. Related information exists in: \"HR-Policy-2024.pdf\" \
                 (pages 12-15) regarding organizational structure, and \"Annual-Report-2024.pdf\" \
                 (page 28) regarding workforce metrics. Consider refining your query to target \
                 specific aspects."
                    .to_string(),
                vec![DocumentCitation {
                    source: self.source_path("Annual-Report-2024.pdf"),
                    page: Some(28),
                    score: Some(0.52),
                    snippet: Some("Workforce metrics".to_string()),
                }],
                Some("no_verbatim_answer"),
            )
        } else if q.contains("future") || q.contains("predict") {
            (
                ResponseMode::HardRefusal,
                "Query requests predictive or speculative information. System only answers \
                 questions with explicit answers in uploaded documents. No documents contain \
                 future projections or predictions."
                    .to_string(),
                Vec::new(),
                Some("speculative"),
            )
        } else {
            (
                ResponseMode::HardRefusal,
                "No relevant information found in indexed documents. The query cannot be \
                 answered from available tenant documents."
                    .to_string(),
                Vec::new(),
                Some("no_relevant_chunks"),
            )
        };

        let artifacts = best_score_artifacts(&citations, reason);
        QueryResponse {
            request_id: uuid::Uuid::new_v4().to_string(),
            created_at: now_iso(),
            tenant_id: self.tenant_id.clone(),
            conversation_id: conversation_id.to_string(),
            query: query.to_string(),
            mode,
            answer,
            citations,
            artifacts,
            debug: if debug {
                json!({ "backend": "mock" })
            } else {
                Value::Null
            },
        }
    }
}

fn best_score_artifacts(citations: &[DocumentCitation], reason: Option<&str>) -> Artifacts {
    Artifacts {
        reason: reason.map(str::to_string),
        best_score: citations
            .iter()
            .filter_map(|c| c.score)
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.min(s)))),
        ..Artifacts::default()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
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
        let response = self.answer(query, conversation_id, debug);
        let mut state = self.record("POST /query".to_string());

        let turn = ConversationTurn {
            query: query.to_string(),
            response: response.clone(),
        };
        match state
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == conversation_id)
        {
            Some(conv) => {
                conv.last_activity_at = response.created_at.clone();
                conv.turns.push(turn);
            }
            None => state.conversations.push(Conversation {
                conversation_id: conversation_id.to_string(),
                created_at: response.created_at.clone(),
                last_activity_at: response.created_at.clone(),
                turns: vec![turn],
            }),
        }
        Ok(response)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let state = self.record("GET /conversations".to_string());
        let mut list: Vec<Conversation> = state
            .conversations
            .iter()
            .map(|c| Conversation {
                turns: Vec::new(),
                ..c.clone()
            })
            .collect();
        list.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(list)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ApiError> {
        let state = self.record(format!("GET /conversations/{}", conversation_id));
        state
            .conversations
            .iter()
            .find(|c| c.conversation_id == conversation_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))
    }

    async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        let state = self.record(format!("GET /tenants/{}/documents", self.tenant_id));
        Ok(state.documents.clone())
    }

    async fn upload_document(&self, path: &Path) -> Result<UploadResponse, ApiError> {
        let endpoint = format!("/tenants/{}/documents", self.tenant_id);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size_bytes = tokio::fs::metadata(path).await?.len();

        let mut state = self.record(format!("POST {}", endpoint));
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(ApiError::Status {
                status: StatusCode::BAD_REQUEST,
                body: r#"{"detail":"Only PDF files are supported."}"#.to_string(),
                url: format!("mock://{}", endpoint),
                endpoint,
            });
        }

        state.documents.retain(|d| d.filename != filename);
        state.documents.push(Document {
            filename: filename.clone(),
            uploaded_at: now_iso(),
            size_bytes,
            indexed: false,
        });

        Ok(UploadResponse {
            tenant_id: self.tenant_id.clone(),
            stored_path: self.source_path(&filename),
            filename,
            indexed: false,
            message: "Document uploaded".to_string(),
        })
    }

    async fn trigger_indexing(&self) -> Result<IndexingResponse, ApiError> {
        let mut state = self.record(format!("POST /tenants/{}/documents/index", self.tenant_id));
        let pending = state.documents.iter().filter(|d| !d.indexed).count();
        for doc in state.documents.iter_mut() {
            doc.indexed = true;
        }
        Ok(IndexingResponse {
            tenant_id: self.tenant_id.clone(),
            indexed: true,
            message: format!("Indexed {} pending document(s)", pending),
        })
    }

    async fn delete_document(&self, filename: &str) -> Result<DeleteResponse, ApiError> {
        let mut state = self.record(format!(
            "DELETE /tenants/{}/documents/{}",
            self.tenant_id, filename
        ));
        let before = state.documents.len();
        state.documents.retain(|d| d.filename != filename);
        if state.documents.len() == before {
            return Err(ApiError::NotFound(format!("Document not found: {}", filename)));
        }
        Ok(DeleteResponse {
            tenant_id: self.tenant_id.clone(),
            deleted: true,
            filename: filename.to_string(),
            message: "Document deleted".to_string(),
        })
    }

    async fn health(&self) -> Result<Value, ApiError> {
        self.record("GET /health".to_string());
        Ok(json!({ "status": "ok", "backend": "mock" }))
    }
}

fn seed_turn(
    tenant_id: &str,
    conversation_id: &str,
    request_id: &str,
    at: &str,
    query: &str,
    mode: ResponseMode,
    answer: &str,
    citations: Vec<DocumentCitation>,
) -> ConversationTurn {
    ConversationTurn {
        query: query.to_string(),
        response: QueryResponse {
            request_id: request_id.to_string(),
            created_at: at.to_string(),
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation_id.to_string(),
            query: query.to_string(),
            mode,
            answer: answer.to_string(),
            citations,
            artifacts: Artifacts::default(),
            debug: Value::Null,
        },
    }
}

fn seed_conversations(tenant_id: &str) -> Vec<Conversation> {
    vec![
        Conversation {
            conversation_id: "conv_001".to_string(),
            created_at: "2025-12-30T14:23:00Z".to_string(),
            last_activity_at: "2025-12-30T14:23:15Z".to_string(),
            turns: vec![seed_turn(
                tenant_id,
                "conv_001",
                "query_001",
                "2025-12-30T14:23:15Z",
                "What was the total revenue in Q4 2024?",
                ResponseMode::DirectAnswer,
                "Based on the Q4 2024 Financial Report, total revenue was $12.4M.",
                vec![DocumentCitation {
                    source: format!("data/tenants/{}/docs/Q4-2024-Financial-Report.pdf", tenant_id),
                    page: Some(3),
                    score: Some(0.18),
                    snippet: None,
                }],
            )],
        },
        Conversation {
            conversation_id: "conv_002".to_string(),
            created_at: "2025-12-29T09:15:00Z".to_string(),
            last_activity_at: "2025-12-29T09:15:10Z".to_string(),
            turns: vec![seed_turn(
                tenant_id,
                "conv_002",
                "query_002",
                "2025-12-29T09:15:10Z",
                "What is our hiring plan for next year?",
                ResponseMode::HardRefusal,
                "Query requests future planning information. No documents contain explicit \
                 hiring plans for future periods.",
                Vec::new(),
            )],
        },
        Conversation {
            conversation_id: "conv_003".to_string(),
            created_at: "2025-12-28T16:42:00Z".to_string(),
            last_activity_at: "2025-12-28T16:42:12Z".to_string(),
            turns: vec![seed_turn(
                tenant_id,
                "conv_003",
                "query_003",
                "2025-12-28T16:42:12Z",
                "How many employees do we have?",
                ResponseMode::GuidedFallback,
                "No exact answer found. Related information exists in: \"Annual-Report-2024.pdf\" \
                 (page 28) regarding workforce metrics.",
                Vec::new(),
            )],
        },
    ]
}

fn seed_documents() -> Vec<Document> {
    let doc = |filename: &str, uploaded_at: &str, size_bytes: u64, indexed: bool| Document {
        filename: filename.to_string(),
        uploaded_at: uploaded_at.to_string(),
        size_bytes,
        indexed,
    };
    vec![
        doc("Q4-2024-Financial-Report.pdf", "2025-12-15T10:30:00Z", 2_457_600, true),
        doc("HR-Policy-2024.pdf", "2025-12-20T14:20:00Z", 1_048_576, true),
        doc("Product-Roadmap-Draft.pdf", "2025-12-30T08:15:00Z", 524_288, false),
        doc("Annual-Report-2024.pdf", "2025-12-10T09:00:00Z", 5_242_880, true),
    ]
}
