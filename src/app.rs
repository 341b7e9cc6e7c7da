//! Client state and the operations that change it.
//!
//! [`App`] is what the CLI commands and the interactive `chat` loop drive.
//! It owns the loaded document and conversation lists, the selected
//! conversation, the last response, and the persisted [`Session`]. Failures
//! are handled the same way everywhere: log, toast, leave the state usable
//! so the user can retry. Operations take `&mut self`, so only one request
//! is ever in flight.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::backend::Backend;
use crate::models::{Conversation, Document, QueryResponse, UploadResponse};
use crate::session::Session;
use crate::settings::{Settings, SettingsPatch};
use crate::toast::{Toast, ToastSink, Toaster};

/// Query text the service treats as "forget the previous topic".
pub const RESET_QUERY: &str = "new topic";

/// What the main panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Query,
    Conversation,
}

pub struct App {
    backend: Arc<dyn Backend>,
    session: Session,
    toaster: Toaster,
    documents: Vec<Document>,
    conversations: Vec<Conversation>,
    selected: Option<Conversation>,
    current_response: Option<QueryResponse>,
    submitted_query: Option<String>,
    view: View,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, session: Session, sink: ToastSink) -> Self {
        let toaster = Toaster::new(session.state.settings.enable_notifications, sink);
        Self {
            backend,
            session,
            toaster,
            documents: Vec::new(),
            conversations: Vec::new(),
            selected: None,
            current_response: None,
            submitted_query: None,
            view: View::Query,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.session.state.settings
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Detail of the selected conversation, if it loaded.
    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.selected.as_ref()
    }

    pub fn selected_conversation_id(&self) -> Option<&str> {
        self.session.state.selected_conversation_id.as_deref()
    }

    pub fn current_response(&self) -> Option<&QueryResponse> {
        self.current_response.as_ref()
    }

    pub fn submitted_query(&self) -> Option<&str> {
        self.submitted_query.as_deref()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn toasts(&self) -> &[Toast] {
        self.toaster.history()
    }

    pub fn save_session(&self) -> Result<()> {
        self.session.save()
    }

    // ---------------- Lists ----------------

    /// Fetch the document list. Failures leave it empty.
    pub async fn load_documents(&mut self) -> &[Document] {
        match self.backend.list_documents().await {
            Ok(docs) => self.documents = docs,
            Err(e) => {
                error!(error = %e, "listing documents failed");
                self.toaster.error("Failed to load documents");
                self.documents.clear();
            }
        }
        &self.documents
    }

    /// Fetch the conversation list. Failures leave it empty.
    pub async fn load_conversations(&mut self) -> &[Conversation] {
        match self.backend.list_conversations().await {
            Ok(convs) => self.conversations = convs,
            Err(e) => {
                error!(error = %e, "listing conversations failed");
                self.toaster.error("Failed to load conversations");
                self.conversations.clear();
            }
        }
        &self.conversations
    }

    // ---------------- Query ----------------

    /// Ask a question.
    ///
    /// Blank queries are ignored and return `Ok(None)`. Without an explicit
    /// conversation the session's current one is continued, or a new one is
    /// started. On success the response's conversation becomes the selected
    /// one and the conversation list is refreshed.
    pub async fn submit_query(
        &mut self,
        query: &str,
        conversation_id: Option<&str>,
        debug: bool,
    ) -> Result<Option<QueryResponse>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let conv_id = self.session.conversation_for_query(conversation_id);
        debug!(conversation_id = %conv_id, "submitting query");

        let response = match self.backend.submit_query(query, &conv_id, debug).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "query failed");
                self.toaster.error("Failed to process query");
                return Err(e).context("Failed to process query");
            }
        };

        self.submitted_query = Some(query.to_string());
        self.current_response = Some(response.clone());

        let selected_id = if response.conversation_id.is_empty() {
            conv_id
        } else {
            response.conversation_id.clone()
        };
        self.session.state.selected_conversation_id = Some(selected_id.clone());
        self.view = View::Conversation;

        // The answer is already in hand; a failed detail fetch only loses history.
        self.selected = match self.backend.get_conversation(&selected_id).await {
            Ok(conv) => Some(conv),
            Err(e) => {
                warn!(error = %e, conversation_id = %selected_id, "conversation detail unavailable");
                None
            }
        };

        self.load_conversations().await;
        Ok(Some(response))
    }

    /// Submit a query and return the service's status and body untouched.
    ///
    /// Conversation pinning works as in [`App::submit_query`]; nothing else
    /// in the state changes.
    pub async fn submit_query_raw(
        &mut self,
        query: &str,
        conversation_id: Option<&str>,
        debug: bool,
    ) -> Result<(u16, String)> {
        let conv_id = self.session.conversation_for_query(conversation_id);
        self.backend
            .submit_query_raw(query.trim(), &conv_id, debug)
            .await
            .context("Failed to process query")
    }

    /// Tell the service to drop the current topic, keeping the conversation.
    pub async fn reset_topic(&mut self, conversation_id: Option<&str>) -> Result<Option<QueryResponse>> {
        self.submit_query(RESET_QUERY, conversation_id, false).await
    }

    // ---------------- Conversations ----------------

    /// Forget the current conversation so the next query starts a new one.
    pub fn new_conversation(&mut self) {
        self.session.reset_conversation();
        self.session.state.selected_conversation_id = None;
        self.selected = None;
        self.current_response = None;
        self.submitted_query = None;
        self.view = View::Query;
        self.toaster.success("Started new conversation");
    }

    /// Select a conversation and load its turns.
    pub async fn select_conversation(&mut self, conversation_id: &str) -> Option<&Conversation> {
        self.session.state.selected_conversation_id = Some(conversation_id.to_string());
        self.view = View::Conversation;

        match self.backend.get_conversation(conversation_id).await {
            Ok(conv) => self.selected = Some(conv),
            Err(e) => {
                error!(error = %e, conversation_id, "loading conversation failed");
                self.toaster.error("Failed to load conversation details");
                self.selected = None;
            }
        }
        self.selected.as_ref()
    }

    pub fn close_conversation(&mut self) {
        self.session.state.selected_conversation_id = None;
        self.selected = None;
        self.view = View::Query;
    }

    // ---------------- Documents ----------------

    /// Upload a file, refresh the list, and index it if `auto_index_documents` is on.
    pub async fn upload_document(&mut self, path: &Path) -> Result<UploadResponse> {
        let resp = match self.backend.upload_document(path).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, file = %path.display(), "upload failed");
                self.toaster.error("Failed to upload document");
                return Err(e).with_context(|| format!("Failed to upload {}", path.display()));
            }
        };
        self.toaster
            .success(format!("Document \"{}\" uploaded successfully", resp.filename));
        self.load_documents().await;

        if self.settings().auto_index_documents {
            self.trigger_indexing().await?;
        }
        Ok(resp)
    }

    /// Ask the service to index the tenant's pending documents.
    pub async fn trigger_indexing(&mut self) -> Result<()> {
        match self.backend.trigger_indexing().await {
            Ok(resp) => {
                let message = if resp.message.is_empty() {
                    "Indexing triggered".to_string()
                } else {
                    resp.message
                };
                self.toaster.success(message);
                self.load_documents().await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "indexing failed");
                self.toaster.error("Failed to trigger indexing");
                Err(e).context("Failed to trigger indexing")
            }
        }
    }

    /// Delete a document from the loaded list.
    ///
    /// Returns `Ok(false)` without calling the service when the file is not
    /// in the list or the user declines the confirmation.
    pub async fn delete_document(
        &mut self,
        filename: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Result<bool> {
        let Some(doc) = self.documents.iter().find(|d| d.filename == filename) else {
            debug!(filename, "delete requested for unknown document");
            return Ok(false);
        };

        if self.settings().confirm_before_delete {
            let prompt = format!("Delete \"{}\"? This action cannot be undone.", doc.filename);
            if !confirm(&prompt) {
                return Ok(false);
            }
        }

        match self.backend.delete_document(filename).await {
            Ok(_) => {
                self.toaster.success("Document deleted");
                self.load_documents().await;
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, filename, "delete failed");
                self.toaster.error("Failed to delete document");
                Err(e).with_context(|| format!("Failed to delete {}", filename))
            }
        }
    }

    // ---------------- Settings ----------------

    pub fn update_settings(&mut self, patch: SettingsPatch) {
        self.session.state.settings.apply(patch);
        self.toaster
            .set_enabled(self.session.state.settings.enable_notifications);
    }

    pub fn reset_settings(&mut self, defaults: Settings) {
        self.session.state.settings = defaults;
        self.toaster.set_enabled(defaults.enable_notifications);
    }

    pub fn share(&mut self) {
        self.toaster.success("Share link copied to clipboard");
    }
}
