//! # P1 Client
//!
//! A terminal client and edge proxy for a multi-tenant, document-grounded
//! question-answering service.
//!
//! The service answers questions from a tenant's uploaded documents in one of
//! three modes (direct answer, guided fallback, hard refusal) and keeps the
//! history of each conversation. This crate talks to it over HTTP, renders
//! its answers in the terminal, keeps local session state, and can run a
//! small proxy that scopes browser requests to the tenant in their token.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────────┐
//! │  CLI (p1)    │──▶│     App     │──▶│     Backend      │
//! │ render/toast │   │   session   │   │ ApiClient | Mock │
//! └──────────────┘   └─────────────┘   └────────┬─────────┘
//!                                               │ HTTP
//!                      ┌──────────────┐         ▼
//!   browser ──────────▶│  Edge proxy  │──▶  QA service
//!                      │ x-tenant-id  │
//!                      └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! p1 --offline ask "What was Q4 revenue?"   # demo data, no backend
//! p1 docs upload ./report.pdf
//! p1 docs index
//! p1 conversations list
//! p1 chat                                    # interactive loop
//! p1 serve edge                              # tenant-scoping proxy
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Wire types and their normalized forms |
//! | [`error`] | API and token error types |
//! | [`backend`] | The `Backend` trait |
//! | [`client`] | HTTP implementation of `Backend` |
//! | [`mock`] | In-memory implementation of `Backend` |
//! | [`token`] | JWT payload inspection and dev-token minting |
//! | [`settings`] | Preference toggles |
//! | [`session`] | Persisted session state |
//! | [`app`] | Client state and operations |
//! | [`toast`] | Success/error notifications |
//! | [`render`] | Terminal rendering |
//! | [`edge`] | Tenant-scoping HTTP proxy |
//! | [`logging`] | `tracing` subscriber setup |

pub mod app;
pub mod backend;
pub mod client;
pub mod config;
pub mod edge;
pub mod error;
pub mod logging;
pub mod mock;
pub mod models;
pub mod render;
pub mod session;
pub mod settings;
pub mod toast;
pub mod token;
