//! Tenant-scoping edge proxy.
//!
//! Sits in front of the backend and turns the caller's bearer token into an
//! `x-tenant-id` header. Requests without a usable token are redirected to
//! `/login`; scoped requests are forwarded to `[edge].upstream` unchanged
//! apart from the added header.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/login` | Plain-text login notice |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/favicon.ico` | `204 No Content`, answered locally |
//! | any    | anything else | Scoped and forwarded upstream |
//!
//! # Token lookup
//!
//! The `Authorization` header wins; otherwise an `Authorization` cookie is
//! read. A client-supplied `x-tenant-id` is never trusted: it is replaced on
//! scoped requests and removed from the exempt ones. The value must be `Bearer <jwt>` whose payload carries a non-empty
//! `tenant_id`. Signatures are not checked here; the backend does that.
//!
//! With `dev_bypass = true` every request is scoped to [`DEV_TENANT`].

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use reqwest::Url;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::{Config, EdgeConfig};
use crate::error::TokenError;
use crate::token;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const DEV_TENANT: &str = "dev_tenant";
pub const LOGIN_PATH: &str = "/login";
pub const LOGIN_MESSAGE: &str = "Login required — Provide a valid JWT to continue.";

/// Paths served without a token.
const EXEMPT_PATHS: [&str; 3] = [LOGIN_PATH, "/health", "/favicon.ico"];

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
struct EdgeState {
    upstream: Url,
    http: reqwest::Client,
    dev_bypass: bool,
}

/// Starts the edge proxy on `[edge].bind` and serves until the process exits.
pub async fn run_edge(config: &Config) -> Result<()> {
    let app = router(&config.edge)?;
    let bind_addr = config.edge.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    println!("Edge proxy listening on http://{}", bind_addr);
    info!(
        bind = %bind_addr,
        upstream = %config.edge.upstream,
        dev_bypass = config.edge.dev_bypass,
        "edge proxy started"
    );
    if config.edge.dev_bypass {
        warn!("dev bypass is on: every request is scoped to {}", DEV_TENANT);
    }

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the edge router without binding, for embedding and tests.
pub fn router(edge: &EdgeConfig) -> Result<Router> {
    let upstream = Url::parse(&edge.upstream)
        .with_context(|| format!("Invalid edge upstream: {}", edge.upstream))?;
    let state = EdgeState {
        upstream,
        http: reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?,
        dev_bypass: edge.dev_bypass,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route(LOGIN_PATH, get(handle_login))
        .route("/health", get(handle_health))
        .route("/favicon.ico", get(handle_favicon))
        .fallback(handle_proxy)
        .layer(middleware::from_fn_with_state(state.clone(), scope_tenant))
        .layer(cors)
        .with_state(state))
}

// ============ Tenant scoping ============

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

/// The tenant a request is scoped to.
pub fn resolve_tenant(headers: &HeaderMap, dev_bypass: bool) -> Result<String, TokenError> {
    if dev_bypass {
        return Ok(DEV_TENANT.to_string());
    }
    let authorization = authorization_value(headers).ok_or(TokenError::NotBearer)?;
    token::tenant_from_authorization(&authorization)
}

/// `Authorization` header, falling back to an `Authorization` cookie.
fn authorization_value(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Some(value.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "Authorization")
        .map(|(_, value)| value.trim_matches('"').replace("%20", " "))
        .filter(|v| !v.is_empty())
}

async fn scope_tenant(State(state): State<EdgeState>, mut req: Request, next: Next) -> Response {
    if is_exempt(req.uri().path()) {
        req.headers_mut().remove(TENANT_HEADER);
        return next.run(req).await;
    }

    match resolve_tenant(req.headers(), state.dev_bypass) {
        Ok(tenant) => match HeaderValue::from_str(&tenant) {
            Ok(value) => {
                req.headers_mut()
                    .insert(HeaderName::from_static(TENANT_HEADER), value);
                next.run(req).await
            }
            Err(_) => {
                debug!(tenant = %tenant, "tenant is not a valid header value");
                Redirect::to(LOGIN_PATH).into_response()
            }
        },
        Err(e) => {
            debug!(path = %req.uri().path(), error = %e, "unscoped request redirected");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

// ============ GET /login, GET /health, GET /favicon.ico ============

async fn handle_login() -> &'static str {
    LOGIN_MESSAGE
}

async fn handle_favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Forwarding ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.into(),
        },
    };
    (status, Json(body)).into_response()
}

/// Join the upstream base with an incoming path and query.
pub fn upstream_url(upstream: &Url, path_and_query: &str) -> String {
    format!(
        "{}{}",
        upstream.as_str().trim_end_matches('/'),
        path_and_query
    )
}

async fn handle_proxy(State(state): State<EdgeState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "bad_request", e.to_string()),
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = upstream_url(&state.upstream, path_and_query);

    let mut builder = state.http.request(parts.method.clone(), &url).body(bytes);
    let forwarded = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        HeaderName::from_static(TENANT_HEADER),
    ];
    for name in forwarded {
        if let Some(value) = parts.headers.get(&name) {
            builder = builder.header(name, value.clone());
        }
    }

    let upstream = match builder.send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url = %url, error = %e, "upstream request failed");
            return error_response(
                StatusCode::BAD_GATEWAY,
                "upstream_unavailable",
                format!("upstream request failed: {}", e),
            );
        }
    };

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    debug!(method = %parts.method, url = %url, status = %status, "forwarded");

    let body = match upstream.bytes().await {
        Ok(b) => b,
        Err(e) => {
            warn!(url = %url, error = %e, "reading upstream body failed");
            return error_response(
                StatusCode::BAD_GATEWAY,
                "upstream_unavailable",
                format!("upstream body unreadable: {}", e),
            );
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Some(ct) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, ct);
    }
    response
}
