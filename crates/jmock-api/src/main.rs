//! jmock-api: HTTP server for the jmock issue tracker
//!
//! Serves the routes of the mock tracker: ticket creation through the
//! `CreateIssueDetails` form URL, lookup by key, and JQL-style search on
//! the correlation token embedded in descriptions.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use jmock_core::{
    Allocator, Config, Error, NewTicket, Resolver, StorageBackend, Ticket, TicketStore,
    Workspace, open_store,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
struct AppState {
    allocator: Allocator,
    resolver: Resolver,
    /// Upper bound for a single storage read
    timeout: Duration,
}

impl AppState {
    fn new(store: Arc<dyn TicketStore>, timeout: Duration) -> Self {
        Self {
            allocator: Allocator::new(store.clone()),
            resolver: Resolver::new(store),
            timeout,
        }
    }

    /// Run a blocking store call off the async workers, bounded by `timeout`
    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> jmock_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map_err(ApiError),
            Ok(Err(e)) => Err(ApiError(Error::Storage(format!("storage task failed: {}", e)))),
            Err(_) => Err(ApiError(Error::Storage(format!(
                "storage call timed out after {:?}",
                self.timeout
            )))),
        }
    }

    /// Run a blocking store write off the async workers and wait for its outcome
    ///
    /// Writes are not cut short here: an abandoned task would still commit.
    /// The store bounds its own lock waits and rolls back on expiry.
    async fn blocking_write<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> jmock_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::task::spawn_blocking(f).await {
            Ok(result) => result.map_err(ApiError),
            Err(e) => Err(ApiError(Error::Storage(format!("storage task failed: {}", e)))),
        }
    }
}

/// Query parameters of the create form URL
#[derive(Debug, Deserialize)]
struct CreateQuery {
    #[serde(default)]
    pid: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// JSON body for ticket creation
#[derive(Debug, Deserialize)]
struct CreateTicketRequest {
    project_id: String,
    summary: String,
    description: String,
}

/// Query parameters for search
#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    jql: Option<String>,
}

/// API response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Ticket as rendered to clients
#[derive(Debug, Serialize)]
struct TicketView {
    #[serde(flatten)]
    ticket: Ticket,
    /// Correlation URL taken from the end of the description
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    /// Description without the correlation URL
    text: String,
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        let url = ticket.correlation_token().map(str::to_string);
        let text = ticket.description_text();
        Self { ticket, url, text }
    }
}

fn views(tickets: Vec<Ticket>) -> Vec<TicketView> {
    tickets.into_iter().map(TicketView::from).collect()
}

/// Core error rendered as an HTTP response
#[derive(Debug)]
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        }
        (status, Json(ApiResponse::err(self.0.to_string()))).into_response()
    }
}

/// Take the search token from a JQL expression
///
/// Only the text after the last `~` counts (`description ~ "abc"` -> `abc`).
fn jql_token(jql: &str) -> Option<&str> {
    let token = jql.rsplit('~').next()?.trim().trim_matches('"').trim();
    (!token.is_empty()).then_some(token)
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Route overview
async fn readme() -> impl IntoResponse {
    Json(ApiResponse::ok(serde_json::json!({
        "routes": {
            "GET /": "all tickets, newest first",
            "GET /issues/{key}": "ticket by key, e.g. /issues/dd-1",
            "GET /issues/?jql=description~<token>": "tickets whose description contains <token>",
            "GET /secure/CreateIssueDetails!init.jspa?pid=&summary=&description=": "create a ticket",
            "POST /issues": "create a ticket from JSON {project_id, summary, description}",
            "GET /projects": "per-project ticket counters",
        }
    })))
}

/// List all tickets
async fn list_tickets(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let resolver = state.resolver.clone();
    let tickets = state.blocking(move || resolver.recent()).await?;
    Ok(Json(ApiResponse::ok(views(tickets))))
}

/// Search tickets by the token in a JQL query
async fn search_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let token = query
        .jql
        .as_deref()
        .and_then(jql_token)
        .ok_or_else(|| Error::InvalidInput("jql query with a search token is required".into()))?
        .to_string();

    let resolver = state.resolver.clone();
    let lookup = token.clone();
    let tickets = state
        .blocking(move || resolver.resolve_by_token(&lookup))
        .await?;

    if tickets.is_empty() {
        return Err(Error::NotFound(format!("no ticket mentions {}", token)).into());
    }
    Ok(Json(ApiResponse::ok(views(tickets))))
}

/// Get a single ticket by key
async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resolver = state.resolver.clone();
    let lookup = key.clone();
    match state
        .blocking(move || resolver.resolve_by_key(&lookup))
        .await?
    {
        Some(ticket) => Ok(Json(ApiResponse::ok(TicketView::from(ticket)))),
        None => Err(Error::NotFound(key).into()),
    }
}

/// Create a ticket from the form URL, then send the client to the listing
async fn create_from_form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateQuery>,
) -> Result<Redirect, ApiError> {
    let ticket = NewTicket::from_parts(query.pid, query.summary, query.description)?;
    let allocator = state.allocator.clone();
    state.blocking_write(move || allocator.allocate(&ticket)).await?;
    Ok(Redirect::to("/"))
}

/// Create a ticket from a JSON body
async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = NewTicket::new(req.project_id, req.summary, req.description)?;
    let allocator = state.allocator.clone();
    let created = state.blocking_write(move || allocator.allocate(&ticket)).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TicketView::from(created))),
    ))
}

/// List per-project counters
async fn list_projects(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let resolver = state.resolver.clone();
    let counters = state.blocking(move || resolver.counters()).await?;
    Ok(Json(ApiResponse::ok(counters)))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::err("404 - page not found")),
    )
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(list_tickets))
        .route("/readme", get(readme))
        .route("/projects", get(list_projects))
        .route("/issues", axum::routing::post(create_ticket))
        .route("/issues/", get(search_tickets))
        .route("/issues/{key}", get(get_ticket))
        .route("/secure/CreateIssueDetails!init.jspa", get(create_from_form))
        .fallback(not_found)
        .with_state(state)
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolve configuration and database location
///
/// Outside an initialized workspace the server falls back to defaults and a
/// database file in the working directory.
fn load_config() -> anyhow::Result<(Config, PathBuf)> {
    let (mut config, database) = match Workspace::open_current() {
        Ok(workspace) => (workspace.config().clone(), workspace.database_path()),
        Err(Error::NotInitialized) => {
            let config = Config::default();
            let database = PathBuf::from(&config.storage.database);
            tracing::warn!(
                "no .jmock workspace found, using {}",
                database.display()
            );
            (config, database)
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open workspace: {}", e)),
    };

    if let Ok(backend) = std::env::var("JMOCK_STORAGE_BACKEND") {
        config.storage.backend = backend.parse::<StorageBackend>()?;
    }
    if let Some(port) = std::env::var("JMOCK_API_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
    {
        config.api.port = port;
    }

    Ok((config, database))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let (config, database) = load_config()?;

    // Schema migrations run here, before the listener accepts anything
    let store = open_store(&config.storage, &database)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    tracing::info!(backend = %config.storage.backend, "ticket store ready");

    let state = Arc::new(AppState::new(store, config.storage.busy_timeout()));

    let router = app(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Starting jmock-api on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;

    Ok(())
}
