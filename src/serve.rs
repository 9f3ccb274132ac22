//! Purpose: Provide the HTTP/JSON server for the star registry.
//! Exports: `ServeConfig`, `serve`, `preflight_config`.
//! Role: Axum transport over `Registrar<FileStore>`; owns routing, envelopes and CORS.
//! Invariants: Validation failures are 400 with the rule's literal message.
//! Invariants: Storage faults are 5xx; duplicate token ids are 409.
//! Notes: Registry calls do blocking file I/O and run on the blocking pool.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use starnotary::api::{Error, ErrorKind, FileStore, NewStar, RangeRequest, Registrar};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub cors_allowed_origins: Vec<String>,
    pub max_body_bytes: u64,
}

struct AppState {
    registrar: Registrar<FileStore>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    let cors = preflight_config(&config)?;

    init_tracing();

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let state = Arc::new(AppState {
        registrar: Registrar::new(FileStore::open(&config.data_dir)?),
    });

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v0/stars", get(star_range).post(create_star))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    info!(bind = %config.bind, data_dir = %config.data_dir.display(), "serving star registry");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

/// Checks the config without binding and returns the CORS layer it implies.
pub fn preflight_config(config: &ServeConfig) -> Result<Option<CorsLayer>, Error> {
    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 65536."));
    }
    cors_layer(&config.cors_allowed_origins)
}

fn cors_layer(origins: &[String]) -> Result<Option<CorsLayer>, Error> {
    if origins.is_empty() {
        return Ok(None);
    }
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let mut values = Vec::with_capacity(origins.len());
        for origin in origins {
            values.push(parse_origin(origin)?);
        }
        AllowOrigin::list(values)
    };
    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
    ))
}

fn parse_origin(origin: &str) -> Result<HeaderValue, Error> {
    let invalid = || {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid --cors-origin: {origin}"))
            .with_hint("Use a scheme://host[:port] origin like https://app.example.com, or *.")
    };
    let url = Url::parse(origin).map_err(|err| invalid().with_source(err))?;
    let is_bare_origin = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
        && !origin.trim_end_matches('/').contains(['?', '#'])
        && url.path() == "/"
        && !origin.ends_with('/');
    if !is_bare_origin {
        return Err(invalid());
    }
    HeaderValue::from_str(origin).map_err(|err| invalid().with_source(err))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

/// Runs a registry call on the blocking pool.
async fn with_registrar<T, F>(state: Arc<AppState>, f: F) -> Result<T, Error>
where
    F: FnOnce(&Registrar<FileStore>) -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state.registrar))
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("registry task failed")
                .with_source(err)
        })?
}

#[derive(Debug, Default, Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
    #[serde(rename = "oldest-first")]
    oldest_first: Option<String>,
    #[serde(rename = "first-id")]
    first_id: Option<String>,
    #[serde(rename = "last-id")]
    last_id: Option<String>,
}

impl RangeQuery {
    fn into_request(self) -> Result<RangeRequest, Error> {
        if self.first_id.is_some() || self.last_id.is_some() {
            if self.start.is_some() || self.end.is_some() || self.oldest_first.is_some() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("invalid range")
                    .with_hint("Use either start/end[/oldest-first] or first-id/last-id."));
            }
            return Ok(RangeRequest::ids(
                self.first_id.unwrap_or_default(),
                self.last_id.unwrap_or_default(),
            ));
        }
        let oldest_first = match self.oldest_first.as_deref() {
            None | Some("") => false,
            Some(raw) => parse_flag(raw).ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid oldest-first flag: {raw}"))
                    .with_hint("Use true or false.")
            })?,
        };
        Ok(RangeRequest::window(
            self.start.unwrap_or_default(),
            self.end.unwrap_or_default(),
        )
        .oldest_first(oldest_first))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_id: Option<u64>,
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn create_star(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewStar>, JsonRejection>,
) -> Response {
    let star = match payload {
        Ok(Json(star)) => star,
        Err(rejection) => {
            return error_response(
                Error::new(ErrorKind::Usage)
                    .with_message(rejection.body_text())
                    .with_hint("Send a JSON body with owner, token_id, coordinates and name."),
            );
        }
    };
    match with_registrar(state, move |registrar| registrar.register(star)).await {
        Ok(star) => json_response(json!({ "star": star })),
        Err(err) => error_response(err),
    }
}

async fn star_range(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Response {
    let request = match query {
        Ok(Query(query)) => query.into_request(),
        Err(rejection) => Err(Error::new(ErrorKind::Usage).with_message(rejection.body_text())),
    };
    let request = match request {
        Ok(request) => request,
        Err(err) => return error_response(err),
    };
    match with_registrar(state, move |registrar| registrar.star_range(&request)).await {
        Ok(stars) => json_response(json!({ "stars": stars })),
        Err(err) => error_response(err),
    }
}

fn json_response(payload: serde_json::Value) -> Response {
    Json(payload).into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Busy => StatusCode::LOCKED,
        ErrorKind::Permission => StatusCode::FORBIDDEN,
        ErrorKind::Corrupt | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: Error) -> Response {
    let status = status_for(err.kind());
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
            token_id: err.star_id(),
        },
    };
    (status, Json(body)).into_response()
}
