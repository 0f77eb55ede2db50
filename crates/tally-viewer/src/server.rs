use crate::config::ViewerConfig;
use crate::security::resolve_result_file;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::report::json::is_result_file_name;
use tower_http::cors::{Any, CorsLayer};

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Port {0} is already in use. Try a different port with --port")]
    AddrInUse(u16),
    #[error("failed to start viewer: {0}")]
    Io(#[from] std::io::Error),
}

struct ViewerState {
    outputs_dir: PathBuf,
}

pub fn router(outputs_dir: PathBuf) -> Router {
    let state = Arc::new(ViewerState { outputs_dir });
    Router::new()
        .route("/", get(index))
        .route("/api/files", get(list_files))
        // Wildcard so that names carrying separators reach validation and get
        // a 400 instead of falling through to 404.
        .route("/api/results/*filename", get(result_file))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn list_files(State(state): State<Arc<ViewerState>>) -> Json<Vec<String>> {
    Json(result_files(&state.outputs_dir).await)
}

/// `results_*.json` names in `dir`, most recent first. A missing or unreadable
/// folder lists as empty.
pub async fn result_files(dir: &std::path::Path) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return names;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_result_file_name(&name) {
            names.push(name);
        }
    }
    names.sort_unstable_by(|a, b| b.cmp(a));
    names
}

async fn result_file(
    State(state): State<Arc<ViewerState>>,
    UrlPath(filename): UrlPath<String>,
) -> Response {
    let Ok(path) = resolve_result_file(&state.outputs_dir, &filename) else {
        tracing::warn!(event = "viewer_rejected_path", filename = %filename);
        return (StatusCode::BAD_REQUEST, "Invalid filename").into_response();
    };

    if !tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }

    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(v) => Json(v).into_response(),
        Err(e) => {
            tracing::warn!(event = "viewer_bad_json", file = %filename, error = %e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// A viewer whose port is already bound, so callers can report the URL and
/// open a browser before serving.
pub struct BoundViewer {
    listener: tokio::net::TcpListener,
    app: Router,
}

impl BoundViewer {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

pub async fn bind(cfg: &ViewerConfig) -> Result<BoundViewer, ViewerError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            return Err(ViewerError::AddrInUse(cfg.port))
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(event = "viewer_listening", addr = %addr, outputs = %cfg.outputs_dir.display());
    Ok(BoundViewer {
        listener,
        app: router(cfg.outputs_dir.clone()),
    })
}
