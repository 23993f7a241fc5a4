use crate::{
    config::Config,
    errors::AppError,
    metadata::{ContentRecord, ContentType, Preview, Resolution, Resolver},
};
use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    resolver: Arc<Resolver>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

pub fn router(resolver: Arc<Resolver>) -> Router {
    let shared_state = Arc::new(SharedState { resolver });

    Router::new()
        .route("/preview", get(preview))
        .route("/resolve", get(resolve))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(config: Config) -> anyhow::Result<()> {
    let resolver = Arc::new(Resolver::from_config(&config)?);

    let transports = resolver
        .fetcher()
        .transports()
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(" -> ");
    log::info!("transports: {transports}");

    let app = router(resolver);

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    log::info!("listening on {}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

pub fn start_daemon(config: Config) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?
        .block_on(start_app(config))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.0 {
            AppError::Validation(message) => (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({ "message": message })),
            ),
            AppError::Other(err) => {
                log::error!("{err:?}");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "internal error" })),
                )
            }
        }
        .into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewQuery {
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub title: Option<String>,
}

impl PreviewQuery {
    /// Validate the query into a record. Only syntax is checked here; whether
    /// the site answers is never a client error.
    pub fn into_record(self) -> Result<ContentRecord, AppError> {
        let url = self
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::validation("missing `url` parameter"))?;

        let parsed = url::Url::parse(&url)
            .map_err(|err| AppError::validation(format!("invalid url: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::validation("only http/https URLs are supported"));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(AppError::validation("url has no host"));
        }

        let declared_type = match self.content_type.as_deref().map(str::trim) {
            None | Some("") => ContentType::default(),
            Some(t) => t
                .parse::<ContentType>()
                .map_err(|err| AppError::validation(err.to_string()))?,
        };

        Ok(ContentRecord {
            url,
            declared_type,
            declared_title: self.title,
        })
    }
}

/// Card shape the UI renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: String,
    pub favicon: Option<String>,
}

impl From<Preview> for PreviewResponse {
    fn from(preview: Preview) -> Self {
        Self {
            title: preview.title,
            description: preview.description,
            image: preview.image_url,
            site_name: preview.site_name,
            favicon: preview.favicon_url,
        }
    }
}

/// Resolve on a task of its own: if the client goes away the handler is
/// dropped, the resolution still finishes and its result is discarded.
async fn run_resolution(state: &SharedState, record: ContentRecord) -> Result<Resolution, AppError> {
    let resolver = state.resolver.clone();
    let resolution = tokio::spawn(async move { resolver.resolve(&record).await })
        .await
        .map_err(|err| anyhow::anyhow!("resolution task failed: {err}"))?;
    log::debug!("resolved: {:?}", resolution.preview().title);
    Ok(resolution)
}

fn parse_query(query: Result<Query<PreviewQuery>, QueryRejection>) -> Result<ContentRecord, AppError> {
    let Query(query) = query.map_err(|err| AppError::validation(err.body_text()))?;
    log::debug!("query: {query:?}");
    query.into_record()
}

async fn preview(
    State(state): State<Arc<SharedState>>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Result<Json<PreviewResponse>, HttpError> {
    let record = parse_query(query)?;
    let resolution = run_resolution(&state, record).await?;
    Ok(Json(resolution.into_preview().into()))
}

async fn resolve(
    State(state): State<Arc<SharedState>>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Result<Json<Resolution>, HttpError> {
    let record = parse_query(query)?;
    Ok(Json(run_resolution(&state, record).await?))
}
