use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use maud::Markup;
use serde_json::json;
use tower_http::trace::TraceLayer;

mod acquire;
mod analyze;
mod anthropic;
mod config;
mod models;
mod pages;
mod render;
mod session;

use acquire::{Acquirer, Acquisition};
use analyze::{Analyzer, ValidationError, MIN_CONTENT_CHARS};
use anthropic::MessagesClient;
use models::{AnalyzeRequest, PasteForm, SubmitForm};
use session::{Event, SessionState};

#[derive(Clone)]
struct AppState {
    acquirer: Arc<Acquirer>,
    analyzer: Arc<Analyzer>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let state = AppState {
        acquirer: Arc::new(Acquirer::new(&config.acquisition, MIN_CONTENT_CHARS)?),
        analyzer: Arc::new(Analyzer::new(Arc::new(MessagesClient::new(
            &config.extraction,
        )?))),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/submit", post(submit))
        .route("/analyze", post(analyze_pasted))
        .route("/reset", post(reset))
        .route("/api/analyze", post(analyze_endpoint))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── HTML flow ────────────────────────────────────────────────────────────────

async fn index() -> Markup {
    pages::session_page(&SessionState::default())
}

async fn submit(State(app): State<AppState>, Form(form): Form<SubmitForm>) -> Markup {
    let url = form.url.trim().to_string();
    if url.is_empty() {
        return pages::session_page(&SessionState::default());
    }

    let session = SessionState::default().apply(Event::Submit { url: url.clone() });
    let session = match app.acquirer.fetch_listing(&url).await {
        Acquisition::Fetched { content } => {
            run_analysis(&app, session.apply(Event::Fetched), &content).await
        }
        Acquisition::NeedsManualPaste => session.apply(Event::FetchExhausted),
    };
    pages::session_page(&session)
}

async fn analyze_pasted(State(app): State<AppState>, Form(form): Form<PasteForm>) -> Markup {
    let session = SessionState::awaiting_paste(form.url.trim()).apply(Event::PasteSubmitted {
        content: form.content.clone(),
    });
    let session = run_analysis(&app, session, &form.content).await;
    pages::session_page(&session)
}

async fn reset() -> Redirect {
    Redirect::to("/")
}

async fn run_analysis(app: &AppState, session: SessionState, content: &str) -> SessionState {
    match app.analyzer.analyze(content, &session.url).await {
        Ok(record) => session.apply(Event::Analyzed(record)),
        Err(e) => session.apply(Event::Failed(e.to_string())),
    }
}

// ── JSON API ─────────────────────────────────────────────────────────────────

async fn analyze_endpoint(State(app): State<AppState>, Json(req): Json<AnalyzeRequest>) -> Response {
    let content = match req.content {
        Some(content) => content,
        None => match app.acquirer.fetch_listing(&req.url).await {
            Acquisition::Fetched { content } => content,
            Acquisition::NeedsManualPaste => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "detail": "Couldn't auto-fetch the listing; resubmit with its content",
                        "needs_manual_paste": true
                    })),
                )
                    .into_response();
            }
        },
    };

    match app.analyzer.analyze(&content, &req.url).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => {
            let status = match &e {
                ValidationError::ContentTooShort(_) => StatusCode::BAD_REQUEST,
                ValidationError::Generation(_) | ValidationError::EmptyResponse => {
                    StatusCode::BAD_GATEWAY
                }
                ValidationError::InvalidJson { .. } | ValidationError::Schema(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            };
            (status, Json(json!({"detail": e.to_string()}))).into_response()
        }
    }
}
