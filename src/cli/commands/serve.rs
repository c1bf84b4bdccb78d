//! HTTP API server for the course assistant.
//!
//! Provides REST endpoints for queries, the course catalog and sessions.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::models::Source;
use crate::rag::RagSystem;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
///
/// Queries run one at a time: tools keep per-query provenance.
struct AppState {
    rag: Mutex<RagSystem>,
}

/// Build the API router around a query service.
pub fn router(rag: RagSystem) -> Router {
    let state = Arc::new(AppState {
        rag: Mutex::new(rag),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/courses", get(courses))
        .route("/api/session/clear", post(clear_session))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Query, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let rag = RagSystem::new(&settings)?;

    let docs_dir = settings.docs_dir();
    match rag.add_course_folder(&docs_dir, false).await {
        Ok((courses, chunks)) => {
            info!("Loaded {} courses with {} chunks from {:?}", courses, chunks, docs_dir)
        }
        Err(e) => {
            warn!("Failed to load courses from {:?}: {}", docs_dir, e);
            Output::warning(&format!("Could not load documents: {}", e));
        }
    }

    let app = router(rag);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Syllabus API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Query", "POST /api/query");
    Output::kv("Courses", "GET  /api/courses");
    Output::kv("Clear Session", "POST /api/session/clear");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<Source>,
    session_id: String,
}

#[derive(Serialize)]
struct CourseStats {
    total_courses: usize,
    course_titles: Vec<String>,
}

#[derive(Deserialize)]
struct ClearSessionRequest {
    session_id: String,
}

#[derive(Serialize)]
struct ClearSessionResponse {
    status: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    let rag = state.rag.lock().await;

    let session_id = match req.session_id {
        Some(id) => id,
        None => match rag.sessions().create_session() {
            Ok(id) => id,
            Err(e) => return internal_error(e),
        },
    };

    match rag.query(&req.query, Some(&session_id)).await {
        Ok(response) => Json(QueryResponse {
            answer: response.answer,
            sources: response.sources,
            session_id,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn courses(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rag = state.rag.lock().await;

    match rag.course_analytics().await {
        Ok(analytics) => Json(CourseStats {
            total_courses: analytics.total_courses,
            course_titles: analytics.course_titles,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn clear_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClearSessionRequest>,
) -> impl IntoResponse {
    let rag = state.rag.lock().await;

    match rag.sessions().clear_session(&req.session_id) {
        Ok(()) => Json(ClearSessionResponse {
            status: "success".to_string(),
            message: format!("Session {} cleared", req.session_id),
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}
