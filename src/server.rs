use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::app::LeadSourcingUseCase;
use crate::domain::{ErrorResponse, PipelineRequest};
use crate::error::PipelineError;
use crate::observability::metrics;

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "repair-leads",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn prometheus_metrics() -> Response {
    match metrics::render() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

async fn run_pipeline(
    Extension(use_case): Extension<Arc<LeadSourcingUseCase>>,
    body: Result<Json<PipelineRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let e = PipelineError::InvalidRequest(rejection.body_text());
            return failure(&e);
        }
    };

    info!(
        search_term = %request.search_term,
        location = %request.location,
        test_mode = request.test_mode,
        "Pipeline request received"
    );
    match use_case.execute(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => failure(&e),
    }
}

fn failure(e: &PipelineError) -> Response {
    error!("Pipeline request failed: {}", e);
    let body = ErrorResponse {
        success: false,
        error: "Pipeline execution failed".to_string(),
        details: e.to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Permissive CORS. Every OPTIONS request is answered here with an empty 200.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

/// Create the HTTP router with the pipeline, health and metrics routes.
pub fn create_server(use_case: Arc<LeadSourcingUseCase>) -> Router {
    Router::new()
        .route("/", post(run_pipeline))
        .route("/multi-ai-pipeline", post(run_pipeline))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .layer(Extension(use_case))
        .layer(ServiceBuilder::new().layer(cors_layer()))
}

/// Start the HTTP server on the specified port
pub async fn start_server(use_case: Arc<LeadSourcingUseCase>, port: u16) -> anyhow::Result<()> {
    let app = create_server(use_case);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 Lead sourcing server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("📊 Metrics:      http://localhost:{port}/metrics");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
