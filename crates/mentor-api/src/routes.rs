//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use mentor_core::error::Result;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Local browser clients on the serving port and the one after it.
    let origins: Vec<HeaderValue> = [state.port, state.port.saturating_add(1)]
        .iter()
        .flat_map(|port| {
            [
                format!("http://127.0.0.1:{}", port),
                format!("http://localhost:{}", port),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/sessions", get(handlers::list_sessions))
        .route(
            "/sessions/{id}/history",
            get(handlers::get_history).delete(handlers::clear_history),
        )
        .route("/sessions/{id}/reset", post(handlers::reset_session))
        .route(
            "/memories/{owner}",
            get(handlers::list_memories).delete(handlers::delete_all_memories),
        )
        .route(
            "/memories/{owner}/{fact_id}",
            put(handlers::update_memory).delete(handlers::delete_memory),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the router on 127.0.0.1 until the process stops.
pub async fn start_server(state: AppState) -> Result<()> {
    let addr = format!("127.0.0.1:{}", state.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
