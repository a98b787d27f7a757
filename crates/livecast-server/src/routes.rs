use std::path::Path;

use axum::{
    Json, Router,
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use livecast_gateway::Dispatcher;
use livecast_store::CommentStore;
use livecast_types::models::HealthResponse;

#[derive(Clone)]
pub struct AppState {
    pub store: CommentStore,
    pub dispatcher: Dispatcher,
}

/// Full HTTP surface: index, health, viewer socket, and static overlay files.
pub fn app(state: AppState, static_dir: &Path) -> Router {
    let gateway = livecast_gateway::router(state.dispatcher.clone());

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(state)
        .merge(gateway)
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// GET /: points the operator at the overlay page.
pub async fn index() -> impl IntoResponse {
    Html(
        "<html>\
         <head><title>Live Comments Overlay</title></head>\
         <body>\
         <h1>Live Comments Overlay Server</h1>\
         <p>Server is running! Add this page as a browser source:</p>\
         <p><a href=\"/overlay.html\">/overlay.html</a></p>\
         <p>Viewers connect to <code>/ws</code>; comments arrive shuffled.</p>\
         </body>\
         </html>",
    )
}

/// GET /health: liveness check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(
        state.store.last_fetch(),
        state.dispatcher.viewer_count().await,
    ))
}
