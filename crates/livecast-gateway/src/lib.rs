pub mod connection;
pub mod dispatcher;

use std::net::SocketAddr;

use axum::{
    Router,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

pub use dispatcher::{Dispatcher, Subscription, Viewer};

/// `GET /ws` viewer socket. Serve with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(dispatcher)
}

async fn ws_upgrade(
    State(dispatcher): State<Dispatcher>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, Some(peer)))
}
