//! HTTP and WebSocket surface.

use crate::config::ServerConfig;
use crate::engine::{ChessEngine, RulesEngine};
use crate::gateway::Gateway;
use crate::registry::SessionRegistry;
use crate::session::SessionSummary;
use axum::body::Body;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::Request;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tracing::{debug, info, instrument, warn};

/// Builds the router: `/ws`, `/health`, `/sessions`.
pub fn router<E: RulesEngine>(gateway: Arc<Gateway<E>>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::<E>))
        .route("/health", get(health))
        .route("/sessions", get(list_sessions::<E>))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(gateway)
}

/// Builds a chess gateway from configuration.
pub fn chess_gateway(config: &ServerConfig) -> Arc<Gateway<ChessEngine>> {
    let registry = Arc::new(SessionRegistry::new(
        ChessEngine::new(),
        config.session_settings(),
    ));
    Arc::new(
        Gateway::new(registry, *config.disconnect_policy())
            .with_outlet_capacity(*config.outlet_capacity()),
    )
}

/// Binds the configured address and serves chess rooms until the process exits.
#[instrument(skip(config), fields(address = %config.bind_address()))]
pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Server ready at ws://{}/ws", config.bind_address());
    serve_on(listener, chess_gateway(config)).await
}

/// Serves a gateway on an already bound listener.
pub async fn serve_on<E: RulesEngine>(
    listener: TcpListener,
    gateway: Arc<Gateway<E>>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(gateway)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_sessions<E: RulesEngine>(
    State(gateway): State<Arc<Gateway<E>>>,
) -> Json<Vec<SessionSummary>> {
    Json(gateway.registry().summaries())
}

async fn ws_handler<E: RulesEngine>(
    State(gateway): State<Arc<Gateway<E>>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(gateway, socket))
}

/// Pumps one WebSocket: frames in go to the gateway, events out go to the
/// socket. Returning from here is the disconnect.
async fn handle_socket<E: RulesEngine>(gateway: Arc<Gateway<E>>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outlet, mut events) = mpsc::channel(gateway.outlet_capacity());
    let connection = gateway.connect(outlet);

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match event.encode() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => gateway.handle_frame(connection, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%connection, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    gateway.disconnect(connection);
    writer.abort();
}
