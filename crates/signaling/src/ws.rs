//! WebSocket-Transport – `GET /ws`
//!
//! Browser-Clients sprechen dasselbe Protokoll wie der TCP-Transport, nur
//! als JSON-Textnachrichten ohne Laengenpraefix. Ungueltige Nachrichten
//! werden protokolliert und ignoriert, die Verbindung bleibt bestehen.
//! Keepalive laeuft ueber WebSocket-Ping-Frames.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use rendezvous_core::ConnectionId;
use rendezvous_protocol::ClientMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tower_http::trace::TraceLayer;

use crate::broadcast::ClientEmpfang;
use crate::dispatcher::MessageDispatcher;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

#[derive(Clone)]
struct WsZustand {
    dispatcher: MessageDispatcher,
    shutdown_rx: watch::Receiver<bool>,
}

/// Erstellt den Router fuer den WebSocket-Transport
pub fn ws_router(state: Arc<SignalingState>, shutdown_rx: watch::Receiver<bool>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(WsZustand {
            dispatcher: MessageDispatcher::neu(state),
            shutdown_rx,
        })
}

async fn ws_handler(ws: WebSocketUpgrade, State(zustand): State<WsZustand>) -> Response {
    let state = zustand.dispatcher.state();
    // Platz schon vor dem Upgrade belegen, scheitert das Upgrade wird er frei
    let platz = match state.platz_reservieren() {
        Ok(platz) => platz,
        Err(e) => {
            tracing::warn!(
                max = state.config.max_verbindungen,
                fehler = %e,
                "WebSocket-Verbindung abgelehnt"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    let max_groesse = state.config.max_frame_groesse;
    ws.max_message_size(max_groesse)
        .on_upgrade(move |socket| websocket_verarbeiten(socket, zustand, platz))
}

async fn websocket_verarbeiten(socket: WebSocket, zustand: WsZustand, _platz: OwnedSemaphorePermit) {
    let WsZustand {
        dispatcher,
        mut shutdown_rx,
    } = zustand;
    let id = ConnectionId::new();

    tracing::info!(connection = %id, "Neue WebSocket-Verbindung");

    let mut sende_rx = dispatcher.client_anmelden(id);
    let ergebnis = ws_schleife(&dispatcher, id, socket, &mut sende_rx, &mut shutdown_rx).await;

    match ergebnis {
        Ok(()) => tracing::info!(connection = %id, "WebSocket-Verbindung beendet"),
        Err(SignalingError::Timeout) => {
            tracing::warn!(connection = %id, "WebSocket-Timeout")
        }
        Err(e) => {
            tracing::warn!(connection = %id, fehler = %e, "WebSocket-Verbindung mit Fehler beendet")
        }
    }

    dispatcher.client_cleanup(&id);
}

fn ws_fehler(e: axum::Error) -> SignalingError {
    SignalingError::WebSocket(e.to_string())
}

async fn ws_schleife(
    dispatcher: &MessageDispatcher,
    id: ConnectionId,
    socket: WebSocket,
    sende_rx: &mut ClientEmpfang,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SignalingResult<()> {
    let config = &dispatcher.state().config;
    let keepalive_intervall = Duration::from_secs(config.keepalive_sek.max(1));
    let timeout_dauer = Duration::from_secs(config.verbindungs_timeout_sek);

    let (mut sender, mut empfaenger) = socket.split();

    let mut ping_takt = interval_at(Instant::now() + keepalive_intervall, keepalive_intervall);
    ping_takt.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut letzter_empfang = Instant::now();

    loop {
        tokio::select! {
            nachricht = empfaenger.next() => {
                match nachricht {
                    Some(Ok(Message::Text(text))) => {
                        letzter_empfang = Instant::now();
                        match ClientMessage::from_json(&text) {
                            Ok(nachricht) => dispatcher.dispatch(id, nachricht),
                            Err(e) => {
                                tracing::warn!(connection = %id, fehler = %e, "Ungueltige Nachricht ignoriert");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        letzter_empfang = Instant::now();
                        tracing::debug!(connection = %id, "Binaere Nachricht ignoriert");
                    }
                    // Ping wird von axum selbst beantwortet
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        letzter_empfang = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(ws_fehler(e)),
                }
            }

            ausgehend = sende_rx.naechstes() => {
                match ausgehend {
                    Some(ereignis) => {
                        let json = ereignis.to_json()?;
                        sender.send(Message::Text(json)).await.map_err(ws_fehler)?;
                    }
                    None => return Err(SignalingError::VerbindungGetrennt),
                }
            }

            _ = ping_takt.tick() => {
                if letzter_empfang.elapsed() > timeout_dauer {
                    return Err(SignalingError::Timeout);
                }
                sender.send(Message::Ping(Vec::new())).await.map_err(ws_fehler)?;
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = sender.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }
}
