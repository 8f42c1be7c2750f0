//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Frames sind laengenpraefixiertes JSON (`ServerCodec`).
//!
//! ## Ablauf
//! ```text
//! accept -> client_anmelden (connected) -> Schleife -> client_cleanup
//! ```
//! `client_cleanup` laeuft auf jedem Ausgangspfad: Client schliesst,
//! Lesefehler, ungueltiges Frame, Timeout oder Shutdown.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` ein `ping`
//! - Kommt laenger als `verbindungs_timeout_sek` kein Frame, wird getrennt

use futures_util::{SinkExt, StreamExt};
use rendezvous_core::ConnectionId;
use rendezvous_protocol::{ServerCodec, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::codec::Framed;

use crate::broadcast::ClientEmpfang;
use crate::dispatcher::MessageDispatcher;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Aktuelle Zeit in Millisekunden seit Unix-Epoche
pub(crate) fn zeitstempel_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    dispatcher: MessageDispatcher,
    peer_addr: SocketAddr,
    // Verbindungsplatz, wird mit der Connection freigegeben
    _platz: OwnedSemaphorePermit,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection auf einem reservierten Platz
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr, platz: OwnedSemaphorePermit) -> Self {
        Self {
            dispatcher: MessageDispatcher::neu(state),
            peer_addr,
            _platz: platz,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht. Danach ist die Verbindung aus der Vermittlung entfernt.
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let id = ConnectionId::new();
        let peer_addr = self.peer_addr;

        tracing::info!(peer = %peer_addr, connection = %id, "Neue TCP-Verbindung");

        let mut sende_rx = self.dispatcher.client_anmelden(id);
        let ergebnis = self
            .schleife(id, stream, &mut sende_rx, &mut shutdown_rx)
            .await;

        match ergebnis {
            Ok(()) => tracing::info!(peer = %peer_addr, connection = %id, "Verbindung beendet"),
            Err(SignalingError::Timeout) => {
                tracing::warn!(peer = %peer_addr, connection = %id, "Verbindungs-Timeout")
            }
            Err(e) => {
                tracing::warn!(peer = %peer_addr, connection = %id, fehler = %e, "Verbindung mit Fehler beendet")
            }
        }

        self.dispatcher.client_cleanup(&id);
    }

    async fn schleife(
        &self,
        id: ConnectionId,
        stream: TcpStream,
        sende_rx: &mut ClientEmpfang,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let config = &self.dispatcher.state().config;
        let keepalive_intervall = Duration::from_secs(config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(config.verbindungs_timeout_sek);

        let mut framed = Framed::new(stream, ServerCodec::with_max_size(config.max_frame_groesse));

        let mut ping_takt = interval_at(Instant::now() + keepalive_intervall, keepalive_intervall);
        ping_takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();

        loop {
            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            self.dispatcher.dispatch(id, nachricht);
                        }
                        Some(Err(e)) => {
                            // Nach einem Codec-Fehler ist der Stream nicht mehr synchron
                            return Err(SignalingError::protokoll(e.to_string()));
                        }
                        None => {
                            tracing::debug!(connection = %id, "Verbindung vom Client geschlossen");
                            return Ok(());
                        }
                    }
                }

                // Ausgehendes Ereignis (Send-Queue vor Presence)
                ausgehend = sende_rx.naechstes() => {
                    match ausgehend {
                        Some(ereignis) => framed.send(ereignis).await?,
                        None => return Err(SignalingError::VerbindungGetrennt),
                    }
                }

                // Keepalive-Ping und Timeout-Pruefung
                _ = ping_takt.tick() => {
                    if letzter_empfang.elapsed() > timeout_dauer {
                        return Err(SignalingError::Timeout);
                    }
                    framed.send(ServerEvent::ping(zeitstempel_ms())).await?;
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!(connection = %id, "Shutdown-Signal – Verbindung wird getrennt");
                        return Ok(());
                    }
                }
            }
        }
    }
}
