//! rendezvous-signaling – Vermittlung und Signal-Relay
//!
//! Dieser Crate paart anonyme Verbindungen eins zu eins und leitet
//! Aushandlungsdaten (SDP, ICE-Kandidaten o.ae.) zwischen Partnern weiter,
//! ohne sie zu interpretieren.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)      WebSocket (ws_router, GET /ws)
//!     |                                   |
//!     v                                   v
//! ClientConnection                    websocket_verarbeiten
//!     |                                   |
//!     +---------------+-------------------+
//!                     v
//!             MessageDispatcher
//!                     |
//!     +---------------+----------------+
//!     v                                v
//! MatchingService                 SignalRelay
//!     |  ready / skip / Trennung       |  Partner-Pruefung
//!     |                                |
//!     +-- VerbindungsRegister (Liveness)
//!     +-- WaitingQueue (FIFO, lazy bereinigt)
//!     +-- MatchTable (symmetrisch)
//!     +-- PresenceBroadcaster (total / waiting / matched)
//!                     |
//!                     v
//!             EventBroadcaster (Send-Queue pro Verbindung)
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod match_table;
pub mod matching;
pub mod presence;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod server_state;
pub mod tcp;
pub mod ws;

#[cfg(test)]
mod testhilfe;

// Bequeme Re-Exporte
pub use broadcast::{ClientEmpfang, EventBroadcaster, EventSink};
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use matching::{
    MatchingService, Momentaufnahme, PaarungsErgebnis, Statistik, TrennungsErgebnis,
    VerbindungsZustand,
};
pub use presence::{PresenceBroadcaster, PresenceZahlen};
pub use registry::{ConnectionRegistry, VerbindungsRegister};
pub use relay::{RelayErgebnis, SignalRelay};
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
pub use ws::ws_router;
