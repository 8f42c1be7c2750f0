//! Control-Protokoll
//!
//! Definiert alle Nachrichten, die ueber eine Client-Verbindung laufen.
//!
//! ## Design
//! - JSON-Serialisierung via serde, Tag-Feld `"event"`
//! - Event-Namen und Feldnamen in camelCase (`partnerDisconnected`, `peerId`)
//! - Signal-Payloads sind opak und werden nie interpretiert

use rendezvous_core::ConnectionId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Signal-Payload
// ---------------------------------------------------------------------------

/// Opake Aushandlungsdaten zwischen zwei gepaarten Clients
///
/// Der Server liest diesen Wert nie aus, er wird unveraendert weitergereicht.
/// Mit `preserve_order` bleibt auch die Schluessel-Reihenfolge erhalten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalPayload(pub serde_json::Value);

impl From<serde_json::Value> for SignalPayload {
    fn from(wert: serde_json::Value) -> Self {
        Self(wert)
    }
}

// ---------------------------------------------------------------------------
// Signal-Ziel
// ---------------------------------------------------------------------------

/// Empfaenger-Angabe eines `signal`
///
/// Clients schicken hier die ID zurueck, die sie mit `matched` erhalten
/// haben. Alles, was keine gueltige ID ist, bleibt als Rohtext erhalten,
/// damit der Server es in `peerUnavailable` unveraendert zurueckmelden kann.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalZiel {
    Verbindung(ConnectionId),
    Unbekannt(String),
}

impl SignalZiel {
    /// Die Verbindungs-ID, falls das Ziel eine ist
    pub fn verbindung(&self) -> Option<ConnectionId> {
        match self {
            Self::Verbindung(id) => Some(*id),
            Self::Unbekannt(_) => None,
        }
    }
}

impl From<ConnectionId> for SignalZiel {
    fn from(id: ConnectionId) -> Self {
        Self::Verbindung(id)
    }
}

impl From<String> for SignalZiel {
    fn from(roh: String) -> Self {
        match roh.parse::<ConnectionId>() {
            Ok(id) => Self::Verbindung(id),
            Err(_) => Self::Unbekannt(roh),
        }
    }
}

impl From<SignalZiel> for String {
    fn from(ziel: SignalZiel) -> Self {
        match ziel {
            SignalZiel::Verbindung(id) => id.inner().to_string(),
            SignalZiel::Unbekannt(roh) => roh,
        }
    }
}

impl std::fmt::Display for SignalZiel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verbindung(id) => write!(f, "{id}"),
            Self::Unbekannt(roh) => write!(f, "unbekannt:{roh}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Nachrichten vom Client an den Server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Client moechte gepaart werden
    Ready,
    /// Aktuelle Paarung beenden und sofort neu suchen
    Skip,
    /// Aushandlungsdaten an den (vermeintlichen) Partner
    Signal {
        to: SignalZiel,
        signal: SignalPayload,
    },
    /// Antwort auf einen Server-Ping
    #[serde(rename_all = "camelCase")]
    Pong { timestamp_ms: u64 },
}

impl ClientMessage {
    /// Serialisiert die Nachricht als JSON-String
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus einem JSON-String
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Kurzname fuer Logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Skip => "skip",
            Self::Signal { .. } => "signal",
            Self::Pong { .. } => "pong",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Ereignisse vom Server an einen Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Erste Nachricht nach dem Verbindungsaufbau: die eigene ID
    Connected { id: ConnectionId },
    /// Client steht in der Warteschlange
    Waiting,
    /// Client wurde gepaart
    #[serde(rename_all = "camelCase")]
    Matched { partner_id: ConnectionId },
    /// Partner hat die Paarung freiwillig beendet
    Skipped,
    /// Verbindung des Partners wurde getrennt
    PartnerDisconnected,
    /// Weitergeleitete Aushandlungsdaten
    Signal {
        from: ConnectionId,
        signal: SignalPayload,
    },
    /// Ein `signal` wurde an den Partner weitergereicht
    SignalDelivered { to: ConnectionId },
    /// Ein `signal` konnte nicht zugestellt werden
    #[serde(rename_all = "camelCase")]
    PeerUnavailable { peer_id: SignalZiel },
    /// Presence-Zahlen (rein informativ)
    UserCount {
        total: usize,
        waiting: usize,
        matched: usize,
    },
    /// Keepalive
    #[serde(rename_all = "camelCase")]
    Ping { timestamp_ms: u64 },
}

impl ServerEvent {
    /// Erstellt einen Keepalive-Ping
    pub fn ping(timestamp_ms: u64) -> Self {
        Self::Ping { timestamp_ms }
    }

    /// Serialisiert das Ereignis als JSON-String
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert ein Ereignis aus einem JSON-String
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
