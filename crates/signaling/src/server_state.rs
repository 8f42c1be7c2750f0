//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Vermittlung, Relay und Broadcaster als Arc-Referenzen, die
//! sicher zwischen tokio-Tasks geteilt werden koennen. TCP- und
//! WebSocket-Transport teilen sich denselben Zustand.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::broadcast::{EventBroadcaster, EventSink};
use crate::error::{SignalingError, SignalingResult};
use crate::matching::MatchingService;
use crate::registry::VerbindungsRegister;
use crate::relay::SignalRelay;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen (alle Transporte)
    pub max_verbindungen: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Kapazitaet der Send-Queue pro Verbindung
    pub sende_queue_groesse: usize,
    /// Maximale Frame-Groesse fuer den TCP-Transport in Bytes
    pub max_frame_groesse: usize,
    /// Presence-Zahlen an alle Verbindungen verteilen
    pub presence_aktiviert: bool,
    /// Erfolgreich weitergeleitete Signale mit `signalDelivered` bestaetigen
    pub zustellbestaetigung: bool,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_verbindungen: 512,
            keepalive_sek: 25,
            verbindungs_timeout_sek: 60,
            sende_queue_groesse: 64,
            max_frame_groesse: rendezvous_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
            presence_aktiviert: true,
            zustellbestaetigung: true,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Vermittlung (ready, skip, Trennung)
    pub dienst: Arc<MatchingService>,
    /// Signal-Relay zwischen Partnern
    pub relay: SignalRelay,
    /// Zustellung an die Send-Queues der Verbindungen
    pub broadcaster: EventBroadcaster,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
    /// Ein Permit pro Verbindungsplatz, gehalten vom Verbindungs-Task
    plaetze: Arc<Semaphore>,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig) -> Arc<Self> {
        let broadcaster = EventBroadcaster::neu();
        let ausgang: Arc<dyn EventSink> = Arc::new(broadcaster.clone());
        let dienst = Arc::new(MatchingService::neu(
            VerbindungsRegister::neu(),
            ausgang,
            config.presence_aktiviert,
        ));
        let relay =
            SignalRelay::neu(Arc::clone(&dienst)).mit_zustellbestaetigung(config.zustellbestaetigung);
        let plaetze = Arc::new(Semaphore::new(
            config.max_verbindungen.min(Semaphore::MAX_PERMITS),
        ));

        Arc::new(Self {
            config: Arc::new(config),
            dienst,
            relay,
            broadcaster,
            start_time: Instant::now(),
            plaetze,
        })
    }

    /// Reserviert einen Verbindungsplatz
    ///
    /// Muss beim Annehmen passieren, nicht erst im Verbindungs-Task. Der
    /// Platz wird frei, sobald das Permit fallen gelassen wird.
    pub fn platz_reservieren(&self) -> SignalingResult<OwnedSemaphorePermit> {
        Arc::clone(&self.plaetze)
            .try_acquire_owned()
            .map_err(|_| SignalingError::ServerVoll)
    }

    /// Anzahl noch freier Verbindungsplaetze
    pub fn freie_plaetze(&self) -> usize {
        self.plaetze.available_permits()
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
