//! Event-Broadcaster – Zustellung ausgehender Ereignisse an Verbindungen
//!
//! Jede Verbindung registriert beim Aufbau zwei Kanaele:
//! - eine begrenzte Send-Queue fuer Kern-Ereignisse (`matched`, `signal`, ...)
//! - einen Presence-Slot, der immer nur die letzten Zahlen haelt
//!
//! Die Vermittlung sendet nie direkt auf einen Socket, sondern nur ueber den
//! `EventSink`-Trait. Zustellung blockiert nie. Presence kann daher keine
//! Kern-Ereignisse verdraengen. Laeuft die Send-Queue einer Verbindung
//! trotzdem voll, wird die Verbindung aus dem Broadcaster entfernt: ihr
//! Transport-Task sieht das Ende der Queue und raeumt regulaer auf.

use dashmap::DashMap;
use rendezvous_core::ConnectionId;
use rendezvous_protocol::ServerEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// Ausgang der Vermittlung zum Transport
///
/// Implementierungen duerfen nicht blockieren, sie werden unter der
/// Vermittlungs-Sperre aufgerufen.
pub trait EventSink: Send + Sync + 'static {
    /// Reiht ein Kern-Ereignis fuer eine Verbindung ein
    ///
    /// Gibt `true` zurueck wenn das Ereignis angenommen wurde.
    fn senden(&self, an: &ConnectionId, ereignis: ServerEvent) -> bool;

    /// Legt Presence-Zahlen fuer eine Verbindung ab
    ///
    /// Ein noch nicht gelesener Wert wird ueberschrieben.
    fn presence_senden(&self, an: &ConnectionId, ereignis: ServerEvent) -> bool;
}

// ---------------------------------------------------------------------------
// ClientSender / ClientEmpfang
// ---------------------------------------------------------------------------

/// Sendeseite einer Verbindung
#[derive(Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<ServerEvent>,
    pub presence_tx: watch::Sender<Option<ServerEvent>>,
}

/// Empfangsseite einer Verbindung, gehalten vom Transport-Task
#[derive(Debug)]
pub struct ClientEmpfang {
    pub ereignisse: mpsc::Receiver<ServerEvent>,
    pub presence: watch::Receiver<Option<ServerEvent>>,
    presence_beendet: bool,
}

impl ClientEmpfang {
    /// Naechstes ausgehendes Ereignis
    ///
    /// Kern-Ereignisse haben Vorrang vor Presence. `None` sobald die
    /// Verbindung aus dem Broadcaster entfernt und die Queue geleert ist.
    /// Abbruchsicher, darf in `select!` verwendet werden.
    pub async fn naechstes(&mut self) -> Option<ServerEvent> {
        loop {
            tokio::select! {
                biased;

                ereignis = self.ereignisse.recv() => return ereignis,

                geaendert = self.presence.changed(), if !self.presence_beendet => {
                    if geaendert.is_err() {
                        self.presence_beendet = true;
                        continue;
                    }
                    if let Some(zahlen) = self.presence.borrow_and_update().clone() {
                        return Some(zahlen);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentrale Zustellung fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    clients: Arc<DashMap<ConnectionId, ClientSender>>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung und gibt ihre Empfangsseite zurueck
    ///
    /// Der Transport-Task liest daraus und schreibt auf den Socket.
    pub fn client_registrieren(&self, connection_id: ConnectionId, queue_groesse: usize) -> ClientEmpfang {
        let (tx, ereignisse) = mpsc::channel(queue_groesse.max(1));
        let (presence_tx, presence) = watch::channel(None);
        self.clients.insert(
            connection_id,
            ClientSender {
                connection_id,
                tx,
                presence_tx,
            },
        );
        tracing::debug!(connection = %connection_id, "Client im Broadcaster registriert");
        ClientEmpfang {
            ereignisse,
            presence,
            presence_beendet: false,
        }
    }

    /// Entfernt eine Verbindung; ihre Kanaele werden damit geschlossen
    pub fn client_entfernen(&self, connection_id: &ConnectionId) {
        if self.clients.remove(connection_id).is_some() {
            tracing::debug!(connection = %connection_id, "Client aus Broadcaster entfernt");
        }
    }

    /// Sendet ein Kern-Ereignis an eine einzelne Verbindung
    ///
    /// Bei voller Queue wird die Verbindung entfernt und damit getrennt.
    pub fn an_verbindung_senden(&self, connection_id: &ConnectionId, ereignis: ServerEvent) -> bool {
        // Der DashMap-Eintrag muss vor einem remove() freigegeben sein
        let ergebnis = match self.clients.get(connection_id) {
            Some(sender) => sender.tx.try_send(ereignis),
            None => {
                tracing::debug!(connection = %connection_id, "Senden an unbekannten Client");
                return false;
            }
        };

        match ergebnis {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(verworfen)) => {
                tracing::warn!(
                    connection = %connection_id,
                    ereignis = ?verworfen,
                    "Send-Queue voll, Verbindung wird getrennt"
                );
                self.client_entfernen(connection_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection = %connection_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }

    /// Ersetzt den Presence-Wert einer Verbindung
    pub fn presence_setzen(&self, connection_id: &ConnectionId, ereignis: ServerEvent) -> bool {
        match self.clients.get(connection_id) {
            Some(sender) => sender.presence_tx.send(Some(ereignis)).is_ok(),
            None => false,
        }
    }

    /// Gibt die Anzahl der registrierten Verbindungen zurueck
    pub fn client_anzahl(&self) -> usize {
        self.clients.len()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.clients.contains_key(connection_id)
    }
}

impl EventSink for EventBroadcaster {
    fn senden(&self, an: &ConnectionId, ereignis: ServerEvent) -> bool {
        self.an_verbindung_senden(an, ereignis)
    }

    fn presence_senden(&self, an: &ConnectionId, ereignis: ServerEvent) -> bool {
        self.presence_setzen(an, ereignis)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
