//! Hilfsmittel fuer die Unit-Tests der Vermittlung

use parking_lot::Mutex;
use rendezvous_core::ConnectionId;
use rendezvous_protocol::ServerEvent;

use crate::broadcast::EventSink;

/// Zeichnet alle ausgehenden Ereignisse in Sende-Reihenfolge auf
///
/// Presence landet in derselben Liste wie die Kern-Ereignisse.
#[derive(Default)]
pub(crate) struct Mitschnitt {
    ereignisse: Mutex<Vec<(ConnectionId, ServerEvent)>>,
}

impl Mitschnitt {
    pub(crate) fn neu() -> Self {
        Self::default()
    }

    /// Alle Ereignisse fuer eine Verbindung, inklusive Presence
    pub(crate) fn ereignisse_fuer(&self, id: &ConnectionId) -> Vec<ServerEvent> {
        self.ereignisse
            .lock()
            .iter()
            .filter(|(an, _)| an == id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Ereignisse fuer eine Verbindung ohne `userCount`
    pub(crate) fn kern_ereignisse_fuer(&self, id: &ConnectionId) -> Vec<ServerEvent> {
        self.ereignisse_fuer(id)
            .into_iter()
            .filter(|e| !matches!(e, ServerEvent::UserCount { .. }))
            .collect()
    }

    pub(crate) fn anzahl(&self) -> usize {
        self.ereignisse.lock().len()
    }

    pub(crate) fn leeren(&self) {
        self.ereignisse.lock().clear();
    }
}

impl EventSink for Mitschnitt {
    fn senden(&self, an: &ConnectionId, ereignis: ServerEvent) -> bool {
        self.ereignisse.lock().push((*an, ereignis));
        true
    }

    fn presence_senden(&self, an: &ConnectionId, ereignis: ServerEvent) -> bool {
        self.senden(an, ereignis)
    }
}
