//! Presence – Online-Zahlen fuer die Anzeige
//!
//! Nach jeder Zustandsaenderung der Vermittlung werden die Zahlen
//! `{total, waiting, matched}` neu berechnet. Haben sie sich gegenueber dem
//! letzten Versand geaendert, gehen sie an alle lebenden Verbindungen.
//! Rein informativ, keine Reihenfolge-Garantie gegenueber anderen Ereignissen.
//! Zugestellt wird ueber den Presence-Slot jeder Verbindung, nicht ueber die
//! Send-Queue der Kern-Ereignisse.

use rendezvous_protocol::ServerEvent;

use crate::broadcast::EventSink;
use crate::registry::ConnectionRegistry;

/// Aggregierte Presence-Zahlen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceZahlen {
    /// Lebende Verbindungen
    pub gesamt: usize,
    /// Verbindungen in der Warteschlange
    pub wartend: usize,
    /// Gepaarte Verbindungen (zwei pro Paarung)
    pub gepaart: usize,
}

impl PresenceZahlen {
    /// Wandelt die Zahlen in das Wire-Ereignis um
    pub fn als_ereignis(&self) -> ServerEvent {
        ServerEvent::UserCount {
            total: self.gesamt,
            waiting: self.wartend,
            matched: self.gepaart,
        }
    }
}

/// Verteilt Presence-Zahlen bei Aenderung
#[derive(Debug)]
pub struct PresenceBroadcaster {
    aktiviert: bool,
    zuletzt_gesendet: Option<PresenceZahlen>,
}

impl PresenceBroadcaster {
    /// Erstellt einen neuen PresenceBroadcaster
    pub fn neu(aktiviert: bool) -> Self {
        Self {
            aktiviert,
            zuletzt_gesendet: None,
        }
    }

    /// Verteilt `zahlen` an alle lebenden Verbindungen, falls sie sich geaendert haben
    ///
    /// Gibt die Anzahl der Empfaenger zurueck (0 wenn nichts gesendet wurde).
    pub fn aktualisieren<R: ConnectionRegistry>(
        &mut self,
        zahlen: PresenceZahlen,
        register: &R,
        ausgang: &dyn EventSink,
    ) -> usize {
        if !self.aktiviert || self.zuletzt_gesendet == Some(zahlen) {
            return 0;
        }
        self.zuletzt_gesendet = Some(zahlen);

        let ereignis = zahlen.als_ereignis();
        let empfaenger = register
            .aktive()
            .iter()
            .filter(|id| ausgang.presence_senden(id, ereignis.clone()))
            .count();

        tracing::trace!(
            gesamt = zahlen.gesamt,
            wartend = zahlen.wartend,
            gepaart = zahlen.gepaart,
            empfaenger,
            "Presence-Zahlen verteilt"
        );
        empfaenger
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
