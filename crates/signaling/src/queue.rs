//! Warteschlange – Verbindungen, die auf einen Partner warten
//!
//! FIFO ohne Duplikate. Eintraege koennen auch aus der Mitte entfernt
//! werden (Paarung waehrend des Wartens, Trennung waehrend des Wartens).

use rendezvous_core::ConnectionId;
use std::collections::VecDeque;

/// Geordnete Warteschlange von Verbindungs-IDs
#[derive(Debug, Default, Clone)]
pub struct WaitingQueue {
    eintraege: VecDeque<ConnectionId>,
}

impl WaitingQueue {
    /// Erstellt eine leere Warteschlange
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt eine ID hinten an
    ///
    /// Gibt `false` zurueck (und aendert nichts) wenn die ID schon wartet.
    pub fn anhaengen(&mut self, id: ConnectionId) -> bool {
        if self.enthaelt(&id) {
            return false;
        }
        self.eintraege.push_back(id);
        true
    }

    /// Entfernt eine ID unabhaengig von ihrer Position
    pub fn entfernen(&mut self, id: &ConnectionId) -> bool {
        match self.eintraege.iter().position(|e| e == id) {
            Some(pos) => {
                self.eintraege.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Prueft ob eine ID wartet
    pub fn enthaelt(&self, id: &ConnectionId) -> bool {
        self.eintraege.contains(id)
    }

    /// Sucht vom Kopf her den ersten gueltigen Kandidaten und entnimmt ihn
    ///
    /// `ausser` wird uebersprungen und bleibt an seiner Position. Jeder
    /// Eintrag, den `ist_gueltig` ablehnt, ist veraltet und wird dabei
    /// verworfen.
    pub fn ersten_gueltigen_entnehmen(
        &mut self,
        ausser: &ConnectionId,
        mut ist_gueltig: impl FnMut(&ConnectionId) -> bool,
    ) -> Option<ConnectionId> {
        let mut i = 0;
        while i < self.eintraege.len() {
            let kandidat = self.eintraege[i];
            if kandidat == *ausser {
                i += 1;
                continue;
            }
            // remove() verschiebt den Rest, daher kein i += 1
            self.eintraege.remove(i);
            if ist_gueltig(&kandidat) {
                return Some(kandidat);
            }
            tracing::debug!(connection = %kandidat, "Veralteten Warteschlangen-Eintrag verworfen");
        }
        None
    }

    /// Anzahl der wartenden Verbindungen
    pub fn laenge(&self) -> usize {
        self.eintraege.len()
    }

    /// Iteriert in Warteschlangen-Reihenfolge
    pub fn iter(&self) -> impl Iterator<Item = &ConnectionId> {
        self.eintraege.iter()
    }
}
