//! Paarungstabelle – symmetrische Zuordnung zweier Verbindungen
//!
//! Invariante: `tabelle[a] == b` genau dann wenn `tabelle[b] == a`.
//! Beide Richtungen werden immer gemeinsam gesetzt und gemeinsam entfernt.

use rendezvous_core::ConnectionId;
use std::collections::HashMap;

/// Symmetrische Paarungstabelle
#[derive(Debug, Default, Clone)]
pub struct MatchTable {
    partner: HashMap<ConnectionId, ConnectionId>,
}

impl MatchTable {
    /// Erstellt eine leere Tabelle
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Paarung in beide Richtungen ein
    ///
    /// Aufrufer muessen vorher sicherstellen, dass keine der beiden Seiten
    /// bereits gepaart ist.
    pub fn verbinden(&mut self, a: ConnectionId, b: ConnectionId) {
        debug_assert_ne!(a, b, "Verbindung kann nicht mit sich selbst gepaart werden");
        debug_assert!(!self.ist_gepaart(&a) && !self.ist_gepaart(&b));
        self.partner.insert(a, b);
        self.partner.insert(b, a);
    }

    /// Loest die Paarung von `id` in beide Richtungen auf
    ///
    /// Gibt den bisherigen Partner zurueck. Der Rueckeintrag wird nur
    /// entfernt wenn er tatsaechlich auf `id` zeigt.
    pub fn aufloesen(&mut self, id: &ConnectionId) -> Option<ConnectionId> {
        let partner = self.partner.remove(id)?;
        if self.partner.get(&partner) == Some(id) {
            self.partner.remove(&partner);
        }
        Some(partner)
    }

    /// Aktueller Partner einer Verbindung
    pub fn partner_von(&self, id: &ConnectionId) -> Option<ConnectionId> {
        self.partner.get(id).copied()
    }

    pub fn ist_gepaart(&self, id: &ConnectionId) -> bool {
        self.partner.contains_key(id)
    }

    /// Anzahl gepaarter Verbindungen (zwei pro Paarung)
    pub fn anzahl_gepaart(&self) -> usize {
        self.partner.len()
    }

    /// Alle Eintraege, jede Paarung erscheint in beiden Richtungen
    pub fn eintraege(&self) -> impl Iterator<Item = (&ConnectionId, &ConnectionId)> {
        self.partner.iter()
    }
}
