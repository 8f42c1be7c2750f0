//! Verbindungs-Register – Wer ist gerade verbunden?
//!
//! Das Register ist die einzige Quelle der Wahrheit fuer Lebendigkeit.
//! Warteschlange, Paarungstabelle und Relay fragen es vor jeder Entscheidung
//! und vor jedem Senden ab, statt eine eigene Kopie zu fuehren.

use rendezvous_core::ConnectionId;
use std::collections::HashSet;

/// Schnittstelle fuer die Lebendigkeitspruefung
///
/// Die Vermittlung haengt nur von diesem Trait ab, nicht von der internen
/// Verbindungstabelle eines konkreten Transports.
pub trait ConnectionRegistry: Send + 'static {
    /// Nimmt eine Verbindung auf. `false` wenn sie bereits bekannt war.
    fn registrieren(&mut self, id: ConnectionId) -> bool;

    /// Entfernt eine Verbindung. `false` wenn sie nicht bekannt war.
    fn abmelden(&mut self, id: &ConnectionId) -> bool;

    /// Prueft ob die Verbindung noch lebt
    fn ist_aktiv(&self, id: &ConnectionId) -> bool;

    /// Anzahl der lebenden Verbindungen
    fn anzahl(&self) -> usize;

    /// Alle lebenden Verbindungen (Reihenfolge unspezifiziert)
    fn aktive(&self) -> Vec<ConnectionId>;
}

/// In-Memory-Register auf Basis eines `HashSet`
#[derive(Debug, Default)]
pub struct VerbindungsRegister {
    verbindungen: HashSet<ConnectionId>,
}

impl VerbindungsRegister {
    /// Erstellt ein leeres Register
    pub fn neu() -> Self {
        Self::default()
    }
}

impl ConnectionRegistry for VerbindungsRegister {
    fn registrieren(&mut self, id: ConnectionId) -> bool {
        self.verbindungen.insert(id)
    }

    fn abmelden(&mut self, id: &ConnectionId) -> bool {
        self.verbindungen.remove(id)
    }

    fn ist_aktiv(&self, id: &ConnectionId) -> bool {
        self.verbindungen.contains(id)
    }

    fn anzahl(&self) -> usize {
        self.verbindungen.len()
    }

    fn aktive(&self) -> Vec<ConnectionId> {
        self.verbindungen.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrieren_und_abmelden() {
        let mut register = VerbindungsRegister::neu();
        let id = ConnectionId::new();

        assert!(!register.ist_aktiv(&id));
        assert!(register.registrieren(id));
        assert!(register.ist_aktiv(&id));
        assert_eq!(register.anzahl(), 1);

        assert!(register.abmelden(&id));
        assert!(!register.ist_aktiv(&id));
        assert_eq!(register.anzahl(), 0);
    }

    #[test]
    fn doppeltes_registrieren_wird_gemeldet() {
        let mut register = VerbindungsRegister::neu();
        let id = ConnectionId::new();
        assert!(register.registrieren(id));
        assert!(!register.registrieren(id));
        assert_eq!(register.anzahl(), 1);
    }

    #[test]
    fn abmelden_unbekannter_verbindung() {
        let mut register = VerbindungsRegister::neu();
        assert!(!register.abmelden(&ConnectionId::new()));
    }

    #[test]
    fn aktive_liefert_alle() {
        let mut register = VerbindungsRegister::neu();
        let ids: Vec<_> = (0..4).map(|_| ConnectionId::new()).collect();
        for id in &ids {
            register.registrieren(*id);
        }
        let mut aktive = register.aktive();
        aktive.sort();
        let mut erwartet = ids.clone();
        erwartet.sort();
        assert_eq!(aktive, erwartet);
    }
}
