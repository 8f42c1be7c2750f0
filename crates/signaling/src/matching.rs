//! Vermittlung – Paaren, Ueberspringen, Trennen
//!
//! Der `MatchingService` besitzt Warteschlange und Paarungstabelle exklusiv
//! und haelt sie zusammen mit dem Verbindungs-Register hinter einer einzigen
//! Sperre. Jedes Ereignis (`ready`, `skip`, `signal`, Trennung) ist genau ein
//! kritischer Abschnitt: Pruefungen, Mutation und das Einreihen der
//! ausgehenden Ereignisse passieren ohne Unterbrechung.
//!
//! ## Zustaende (abgeleitet, nicht gespeichert)
//! ```text
//!             ready / skip (niemand wartet)
//!   Leerlauf ------------------------------> Wartend
//!      |  ^                                     |
//!      |  +---- skipped (Partner geht) ----+    | Partner gefunden
//!      |                                   |    v
//!      +------ ready (jemand wartet) ----> Gepaart
//!
//!   jeder Zustand --- Trennung ---> Geschlossen (terminal)
//! ```
//!
//! Ausgehende Ereignisse werden unter der Sperre eingereiht, damit jede
//! Verbindung sie in der Reihenfolge der Zustandsuebergaenge sieht.

use parking_lot::Mutex;
use rendezvous_core::ConnectionId;
use rendezvous_protocol::ServerEvent;
use std::sync::Arc;

use crate::broadcast::EventSink;
use crate::match_table::MatchTable;
use crate::presence::{PresenceBroadcaster, PresenceZahlen};
use crate::queue::WaitingQueue;
use crate::registry::{ConnectionRegistry, VerbindungsRegister};

// ---------------------------------------------------------------------------
// Ergebnistypen
// ---------------------------------------------------------------------------

/// Abgeleiteter Zustand einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Registriert, weder wartend noch gepaart
    Leerlauf,
    /// In der Warteschlange
    Wartend,
    /// In der Paarungstabelle
    Gepaart { partner: ConnectionId },
    /// Nicht (mehr) registriert
    Geschlossen,
}

/// Ergebnis von `ready` und `skip`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaarungsErgebnis {
    /// Kein Partner verfuegbar, Verbindung wartet
    Wartend,
    /// Neue Paarung hergestellt
    Gepaart { partner: ConnectionId },
    /// Verbindung war nicht (mehr) registriert, nichts weiter veraendert
    Abgebrochen,
}

/// Ergebnis der Trennungsbehandlung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrennungsErgebnis {
    /// Verbindung war bereits unbekannt
    Unbekannt,
    /// Verbindung abgemeldet, ggf. mit aufgeloester Paarung
    Getrennt {
        ehemaliger_partner: Option<ConnectionId>,
    },
}

/// Laufende Zaehler seit Prozessstart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistik {
    pub paarungen_gesamt: u64,
    pub skips_gesamt: u64,
    pub signale_weitergeleitet: u64,
    pub signale_abgelehnt: u64,
}

/// Konsistenter Schnappschuss von Zahlen und Zaehlern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Momentaufnahme {
    pub zahlen: PresenceZahlen,
    pub statistik: Statistik,
}

// ---------------------------------------------------------------------------
// Vermittlungsdaten (unter der Sperre)
// ---------------------------------------------------------------------------

/// Alles, was die Sperre des `MatchingService` schuetzt
pub(crate) struct Vermittlungsdaten<R> {
    pub(crate) register: R,
    pub(crate) warteschlange: WaitingQueue,
    pub(crate) paarungen: MatchTable,
    pub(crate) presence: PresenceBroadcaster,
    pub(crate) statistik: Statistik,
}

impl<R: ConnectionRegistry> Vermittlungsdaten<R> {
    /// Sendet nur an lebende Verbindungen
    pub(crate) fn senden(
        &self,
        ausgang: &dyn EventSink,
        an: &ConnectionId,
        ereignis: ServerEvent,
    ) -> bool {
        if !self.register.ist_aktiv(an) {
            tracing::debug!(connection = %an, "Ereignis an inaktive Verbindung verworfen");
            return false;
        }
        ausgang.senden(an, ereignis)
    }

    /// Loest die Paarung von `id` in beiden Richtungen auf
    pub(crate) fn paarung_aufloesen(&mut self, id: &ConnectionId) -> Option<ConnectionId> {
        self.paarungen.aufloesen(id)
    }

    /// Stellt `id` ans Ende der Warteschlange und meldet `waiting`
    pub(crate) fn einreihen(&mut self, ausgang: &dyn EventSink, id: ConnectionId) {
        self.warteschlange.entfernen(&id);
        self.warteschlange.anhaengen(id);
        tracing::debug!(connection = %id, wartend = self.warteschlange.laenge(), "Verbindung eingereiht");
        self.senden(ausgang, &id, ServerEvent::Waiting);
    }

    /// Erster lebender, ungepaarter Kandidat ausser `id`
    ///
    /// Tote oder bereits gepaarte Eintraege auf dem Weg werden verworfen.
    fn partner_suchen(&mut self, id: &ConnectionId) -> Option<ConnectionId> {
        let Self {
            register,
            warteschlange,
            paarungen,
            ..
        } = self;
        warteschlange.ersten_gueltigen_entnehmen(id, |kandidat| {
            register.ist_aktiv(kandidat) && !paarungen.ist_gepaart(kandidat)
        })
    }

    /// Paart `id` mit `partner` und benachrichtigt beide
    fn paaren(&mut self, ausgang: &dyn EventSink, id: ConnectionId, partner: ConnectionId) {
        self.warteschlange.entfernen(&id);
        self.warteschlange.entfernen(&partner);
        self.paarungen.verbinden(id, partner);
        self.statistik.paarungen_gesamt += 1;

        tracing::info!(connection = %id, partner = %partner, "Verbindungen gepaart");

        self.senden(ausgang, &id, ServerEvent::Matched { partner_id: partner });
        self.senden(ausgang, &partner, ServerEvent::Matched { partner_id: id });
    }

    fn zahlen(&self) -> PresenceZahlen {
        PresenceZahlen {
            gesamt: self.register.anzahl(),
            wartend: self.warteschlange.laenge(),
            gepaart: self.paarungen.anzahl_gepaart(),
        }
    }

    /// Verteilt die Presence-Zahlen falls sie sich geaendert haben
    pub(crate) fn presence_aktualisieren(&mut self, ausgang: &dyn EventSink) {
        let zahlen = self.zahlen();
        self.presence.aktualisieren(zahlen, &self.register, ausgang);
    }

    fn zustand_von(&self, id: &ConnectionId) -> VerbindungsZustand {
        if !self.register.ist_aktiv(id) {
            return VerbindungsZustand::Geschlossen;
        }
        if let Some(partner) = self.paarungen.partner_von(id) {
            return VerbindungsZustand::Gepaart { partner };
        }
        if self.warteschlange.enthaelt(id) {
            return VerbindungsZustand::Wartend;
        }
        VerbindungsZustand::Leerlauf
    }

    /// Prueft die strukturellen Invarianten von Warteschlange und Tabelle
    #[cfg(test)]
    pub(crate) fn invarianten_pruefen(&self) -> Result<(), String> {
        let mut gesehen = std::collections::HashSet::new();
        for id in self.warteschlange.iter() {
            if !gesehen.insert(*id) {
                return Err(format!("{id} doppelt in der Warteschlange"));
            }
            if self.paarungen.ist_gepaart(id) {
                return Err(format!("{id} wartet und ist gepaart"));
            }
        }
        for (a, b) in self.paarungen.eintraege() {
            if a == b {
                return Err(format!("{a} mit sich selbst gepaart"));
            }
            if self.paarungen.partner_von(b) != Some(*a) {
                return Err(format!("Paarung {a} -> {b} nicht symmetrisch"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MatchingService
// ---------------------------------------------------------------------------

/// Zentrale Vermittlung fuer alle Verbindungen
///
/// Wird einmal erzeugt und per `Arc` in alle Verbindungs-Tasks gereicht.
pub struct MatchingService<R = VerbindungsRegister> {
    daten: Mutex<Vermittlungsdaten<R>>,
    ausgang: Arc<dyn EventSink>,
}

impl<R: ConnectionRegistry> MatchingService<R> {
    /// Erstellt eine neue, leere Vermittlung
    pub fn neu(register: R, ausgang: Arc<dyn EventSink>, presence_aktiviert: bool) -> Self {
        Self {
            daten: Mutex::new(Vermittlungsdaten {
                register,
                warteschlange: WaitingQueue::neu(),
                paarungen: MatchTable::neu(),
                presence: PresenceBroadcaster::neu(presence_aktiviert),
                statistik: Statistik::default(),
            }),
            ausgang,
        }
    }

    /// Fuehrt `f` unter der Vermittlungs-Sperre aus
    pub(crate) fn mit_daten<T>(
        &self,
        f: impl FnOnce(&mut Vermittlungsdaten<R>, &dyn EventSink) -> T,
    ) -> T {
        let mut daten = self.daten.lock();
        f(&mut daten, self.ausgang.as_ref())
    }

    /// Nimmt eine neu angenommene Verbindung auf
    pub fn verbindung_registrieren(&self, id: ConnectionId) -> bool {
        self.mit_daten(|daten, ausgang| {
            let neu = daten.register.registrieren(id);
            if neu {
                tracing::info!(connection = %id, gesamt = daten.register.anzahl(), "Verbindung registriert");
                daten.presence_aktualisieren(ausgang);
            }
            neu
        })
    }

    /// `ready`: bestehende Paarung beenden, dann Partner suchen oder warten
    ///
    /// Wiederholte Aufrufe sind unschaedlich: eine bestehende Paarung wird
    /// aufgeloest und ein vorhandener Warteschlangen-Eintrag entfernt, bevor
    /// neu gesucht wird.
    pub fn bereit(&self, id: ConnectionId) -> PaarungsErgebnis {
        self.mit_daten(|daten, ausgang| {
            if !daten.register.ist_aktiv(&id) {
                tracing::debug!(connection = %id, "ready von nicht registrierter Verbindung verworfen");
                return PaarungsErgebnis::Abgebrochen;
            }

            if let Some(alter_partner) = daten.paarung_aufloesen(&id) {
                tracing::info!(
                    connection = %id,
                    partner = %alter_partner,
                    "Bestehende Paarung durch ready beendet"
                );
                daten.senden(ausgang, &alter_partner, ServerEvent::Skipped);
            }

            daten.warteschlange.entfernen(&id);

            let ergebnis = match daten.partner_suchen(&id) {
                Some(partner) => {
                    daten.paaren(ausgang, id, partner);
                    PaarungsErgebnis::Gepaart { partner }
                }
                None => {
                    daten.einreihen(ausgang, id);
                    PaarungsErgebnis::Wartend
                }
            };

            daten.presence_aktualisieren(ausgang);
            ergebnis
        })
    }

    /// `skip`: Paarung beenden, hinten einreihen, sofort neu suchen
    pub fn ueberspringen(&self, id: ConnectionId) -> PaarungsErgebnis {
        self.mit_daten(|daten, ausgang| {
            if !daten.register.ist_aktiv(&id) {
                tracing::debug!(connection = %id, "skip von nicht registrierter Verbindung verworfen");
                return PaarungsErgebnis::Abgebrochen;
            }

            if let Some(alter_partner) = daten.paarung_aufloesen(&id) {
                tracing::info!(connection = %id, partner = %alter_partner, "Partner uebersprungen");
                daten.senden(ausgang, &alter_partner, ServerEvent::Skipped);
            }
            daten.statistik.skips_gesamt += 1;

            daten.einreihen(ausgang, id);

            let ergebnis = match daten.partner_suchen(&id) {
                Some(partner) => {
                    daten.paaren(ausgang, id, partner);
                    PaarungsErgebnis::Gepaart { partner }
                }
                None => PaarungsErgebnis::Wartend,
            };

            daten.presence_aktualisieren(ausgang);
            ergebnis
        })
    }

    /// Trennung: abmelden, Paarung aufloesen, Partner wieder einreihen
    ///
    /// Der Partner wird hier nicht automatisch neu gepaart; das naechste
    /// `ready` (typischerweise vom Client ausgeloest) sucht.
    pub fn verbindung_getrennt(&self, id: ConnectionId) -> TrennungsErgebnis {
        self.mit_daten(|daten, ausgang| {
            // Zuerst abmelden, damit jede folgende Pruefung `id` als tot sieht
            let war_registriert = daten.register.abmelden(&id);
            let ehemaliger_partner = daten.paarung_aufloesen(&id);
            let war_wartend = daten.warteschlange.entfernen(&id);

            if let Some(partner) = ehemaliger_partner {
                if daten.register.ist_aktiv(&partner) {
                    tracing::info!(connection = %id, partner = %partner, "Partner getrennt, Partner wird eingereiht");
                    daten.senden(ausgang, &partner, ServerEvent::PartnerDisconnected);
                    daten.einreihen(ausgang, partner);
                }
            }

            if !war_registriert && ehemaliger_partner.is_none() && !war_wartend {
                return TrennungsErgebnis::Unbekannt;
            }

            tracing::info!(connection = %id, gesamt = daten.register.anzahl(), "Verbindung abgemeldet");
            daten.presence_aktualisieren(ausgang);
            TrennungsErgebnis::Getrennt { ehemaliger_partner }
        })
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_aktiv(&self, id: &ConnectionId) -> bool {
        self.mit_daten(|daten, _| daten.register.ist_aktiv(id))
    }

    /// Abgeleiteter Zustand einer Verbindung
    pub fn zustand_von(&self, id: &ConnectionId) -> VerbindungsZustand {
        self.mit_daten(|daten, _| daten.zustand_von(id))
    }

    /// Aktueller Partner einer Verbindung
    pub fn partner_von(&self, id: &ConnectionId) -> Option<ConnectionId> {
        self.mit_daten(|daten, _| daten.paarungen.partner_von(id))
    }

    /// Wartende Verbindungen in Warteschlangen-Reihenfolge
    pub fn wartende(&self) -> Vec<ConnectionId> {
        self.mit_daten(|daten, _| daten.warteschlange.iter().copied().collect())
    }

    /// Anzahl registrierter Verbindungen
    pub fn verbindungs_anzahl(&self) -> usize {
        self.mit_daten(|daten, _| daten.register.anzahl())
    }

    /// Zahlen und Zaehler in einem konsistenten Schnappschuss
    pub fn momentaufnahme(&self) -> Momentaufnahme {
        self.mit_daten(|daten, _| Momentaufnahme {
            zahlen: daten.zahlen(),
            statistik: daten.statistik,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
