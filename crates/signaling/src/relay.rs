//! Signal-Relay – Weiterleitung von Aushandlungsdaten zwischen Partnern
//!
//! Die Nutzlast wird nie interpretiert oder veraendert. Vor jeder
//! Weiterleitung prueft das Relay unter der Vermittlungs-Sperre, ob der
//! angegebene Empfaenger laut Paarungstabelle tatsaechlich der Partner des
//! Absenders ist. Veraltete Signale (Skip oder Trennung war schneller)
//! werden mit `peerUnavailable` beantwortet. Auf Wunsch bestaetigt das
//! Relay jede erfolgreiche Weiterleitung mit `signalDelivered`.

use rendezvous_core::ConnectionId;
use rendezvous_protocol::{ServerEvent, SignalPayload, SignalZiel};
use std::sync::Arc;

use crate::matching::MatchingService;
use crate::registry::{ConnectionRegistry, VerbindungsRegister};

/// Ergebnis einer Signal-Weiterleitung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErgebnis {
    /// An den Partner weitergeleitet
    Zugestellt,
    /// Absender ist nicht mehr registriert, still verworfen
    AbsenderInaktiv,
    /// Empfaenger ist nicht der aktuelle Partner
    VeralteterPartner {
        /// Absender hatte keinen Partner und wurde neu eingereiht
        neu_eingereiht: bool,
    },
    /// Partner ist verschwunden, Paarung aufgeloest und Absender eingereiht
    PartnerWeg,
}

/// Leitet Signale zwischen gepaarten Verbindungen weiter
pub struct SignalRelay<R = VerbindungsRegister> {
    dienst: Arc<MatchingService<R>>,
    zustellung_bestaetigen: bool,
}

impl<R> Clone for SignalRelay<R> {
    fn clone(&self) -> Self {
        Self {
            dienst: Arc::clone(&self.dienst),
            zustellung_bestaetigen: self.zustellung_bestaetigen,
        }
    }
}

impl<R: ConnectionRegistry> SignalRelay<R> {
    pub fn neu(dienst: Arc<MatchingService<R>>) -> Self {
        Self {
            dienst,
            zustellung_bestaetigen: false,
        }
    }

    /// Schaltet `signalDelivered` an den Absender ein oder aus
    pub fn mit_zustellbestaetigung(mut self, aktiv: bool) -> Self {
        self.zustellung_bestaetigen = aktiv;
        self
    }

    /// Leitet `nutzlast` von `von` an `an` weiter, sofern beide gepaart sind
    ///
    /// Ein Ziel, das keine gueltige Verbindungs-ID ist, wird wie jede
    /// andere fremde Verbindung behandelt.
    pub fn signal(
        &self,
        von: ConnectionId,
        an: impl Into<SignalZiel>,
        nutzlast: SignalPayload,
    ) -> RelayErgebnis {
        let ziel = an.into();
        self.dienst.mit_daten(|daten, ausgang| {
            if !daten.register.ist_aktiv(&von) {
                tracing::debug!(connection = %von, "Signal von inaktiver Verbindung verworfen");
                return RelayErgebnis::AbsenderInaktiv;
            }

            let partner = daten.paarungen.partner_von(&von);
            let ergebnis = match (partner, ziel.verbindung()) {
                (Some(partner), Some(an)) if partner == an => {
                    if daten.register.ist_aktiv(&an) {
                        daten.senden(
                            ausgang,
                            &an,
                            ServerEvent::Signal {
                                from: von,
                                signal: nutzlast,
                            },
                        );
                        if self.zustellung_bestaetigen {
                            daten.senden(ausgang, &von, ServerEvent::SignalDelivered { to: an });
                        }
                        daten.statistik.signale_weitergeleitet += 1;
                        tracing::trace!(von = %von, an = %an, "Signal weitergeleitet");
                        return RelayErgebnis::Zugestellt;
                    }

                    // Partner ist weg, die Trennungsmeldung steht aber noch aus
                    tracing::info!(connection = %von, partner = %an, "Signal an verschwundenen Partner");
                    daten.paarung_aufloesen(&von);
                    daten.senden(ausgang, &von, ServerEvent::PeerUnavailable { peer_id: ziel });
                    daten.einreihen(ausgang, von);
                    RelayErgebnis::PartnerWeg
                }
                (Some(partner), _) => {
                    tracing::debug!(
                        connection = %von,
                        an = %ziel,
                        partner = %partner,
                        "Signal an fremde Verbindung abgelehnt"
                    );
                    daten.senden(ausgang, &von, ServerEvent::PeerUnavailable { peer_id: ziel });
                    RelayErgebnis::VeralteterPartner {
                        neu_eingereiht: false,
                    }
                }
                (None, _) => {
                    tracing::debug!(connection = %von, an = %ziel, "Signal ohne bestehende Paarung abgelehnt");
                    daten.senden(ausgang, &von, ServerEvent::PeerUnavailable { peer_id: ziel });
                    let neu_eingereiht = !daten.warteschlange.enthaelt(&von);
                    if neu_eingereiht {
                        daten.einreihen(ausgang, von);
                    }
                    RelayErgebnis::VeralteterPartner { neu_eingereiht }
                }
            };

            daten.statistik.signale_abgelehnt += 1;
            daten.presence_aktualisieren(ausgang);
            ergebnis
        })
    }
}
