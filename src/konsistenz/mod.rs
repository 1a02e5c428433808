//! Konsistenzregeln über dem Radnetz.
//!
//! Jede Regel liest über ein [`NetzRepository`] und liefert Verletzungen mit
//! Position. Die [`KonsistenzregelRegistry`] führt die Regeln aus; ein Fehler
//! in einer Regel bricht die übrigen nicht ab.

pub mod abfrage;
pub mod fahrtrichtung;
pub mod fehlende_vernetzung;
pub mod mindestbreite;
mod netz_graph;
pub mod netzklassen_luecke;
pub mod radnetz_standard;
pub mod repository;

use std::sync::Arc;

use anyhow::bail;
use indexmap::IndexMap;
use regex::Regex;

use crate::core::{Geometry, WktReader, SRID_UTM32};
use crate::export::ExportData;
use crate::shared::RadvisOptions;

pub use abfrage::{KantenAbfrage, ParametrisierteAbfrage, SqlParameter, StandardStufe};
pub use fahrtrichtung::FahrtrichtungKonfliktRegel;
pub use fehlende_vernetzung::FehlendeVernetzungRegel;
pub use mindestbreite::{
    MindestbreiteRegel, MindestbreitenEintrag, MindestbreitenTabelle, RichtungsTyp,
};
pub use netzklassen_luecke::NetzklassenLueckeRegel;
pub use radnetz_standard::{RadnetzStandard, RadnetzStandardRegel};
pub use repository::{InMemoryNetzRepository, KantenTreffer, NetzRepository};

/// Eine gefundene Verletzung
#[derive(Debug, Clone, PartialEq)]
pub struct KonsistenzregelVerletzungsDetails {
    /// Markierungspunkt in der Karte
    pub position: Geometry,
    /// Betroffene Kante, falls vorhanden
    pub originale_geometrie: Option<Geometry>,
    pub beschreibung: String,
    /// Stabiler Schlüssel (Knoten- oder Kanten-ID)
    pub identity: String,
}

/// Gruppierung der Regeln in der Oberfläche
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KonsistenzregelGruppe {
    RadNetz,
    Netzklassen,
    Attribute,
    Topologie,
}

impl KonsistenzregelGruppe {
    pub fn anzeigename(self) -> &'static str {
        match self {
            Self::RadNetz => "RadNETZ",
            Self::Netzklassen => "Netzklassen",
            Self::Attribute => "Attribute",
            Self::Topologie => "Topologie",
        }
    }
}

/// Eine Prüfregel
pub trait Konsistenzregel {
    fn pruefen(&self) -> anyhow::Result<Vec<KonsistenzregelVerletzungsDetails>>;

    /// Eindeutige ID aus Großbuchstaben, Ziffern und `_`
    fn verletzungs_typ(&self) -> &'static str;

    fn titel(&self) -> &'static str;

    fn gruppe(&self) -> KonsistenzregelGruppe;
}

/// Verletzungen einer einzelnen Regel
#[derive(Debug, Clone, PartialEq)]
pub struct RegelErgebnis {
    pub verletzungs_typ: &'static str,
    pub titel: &'static str,
    pub gruppe: KonsistenzregelGruppe,
    pub verletzungen: Vec<KonsistenzregelVerletzungsDetails>,
}

/// Gesamtergebnis eines Prüflaufs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KonsistenzpruefungsErgebnis {
    pub ergebnisse: Vec<RegelErgebnis>,
    /// (Verletzungstyp, Fehlermeldung) der fehlgeschlagenen Regeln
    pub fehler: Vec<(String, String)>,
}

impl KonsistenzpruefungsErgebnis {
    pub fn anzahl_verletzungen(&self) -> usize {
        self.ergebnisse.iter().map(|e| e.verletzungen.len()).sum()
    }

    pub fn ist_fehlerfrei(&self) -> bool {
        self.fehler.is_empty()
    }

    /// Wandelt alle Verletzungen in Export-Datensätze (Geometrie = Position)
    pub fn to_export_data(&self) -> Vec<ExportData> {
        let mut data = Vec::with_capacity(self.anzahl_verletzungen());
        for ergebnis in &self.ergebnisse {
            for verletzung in &ergebnis.verletzungen {
                let mut properties = IndexMap::new();
                properties.insert("Typ".to_string(), ergebnis.verletzungs_typ.to_string());
                properties.insert("Titel".to_string(), ergebnis.titel.to_string());
                properties.insert(
                    "Gruppe".to_string(),
                    ergebnis.gruppe.anzeigename().to_string(),
                );
                properties.insert("Beschreibung".to_string(), verletzung.beschreibung.clone());
                properties.insert("Identity".to_string(), verletzung.identity.clone());
                data.push(ExportData::new(verletzung.position.clone(), properties));
            }
        }
        data
    }
}

/// Strategie-Tabelle `Verletzungstyp → Regel`, in Registrierungsreihenfolge
pub struct KonsistenzregelRegistry {
    regeln: IndexMap<&'static str, Box<dyn Konsistenzregel>>,
    id_muster: Regex,
}

impl Default for KonsistenzregelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KonsistenzregelRegistry {
    pub fn new() -> Self {
        Self {
            regeln: IndexMap::new(),
            // Literal-Pattern, kann nicht fehlschlagen
            id_muster: Regex::new(r"^[A-Z0-9_]+$")
                .unwrap_or_else(|e| unreachable!("ID-Regex ungültig: {}", e)),
        }
    }

    /// Alle Standardregeln über einem Repository
    pub fn standard(
        repository: Arc<dyn NetzRepository>,
        options: &RadvisOptions,
    ) -> anyhow::Result<Self> {
        let reader = WktReader::new(SRID_UTM32);
        let mut registry = Self::new();

        registry.registrieren(Box::new(NetzklassenLueckeRegel::radnetz(
            repository.clone(),
            reader.clone(),
        )))?;
        registry.registrieren(Box::new(NetzklassenLueckeRegel::kreisnetz(
            repository.clone(),
            reader.clone(),
        )))?;
        registry.registrieren(Box::new(NetzklassenLueckeRegel::kommunalnetz(
            repository.clone(),
            reader.clone(),
        )))?;
        registry.registrieren(Box::new(MindestbreiteRegel::new(
            repository.clone(),
            reader.clone(),
            options.mindestbreiten.clone(),
        )))?;
        registry.registrieren(Box::new(FahrtrichtungKonfliktRegel::new(
            repository.clone(),
            reader.clone(),
        )))?;
        registry.registrieren(Box::new(FehlendeVernetzungRegel::new(
            repository.clone(),
            reader.clone(),
            options.vernetzung_quelle,
            options.vernetzung_toleranz_m,
        )))?;
        for standard in [RadnetzStandard::Startstandard, RadnetzStandard::Zielstandard] {
            registry.registrieren(Box::new(RadnetzStandardRegel::new(
                repository.clone(),
                reader.clone(),
                standard,
            )))?;
        }

        Ok(registry)
    }

    /// Registriert eine Regel; ungültige oder doppelte IDs werden abgelehnt
    pub fn registrieren(&mut self, regel: Box<dyn Konsistenzregel>) -> anyhow::Result<()> {
        let typ = regel.verletzungs_typ();
        if !self.id_muster.is_match(typ) {
            bail!("Ungültiger Verletzungstyp '{}': erlaubt sind A-Z, 0-9 und _", typ);
        }
        if self.regeln.contains_key(typ) {
            bail!("Verletzungstyp '{}' ist bereits registriert", typ);
        }
        self.regeln.insert(typ, regel);
        Ok(())
    }

    pub fn regel(&self, typ: &str) -> Option<&dyn Konsistenzregel> {
        self.regeln.get(typ).map(|r| r.as_ref())
    }

    pub fn regeln(&self) -> impl Iterator<Item = &dyn Konsistenzregel> {
        self.regeln.values().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.regeln.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regeln.is_empty()
    }

    /// Führt alle Regeln aus
    pub fn pruefe_alle(&self) -> KonsistenzpruefungsErgebnis {
        self.fuehre_aus(self.regeln.values().map(|r| r.as_ref()))
    }

    /// Führt die angegebenen Regeln aus; unbekannte Typen sind ein Fehler
    pub fn pruefe(&self, typen: &[String]) -> anyhow::Result<KonsistenzpruefungsErgebnis> {
        let mut auswahl = Vec::with_capacity(typen.len());
        for typ in typen {
            match self.regel(typ) {
                Some(regel) => auswahl.push(regel),
                None => bail!("Unbekannter Verletzungstyp '{}'", typ),
            }
        }
        Ok(self.fuehre_aus(auswahl))
    }

    fn fuehre_aus<'a>(
        &self,
        regeln: impl IntoIterator<Item = &'a dyn Konsistenzregel>,
    ) -> KonsistenzpruefungsErgebnis {
        let mut ergebnis = KonsistenzpruefungsErgebnis::default();
        for regel in regeln {
            let typ = regel.verletzungs_typ();
            match regel.pruefen() {
                Ok(verletzungen) => {
                    log::info!("Regel {}: {} Verletzungen", typ, verletzungen.len());
                    ergebnis.ergebnisse.push(RegelErgebnis {
                        verletzungs_typ: typ,
                        titel: regel.titel(),
                        gruppe: regel.gruppe(),
                        verletzungen,
                    });
                }
                Err(e) => {
                    log::warn!("Regel {} fehlgeschlagen: {:#}", typ, e);
                    ergebnis.fehler.push((typ.to_string(), format!("{:#}", e)));
                }
            }
        }
        log::info!(
            "Konsistenzprüfung abgeschlossen: {} Verletzungen, {} fehlgeschlagene Regeln",
            ergebnis.anzahl_verletzungen(),
            ergebnis.fehler.len()
        );
        ergebnis
    }
}
