//! RadNETZ-Start- und Zielstandard für Führungen im Mischverkehr.
//!
//! Je nach zulässiger Höchstgeschwindigkeit gilt eine andere DTV-Grenze.
//! Die Stufen werden in der Reihenfolge der Tabelle geprüft.

use std::sync::Arc;

use super::abfrage::{KantenAbfrage, StandardStufe};
use super::netz_graph::kanten_geometrie;
use super::repository::NetzRepository;
use super::{Konsistenzregel, KonsistenzregelGruppe, KonsistenzregelVerletzungsDetails};
use crate::core::{Netzklasse, Radverkehrsfuehrung, WktReader};

/// Welcher Standard geprüft wird
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadnetzStandard {
    Startstandard,
    Zielstandard,
}

impl RadnetzStandard {
    /// DTV-Grenzen für bis 30, 31 bis 50 und über 50 km/h
    fn dtv_schwellen(self) -> [u32; 3] {
        match self {
            Self::Startstandard => [8000, 5000, 2500],
            Self::Zielstandard => [4000, 2000, 0],
        }
    }

    pub fn stufen(self) -> Vec<StandardStufe> {
        let [bis30, bis50, ueber50] = self.dtv_schwellen();
        vec![
            StandardStufe::new(
                format!("bis 30 km/h bei mehr als {} Kfz/24h", bis30),
                0,
                Some(30),
                bis30,
            ),
            StandardStufe::new(
                format!("40 bis 50 km/h bei mehr als {} Kfz/24h", bis50),
                31,
                Some(50),
                bis50,
            ),
            StandardStufe::new(
                format!("über 50 km/h bei mehr als {} Kfz/24h", ueber50),
                51,
                None,
                ueber50,
            ),
        ]
    }

    /// RadNETZ-Kanten im Mischverkehr mit Stufen-Kaskade
    pub fn abfrage(self) -> KantenAbfrage {
        KantenAbfrage::alle()
            .mit_netzklassen(&Netzklasse::RADNETZ)
            .mit_fuehrungen(&Radverkehrsfuehrung::MISCHVERKEHR)
            .mit_stufen(self.stufen())
    }

    pub fn verletzungs_typ(self) -> &'static str {
        match self {
            Self::Startstandard => "RADNETZ_STARTSTANDARD",
            Self::Zielstandard => "RADNETZ_ZIELSTANDARD",
        }
    }

    pub fn bezeichnung(self) -> &'static str {
        match self {
            Self::Startstandard => "Startstandard",
            Self::Zielstandard => "Zielstandard",
        }
    }
}

pub struct RadnetzStandardRegel {
    repository: Arc<dyn NetzRepository>,
    reader: WktReader,
    standard: RadnetzStandard,
}

impl RadnetzStandardRegel {
    pub fn new(
        repository: Arc<dyn NetzRepository>,
        reader: WktReader,
        standard: RadnetzStandard,
    ) -> Self {
        Self {
            repository,
            reader,
            standard,
        }
    }
}

impl Konsistenzregel for RadnetzStandardRegel {
    fn pruefen(&self) -> anyhow::Result<Vec<KonsistenzregelVerletzungsDetails>> {
        let treffer = self.repository.lade_kanten(&self.standard.abfrage())?;

        let mut verletzungen = Vec::with_capacity(treffer.len());
        for t in &treffer {
            let Some(stufe) = t.verletzte_stufe.as_deref() else {
                continue;
            };
            let Some(geometrie) = kanten_geometrie(&t.kante, &self.reader) else {
                continue;
            };
            let Some(position) = geometrie.representative_point() else {
                log::warn!(
                    "{}: Kante {} hat eine leere Geometrie",
                    self.standard.verletzungs_typ(),
                    t.kante.id
                );
                continue;
            };

            verletzungen.push(KonsistenzregelVerletzungsDetails {
                position,
                originale_geometrie: Some(geometrie),
                beschreibung: format!(
                    "Mischverkehr erfüllt den {} nicht: {}",
                    self.standard.bezeichnung(),
                    stufe
                ),
                identity: t.kante.id.to_string(),
            });
        }
        Ok(verletzungen)
    }

    fn verletzungs_typ(&self) -> &'static str {
        self.standard.verletzungs_typ()
    }

    fn titel(&self) -> &'static str {
        match self.standard {
            RadnetzStandard::Startstandard => "RadNETZ-Startstandard nicht erfüllt",
            RadnetzStandard::Zielstandard => "RadNETZ-Zielstandard nicht erfüllt",
        }
    }

    fn gruppe(&self) -> KonsistenzregelGruppe {
        KonsistenzregelGruppe::RadNetz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Hoechstgeschwindigkeit, KantenAttribute, KantenZeile, SRID_UTM32};
    use crate::konsistenz::InMemoryNetzRepository;

    fn mischverkehr(
        id: u64,
        kmh: Hoechstgeschwindigkeit,
        dtv: Option<u32>,
        klasse: Netzklasse,
    ) -> KantenZeile {
        let mut attribute = KantenAttribute {
            netzklassen: vec![klasse],
            hoechstgeschwindigkeit: kmh,
            dtv_kfz: dtv,
            ..Default::default()
        };
        attribute.links.radverkehrsfuehrung = Radverkehrsfuehrung::PkwMischverkehrMitTempo50;
        KantenZeile {
            id,
            von_knoten_id: 1,
            nach_knoten_id: 2,
            geometrie: "LINESTRING (0 0, 10 0)".to_string(),
            quelle: Default::default(),
            attribute,
        }
    }

    fn pruefe(standard: RadnetzStandard, kanten: Vec<KantenZeile>) -> Vec<KonsistenzregelVerletzungsDetails> {
        let mut netz = InMemoryNetzRepository::new();
        kanten.into_iter().for_each(|k| netz.add_kante(k));
        RadnetzStandardRegel::new(Arc::new(netz), WktReader::new(SRID_UTM32), standard)
            .pruefen()
            .expect("Prüfung erwartet")
    }

    #[test]
    fn start_standard_flags_busy_tempo_50() {
        let verletzungen = pruefe(
            RadnetzStandard::Startstandard,
            vec![
                mischverkehr(1, Hoechstgeschwindigkeit::Max50, Some(5001), Netzklasse::RadnetzAlltag),
                mischverkehr(2, Hoechstgeschwindigkeit::Max50, Some(5000), Netzklasse::RadnetzAlltag),
            ],
        );

        assert_eq!(verletzungen.len(), 1);
        assert_eq!(verletzungen[0].identity, "1");
        assert!(verletzungen[0].beschreibung.contains("40 bis 50 km/h"));
        assert!(verletzungen[0].beschreibung.contains("Startstandard"));
    }

    #[test]
    fn target_standard_flags_any_traffic_above_50() {
        let verletzungen = pruefe(
            RadnetzStandard::Zielstandard,
            vec![mischverkehr(3, Hoechstgeschwindigkeit::Max70, Some(1), Netzklasse::RadnetzFreizeit)],
        );

        assert_eq!(verletzungen.len(), 1);
        assert!(verletzungen[0].beschreibung.contains("über 50 km/h"));
    }

    #[test]
    fn unknown_dtv_never_violates() {
        let verletzungen = pruefe(
            RadnetzStandard::Zielstandard,
            vec![mischverkehr(4, Hoechstgeschwindigkeit::Max70, None, Netzklasse::RadnetzAlltag)],
        );

        assert!(verletzungen.is_empty());
    }

    #[test]
    fn non_radnetz_edges_are_ignored() {
        let verletzungen = pruefe(
            RadnetzStandard::Startstandard,
            vec![mischverkehr(5, Hoechstgeschwindigkeit::Max30, Some(50_000), Netzklasse::KreisnetzAlltag)],
        );

        assert!(verletzungen.is_empty());
    }
}
