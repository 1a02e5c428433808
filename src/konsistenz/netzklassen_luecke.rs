//! Lücken in Netzklassen: das Netz geht an einem Knoten weiter, die Klasse nicht.

use std::sync::Arc;

use super::abfrage::KantenAbfrage;
use super::netz_graph::{kanten_geometrie, knoten_punkte, knotengrade};
use super::repository::NetzRepository;
use super::{Konsistenzregel, KonsistenzregelGruppe, KonsistenzregelVerletzungsDetails};
use crate::core::{Netzklasse, WktReader};

/// Eine Regel für eine Familie von Netzklassen (RadNETZ, Kreisnetz, Kommunalnetz)
pub struct NetzklassenLueckeRegel {
    repository: Arc<dyn NetzRepository>,
    reader: WktReader,
    netzklassen: &'static [Netzklasse],
    verletzungs_typ: &'static str,
    titel: &'static str,
    netzname: &'static str,
}

impl NetzklassenLueckeRegel {
    pub const RADNETZ_LUECKE: &'static str = "RADNETZ_LUECKE";
    pub const KREISNETZ_LUECKE: &'static str = "KREISNETZ_LUECKE";
    pub const KOMMUNALNETZ_LUECKE: &'static str = "KOMMUNALNETZ_LUECKE";

    pub fn radnetz(repository: Arc<dyn NetzRepository>, reader: WktReader) -> Self {
        Self {
            repository,
            reader,
            netzklassen: &Netzklasse::RADNETZ,
            verletzungs_typ: Self::RADNETZ_LUECKE,
            titel: "Lücke im RadNETZ",
            netzname: "RadNETZ",
        }
    }

    pub fn kreisnetz(repository: Arc<dyn NetzRepository>, reader: WktReader) -> Self {
        Self {
            repository,
            reader,
            netzklassen: &Netzklasse::KREISNETZ,
            verletzungs_typ: Self::KREISNETZ_LUECKE,
            titel: "Lücke im Kreisnetz",
            netzname: "Kreisnetz",
        }
    }

    pub fn kommunalnetz(repository: Arc<dyn NetzRepository>, reader: WktReader) -> Self {
        Self {
            repository,
            reader,
            netzklassen: &Netzklasse::KOMMUNALNETZ,
            verletzungs_typ: Self::KOMMUNALNETZ_LUECKE,
            titel: "Lücke im Kommunalnetz",
            netzname: "Kommunalnetz",
        }
    }
}

impl Konsistenzregel for NetzklassenLueckeRegel {
    fn pruefen(&self) -> anyhow::Result<Vec<KonsistenzregelVerletzungsDetails>> {
        let alle = self.repository.lade_kanten(&KantenAbfrage::alle())?;
        let klasse = self
            .repository
            .lade_kanten(&KantenAbfrage::alle().mit_netzklassen(self.netzklassen))?;
        let knoten = self.repository.lade_knoten()?;

        let grade_netz = knotengrade(alle.iter().map(|t| &t.kante));
        let grade_klasse = knotengrade(klasse.iter().map(|t| &t.kante));
        let punkte = knoten_punkte(&knoten, &self.reader);

        let mut enden: Vec<u64> = grade_klasse
            .iter()
            .filter(|&(id, &grad)| grad == 1 && grade_netz.get(id).copied().unwrap_or(0) >= 2)
            .map(|(&id, _)| id)
            .collect();
        enden.sort_unstable();

        let mut verletzungen = Vec::new();
        for knoten_id in enden {
            let Some(punkt) = punkte.get(&knoten_id) else {
                log::warn!(
                    "{}: Knoten {} ohne lesbare Geometrie, übersprungen",
                    self.verletzungs_typ,
                    knoten_id
                );
                continue;
            };
            let originale_geometrie = klasse
                .iter()
                .find(|t| t.kante.beruehrt(knoten_id))
                .and_then(|t| kanten_geometrie(&t.kante, &self.reader));

            verletzungen.push(KonsistenzregelVerletzungsDetails {
                position: punkt.clone(),
                originale_geometrie,
                beschreibung: format!(
                    "Das {} endet an diesem Knoten, das übrige Netz führt jedoch weiter",
                    self.netzname
                ),
                identity: knoten_id.to_string(),
            });
        }
        Ok(verletzungen)
    }

    fn verletzungs_typ(&self) -> &'static str {
        self.verletzungs_typ
    }

    fn titel(&self) -> &'static str {
        self.titel
    }

    fn gruppe(&self) -> KonsistenzregelGruppe {
        KonsistenzregelGruppe::Netzklassen
    }
}
