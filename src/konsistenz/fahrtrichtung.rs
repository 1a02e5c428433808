//! Widersprüchliche Fahrtrichtungen an Knoten zwischen Einrichtungskanten.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::abfrage::KantenAbfrage;
use super::netz_graph::knoten_punkte;
use super::repository::NetzRepository;
use super::{Konsistenzregel, KonsistenzregelGruppe, KonsistenzregelVerletzungsDetails};
use crate::core::{KantenZeile, Richtung, WktReader};

pub struct FahrtrichtungKonfliktRegel {
    repository: Arc<dyn NetzRepository>,
    reader: WktReader,
}

impl FahrtrichtungKonfliktRegel {
    pub const VERLETZUNGS_TYP: &'static str = "FAHRTRICHTUNG_KONFLIKT";

    pub fn new(repository: Arc<dyn NetzRepository>, reader: WktReader) -> Self {
        Self { repository, reader }
    }
}

/// Befahrbare Richtung als (Start, Ziel); `None` für Zweirichtungskanten
fn gerichtet(kante: &KantenZeile) -> Option<(u64, u64)> {
    match kante.attribute.fahrtrichtung() {
        Richtung::InRichtung => Some((kante.von_knoten_id, kante.nach_knoten_id)),
        Richtung::GegenRichtung => Some((kante.nach_knoten_id, kante.von_knoten_id)),
        Richtung::BeideRichtungen | Richtung::Unbekannt => None,
    }
}

impl Konsistenzregel for FahrtrichtungKonfliktRegel {
    fn pruefen(&self) -> anyhow::Result<Vec<KonsistenzregelVerletzungsDetails>> {
        let treffer = self
            .repository
            .lade_kanten(&KantenAbfrage::alle().nur_einrichtung())?;

        let mut eingehend: BTreeMap<u64, usize> = BTreeMap::new();
        let mut ausgehend: BTreeMap<u64, usize> = BTreeMap::new();
        for (start, ziel) in treffer.iter().filter_map(|t| gerichtet(&t.kante)) {
            *ausgehend.entry(start).or_default() += 1;
            *eingehend.entry(ziel).or_default() += 1;
        }

        let konflikte: BTreeSet<u64> = eingehend
            .iter()
            .chain(ausgehend.iter())
            .filter(|&(_, &anzahl)| anzahl > 1)
            .map(|(&id, _)| id)
            .collect();
        if konflikte.is_empty() {
            return Ok(Vec::new());
        }

        let punkte = knoten_punkte(&self.repository.lade_knoten()?, &self.reader);
        let mut verletzungen = Vec::new();
        for knoten_id in konflikte {
            let Some(punkt) = punkte.get(&knoten_id) else {
                log::warn!(
                    "{}: Knoten {} ohne lesbare Geometrie, übersprungen",
                    Self::VERLETZUNGS_TYP,
                    knoten_id
                );
                continue;
            };
            let ein = eingehend.get(&knoten_id).copied().unwrap_or(0);
            let aus = ausgehend.get(&knoten_id).copied().unwrap_or(0);
            verletzungen.push(KonsistenzregelVerletzungsDetails {
                position: punkt.clone(),
                originale_geometrie: None,
                beschreibung: format!(
                    "Widersprüchliche Fahrtrichtung: {} Einrichtungskanten führen in den Knoten hinein, {} heraus",
                    ein, aus
                ),
                identity: knoten_id.to_string(),
            });
        }
        Ok(verletzungen)
    }

    fn verletzungs_typ(&self) -> &'static str {
        Self::VERLETZUNGS_TYP
    }

    fn titel(&self) -> &'static str {
        "Konflikt in der Fahrtrichtung"
    }

    fn gruppe(&self) -> KonsistenzregelGruppe {
        KonsistenzregelGruppe::Topologie
    }
}
