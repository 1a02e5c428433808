//! Fehlende Vernetzung: ein Sackgassen-Knoten liegt dicht an einer fremden Kante,
//! ist aber nicht mit ihr verbunden.
//!
//! Kandidaten liefert ein KD-Tree über den Segment-Mittelpunkten aller Kanten
//! der geprüften Quelle.

use std::collections::HashMap;
use std::sync::Arc;

use super::abfrage::KantenAbfrage;
use super::netz_graph::{kanten_geometrie, knoten_punkte, knotengrade, linienzuege};
use super::repository::NetzRepository;
use super::{Konsistenzregel, KonsistenzregelGruppe, KonsistenzregelVerletzungsDetails};
use crate::core::{xy, Geometry, KantenZeile, QuellSystem, SegmentIndex, WktReader};
use crate::shared::format_meter;

pub struct FehlendeVernetzungRegel {
    repository: Arc<dyn NetzRepository>,
    reader: WktReader,
    quelle: QuellSystem,
    toleranz: f64,
}

impl FehlendeVernetzungRegel {
    pub const VERLETZUNGS_TYP: &'static str = "FEHLENDE_VERNETZUNG";

    pub fn new(
        repository: Arc<dyn NetzRepository>,
        reader: WktReader,
        quelle: QuellSystem,
        toleranz: f64,
    ) -> Self {
        Self {
            repository,
            reader,
            quelle,
            toleranz,
        }
    }
}

/// Prüft ob `punkt` näher als `toleranz` an einem Endpunkt der Kante liegt
fn nahe_endpunkt(geometrie: &Geometry, punkt: glam::DVec2, toleranz: f64) -> bool {
    linienzuege(geometrie).iter().any(|linie| {
        [linie.0.first(), linie.0.last()]
            .into_iter()
            .flatten()
            .any(|c| xy(*c).distance(punkt) <= toleranz)
    })
}

impl Konsistenzregel for FehlendeVernetzungRegel {
    fn pruefen(&self) -> anyhow::Result<Vec<KonsistenzregelVerletzungsDetails>> {
        let treffer = self
            .repository
            .lade_kanten(&KantenAbfrage::alle().mit_quelle(self.quelle))?;

        let mut kanten: HashMap<u64, (&KantenZeile, Geometry)> = HashMap::new();
        for kante in treffer.iter().map(|t| &t.kante) {
            if let Some(geometrie) = kanten_geometrie(kante, &self.reader) {
                kanten.insert(kante.id, (kante, geometrie));
            }
        }
        let index = SegmentIndex::from_lines(
            kanten
                .iter()
                .flat_map(|(&id, (_, g))| linienzuege(g).into_iter().map(move |l| (id, l))),
        );
        log::debug!(
            "{}: {} Kanten, {} Segmente indexiert",
            Self::VERLETZUNGS_TYP,
            kanten.len(),
            index.len()
        );

        let grade = knotengrade(kanten.values().map(|(k, _)| *k));
        let mut sackgassen: Vec<u64> = grade
            .iter()
            .filter(|&(_, &grad)| grad == 1)
            .map(|(&id, _)| id)
            .collect();
        sackgassen.sort_unstable();
        if sackgassen.is_empty() {
            return Ok(Vec::new());
        }

        let punkte = knoten_punkte(&self.repository.lade_knoten()?, &self.reader);
        let mut verletzungen = Vec::new();
        for knoten_id in sackgassen {
            let Some(punkt) = punkte.get(&knoten_id) else {
                continue;
            };
            let Some(p) = punkt.first_coord().map(xy) else {
                continue;
            };

            let naechste = index.within_radius(p, self.toleranz).into_iter().find(|m| {
                kanten.get(&m.owner_id).is_some_and(|(kante, geometrie)| {
                    !kante.beruehrt(knoten_id) && !nahe_endpunkt(geometrie, p, self.toleranz)
                })
            });
            let Some(naechste) = naechste else {
                continue;
            };

            verletzungen.push(KonsistenzregelVerletzungsDetails {
                position: punkt.clone(),
                originale_geometrie: kanten.get(&naechste.owner_id).map(|(_, g)| g.clone()),
                beschreibung: format!(
                    "Der Knoten endet {} neben Kante {}, ist aber nicht mit ihr verbunden",
                    format_meter(naechste.distance),
                    naechste.owner_id
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
        "Fehlende Vernetzung"
    }

    fn gruppe(&self) -> KonsistenzregelGruppe {
        KonsistenzregelGruppe::Topologie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KnotenZeile, SRID_UTM32};
    use crate::konsistenz::InMemoryNetzRepository;

    fn kante(id: u64, von: u64, nach: u64, wkt: &str, quelle: QuellSystem) -> KantenZeile {
        KantenZeile {
            id,
            von_knoten_id: von,
            nach_knoten_id: nach,
            geometrie: wkt.to_string(),
            quelle,
            attribute: Default::default(),
        }
    }

    fn knoten(id: u64, x: f64, y: f64) -> KnotenZeile {
        KnotenZeile {
            id,
            punkt: format!("POINT ({} {})", x, y),
        }
    }

    /// Hauptkante 1-2 entlang der x-Achse, Stichkante 3-4 endet bei (50, `abstand`)
    fn netz(abstand: f64, quelle_stich: QuellSystem) -> InMemoryNetzRepository {
        let mut netz = InMemoryNetzRepository::new();
        netz.add_knoten(knoten(1, 0.0, 0.0));
        netz.add_knoten(knoten(2, 100.0, 0.0));
        netz.add_knoten(knoten(3, 50.0, 50.0));
        netz.add_knoten(knoten(4, 50.0, abstand));
        netz.add_kante(kante(10, 1, 2, "LINESTRING (0 0, 100 0)", QuellSystem::Dlm));
        netz.add_kante(kante(
            11,
            3,
            4,
            &format!("LINESTRING (50 50, 50 {})", abstand),
            quelle_stich,
        ));
        netz
    }

    fn regel(netz: InMemoryNetzRepository) -> FehlendeVernetzungRegel {
        FehlendeVernetzungRegel::new(
            Arc::new(netz),
            WktReader::new(SRID_UTM32),
            QuellSystem::Dlm,
            1.0,
        )
    }

    #[test]
    fn dangling_node_near_edge_is_flagged() {
        let verletzungen = regel(netz(0.4, QuellSystem::Dlm))
            .pruefen()
            .expect("Prüfung erwartet");

        assert_eq!(verletzungen.len(), 1);
        assert_eq!(verletzungen[0].identity, "4");
        assert!(verletzungen[0].beschreibung.contains("0,40 m"));
        assert!(verletzungen[0].beschreibung.contains("Kante 10"));
    }

    #[test]
    fn node_beyond_tolerance_is_not_flagged() {
        let verletzungen = regel(netz(5.0, QuellSystem::Dlm))
            .pruefen()
            .expect("Prüfung erwartet");

        assert!(verletzungen.is_empty());
    }

    #[test]
    fn other_sources_are_ignored() {
        let verletzungen = regel(netz(0.4, QuellSystem::Osm))
            .pruefen()
            .expect("Prüfung erwartet");

        assert!(verletzungen.is_empty());
    }

    #[test]
    fn node_near_edge_end_is_not_flagged() {
        let mut netz = InMemoryNetzRepository::new();
        netz.add_knoten(knoten(1, 0.0, 0.0));
        netz.add_knoten(knoten(2, 100.0, 0.0));
        netz.add_knoten(knoten(3, 100.5, 0.0));
        netz.add_knoten(knoten(4, 200.0, 0.0));
        netz.add_kante(kante(10, 1, 2, "LINESTRING (0 0, 100 0)", QuellSystem::Dlm));
        netz.add_kante(kante(11, 3, 4, "LINESTRING (100.5 0, 200 0)", QuellSystem::Dlm));

        assert!(regel(netz).pruefen().expect("Prüfung erwartet").is_empty());
    }
}
