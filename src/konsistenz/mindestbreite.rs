//! Mindestbreiten je Ausbaustandard, Führungskategorie und Richtungstyp.
//!
//! Jede ausgewertete Kantenseite mit Breite und bewertbarer Führung wird gegen
//! den strengsten Wert aller Standards der Kante geprüft.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::abfrage::KantenAbfrage;
use super::netz_graph::kanten_geometrie;
use super::repository::NetzRepository;
use super::{Konsistenzregel, KonsistenzregelGruppe, KonsistenzregelVerletzungsDetails};
use crate::core::{FuehrungsKategorie, IstStandard, Richtung, WktReader};
use crate::shared::format_meter;

/// Ein- oder Zweirichtungsbetrieb einer Kantenseite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RichtungsTyp {
    Einrichtung,
    Zweirichtung,
}

impl RichtungsTyp {
    /// Unbekannte Richtung wird wie Einrichtung behandelt (mildere Schwelle)
    pub fn aus_richtung(richtung: Richtung) -> Self {
        match richtung {
            Richtung::BeideRichtungen => Self::Zweirichtung,
            Richtung::InRichtung | Richtung::GegenRichtung | Richtung::Unbekannt => {
                Self::Einrichtung
            }
        }
    }
}

/// Ein Tabelleneintrag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindestbreitenEintrag {
    pub standard: IstStandard,
    pub fuehrung: FuehrungsKategorie,
    pub richtung: RichtungsTyp,
    /// Meter
    pub mindestbreite: f64,
}

/// Konfigurierbare Mindestbreiten; fehlende Kombinationen werden nicht geprüft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindestbreitenTabelle {
    #[serde(default)]
    pub eintraege: Vec<MindestbreitenEintrag>,
}

/// (Standard, Führung, Einrichtung, Zweirichtung)
const STANDARD_TABELLE: &[(IstStandard, FuehrungsKategorie, f64, Option<f64>)] = &[
    (IstStandard::Basisstandard, FuehrungsKategorie::Radweg, 1.6, Some(2.0)),
    (IstStandard::Basisstandard, FuehrungsKategorie::GemeinsamerGehRadweg, 2.0, Some(2.5)),
    (IstStandard::Basisstandard, FuehrungsKategorie::Radfahrstreifen, 1.5, None),
    (IstStandard::Basisstandard, FuehrungsKategorie::Schutzstreifen, 1.25, None),
    (IstStandard::StartstandardRadnetz, FuehrungsKategorie::Radweg, 2.0, Some(2.5)),
    (IstStandard::StartstandardRadnetz, FuehrungsKategorie::GemeinsamerGehRadweg, 2.5, Some(2.5)),
    (IstStandard::StartstandardRadnetz, FuehrungsKategorie::Radfahrstreifen, 1.85, None),
    (IstStandard::StartstandardRadnetz, FuehrungsKategorie::Schutzstreifen, 1.5, None),
    (IstStandard::ZielstandardRadnetz, FuehrungsKategorie::Radweg, 2.0, Some(3.0)),
    (IstStandard::ZielstandardRadnetz, FuehrungsKategorie::GemeinsamerGehRadweg, 2.5, Some(3.0)),
    (IstStandard::ZielstandardRadnetz, FuehrungsKategorie::Radfahrstreifen, 2.0, None),
    (IstStandard::ZielstandardRadnetz, FuehrungsKategorie::Schutzstreifen, 1.5, None),
    (IstStandard::Radschnellverbindung, FuehrungsKategorie::Radweg, 3.0, Some(4.0)),
    (IstStandard::Radschnellverbindung, FuehrungsKategorie::Radfahrstreifen, 3.0, None),
    (IstStandard::Radvorrangrouten, FuehrungsKategorie::Radweg, 2.0, Some(3.0)),
    (IstStandard::Radvorrangrouten, FuehrungsKategorie::GemeinsamerGehRadweg, 2.5, Some(3.0)),
    (IstStandard::Radvorrangrouten, FuehrungsKategorie::Radfahrstreifen, 2.0, None),
];

impl Default for MindestbreitenTabelle {
    fn default() -> Self {
        let mut eintraege = Vec::with_capacity(STANDARD_TABELLE.len() * 2);
        for &(standard, fuehrung, einrichtung, zweirichtung) in STANDARD_TABELLE {
            eintraege.push(MindestbreitenEintrag {
                standard,
                fuehrung,
                richtung: RichtungsTyp::Einrichtung,
                mindestbreite: einrichtung,
            });
            if let Some(zweirichtung) = zweirichtung {
                eintraege.push(MindestbreitenEintrag {
                    standard,
                    fuehrung,
                    richtung: RichtungsTyp::Zweirichtung,
                    mindestbreite: zweirichtung,
                });
            }
        }
        Self { eintraege }
    }
}

impl MindestbreitenTabelle {
    pub fn mindestbreite(
        &self,
        standard: IstStandard,
        fuehrung: FuehrungsKategorie,
        richtung: RichtungsTyp,
    ) -> Option<f64> {
        self.eintraege
            .iter()
            .find(|e| e.standard == standard && e.fuehrung == fuehrung && e.richtung == richtung)
            .map(|e| e.mindestbreite)
    }

    /// Höchste Mindestbreite über alle Standards, mit dem Standard, der sie fordert
    pub fn strengste(
        &self,
        standards: &[IstStandard],
        fuehrung: FuehrungsKategorie,
        richtung: RichtungsTyp,
    ) -> Option<(IstStandard, f64)> {
        standards
            .iter()
            .filter_map(|&s| self.mindestbreite(s, fuehrung, richtung).map(|m| (s, m)))
            .fold(None, |beste: Option<(IstStandard, f64)>, kandidat| match beste {
                Some(b) if b.1 >= kandidat.1 => Some(b),
                _ => Some(kandidat),
            })
    }
}

pub struct MindestbreiteRegel {
    repository: Arc<dyn NetzRepository>,
    reader: WktReader,
    tabelle: MindestbreitenTabelle,
}

impl MindestbreiteRegel {
    pub const VERLETZUNGS_TYP: &'static str = "MINDESTBREITE";

    pub fn new(
        repository: Arc<dyn NetzRepository>,
        reader: WktReader,
        tabelle: MindestbreitenTabelle,
    ) -> Self {
        Self {
            repository,
            reader,
            tabelle,
        }
    }
}

impl Konsistenzregel for MindestbreiteRegel {
    fn pruefen(&self) -> anyhow::Result<Vec<KonsistenzregelVerletzungsDetails>> {
        let abfrage = KantenAbfrage::alle().nur_mit_standard().nur_mit_breite();
        let treffer = self.repository.lade_kanten(&abfrage)?;

        let mut verletzungen = Vec::new();
        for kante in treffer.iter().map(|t| &t.kante) {
            let attribute = &kante.attribute;
            let mut geometrie = None;

            for (seite, werte) in attribute.seiten() {
                let (Some(breite), Some(kategorie)) =
                    (werte.breite, werte.radverkehrsfuehrung.breiten_kategorie())
                else {
                    continue;
                };
                let richtung = RichtungsTyp::aus_richtung(werte.fahrtrichtung);
                let Some((standard, soll)) =
                    self.tabelle.strengste(&attribute.ist_standards, kategorie, richtung)
                else {
                    continue;
                };
                if breite >= soll {
                    continue;
                }

                if geometrie.is_none() {
                    geometrie = kanten_geometrie(kante, &self.reader);
                }
                let Some(linie) = geometrie.as_ref() else {
                    break;
                };
                let Some(position) = linie.representative_point() else {
                    log::warn!("{}: Kante {} hat eine leere Geometrie", Self::VERLETZUNGS_TYP, kante.id);
                    break;
                };

                let seite_text = seite
                    .map(|s| format!(" auf der Seite {}", s.anzeigename()))
                    .unwrap_or_default();
                verletzungen.push(KonsistenzregelVerletzungsDetails {
                    position,
                    originale_geometrie: Some(linie.clone()),
                    beschreibung: format!(
                        "Die Breite von {}{} unterschreitet die Mindestbreite von {} ({})",
                        format_meter(breite),
                        seite_text,
                        format_meter(soll),
                        standard.anzeigename()
                    ),
                    identity: kante.id.to_string(),
                });
            }
        }
        Ok(verletzungen)
    }

    fn verletzungs_typ(&self) -> &'static str {
        Self::VERLETZUNGS_TYP
    }

    fn titel(&self) -> &'static str {
        "Mindestbreite unterschritten"
    }

    fn gruppe(&self) -> KonsistenzregelGruppe {
        KonsistenzregelGruppe::Attribute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KantenAttribute, KantenZeile, Radverkehrsfuehrung, SRID_UTM32};
    use crate::konsistenz::InMemoryNetzRepository;

    fn kante(id: u64, attribute: KantenAttribute) -> KantenZeile {
        KantenZeile {
            id,
            von_knoten_id: 1,
            nach_knoten_id: 2,
            geometrie: "LINESTRING (500000 5400000, 500100 5400000)".to_string(),
            quelle: Default::default(),
            attribute,
        }
    }

    fn regel(kanten: Vec<KantenZeile>) -> MindestbreiteRegel {
        let mut netz = InMemoryNetzRepository::new();
        kanten.into_iter().for_each(|k| netz.add_kante(k));
        MindestbreiteRegel::new(
            Arc::new(netz),
            WktReader::new(SRID_UTM32),
            MindestbreitenTabelle::default(),
        )
    }

    fn radweg(breite: f64, richtung: Richtung, standards: Vec<IstStandard>) -> KantenAttribute {
        let mut attribute = KantenAttribute {
            ist_standards: standards,
            ..Default::default()
        };
        attribute.links.radverkehrsfuehrung = Radverkehrsfuehrung::SonderwegRadweg;
        attribute.links.breite = Some(breite);
        attribute.links.fahrtrichtung = richtung;
        attribute
    }

    #[test]
    fn default_table_lookup() {
        let tabelle = MindestbreitenTabelle::default();

        assert_eq!(
            tabelle.mindestbreite(
                IstStandard::Basisstandard,
                FuehrungsKategorie::Radweg,
                RichtungsTyp::Zweirichtung
            ),
            Some(2.0)
        );
        assert_eq!(
            tabelle.mindestbreite(
                IstStandard::Basisstandard,
                FuehrungsKategorie::Schutzstreifen,
                RichtungsTyp::Zweirichtung
            ),
            None
        );
    }

    #[test]
    fn strictest_standard_wins() {
        let tabelle = MindestbreitenTabelle::default();

        let strengste = tabelle.strengste(
            &[IstStandard::Basisstandard, IstStandard::ZielstandardRadnetz],
            FuehrungsKategorie::Radweg,
            RichtungsTyp::Zweirichtung,
        );

        assert_eq!(strengste, Some((IstStandard::ZielstandardRadnetz, 3.0)));
    }

    #[test]
    fn too_narrow_side_is_reported_with_both_widths() {
        let regel = regel(vec![kante(
            7,
            radweg(1.5, Richtung::BeideRichtungen, vec![IstStandard::Basisstandard]),
        )]);

        let verletzungen = regel.pruefen().expect("Prüfung erwartet");

        assert_eq!(verletzungen.len(), 1);
        let verletzung = &verletzungen[0];
        assert!(verletzung.beschreibung.contains("1,50"));
        assert!(verletzung.beschreibung.contains("2,00"));
        assert_eq!(verletzung.identity, "7");
        assert_eq!(verletzung.position.type_name(), "Point");
        assert_eq!(
            verletzung.position.first_coord().map(|c| c.x),
            Some(500_050.0)
        );
    }

    #[test]
    fn unknown_direction_uses_one_way_threshold() {
        let regel = regel(vec![kante(
            8,
            radweg(1.7, Richtung::Unbekannt, vec![IstStandard::Basisstandard]),
        )]);

        assert!(regel.pruefen().expect("Prüfung erwartet").is_empty());
    }

    #[test]
    fn two_sided_edge_reports_each_side() {
        let mut attribute = radweg(1.0, Richtung::InRichtung, vec![IstStandard::Basisstandard]);
        attribute.zweiseitig = true;
        attribute.rechts = attribute.links.clone();
        let regel = regel(vec![kante(9, attribute)]);

        let verletzungen = regel.pruefen().expect("Prüfung erwartet");

        assert_eq!(verletzungen.len(), 2);
        assert!(verletzungen[0].beschreibung.contains("Seite links"));
        assert!(verletzungen[1].beschreibung.contains("Seite rechts"));
    }

    #[test]
    fn edges_without_standard_or_width_are_ignored() {
        let mut ohne_breite = radweg(1.0, Richtung::InRichtung, vec![IstStandard::Basisstandard]);
        ohne_breite.links.breite = None;
        let regel = regel(vec![
            kante(1, radweg(1.0, Richtung::InRichtung, Vec::new())),
            kante(2, ohne_breite),
        ]);

        assert!(regel.pruefen().expect("Prüfung erwartet").is_empty());
    }

    #[test]
    fn broken_geometry_is_skipped() {
        let mut zeile = kante(3, radweg(1.0, Richtung::InRichtung, vec![IstStandard::Basisstandard]));
        zeile.geometrie = "LINESTRING (".to_string();
        let regel = regel(vec![
            zeile,
            kante(4, radweg(1.0, Richtung::InRichtung, vec![IstStandard::Basisstandard])),
        ]);

        let verletzungen = regel.pruefen().expect("Prüfung erwartet");

        assert_eq!(verletzungen.len(), 1);
        assert_eq!(verletzungen[0].identity, "4");
    }
}
