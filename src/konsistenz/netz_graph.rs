//! Gemeinsame Helfer der Topologie-Regeln: Geometrien lesen, Knotengrade zählen.

use std::collections::HashMap;

use geo_types::{Geometry as GeoGeometry, LineString};

use crate::core::{Geometry, KantenZeile, KnotenZeile, WktReader};

/// Liest die Punktgeometrien aller Knoten; fehlerhafte Zeilen werden übersprungen
pub(crate) fn knoten_punkte(knoten: &[KnotenZeile], reader: &WktReader) -> HashMap<u64, Geometry> {
    let mut punkte = HashMap::with_capacity(knoten.len());
    for zeile in knoten {
        match reader.read(&zeile.punkt) {
            Ok(geometrie) if matches!(geometrie.geom, GeoGeometry::Point(_)) => {
                punkte.insert(zeile.id, geometrie);
            }
            Ok(geometrie) => log::warn!(
                "Knoten {} übersprungen: Punkt erwartet, {} gefunden",
                zeile.id,
                geometrie.type_name()
            ),
            Err(e) => log::warn!("Knoten {} übersprungen: {}", zeile.id, e),
        }
    }
    punkte
}

/// Liest die Geometrie einer Kante; bei Fehler `None` mit Warnung
pub(crate) fn kanten_geometrie(kante: &KantenZeile, reader: &WktReader) -> Option<Geometry> {
    match reader.read(&kante.geometrie) {
        Ok(geometrie) => Some(geometrie),
        Err(e) => {
            log::warn!("Kante {} übersprungen: {}", kante.id, e);
            None
        }
    }
}

/// Linienzüge einer Kantengeometrie (LineString oder MultiLineString)
pub(crate) fn linienzuege(geometrie: &Geometry) -> Vec<&LineString<f64>> {
    match &geometrie.geom {
        GeoGeometry::LineString(line) => vec![line],
        GeoGeometry::MultiLineString(lines) => lines.iter().collect(),
        _ => Vec::new(),
    }
}

/// Zählt je Knoten die anliegenden Kanten; Schleifen zählen doppelt
pub(crate) fn knotengrade<'a>(kanten: impl IntoIterator<Item = &'a KantenZeile>) -> HashMap<u64, usize> {
    let mut grade: HashMap<u64, usize> = HashMap::new();
    for kante in kanten {
        *grade.entry(kante.von_knoten_id).or_default() += 1;
        *grade.entry(kante.nach_knoten_id).or_default() += 1;
    }
    grade
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SRID_UTM32;

    fn kante(id: u64, von: u64, nach: u64) -> KantenZeile {
        KantenZeile {
            id,
            von_knoten_id: von,
            nach_knoten_id: nach,
            geometrie: "LINESTRING (0 0, 1 0)".to_string(),
            quelle: Default::default(),
            attribute: Default::default(),
        }
    }

    #[test]
    fn degree_counts_both_ends() {
        let kanten = [kante(1, 1, 2), kante(2, 2, 3), kante(3, 4, 4)];
        let grade = knotengrade(&kanten);

        assert_eq!(grade[&1], 1);
        assert_eq!(grade[&2], 2);
        assert_eq!(grade[&4], 2);
    }

    #[test]
    fn broken_node_rows_are_skipped() {
        let reader = WktReader::new(SRID_UTM32);
        let knoten = [
            KnotenZeile {
                id: 1,
                punkt: "POINT (1 2)".to_string(),
            },
            KnotenZeile {
                id: 2,
                punkt: "POINT (kaputt)".to_string(),
            },
            KnotenZeile {
                id: 3,
                punkt: "LINESTRING (0 0, 1 1)".to_string(),
            },
        ];

        let punkte = knoten_punkte(&knoten, &reader);

        assert_eq!(punkte.len(), 1);
        assert_eq!(punkte[&1].srid, SRID_UTM32);
    }

    #[test]
    fn broken_edge_geometry_yields_none() {
        let reader = WktReader::new(SRID_UTM32);
        let mut zeile = kante(1, 1, 2);
        assert!(kanten_geometrie(&zeile, &reader).is_some());

        zeile.geometrie = "LINESTRING (0 0,".to_string();
        assert!(kanten_geometrie(&zeile, &reader).is_none());
    }
}
