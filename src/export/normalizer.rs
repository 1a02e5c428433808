//! Normalisierung heterogener Geometrien für Formate mit einem Geometrietyp pro Datei.
//!
//! Punkte und Linien werden in ihre Multi-Varianten gehoben, GeometryCollections
//! zerlegt. Danach wird nach Geometrietyp gruppiert. Attributnamen werden für
//! das 10-Zeichen-Limit von dBase gekürzt und eindeutig gemacht.

use indexmap::IndexMap;

use super::ExportData;
use geo_types::{Geometry as GeoGeometry, MultiLineString, MultiPoint};

use crate::core::Geometry;

/// Maximale Länge eines dBase-Feldnamens in Bytes
pub const MAX_FIELD_NAME_LEN: usize = 10;

/// Eine typreine Feature-Gruppe, wie sie in eine Datei/Tabelle geschrieben wird
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    /// `export-<Typ>`
    pub name: String,
    /// Kanonischer Geometrietyp aller Features
    pub geometry_type: String,
    /// Vereinigung aller Attributnamen in Reihenfolge des ersten Auftretens
    pub schema: Vec<String>,
    pub features: Vec<ExportData>,
}

impl FeatureCollection {
    pub fn new(geometry_type: &str, features: Vec<ExportData>) -> Self {
        let mut schema: Vec<String> = Vec::new();
        for feature in &features {
            for key in feature.headers() {
                if !schema.contains(&key) {
                    schema.push(key);
                }
            }
        }

        Self {
            name: format!("export-{}", geometry_type),
            geometry_type: geometry_type.to_string(),
            schema,
            features,
        }
    }

    /// Prüft ob irgendein Feature Höhenwerte trägt
    pub fn has_z(&self) -> bool {
        self.features.iter().any(|f| f.geometry().has_z())
    }
}

/// Schreibt Geometrien so um, dass jede Gruppe nur einen Multi-Typ enthält.
///
/// - Point → MultiPoint, LineString → MultiLineString
/// - GeometryCollection → Mitglieder (rekursiv aufgelöst): alle Linien in einen
///   MultiLineString, alle Punkte in einen MultiPoint, alles andere als eigener
///   Datensatz. Leere Gruppen erzeugen keinen Datensatz.
/// - alles andere bleibt unverändert
///
/// Höhen bleiben erhalten; zusammengeführte Teile sind nur dann 3D, wenn
/// jedes Teil Höhen trägt.
pub fn clean_up_geometries(data: Vec<ExportData>) -> Vec<ExportData> {
    let mut result = Vec::with_capacity(data.len());

    for record in data {
        let geometry = record.geometry();
        match &geometry.geom {
            GeoGeometry::Point(p) => {
                let lifted = lifted(geometry, MultiPoint::new(vec![*p]));
                result.push(record.with_geometry(lifted));
            }
            GeoGeometry::LineString(line) => {
                let lifted = lifted(geometry, MultiLineString::new(vec![line.clone()]));
                result.push(record.with_geometry(lifted));
            }
            GeoGeometry::GeometryCollection(_) => {
                let mut leaves = Vec::new();
                flatten_collection(geometry, &mut leaves);

                let mut lines: Vec<Geometry> = Vec::new();
                let mut points: Vec<Geometry> = Vec::new();
                for leaf in leaves {
                    match leaf.geom {
                        GeoGeometry::LineString(_) => lines.push(leaf),
                        GeoGeometry::Point(_) => points.push(leaf),
                        _ => result.push(record.with_geometry(leaf)),
                    }
                }

                if !lines.is_empty() {
                    let merged = merged(geometry.srid, &lines, |parts| {
                        MultiLineString::new(
                            parts
                                .iter()
                                .filter_map(|g| match &g.geom {
                                    GeoGeometry::LineString(l) => Some(l.clone()),
                                    _ => None,
                                })
                                .collect(),
                        )
                        .into()
                    });
                    result.push(record.with_geometry(merged));
                }
                if !points.is_empty() {
                    let merged = merged(geometry.srid, &points, |parts| {
                        MultiPoint::new(
                            parts
                                .iter()
                                .filter_map(|g| match &g.geom {
                                    GeoGeometry::Point(p) => Some(*p),
                                    _ => None,
                                })
                                .collect(),
                        )
                        .into()
                    });
                    result.push(record.with_geometry(merged));
                }
            }
            _ => result.push(record),
        }
    }

    result
}

/// Multi-Variante mit den Höhen der Einzelgeometrie
fn lifted(geometry: &Geometry, multi: impl Into<GeoGeometry<f64>>) -> Geometry {
    match &geometry.z {
        Some(z) => Geometry::with_z(geometry.srid, multi, z.clone()),
        None => Geometry::new(geometry.srid, multi),
    }
}

/// Führt Teile zusammen; Höhen nur, wenn jedes Teil welche hat
fn merged(
    srid: u32,
    parts: &[Geometry],
    build: impl Fn(&[Geometry]) -> GeoGeometry<f64>,
) -> Geometry {
    let geom = build(parts);
    let heights: Option<Vec<f64>> = parts
        .iter()
        .map(|g| g.z.as_deref())
        .collect::<Option<Vec<&[f64]>>>()
        .map(|slices| slices.concat());
    match heights {
        Some(z) => Geometry::with_z(srid, geom, z),
        None => Geometry::new(srid, geom),
    }
}

/// Löst verschachtelte Collections auf; leere Mitglieder entfallen
fn flatten_collection(collection: &Geometry, out: &mut Vec<Geometry>) {
    for member in collection.members() {
        match member.geom {
            GeoGeometry::GeometryCollection(_) => flatten_collection(&member, out),
            _ if member.is_empty() => {}
            _ => out.push(member),
        }
    }
}

/// Gruppiert nach kanonischem Geometrietyp, Gruppen in Reihenfolge des ersten Auftretens
pub fn group_by_geometry_type(data: Vec<ExportData>) -> IndexMap<String, Vec<ExportData>> {
    let mut groups: IndexMap<String, Vec<ExportData>> = IndexMap::new();
    for record in data {
        groups
            .entry(record.geometry().type_name().to_string())
            .or_default()
            .push(record);
    }
    groups
}

/// Normalisieren, gruppieren und je Gruppe eine [`FeatureCollection`] bilden
pub fn build_feature_collections(data: Vec<ExportData>) -> Vec<FeatureCollection> {
    group_by_geometry_type(clean_up_geometries(data))
        .into_iter()
        .map(|(geometry_type, features)| FeatureCollection::new(&geometry_type, features))
        .collect()
}

/// Ersetzt Umlaute und entfernt `-` und `/`
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for ch in key.chars() {
        match ch {
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'Ä' => out.push_str("Ae"),
            'Ö' => out.push_str("Oe"),
            'Ü' => out.push_str("Ue"),
            'ß' => out.push_str("ss"),
            '-' | '/' => {}
            other => out.push(other),
        }
    }
    out
}

/// Kürzt auf höchstens `max` Bytes, ohne ein Zeichen zu zerschneiden
pub(crate) fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Kürzt Attributnamen auf 10 Bytes und macht sie innerhalb des Datensatzes eindeutig.
///
/// dBase begrenzt Feldnamen in Bytes, nicht in Zeichen. Eindeutigkeit wird
/// deshalb auf dem byte-gekürzten Namen geprüft.
///
/// Kollisionen erhalten ein Zahlensuffix ab `2`, das die letzten Zeichen
/// ersetzt. Ab der zehnten Kollision wird das Suffix zweistellig und ersetzt
/// entsprechend zwei Zeichen; gesucht wird, bis der Name frei ist.
pub fn sanitize_attribute_keys(properties: &IndexMap<String, String>) -> IndexMap<String, String> {
    let mut result: IndexMap<String, String> = IndexMap::with_capacity(properties.len());

    for (key, value) in properties {
        let escaped = escape_key(key);
        let truncated = truncate_bytes(&escaped, MAX_FIELD_NAME_LEN);
        let mut candidate = truncated.to_string();
        let mut counter = 2usize;
        while result.contains_key(&candidate) {
            let suffix = counter.to_string();
            let keep = MAX_FIELD_NAME_LEN.saturating_sub(suffix.len());
            candidate = format!("{}{}", truncate_bytes(truncated, keep), suffix);
            counter += 1;
        }
        result.insert(candidate, value.clone());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SRID_UTM32;
    use geo_types::{line_string, point, polygon, GeometryCollection, LineString, Polygon};

    fn record(geom: impl Into<GeoGeometry<f64>>) -> ExportData {
        ExportData::new(
            Geometry::new(SRID_UTM32, geom),
            IndexMap::from([("name".to_string(), "x".to_string())]),
        )
    }

    fn square() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)]
    }

    fn collection(members: Vec<GeoGeometry<f64>>) -> GeoGeometry<f64> {
        GeoGeometry::GeometryCollection(GeometryCollection::new_from(members))
    }

    #[test]
    fn singles_are_lifted_to_multi() {
        let result = clean_up_geometries(vec![
            record(point!(x: 1.0, y: 2.0)),
            record(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
        ]);

        assert_eq!(
            result[0].geometry().geom,
            GeoGeometry::MultiPoint(MultiPoint::new(vec![point!(x: 1.0, y: 2.0)]))
        );
        assert_eq!(
            result[1].geometry().geom,
            GeoGeometry::MultiLineString(MultiLineString::new(vec![
                line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]
            ]))
        );
    }

    #[test]
    fn collection_is_decomposed_and_merged() {
        let nested = collection(vec![
            point!(x: 2.0, y: 2.0).into(),
            line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 6.0)].into(),
        ]);
        let outer = collection(vec![
            point!(x: 1.0, y: 1.0).into(),
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into(),
            square().into(),
            nested.into(),
        ]);

        let result = clean_up_geometries(vec![record(outer)]);

        let types: Vec<&str> = result.iter().map(|r| r.geometry().type_name()).collect();
        assert_eq!(types, vec!["Polygon", "MultiLineString", "MultiPoint"]);
        assert_eq!(
            result[2].geometry().geom,
            GeoGeometry::MultiPoint(MultiPoint::new(vec![
                point!(x: 1.0, y: 1.0),
                point!(x: 2.0, y: 2.0)
            ]))
        );
        assert!(result.iter().all(|r| r.properties()["name"] == "x"));
    }

    #[test]
    fn collection_without_lines_produces_no_line_record() {
        let result = clean_up_geometries(vec![record(collection(vec![
            point!(x: 1.0, y: 1.0).into(),
        ]))]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].geometry().type_name(), "MultiPoint");
        assert!(clean_up_geometries(vec![record(collection(vec![]))]).is_empty());
    }

    #[test]
    fn empty_members_are_dropped() {
        let result = clean_up_geometries(vec![record(collection(vec![
            LineString::<f64>::new(vec![]).into(),
            point!(x: 1.0, y: 1.0).into(),
        ]))]);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].geometry().type_name(), "MultiPoint");
    }

    #[test]
    fn heights_follow_lifted_and_merged_parts() {
        let punkt = ExportData::new(
            Geometry::with_z(SRID_UTM32, point!(x: 1.0, y: 2.0), vec![7.0]),
            IndexMap::new(),
        );
        let gemischt = ExportData::new(
            Geometry::with_z(
                SRID_UTM32,
                collection(vec![
                    line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into(),
                    point!(x: 3.0, y: 3.0).into(),
                    line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 6.0)].into(),
                ]),
                vec![1.0, 2.0, 3.0, 4.0, 5.0],
            ),
            IndexMap::new(),
        );

        let result = clean_up_geometries(vec![punkt, gemischt]);

        assert_eq!(result[0].geometry().z, Some(vec![7.0]));
        assert_eq!(result[1].geometry().type_name(), "MultiLineString");
        assert_eq!(result[1].geometry().z, Some(vec![1.0, 2.0, 4.0, 5.0]));
        assert_eq!(result[2].geometry().z, Some(vec![3.0]));
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let groups = group_by_geometry_type(clean_up_geometries(vec![
            record(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
            record(point!(x: 1.0, y: 2.0)),
            record(line_string![(x: 2.0, y: 0.0), (x: 3.0, y: 1.0)]),
        ]));

        let keys: Vec<&String> = groups.keys().collect();
        assert_eq!(keys, vec!["MultiLineString", "MultiPoint"]);
        assert_eq!(groups["MultiLineString"].len(), 2);
    }

    #[test]
    fn feature_collection_schema_is_union() {
        let a = ExportData::new(
            Geometry::new(SRID_UTM32, MultiPoint::new(vec![point!(x: 0.0, y: 0.0)])),
            IndexMap::from([("a".to_string(), "1".to_string())]),
        );
        let b = ExportData::new(
            Geometry::new(SRID_UTM32, MultiPoint::new(vec![point!(x: 1.0, y: 0.0)])),
            IndexMap::from([
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "3".to_string()),
            ]),
        );

        let collections = build_feature_collections(vec![a, b]);

        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].name, "export-MultiPoint");
        assert_eq!(collections[0].schema, vec!["a", "b"]);
    }

    #[test]
    fn umlauts_and_separators_are_escaped() {
        let props = IndexMap::from([
            ("Straßen-Länge".to_string(), "1".to_string()),
            ("Öffnung/Zeit".to_string(), "2".to_string()),
        ]);
        let keys: Vec<String> = sanitize_attribute_keys(&props).into_keys().collect();

        assert_eq!(keys, vec!["StrassenLa", "OeffnungZe"]);
    }

    #[test]
    fn truncation_collisions_get_numeric_suffix() {
        let props = IndexMap::from([
            ("bezeichnung_alt".to_string(), "1".to_string()),
            ("bezeichnung_neu".to_string(), "2".to_string()),
            ("bezeichnung_mittel".to_string(), "3".to_string()),
        ]);
        let sanitized = sanitize_attribute_keys(&props);
        let keys: Vec<&String> = sanitized.keys().collect();

        assert_eq!(keys, vec!["bezeichnun", "bezeichnu2", "bezeichnu3"]);
        assert_eq!(sanitized["bezeichnu3"], "3");
    }

    #[test]
    fn suffix_grows_beyond_nine_collisions() {
        let props: IndexMap<String, String> = (0..12)
            .map(|i| (format!("attributname_{:02}", i), i.to_string()))
            .collect();
        let sanitized = sanitize_attribute_keys(&props);

        assert_eq!(sanitized.len(), 12);
        assert!(sanitized.keys().all(|k| k.len() <= MAX_FIELD_NAME_LEN));
        assert!(sanitized.contains_key("attributn9"));
        assert!(sanitized.contains_key("attribut10"));
        assert!(sanitized.contains_key("attribut12"));
    }

    #[test]
    fn multibyte_keys_are_truncated_by_bytes_and_stay_unique() {
        let props = IndexMap::from([
            ("émission_alt".to_string(), "1".to_string()),
            ("émission_neu".to_string(), "2".to_string()),
        ]);
        let sanitized = sanitize_attribute_keys(&props);
        let keys: Vec<&String> = sanitized.keys().collect();

        assert_eq!(keys, vec!["émission_", "émission2"]);
        assert!(sanitized.keys().all(|k| k.len() <= MAX_FIELD_NAME_LEN));
    }

    #[test]
    fn truncation_never_splits_a_character() {
        assert_eq!(truncate_bytes("abcdefghé", 9), "abcdefgh");
        assert_eq!(truncate_bytes("kurz", 10), "kurz");
    }
}
