//! Geometrie mit SRID auf Basis von `geo_types`.
//!
//! Die Form ist ein `geo_types::Geometry<f64>`, die SRID und optionale Höhen
//! liegen daneben. Höhen werden in der Reihenfolge von [`CoordsIter`]
//! gespeichert, also genau eine pro Koordinate. Koordinaten sind immer
//! (x, y), bei WGS84 also (Länge, Breite).

use geo::{BoundingRect, CoordsIter, HasDimensions, MapCoords};
use geo_types::{coord, Coord, Geometry as GeoGeometry, LineString, Point, Rect};
use glam::DVec2;

/// SRID für WGS84 (geographisch, Grad)
pub const SRID_WGS84: u32 = 4326;
/// SRID für ETRS89 / UTM Zone 32N (kanonisches internes KBS)
pub const SRID_UTM32: u32 = 25832;

/// 2D-Vektor einer Koordinate für Distanzberechnungen
pub fn xy(c: Coord<f64>) -> DVec2 {
    DVec2::new(c.x, c.y)
}

/// Bildet `Line`, `Rect` und `Triangle` auf LineString/Polygon ab.
///
/// Danach kommen nur noch die sieben Simple-Features-Typen vor.
fn vereinheitlicht(geom: GeoGeometry<f64>) -> GeoGeometry<f64> {
    match geom {
        GeoGeometry::Line(line) => GeoGeometry::LineString(line.into()),
        GeoGeometry::Rect(rect) => GeoGeometry::Polygon(rect.to_polygon()),
        GeoGeometry::Triangle(triangle) => GeoGeometry::Polygon(triangle.to_polygon()),
        GeoGeometry::GeometryCollection(members) => GeoGeometry::GeometryCollection(
            members.into_iter().map(vereinheitlicht).collect(),
        ),
        other => other,
    }
}

/// Kanonischer Typname (wie in WKT/GeoJSON, CamelCase)
pub fn type_name_of(geom: &GeoGeometry<f64>) -> &'static str {
    match geom {
        GeoGeometry::Point(_) => "Point",
        GeoGeometry::Line(_) | GeoGeometry::LineString(_) => "LineString",
        GeoGeometry::Polygon(_) | GeoGeometry::Rect(_) | GeoGeometry::Triangle(_) => "Polygon",
        GeoGeometry::MultiPoint(_) => "MultiPoint",
        GeoGeometry::MultiLineString(_) => "MultiLineString",
        GeoGeometry::MultiPolygon(_) => "MultiPolygon",
        GeoGeometry::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Geometrie mit Referenzsystem und optionalen Höhen
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Spatial Reference ID
    pub srid: u32,
    /// Form der Geometrie
    pub geom: GeoGeometry<f64>,
    /// Höhen in Koordinatenreihenfolge, `None` bei 2D
    pub z: Option<Vec<f64>>,
}

impl Geometry {
    /// Erstellt eine 2D-Geometrie mit SRID
    pub fn new(srid: u32, geom: impl Into<GeoGeometry<f64>>) -> Self {
        Self {
            srid,
            geom: vereinheitlicht(geom.into()),
            z: None,
        }
    }

    /// Erstellt eine 3D-Geometrie.
    ///
    /// Passt die Anzahl der Höhen nicht zur Anzahl der Koordinaten, bleibt
    /// die Geometrie 2D.
    pub fn with_z(srid: u32, geom: impl Into<GeoGeometry<f64>>, z: Vec<f64>) -> Self {
        let mut geometry = Self::new(srid, geom);
        if z.len() == geometry.geom.coords_count() && !z.is_empty() {
            geometry.z = Some(z);
        } else {
            log::debug!(
                "{} Höhen für {} Koordinaten, Geometrie bleibt 2D",
                z.len(),
                geometry.geom.coords_count()
            );
        }
        geometry
    }

    /// Kanonischer Typname der Form
    pub fn type_name(&self) -> &'static str {
        type_name_of(&self.geom)
    }

    /// Alle Koordinaten in Dokumentreihenfolge
    pub fn coords(&self) -> Vec<Coord<f64>> {
        self.geom.coords_iter().collect()
    }

    /// Erste Koordinate, bei Punkten der Punkt selbst
    pub fn first_coord(&self) -> Option<Coord<f64>> {
        self.geom.coords_iter().next()
    }

    /// Bounding Box, `None` bei leerer Geometrie
    pub fn envelope(&self) -> Option<Envelope> {
        self.geom.bounding_rect().map(Envelope::from)
    }

    /// Geometrie mit vertauschten x/y-Ordinaten (gleiche SRID, gleiche Höhen)
    pub fn swap_xy(&self) -> Geometry {
        Geometry {
            srid: self.srid,
            geom: self.geom.map_coords(|c| coord! { x: c.y, y: c.x }),
            z: self.z.clone(),
        }
    }

    /// Prüft ob die Geometrie keine Koordinaten enthält
    pub fn is_empty(&self) -> bool {
        self.geom.is_empty()
    }

    pub fn has_z(&self) -> bool {
        self.z.is_some()
    }

    /// Zerlegt eine GeometryCollection in ihre Mitglieder samt Höhen.
    ///
    /// Andere Typen liefern sich selbst.
    pub fn members(&self) -> Vec<Geometry> {
        let GeoGeometry::GeometryCollection(members) = &self.geom else {
            return vec![self.clone()];
        };

        let mut offset = 0;
        let mut out = Vec::with_capacity(members.len());
        for member in members.iter() {
            let count = member.coords_count();
            let z = self
                .z
                .as_ref()
                .and_then(|z| z.get(offset..offset + count))
                .filter(|slice| !slice.is_empty())
                .map(<[f64]>::to_vec);
            offset += count;
            out.push(Geometry {
                srid: self.srid,
                geom: member.clone(),
                z,
            });
        }
        out
    }

    /// Repräsentativer Punkt für Markierungen in der Karte.
    ///
    /// Punkt → der Punkt selbst, LineString → Mitte entlang der Länge,
    /// sonst → Mittelpunkt der Bounding Box.
    pub fn representative_point(&self) -> Option<Geometry> {
        let coordinate = match &self.geom {
            GeoGeometry::Point(p) => Some(p.0),
            GeoGeometry::LineString(line) => interpolate_along(line, 0.5),
            GeoGeometry::MultiLineString(lines) => {
                lines.0.first().and_then(|l| interpolate_along(l, 0.5))
            }
            _ => self.envelope().map(|e| e.center()),
        }?;
        Some(Geometry::new(self.srid, Point(coordinate)))
    }
}

/// Liest die Höhen einer Geometrie in Koordinatenreihenfolge.
///
/// Writer laufen die Form rekursiv ab und holen pro Koordinate eine Höhe.
#[derive(Debug, Clone)]
pub struct ZCursor<'a> {
    values: Option<std::slice::Iter<'a, f64>>,
}

impl<'a> ZCursor<'a> {
    pub fn new(geometry: &'a Geometry) -> Self {
        Self {
            values: geometry.z.as_ref().map(|z| z.iter()),
        }
    }

    pub fn is_3d(&self) -> bool {
        self.values.is_some()
    }

    /// Nächste Höhe; bei 2D immer `None`
    pub fn next_z(&mut self) -> Option<f64> {
        self.values.as_mut().and_then(|values| values.next().copied())
    }
}

/// Länge eines Linienzugs (2D)
pub fn line_length(line: &LineString<f64>) -> f64 {
    line.lines().map(|l| xy(l.start).distance(xy(l.end))).sum()
}

/// Punkt bei `fraction` (0..=1) der Länge eines Linienzugs
pub fn interpolate_along(line: &LineString<f64>, fraction: f64) -> Option<Coord<f64>> {
    let first = *line.0.first()?;
    let total = line_length(line);
    if total <= 0.0 {
        return Some(first);
    }

    let target = total * fraction.clamp(0.0, 1.0);
    let mut walked = 0.0;
    for segment in line.lines() {
        let (start, end) = (xy(segment.start), xy(segment.end));
        let length = start.distance(end);
        if walked + length >= target && length > 0.0 {
            let p = start.lerp(end, (target - walked) / length);
            return Some(coord! { x: p.x, y: p.y });
        }
        walked += length;
    }
    line.0.last().copied()
}

/// Achsenparallele Bounding Box
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl From<Rect<f64>> for Envelope {
    fn from(rect: Rect<f64>) -> Self {
        Envelope::new(rect.min().x, rect.max().x, rect.min().y, rect.max().y)
    }
}

impl Envelope {
    /// Erstellt eine Box; vertauschte Grenzen werden normalisiert
    pub fn new(x1: f64, x2: f64, y1: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            max_x: x1.max(x2),
            min_y: y1.min(y2),
            max_y: y1.max(y2),
        }
    }

    /// Prüft ob die Koordinate in der Box liegt (Rand inklusive)
    pub fn contains(&self, c: Coord<f64>) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    /// Prüft ob `other` vollständig in dieser Box liegt
    pub fn contains_envelope(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Prüft ob sich beide Boxen überschneiden
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Vergrößert die Box in alle Richtungen um `distance`
    pub fn expanded_by(&self, distance: f64) -> Self {
        Self {
            min_x: self.min_x - distance,
            max_x: self.max_x + distance,
            min_y: self.min_y - distance,
            max_y: self.max_y + distance,
        }
    }

    /// Kleinste Box, die beide Boxen enthält
    pub fn union(&self, other: &Envelope) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn center(&self) -> Coord<f64> {
        coord! {
            x: (self.min_x + self.max_x) * 0.5,
            y: (self.min_y + self.max_y) * 0.5,
        }
    }
}
