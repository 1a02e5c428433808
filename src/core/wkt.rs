//! WKT/EWKT-Reader und -Writer für [`Geometry`].
//!
//! Der Reader wird lokal konstruiert und per Parameter weitergereicht,
//! es gibt keine globale Instanz.

use geo_types::{
    Coord, Geometry as GeoGeometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon,
};
use regex::Regex;
use thiserror::Error;

use super::geometry::{type_name_of, Geometry, ZCursor};

/// Fehler beim Parsen von WKT
#[derive(Debug, Error, PartialEq)]
pub enum WktError {
    #[error("Unerwartetes Ende des WKT-Textes")]
    UnexpectedEnd,
    #[error("Unerwartetes Token '{token}' an Position {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("Unbekannter Geometrietyp '{0}'")]
    UnknownType(String),
    #[error("Ungültige Zahl '{0}'")]
    InvalidNumber(String),
    #[error("Ungültige SRID '{0}'")]
    InvalidSrid(String),
}

/// WKT/EWKT-Reader mit Default-SRID für Texte ohne `SRID=`-Präfix
#[derive(Debug, Clone)]
pub struct WktReader {
    default_srid: u32,
    ewkt_prefix: Regex,
}

impl WktReader {
    /// Erstellt einen Reader, der Geometrien ohne Präfix mit `default_srid` versieht
    pub fn new(default_srid: u32) -> Self {
        Self {
            default_srid,
            // Literal-Pattern, kann nicht fehlschlagen
            ewkt_prefix: Regex::new(r"(?is)^\s*SRID=([^;]*);(.*)$")
                .unwrap_or_else(|e| unreachable!("EWKT-Regex ungültig: {}", e)),
        }
    }

    /// Parst WKT oder EWKT (`SRID=25832;POINT(1 2)`).
    ///
    /// Die Geometrie ist 3D, wenn jede Koordinate eine Höhe trägt.
    pub fn read(&self, text: &str) -> Result<Geometry, WktError> {
        let (srid, body) = match self.ewkt_prefix.captures(text) {
            Some(caps) => {
                let raw = caps.get(1).map_or("", |m| m.as_str()).trim();
                let srid = raw
                    .parse::<u32>()
                    .map_err(|_| WktError::InvalidSrid(raw.to_string()))?;
                (srid, caps.get(2).map_or("", |m| m.as_str()))
            }
            None => (self.default_srid, text),
        };

        let mut parser = Parser::new(body);
        let geom = parser.parse_geometry()?;
        parser.expect_end()?;

        let hoehen: Option<Vec<f64>> = parser.hoehen.into_iter().collect();
        Ok(match hoehen {
            Some(z) if !z.is_empty() => Geometry::with_z(srid, geom, z),
            _ => Geometry::new(srid, geom),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(String),
    Open,
    Close,
    Comma,
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    /// Höhe je gelesener Koordinate, in Lesereihenfolge
    hoehen: Vec<Option<f64>>,
}

impl Parser {
    fn new(text: &str) -> Self {
        let mut tokens = Vec::new();
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut i = 0;
        while i < chars.len() {
            let (offset, ch) = chars[i];
            match ch {
                '(' => {
                    tokens.push((Token::Open, offset));
                    i += 1;
                }
                ')' => {
                    tokens.push((Token::Close, offset));
                    i += 1;
                }
                ',' => {
                    tokens.push((Token::Comma, offset));
                    i += 1;
                }
                c if c.is_whitespace() => i += 1,
                c if c.is_ascii_alphabetic() => {
                    let start = i;
                    while i < chars.len() && chars[i].1.is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                    tokens.push((Token::Word(word.to_ascii_uppercase()), offset));
                }
                _ => {
                    let start = i;
                    while i < chars.len()
                        && !chars[i].1.is_whitespace()
                        && !matches!(chars[i].1, '(' | ')' | ',')
                    {
                        i += 1;
                    }
                    let number: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                    tokens.push((Token::Number(number), offset));
                }
            }
        }
        Self {
            tokens,
            pos: 0,
            hoehen: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, usize), WktError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(WktError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), WktError> {
        let (token, position) = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(unexpected(&token, position))
        }
    }

    fn expect_end(&self) -> Result<(), WktError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some((token, position)) => Err(unexpected(token, *position)),
        }
    }

    /// Verbraucht optional `Z`/`M`/`ZM` und liefert ob `EMPTY` folgt
    fn parse_dimension_and_empty(&mut self) -> bool {
        if let Some(Token::Word(w)) = self.peek() {
            if w == "Z" || w == "M" || w == "ZM" {
                self.pos += 1;
            }
        }
        if let Some(Token::Word(w)) = self.peek() {
            if w == "EMPTY" {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn parse_geometry(&mut self) -> Result<GeoGeometry<f64>, WktError> {
        let kind = match self.next()? {
            (Token::Word(kind), _) => kind,
            (other, position) => return Err(unexpected(&other, position)),
        };
        let empty = self.parse_dimension_and_empty();

        match kind.as_str() {
            "POINT" => {
                if empty {
                    // geo_types kennt keinen leeren Punkt
                    return Ok(MultiPoint::<f64>::new(Vec::new()).into());
                }
                self.expect(Token::Open)?;
                let c = self.parse_coord()?;
                self.expect(Token::Close)?;
                Ok(Point(c).into())
            }
            "LINESTRING" => Ok(if empty {
                LineString::<f64>::new(Vec::new())
            } else {
                self.parse_line_string()?
            }
            .into()),
            "POLYGON" => Ok(if empty {
                Polygon::new(LineString::new(Vec::new()), Vec::new())
            } else {
                self.parse_polygon()?
            }
            .into()),
            "MULTIPOINT" => Ok(if empty {
                MultiPoint::new(Vec::new())
            } else {
                self.parse_multi_point()?
            }
            .into()),
            "MULTILINESTRING" => Ok(MultiLineString::new(if empty {
                Vec::new()
            } else {
                self.parse_list(|p| p.parse_line_string())?
            })
            .into()),
            "MULTIPOLYGON" => Ok(MultiPolygon::new(if empty {
                Vec::new()
            } else {
                self.parse_list(|p| p.parse_polygon())?
            })
            .into()),
            "GEOMETRYCOLLECTION" => Ok(GeoGeometry::GeometryCollection(
                GeometryCollection::new_from(if empty {
                    Vec::new()
                } else {
                    self.parse_list(|p| p.parse_geometry())?
                }),
            )),
            _ => Err(WktError::UnknownType(kind.clone())),
        }
    }

    fn parse_number(&mut self) -> Result<f64, WktError> {
        let (token, position) = self.next()?;
        match token {
            Token::Number(raw) => raw.parse::<f64>().map_err(|_| WktError::InvalidNumber(raw)),
            other => Err(unexpected(&other, position)),
        }
    }

    fn parse_coord(&mut self) -> Result<Coord<f64>, WktError> {
        let x = self.parse_number()?;
        let y = self.parse_number()?;
        let z = match self.peek() {
            Some(Token::Number(_)) => Some(self.parse_number()?),
            _ => None,
        };
        // M-Werte werden verworfen
        while let Some(Token::Number(_)) = self.peek() {
            self.parse_number()?;
        }
        self.hoehen.push(z);
        Ok(Coord { x, y })
    }

    fn parse_list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, WktError>,
    ) -> Result<Vec<T>, WktError> {
        self.expect(Token::Open)?;
        let mut out = vec![item(self)?];
        loop {
            let (token, position) = self.next()?;
            match token {
                Token::Comma => out.push(item(self)?),
                Token::Close => return Ok(out),
                other => return Err(unexpected(&other, position)),
            }
        }
    }

    fn parse_line_string(&mut self) -> Result<LineString<f64>, WktError> {
        Ok(LineString::new(self.parse_list(|p| p.parse_coord())?))
    }

    /// Ring; offene Ringe werden hier geschlossen, damit die Höhen passen
    fn parse_ring(&mut self) -> Result<LineString<f64>, WktError> {
        let start = self.hoehen.len();
        let mut coords = self.parse_list(|p| p.parse_coord())?;
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last {
                coords.push(first);
                let z = self.hoehen.get(start).copied().flatten();
                self.hoehen.push(z);
            }
        }
        Ok(LineString::new(coords))
    }

    fn parse_polygon(&mut self) -> Result<Polygon<f64>, WktError> {
        let mut rings = self.parse_list(|p| p.parse_ring())?.into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Ok(Polygon::new(exterior, rings.collect()))
    }

    /// `MULTIPOINT((1 2),(3 4))` und `MULTIPOINT(1 2,3 4)`
    fn parse_multi_point(&mut self) -> Result<MultiPoint<f64>, WktError> {
        let points = self.parse_list(|p| {
            if p.peek() == Some(&Token::Open) {
                p.expect(Token::Open)?;
                let c = p.parse_coord()?;
                p.expect(Token::Close)?;
                Ok(Point(c))
            } else {
                p.parse_coord().map(Point)
            }
        })?;
        Ok(MultiPoint::new(points))
    }
}

fn unexpected(token: &Token, position: usize) -> WktError {
    let token = match token {
        Token::Word(w) => w.clone(),
        Token::Number(n) => n.clone(),
        Token::Open => "(".to_string(),
        Token::Close => ")".to_string(),
        Token::Comma => ",".to_string(),
    };
    WktError::UnexpectedToken { token, position }
}

/// Schreibt eine Geometrie als WKT (ohne SRID)
pub fn to_wkt(geometry: &Geometry) -> String {
    let mut cursor = ZCursor::new(geometry);
    geometry_text(&geometry.geom, &mut cursor)
}

/// Schreibt eine Geometrie als EWKT (`SRID=n;...`)
pub fn to_ewkt(geometry: &Geometry) -> String {
    format!("SRID={};{}", geometry.srid, to_wkt(geometry))
}

fn geometry_text(geom: &GeoGeometry<f64>, z: &mut ZCursor) -> String {
    use geo::HasDimensions;

    let kind = type_name_of(geom).to_ascii_uppercase();
    if geom.is_empty() {
        return format!("{} EMPTY", kind);
    }
    let dim = if z.is_3d() { " Z" } else { "" };

    let body = match geom {
        GeoGeometry::Point(p) => format!("({})", coord_text(p.0, z)),
        GeoGeometry::Line(line) => ring_text(&LineString::from(*line), z),
        GeoGeometry::Rect(rect) => polygon_text(&rect.to_polygon(), z),
        GeoGeometry::Triangle(triangle) => polygon_text(&triangle.to_polygon(), z),
        GeoGeometry::LineString(line) => ring_text(line, z),
        GeoGeometry::Polygon(polygon) => polygon_text(polygon, z),
        GeoGeometry::MultiPoint(points) => format!(
            "({})",
            points
                .iter()
                .map(|p| format!("({})", coord_text(p.0, z)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        GeoGeometry::MultiLineString(lines) => format!(
            "({})",
            lines
                .iter()
                .map(|l| ring_text(l, z))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        GeoGeometry::MultiPolygon(polygons) => format!(
            "({})",
            polygons
                .iter()
                .map(|p| polygon_text(p, z))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        GeoGeometry::GeometryCollection(members) => {
            return format!(
                "GEOMETRYCOLLECTION ({})",
                members
                    .iter()
                    .map(|m| geometry_text(m, z))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    };
    format!("{}{} {}", kind, dim, body)
}

fn coord_text(c: Coord<f64>, z: &mut ZCursor) -> String {
    match z.next_z() {
        Some(h) => format!("{} {} {}", c.x, c.y, h),
        None => format!("{} {}", c.x, c.y),
    }
}

fn ring_text(ring: &LineString<f64>, z: &mut ZCursor) -> String {
    format!(
        "({})",
        ring.coords()
            .map(|c| coord_text(*c, z))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn polygon_text(polygon: &Polygon<f64>, z: &mut ZCursor) -> String {
    let rings: Vec<String> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|r| ring_text(r, z))
        .collect();
    format!("({})", rings.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{SRID_UTM32, SRID_WGS84};
    use geo_types::point;

    #[test]
    fn reads_point_with_default_srid() {
        let reader = WktReader::new(SRID_UTM32);
        let geometry = reader.read("POINT (400000 5400000)").expect("Parsing fehlgeschlagen");

        assert_eq!(geometry.srid, SRID_UTM32);
        assert_eq!(geometry.geom, GeoGeometry::Point(point!(x: 400000.0, y: 5400000.0)));
        assert!(!geometry.has_z());
    }

    #[test]
    fn reads_ewkt_prefix() {
        let reader = WktReader::new(SRID_UTM32);
        let geometry = reader
            .read("SRID=4326;LINESTRING(9.1 48.7, 9.2 48.8)")
            .expect("Parsing fehlgeschlagen");

        assert_eq!(geometry.srid, SRID_WGS84);
        assert_eq!(geometry.type_name(), "LineString");
        assert_eq!(geometry.coords().len(), 2);
    }

    #[test]
    fn reads_polygon_with_hole_and_z() {
        let reader = WktReader::new(SRID_UTM32);
        let geometry = reader
            .read("POLYGON Z ((0 0 1, 10 0 1, 10 10 1, 0 0 1), (2 2 2, 3 2 2, 3 3 2, 2 2 2))")
            .expect("Parsing fehlgeschlagen");

        let GeoGeometry::Polygon(polygon) = &geometry.geom else {
            panic!("Polygon erwartet");
        };
        assert_eq!(polygon.exterior().0.len(), 4);
        assert_eq!(polygon.interiors().len(), 1);
        assert_eq!(geometry.z.as_ref().map(Vec::len), Some(8));
        assert_eq!(geometry.z.as_ref().and_then(|z| z.last().copied()), Some(2.0));
    }

    #[test]
    fn open_ring_is_closed_with_its_height() {
        let reader = WktReader::new(SRID_UTM32);
        let geometry = reader
            .read("POLYGON Z ((0 0 7, 4 0 8, 4 4 9))")
            .expect("Parsing fehlgeschlagen");

        assert_eq!(geometry.coords().len(), 4);
        assert_eq!(geometry.z, Some(vec![7.0, 8.0, 9.0, 7.0]));
    }

    #[test]
    fn reads_both_multipoint_notations() {
        let reader = WktReader::new(SRID_UTM32);
        let a = reader.read("MULTIPOINT ((1 2), (3 4))").expect("Parsing fehlgeschlagen");
        let b = reader.read("MULTIPOINT (1 2, 3 4)").expect("Parsing fehlgeschlagen");

        assert_eq!(a, b);
    }

    #[test]
    fn reads_nested_collection() {
        let reader = WktReader::new(SRID_UTM32);
        let geometry = reader
            .read("GEOMETRYCOLLECTION (POINT (1 2), LINESTRING (0 0, 1 1), GEOMETRYCOLLECTION EMPTY)")
            .expect("Parsing fehlgeschlagen");

        let members = geometry.members();
        assert_eq!(members.len(), 3);
        assert!(members[2].is_empty());
    }

    #[test]
    fn rejects_broken_text() {
        let reader = WktReader::new(SRID_UTM32);

        assert_eq!(reader.read("POINT (1 2"), Err(WktError::UnexpectedEnd));
        assert!(matches!(
            reader.read("CIRCLE (1 2)"),
            Err(WktError::UnknownType(_))
        ));
        assert!(matches!(
            reader.read("POINT (1 abc)"),
            Err(WktError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            reader.read("SRID=xy;POINT (1 2)"),
            Err(WktError::InvalidSrid(_))
        ));
        assert!(matches!(
            reader.read("POINT (1 2) trailing"),
            Err(WktError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn written_wkt_is_readable_again() {
        let reader = WktReader::new(SRID_UTM32);
        let original = reader
            .read("MULTIPOLYGON (((0 0, 4 0, 4 4, 0 0)), ((10 10, 12 10, 12 12, 10 10)))")
            .expect("Parsing fehlgeschlagen");

        let text = to_ewkt(&original);
        assert!(text.starts_with("SRID=25832;MULTIPOLYGON"));
        assert_eq!(reader.read(&text), Ok(original));
    }

    #[test]
    fn heights_are_written_back() {
        let reader = WktReader::new(SRID_UTM32);
        let original = reader
            .read("LINESTRING Z (0 0 1, 1 1 2)")
            .expect("Parsing fehlgeschlagen");

        assert_eq!(to_wkt(&original), "LINESTRING Z (0 0 1, 1 1 2)");
    }
}
