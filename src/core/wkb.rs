//! ISO-WKB-Writer (Little Endian) für den GeoPackage-Export.

use geo_types::{Coord, Geometry as GeoGeometry, LineString, Polygon};

use super::geometry::{Geometry, ZCursor};

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOINT: u32 = 4;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;
const WKB_GEOMETRYCOLLECTION: u32 = 7;
/// ISO-Offset für Z-Geometrien
const WKB_Z_OFFSET: u32 = 1000;

/// Kodiert eine Geometrie als WKB; 3D-Geometrien als ISO-Z-Typen
pub fn to_wkb(geometry: &Geometry) -> Vec<u8> {
    let mut out = Vec::new();
    let mut z = ZCursor::new(geometry);
    write_geometry(&mut out, &geometry.geom, &mut z);
    out
}

/// WKB-Geometrietyp-Code (ohne Z-Offset)
pub fn type_code(geom: &GeoGeometry<f64>) -> u32 {
    match geom {
        GeoGeometry::Point(_) => WKB_POINT,
        GeoGeometry::Line(_) | GeoGeometry::LineString(_) => WKB_LINESTRING,
        GeoGeometry::Polygon(_) | GeoGeometry::Rect(_) | GeoGeometry::Triangle(_) => WKB_POLYGON,
        GeoGeometry::MultiPoint(_) => WKB_MULTIPOINT,
        GeoGeometry::MultiLineString(_) => WKB_MULTILINESTRING,
        GeoGeometry::MultiPolygon(_) => WKB_MULTIPOLYGON,
        GeoGeometry::GeometryCollection(_) => WKB_GEOMETRYCOLLECTION,
    }
}

fn write_header(out: &mut Vec<u8>, code: u32, z: &ZCursor) {
    out.push(1); // Little Endian
    let code = if z.is_3d() { code + WKB_Z_OFFSET } else { code };
    out.extend_from_slice(&code.to_le_bytes());
}

fn write_coord(out: &mut Vec<u8>, c: Coord<f64>, z: &mut ZCursor) {
    out.extend_from_slice(&c.x.to_le_bytes());
    out.extend_from_slice(&c.y.to_le_bytes());
    if z.is_3d() {
        out.extend_from_slice(&z.next_z().unwrap_or(0.0).to_le_bytes());
    }
}

fn write_count(out: &mut Vec<u8>, count: usize) {
    out.extend_from_slice(&(count as u32).to_le_bytes());
}

fn write_ring(out: &mut Vec<u8>, ring: &LineString<f64>, z: &mut ZCursor) {
    write_count(out, ring.0.len());
    ring.coords().for_each(|c| write_coord(out, *c, z));
}

fn write_polygon_body(out: &mut Vec<u8>, polygon: &Polygon<f64>, z: &mut ZCursor) {
    if polygon.exterior().0.is_empty() {
        write_count(out, 0);
        return;
    }
    write_count(out, 1 + polygon.interiors().len());
    write_ring(out, polygon.exterior(), z);
    polygon.interiors().iter().for_each(|r| write_ring(out, r, z));
}

fn write_geometry(out: &mut Vec<u8>, geom: &GeoGeometry<f64>, z: &mut ZCursor) {
    write_header(out, type_code(geom), z);
    match geom {
        GeoGeometry::Point(p) => write_coord(out, p.0, z),
        GeoGeometry::Line(line) => write_ring(out, &LineString::from(*line), z),
        GeoGeometry::LineString(line) => write_ring(out, line, z),
        GeoGeometry::Polygon(polygon) => write_polygon_body(out, polygon, z),
        GeoGeometry::Rect(rect) => write_polygon_body(out, &rect.to_polygon(), z),
        GeoGeometry::Triangle(triangle) => write_polygon_body(out, &triangle.to_polygon(), z),
        GeoGeometry::MultiPoint(points) => {
            write_count(out, points.0.len());
            for p in points.iter() {
                write_header(out, WKB_POINT, z);
                write_coord(out, p.0, z);
            }
        }
        GeoGeometry::MultiLineString(lines) => {
            write_count(out, lines.0.len());
            for line in lines.iter() {
                write_header(out, WKB_LINESTRING, z);
                write_ring(out, line, z);
            }
        }
        GeoGeometry::MultiPolygon(polygons) => {
            write_count(out, polygons.0.len());
            for polygon in polygons.iter() {
                write_header(out, WKB_POLYGON, z);
                write_polygon_body(out, polygon, z);
            }
        }
        GeoGeometry::GeometryCollection(members) => {
            write_count(out, members.0.len());
            members.iter().for_each(|m| write_geometry(out, m, z));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SRID_UTM32;
    use geo_types::{line_string, point, MultiLineString};

    #[test]
    fn point_layout_matches_iso_wkb() {
        let wkb = to_wkb(&Geometry::new(SRID_UTM32, point!(x: 1.0, y: 2.0)));

        assert_eq!(wkb.len(), 1 + 4 + 16);
        assert_eq!(wkb[0], 1);
        assert_eq!(u32::from_le_bytes([wkb[1], wkb[2], wkb[3], wkb[4]]), 1);
        assert_eq!(&wkb[5..13], &1.0f64.to_le_bytes());
        assert_eq!(&wkb[13..21], &2.0f64.to_le_bytes());
    }

    #[test]
    fn z_coordinates_use_iso_offset() {
        let geometry = Geometry::with_z(
            SRID_UTM32,
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
            vec![5.0, 6.0],
        );
        let wkb = to_wkb(&geometry);

        assert_eq!(u32::from_le_bytes([wkb[1], wkb[2], wkb[3], wkb[4]]), 1002);
        // Header + Anzahl + 2 Punkte à 3 Doubles
        assert_eq!(wkb.len(), 5 + 4 + 2 * 24);
        assert_eq!(&wkb[wkb.len() - 8..], &6.0f64.to_le_bytes());
    }

    #[test]
    fn multi_line_string_nests_members() {
        let lines = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 2.0, y: 0.0), (x: 3.0, y: 0.0)],
        ]);
        let wkb = to_wkb(&Geometry::new(SRID_UTM32, lines));

        assert_eq!(u32::from_le_bytes([wkb[5], wkb[6], wkb[7], wkb[8]]), 2);
        // Erstes Mitglied beginnt mit eigenem Header
        assert_eq!(wkb[9], 1);
        assert_eq!(u32::from_le_bytes([wkb[10], wkb[11], wkb[12], wkb[13]]), 2);
    }
}
