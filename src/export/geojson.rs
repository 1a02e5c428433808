//! GeoJSON-Export als In-Memory-JSON-Baum, plus Reader für den Rückweg.
//!
//! Die FeatureCollection trägt einen benannten CRS-Block `EPSG:<srid>`.
//! Polygone mit Löchern werden bewusst nicht unterstützt.

use serde_json::{json, Map, Value};
use thiserror::Error;

use super::{ensure_utm32, ExportConverter, ExportData, ExportError, ExportFormat};
use geo_types::{
    Coord, Geometry as GeoGeometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Point, Polygon,
};

use crate::core::{Geometry, ZCursor, SRID_UTM32, SRID_WGS84};

/// Fehler beim Lesen von GeoJSON
#[derive(Debug, Error)]
pub enum GeoJsonError {
    #[error("Ungültiges JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Pflichtfeld '{0}' fehlt")]
    MissingField(&'static str),
    #[error("Unbekannter GeoJSON-Typ '{0}'")]
    UnknownType(String),
    #[error("Ungültige Koordinaten: {0}")]
    InvalidCoordinates(String),
    #[error("Ungültiger CRS-Block: {0}")]
    InvalidCrs(String),
}

/// GeoJSON-Konverter (zustandslos)
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonConverter;

impl GeoJsonConverter {
    /// FeatureCollection mit CRS-Block; SRID aus dem ersten Datensatz, sonst UTM32
    pub fn create_feature_collection(data: &[ExportData]) -> Result<Value, ExportError> {
        let srid = data.first().map_or(SRID_UTM32, |d| d.geometry().srid);
        let features = data
            .iter()
            .map(Self::create_feature)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(json!({
            "type": "FeatureCollection",
            "crs": crs_block(srid),
            "features": features,
        }))
    }

    /// Einzelnes Feature, Properties unverändert übernommen
    pub fn create_feature(data: &ExportData) -> Result<Value, ExportError> {
        let properties: Map<String, Value> = data
            .properties()
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        Ok(json!({
            "type": "Feature",
            "geometry": Self::geometry_to_json(data.geometry())?,
            "properties": properties,
        }))
    }

    /// Geometrie-Objekt; Höhen werden als dritte Ordinate geschrieben
    pub fn geometry_to_json(geometry: &Geometry) -> Result<Value, ExportError> {
        geometry_value(&geometry.geom, &mut ZCursor::new(geometry))
    }

    /// Liest ein Geometrie-Objekt.
    ///
    /// Die Geometrie ist 3D, wenn jede Position eine dritte Ordinate hat.
    pub fn read_geometry(value: &Value, srid: u32) -> Result<Geometry, GeoJsonError> {
        let mut hoehen = Vec::new();
        let geom = read_geom(value, &mut hoehen)?;
        let hoehen: Option<Vec<f64>> = hoehen.into_iter().collect();
        Ok(match hoehen {
            Some(z) if !z.is_empty() => Geometry::with_z(srid, geom, z),
            _ => Geometry::new(srid, geom),
        })
    }

    /// Liest eine FeatureCollection; SRID aus dem CRS-Block, sonst WGS84
    pub fn read_feature_collection(text: &str) -> Result<Vec<ExportData>, GeoJsonError> {
        let root: Value = serde_json::from_str(text)?;
        let srid = match root.get("crs") {
            Some(crs) => read_crs(crs)?,
            None => SRID_WGS84,
        };

        let features = root
            .get("features")
            .and_then(Value::as_array)
            .ok_or(GeoJsonError::MissingField("features"))?;

        features
            .iter()
            .map(|feature| {
                let geometry = feature
                    .get("geometry")
                    .filter(|g| !g.is_null())
                    .ok_or(GeoJsonError::MissingField("geometry"))?;
                let properties = feature
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| {
                        props
                            .iter()
                            .map(|(k, v)| (k.clone(), property_text(v)))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(ExportData::new(
                    Self::read_geometry(geometry, srid)?,
                    properties,
                ))
            })
            .collect()
    }
}

impl ExportConverter for GeoJsonConverter {
    fn format(&self) -> ExportFormat {
        ExportFormat::GeoJson
    }

    fn convert(&self, data: &[ExportData]) -> Result<Vec<u8>, ExportError> {
        ensure_utm32(data)?;
        let collection = Self::create_feature_collection(data)?;
        Ok(serde_json::to_vec(&collection)?)
    }
}

fn crs_block(srid: u32) -> Value {
    json!({
        "type": "name",
        "properties": { "name": format!("EPSG:{}", srid) },
    })
}

fn geometry_value(geom: &GeoGeometry<f64>, z: &mut ZCursor) -> Result<Value, ExportError> {
    let value = match geom {
        GeoGeometry::Point(p) => json!({ "type": "Point", "coordinates": position(p.0, z) }),
        GeoGeometry::MultiPoint(points) => json!({
            "type": "MultiPoint",
            "coordinates": points.iter().map(|p| position(p.0, z)).collect::<Vec<_>>(),
        }),
        GeoGeometry::LineString(line) => {
            json!({ "type": "LineString", "coordinates": positions(line, z) })
        }
        GeoGeometry::Line(line) => json!({
            "type": "LineString",
            "coordinates": positions(&LineString::from(*line), z),
        }),
        GeoGeometry::MultiLineString(lines) => json!({
            "type": "MultiLineString",
            "coordinates": lines.iter().map(|l| positions(l, z)).collect::<Vec<_>>(),
        }),
        GeoGeometry::Polygon(p) => {
            json!({ "type": "Polygon", "coordinates": polygon_rings(p, z)? })
        }
        GeoGeometry::Rect(rect) => {
            json!({ "type": "Polygon", "coordinates": polygon_rings(&rect.to_polygon(), z)? })
        }
        GeoGeometry::Triangle(triangle) => json!({
            "type": "Polygon",
            "coordinates": polygon_rings(&triangle.to_polygon(), z)?,
        }),
        GeoGeometry::MultiPolygon(polys) => json!({
            "type": "MultiPolygon",
            "coordinates": polys
                .iter()
                .map(|p| polygon_rings(p, z))
                .collect::<Result<Vec<_>, _>>()?,
        }),
        GeoGeometry::GeometryCollection(members) => json!({
            "type": "GeometryCollection",
            "geometries": members
                .iter()
                .map(|m| geometry_value(m, z))
                .collect::<Result<Vec<_>, _>>()?,
        }),
    };
    Ok(value)
}

fn position(c: Coord<f64>, z: &mut ZCursor) -> Value {
    match z.next_z() {
        Some(h) => json!([c.x, c.y, h]),
        None => json!([c.x, c.y]),
    }
}

fn positions(line: &LineString<f64>, z: &mut ZCursor) -> Vec<Value> {
    line.coords().map(|c| position(*c, z)).collect()
}

fn polygon_rings(p: &Polygon<f64>, z: &mut ZCursor) -> Result<Vec<Vec<Value>>, ExportError> {
    if !p.interiors().is_empty() {
        return Err(ExportError::UnsupportedGeometry(
            "Polygone mit Innenringen werden nicht unterstützt".to_string(),
        ));
    }
    Ok(vec![positions(p.exterior(), z)])
}

fn property_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `EPSG:25832` oder `urn:ogc:def:crs:EPSG::25832`; CRS84 zählt als WGS84
fn read_crs(crs: &Value) -> Result<u32, GeoJsonError> {
    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .ok_or(GeoJsonError::MissingField("crs.properties.name"))?;

    if name.ends_with("CRS84") {
        return Ok(SRID_WGS84);
    }
    name.rsplit(':')
        .next()
        .and_then(|code| code.parse::<u32>().ok())
        .ok_or_else(|| GeoJsonError::InvalidCrs(name.to_string()))
}

fn read_geom(value: &Value, hoehen: &mut Vec<Option<f64>>) -> Result<GeoGeometry<f64>, GeoJsonError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(GeoJsonError::MissingField("type"))?;

    if kind == "GeometryCollection" {
        let members = value
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or(GeoJsonError::MissingField("geometries"))?;
        let members = members
            .iter()
            .map(|m| read_geom(m, hoehen))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(GeoGeometry::GeometryCollection(GeometryCollection::new_from(members)));
    }

    let coordinates = value
        .get("coordinates")
        .ok_or(GeoJsonError::MissingField("coordinates"))?;

    match kind {
        "Point" => Ok(Point(read_position(coordinates, hoehen)?).into()),
        "MultiPoint" => Ok(MultiPoint::new(
            read_positions(coordinates, hoehen)?
                .into_iter()
                .map(Point)
                .collect(),
        )
        .into()),
        "LineString" => Ok(LineString::new(read_positions(coordinates, hoehen)?).into()),
        "MultiLineString" => Ok(MultiLineString::new(
            as_array(coordinates)?
                .iter()
                .map(|l| read_positions(l, hoehen).map(LineString::new))
                .collect::<Result<_, _>>()?,
        )
        .into()),
        "Polygon" => Ok(read_polygon(coordinates, hoehen)?.into()),
        "MultiPolygon" => Ok(MultiPolygon::new(
            as_array(coordinates)?
                .iter()
                .map(|p| read_polygon(p, hoehen))
                .collect::<Result<_, _>>()?,
        )
        .into()),
        other => Err(GeoJsonError::UnknownType(other.to_string())),
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>, GeoJsonError> {
    value
        .as_array()
        .ok_or_else(|| GeoJsonError::InvalidCoordinates(format!("Array erwartet: {}", value)))
}

fn read_position(value: &Value, hoehen: &mut Vec<Option<f64>>) -> Result<Coord<f64>, GeoJsonError> {
    let ordinates = as_array(value)?
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| GeoJsonError::InvalidCoordinates(format!("Zahl erwartet: {}", v)))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let (x, y, z) = match ordinates.as_slice() {
        [x, y] => (*x, *y, None),
        [x, y, z, ..] => (*x, *y, Some(*z)),
        _ => {
            return Err(GeoJsonError::InvalidCoordinates(format!(
                "Position mit {} Werten",
                ordinates.len()
            )))
        }
    };
    hoehen.push(z);
    Ok(Coord { x, y })
}

fn read_positions(
    value: &Value,
    hoehen: &mut Vec<Option<f64>>,
) -> Result<Vec<Coord<f64>>, GeoJsonError> {
    as_array(value)?
        .iter()
        .map(|p| read_position(p, hoehen))
        .collect()
}

/// Offene Ringe werden mit dem ersten Punkt und dessen Höhe geschlossen
fn read_ring(value: &Value, hoehen: &mut Vec<Option<f64>>) -> Result<LineString<f64>, GeoJsonError> {
    let start = hoehen.len();
    let mut coords = read_positions(value, hoehen)?;
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
            let erste_hoehe = hoehen.get(start).copied().flatten();
            hoehen.push(erste_hoehe);
        }
    }
    Ok(LineString::new(coords))
}

fn read_polygon(value: &Value, hoehen: &mut Vec<Option<f64>>) -> Result<Polygon<f64>, GeoJsonError> {
    let mut rings = as_array(value)?
        .iter()
        .map(|r| read_ring(r, hoehen))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok(Polygon::new(exterior, rings.collect()))
}
