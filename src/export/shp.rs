//! Shapefile-Export: pro Geometrietyp ein Satz `.shp/.shx/.dbf/.prj/.cpg`, gezippt.
//!
//! `.shp`, `.shx` und `.dbf` schreibt das `shapefile`-Crate (dBase über das
//! re-exportierte `dbase`). Höhenwerte werden nicht geschrieben (nur
//! 2D-Shapetypen). Attributnamen werden auf 10 Bytes gekürzt, Werte als
//! UTF-8-Zeichenfelder.

use std::io::Write;
use std::path::{Path, PathBuf};

use geo::orient::{Direction, Orient};
use geo_types::{Geometry as GeoGeometry, LineString, Polygon};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Multipoint, PolygonRing, Polyline};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::normalizer::truncate_bytes;
use super::spatial_file::{write_to_bytes, SpatialFileWriter};
use super::{
    build_feature_collections, ensure_utm32, sanitize_attribute_keys, ExportConverter,
    ExportData, ExportError, ExportFormat, FeatureCollection,
};
use crate::core::{CoordinateReferenceSystem, Geometry};

/// dBase-Zeichenfelder sind auf 254 Bytes begrenzt
const DBF_MAX_FIELD_LEN: usize = 254;

/// Name des Zip-Archivs im Arbeitsverzeichnis
pub const ZIP_FILE_NAME: &str = "export.zip";

/// Dateiendungen eines Shapefile-Satzes in Archivreihenfolge
const EXTENSIONS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

/// Eine Geometrie als Shapefile-Form
#[derive(Debug)]
enum Form {
    Punkt(shapefile::Point),
    Punkte(Multipoint),
    Linie(Polyline),
    Flaeche(shapefile::Polygon),
}

fn unsupported(geometry: &Geometry, grund: &str) -> ExportError {
    ExportError::UnsupportedGeometry(format!(
        "{} kann nicht als Shapefile geschrieben werden: {}",
        geometry.type_name(),
        grund
    ))
}

fn punkte(line: &LineString<f64>) -> Vec<shapefile::Point> {
    line.coords()
        .map(|c| shapefile::Point::new(c.x, c.y))
        .collect()
}

/// Ringe einer Fläche: außen im Uhrzeigersinn, Löcher gegen den Uhrzeigersinn
fn ringe(polygon: &Polygon<f64>, out: &mut Vec<PolygonRing<shapefile::Point>>) -> bool {
    if polygon.exterior().0.len() < 4 {
        return false;
    }
    let oriented = polygon.orient(Direction::Reversed);
    out.push(PolygonRing::Outer(punkte(oriented.exterior())));
    for interior in oriented.interiors() {
        if interior.0.len() < 4 {
            return false;
        }
        out.push(PolygonRing::Inner(punkte(interior)));
    }
    true
}

/// Wandelt eine Geometrie in die Form des Shapefiles um.
///
/// Leere Geometrien und entartete Teile (Linien unter zwei Punkten, Ringe
/// unter vier) werden abgelehnt.
fn form_of(geometry: &Geometry) -> Result<Form, ExportError> {
    if geometry.is_empty() {
        return Err(unsupported(geometry, "leere Geometrie"));
    }

    match &geometry.geom {
        GeoGeometry::Point(p) => Ok(Form::Punkt(shapefile::Point::new(p.x(), p.y()))),
        GeoGeometry::MultiPoint(points) => Ok(Form::Punkte(Multipoint::new(
            points
                .iter()
                .map(|p| shapefile::Point::new(p.x(), p.y()))
                .collect(),
        ))),
        GeoGeometry::LineString(_) | GeoGeometry::MultiLineString(_) => {
            let lines: Vec<&LineString<f64>> = match &geometry.geom {
                GeoGeometry::LineString(line) => vec![line],
                GeoGeometry::MultiLineString(lines) => lines.iter().collect(),
                _ => Vec::new(),
            };
            let parts: Vec<Vec<shapefile::Point>> = lines
                .into_iter()
                .filter(|l| !l.0.is_empty())
                .map(punkte)
                .collect();
            if parts.iter().any(|part| part.len() < 2) {
                return Err(unsupported(geometry, "Linie mit weniger als zwei Punkten"));
            }
            Ok(Form::Linie(Polyline::with_parts(parts)))
        }
        GeoGeometry::Polygon(_) | GeoGeometry::MultiPolygon(_) => {
            let polygons: Vec<&Polygon<f64>> = match &geometry.geom {
                GeoGeometry::Polygon(polygon) => vec![polygon],
                GeoGeometry::MultiPolygon(polygons) => polygons.iter().collect(),
                _ => Vec::new(),
            };
            let mut rings = Vec::new();
            for polygon in polygons.into_iter().filter(|p| !p.exterior().0.is_empty()) {
                if !ringe(polygon, &mut rings) {
                    return Err(unsupported(geometry, "Ring mit weniger als vier Punkten"));
                }
            }
            Ok(Form::Flaeche(shapefile::Polygon::with_rings(rings)))
        }
        _ => Err(unsupported(geometry, "Typ ohne Shapefile-Entsprechung")),
    }
}

/// Spalten der `.dbf`: gekürzte Feldnamen, Zeilenwerte und Feldlängen
#[derive(Debug, Clone, PartialEq)]
pub struct DbfTabelle {
    pub feldnamen: Vec<String>,
    pub feldlaengen: Vec<u8>,
    pub zeilen: Vec<Vec<String>>,
}

impl DbfTabelle {
    /// Baut die Tabelle aus dem Schema einer Gruppe.
    ///
    /// dBase braucht mindestens ein Feld; ohne Attribute wird eine
    /// laufende `id` geschrieben.
    pub fn aus_gruppe(collection: &FeatureCollection) -> Self {
        let name_map: indexmap::IndexMap<String, String> = collection
            .schema
            .iter()
            .map(|k| (k.clone(), k.clone()))
            .collect();
        let mut feldnamen: Vec<String> = sanitize_attribute_keys(&name_map).into_keys().collect();

        let mut zeilen: Vec<Vec<String>> = collection
            .features
            .iter()
            .map(|f| {
                collection
                    .schema
                    .iter()
                    .map(|key| {
                        let value = f.properties().get(key).map(String::as_str).unwrap_or("");
                        truncate_bytes(value, DBF_MAX_FIELD_LEN).to_string()
                    })
                    .collect()
            })
            .collect();

        if feldnamen.is_empty() {
            feldnamen.push("id".to_string());
            for (i, zeile) in zeilen.iter_mut().enumerate() {
                zeile.push((i + 1).to_string());
            }
        }

        let feldlaengen = (0..feldnamen.len())
            .map(|spalte| {
                let laenge = zeilen
                    .iter()
                    .map(|z| z[spalte].len())
                    .max()
                    .unwrap_or(0)
                    .clamp(1, DBF_MAX_FIELD_LEN);
                u8::try_from(laenge).unwrap_or(u8::MAX)
            })
            .collect();

        Self {
            feldnamen,
            feldlaengen,
            zeilen,
        }
    }

    fn table_builder(&self) -> Result<TableWriterBuilder, ExportError> {
        let mut builder = TableWriterBuilder::new();
        for (name, laenge) in self.feldnamen.iter().zip(&self.feldlaengen) {
            let feld = FieldName::try_from(name.as_str())
                .map_err(|e| ExportError::Feldname(format!("{}: {:?}", name, e)))?;
            builder = builder.add_character_field(feld, *laenge);
        }
        Ok(builder)
    }

    fn record(&self, zeile: &[String]) -> Record {
        let mut record = Record::default();
        for (name, wert) in self.feldnamen.iter().zip(zeile) {
            record.insert(name.clone(), FieldValue::Character(Some(wert.clone())));
        }
        record
    }
}

/// Schreibt den Dateisatz einer Gruppe nach `dir` und liefert die Pfade
pub fn write_collection(
    dir: &Path,
    collection: &FeatureCollection,
) -> Result<Vec<PathBuf>, ExportError> {
    let tabelle = DbfTabelle::aus_gruppe(collection);
    let formen = collection
        .features
        .iter()
        .map(|f| form_of(f.geometry()))
        .collect::<Result<Vec<_>, _>>()?;

    {
        let mut writer = shapefile::Writer::from_path(
            dir.join(format!("{}.shp", collection.name)),
            tabelle.table_builder()?,
        )?;
        for (form, zeile) in formen.iter().zip(&tabelle.zeilen) {
            let record = tabelle.record(zeile);
            match form {
                Form::Punkt(p) => writer.write_shape_and_record(p, &record)?,
                Form::Punkte(p) => writer.write_shape_and_record(p, &record)?,
                Form::Linie(l) => writer.write_shape_and_record(l, &record)?,
                Form::Flaeche(f) => writer.write_shape_and_record(f, &record)?,
            }
        }
        // Drop schließt .shp/.shx/.dbf und schreibt die Header
    }

    std::fs::write(
        dir.join(format!("{}.prj", collection.name)),
        CoordinateReferenceSystem::Utm32.esri_wkt(),
    )?;
    std::fs::write(dir.join(format!("{}.cpg", collection.name)), "UTF-8")?;

    Ok(EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", collection.name, ext)))
        .collect())
}

/// Schreibt alle Gruppen als Shapefile-Sätze in ein Zip-Archiv
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapefileWriter;

impl SpatialFileWriter for ShapefileWriter {
    fn write(&self, dir: &Path, collections: &[FeatureCollection]) -> Result<PathBuf, ExportError> {
        let mut dateien = Vec::new();
        for collection in collections {
            dateien.extend(write_collection(dir, collection)?);
            log::debug!(
                "Shapefile {} mit {} Features geschrieben",
                collection.name,
                collection.features.len()
            );
        }

        let path = dir.join(ZIP_FILE_NAME);
        let mut zip = ZipWriter::new(std::fs::File::create(&path)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for datei in &dateien {
            let Some(name) = datei.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            zip.start_file(name, options)?;
            zip.write_all(&std::fs::read(datei)?)?;
        }
        zip.finish()?;
        Ok(path)
    }
}

/// Shapefile-Konverter: Normalisierung, Gruppierung, Zip, Bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct ShpExportConverter;

impl ExportConverter for ShpExportConverter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Shapefile
    }

    fn convert(&self, data: &[ExportData]) -> Result<Vec<u8>, ExportError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        ensure_utm32(data)?;

        let collections = build_feature_collections(data.to_vec());
        write_to_bytes(&ShapefileWriter, &collections)
    }
}
