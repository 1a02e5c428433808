//! GeoPackage-Export über SQLite.
//!
//! Eine Feature-Tabelle pro Geometrietyp-Gruppe. Geometrien werden als
//! GeoPackage-Binary gespeichert: `GP`-Header mit Envelope, danach ISO-WKB.

use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter, types::Value, Connection};

use super::spatial_file::{write_to_bytes, SpatialFileWriter};
use super::{
    build_feature_collections, ensure_utm32, ExportConverter, ExportData, ExportError,
    ExportFormat, FeatureCollection,
};
use crate::core::{to_wkb, CoordinateReferenceSystem, Geometry};

/// `GPKG` als Big-Endian-Integer
const GPKG_APPLICATION_ID: i32 = 0x4750_4B47;
/// GeoPackage 1.3.0
const GPKG_USER_VERSION: i32 = 10300;
/// Little Endian, Envelope [minx, maxx, miny, maxy]
const GPKG_FLAGS_ENVELOPE_XY: u8 = 0b0000_0011;
/// Little Endian, kein Envelope, leere Geometrie
const GPKG_FLAGS_EMPTY: u8 = 0b0001_0001;

const GEOMETRY_COLUMN: &str = "geom";
const FID_COLUMN: &str = "fid";

/// Dateiname im Arbeitsverzeichnis
pub const GPKG_FILE_NAME: &str = "export.gpkg";

/// Kodiert eine Geometrie als GeoPackage-Binary
pub fn gpkg_binary(geometry: &Geometry) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 32 + 64);
    out.extend_from_slice(b"GP");
    out.push(0); // Version 1
    match geometry.envelope() {
        Some(envelope) => {
            out.push(GPKG_FLAGS_ENVELOPE_XY);
            out.extend_from_slice(&(geometry.srid as i32).to_le_bytes());
            for value in [
                envelope.min_x,
                envelope.max_x,
                envelope.min_y,
                envelope.max_y,
            ] {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        None => {
            out.push(GPKG_FLAGS_EMPTY);
            out.extend_from_slice(&(geometry.srid as i32).to_le_bytes());
        }
    }
    out.extend(to_wkb(geometry));
    out
}

/// Quotet einen SQL-Bezeichner
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Tabellenname einer Gruppe (`export-MultiPoint` → `export_multipoint`)
pub fn table_name(collection: &FeatureCollection) -> String {
    collection.name.replace('-', "_").to_lowercase()
}

/// Spaltennamen zum Schema; SQLite unterscheidet Groß/Klein nicht, daher eindeutig machen
fn column_names(schema: &[String]) -> Vec<String> {
    let mut used: Vec<String> = vec![FID_COLUMN.to_string(), GEOMETRY_COLUMN.to_string()];
    let mut columns = Vec::with_capacity(schema.len());
    for key in schema {
        let mut candidate = key.clone();
        let mut counter = 2;
        while used.contains(&candidate.to_lowercase()) {
            candidate = format!("{}_{}", key, counter);
            counter += 1;
        }
        used.push(candidate.to_lowercase());
        columns.push(candidate);
    }
    columns
}

/// Schreibt GeoPackage-Dateien mit rusqlite
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoPackageWriter;

impl GeoPackageWriter {
    fn create_metadata_tables(conn: &Connection) -> Result<(), ExportError> {
        conn.execute_batch(&format!(
            "PRAGMA application_id = {}; PRAGMA user_version = {};",
            GPKG_APPLICATION_ID, GPKG_USER_VERSION
        ))?;

        conn.execute_batch(
            "CREATE TABLE gpkg_spatial_ref_sys (
                srs_name TEXT NOT NULL,
                srs_id INTEGER NOT NULL PRIMARY KEY,
                organization TEXT NOT NULL,
                organization_coordsys_id INTEGER NOT NULL,
                definition TEXT NOT NULL,
                description TEXT
            );
            CREATE TABLE gpkg_contents (
                table_name TEXT NOT NULL PRIMARY KEY,
                data_type TEXT NOT NULL,
                identifier TEXT UNIQUE,
                description TEXT DEFAULT '',
                last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                min_x DOUBLE,
                min_y DOUBLE,
                max_x DOUBLE,
                max_y DOUBLE,
                srs_id INTEGER,
                CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
            );
            CREATE TABLE gpkg_geometry_columns (
                table_name TEXT NOT NULL,
                column_name TEXT NOT NULL,
                geometry_type_name TEXT NOT NULL,
                srs_id INTEGER NOT NULL,
                z TINYINT NOT NULL,
                m TINYINT NOT NULL,
                CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
                CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
                CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
            );
            INSERT INTO gpkg_spatial_ref_sys VALUES
                ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', 'undefined cartesian coordinate reference system'),
                ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', 'undefined geographic coordinate reference system');",
        )?;

        let mut insert = conn.prepare(
            "INSERT INTO gpkg_spatial_ref_sys
                (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
             VALUES (?1, ?2, 'EPSG', ?2, ?3, ?4)",
        )?;
        for crs in CoordinateReferenceSystem::ALL {
            insert.execute(params![
                crs.display_name(),
                crs.srid(),
                crs.ogc_wkt(),
                crs.epsg_name()
            ])?;
        }
        Ok(())
    }

    fn write_collection(conn: &Connection, collection: &FeatureCollection) -> Result<(), ExportError> {
        let table = table_name(collection);
        let columns = column_names(&collection.schema);
        let srid = collection
            .features
            .first()
            .map_or(CoordinateReferenceSystem::Utm32.srid(), |f| f.geometry().srid);
        let geometry_type = collection.geometry_type.to_uppercase();

        let mut ddl = format!(
            "CREATE TABLE {} ({} INTEGER PRIMARY KEY AUTOINCREMENT, {} {}",
            quote_identifier(&table),
            FID_COLUMN,
            GEOMETRY_COLUMN,
            geometry_type
        );
        for column in &columns {
            ddl.push_str(&format!(", {} TEXT", quote_identifier(column)));
        }
        ddl.push(')');
        conn.execute(&ddl, [])?;

        let envelope = collection
            .features
            .iter()
            .filter_map(|f| f.geometry().envelope())
            .reduce(|a, b| a.union(&b));

        conn.execute(
            "INSERT INTO gpkg_contents (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id)
             VALUES (?1, 'features', ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                table,
                collection.name,
                envelope.map(|e| e.min_x),
                envelope.map(|e| e.min_y),
                envelope.map(|e| e.max_x),
                envelope.map(|e| e.max_y),
                srid
            ],
        )?;
        conn.execute(
            "INSERT INTO gpkg_geometry_columns VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                table,
                GEOMETRY_COLUMN,
                geometry_type,
                srid,
                i32::from(collection.has_z())
            ],
        )?;

        let placeholders: Vec<String> = (1..=columns.len() + 1).map(|i| format!("?{}", i)).collect();
        let column_list: Vec<String> = std::iter::once(GEOMETRY_COLUMN.to_string())
            .chain(columns.iter().map(|c| quote_identifier(c)))
            .collect();
        let mut insert = conn.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(&table),
            column_list.join(", "),
            placeholders.join(", ")
        ))?;

        for feature in &collection.features {
            let properties = feature.properties();
            let values = std::iter::once(Value::Blob(gpkg_binary(feature.geometry()))).chain(
                collection.schema.iter().map(|key| match properties.get(key) {
                    Some(v) => Value::Text(v.clone()),
                    None => Value::Null,
                }),
            );
            insert.execute(params_from_iter(values))?;
        }

        log::debug!(
            "GeoPackage-Tabelle {} mit {} Features geschrieben",
            table,
            collection.features.len()
        );
        Ok(())
    }
}

impl SpatialFileWriter for GeoPackageWriter {
    fn write(&self, dir: &Path, collections: &[FeatureCollection]) -> Result<PathBuf, ExportError> {
        let path = dir.join(GPKG_FILE_NAME);
        let mut conn = Connection::open(&path)?;
        {
            let tx = conn.transaction()?;
            Self::create_metadata_tables(&tx)?;
            for collection in collections {
                Self::write_collection(&tx, collection)?;
            }
            tx.commit()?;
        }
        conn.close().map_err(|(_, e)| ExportError::GeoPackage(e))?;
        Ok(path)
    }
}

/// GeoPackage-Konverter: Normalisierung, Gruppierung, SQLite-Datei, Bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoPackageExportConverter;

impl ExportConverter for GeoPackageExportConverter {
    fn format(&self) -> ExportFormat {
        ExportFormat::GeoPackage
    }

    fn convert(&self, data: &[ExportData]) -> Result<Vec<u8>, ExportError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        ensure_utm32(data)?;

        let collections = build_feature_collections(data.to_vec());
        write_to_bytes(&GeoPackageWriter, &collections)
    }
}
