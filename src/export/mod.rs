//! Geo-Export: gemeinsames Datenmodell, Normalisierung und die vier Ausgabeformate.
//!
//! Jeder Konverter nimmt eine Liste von [`ExportData`] entgegen und liefert
//! den fertigen Dateiinhalt als Bytes. Dateien auf der Platte entstehen nur
//! kurzlebig in einem eigenen Temp-Verzeichnis pro Aufruf.

pub mod csv;
pub mod geojson;
pub mod geopackage;
pub mod normalizer;
pub mod shp;
pub mod spatial_file;

use chrono::NaiveDate;
use indexmap::IndexMap;
use thiserror::Error;

use crate::core::{Geometry, SRID_UTM32};

pub use self::csv::CsvExportConverter;
pub use geojson::{GeoJsonConverter, GeoJsonError};
pub use geopackage::{GeoPackageExportConverter, GeoPackageWriter};
pub use normalizer::{
    build_feature_collections, clean_up_geometries, group_by_geometry_type,
    sanitize_attribute_keys, FeatureCollection,
};
pub use shp::{ShapefileWriter, ShpExportConverter};
pub use spatial_file::{write_to_bytes, SpatialFileWriter};

/// Fehler beim Schreiben eines Exportformats
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("E/A-Fehler beim Export: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON-Fehler beim Export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV-Fehler beim Export: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("ZIP-Fehler beim Export: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("GeoPackage-Fehler beim Export: {0}")]
    GeoPackage(#[from] rusqlite::Error),
    #[error("Shapefile-Fehler beim Export: {0}")]
    Shapefile(#[from] shapefile::Error),
    #[error("Ungültiger dBase-Feldname {0}")]
    Feldname(String),
    /// Produktgrenze, kein behebbarer Zustand
    #[error("Geometrie wird nicht unterstützt: {0}")]
    UnsupportedGeometry(String),
    #[error("Geometrie hat SRID {actual}, erwartet wird SRID {expected}")]
    SridMismatch { expected: u32, actual: u32 },
}

/// Ein zu exportierender Datensatz: Geometrie plus geordnete Attribute.
///
/// Nach der Erstellung unveränderlich.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportData {
    geometry: Geometry,
    properties: IndexMap<String, String>,
    headers: Option<Vec<String>>,
}

impl ExportData {
    /// Datensatz ohne explizite Spaltenreihenfolge
    pub fn new(geometry: Geometry, properties: IndexMap<String, String>) -> Self {
        Self {
            geometry,
            properties,
            headers: None,
        }
    }

    /// Datensatz mit expliziter Spaltenreihenfolge
    pub fn with_headers(
        geometry: Geometry,
        properties: IndexMap<String, String>,
        headers: Vec<String>,
    ) -> Self {
        Self {
            geometry,
            properties,
            headers: Some(headers),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    /// Deklarierte Spalten, sonst die Attributnamen in Einfügereihenfolge
    pub fn headers(&self) -> Vec<String> {
        match &self.headers {
            Some(headers) => headers.clone(),
            None => self.properties.keys().cloned().collect(),
        }
    }

    /// Gleicher Datensatz mit anderer Geometrie
    pub fn with_geometry(&self, geometry: Geometry) -> Self {
        Self {
            geometry,
            properties: self.properties.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// Unterstützte Ausgabeformate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    GeoJson,
    GeoPackage,
    Shapefile,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [Self::Csv, Self::GeoJson, Self::GeoPackage, Self::Shapefile];

    /// Kürzel im Dateinamen
    pub fn kuerzel(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::GeoJson => "geojson",
            Self::GeoPackage => "geopackage",
            Self::Shapefile => "shp",
        }
    }

    /// Dateiendung ohne Punkt
    pub fn dateiendung(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::GeoJson => "geojson",
            Self::GeoPackage => "gpkg",
            Self::Shapefile => "zip",
        }
    }

    /// `<prefix>_<kürzel>_<YYYY-MM-DD>.<endung>`
    pub fn dateiname(self, prefix: &str, datum: NaiveDate) -> String {
        format!(
            "{}_{}_{}.{}",
            prefix,
            self.kuerzel(),
            datum.format("%Y-%m-%d"),
            self.dateiendung()
        )
    }

    /// Dateiname mit dem heutigen lokalen Datum
    pub fn dateiname_heute(self, prefix: &str) -> String {
        self.dateiname(prefix, chrono::Local::now().date_naive())
    }

    /// Konverter für dieses Format
    pub fn converter(self) -> Box<dyn ExportConverter> {
        match self {
            Self::Csv => Box::new(CsvExportConverter),
            Self::GeoJson => Box::new(GeoJsonConverter),
            Self::GeoPackage => Box::new(GeoPackageExportConverter),
            Self::Shapefile => Box::new(ShpExportConverter),
        }
    }
}

/// Gemeinsame Schnittstelle aller Formatkonverter
pub trait ExportConverter {
    fn format(&self) -> ExportFormat;

    /// Serialisiert die Datensätze vollständig in den Speicher
    fn convert(&self, data: &[ExportData]) -> Result<Vec<u8>, ExportError>;
}

/// Alle Geometrien müssen in UTM32 vorliegen
pub fn ensure_utm32(data: &[ExportData]) -> Result<(), ExportError> {
    match data.iter().find(|d| d.geometry.srid != SRID_UTM32) {
        Some(wrong) => Err(ExportError::SridMismatch {
            expected: SRID_UTM32,
            actual: wrong.geometry.srid,
        }),
        None => Ok(()),
    }
}
