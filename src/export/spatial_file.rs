//! Abstraktion für dateibasierte Geo-Writer (GeoPackage, Shapefile).
//!
//! Jeder Aufruf bekommt ein eigenes Temp-Verzeichnis. Es wird beim Verlassen
//! von [`write_to_bytes`] entfernt, auch wenn der Writer fehlschlägt.

use std::path::{Path, PathBuf};

use super::{ExportError, FeatureCollection};

/// Schreibt typreine Feature-Gruppen in ein Arbeitsverzeichnis
pub trait SpatialFileWriter {
    /// Schreibt alle Gruppen und liefert den Pfad der Ergebnisdatei
    fn write(&self, dir: &Path, collections: &[FeatureCollection])
        -> Result<PathBuf, ExportError>;
}

/// Führt den Writer in einem frischen Temp-Verzeichnis aus und liest das Ergebnis ein
pub fn write_to_bytes(
    writer: &dyn SpatialFileWriter,
    collections: &[FeatureCollection],
) -> Result<Vec<u8>, ExportError> {
    let dir = tempfile::Builder::new()
        .prefix("radvis-export-")
        .tempdir()?;
    log::debug!("Export-Arbeitsverzeichnis: {}", dir.path().display());

    let path = writer.write(dir.path(), collections)?;
    let bytes = std::fs::read(&path)?;
    Ok(bytes)
}
