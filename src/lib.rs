//! RadVIS Geo-Kern Library.
//! Koordinatentransformation, Geo-Export und Konsistenzregeln für das Radnetz.

pub mod core;
pub mod export;
pub mod konsistenz;
pub mod shared;

pub use core::{
    CoordinateReferenceSystem, CoordinateReferenceSystemConverter, Envelope, Geometry,
    GeometryFactory, TransformError, WktReader, SRID_UTM32, SRID_WGS84,
};
pub use export::{ExportConverter, ExportData, ExportError, ExportFormat, FeatureCollection};
pub use konsistenz::{
    InMemoryNetzRepository, KantenAbfrage, Konsistenzregel, KonsistenzregelGruppe,
    KonsistenzregelRegistry, KonsistenzregelVerletzungsDetails, KonsistenzpruefungsErgebnis,
    NetzRepository,
};
pub use shared::RadvisOptions;
