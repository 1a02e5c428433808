//! Core-Domänentypen: Geometrien, Referenzsysteme, Transformation, Radnetz, Spatial-Index.

pub mod crs;
pub mod geometry;
pub mod netz;
pub mod spatial;
pub mod transform;
pub mod wkb;
pub mod wkt;

pub use crs::{CoordinateReferenceSystem, GeometryFactory};
pub use geometry::{xy, Envelope, Geometry, ZCursor, SRID_UTM32, SRID_WGS84};
pub use netz::{
    FuehrungsKategorie, Hoechstgeschwindigkeit, IstStandard, KantenAttribute, KantenZeile,
    KnotenZeile, Netzklasse, QuellSystem, Radverkehrsfuehrung, Richtung, Seite, SeitenAttribute,
};
pub use spatial::{SegmentIndex, SegmentMatch};
pub use transform::{CoordinateReferenceSystemConverter, TransformError};
pub use wkb::to_wkb;
pub use wkt::{to_ewkt, to_wkt, WktError, WktReader};
