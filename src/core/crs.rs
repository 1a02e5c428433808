//! Tabelle der unterstützten Koordinatenreferenzsysteme.

use geo_types::{
    Coord, Geometry as GeoGeometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};

use super::geometry::{Geometry, SRID_UTM32, SRID_WGS84};

/// Unterstützte Koordinatenreferenzsysteme (prozessweit konstant)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateReferenceSystem {
    /// WGS84, geographisch (Länge/Breite in Grad)
    Wgs84,
    /// ETRS89 / UTM Zone 32N
    Utm32,
}

impl CoordinateReferenceSystem {
    /// Alle bekannten Systeme
    pub const ALL: [CoordinateReferenceSystem; 2] = [Self::Wgs84, Self::Utm32];

    /// SRID des Systems
    pub fn srid(self) -> u32 {
        match self {
            Self::Wgs84 => SRID_WGS84,
            Self::Utm32 => SRID_UTM32,
        }
    }

    /// Sucht das System zu einer SRID
    pub fn from_srid(srid: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|crs| crs.srid() == srid)
    }

    /// Name im Format `EPSG:<srid>`
    pub fn epsg_name(self) -> String {
        format!("EPSG:{}", self.srid())
    }

    /// Anzeigename
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Wgs84 => "WGS 84",
            Self::Utm32 => "ETRS89 / UTM zone 32N",
        }
    }

    /// PROJ-Definition für `proj4rs` (entspricht der EPSG-Definition)
    pub fn proj_definition(self) -> &'static str {
        match self {
            Self::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs",
            Self::Utm32 => "+proj=utm +zone=32 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
        }
    }

    /// Geographisches System (Grad), sonst projiziert (Meter)
    pub fn is_geographic(self) -> bool {
        matches!(self, Self::Wgs84)
    }

    /// ESRI-WKT für `.prj`-Dateien
    pub fn esri_wkt(self) -> &'static str {
        match self {
            Self::Wgs84 => concat!(
                "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",",
                "SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],",
                "PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]]"
            ),
            Self::Utm32 => concat!(
                "PROJCS[\"ETRS_1989_UTM_Zone_32N\",GEOGCS[\"GCS_ETRS_1989\",",
                "DATUM[\"D_ETRS_1989\",SPHEROID[\"GRS_1980\",6378137.0,298.257222101]],",
                "PRIMEM[\"Greenwich\",0.0],UNIT[\"Degree\",0.0174532925199433]],",
                "PROJECTION[\"Transverse_Mercator\"],PARAMETER[\"False_Easting\",500000.0],",
                "PARAMETER[\"False_Northing\",0.0],PARAMETER[\"Central_Meridian\",9.0],",
                "PARAMETER[\"Scale_Factor\",0.9996],PARAMETER[\"Latitude_Of_Origin\",0.0],",
                "UNIT[\"Meter\",1.0]]"
            ),
        }
    }

    /// OGC-WKT-Definition für `gpkg_spatial_ref_sys`
    pub fn ogc_wkt(self) -> &'static str {
        match self {
            Self::Wgs84 => concat!(
                "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],",
                "PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433],",
                "AUTHORITY[\"EPSG\",\"4326\"]]"
            ),
            Self::Utm32 => concat!(
                "PROJCS[\"ETRS89 / UTM zone 32N\",GEOGCS[\"ETRS89\",DATUM[\"European_Terrestrial_Reference_System_1989\",",
                "SPHEROID[\"GRS 1980\",6378137,298.257222101]],PRIMEM[\"Greenwich\",0],",
                "UNIT[\"degree\",0.0174532925199433]],PROJECTION[\"Transverse_Mercator\"],",
                "PARAMETER[\"latitude_of_origin\",0],PARAMETER[\"central_meridian\",9],",
                "PARAMETER[\"scale_factor\",0.9996],PARAMETER[\"false_easting\",500000],",
                "PARAMETER[\"false_northing\",0],UNIT[\"metre\",1],AUTHORITY[\"EPSG\",\"25832\"]]"
            ),
        }
    }

    /// Geometrie-Factory, die alle erzeugten Geometrien mit dieser SRID versieht
    pub fn geometry_factory(self) -> GeometryFactory {
        GeometryFactory { srid: self.srid() }
    }
}

/// Erzeugt Geometrien mit fester SRID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryFactory {
    srid: u32,
}

impl GeometryFactory {
    /// SRID der erzeugten Geometrien
    pub fn srid(&self) -> u32 {
        self.srid
    }

    pub fn create_point(&self, coordinate: Coord<f64>) -> Geometry {
        Geometry::new(self.srid, Point(coordinate))
    }

    pub fn create_line_string(&self, coordinates: Vec<Coord<f64>>) -> Geometry {
        Geometry::new(self.srid, LineString::new(coordinates))
    }

    pub fn create_polygon(&self, polygon: Polygon<f64>) -> Geometry {
        Geometry::new(self.srid, polygon)
    }

    pub fn create_multi_point(&self, coordinates: Vec<Coord<f64>>) -> Geometry {
        Geometry::new(
            self.srid,
            MultiPoint::new(coordinates.into_iter().map(Point).collect()),
        )
    }

    pub fn create_multi_line_string(&self, lines: Vec<LineString<f64>>) -> Geometry {
        Geometry::new(self.srid, MultiLineString::new(lines))
    }

    pub fn create_multi_polygon(&self, polygons: Vec<Polygon<f64>>) -> Geometry {
        Geometry::new(self.srid, MultiPolygon::new(polygons))
    }

    pub fn create_geometry_collection(&self, members: Vec<GeoGeometry<f64>>) -> Geometry {
        Geometry::new(
            self.srid,
            geo_types::Geometry::GeometryCollection(geo_types::GeometryCollection::new_from(members)),
        )
    }
}
