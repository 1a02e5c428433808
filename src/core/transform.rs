//! Koordinatentransformation WGS84 ⇄ ETRS89/UTM32 mit Achsen-Plausibilisierung.
//!
//! Die Projektion rechnet `proj4rs` aus den PROJ-Definitionen der
//! [`CoordinateReferenceSystem`]-Tabelle. ETRS89 und WGS84 werden als
//! datumsgleich behandelt (`towgs84=0`).

use geo::MapCoords;
use geo_types::Coord;
use proj4rs::proj::Proj;
use thiserror::Error;

use super::crs::CoordinateReferenceSystem;
use super::geometry::{Envelope, Geometry};

/// Zentralmeridian Zone 32 (Grad)
const UTM32_LAMBDA0_DEG: f64 = 9.0;
/// Maximaler Längenabstand zum Zentralmeridian, jenseits dessen die Zone nicht mehr trägt
const MAX_LAMBDA_OFFSET_DEG: f64 = 30.0;

/// Fehler der Koordinatentransformation
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    /// Definitionsbereich verlassen oder PROJ-Rechnung fehlgeschlagen
    #[error("Transformation fehlgeschlagen: {0}")]
    Transformation(String),
    /// Für das SRID-Paar ist keine Transformation registriert
    #[error("Keine Transformation von SRID {from_srid} nach SRID {to_srid} registriert")]
    Factory { from_srid: u32, to_srid: u32 },
    /// Weder Lat/Long- noch Long/Lat-Reihenfolge liegt im unterstützten Gebiet
    #[error("Geometrie liegt in keiner Achsenreihenfolge innerhalb des unterstützten Gebiets {envelope:?}")]
    OutOfSupportedArea { envelope: Envelope },
}

fn proj_error(e: proj4rs::errors::Error) -> TransformError {
    TransformError::Transformation(e.to_string())
}

/// Prüft geographische Koordinaten (Grad) gegen den Bereich der Zone
fn check_geographic(lon: f64, lat: f64) -> Result<(), TransformError> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(TransformError::Transformation(format!(
            "nicht-endliche Koordinate ({}, {})",
            lon, lat
        )));
    }
    if lat.abs() > 90.0 {
        return Err(TransformError::Transformation(format!(
            "Breite {} außerhalb von ±90°",
            lat
        )));
    }
    if (lon - UTM32_LAMBDA0_DEG).abs() > MAX_LAMBDA_OFFSET_DEG {
        return Err(TransformError::Transformation(format!(
            "Länge {} zu weit vom Zentralmeridian entfernt",
            lon
        )));
    }
    Ok(())
}

fn check_finite(x: f64, y: f64) -> Result<(), TransformError> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(TransformError::Transformation(format!(
            "nicht-endliche Koordinate ({}, {})",
            x, y
        )))
    }
}

/// Ein vorbereiteter Transformationsschritt zwischen zwei Systemen
struct Projektion {
    from: CoordinateReferenceSystem,
    to: CoordinateReferenceSystem,
    from_proj: Proj,
    to_proj: Proj,
}

impl Projektion {
    fn new(
        from: CoordinateReferenceSystem,
        to: CoordinateReferenceSystem,
    ) -> Result<Self, TransformError> {
        Ok(Self {
            from,
            to,
            from_proj: Proj::from_proj_string(from.proj_definition()).map_err(proj_error)?,
            to_proj: Proj::from_proj_string(to.proj_definition()).map_err(proj_error)?,
        })
    }

    /// Geographische Ein- und Ausgaben in Grad, `proj4rs` rechnet in Radiant
    fn apply(&self, c: Coord<f64>) -> Result<Coord<f64>, TransformError> {
        if self.from.is_geographic() {
            check_geographic(c.x, c.y)?;
        } else {
            check_finite(c.x, c.y)?;
        }

        let mut point = if self.from.is_geographic() {
            (c.x.to_radians(), c.y.to_radians(), 0.0)
        } else {
            (c.x, c.y, 0.0)
        };
        proj4rs::transform::transform(&self.from_proj, &self.to_proj, &mut point)
            .map_err(proj_error)?;

        let (x, y) = if self.to.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        check_finite(x, y)?;
        if self.to.is_geographic() {
            check_geographic(x, y).map_err(|_| {
                TransformError::Transformation(format!(
                    "Koordinate ({}, {}) liegt außerhalb des Zonenbereichs",
                    c.x, c.y
                ))
            })?;
        }
        Ok(Coord { x, y })
    }
}

/// Transformations-Service mit konfiguriertem Landes-Envelope (UTM32)
#[derive(Debug, Clone)]
pub struct CoordinateReferenceSystemConverter {
    envelope: Envelope,
}

impl CoordinateReferenceSystemConverter {
    /// Erstellt den Service; `envelope` ist das unterstützte Gebiet in UTM32
    pub fn new(envelope: Envelope) -> Self {
        Self { envelope }
    }

    /// Unterstütztes Gebiet (UTM32)
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Transformiert eine einzelne Koordinate
    pub fn transform(
        coordinate: Coord<f64>,
        from: CoordinateReferenceSystem,
        to: CoordinateReferenceSystem,
    ) -> Result<Coord<f64>, TransformError> {
        if from == to {
            return Ok(coordinate);
        }
        Projektion::new(from, to)?.apply(coordinate)
    }

    /// Wie [`Self::transform`], aber über SRIDs; unbekannte SRIDs → `Factory`
    pub fn transform_srid(
        coordinate: Coord<f64>,
        from_srid: u32,
        to_srid: u32,
    ) -> Result<Coord<f64>, TransformError> {
        let (from, to) = resolve_pair(from_srid, to_srid)?;
        Self::transform(coordinate, from, to)
    }

    /// Transformiert jede Koordinate einer Geometrie in das Ziel-KBS.
    ///
    /// Höhen werden unverändert übernommen.
    pub fn transform_geometry(
        geometry: &Geometry,
        to: CoordinateReferenceSystem,
    ) -> Result<Geometry, TransformError> {
        let (from, to) = resolve_pair(geometry.srid, to.srid())?;
        if from == to {
            return Ok(geometry.clone());
        }

        let projektion = Projektion::new(from, to)?;
        let geom = geometry.geom.try_map_coords(|c| projektion.apply(c))?;
        Ok(Geometry {
            srid: to.srid(),
            geom,
            z: geometry.z.clone(),
        })
    }

    /// Transformation ohne Fehlerrückgabe.
    ///
    /// Nur für Eingaben, die der Aufrufer bereits validiert hat.
    ///
    /// # Panics
    /// Wenn die Transformation fehlschlägt.
    pub fn transform_geometry_unchecked(
        geometry: &Geometry,
        to: CoordinateReferenceSystem,
    ) -> Geometry {
        Self::transform_geometry(geometry, to)
            .unwrap_or_else(|e| panic!("Ungeprüfte Transformation fehlgeschlagen: {}", e))
    }

    /// `true` wenn die Bounding Box der Geometrie vollständig im Envelope liegt
    pub fn is_plausible(geometry: &Geometry, envelope: &Envelope) -> bool {
        geometry
            .envelope()
            .is_some_and(|bbox| envelope.contains_envelope(&bbox))
    }

    /// Ermittelt, ob eine WGS84-Geometrie mit vertauschten Achsen vorliegt.
    ///
    /// 1. Geometrie unverändert nach UTM32 → plausibel ⇒ `false`
    /// 2. x/y getauscht nach UTM32 → plausibel ⇒ `true`
    /// 3. sonst `OutOfSupportedArea`
    ///
    /// Transformationsfehler eines Versuchs zählen als "nicht plausibel".
    pub fn muss_lat_long_getauscht_werden(
        &self,
        geometry: &Geometry,
    ) -> Result<bool, TransformError> {
        let as_is = Geometry {
            srid: CoordinateReferenceSystem::Wgs84.srid(),
            ..geometry.clone()
        };
        if self.is_plausible_in_utm32(&as_is, "unverändert") {
            return Ok(false);
        }

        let swapped = as_is.swap_xy();
        if self.is_plausible_in_utm32(&swapped, "getauscht") {
            return Ok(true);
        }

        Err(TransformError::OutOfSupportedArea {
            envelope: self.envelope,
        })
    }

    fn is_plausible_in_utm32(&self, wgs84: &Geometry, attempt: &str) -> bool {
        match Self::transform_geometry(wgs84, CoordinateReferenceSystem::Utm32) {
            Ok(utm) => Self::is_plausible(&utm, &self.envelope),
            Err(e) => {
                log::debug!("Achsenprüfung ({}) nicht transformierbar: {}", attempt, e);
                false
            }
        }
    }

    /// Bringt eine Geometrie nach UTM32.
    ///
    /// WGS84-Eingaben werden vorher in die plausible Achsenreihenfolge
    /// gebracht; UTM32-Eingaben müssen im Envelope liegen.
    pub fn to_utm32_mit_achsenkorrektur(
        &self,
        geometry: &Geometry,
    ) -> Result<Geometry, TransformError> {
        match CoordinateReferenceSystem::from_srid(geometry.srid) {
            Some(CoordinateReferenceSystem::Utm32) => {
                if Self::is_plausible(geometry, &self.envelope) {
                    Ok(geometry.clone())
                } else {
                    Err(TransformError::OutOfSupportedArea {
                        envelope: self.envelope,
                    })
                }
            }
            Some(CoordinateReferenceSystem::Wgs84) => {
                let oriented = if self.muss_lat_long_getauscht_werden(geometry)? {
                    log::info!("Lat/Long-Reihenfolge vertauscht, korrigiere Achsen");
                    geometry.swap_xy()
                } else {
                    geometry.clone()
                };
                Self::transform_geometry(&oriented, CoordinateReferenceSystem::Utm32)
            }
            None => Err(TransformError::Factory {
                from_srid: geometry.srid,
                to_srid: CoordinateReferenceSystem::Utm32.srid(),
            }),
        }
    }
}

fn resolve_pair(
    from_srid: u32,
    to_srid: u32,
) -> Result<(CoordinateReferenceSystem, CoordinateReferenceSystem), TransformError> {
    match (
        CoordinateReferenceSystem::from_srid(from_srid),
        CoordinateReferenceSystem::from_srid(to_srid),
    ) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(TransformError::Factory { from_srid, to_srid }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{SRID_UTM32, SRID_WGS84};
    use approx::assert_abs_diff_eq;
    use geo_types::{coord, line_string, point};

    fn bw_envelope() -> Envelope {
        Envelope::new(380_000.0, 620_000.0, 5_250_000.0, 5_530_000.0)
    }

    fn wgs84_point(x: f64, y: f64) -> Geometry {
        Geometry::new(SRID_WGS84, point!(x: x, y: y))
    }

    #[test]
    fn central_meridian_maps_to_false_easting() {
        let utm = CoordinateReferenceSystemConverter::transform(
            coord! { x: 9.0, y: 48.0 },
            CoordinateReferenceSystem::Wgs84,
            CoordinateReferenceSystem::Utm32,
        )
        .expect("Transformation erwartet");

        assert_abs_diff_eq!(utm.x, 500_000.0, epsilon = 1e-6);
        assert!(utm.y > 5_300_000.0 && utm.y < 5_330_000.0);
    }

    #[test]
    fn stuttgart_lands_in_expected_area() {
        let utm = CoordinateReferenceSystemConverter::transform(
            coord! { x: 9.18, y: 48.78 },
            CoordinateReferenceSystem::Wgs84,
            CoordinateReferenceSystem::Utm32,
        )
        .expect("Transformation erwartet");

        assert!(utm.x > 510_000.0 && utm.x < 516_000.0, "x = {}", utm.x);
        assert!(utm.y > 5_398_000.0 && utm.y < 5_408_000.0, "y = {}", utm.y);
    }

    #[test]
    fn forward_and_inverse_are_consistent() {
        for &(lon, lat) in &[(7.6, 47.6), (9.18, 48.78), (10.4, 49.7), (8.4, 49.0)] {
            let utm = CoordinateReferenceSystemConverter::transform(
                coord! { x: lon, y: lat },
                CoordinateReferenceSystem::Wgs84,
                CoordinateReferenceSystem::Utm32,
            )
            .expect("Transformation erwartet");
            let back = CoordinateReferenceSystemConverter::transform(
                utm,
                CoordinateReferenceSystem::Utm32,
                CoordinateReferenceSystem::Wgs84,
            )
            .expect("Rücktransformation erwartet");

            assert_abs_diff_eq!(back.x, lon, epsilon = 1e-8);
            assert_abs_diff_eq!(back.y, lat, epsilon = 1e-8);
        }
    }

    #[test]
    fn easting_is_symmetric_around_central_meridian() {
        let west = CoordinateReferenceSystemConverter::transform(
            coord! { x: 8.0, y: 48.5 },
            CoordinateReferenceSystem::Wgs84,
            CoordinateReferenceSystem::Utm32,
        )
        .expect("Transformation erwartet");
        let east = CoordinateReferenceSystemConverter::transform(
            coord! { x: 10.0, y: 48.5 },
            CoordinateReferenceSystem::Wgs84,
            CoordinateReferenceSystem::Utm32,
        )
        .expect("Transformation erwartet");

        assert_abs_diff_eq!(500_000.0 - west.x, east.x - 500_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(west.y, east.y, epsilon = 1e-6);
    }

    #[test]
    fn out_of_domain_input_is_a_transformation_error() {
        let result = CoordinateReferenceSystemConverter::transform(
            coord! { x: 120.0, y: 10.0 },
            CoordinateReferenceSystem::Wgs84,
            CoordinateReferenceSystem::Utm32,
        );
        assert!(matches!(result, Err(TransformError::Transformation(_))));

        let result = CoordinateReferenceSystemConverter::transform(
            coord! { x: f64::NAN, y: 48.0 },
            CoordinateReferenceSystem::Wgs84,
            CoordinateReferenceSystem::Utm32,
        );
        assert!(matches!(result, Err(TransformError::Transformation(_))));
    }

    #[test]
    fn unknown_srid_is_a_factory_error() {
        let result = CoordinateReferenceSystemConverter::transform_srid(
            coord! { x: 1.0, y: 2.0 },
            31467,
            SRID_UTM32,
        );

        assert_eq!(
            result,
            Err(TransformError::Factory {
                from_srid: 31467,
                to_srid: SRID_UTM32
            })
        );
    }

    #[test]
    fn geometry_transform_updates_srid() {
        let utm = CoordinateReferenceSystemConverter::transform_geometry(
            &wgs84_point(9.18, 48.78),
            CoordinateReferenceSystem::Utm32,
        )
        .expect("Transformation erwartet");

        assert_eq!(utm.srid, SRID_UTM32);
        assert!(CoordinateReferenceSystemConverter::is_plausible(&utm, &bw_envelope()));
    }

    #[test]
    #[should_panic(expected = "Ungeprüfte Transformation fehlgeschlagen")]
    fn unchecked_transform_panics_on_failure() {
        CoordinateReferenceSystemConverter::transform_geometry_unchecked(
            &wgs84_point(150.0, 10.0),
            CoordinateReferenceSystem::Utm32,
        );
    }

    #[test]
    fn axis_order_in_original_order_needs_no_swap() {
        let converter = CoordinateReferenceSystemConverter::new(bw_envelope());

        assert_eq!(
            converter.muss_lat_long_getauscht_werden(&wgs84_point(9.18, 48.78)),
            Ok(false)
        );
    }

    #[test]
    fn axis_order_swapped_is_detected() {
        let converter = CoordinateReferenceSystemConverter::new(bw_envelope());

        assert_eq!(
            converter.muss_lat_long_getauscht_werden(&wgs84_point(48.78, 9.18)),
            Ok(true)
        );
    }

    #[test]
    fn axis_order_outside_area_fails() {
        let converter = CoordinateReferenceSystemConverter::new(bw_envelope());

        assert_eq!(
            converter.muss_lat_long_getauscht_werden(&wgs84_point(2.35, 48.85)),
            Err(TransformError::OutOfSupportedArea {
                envelope: bw_envelope()
            })
        );
    }

    #[test]
    fn axis_correction_swaps_and_reprojects() {
        let converter = CoordinateReferenceSystemConverter::new(bw_envelope());
        let corrected = converter
            .to_utm32_mit_achsenkorrektur(&wgs84_point(48.78, 9.18))
            .expect("Korrektur erwartet");
        let direct = CoordinateReferenceSystemConverter::transform_geometry(
            &wgs84_point(9.18, 48.78),
            CoordinateReferenceSystem::Utm32,
        )
        .expect("Transformation erwartet");

        assert_eq!(corrected, direct);
    }

    #[test]
    fn geometry_transform_keeps_heights() {
        let linie = Geometry::with_z(
            SRID_WGS84,
            line_string![(x: 9.0, y: 48.0), (x: 9.1, y: 48.1)],
            vec![250.0, 260.0],
        );
        let utm = CoordinateReferenceSystemConverter::transform_geometry(
            &linie,
            CoordinateReferenceSystem::Utm32,
        )
        .expect("Transformation erwartet");

        assert_eq!(utm.z, Some(vec![250.0, 260.0]));
        assert_abs_diff_eq!(
            utm.first_coord().expect("Koordinate erwartet").x,
            500_000.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn utm_far_outside_zone_is_rejected_on_inverse() {
        let result = CoordinateReferenceSystemConverter::transform(
            coord! { x: 9.0e7, y: 5.0e6 },
            CoordinateReferenceSystem::Utm32,
            CoordinateReferenceSystem::Wgs84,
        );

        assert!(matches!(result, Err(TransformError::Transformation(_))));
    }
}
