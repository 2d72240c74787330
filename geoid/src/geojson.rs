//! GeoJSON height enrichment.
//!
//! This module adds geoid heights to GeoJSON geometries, or converts the
//! heights they already carry between the ellipsoid and the geoid. Enable
//! the `geojson` feature to use this module.
//!
//! # Example
//!
//! ```ignore
//! use geoid::{Geoid, Interpolation};
//! use geoid::geojson::add_heights_to_geometry;
//! use geojson::Geometry;
//!
//! let mut geoid = Geoid::builder("egm96-5").build()?;
//!
//! let geometry: Geometry = r#"{"type": "Point", "coordinates": [138.7274, 35.3606]}"#
//!     .parse()
//!     .unwrap();
//!
//! let enriched = add_heights_to_geometry(&mut geoid, geometry)?;
//! // Result: {"type": "Point", "coordinates": [138.7274, 35.3606, 38.4]}
//! ```

use geojson::{Geometry, Value as GeoJsonValue};

use crate::error::{GeoidError, Result};
use crate::model::{ConvertDirection, GeoidModel};

/// Set the Z coordinate of every position in a geometry to the geoid height.
///
/// Positions are in GeoJSON order, `[longitude, latitude]` or
/// `[longitude, latitude, altitude]`; an existing altitude is replaced.
///
/// # Errors
///
/// Returns an error if:
/// - A position has fewer than 2 elements
/// - A latitude is outside [-90°, 90°]
/// - A read from the geoid file fails
pub fn add_heights_to_geometry<M: GeoidModel>(model: &mut M, geometry: Geometry) -> Result<Geometry> {
    map_geometry(geometry, &mut |position| {
        let (lon, lat) = horizontal(position)?;
        Ok(vec![lon, lat, model.height(lat, lon)?])
    })
}

/// Convert the Z coordinate of every position in a geometry.
///
/// With [`ConvertDirection::EllipsoidToGeoid`], GPS (ellipsoidal) heights
/// become heights above the geoid; the reverse with
/// [`ConvertDirection::GeoidToEllipsoid`].
///
/// # Errors
///
/// As [`add_heights_to_geometry`], plus an error for positions without a Z
/// coordinate.
pub fn convert_geometry_heights<M: GeoidModel>(
    model: &mut M,
    geometry: Geometry,
    direction: ConvertDirection,
) -> Result<Geometry> {
    map_geometry(geometry, &mut |position| {
        let (lon, lat) = horizontal(position)?;
        let h = position.get(2).copied().ok_or_else(|| GeoidError::InvalidCoordinate {
            message: "Coordinate must have 3 elements (lon, lat, height) to convert".to_string(),
        })?;
        let mut converted = position.to_vec();
        converted[2] = model.convert_height(lat, lon, h, direction)?;
        Ok(converted)
    })
}

/// Add the geoid height to a single GeoJSON position.
///
/// # Example
///
/// ```ignore
/// let elevated = add_height_to_coord(&mut geoid, &[138.7274, 35.3606])?;
/// assert_eq!(elevated.len(), 3);
/// ```
pub fn add_height_to_coord<M: GeoidModel>(model: &mut M, coord: &[f64]) -> Result<Vec<f64>> {
    let (lon, lat) = horizontal(coord)?;
    Ok(vec![lon, lat, model.height(lat, lon)?])
}

fn horizontal(position: &[f64]) -> Result<(f64, f64)> {
    match position {
        [lon, lat, ..] => Ok((*lon, *lat)),
        _ => Err(GeoidError::InvalidCoordinate {
            message: "Coordinate must have at least 2 elements (lon, lat)".to_string(),
        }),
    }
}

type PositionFn<'a> = dyn FnMut(&[f64]) -> Result<Vec<f64>> + 'a;

fn map_positions(positions: &[Vec<f64>], f: &mut PositionFn<'_>) -> Result<Vec<Vec<f64>>> {
    positions.iter().map(|p| f(p.as_slice())).collect()
}

fn map_geometry(geometry: Geometry, f: &mut PositionFn<'_>) -> Result<Geometry> {
    let new_value = match geometry.value {
        GeoJsonValue::Point(coord) => GeoJsonValue::Point(f(coord.as_slice())?),
        GeoJsonValue::MultiPoint(coords) => GeoJsonValue::MultiPoint(map_positions(&coords, f)?),
        GeoJsonValue::LineString(coords) => GeoJsonValue::LineString(map_positions(&coords, f)?),
        GeoJsonValue::MultiLineString(lines) => GeoJsonValue::MultiLineString(
            lines
                .iter()
                .map(|line| map_positions(line, f))
                .collect::<Result<Vec<_>>>()?,
        ),
        GeoJsonValue::Polygon(rings) => GeoJsonValue::Polygon(
            rings
                .iter()
                .map(|ring| map_positions(ring, f))
                .collect::<Result<Vec<_>>>()?,
        ),
        GeoJsonValue::MultiPolygon(polygons) => GeoJsonValue::MultiPolygon(
            polygons
                .iter()
                .map(|polygon| {
                    polygon
                        .iter()
                        .map(|ring| map_positions(ring, f))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        GeoJsonValue::GeometryCollection(geometries) => GeoJsonValue::GeometryCollection(
            geometries
                .into_iter()
                .map(|g| map_geometry(g, f))
                .collect::<Result<Vec<_>>>()?,
        ),
    };

    Ok(Geometry::new(new_value))
}
