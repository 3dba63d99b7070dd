//! Coordinate projection and route discretization.
//!
//! Station and line-point positions arrive as geographic coordinates on
//! SIRGAS 2000 (EPSG:4674) and all kriging distances are Euclidean metres, so
//! everything is projected onto Brazil Polyconic (EPSG:5880) up front. The
//! projection is the American Polyconic on the GRS80 ellipsoid with the
//! EPSG:5880 origin and offsets.
use crate::input::route::RouteVertex;
use anyhow::{ensure, Result};

/// GRS80 semi-major axis (m).
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
/// GRS80 flattening.
const FLATTENING: f64 = 1.0 / 298.257_222_101;
/// Longitude of origin for EPSG:5880 (degrees).
const ORIGIN_LONGITUDE: f64 = -54.0;
/// EPSG:5880 false easting (m).
const FALSE_EASTING: f64 = 5_000_000.0;
/// EPSG:5880 false northing (m).
const FALSE_NORTHING: f64 = 10_000_000.0;

/// A discretized point of the line route.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePoint {
    /// Sequential point number along the route, starting at zero
    pub id: u32,
    /// Arc length along the route from its origin (m)
    pub progressive: f64,
    /// Projected easting (m)
    pub x: f64,
    /// Projected northing (m)
    pub y: f64,
    /// Compass bearing of the conductor axis, degrees clockwise from north
    pub azimuth: f64,
}

/// Project geographic SIRGAS 2000 coordinates onto Brazil Polyconic.
///
/// Returns projected (x, y) in metres.
pub fn project_to_polyconic(latitude: f64, longitude: f64) -> (f64, f64) {
    let e_sq = FLATTENING * (2.0 - FLATTENING);
    let phi = latitude.to_radians();
    let d_lambda = (longitude - ORIGIN_LONGITUDE).to_radians();

    // At the equator the general formulas degenerate to a plain scaled
    // longitude difference.
    if phi.abs() < 1e-12 {
        return (
            FALSE_EASTING + SEMI_MAJOR_AXIS * d_lambda,
            FALSE_NORTHING,
        );
    }

    let sin_phi = phi.sin();
    let nu = SEMI_MAJOR_AXIS / (1.0 - e_sq * sin_phi * sin_phi).sqrt();
    let cot_phi = phi.cos() / sin_phi;
    let l = d_lambda * sin_phi;

    let x = FALSE_EASTING + nu * cot_phi * l.sin();
    // The meridian arc from the equator (the EPSG:5880 latitude of origin)
    let y = FALSE_NORTHING + meridian_arc(phi, e_sq) + nu * cot_phi * (1.0 - l.cos());
    (x, y)
}

/// Meridian arc length from the equator to latitude `phi` (radians).
fn meridian_arc(phi: f64, e_sq: f64) -> f64 {
    let e4 = e_sq * e_sq;
    let e6 = e4 * e_sq;
    SEMI_MAJOR_AXIS
        * ((1.0 - e_sq / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e_sq / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Discretize a route polyline into equidistant points.
///
/// Points are emitted every `step` metres of progressive distance; (x, y) is
/// interpolated linearly along the chord of the containing segment and the
/// azimuth is the segment's (piecewise constant, taken from the segment start
/// vertex). The first and last route vertices are always emitted, so the
/// final interval may be shorter than `step`.
pub fn discretize_route(vertices: &[RouteVertex], step: f64) -> Result<Vec<LinePoint>> {
    ensure!(step > 0.0, "Discretization step must be positive");
    ensure!(
        vertices.len() >= 2,
        "Route must have at least two vertices ({} found)",
        vertices.len()
    );

    let projected: Vec<(f64, f64)> = vertices
        .iter()
        .map(|v| project_to_polyconic(v.latitude, v.longitude))
        .collect();

    let first = vertices.first().unwrap();
    let last = vertices.last().unwrap();

    let mut points = Vec::new();
    let mut segment = 0;
    let mut target = first.progressive;
    loop {
        // Final vertex is emitted exactly once, closing the route
        if target >= last.progressive {
            let (x, y) = *projected.last().unwrap();
            points.push(LinePoint {
                id: points.len() as u32,
                progressive: last.progressive,
                x,
                y,
                azimuth: vertices[vertices.len() - 2].azimuth,
            });
            break;
        }

        while vertices[segment + 1].progressive < target {
            segment += 1;
        }
        let start = &vertices[segment];
        let end = &vertices[segment + 1];
        let fraction = (target - start.progressive) / (end.progressive - start.progressive);
        let (x0, y0) = projected[segment];
        let (x1, y1) = projected[segment + 1];
        points.push(LinePoint {
            id: points.len() as u32,
            progressive: target,
            x: x0 + fraction * (x1 - x0),
            y: y0 + fraction * (y1 - y0),
            azimuth: start.azimuth,
        });

        target += step;
    }

    Ok(points)
}
