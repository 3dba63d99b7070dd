//! Wind vector decomposition and recomposition.
//!
//! Station observations arrive as (speed, direction); kriging needs scalar
//! fields, so the wind is decomposed into orthogonal U/V components before
//! interpolation and recomposed after sampling. Directions are meteorological
//! azimuths in degrees (wind-from, clockwise from north).

/// Decompose a wind observation into azimuthal (U, V) components.
pub fn components(speed: f64, direction: f64) -> (f64, f64) {
    let radians = direction.to_radians();
    (speed * radians.sin(), speed * radians.cos())
}

/// Recompose (U, V) components into (speed, direction).
///
/// The direction is normalized to [0, 360).
pub fn from_components(u: f64, v: f64) -> (f64, f64) {
    let speed = u.hypot(v);
    let direction = u.atan2(v).to_degrees().rem_euclid(360.0);
    (speed, direction)
}

/// Attack angle between the wind and the conductor axis, in degrees.
///
/// 0° is flow parallel to the line, 90° perpendicular; the result is folded
/// into [0, 90].
pub fn attack_angle(direction: f64, line_azimuth: f64) -> f64 {
    let relative = (direction - line_azimuth).to_radians();
    relative.sin().abs().asin().to_degrees()
}
