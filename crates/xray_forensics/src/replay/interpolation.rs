//! Motion smoothing math for the smoothed replay variant.
//!
//! Pure functions over [`Location`]s: eased blending with shortest-path yaw,
//! a weighted moving average over upcoming frames, and second-order
//! extrapolation from the last three sampled positions.

use crate::types::{Location, Position};

/// Smoothstep ease `t²(3 − 2t)` for `t` in `[0, 1]`.
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Normalizes an angle in degrees into `[-180, 180)`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Interpolates between two yaw angles along the shortest arc.
pub fn lerp_angle(from: f32, to: f32, factor: f64) -> f32 {
    let delta = wrap_degrees(to - from);
    wrap_degrees(from + delta * factor as f32)
}

/// Moves `from` towards `to` by `factor`, eased with smoothstep when `smooth` is set.
///
/// The result is always in `to`'s world.
pub fn blend(from: &Location, to: &Location, factor: f64, smooth: bool) -> Location {
    let factor = if smooth { smoothstep(factor) } else { factor.clamp(0.0, 1.0) };
    let mut blended = to.clone();
    blended.position = from.position.lerp(to.position, factor);
    blended.orientation.yaw = lerp_angle(from.orientation.yaw, to.orientation.yaw, factor);
    blended.orientation.pitch =
        from.orientation.pitch + (to.orientation.pitch - from.orientation.pitch) * factor as f32;
    blended
}

/// Weighted moving average over the first `window` locations, nearer entries
/// weighted `1 / (i + 1)`. Locations in a different world than the first are ignored.
pub fn weighted_average<'a, I>(locations: I, window: usize) -> Option<Location>
where
    I: IntoIterator<Item = &'a Location>,
{
    let mut iter = locations.into_iter().take(window.max(1));
    let first = iter.next()?;

    let mut total_weight = 1.0f64;
    let mut position = first.position;
    let mut yaw_offset = 0.0f64;
    let mut pitch = first.orientation.pitch as f64;

    for (i, location) in iter.enumerate() {
        if location.world != first.world {
            continue;
        }
        let weight = 1.0 / (i as f64 + 2.0);
        total_weight += weight;
        position = position + location.position * weight;
        yaw_offset += wrap_degrees(location.orientation.yaw - first.orientation.yaw) as f64 * weight;
        pitch += location.orientation.pitch as f64 * weight;
    }

    let mut average = first.clone();
    average.position = position * (1.0 / total_weight);
    average.orientation.yaw = wrap_degrees(first.orientation.yaw + (yaw_offset / total_weight) as f32);
    average.orientation.pitch = (pitch / total_weight) as f32;
    Some(average)
}

/// Pulls `current` towards `average` by `weight` (linear, no easing).
pub fn damp(current: &Location, average: &Location, weight: f64) -> Location {
    if current.world != average.world {
        return current.clone();
    }
    blend(current, average, weight, false)
}

/// Second-order prediction of the next position.
///
/// `velocity = p[n] − p[n−1]`, `acceleration = ½(velocity[n] − velocity[n−1])`,
/// prediction `= p[n] + velocity + acceleration`.
pub fn extrapolate(before_previous: Position, previous: Position, current: Position) -> Position {
    let velocity = current - previous;
    let previous_velocity = previous - before_previous;
    let acceleration = (velocity - previous_velocity) * 0.5;
    current + velocity + acceleration
}

/// Mixes a fraction of the predicted position into the target.
pub fn mix_prediction(target: Position, predicted: Position, fraction: f64) -> Position {
    target + (predicted - target) * fraction.clamp(0.0, 1.0)
}
