use std::ops::Range;

use ultraviolet::DVec2;

use crate::body::{Body, BodyId};
use crate::collision::Bounds;
use crate::config::WorldConfig;

/// Region new bodies appear in: a horizontal band across the lower third of
/// the viewport, inset so a body of `radius` starts clear of the walls.
pub fn spawn_band(bounds: &Bounds, radius: f64) -> (Range<f64>, Range<f64>) {
    let x_min = bounds.left + radius;
    let x_max = (bounds.right - radius).max(x_min);
    let y_max = (bounds.bottom - radius).max(bounds.top + radius);
    let y_min = (bounds.bottom - bounds.height() / 3.0).clamp(bounds.top + radius, y_max);
    (x_min..x_max, y_min..y_max)
}

/// Creates a body with random radius, color, position within the spawn band
/// and horizontal launch velocity.
pub fn spawn_body(rng: &mut fastrand::Rng, id: BodyId, bounds: &Bounds, config: &WorldConfig) -> Body {
    let radius = lerp(config.min_radius..config.max_radius, rng.f64());
    let (xs, ys) = spawn_band(bounds, radius);
    let pos = DVec2::new(lerp(xs, rng.f64()), lerp(ys, rng.f64()));
    let vel = DVec2::new(config.spawn_speed * (rng.f64() - 0.5), 0.0);

    let mut body = Body::new(id, pos, vel, radius, config.mass_scale);
    body.color = random_color(rng);
    body
}

/// Packed `0x00RRGGBB` with each channel in [16, 208).
pub fn random_color(rng: &mut fastrand::Rng) -> u32 {
    let r = rng.u32(16..208);
    let g = rng.u32(16..208);
    let b = rng.u32(16..208);
    (r << 16) | (g << 8) | b
}

#[inline]
fn lerp(range: Range<f64>, t: f64) -> f64 {
    range.start + (range.end - range.start) * t
}
