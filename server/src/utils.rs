use rand::Rng;
use shared::{TeamBase, Timestamp};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// Get current timestamp in milliseconds
pub fn get_timestamp() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as Timestamp
}

/// Collision-resistant id for connections and arrows.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Random whole-numbered point in `[1, width] x [1, height]`.
pub fn random_coordinates<R: Rng>(rng: &mut R, width: u32, height: u32) -> (f32, f32) {
    let x = rng.gen_range(1..=width.max(1));
    let y = rng.gen_range(1..=height.max(1));
    (x as f32, y as f32)
}

/// Uniform point inside `base` after insetting each side by the given margins.
///
/// An axis that is narrower than twice its margin collapses onto the base center.
/// Returns `None` when the geometry does not describe a finite rectangle.
pub fn sample_in_base<R: Rng>(
    rng: &mut R,
    base: &TeamBase,
    margin_x: f32,
    margin_y: f32,
) -> Option<(f32, f32)> {
    let x = sample_axis(rng, base.x, base.width, margin_x)?;
    let y = sample_axis(rng, base.y, base.height, margin_y)?;
    Some((x, y))
}

fn sample_axis<R: Rng>(rng: &mut R, start: f32, length: f32, margin: f32) -> Option<f32> {
    let low = start + margin;
    let high = start + length - margin;
    if !low.is_finite() || !high.is_finite() || !(high - low).is_finite() {
        return None;
    }
    if high > low {
        Some(rng.gen_range(low..=high))
    } else {
        Some(start + length / 2.0)
    }
}
