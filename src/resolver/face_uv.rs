//! Face UV derivation for model elements.
//!
//! Coordinates are in model space (0-16). Each direction projects the
//! element's bounds onto the face plane as seen from outside the block.

use crate::types::Direction;

/// Default `[u1, v1, u2, v2]` of a face, in 0-16 texel units.
pub fn default_face_uv(direction: Direction, from: [f32; 3], to: [f32; 3]) -> [f32; 4] {
    let [fx, fy, fz] = from;
    let [tx, ty, tz] = to;
    match direction {
        Direction::Down => [fx, 16.0 - tz, tx, 16.0 - fz],
        Direction::Up => [fx, fz, tx, tz],
        Direction::North => [16.0 - tx, 16.0 - ty, 16.0 - fx, 16.0 - fy],
        Direction::South => [fx, 16.0 - ty, tx, 16.0 - fy],
        Direction::West => [fz, 16.0 - ty, tz, 16.0 - fy],
        Direction::East => [16.0 - tz, 16.0 - ty, 16.0 - fz, 16.0 - fy],
    }
}

/// Face UV as a fraction of the tile, using the explicit `uv` when given.
pub fn face_uv(
    direction: Direction,
    explicit: Option<[f32; 4]>,
    from: [f32; 3],
    to: [f32; 3],
) -> [f32; 4] {
    let uv = explicit.unwrap_or_else(|| default_face_uv(direction, from, to));
    uv.map(|c| c / 16.0)
}
