use crate::types::Position;

/// Count other players strictly closer than `radius` to `own`.
///
/// Players whose position has not been resolved yet are ignored.
pub fn count_nearby(own: &Position, others: &[Option<Position>], radius: f64) -> u32 {
    others
        .iter()
        .flatten()
        .filter(|other| own.distance_to(other) < radius)
        .count() as u32
}
