//! Circular arithmetic on angles measured in turns (`[0, 1)`, 1 = 360°).

/// Circular mean of two angles, taking the shorter arc between them.
#[inline]
pub fn circular_mean(a: f32, b: f32) -> f32 {
    let d = (a - b + 1.5).rem_euclid(1.0) - 0.5;
    (b + 0.5 * d + 1.0).rem_euclid(1.0)
}

/// Circular distance between two angles, in `[0, 0.5]`.
#[inline]
pub fn circular_diff(a: f32, b: f32) -> f32 {
    let d = (a - b).abs();
    d.min(1.0 - d)
}

/// Mean of four angles as two nested pairwise means.
#[inline]
pub fn circular_mean4(a: f32, b: f32, c: f32, d: f32) -> f32 {
    circular_mean(circular_mean(a, b), circular_mean(c, d))
}
