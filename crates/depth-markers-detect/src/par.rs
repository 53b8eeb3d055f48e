//! Row-parallel texture construction.
//!
//! Every stage computes each output texel from its inputs alone, so rows
//! can be produced independently. With the `rayon` feature the rows are
//! filled in parallel; the result is identical to the sequential path.

use depth_markers_core::Texture;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "rayon")]
pub(crate) fn build<T, F>(width: usize, height: usize, init: T, f: F) -> Texture<T>
where
    T: Clone + Send + Sync,
    F: Fn(usize, usize) -> T + Sync,
{
    let mut out = Texture::filled(width, height, init);
    if width == 0 {
        return out;
    }
    out.as_mut_slice()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, texel) in row.iter_mut().enumerate() {
                *texel = f(x, y);
            }
        });
    out
}

#[cfg(not(feature = "rayon"))]
pub(crate) fn build<T, F>(width: usize, height: usize, init: T, f: F) -> Texture<T>
where
    T: Clone,
    F: Fn(usize, usize) -> T,
{
    let mut out = Texture::filled(width, height, init);
    if width == 0 {
        return out;
    }
    for (y, row) in out.as_mut_slice().chunks_mut(width).enumerate() {
        for (x, texel) in row.iter_mut().enumerate() {
            *texel = f(x, y);
        }
    }
    out
}
