use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("texture must have a non-zero size")]
    Empty,
    #[error("buffer of {len} elements does not match a {width}x{height} grid")]
    BufferSize {
        width: usize,
        height: usize,
        len: usize,
    },
}
