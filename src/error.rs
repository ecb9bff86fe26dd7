//! Error types for the poisson-blend crate.

/// Errors that can occur while compositing or while reading and writing cases.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source, target and mask do not share the same dimensions.
    #[error(
        "input shape mismatch: source {}x{}, target {}x{}, mask {}x{}",
        .source_dims.0, .source_dims.1, .target_dims.0, .target_dims.1, .mask_dims.0, .mask_dims.1
    )]
    ShapeMismatch {
        /// Source `(width, height)`.
        source_dims: (u32, u32),
        /// Target `(width, height)`.
        target_dims: (u32, u32),
        /// Mask `(width, height)`.
        mask_dims: (u32, u32),
    },

    /// The conjugate gradient solve did not converge within its iteration cap.
    #[error(
        "solver did not converge on channel {channel} after {iterations} iterations \
         (relative residual {residual:.3e})"
    )]
    SolverDivergence {
        /// Channel index being solved.
        channel: usize,
        /// Iterations performed before giving up.
        iterations: usize,
        /// Relative residual `||b - Ax|| / ||b||` at exit.
        residual: f64,
    },

    /// A blending policy name that is neither importing nor mixing gradients.
    #[error("unknown blending policy: {0}")]
    UnknownPolicy(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
