//! Guidance gradient field and Dirichlet boundary terms.
//!
//! For unknown `p` the right-hand side sums, over each in-bounds neighbour `q`,
//! a guidance gradient `v_pq` plus `target[q]` when `q` lies on the boundary
//! of the mask. Differences of 8-bit samples are taken in `i16` so they can
//! go negative without wrapping.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::grid::{Channel, Coordinate, Mask, PixelLocation};
use crate::system::Unknowns;

/// How the guidance gradient is chosen at each pixel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendPolicy {
    /// Use the source gradient everywhere (seamless cloning).
    ImportingGradients,
    /// Use whichever of source and target gradient is steeper.
    #[default]
    MixingGradients,
}

impl BlendPolicy {
    /// Canonical name, as used for case directory names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImportingGradients => "ImportingGradients",
            Self::MixingGradients => "MixingGradients",
        }
    }

    /// Guidance gradient for the pixel pair `(p, q)`.
    ///
    /// Mixing keeps the larger-magnitude difference; ties go to the source.
    #[must_use]
    pub fn gradient(
        self,
        source: &Channel,
        target: &Channel,
        p: Coordinate,
        q: Coordinate,
    ) -> i16 {
        let g = i16::from(source.get(p)) - i16::from(source.get(q));
        match self {
            Self::ImportingGradients => g,
            Self::MixingGradients => {
                let f = i16::from(target.get(p)) - i16::from(target.get(q));
                if f.abs() > g.abs() {
                    f
                } else {
                    g
                }
            }
        }
    }
}

impl fmt::Display for BlendPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlendPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "importinggradients" | "importing" | "import" => Ok(Self::ImportingGradients),
            "mixinggradients" | "mixing" | "mix" => Ok(Self::MixingGradients),
            _ => Err(Error::UnknownPolicy(s.to_string())),
        }
    }
}

/// Assemble the right-hand side `b` for one channel.
///
/// `b[i]` accumulates the guidance gradient towards every in-bounds
/// neighbour of unknown `i`, plus the target value of each neighbour that
/// sits on the mask boundary.
#[must_use]
pub fn build_rhs(
    unknowns: &Unknowns,
    mask: &Mask,
    source: &Channel,
    target: &Channel,
    policy: BlendPolicy,
) -> Vec<f64> {
    let shape = unknowns.shape();
    unknowns
        .coords()
        .iter()
        .map(|&p| {
            let mut acc = 0i32;
            for q in shape.neighbors(p) {
                acc += i32::from(policy.gradient(source, target, p, q));
                if mask.classify(q) == PixelLocation::Boundary {
                    acc += i32::from(target.get(q));
                }
            }
            f64::from(acc)
        })
        .collect()
}
