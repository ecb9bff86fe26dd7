//! Seamless image cloning via gradient-domain Poisson editing.
//!
//! Given a source image, a target image and a binary mask over the source,
//! this crate transplants the masked region into the target by solving a
//! discrete Poisson equation per colour channel: inside the mask the result
//! follows a guidance gradient field, and on the mask's rim it is pinned to
//! the target's own pixels, so the region blends in without a visible seam.
//!
//! # Quick Start
//!
//! ```no_run
//! use poisson_blend::{BlendPolicy, Mask, PoissonEditor};
//!
//! let editor = PoissonEditor::new();
//! let source = image::open("source.png").unwrap().to_rgb8();
//! let target = image::open("target.png").unwrap().to_rgb8();
//! let mask = Mask::from_image(&image::open("mask.png").unwrap());
//! let result = editor
//!     .edit(&source, &target, &mask, BlendPolicy::MixingGradients)
//!     .expect("edit failed");
//! result.save("result.png").unwrap();
//! ```
//!
//! # Policies
//!
//! - [`BlendPolicy::ImportingGradients`] takes the guidance field from the
//!   source alone (seamless cloning).
//! - [`BlendPolicy::MixingGradients`] keeps, for every pixel pair, whichever
//!   of the source and target gradients is steeper, so target texture shows
//!   through flat parts of the source.
//!
//! # Batch processing
//!
//! [`PoissonEditor::process_directory`] walks a tree of case directories,
//! each holding `*source.<ext>`, `*target.<ext>` and `*mask.<ext>`, and
//! writes `result.png` into a mirrored output tree. The policy for a case is
//! taken from its directory name unless one is forced in [`ProcessOptions`].

#![deny(missing_docs)]

pub mod compositor;
mod engine;
pub mod error;
pub mod grid;
pub mod guidance;
pub mod solver;
pub mod system;

pub use engine::{
    find_case_files, is_supported_image, load_case_images, policy_for_dir, save_image,
    CaseFiles, PoissonEditor, ProcessOptions, ProcessResult, RESULT_FILE_NAME,
};
pub use error::{Error, Result};
pub use grid::{Channel, Coordinate, GridShape, Mask, PixelLocation};
pub use guidance::BlendPolicy;
pub use solver::SolverOptions;
