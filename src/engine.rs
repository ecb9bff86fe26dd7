//! Poisson editing engine and batch case driver.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, ImageFormat, Pixel, RgbImage};
use log::{debug, info, warn};

use crate::compositor::{composite_channel, merge_channels, split_channels};
use crate::error::{Error, Result};
use crate::grid::{Channel, Mask};
use crate::guidance::{build_rhs, BlendPolicy};
use crate::solver::{conjugate_gradient, SolverOptions};
use crate::system::{build_matrix, SparseMatrix, Unknowns};

/// File name written into each case's output directory.
pub const RESULT_FILE_NAME: &str = "result.png";

/// Options controlling batch processing behavior.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Policy applied to every case; `None` derives it from the case directory name.
    pub policy: Option<BlendPolicy>,
    /// Convergence settings for the per-channel solve.
    pub solver: SolverOptions,
    /// Enable verbose logging.
    pub verbose: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Result of processing a single case.
#[derive(Debug)]
pub struct ProcessResult {
    /// Case directory (or output file in single-case mode).
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the case was skipped because its mask selects nothing.
    pub skipped: bool,
    /// Policy the case was edited with.
    pub policy: Option<BlendPolicy>,
    /// Number of unknowns solved per channel.
    pub unknowns: usize,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn failed(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            skipped: false,
            policy: None,
            unknowns: 0,
            message,
        }
    }
}

/// Source, target and mask files discovered in a case directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseFiles {
    /// Files named `*source.<ext>`.
    pub sources: Vec<PathBuf>,
    /// Files named `*target.<ext>`.
    pub targets: Vec<PathBuf>,
    /// Files named `*mask.<ext>`.
    pub masks: Vec<PathBuf>,
}

impl CaseFiles {
    /// Whether the directory holds any case input at all.
    #[must_use]
    pub fn is_case(&self) -> bool {
        !(self.sources.is_empty() && self.targets.is_empty() && self.masks.is_empty())
    }

    /// The `(source, target, mask)` triple when there is exactly one of each.
    #[must_use]
    pub fn single(&self) -> Option<(&Path, &Path, &Path)> {
        match (
            self.sources.as_slice(),
            self.targets.as_slice(),
            self.masks.as_slice(),
        ) {
            ([s], [t], [m]) => Some((s.as_path(), t.as_path(), m.as_path())),
            _ => None,
        }
    }
}

/// The Poisson editor holding solver settings.
///
/// Create once and reuse for any number of edits; it carries no per-edit state.
#[derive(Debug, Clone, Default)]
pub struct PoissonEditor {
    solver: SolverOptions,
}

impl PoissonEditor {
    /// Create an editor with default solver settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an editor with explicit solver settings.
    #[must_use]
    pub const fn with_solver(solver: SolverOptions) -> Self {
        Self { solver }
    }

    /// Solver settings used by this editor.
    #[must_use]
    pub const fn solver(&self) -> &SolverOptions {
        &self.solver
    }

    /// Composite the masked region of `source` into `target`.
    ///
    /// Interior pixels are reconstructed from the guidance gradients selected by
    /// `policy`, with the mask boundary pinned to `target`. All other pixels are
    /// copied from `target` unchanged. A mask with no interior pixels returns a
    /// copy of `target`.
    ///
    /// A mask covering the whole image has no boundary to pin the solution,
    /// so the system is a pure Laplacian determined only up to a constant.
    /// The solver then returns the zero-mean solution, which is clamped to
    /// `0..=255`; the result is not the target even when `source == target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the three inputs differ in size, and
    /// [`Error::SolverDivergence`] if any channel fails to converge.
    pub fn edit<P>(
        &self,
        source: &ImageBuffer<P, Vec<u8>>,
        target: &ImageBuffer<P, Vec<u8>>,
        mask: &Mask,
        policy: BlendPolicy,
    ) -> Result<ImageBuffer<P, Vec<u8>>>
    where
        P: Pixel<Subpixel = u8>,
    {
        check_shapes(source.dimensions(), target.dimensions(), mask)?;

        let unknowns = Unknowns::from_mask(mask);
        if unknowns.is_empty() {
            debug!("Mask selects no pixels, returning target unchanged");
            return Ok(target.clone());
        }

        let matrix = build_matrix(&unknowns);
        debug!("{} equations built ({} nonzeros)", unknowns.len(), matrix.nnz());

        let sources = split_channels(source);
        let targets = split_channels(target);
        let solve = |(channel, (s, t)): (usize, (&Channel, &Channel))| {
            self.solve_channel(channel, &matrix, &unknowns, mask, s, t, policy)
        };

        #[cfg(feature = "parallel")]
        let channels = {
            use rayon::prelude::*;
            sources
                .par_iter()
                .zip(targets.par_iter())
                .enumerate()
                .map(solve)
                .collect::<Result<Vec<_>>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let channels = sources
            .iter()
            .zip(targets.iter())
            .enumerate()
            .map(solve)
            .collect::<Result<Vec<_>>>()?;

        merge_channels(&channels)
            .ok_or_else(|| shape_error(source.dimensions(), target.dimensions(), mask))
    }

    /// Composite a single channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the inputs differ in size, and
    /// [`Error::SolverDivergence`] if the solve fails to converge.
    pub fn edit_channel(
        &self,
        source: &Channel,
        target: &Channel,
        mask: &Mask,
        policy: BlendPolicy,
    ) -> Result<Channel> {
        if source.shape() != mask.shape() || target.shape() != mask.shape() {
            let dims = |c: &Channel| grid_dims(c.shape().width, c.shape().height);
            return Err(Error::ShapeMismatch {
                source_dims: dims(source),
                target_dims: dims(target),
                mask_dims: grid_dims(mask.shape().width, mask.shape().height),
            });
        }

        let unknowns = Unknowns::from_mask(mask);
        if unknowns.is_empty() {
            return Ok(target.clone());
        }
        let matrix = build_matrix(&unknowns);
        self.solve_channel(0, &matrix, &unknowns, mask, source, target, policy)
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_channel(
        &self,
        channel: usize,
        matrix: &SparseMatrix,
        unknowns: &Unknowns,
        mask: &Mask,
        source: &Channel,
        target: &Channel,
        policy: BlendPolicy,
    ) -> Result<Channel> {
        let b = build_rhs(unknowns, mask, source, target, policy);
        let solution = conjugate_gradient(matrix, &b, &self.solver, channel)?;
        debug!(
            "Channel {channel} solved in {} iterations (residual {:.2e})",
            solution.iterations, solution.residual
        );
        Ok(composite_channel(target, unknowns, &solution.x))
    }

    /// Edit one `(source, target, mask)` file triple and save the result.
    ///
    /// Returns the number of unknowns solved per channel.
    ///
    /// # Errors
    ///
    /// Returns an error if any input cannot be decoded, the edit fails, or the
    /// output cannot be written.
    pub fn edit_files(
        &self,
        source: &Path,
        target: &Path,
        mask: &Path,
        output: &Path,
        policy: BlendPolicy,
    ) -> Result<usize> {
        let (source, target, mask) = load_case_images(source, target, mask)?;
        let unknowns = mask.interior_count();
        let result = self.edit(&source, &target, &mask, policy)?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        save_image(&result, output)?;
        Ok(unknowns)
    }

    /// Process one case directory, writing `result.png` into `output_dir`.
    ///
    /// Returns a [`ProcessResult`] indicating success, skip, or failure.
    #[must_use]
    pub fn process_case(
        &self,
        case_dir: &Path,
        output_dir: &Path,
        opts: &ProcessOptions,
    ) -> ProcessResult {
        let files = match find_case_files(case_dir) {
            Ok(files) => files,
            Err(e) => return ProcessResult::failed(case_dir, format!("Failed to read case: {e}")),
        };

        let Some((source, target, mask)) = files.single() else {
            return ProcessResult::failed(
                case_dir,
                format!(
                    "There must be one source, one target and one mask \
                     (found {}, {}, {})",
                    files.sources.len(),
                    files.targets.len(),
                    files.masks.len()
                ),
            );
        };

        let policy = resolve_policy(case_dir, opts);
        info!("Editing {} with {policy}", case_dir.display());

        let output = output_dir.join(RESULT_FILE_NAME);
        let mut result = ProcessResult {
            path: case_dir.to_path_buf(),
            success: false,
            skipped: false,
            policy: Some(policy),
            unknowns: 0,
            message: String::new(),
        };

        match self.edit_files(source, target, mask, &output, policy) {
            Ok(0) => {
                result.success = true;
                result.skipped = true;
                result.message = "Mask is empty, target copied unchanged".to_string();
            }
            Ok(n) => {
                result.success = true;
                result.unknowns = n;
                result.message = format!("{n} equations solved per channel");
            }
            Err(e) => {
                result.message = format!("Failed: {e}");
            }
        }

        result
    }

    /// Process every case directory below `input_root`.
    ///
    /// Each case at `input_root/<rel>` writes to `output_root/<rel>/result.png`.
    /// Uses parallel iteration when the `parallel` feature is enabled (via rayon).
    /// Returns a [`ProcessResult`] for each case found; a failing case never
    /// stops the others.
    #[must_use]
    pub fn process_directory(
        &self,
        input_root: &Path,
        output_root: &Path,
        opts: &ProcessOptions,
    ) -> Vec<ProcessResult> {
        let cases = match collect_case_dirs(input_root) {
            Ok(cases) => cases,
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_root,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };
        debug!("Found {} case(s) under {}", cases.len(), input_root.display());

        let run = |case_dir: &PathBuf| {
            let rel = case_dir
                .strip_prefix(input_root)
                .unwrap_or(case_dir.as_path());
            let result = self.process_case(case_dir, &output_root.join(rel), opts);
            if !result.success {
                warn!("Skipping {}: {}", case_dir.display(), result.message);
            }
            result
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            cases.par_iter().map(run).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            cases.iter().map(run).collect()
        }
    }
}

fn grid_dims(width: usize, height: usize) -> (u32, u32) {
    (
        u32::try_from(width).unwrap_or(u32::MAX),
        u32::try_from(height).unwrap_or(u32::MAX),
    )
}

fn shape_error(source: (u32, u32), target: (u32, u32), mask: &Mask) -> Error {
    Error::ShapeMismatch {
        source_dims: source,
        target_dims: target,
        mask_dims: grid_dims(mask.shape().width, mask.shape().height),
    }
}

fn check_shapes(source: (u32, u32), target: (u32, u32), mask: &Mask) -> Result<()> {
    let mask_dims = grid_dims(mask.shape().width, mask.shape().height);
    if source == target && source == mask_dims {
        Ok(())
    } else {
        Err(shape_error(source, target, mask))
    }
}

/// Pick the policy for a case: forced by options, else named by the
/// directory, else the default.
fn resolve_policy(case_dir: &Path, opts: &ProcessOptions) -> BlendPolicy {
    if let Some(policy) = opts.policy {
        return policy;
    }
    policy_for_dir(case_dir).unwrap_or_else(|e| {
        let fallback = BlendPolicy::default();
        warn!("{}: {e}, using {fallback}", case_dir.display());
        fallback
    })
}

/// Parse the blending policy named by a case directory.
///
/// # Errors
///
/// Returns [`Error::UnknownPolicy`] if the directory name is not a policy name.
pub fn policy_for_dir(dir: &Path) -> Result<BlendPolicy> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.parse()
}

/// List the source, target and mask images directly inside `dir`.
///
/// A file belongs to a kind when its stem ends with `source`, `target` or
/// `mask` (case-insensitive) and its extension is a supported image format.
/// Results are sorted by path.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn find_case_files(dir: &Path) -> Result<CaseFiles> {
    let mut files = CaseFiles::default();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_supported_image(p))
        .collect();
    paths.sort();

    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if stem.ends_with("source") {
            files.sources.push(path);
        } else if stem.ends_with("target") {
            files.targets.push(path);
        } else if stem.ends_with("mask") {
            files.masks.push(path);
        }
    }
    Ok(files)
}

fn subdirectories(entries: std::fs::ReadDir) -> impl Iterator<Item = PathBuf> {
    entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .map(|e| e.path())
}

/// Recursively collect directories below `root` (root excluded) that hold
/// any case input, sorted by path.
///
/// Only an unreadable `root` is an error.
fn collect_case_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let pending = subdirectories(std::fs::read_dir(root)?).collect();
    Ok(walk_case_dirs(pending))
}

/// Depth-first walk from `pending`; directories that cannot be listed are
/// logged and skipped.
fn walk_case_dirs(mut pending: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut cases = Vec::new();
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {e}, skipping", dir.display());
                continue;
            }
        };
        pending.extend(subdirectories(entries));
        match find_case_files(&dir) {
            Ok(files) if files.is_case() => cases.push(dir),
            Ok(_) => {}
            Err(e) => warn!("Cannot read {}: {e}, skipping", dir.display()),
        }
    }
    cases.sort();
    cases
}

/// Decode a case: source and target as 8-bit RGB, the mask thresholded.
///
/// # Errors
///
/// Returns [`Error::Image`] if any file cannot be opened or decoded.
pub fn load_case_images(
    source: &Path,
    target: &Path,
    mask: &Path,
) -> Result<(RgbImage, RgbImage, Mask)> {
    let source = image::open(source)?.to_rgb8();
    let target = image::open(target)?.to_rgb8();
    let mask = Mask::from_image(&image::open(mask)?);
    Ok((source, target, mask))
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "png" | "jpg" | "jpeg" | "gif" | "tif" | "tiff" | "bmp" | "webp"
        ),
        None => false,
    }
}

/// Save an RGB image with format-specific quality settings.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let dyn_img = DynamicImage::ImageRgb8(img.clone());

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&dyn_img)?;
        }
        ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Tiff | ImageFormat::WebP => {
            dyn_img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}
