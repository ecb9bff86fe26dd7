//! Pixel grid geometry and mask region classification.
//!
//! Coordinates are `(row, col)` pairs over an `H x W` grid. Neighbours are the
//! 4-connected up/down/left/right cells that fall inside the grid; there is no
//! wraparound, so edge and corner cells have fewer neighbours.

use image::DynamicImage;

/// Normalised mask values at or above this become part of the edited region.
const MASK_THRESHOLD: f32 = 0.5;

/// Channel of the RGB decode that selects the region (blue, the first
/// channel in BGR order).
const MASK_CHANNEL: usize = 2;

/// A `(row, col)` position on the pixel grid, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    /// Row index (image `y`).
    pub row: usize,
    /// Column index (image `x`).
    pub col: usize,
}

impl Coordinate {
    /// Create a coordinate from a row and column.
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Height and width of a pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    /// Number of rows.
    pub height: usize,
    /// Number of columns.
    pub width: usize,
}

impl GridShape {
    /// Create a grid shape.
    #[must_use]
    pub const fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Total number of cells.
    #[must_use]
    pub const fn len(self) -> usize {
        self.height * self.width
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Whether `at` lies inside the grid.
    #[must_use]
    pub const fn contains(self, at: Coordinate) -> bool {
        at.row < self.height && at.col < self.width
    }

    /// Row-major offset of `at` into a flat buffer.
    #[must_use]
    pub const fn offset(self, at: Coordinate) -> usize {
        at.row * self.width + at.col
    }

    /// In-bounds 4-neighbours of `at`, in up, down, left, right order.
    pub fn neighbors(self, at: Coordinate) -> impl Iterator<Item = Coordinate> {
        let Coordinate { row, col } = at;
        let candidates = [
            (row > 0).then(|| Coordinate::new(row - 1, col)),
            (row + 1 < self.height).then(|| Coordinate::new(row + 1, col)),
            (col > 0).then(|| Coordinate::new(row, col - 1)),
            (col + 1 < self.width).then(|| Coordinate::new(row, col + 1)),
        ];
        candidates.into_iter().flatten()
    }

    /// Number of in-bounds 4-neighbours of `at` (2 at corners, 3 on edges, else 4).
    #[must_use]
    pub fn degree(self, at: Coordinate) -> usize {
        self.neighbors(at).count()
    }
}

/// One colour channel of an image as a row-major `H x W` grid of samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    shape: GridShape,
    data: Vec<u8>,
}

impl Channel {
    /// Wrap row-major samples.
    ///
    /// Returns `None` if `data.len()` does not equal `height * width`.
    #[must_use]
    pub fn new(height: usize, width: usize, data: Vec<u8>) -> Option<Self> {
        let shape = GridShape::new(height, width);
        (data.len() == shape.len()).then_some(Self { shape, data })
    }

    /// Wrap samples whose length is already known to match `shape`.
    pub(crate) fn from_plane(shape: GridShape, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), shape.len());
        Self { shape, data }
    }

    /// A channel holding `value` everywhere.
    #[must_use]
    pub fn filled(height: usize, width: usize, value: u8) -> Self {
        let shape = GridShape::new(height, width);
        Self {
            shape,
            data: vec![value; shape.len()],
        }
    }

    /// Grid dimensions of the channel.
    #[must_use]
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Sample at `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at` lies outside the grid.
    #[must_use]
    pub fn get(&self, at: Coordinate) -> u8 {
        self.data[self.shape.offset(at)]
    }

    /// Overwrite the sample at `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at` lies outside the grid.
    pub fn set(&mut self, at: Coordinate, value: u8) {
        let offset = self.shape.offset(at);
        self.data[offset] = value;
    }

    /// Row-major samples.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }
}

/// Where a coordinate sits relative to the masked region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLocation {
    /// Inside the mask; the pixel is an unknown of the linear system.
    Interior,
    /// Outside the mask but 4-adjacent to it; supplies a Dirichlet value.
    Boundary,
    /// Outside the mask and not adjacent to it.
    Exterior,
}

/// Binary `H x W` mask selecting the region of the source to transplant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    shape: GridShape,
    data: Vec<bool>,
}

impl Mask {
    /// Build a mask from row-major cell values.
    ///
    /// Returns `None` if `data.len()` does not equal `height * width`.
    #[must_use]
    pub fn new(height: usize, width: usize, data: Vec<bool>) -> Option<Self> {
        let shape = GridShape::new(height, width);
        (data.len() == shape.len()).then_some(Self { shape, data })
    }

    /// Build a mask by evaluating `f` at every coordinate in row-major order.
    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(Coordinate) -> bool) -> Self {
        let shape = GridShape::new(height, width);
        let mut data = Vec::with_capacity(shape.len());
        for row in 0..height {
            for col in 0..width {
                data.push(f(Coordinate::new(row, col)));
            }
        }
        Self { shape, data }
    }

    /// Derive a mask from an arbitrary image.
    ///
    /// The image is decoded to 8-bit RGB and its blue channel is normalised to
    /// `[0, 1]`; values at or above 0.5 are inside the mask. Grey masks read
    /// the same on every channel.
    #[must_use]
    pub fn from_image(img: &DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        let shape = GridShape::new(rgb.height() as usize, rgb.width() as usize);
        let data = rgb
            .pixels()
            .map(|px| f32::from(px[MASK_CHANNEL]) / 255.0 >= MASK_THRESHOLD)
            .collect();
        Self { shape, data }
    }

    /// Grid dimensions of the mask.
    #[must_use]
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Mask value at `at`; coordinates outside the grid read as unset.
    #[must_use]
    pub fn get(&self, at: Coordinate) -> bool {
        self.shape.contains(at) && self.data[self.shape.offset(at)]
    }

    /// Number of cells inside the mask.
    #[must_use]
    pub fn interior_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Interior coordinates in row-major scan order.
    pub fn interior(&self) -> impl Iterator<Item = Coordinate> + '_ {
        let width = self.shape.width;
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v)
            .map(move |(i, _)| Coordinate::new(i / width, i % width))
    }

    /// Classify `at` as interior, boundary or exterior.
    #[must_use]
    pub fn classify(&self, at: Coordinate) -> PixelLocation {
        if self.get(at) {
            PixelLocation::Interior
        } else if self.shape.neighbors(at).any(|q| self.get(q)) {
            PixelLocation::Boundary
        } else {
            PixelLocation::Exterior
        }
    }
}
