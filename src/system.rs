//! Sparse discrete-Laplacian system over the masked region.
//!
//! Every interior pixel becomes one unknown. Unknowns are numbered in
//! row-major scan order of the mask, and that numbering is the only index
//! mapping used by the matrix, the right-hand side and the compositor.

use std::collections::HashMap;

use crate::grid::{Coordinate, GridShape, Mask};

/// Ordered interior coordinates with O(1) coordinate-to-index lookup.
#[derive(Debug, Clone)]
pub struct Unknowns {
    shape: GridShape,
    coords: Vec<Coordinate>,
    index: HashMap<Coordinate, usize>,
}

impl Unknowns {
    /// Collect the interior coordinates of `mask` in row-major order.
    #[must_use]
    pub fn from_mask(mask: &Mask) -> Self {
        let coords: Vec<Coordinate> = mask.interior().collect();
        let index = coords.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self {
            shape: mask.shape(),
            coords,
            index,
        }
    }

    /// Grid the unknowns live on.
    #[must_use]
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Number of unknowns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the mask selected no pixels at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Coordinates in index order.
    #[must_use]
    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    /// Index of `at` if it is an unknown.
    #[must_use]
    pub fn index_of(&self, at: Coordinate) -> Option<usize> {
        self.index.get(&at).copied()
    }
}

/// Square sparse matrix in compressed sparse row layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Number of rows (and columns).
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.n
    }

    /// Number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored `(column, value)` pairs of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter().copied())
    }

    /// Entry `(i, j)`, zero when not stored.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.row(i).find(|&(c, _)| c == j).map_or(0.0, |(_, v)| v)
    }

    /// Computes `out = A * x`.
    ///
    /// `x` and `out` must both have length [`dim`](Self::dim).
    pub fn mul_vec(&self, x: &[f64], out: &mut [f64]) {
        debug_assert_eq!(x.len(), self.n);
        debug_assert_eq!(out.len(), self.n);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.row(i).map(|(j, v)| v * x[j]).sum();
        }
    }
}

/// Assemble the Laplacian coefficient matrix for `unknowns`.
///
/// The diagonal of row `i` is the number of in-bounds neighbours of unknown
/// `i`, whatever their classification. Each neighbour that is itself an
/// unknown `j` contributes `A[i, j] = -1`. Boundary neighbours contribute
/// nothing here; their values enter through the right-hand side.
#[must_use]
pub fn build_matrix(unknowns: &Unknowns) -> SparseMatrix {
    let shape = unknowns.shape();
    let n = unknowns.len();
    let mut row_ptr = Vec::with_capacity(n + 1);
    let mut col_idx = Vec::with_capacity(n * 5);
    let mut values = Vec::with_capacity(n * 5);
    row_ptr.push(0);

    for (i, &p) in unknowns.coords().iter().enumerate() {
        let mut entries: Vec<(usize, f64)> = Vec::with_capacity(5);
        let mut degree = 0usize;
        for q in shape.neighbors(p) {
            degree += 1;
            if let Some(j) = unknowns.index_of(q) {
                entries.push((j, -1.0));
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let diagonal = degree as f64;
        entries.push((i, diagonal));
        entries.sort_unstable_by_key(|&(j, _)| j);

        for (j, v) in entries {
            col_idx.push(j);
            values.push(v);
        }
        row_ptr.push(col_idx.len());
    }

    SparseMatrix {
        n,
        row_ptr,
        col_idx,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_mask() -> Mask {
        // L-shaped region touching the top-left corner.
        Mask::from_fn(5, 6, |c| (c.row < 3 && c.col < 2) || (c.row == 2 && c.col < 5))
    }

    #[test]
    fn unknowns_follow_row_major_order() {
        let mask = blob_mask();
        let unknowns = Unknowns::from_mask(&mask);
        assert_eq!(unknowns.len(), mask.interior_count());
        for (i, &c) in unknowns.coords().iter().enumerate() {
            assert_eq!(unknowns.index_of(c), Some(i));
        }
        assert_eq!(unknowns.coords()[0], Coordinate::new(0, 0));
        assert_eq!(unknowns.index_of(Coordinate::new(4, 4)), None);
    }

    #[test]
    fn matrix_is_symmetric_and_diagonally_dominant() {
        let unknowns = Unknowns::from_mask(&blob_mask());
        let a = build_matrix(&unknowns);
        let n = a.dim();
        for i in 0..n {
            let mut off_diag = 0.0;
            for (j, v) in a.row(i) {
                assert_eq!(v, a.get(j, i), "A[{i},{j}] != A[{j},{i}]");
                if j != i {
                    off_diag += v.abs();
                }
            }
            // Gershgorin: symmetric with non-negative diagonal dominance implies PSD.
            assert!(a.get(i, i) >= off_diag);
        }
    }

    #[test]
    fn quadratic_form_is_non_negative() {
        let unknowns = Unknowns::from_mask(&blob_mask());
        let a = build_matrix(&unknowns);
        let n = a.dim();
        let mut ax = vec![0.0; n];
        for seed in 0..8u32 {
            #[allow(clippy::cast_precision_loss)]
            let x: Vec<f64> = (0..n)
                .map(|i| (f64::from(seed) + 1.0) * ((i * 7 + 3) % 11) as f64 - 5.0)
                .collect();
            a.mul_vec(&x, &mut ax);
            let q: f64 = x.iter().zip(&ax).map(|(a, b)| a * b).sum();
            assert!(q >= -1e-9, "x^T A x = {q}");
        }
    }

    #[test]
    fn corner_unknown_has_degree_two() {
        let mask = Mask::from_fn(4, 4, |c| c == Coordinate::new(0, 0));
        let a = build_matrix(&Unknowns::from_mask(&mask));
        assert_eq!(a.dim(), 1);
        assert_eq!(a.get(0, 0), 2.0);
    }

    #[test]
    fn full_grid_degrees_count_all_neighbours() {
        let mask = Mask::from_fn(3, 3, |_| true);
        let unknowns = Unknowns::from_mask(&mask);
        let a = build_matrix(&unknowns);
        let center = unknowns.index_of(Coordinate::new(1, 1)).unwrap();
        assert_eq!(a.get(center, center), 4.0);
        assert_eq!(a.row(center).count(), 5);
        let edge = unknowns.index_of(Coordinate::new(0, 1)).unwrap();
        assert_eq!(a.get(edge, edge), 3.0);
        assert_eq!(a.get(edge, center), -1.0);
        // Row sums vanish: a pure Laplacian with no boundary.
        for i in 0..a.dim() {
            assert_eq!(a.row(i).map(|(_, v)| v).sum::<f64>(), 0.0);
        }
    }

    #[test]
    fn isolated_unknown_keeps_full_degree() {
        let mask = Mask::from_fn(3, 3, |c| c == Coordinate::new(1, 1));
        let a = build_matrix(&Unknowns::from_mask(&mask));
        assert_eq!(a.nnz(), 1);
        assert_eq!(a.get(0, 0), 4.0);
    }
}
