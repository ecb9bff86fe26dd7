//! Conjugate gradient solver for the symmetric positive semi-definite
//! Laplacian systems produced by [`crate::system`].

use crate::error::{Error, Result};
use crate::system::SparseMatrix;

/// Smallest iteration cap regardless of system size.
const MIN_ITERATIONS: usize = 100;

/// Iteration cap per unknown when none is configured.
const ITERATIONS_PER_UNKNOWN: usize = 10;

/// Options controlling convergence of the iterative solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Stop once `||b - Ax|| <= tolerance * ||b||`.
    pub tolerance: f64,
    /// Iteration cap; `None` means `10 * N` (at least 100).
    pub max_iterations: Option<usize>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: None,
        }
    }
}

impl SolverOptions {
    /// Effective iteration cap for a system with `n` unknowns.
    #[must_use]
    pub fn iteration_cap(&self, n: usize) -> usize {
        self.max_iterations
            .unwrap_or_else(|| (n * ITERATIONS_PER_UNKNOWN).max(MIN_ITERATIONS))
    }
}

/// Outcome of a converged solve.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution vector `x`.
    pub x: Vec<f64>,
    /// Iterations performed.
    pub iterations: usize,
    /// Final relative residual.
    pub residual: f64,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve `A x = b` by unpreconditioned conjugate gradient from `x = 0`.
///
/// `channel` only labels the error.
///
/// # Errors
///
/// Returns [`Error::SolverDivergence`] if the residual has not dropped below
/// the tolerance within the iteration cap, or if the search direction
/// collapses before it does.
pub fn conjugate_gradient(
    a: &SparseMatrix,
    b: &[f64],
    opts: &SolverOptions,
    channel: usize,
) -> Result<Solution> {
    let n = a.dim();
    debug_assert_eq!(b.len(), n);

    let mut x = vec![0.0; n];
    let b_norm = dot(b, b).sqrt();
    if b_norm == 0.0 {
        return Ok(Solution {
            x,
            iterations: 0,
            residual: 0.0,
        });
    }

    let threshold = opts.tolerance * b_norm;
    let cap = opts.iteration_cap(n);

    let mut r = b.to_vec();
    let mut p = r.clone();
    let mut ap = vec![0.0; n];
    let mut rs_old = dot(&r, &r);

    for iteration in 1..=cap {
        a.mul_vec(&p, &mut ap);
        let curvature = dot(&p, &ap);
        if curvature <= 0.0 {
            return Err(Error::SolverDivergence {
                channel,
                iterations: iteration,
                residual: rs_old.sqrt() / b_norm,
            });
        }

        let alpha = rs_old / curvature;
        for ((xi, ri), (pi, api)) in x.iter_mut().zip(r.iter_mut()).zip(p.iter().zip(&ap)) {
            *xi += alpha * pi;
            *ri -= alpha * api;
        }

        let rs_new = dot(&r, &r);
        if rs_new.sqrt() <= threshold {
            return Ok(Solution {
                x,
                iterations: iteration,
                residual: rs_new.sqrt() / b_norm,
            });
        }

        let beta = rs_new / rs_old;
        for (pi, ri) in p.iter_mut().zip(&r) {
            *pi = ri + beta * *pi;
        }
        rs_old = rs_new;
    }

    Err(Error::SolverDivergence {
        channel,
        iterations: cap,
        residual: rs_old.sqrt() / b_norm,
    })
}
