//! Q1 (multilinear) basis functions on a single cell of a uniform grid.
//!
//! A cell with spacing $h$ has $2^D$ nodes. Local node $k$ sits at the corner whose
//! coordinate along axis $d$ is $h_d$ if bit $d$ of $k$ is set and $0$ otherwise, so the first
//! axis varies fastest. In 2D:
//!
//! ```text
//! 2_________3
//! |         |
//! |         |
//! |         |
//! 0_________1
//! ```
//!
//! This is the same ordering as [`Q1Connectivity`](crate::grid::Q1Connectivity).
use nalgebra::{Point, SVector};
use stokes_grid_traits::Real;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Q1Cell<T, const D: usize> {
    spacing: [T; D],
}

impl<T: Real, const D: usize> Q1Cell<T, D> {
    /// # Panics
    ///
    /// Panics if a spacing component is not strictly positive.
    pub fn new(spacing: [T; D]) -> Self {
        assert!(
            spacing.iter().all(|h| *h > T::zero()),
            "Grid spacing must be strictly positive"
        );
        Self { spacing }
    }

    pub fn spacing(&self) -> &[T; D] {
        &self.spacing
    }

    pub const fn num_nodes() -> usize {
        1 << D
    }

    /// The value of the 1D factor of node `k` along `axis` at local coordinate `x`.
    fn factor(&self, k: usize, axis: usize, x: T) -> T {
        let t = x / self.spacing[axis];
        if (k >> axis) & 1 == 1 {
            t
        } else {
            T::one() - t
        }
    }

    fn factor_derivative(&self, k: usize, axis: usize) -> T {
        let h = self.spacing[axis];
        if (k >> axis) & 1 == 1 {
            T::one() / h
        } else {
            -T::one() / h
        }
    }

    /// Evaluates all basis functions at the local coordinate `x`.
    ///
    /// # Panics
    ///
    /// Panics if `output.len()` is not $2^D$.
    pub fn populate_basis(&self, output: &mut [T], x: &Point<T, D>) {
        assert_eq!(output.len(), Self::num_nodes());
        for (k, phi) in output.iter_mut().enumerate() {
            *phi = (0..D).fold(T::one(), |acc, axis| acc * self.factor(k, axis, x[axis]));
        }
    }

    /// Evaluates the gradients of all basis functions at the local coordinate `x`.
    ///
    /// # Panics
    ///
    /// Panics if `output.len()` is not $2^D$.
    pub fn populate_basis_gradients(&self, output: &mut [SVector<T, D>], x: &Point<T, D>) {
        assert_eq!(output.len(), Self::num_nodes());
        for (k, grad) in output.iter_mut().enumerate() {
            for j in 0..D {
                grad[j] = (0..D).fold(T::one(), |acc, axis| {
                    if axis == j {
                        acc * self.factor_derivative(k, axis)
                    } else {
                        acc * self.factor(k, axis, x[axis])
                    }
                });
            }
        }
    }

    pub fn basis_gradients(&self, x: &Point<T, D>) -> Vec<SVector<T, D>> {
        let mut gradients = vec![SVector::zeros(); Self::num_nodes()];
        self.populate_basis_gradients(&mut gradients, x);
        gradients
    }

    pub fn basis(&self, x: &Point<T, D>) -> Vec<T> {
        let mut values = vec![T::zero(); Self::num_nodes()];
        self.populate_basis(&mut values, x);
        values
    }
}
