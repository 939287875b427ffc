//! Gauss quadrature on the unit cell.
//!
//! Rules are tensor products of univariate Gauss rules and are expressed on the reference cell
//! $[0, 1]^D$, which is the natural reference domain for cells of a structured grid: a point
//! $\xi$ of the reference cell maps to the local coordinate $x_i = h_i \xi_i$ of a cell with
//! spacing $h$.
use fenris_quadrature::univariate;
use itertools::izip;
use nalgebra::Point;
use stokes_grid_traits::{real, Real};

/// A quadrature rule on the unit cell $[0, 1]^D$.
#[derive(Debug, Clone, PartialEq)]
pub struct CellQuadrature<T: Real, const D: usize> {
    weights: Vec<T>,
    points: Vec<Point<T, D>>,
}

impl<T: Real, const D: usize> CellQuadrature<T, D> {
    /// Tensor-product Gauss rule with `points_per_axis` points along each axis.
    ///
    /// The univariate Gauss rule on $[-1, 1]$ is mapped to $[0, 1]$ on every axis. Points are
    /// ordered with the first axis varying fastest. The weights sum to one.
    ///
    /// # Panics
    ///
    /// Panics if zero points are requested.
    pub fn gauss(points_per_axis: usize) -> Self {
        let (weights1d, points1d) = univariate::gauss(points_per_axis);
        let n = points_per_axis;
        let total = n.pow(D as u32);

        let mut weights = Vec::with_capacity(total);
        let mut points = Vec::with_capacity(total);
        for flat in 0..total {
            let mut w = T::one();
            let coords = std::array::from_fn(|d| {
                let idx = (flat / n.pow(d as u32)) % n;
                w *= real::<T>(0.5 * weights1d[idx]);
                real::<T>(0.5 * (points1d[idx][0] + 1.0))
            });
            weights.push(w);
            points.push(Point::from(coords));
        }

        Self { weights, points }
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn points(&self) -> &[Point<T, D>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Integrates `f` over the box $[0, h_1] \times \dots \times [0, h_D]$.
    ///
    /// The function receives local coordinates of the box.
    pub fn integrate_cell(&self, spacing: &[T; D], mut f: impl FnMut(&Point<T, D>) -> T) -> T {
        let volume = spacing.iter().fold(T::one(), |acc, &h| acc * h);
        let mut result = T::zero();
        for (&w, xi) in izip!(&self.weights, &self.points) {
            let x = Point::from(std::array::from_fn(|d| xi[d] * spacing[d]));
            result += w * f(&x);
        }
        result * volume
    }
}
