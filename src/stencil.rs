//! Element stencils: dense local operator matrices of a single grid cell.
//!
//! On a uniform grid with constant coefficients every cell has the same local matrix, so each
//! stencil is computed once per spacing and reused for every cell. The integrals are evaluated
//! with tensor Gauss rules that are exact for the (multi-quadratic) integrands involved.
use crate::element::Q1Cell;
use crate::quadrature::CellQuadrature;
use itertools::iproduct;
use nalgebra::{DMatrix, Point, SVector, Scalar};
use numeric_literals::replace_float_literals;
use stokes_grid_traits::{real_from_usize, Real};

/// Two Gauss points per axis integrate every bilinear form of Q1 functions exactly.
const POINTS_PER_AXIS: usize = 2;

/// A stencil coupling the basis functions of a cell pairwise, `S[k1][k2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementStencil<T: Scalar> {
    matrix: DMatrix<T>,
}

impl<T: Scalar> ElementStencil<T> {
    /// # Panics
    ///
    /// Panics if the matrix is not square.
    pub fn from_matrix(matrix: DMatrix<T>) -> Self {
        assert_eq!(matrix.nrows(), matrix.ncols(), "Element stencil must be square");
        Self { matrix }
    }

    pub fn num_basis(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn get(&self, k1: usize, k2: usize) -> T {
        self.matrix[(k1, k2)].clone()
    }

    pub fn as_matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }
}

/// A stencil for vector-valued fields with cross-component coupling, `S[k1][k2][d1][d2]`.
///
/// Stored as a block matrix of `num_basis x num_basis` blocks, each block being the
/// `dim x dim` matrix coupling the components of two basis functions.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorStencil<T: Scalar> {
    dim: usize,
    matrix: DMatrix<T>,
}

impl<T: Scalar> TensorStencil<T> {
    /// # Panics
    ///
    /// Panics if the matrix is not square or its size is not a multiple of `dim`.
    pub fn from_matrix(dim: usize, matrix: DMatrix<T>) -> Self {
        assert_eq!(matrix.nrows(), matrix.ncols(), "Tensor stencil must be square");
        assert_eq!(matrix.nrows() % dim, 0, "Tensor stencil size must be a multiple of dim");
        Self { dim, matrix }
    }

    pub fn num_basis(&self) -> usize {
        self.matrix.nrows() / self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, k1: usize, k2: usize, d1: usize, d2: usize) -> T {
        self.matrix[(k1 * self.dim + d1, k2 * self.dim + d2)].clone()
    }

    pub fn as_matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }
}

/// A rectangular stencil coupling coarse pressure basis functions with the fine velocity basis
/// functions of the same coarse cell, `S[p][v][d]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingStencil<T: Scalar> {
    dim: usize,
    matrix: DMatrix<T>,
}

impl<T: Scalar> CouplingStencil<T> {
    /// # Panics
    ///
    /// Panics if the number of columns is not a multiple of `dim`.
    pub fn from_matrix(dim: usize, matrix: DMatrix<T>) -> Self {
        assert_eq!(matrix.ncols() % dim, 0, "Coupling stencil columns must be a multiple of dim");
        Self { dim, matrix }
    }

    pub fn num_pressure_basis(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn num_velocity_basis(&self) -> usize {
        self.matrix.ncols() / self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, p: usize, v: usize, d: usize) -> T {
        self.matrix[(p, v * self.dim + d)].clone()
    }

    pub fn as_matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }
}

/// Gradients of all Q1 basis functions at every quadrature point of the cell.
fn tabulate_gradients<T: Real, const D: usize>(
    cell: &Q1Cell<T, D>,
    quadrature: &CellQuadrature<T, D>,
) -> Vec<Vec<SVector<T, D>>> {
    quadrature
        .points()
        .iter()
        .map(|xi| cell.basis_gradients(&local_point(cell.spacing(), xi)))
        .collect()
}

fn local_point<T: Real, const D: usize>(spacing: &[T; D], xi: &Point<T, D>) -> Point<T, D> {
    Point::from(std::array::from_fn(|d| xi[d] * spacing[d]))
}

fn cell_volume<T: Real, const D: usize>(spacing: &[T; D]) -> T {
    spacing.iter().fold(T::one(), |acc, &h| acc * h)
}

/// The Laplacian stencil $S_{k_1 k_2} = \int_K \nabla \phi_{k_1} \cdot \nabla \phi_{k_2} \\, \mathrm{d}x$.
///
/// # Panics
///
/// Panics if a spacing component is not strictly positive.
pub fn laplacian_stencil<T: Real, const D: usize>(spacing: &[T; D]) -> ElementStencil<T> {
    let cell = Q1Cell::new(*spacing);
    let quadrature = CellQuadrature::<T, D>::gauss(POINTS_PER_AXIS);
    let gradients = tabulate_gradients(&cell, &quadrature);
    let volume = cell_volume(spacing);

    let n = Q1Cell::<T, D>::num_nodes();
    let matrix = DMatrix::from_fn(n, n, |k1, k2| {
        quadrature
            .weights()
            .iter()
            .zip(&gradients)
            .fold(T::zero(), |acc, (&w, g)| acc + w * g[k1].dot(&g[k2]))
            * volume
    });
    ElementStencil::from_matrix(matrix)
}

/// The mass stencil $S_{k_1 k_2} = \int_K \phi_{k_1} \phi_{k_2} \\, \mathrm{d}x$.
///
/// # Panics
///
/// Panics if a spacing component is not strictly positive.
pub fn mass_stencil<T: Real, const D: usize>(spacing: &[T; D]) -> ElementStencil<T> {
    let cell = Q1Cell::new(*spacing);
    let quadrature = CellQuadrature::<T, D>::gauss(POINTS_PER_AXIS);
    let values: Vec<Vec<T>> = quadrature
        .points()
        .iter()
        .map(|xi| cell.basis(&local_point(spacing, xi)))
        .collect();
    let volume = cell_volume(spacing);

    let n = Q1Cell::<T, D>::num_nodes();
    let matrix = DMatrix::from_fn(n, n, |k1, k2| {
        quadrature
            .weights()
            .iter()
            .zip(&values)
            .fold(T::zero(), |acc, (&w, phi)| acc + w * phi[k1] * phi[k2])
            * volume
    });
    ElementStencil::from_matrix(matrix)
}

/// The strain-rate stencil
///
/// $$
/// S_{k_1 k_2 d_1 d_2}
///   = \int_K 2 \\, \varepsilon(\phi_{k_2} e_{d_2}) : \varepsilon(\phi_{k_1} e_{d_1}) \\, \mathrm{d}x,
/// $$
///
/// with $\varepsilon(u) = \frac{1}{2} (\nabla u + \nabla u^T)$.
///
/// Expanding the contraction gives
/// $\delta_{d_1 d_2} \nabla \phi_{k_1} \cdot \nabla \phi_{k_2} + \partial_{d_2} \phi_{k_1} \partial_{d_1} \phi_{k_2}$.
///
/// # Panics
///
/// Panics if a spacing component is not strictly positive.
pub fn strain_rate_stencil<T: Real, const D: usize>(spacing: &[T; D]) -> TensorStencil<T> {
    let cell = Q1Cell::new(*spacing);
    let quadrature = CellQuadrature::<T, D>::gauss(POINTS_PER_AXIS);
    let gradients = tabulate_gradients(&cell, &quadrature);
    let volume = cell_volume(spacing);

    let n = Q1Cell::<T, D>::num_nodes();
    let mut matrix = DMatrix::zeros(n * D, n * D);
    for (k1, k2, d1, d2) in iproduct!(0..n, 0..n, 0..D, 0..D) {
        let integral = quadrature
            .weights()
            .iter()
            .zip(&gradients)
            .fold(T::zero(), |acc, (&w, g)| {
                let mut integrand = g[k2][d1] * g[k1][d2];
                if d1 == d2 {
                    integrand += g[k1].dot(&g[k2]);
                }
                acc + w * integrand
            });
        matrix[(k1 * D + d1, k2 * D + d2)] = integral * volume;
    }
    TensorStencil::from_matrix(D, matrix)
}

/// Index of the fine node with offset `offset` (each entry in `0..3`) in a coarse cell.
pub(crate) fn refined_local_index<const D: usize>(offset: &[usize; D]) -> usize {
    offset.iter().rev().fold(0, |acc, &o| 3 * acc + o)
}

/// The pressure-velocity coupling stencil $S_{p v d} = -\int_K \psi_p \\, \partial_d \phi_v \\, \mathrm{d}x$.
///
/// `spacing` is the spacing of the fine velocity grid. The coarse pressure cell $K$ spans two
/// fine cells along every axis; $\psi_p$ are the $2^D$ coarse Q1 basis functions and $\phi_v$ the
/// $3^D$ fine Q1 basis functions of the fine nodes in $K$, numbered with the first axis varying
/// fastest (see [`RefinedQ1Connectivity`](crate::grid::RefinedQ1Connectivity)).
///
/// # Panics
///
/// Panics if a spacing component is not strictly positive.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn pressure_coupling_stencil<T: Real, const D: usize>(spacing: &[T; D]) -> CouplingStencil<T> {
    let fine_cell = Q1Cell::new(*spacing);
    let coarse_spacing = (*spacing).map(|h| 2.0 * h);
    let coarse_cell = Q1Cell::new(coarse_spacing);
    let quadrature = CellQuadrature::<T, D>::gauss(POINTS_PER_AXIS);
    let volume = cell_volume(spacing);

    let num_pressure = Q1Cell::<T, D>::num_nodes();
    let num_velocity = 3usize.pow(D as u32);
    let mut matrix = DMatrix::zeros(num_pressure, num_velocity * D);

    let mut psi = vec![T::zero(); num_pressure];
    let mut phi_grad = vec![SVector::zeros(); Q1Cell::<T, D>::num_nodes()];

    // Integrate over each of the 2^D fine sub-cells of the coarse cell separately
    for sub_cell in 0..(1usize << D) {
        let sub_offset: [usize; D] = std::array::from_fn(|d| (sub_cell >> d) & 1);
        for (&w, xi) in quadrature.weights().iter().zip(quadrature.points()) {
            let x_fine = local_point(spacing, xi);
            let x_coarse = Point::from(std::array::from_fn(|d| {
                x_fine[d] + real_from_usize::<T>(sub_offset[d]) * spacing[d]
            }));
            coarse_cell.populate_basis(&mut psi, &x_coarse);
            fine_cell.populate_basis_gradients(&mut phi_grad, &x_fine);

            for (k_fine, grad) in phi_grad.iter().enumerate() {
                let offset: [usize; D] = std::array::from_fn(|d| sub_offset[d] + ((k_fine >> d) & 1));
                let v = refined_local_index(&offset);
                for (p, &psi_p) in psi.iter().enumerate() {
                    for d in 0..D {
                        matrix[(p, v * D + d)] -= w * volume * psi_p * grad[d];
                    }
                }
            }
        }
    }

    CouplingStencil::from_matrix(D, matrix)
}

/// All stencils needed by the Stokes operators for a given (velocity) grid spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilSet<T: Scalar> {
    pub laplacian: ElementStencil<T>,
    pub mass: ElementStencil<T>,
    pub strain_rate: TensorStencil<T>,
    pub pressure_coupling: CouplingStencil<T>,
}

impl<T: Real> StencilSet<T> {
    pub fn new<const D: usize>(spacing: &[T; D]) -> Self {
        Self {
            laplacian: laplacian_stencil(spacing),
            mass: mass_stencil(spacing),
            strain_rate: strain_rate_stencil(spacing),
            pressure_coupling: pressure_coupling_stencil(spacing),
        }
    }
}
