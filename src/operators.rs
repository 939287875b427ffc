//! Matrix-free operator kernels.
//!
//! Every kernel loops over the cells owned by the rank of its destination vector, gathers the
//! nodes of the cell through a [`GridConnectivity`] and accumulates the action of an element
//! stencil. Kernels only ever add to the destination. Entries of ghost nodes hold partial sums
//! until the destination is reduced with
//! [`local_to_global`](crate::vector::DistributedVector::local_to_global), and a fresh result
//! requires a zeroed destination.
use crate::geometry::IndexPosition;
use crate::grid::{iterate, GridConnectivity, Q1Connectivity, RefinedQ1Connectivity};
use crate::stencil::{CouplingStencil, ElementStencil, StencilSet, TensorStencil};
use crate::vector::DistributedVector;
use itertools::iproduct;
use nalgebra::Scalar;
use stokes_grid_traits::Real;

fn cell_nodes_buffer<const D: usize>(connectivity: &impl GridConnectivity<D>) -> Vec<IndexPosition<D>> {
    vec![IndexPosition::origin(); connectivity.nodes_per_cell()]
}

/// Applies a stencil to every component of a field independently.
///
/// Computes `y[e[k1]][d] += sum_k2 x[e[k2]][d] S[k1][k2]` for every owned cell `e` of `y`.
///
/// # Panics
///
/// Panics if `x` and `y` have different dof counts, or if the stencil size does not match the
/// number of nodes per cell.
pub fn diag_block_mult<T, X, Y, C, const D: usize>(
    x: &X,
    y: &mut Y,
    stencil: &ElementStencil<T>,
    connectivity: &C,
) -> eyre::Result<()>
where
    T: Real,
    X: ?Sized + DistributedVector<T, D>,
    Y: ?Sized + DistributedVector<T, D>,
    C: GridConnectivity<D>,
{
    assert_eq!(x.dof(), y.dof(), "Input and output must have the same dof");
    assert_eq!(stencil.num_basis(), connectivity.nodes_per_cell(), "Stencil does not match connectivity");

    let dof = y.dof();
    let n = stencil.num_basis();
    let mut nodes = cell_nodes_buffer(connectivity);
    let mut local_x = vec![T::zero(); n * dof];

    iterate(&y.owned_cells(), |cell| {
        connectivity.populate_cell_nodes(&mut nodes, cell);
        for (k, node) in nodes.iter().enumerate() {
            local_x[k * dof..(k + 1) * dof].copy_from_slice(x.at(node));
        }
        for (k1, node) in nodes.iter().enumerate() {
            let y_node = y.at_mut(node);
            for (d, y_d) in y_node.iter_mut().enumerate() {
                *y_d += (0..n).fold(T::zero(), |acc, k2| acc + local_x[k2 * dof + d] * stencil.get(k1, k2));
            }
        }
    });
    Ok(())
}

/// Applies a tensor stencil to a vector field with `D` components.
///
/// Computes `y[e[k1]][d1] += sum_{k2, d2} x[e[k2]][d2] S[k1][k2][d1][d2]`.
///
/// # Panics
///
/// Panics if `x` or `y` do not have `D` components, or if the stencil does not match the
/// connectivity.
pub fn tensor_block_mult<T, X, Y, C, const D: usize>(
    x: &X,
    y: &mut Y,
    stencil: &TensorStencil<T>,
    connectivity: &C,
) -> eyre::Result<()>
where
    T: Real,
    X: ?Sized + DistributedVector<T, D>,
    Y: ?Sized + DistributedVector<T, D>,
    C: GridConnectivity<D>,
{
    assert_eq!(x.dof(), D, "Tensor operators require a vector field input");
    assert_eq!(y.dof(), D, "Tensor operators require a vector field output");
    assert_eq!(stencil.dim(), D);
    assert_eq!(stencil.num_basis(), connectivity.nodes_per_cell(), "Stencil does not match connectivity");

    let n = stencil.num_basis();
    let mut nodes = cell_nodes_buffer(connectivity);
    let mut local_x = vec![T::zero(); n * D];

    iterate(&y.owned_cells(), |cell| {
        connectivity.populate_cell_nodes(&mut nodes, cell);
        for (k, node) in nodes.iter().enumerate() {
            local_x[k * D..(k + 1) * D].copy_from_slice(x.at(node));
        }
        for (k1, node) in nodes.iter().enumerate() {
            let y_node = y.at_mut(node);
            for (d1, y_d1) in y_node.iter_mut().enumerate() {
                *y_d1 += iproduct!(0..n, 0..D).fold(T::zero(), |acc, (k2, d2)| {
                    acc + local_x[k2 * D + d2] * stencil.get(k1, k2, d1, d2)
                });
            }
        }
    });
    Ok(())
}

/// Accumulates the diagonal of a stencil operator, `y[e[k]][d] += S[k][k]`.
///
/// # Panics
///
/// Panics if the stencil size does not match the number of nodes per cell.
pub fn diag_diag_block_mult<T, Y, C, const D: usize>(
    y: &mut Y,
    stencil: &ElementStencil<T>,
    connectivity: &C,
) -> eyre::Result<()>
where
    T: Real,
    Y: ?Sized + DistributedVector<T, D>,
    C: GridConnectivity<D>,
{
    assert_eq!(stencil.num_basis(), connectivity.nodes_per_cell(), "Stencil does not match connectivity");

    let mut nodes = cell_nodes_buffer(connectivity);
    iterate(&y.owned_cells(), |cell| {
        connectivity.populate_cell_nodes(&mut nodes, cell);
        for (k, node) in nodes.iter().enumerate() {
            let s_kk = stencil.get(k, k);
            y.at_mut(node).iter_mut().for_each(|y_d| *y_d += s_kk);
        }
    });
    Ok(())
}

/// Applies the pressure-velocity coupling in both directions.
///
/// For every owned cell of the pressure output `y2`, with pressure nodes `p` and the fine
/// velocity nodes `v` covered by the cell, computes
///
/// ```text
/// y2[p][0] += sum_{v, d} x1[v][d] S[p][v][d]
/// y1[v][d] -= sum_p      x2[p][0] S[p][v][d]
/// ```
///
/// so that `y2` receives $B x_1$ and `y1` receives $-B^T x_2$.
///
/// # Panics
///
/// Panics if the velocity fields do not have `D` components, the pressure fields are not scalar,
/// or the stencil does not couple $2^D$ pressure nodes with $3^D$ velocity nodes.
pub fn off_diag_block_mult<T, X, Y, const D: usize>(
    x1: &X,
    x2: &X,
    y1: &mut Y,
    y2: &mut Y,
    stencil: &CouplingStencil<T>,
) -> eyre::Result<()>
where
    T: Real,
    X: ?Sized + DistributedVector<T, D>,
    Y: ?Sized + DistributedVector<T, D>,
{
    assert_eq!(x1.dof(), D, "Velocity input must have D components");
    assert_eq!(y1.dof(), D, "Velocity output must have D components");
    assert_eq!(x2.dof(), 1, "Pressure input must be scalar");
    assert_eq!(y2.dof(), 1, "Pressure output must be scalar");

    let pressure_connectivity = Q1Connectivity;
    let velocity_connectivity = RefinedQ1Connectivity;
    assert_eq!(stencil.dim(), D);
    assert_eq!(
        stencil.num_pressure_basis(),
        GridConnectivity::<D>::nodes_per_cell(&pressure_connectivity)
    );
    assert_eq!(
        stencil.num_velocity_basis(),
        GridConnectivity::<D>::nodes_per_cell(&velocity_connectivity)
    );

    let mut pressure_nodes = cell_nodes_buffer(&pressure_connectivity);
    let mut velocity_nodes = cell_nodes_buffer(&velocity_connectivity);

    iterate(&y2.owned_cells(), |cell| {
        pressure_connectivity.populate_cell_nodes(&mut pressure_nodes, cell);
        velocity_connectivity.populate_cell_nodes(&mut velocity_nodes, cell);

        for (p, p_node) in pressure_nodes.iter().enumerate() {
            let mut divergence = T::zero();
            for (v, v_node) in velocity_nodes.iter().enumerate() {
                for (d, &x1_d) in x1.at(v_node).iter().enumerate() {
                    divergence += x1_d * stencil.get(p, v, d);
                }
            }
            y2.at_mut(p_node)[0] += divergence;
        }

        for (v, v_node) in velocity_nodes.iter().enumerate() {
            let y1_node = y1.at_mut(v_node);
            for (d, y1_d) in y1_node.iter_mut().enumerate() {
                for (p, p_node) in pressure_nodes.iter().enumerate() {
                    *y1_d -= x2.at(p_node)[0] * stencil.get(p, v, d);
                }
            }
        }
    });
    Ok(())
}

/// One of the four kernel shapes together with its stencil.
///
/// The shape is fixed when the operator is constructed; [`apply`](Self::apply) dispatches on it
/// once per application.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOperator<T: Scalar> {
    Diag(ElementStencil<T>),
    Tensor(TensorStencil<T>),
    DiagDiag(ElementStencil<T>),
    OffDiag(CouplingStencil<T>),
}

/// Vectors an operator is applied to.
///
/// `Single` serves [`BlockOperator::Diag`] and [`BlockOperator::Tensor`], `Diagonal` serves
/// [`BlockOperator::DiagDiag`] and `Coupled` serves [`BlockOperator::OffDiag`], with `x1`, `y1`
/// the velocity and `x2`, `y2` the pressure views.
#[derive(Debug)]
pub enum Operands<'a, X: ?Sized, Y: ?Sized> {
    Single { x: &'a X, y: &'a mut Y },
    Diagonal { y: &'a mut Y },
    Coupled { x1: &'a X, x2: &'a X, y1: &'a mut Y, y2: &'a mut Y },
}

impl<T: Real> BlockOperator<T> {
    pub fn diag(stencil: ElementStencil<T>) -> Self {
        Self::Diag(stencil)
    }

    pub fn tensor(stencil: TensorStencil<T>) -> Self {
        Self::Tensor(stencil)
    }

    pub fn diag_diag(stencil: ElementStencil<T>) -> Self {
        Self::DiagDiag(stencil)
    }

    pub fn off_diag(stencil: CouplingStencil<T>) -> Self {
        Self::OffDiag(stencil)
    }

    /// Accumulates the action of the operator into the output operands.
    ///
    /// Single-field shapes use [`Q1Connectivity`].
    ///
    /// # Panics
    ///
    /// Panics if the operands do not match the shape of the operator, or on any precondition of
    /// the underlying kernel.
    pub fn apply<X, Y, const D: usize>(&self, operands: Operands<X, Y>) -> eyre::Result<()>
    where
        X: ?Sized + DistributedVector<T, D>,
        Y: ?Sized + DistributedVector<T, D>,
    {
        match (self, operands) {
            (Self::Diag(stencil), Operands::Single { x, y }) => diag_block_mult(x, y, stencil, &Q1Connectivity),
            (Self::Tensor(stencil), Operands::Single { x, y }) => tensor_block_mult(x, y, stencil, &Q1Connectivity),
            (Self::DiagDiag(stencil), Operands::Diagonal { y }) => diag_diag_block_mult(y, stencil, &Q1Connectivity),
            (Self::OffDiag(stencil), Operands::Coupled { x1, x2, y1, y2 }) => {
                off_diag_block_mult(x1, x2, y1, y2, stencil)
            }
            (operator, _) => panic!("Operands do not match the shape of {}", operator.shape_name()),
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Diag(_) => "diag_block",
            Self::Tensor(_) => "tensor_block",
            Self::DiagDiag(_) => "diag_diag_block",
            Self::OffDiag(_) => "off_diag_block",
        }
    }
}

/// `y += A x` for the vector Laplacian. Works for fields with any dof.
pub fn laplacian_mult<T, X, Y, const D: usize>(x: &X, y: &mut Y, stencils: &StencilSet<T>) -> eyre::Result<()>
where
    T: Real,
    X: ?Sized + DistributedVector<T, D>,
    Y: ?Sized + DistributedVector<T, D>,
{
    diag_block_mult(x, y, &stencils.laplacian, &Q1Connectivity)
}

/// Accumulates the diagonal of the Laplacian into `y`.
pub fn diag_laplacian_mult<T, Y, const D: usize>(y: &mut Y, stencils: &StencilSet<T>) -> eyre::Result<()>
where
    T: Real,
    Y: ?Sized + DistributedVector<T, D>,
{
    diag_diag_block_mult(y, &stencils.laplacian, &Q1Connectivity)
}

pub fn mass_mult<T, X, Y, const D: usize>(x: &X, y: &mut Y, stencils: &StencilSet<T>) -> eyre::Result<()>
where
    T: Real,
    X: ?Sized + DistributedVector<T, D>,
    Y: ?Sized + DistributedVector<T, D>,
{
    diag_block_mult(x, y, &stencils.mass, &Q1Connectivity)
}

pub fn diag_mass_mult<T, Y, const D: usize>(y: &mut Y, stencils: &StencilSet<T>) -> eyre::Result<()>
where
    T: Real,
    Y: ?Sized + DistributedVector<T, D>,
{
    diag_diag_block_mult(y, &stencils.mass, &Q1Connectivity)
}

/// `y += A x` with the symmetric strain-rate operator `2 div(eps(u))`.
pub fn strain_tensor_mult<T, X, Y, const D: usize>(x: &X, y: &mut Y, stencils: &StencilSet<T>) -> eyre::Result<()>
where
    T: Real,
    X: ?Sized + DistributedVector<T, D>,
    Y: ?Sized + DistributedVector<T, D>,
{
    tensor_block_mult(x, y, &stencils.strain_rate, &Q1Connectivity)
}

/// `yp += B u` and `yu -= B^T p`, the off-diagonal blocks of the Stokes system.
pub fn b_and_bt_mult<T, X, Y, const D: usize>(
    u: &X,
    p: &X,
    yu: &mut Y,
    yp: &mut Y,
    stencils: &StencilSet<T>,
) -> eyre::Result<()>
where
    T: Real,
    X: ?Sized + DistributedVector<T, D>,
    Y: ?Sized + DistributedVector<T, D>,
{
    off_diag_block_mult(u, p, yu, yp, &stencils.pressure_coupling)
}
