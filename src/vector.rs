//! Distributed field vectors.
//!
//! A field stores `dof` scalars per grid node. Operators work on [`DistributedVector`]s, which are
//! per-rank views of a field: a rank owns a contiguous box of nodes and additionally sees a layer
//! of ghost nodes around it. Contributions written to ghost nodes are partial sums that only
//! become meaningful after the collective [`local_to_global`](DistributedVector::local_to_global)
//! reduction.
//!
//! The in-process backend consists of [`GlobalVector`], which holds the values of a whole field,
//! and [`GhostedVector`], the per-rank view. Ranks are simulated one after another, so the
//! reduction simply adds the local values of each rank into the global storage.
use crate::geometry::{point_inside, IndexBox, IndexPosition};
use crate::grid::{box_size, iterate, StructuredGrid};
use nalgebra::{DVector, Scalar};
use num::Zero;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use stokes_grid_traits::Real;

/// How local values are merged into the global field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InsertMode {
    /// Add owned and ghost entries into the global field.
    Add,
    /// Overwrite the global entries of owned nodes. Ghost entries are ignored.
    Insert,
}

/// Failures reported by a vector backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    /// The view is not bound to any global storage, so there is nothing to reduce into.
    Unbound,
    /// The global storage does not match the grid the view is created for.
    ShapeMismatch { expected_nodes: usize, actual_nodes: usize },
}

impl Display for VectorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            VectorError::Unbound => write!(f, "vector view is not bound to global storage"),
            VectorError::ShapeMismatch {
                expected_nodes,
                actual_nodes,
            } => write!(
                f,
                "global vector has {actual_nodes} nodes, but the grid has {expected_nodes} nodes"
            ),
        }
    }
}

impl Error for VectorError {}

/// A per-rank view of a distributed field.
pub trait DistributedVector<T: Scalar, const D: usize> {
    /// Number of scalars per node.
    fn dof(&self) -> usize;

    /// Nodes owned by this rank.
    fn owned_box(&self) -> IndexBox<D>;

    /// Cells whose lower-left node is owned by this rank.
    fn owned_cells(&self) -> IndexBox<D>;

    /// Nodes accessible through this view, i.e. owned nodes plus ghosts.
    fn ghosted_box(&self) -> IndexBox<D>;

    /// # Panics
    ///
    /// Panics if the node is outside [`ghosted_box`](Self::ghosted_box).
    fn at(&self, node: &IndexPosition<D>) -> &[T];

    /// # Panics
    ///
    /// Panics if the node is outside [`ghosted_box`](Self::ghosted_box).
    fn at_mut(&mut self, node: &IndexPosition<D>) -> &mut [T];

    /// Sets all local entries, including ghosts, to `value`.
    fn fill(&mut self, value: T);

    /// Collective reduction of the local values into the global field.
    ///
    /// Every rank must call this the same number of times and in the same order.
    fn local_to_global(&mut self, mode: InsertMode) -> eyre::Result<()>;
}

/// Storage of a complete field in natural ordering: the first axis varies fastest and the
/// `dof` values of a node are contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVector<T> {
    num_nodes: usize,
    dof: usize,
    values: Vec<T>,
}

impl<T: Scalar + Zero> GlobalVector<T> {
    pub fn zeros(num_nodes: usize, dof: usize) -> Self {
        Self {
            num_nodes,
            dof,
            values: vec![T::zero(); num_nodes * dof],
        }
    }

    /// A zero field on the nodes of `grid`.
    pub fn for_grid<S: Real, const D: usize>(grid: &StructuredGrid<S, D>, dof: usize) -> Self {
        Self::zeros(grid.num_nodes(), dof)
    }
}

impl<T: Scalar> GlobalVector<T> {
    /// # Panics
    ///
    /// Panics if `values.len() != num_nodes * dof`.
    pub fn from_values(num_nodes: usize, dof: usize, values: Vec<T>) -> Self {
        assert_eq!(values.len(), num_nodes * dof, "Number of values must be num_nodes * dof");
        Self { num_nodes, dof, values }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn node_values(&self, linear_index: usize) -> &[T] {
        &self.values[self.dof * linear_index..self.dof * (linear_index + 1)]
    }

    pub fn node_values_mut(&mut self, linear_index: usize) -> &mut [T] {
        &mut self.values[self.dof * linear_index..self.dof * (linear_index + 1)]
    }

    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    pub fn to_dvector(&self) -> DVector<T> {
        DVector::from_column_slice(&self.values)
    }
}

impl<T: Real> GlobalVector<T> {
    /// Euclidean inner product of the raw values.
    ///
    /// # Panics
    ///
    /// Panics if the vectors have different sizes.
    pub fn dot(&self, other: &Self) -> T {
        assert_eq!(self.values.len(), other.values.len());
        self.values
            .iter()
            .zip(&other.values)
            .fold(T::zero(), |acc, (&a, &b)| acc + a * b)
    }
}

/// Ghosted per-rank view of a [`GlobalVector`].
#[derive(Debug)]
pub struct GhostedVector<'a, T, const D: usize> {
    global_nodes: [usize; D],
    owned: IndexBox<D>,
    owned_cells: IndexBox<D>,
    ghosted: IndexBox<D>,
    dof: usize,
    values: Vec<T>,
    target: Option<&'a mut GlobalVector<T>>,
}

fn check_shape<S: Real, T, const D: usize>(
    grid: &StructuredGrid<S, D>,
    vector: &GlobalVector<T>,
) -> Result<(), VectorError> {
    if grid.num_nodes() == vector.num_nodes {
        Ok(())
    } else {
        Err(VectorError::ShapeMismatch {
            expected_nodes: grid.num_nodes(),
            actual_nodes: vector.num_nodes,
        })
    }
}

impl<'a, T: Real, const D: usize> GhostedVector<'a, T, D> {
    /// A zeroed view that is not bound to global storage.
    pub fn local(grid: &StructuredGrid<T, D>, rank: usize, dof: usize) -> Self {
        let ghosted = grid.ghosted_nodes(rank);
        Self {
            global_nodes: *grid.nodes(),
            owned: grid.owned_nodes(rank),
            owned_cells: grid.owned_cells(rank),
            ghosted,
            dof,
            values: vec![T::zero(); box_size(&ghosted) * dof],
            target: None,
        }
    }

    /// A read view whose owned and ghost entries are copied from `source` (global-to-local).
    ///
    /// The view is not bound, so a reduction on it fails with [`VectorError::Unbound`].
    pub fn scatter(grid: &StructuredGrid<T, D>, rank: usize, source: &GlobalVector<T>) -> eyre::Result<Self> {
        check_shape(grid, source)?;
        let mut view = Self::local(grid, rank, source.dof());
        let ghosted = view.ghosted;
        iterate(&ghosted, |node| {
            let global = source.node_values(grid.linear_index(node));
            view.at_mut(node).copy_from_slice(global);
        });
        Ok(view)
    }

    /// A zeroed view bound to `target`, into which [`local_to_global`](DistributedVector::local_to_global)
    /// reduces.
    pub fn accumulate(grid: &StructuredGrid<T, D>, rank: usize, target: &'a mut GlobalVector<T>) -> eyre::Result<Self> {
        check_shape(grid, target)?;
        let mut view = Self::local(grid, rank, target.dof());
        view.target = Some(target);
        Ok(view)
    }

    pub fn is_bound(&self) -> bool {
        self.target.is_some()
    }

    fn local_index(&self, node: &IndexPosition<D>) -> usize {
        assert!(
            point_inside(&self.ghosted, node),
            "Node {node:?} is outside the ghosted box of the view"
        );
        let mut index = 0;
        for i in (0..D).rev() {
            let extent = (self.ghosted.upper_right[i] - self.ghosted.bottom_left[i]) as usize;
            index = index * extent + (node[i] - self.ghosted.bottom_left[i]) as usize;
        }
        index
    }

    fn global_index(&self, node: &IndexPosition<D>) -> usize {
        let mut index = 0;
        for i in (0..D).rev() {
            index = index * self.global_nodes[i] + node[i] as usize;
        }
        index
    }
}

impl<'a, T: Real, const D: usize> DistributedVector<T, D> for GhostedVector<'a, T, D> {
    fn dof(&self) -> usize {
        self.dof
    }

    fn owned_box(&self) -> IndexBox<D> {
        self.owned
    }

    fn owned_cells(&self) -> IndexBox<D> {
        self.owned_cells
    }

    fn ghosted_box(&self) -> IndexBox<D> {
        self.ghosted
    }

    fn at(&self, node: &IndexPosition<D>) -> &[T] {
        let i = self.local_index(node);
        &self.values[self.dof * i..self.dof * (i + 1)]
    }

    fn at_mut(&mut self, node: &IndexPosition<D>) -> &mut [T] {
        let i = self.local_index(node);
        &mut self.values[self.dof * i..self.dof * (i + 1)]
    }

    fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    fn local_to_global(&mut self, mode: InsertMode) -> eyre::Result<()> {
        let target = self.target.take().ok_or(VectorError::Unbound)?;
        let region = match mode {
            InsertMode::Add => self.ghosted,
            InsertMode::Insert => self.owned,
        };
        iterate(&region, |node| {
            let local = self.at(node);
            let global = target.node_values_mut(self.global_index(node));
            match mode {
                InsertMode::Add => global.iter_mut().zip(local).for_each(|(g, &l)| *g += l),
                InsertMode::Insert => global.copy_from_slice(local),
            }
        });
        self.target = Some(target);
        Ok(())
    }
}

/// The unknowns of a Stokes problem: a velocity field with `D` components on the refined grid and
/// a scalar pressure field on the coarse grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SaddlePointVector<T> {
    pub velocity: GlobalVector<T>,
    pub pressure: GlobalVector<T>,
}

impl<T: Real> SaddlePointVector<T> {
    /// Zero velocity and pressure for the given (coarse) pressure grid.
    pub fn zeros<const D: usize>(pressure_grid: &StructuredGrid<T, D>) -> Self {
        Self {
            velocity: GlobalVector::for_grid(&pressure_grid.refined(), D),
            pressure: GlobalVector::for_grid(pressure_grid, 1),
        }
    }

    pub fn dot(&self, other: &Self) -> T {
        self.velocity.dot(&other.velocity) + self.pressure.dot(&other.pressure)
    }
}
