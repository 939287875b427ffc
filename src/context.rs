//! The state of one Stokes solve session.
use crate::correction::{apply_corrections_with_settings, CorrectionReport, CorrectionSettings};
use crate::grid::StructuredGrid;
use crate::operators::{BlockOperator, Operands};
use crate::particle::{Particle, Shape};
use crate::singularity::SingularFieldSupplier;
use crate::stencil::StencilSet;
use crate::vector::{DistributedVector, GhostedVector, GlobalVector, InsertMode, SaddlePointVector};
use log::debug;
use serde::{Deserialize, Serialize};
use stokes_grid_traits::Real;

/// The discretization of the viscous term.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViscousOperator {
    /// Component-wise vector Laplacian.
    #[default]
    Laplacian,
    /// The symmetric form `2 div(eps(u))`.
    StrainTensor,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StokesSettings {
    pub viscous_operator: ViscousOperator,
    pub correction: CorrectionSettings,
}

/// Grids, stencils and operators of a Stokes problem.
///
/// The context is created once per solve session from the pressure grid; velocities live on
/// the [refined](StructuredGrid::refined) grid. All stencils are computed on construction and
/// dropped with the context.
///
/// The `apply_*` methods act on the part of the problem owned by a single rank. The `*_all`
/// variants run all ranks of the decomposition one after another.
#[derive(Debug, Clone)]
pub struct SolveContext<T: Real, const D: usize> {
    pressure_grid: StructuredGrid<T, D>,
    velocity_grid: StructuredGrid<T, D>,
    settings: StokesSettings,
    stencils: StencilSet<T>,
    viscous: BlockOperator<T>,
    viscous_diagonal: BlockOperator<T>,
    coupling: BlockOperator<T>,
}

impl<T: Real, const D: usize> SolveContext<T, D> {
    pub fn new(pressure_grid: StructuredGrid<T, D>, settings: StokesSettings) -> Self {
        let velocity_grid = pressure_grid.refined();
        let stencils = StencilSet::new(&velocity_grid.spacing());
        let viscous = match settings.viscous_operator {
            ViscousOperator::Laplacian => BlockOperator::diag(stencils.laplacian.clone()),
            ViscousOperator::StrainTensor => BlockOperator::tensor(stencils.strain_rate.clone()),
        };
        let viscous_diagonal = BlockOperator::diag_diag(stencils.laplacian.clone());
        let coupling = BlockOperator::off_diag(stencils.pressure_coupling.clone());
        debug!(
            "Created solve context with {:?} viscous operator on {} ranks",
            settings.viscous_operator,
            pressure_grid.num_ranks()
        );

        Self {
            pressure_grid,
            velocity_grid,
            settings,
            stencils,
            viscous,
            viscous_diagonal,
            coupling,
        }
    }

    pub fn pressure_grid(&self) -> &StructuredGrid<T, D> {
        &self.pressure_grid
    }

    pub fn velocity_grid(&self) -> &StructuredGrid<T, D> {
        &self.velocity_grid
    }

    pub fn settings(&self) -> &StokesSettings {
        &self.settings
    }

    pub fn stencils(&self) -> &StencilSet<T> {
        &self.stencils
    }

    pub fn num_ranks(&self) -> usize {
        self.pressure_grid.num_ranks()
    }

    /// A zero saddle-point vector for this problem.
    pub fn zero_vector(&self) -> SaddlePointVector<T> {
        SaddlePointVector::zeros(&self.pressure_grid)
    }

    /// `y += A x` with the viscous operator `A`, for the cells owned by `rank`.
    pub fn apply_viscous(&self, rank: usize, x: &GlobalVector<T>, y: &mut GlobalVector<T>) -> eyre::Result<()> {
        let x_local = GhostedVector::scatter(&self.velocity_grid, rank, x)?;
        let mut y_local = GhostedVector::accumulate(&self.velocity_grid, rank, y)?;
        self.viscous.apply::<_, _, D>(Operands::Single {
            x: &x_local,
            y: &mut y_local,
        })?;
        y_local.local_to_global(InsertMode::Add)
    }

    /// Accumulates the action of the Stokes operator
    ///
    /// ```text
    /// [ A  -B^T ] [u]
    /// [ B   0   ] [p]
    /// ```
    ///
    /// into `y`, for the cells owned by `rank`.
    pub fn apply_stokes(
        &self,
        rank: usize,
        x: &SaddlePointVector<T>,
        y: &mut SaddlePointVector<T>,
    ) -> eyre::Result<()> {
        let u_local = GhostedVector::scatter(&self.velocity_grid, rank, &x.velocity)?;
        let p_local = GhostedVector::scatter(&self.pressure_grid, rank, &x.pressure)?;
        let SaddlePointVector { velocity, pressure } = y;
        let mut yu_local = GhostedVector::accumulate(&self.velocity_grid, rank, velocity)?;
        let mut yp_local = GhostedVector::accumulate(&self.pressure_grid, rank, pressure)?;

        self.viscous.apply::<_, _, D>(Operands::Single {
            x: &u_local,
            y: &mut yu_local,
        })?;
        self.coupling.apply::<_, _, D>(Operands::Coupled {
            x1: &u_local,
            x2: &p_local,
            y1: &mut yu_local,
            y2: &mut yp_local,
        })?;

        yu_local.local_to_global(InsertMode::Add)?;
        yp_local.local_to_global(InsertMode::Add)
    }

    /// Accumulates the diagonal of the vector Laplacian into `diagonal`, for the cells owned by
    /// `rank`.
    ///
    /// The Laplacian diagonal is used as preconditioner for either viscous operator.
    pub fn assemble_diagonal(&self, rank: usize, diagonal: &mut GlobalVector<T>) -> eyre::Result<()> {
        let mut local = GhostedVector::accumulate(&self.velocity_grid, rank, diagonal)?;
        self.viscous_diagonal
            .apply::<GhostedVector<T, D>, _, D>(Operands::Diagonal { y: &mut local })?;
        local.local_to_global(InsertMode::Add)
    }

    /// Adds the singular corrections of all particle pairs near the cells owned by `rank` to
    /// `velocity`, using the correction settings of the session.
    pub fn apply_corrections<S, P>(
        &self,
        rank: usize,
        particles: &[Particle<T, S, D>],
        velocity: &mut GlobalVector<T>,
        supplier: &P,
    ) -> eyre::Result<CorrectionReport>
    where
        S: Shape<T, D> + Sync,
        P: ?Sized + SingularFieldSupplier<T, S, D> + Sync,
    {
        let mut local = GhostedVector::accumulate(&self.velocity_grid, rank, velocity)?;
        let settings = &self.settings.correction;
        apply_corrections_with_settings(particles, &mut local, &self.velocity_grid, supplier, settings)
    }

    pub fn apply_viscous_all(&self, x: &GlobalVector<T>, y: &mut GlobalVector<T>) -> eyre::Result<()> {
        (0..self.num_ranks()).try_for_each(|rank| self.apply_viscous(rank, x, y))
    }

    pub fn apply_stokes_all(&self, x: &SaddlePointVector<T>, y: &mut SaddlePointVector<T>) -> eyre::Result<()> {
        (0..self.num_ranks()).try_for_each(|rank| self.apply_stokes(rank, x, y))
    }

    pub fn assemble_diagonal_all(&self, diagonal: &mut GlobalVector<T>) -> eyre::Result<()> {
        (0..self.num_ranks()).try_for_each(|rank| self.assemble_diagonal(rank, diagonal))
    }

    /// Runs [`apply_corrections`](Self::apply_corrections) on every rank and sums the reports.
    pub fn apply_corrections_all<S, P>(
        &self,
        particles: &[Particle<T, S, D>],
        velocity: &mut GlobalVector<T>,
        supplier: &P,
    ) -> eyre::Result<CorrectionReport>
    where
        S: Shape<T, D> + Sync,
        P: ?Sized + SingularFieldSupplier<T, S, D> + Sync,
    {
        let mut report = CorrectionReport::default();
        for rank in 0..self.num_ranks() {
            report += self.apply_corrections(rank, particles, velocity, supplier)?;
        }
        Ok(report)
    }
}
