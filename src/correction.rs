//! Injection of near-contact singularities into a velocity solution.
//!
//! For every pair of particles with an applicable [`Singularity`], the singular flow is sampled on
//! the grid cells around the pair and its weak form
//!
//! $$
//! \int_K \nabla u_s : \nabla \phi \\, \mathrm{d}x - \int_K p_s \\, \nabla \cdot \phi \\, \mathrm{d}x
//! $$
//!
//! is added to the nodal values of each cell $K$. Each cell is split into `scale^D` sub-cells and
//! the integrand is evaluated once per sub-cell, at its lower-left corner, with weight
//! `1 / scale^D`. Samples inside either particle are skipped.
use crate::element::Q1Cell;
use crate::geometry::{box_inside, intersect, overlap_box, IndexBox, IndexPosition};
use crate::grid::{iterate, GridConnectivity, Q1Connectivity, StructuredGrid};
use crate::particle::{Particle, Shape};
use crate::singularity::{SingularFieldSupplier, SingularFlow, Singularity};
use crate::vector::{DistributedVector, InsertMode};
use eyre::eyre;
use log::debug;
use nalgebra::{Point, SVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use stokes_grid_traits::{real_from_usize, Real};

/// Selects which correction terms are computed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionFlags {
    /// Add the singular Stokes flow to the velocity.
    pub stokes: bool,
    /// Correct the boundary conditions on the particle surfaces. Not implemented yet.
    pub boundary: bool,
    /// Correct the forces acting on the particles. Not implemented yet.
    pub forces: bool,
}

impl Default for CorrectionFlags {
    fn default() -> Self {
        Self {
            stokes: true,
            boundary: false,
            forces: false,
        }
    }
}

/// A correction term that can be enabled through [`CorrectionFlags`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CorrectionTerm {
    Stokes,
    BoundaryCondition,
    Forces,
}

impl CorrectionFlags {
    /// The enabled terms, in the order in which they are applied.
    pub fn terms(&self) -> Vec<CorrectionTerm> {
        let mut terms = Vec::new();
        if self.stokes {
            terms.push(CorrectionTerm::Stokes);
        }
        if self.boundary {
            terms.push(CorrectionTerm::BoundaryCondition);
        }
        if self.forces {
            terms.push(CorrectionTerm::Forces);
        }
        terms
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionSettings {
    pub flags: CorrectionFlags,
    /// Process particle pairs in parallel.
    pub parallel: bool,
}

/// Statistics of one correction pass on one rank.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    pub pairs_visited: usize,
    pub pairs_applicable: usize,
    /// Applicable pairs whose correction region overlaps the cells of this rank.
    pub pairs_corrected: usize,
    pub cells_visited: usize,
    pub samples_evaluated: usize,
    /// Samples skipped because they lie inside a particle.
    pub samples_skipped: usize,
}

impl AddAssign for CorrectionReport {
    fn add_assign(&mut self, rhs: Self) {
        self.pairs_visited += rhs.pairs_visited;
        self.pairs_applicable += rhs.pairs_applicable;
        self.pairs_corrected += rhs.pairs_corrected;
        self.cells_visited += rhs.cells_visited;
        self.samples_evaluated += rhs.samples_evaluated;
        self.samples_skipped += rhs.samples_skipped;
    }
}

/// Converts a physical coordinate into index units, truncating toward zero.
fn to_index<T: Real>(x: T, h: T) -> eyre::Result<isize> {
    let index: f64 = nalgebra::try_convert(x / h).ok_or_else(|| eyre!("Coordinate is not representable as f64"))?;
    Ok(index.trunc() as isize)
}

/// The index box `[(c - cutoff) / h, (c + cutoff) / h]` around a particle.
fn influence_box<T: Real, S, const D: usize>(
    particle: &Particle<T, S, D>,
    cutoff: T,
    h: &[T; D],
) -> eyre::Result<IndexBox<D>>
where
    S: Shape<T, D>,
{
    let c = particle.center();
    let mut bottom_left = [0; D];
    let mut upper_right = [0; D];
    for i in 0..D {
        bottom_left[i] = to_index(c[i] - cutoff, h[i])?;
        upper_right[i] = to_index(c[i] + cutoff, h[i])?;
    }
    Ok(IndexBox::from_corners(bottom_left, upper_right))
}

/// The cells around the pair that are owned locally, or `None` if there are none.
///
/// The returned box may still be empty when the regions only touch.
fn correction_region<T: Real, S, const D: usize>(
    p1: &Particle<T, S, D>,
    p2: &Particle<T, S, D>,
    cutoff: T,
    h: &[T; D],
    owned_cells: &IndexBox<D>,
) -> eyre::Result<Option<IndexBox<D>>>
where
    S: Shape<T, D>,
{
    let b1 = influence_box(p1, cutoff, h)?;
    let b2 = influence_box(p2, cutoff, h)?;
    let pair_region = overlap_box(&b1, &b2);
    if intersect(owned_cells, &pair_region) {
        Ok(Some(box_inside(owned_cells, &pair_region)))
    } else {
        Ok(None)
    }
}

/// Samples the singular Stokes flow of one pair on every cell of `region` and hands the nodal
/// contributions to `sink`, in a fixed order.
fn sample_stokes_flow<T, S, F, const D: usize>(
    p1: &Particle<T, S, D>,
    p2: &Particle<T, S, D>,
    singularity: &Singularity<T, F, D>,
    region: &IndexBox<D>,
    h: &[T; D],
    report: &mut CorrectionReport,
    mut sink: impl FnMut(&IndexPosition<D>, &SVector<T, D>),
) where
    T: Real,
    S: Shape<T, D>,
    F: SingularFlow<T, D>,
{
    let scale = singularity.scale();
    let scale_t = real_from_usize::<T>(scale);
    let sub_spacing = (*h).map(|h_i| h_i / scale_t);
    let weight = T::one() / (0..D).fold(T::one(), |acc, _| acc * scale_t);
    let cell = Q1Cell::new(*h);
    let connectivity = Q1Connectivity;
    let sub_cells = IndexBox::from_corners([0; D], [scale as isize; D]);

    let mut nodes = vec![IndexPosition::origin(); GridConnectivity::<D>::nodes_per_cell(&connectivity)];
    let mut gradients = vec![SVector::zeros(); Q1Cell::<T, D>::num_nodes()];

    iterate(region, |cell_index| {
        report.cells_visited += 1;
        connectivity.populate_cell_nodes(&mut nodes, cell_index);

        iterate(&sub_cells, |sub| {
            let local = Point::from(std::array::from_fn(|i| real_from_usize::<T>(sub[i] as usize) * sub_spacing[i]));
            let x = Point::from(std::array::from_fn(|i| {
                real_from_usize::<T>(cell_index[i] as usize) * h[i] + local[i]
            }));
            if p1.contains(&x) || p2.contains(&x) {
                report.samples_skipped += 1;
                return;
            }
            report.samples_evaluated += 1;

            cell.populate_basis_gradients(&mut gradients, &local);
            let grad_u = singularity.grad_velocity(&x);
            let p = singularity.pressure(&x);

            for (node, grad_phi) in nodes.iter().zip(&gradients) {
                let mut contribution = SVector::<T, D>::zeros();
                for d1 in 0..D {
                    for d2 in 0..D {
                        contribution[d1] += weight * grad_u[(d1, d2)] * grad_phi[d2];
                    }
                    contribution[d1] -= weight * p * grad_phi[d1];
                }
                sink(node, &contribution);
            }
        });
    });
}

fn add_to_node<T: Real, V, const D: usize>(solution: &mut V, node: &IndexPosition<D>, contribution: &SVector<T, D>)
where
    V: ?Sized + DistributedVector<T, D>,
{
    for (u_d, &c_d) in solution.at_mut(node).iter_mut().zip(contribution.iter()) {
        *u_d += c_d;
    }
}

fn log_unimplemented(term: CorrectionTerm) {
    debug!("Correction term {term:?} is not implemented, skipping");
}

fn check_solution<T: Real, V, const D: usize>(solution: &V)
where
    V: ?Sized + DistributedVector<T, D>,
{
    assert_eq!(solution.dof(), D, "Solution must be a velocity field with D components");
}

/// Adds the singular near-contact flow of every applicable particle pair to a velocity field.
///
/// `solution` must be an accumulation view of the velocity field on `grid`: its local values are
/// reset to zero, the corrections of all pairs near the locally owned cells are accumulated, and
/// the result is added to the global field by a single
/// [`local_to_global`](DistributedVector::local_to_global) reduction. As every rank performs
/// exactly one reduction per call, all ranks must call this function the same number of times.
///
/// # Panics
///
/// Panics if `solution` does not have `D` components.
///
/// # Errors
///
/// Returns an error if the reduction fails, e.g. because `solution` is not bound to global
/// storage.
pub fn apply_corrections<T, S, V, P, const D: usize>(
    particles: &[Particle<T, S, D>],
    solution: &mut V,
    grid: &StructuredGrid<T, D>,
    supplier: &P,
    flags: &CorrectionFlags,
) -> eyre::Result<CorrectionReport>
where
    T: Real,
    S: Shape<T, D>,
    V: ?Sized + DistributedVector<T, D>,
    P: ?Sized + SingularFieldSupplier<T, S, D>,
{
    check_solution::<T, V, D>(solution);
    solution.fill(T::zero());

    let h = grid.spacing();
    let owned_cells = solution.owned_cells();
    let terms = flags.terms();
    let mut report = CorrectionReport::default();

    for (i, p1) in particles.iter().enumerate() {
        for p2 in &particles[i + 1..] {
            report.pairs_visited += 1;
            let singularity = supplier.singularity(p1, p2);
            if !singularity.applies() {
                continue;
            }
            report.pairs_applicable += 1;

            let Some(region) = correction_region(p1, p2, singularity.cutoff(), &h, &owned_cells)? else {
                continue;
            };
            report.pairs_corrected += 1;

            for &term in &terms {
                match term {
                    CorrectionTerm::Stokes => {
                        sample_stokes_flow(p1, p2, &singularity, &region, &h, &mut report, |node, contribution| {
                            add_to_node(solution, node, contribution)
                        })
                    }
                    CorrectionTerm::BoundaryCondition | CorrectionTerm::Forces => log_unimplemented(term),
                }
            }
        }
    }

    solution.local_to_global(InsertMode::Add)?;
    debug!("Applied singularity corrections: {report:?}");
    Ok(report)
}

/// Contributions of a single pair, in the order in which the serial pass adds them.
struct PairContributions<T, const D: usize> {
    report: CorrectionReport,
    nodal: Vec<(IndexPosition<D>, SVector<T, D>)>,
}

/// Same as [`apply_corrections`], but with particle pairs processed in parallel.
///
/// Every pair collects its nodal contributions separately. The lists are merged into `solution`
/// in pair order before the reduction, so the result is identical to that of the serial version.
pub fn apply_corrections_par<T, S, V, P, const D: usize>(
    particles: &[Particle<T, S, D>],
    solution: &mut V,
    grid: &StructuredGrid<T, D>,
    supplier: &P,
    flags: &CorrectionFlags,
) -> eyre::Result<CorrectionReport>
where
    T: Real,
    S: Shape<T, D> + Sync,
    V: ?Sized + DistributedVector<T, D>,
    P: ?Sized + SingularFieldSupplier<T, S, D> + Sync,
{
    check_solution::<T, V, D>(solution);
    solution.fill(T::zero());

    let h = grid.spacing();
    let owned_cells = solution.owned_cells();
    let terms = flags.terms();

    let pairs: Vec<(usize, usize)> = (0..particles.len())
        .flat_map(|i| (i + 1..particles.len()).map(move |j| (i, j)))
        .collect();

    let per_pair: Vec<PairContributions<T, D>> = pairs
        .par_iter()
        .map(|&(i, j)| -> eyre::Result<PairContributions<T, D>> {
            let (p1, p2) = (&particles[i], &particles[j]);
            let mut contributions = PairContributions {
                report: CorrectionReport {
                    pairs_visited: 1,
                    ..Default::default()
                },
                nodal: Vec::new(),
            };

            let singularity = supplier.singularity(p1, p2);
            if !singularity.applies() {
                return Ok(contributions);
            }
            contributions.report.pairs_applicable += 1;

            let Some(region) = correction_region(p1, p2, singularity.cutoff(), &h, &owned_cells)? else {
                return Ok(contributions);
            };
            contributions.report.pairs_corrected += 1;

            for &term in &terms {
                match term {
                    CorrectionTerm::Stokes => {
                        let PairContributions { report, nodal } = &mut contributions;
                        sample_stokes_flow(p1, p2, &singularity, &region, &h, report, |node, contribution| {
                            nodal.push((*node, *contribution))
                        })
                    }
                    CorrectionTerm::BoundaryCondition | CorrectionTerm::Forces => log_unimplemented(term),
                }
            }
            Ok(contributions)
        })
        .collect::<eyre::Result<_>>()?;

    let mut report = CorrectionReport::default();
    for contributions in per_pair {
        report += contributions.report;
        for (node, contribution) in &contributions.nodal {
            add_to_node(solution, node, contribution);
        }
    }

    solution.local_to_global(InsertMode::Add)?;
    debug!("Applied singularity corrections in parallel: {report:?}");
    Ok(report)
}

/// Runs [`apply_corrections`] or [`apply_corrections_par`] depending on the settings.
pub fn apply_corrections_with_settings<T, S, V, P, const D: usize>(
    particles: &[Particle<T, S, D>],
    solution: &mut V,
    grid: &StructuredGrid<T, D>,
    supplier: &P,
    settings: &CorrectionSettings,
) -> eyre::Result<CorrectionReport>
where
    T: Real,
    S: Shape<T, D> + Sync,
    V: ?Sized + DistributedVector<T, D>,
    P: ?Sized + SingularFieldSupplier<T, S, D> + Sync,
{
    if settings.parallel {
        apply_corrections_par(particles, solution, grid, supplier, &settings.flags)
    } else {
        apply_corrections(particles, solution, grid, supplier, &settings.flags)
    }
}
