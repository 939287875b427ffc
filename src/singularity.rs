//! Near-contact singularities between pairs of particles.
//!
//! When two particles get close, the flow in the thin gap between them develops large gradients
//! that a grid cannot resolve. If the singular part of the flow is known analytically, it can be
//! added to the discrete solution, see [`apply_corrections`](crate::correction::apply_corrections).
//! This module describes such singular fields and decides for which pairs they apply.
use crate::particle::{Particle, Shape};
use log::{debug, warn};
use nalgebra::{Point, SMatrix, Scalar};
use stokes_grid_traits::Real;

/// An analytically known singular flow field.
pub trait SingularFlow<T: Scalar, const D: usize> {
    /// The velocity gradient $\nabla u$ at `x`, with entry `(i, j)` being $\partial_j u_i$.
    fn grad_velocity(&self, x: &Point<T, D>) -> SMatrix<T, D, D>;

    fn pressure(&self, x: &Point<T, D>) -> T;
}

impl<'a, T: Scalar, F: SingularFlow<T, D>, const D: usize> SingularFlow<T, D> for &'a F {
    fn grad_velocity(&self, x: &Point<T, D>) -> SMatrix<T, D, D> {
        F::grad_velocity(self, x)
    }

    fn pressure(&self, x: &Point<T, D>) -> T {
        F::pressure(self, x)
    }
}

/// A [`SingularFlow`] defined by a pair of closures.
#[derive(Debug, Clone, Copy)]
pub struct ClosureFlow<G, P> {
    grad_velocity: G,
    pressure: P,
}

impl<G, P> ClosureFlow<G, P> {
    pub fn new(grad_velocity: G, pressure: P) -> Self {
        Self {
            grad_velocity,
            pressure,
        }
    }
}

impl<T, G, P, const D: usize> SingularFlow<T, D> for ClosureFlow<G, P>
where
    T: Scalar,
    G: Fn(&Point<T, D>) -> SMatrix<T, D, D>,
    P: Fn(&Point<T, D>) -> T,
{
    fn grad_velocity(&self, x: &Point<T, D>) -> SMatrix<T, D, D> {
        (self.grad_velocity)(x)
    }

    fn pressure(&self, x: &Point<T, D>) -> T {
        (self.pressure)(x)
    }
}

/// The singularity of an ordered particle pair.
///
/// A singularity either does not apply, or carries the singular flow together with the cutoff
/// distance that bounds its influence region and the number of sub-cells per axis used to sample
/// it on each grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Singularity<T, F, const D: usize> {
    scale: usize,
    cutoff: T,
    flow: Option<F>,
}

impl<T: Real, F: SingularFlow<T, D>, const D: usize> Singularity<T, F, D> {
    /// # Panics
    ///
    /// Panics if `scale` is zero or `cutoff` is negative.
    pub fn new(scale: usize, cutoff: T, flow: F) -> Self {
        assert!(scale > 0, "Singularity scale must be positive");
        assert!(cutoff >= T::zero(), "Singularity cutoff must be non-negative");
        Self {
            scale,
            cutoff,
            flow: Some(flow),
        }
    }

    pub fn not_applicable() -> Self {
        Self {
            scale: 1,
            cutoff: T::zero(),
            flow: None,
        }
    }

    pub fn applies(&self) -> bool {
        self.flow.is_some()
    }

    /// Number of sub-cells per axis and grid cell.
    pub fn scale(&self) -> usize {
        self.scale
    }

    pub fn cutoff(&self) -> T {
        self.cutoff
    }

    pub fn flow(&self) -> Option<&F> {
        self.flow.as_ref()
    }

    /// # Panics
    ///
    /// Panics if the singularity does not apply.
    pub fn grad_velocity(&self, x: &Point<T, D>) -> SMatrix<T, D, D> {
        self.applicable_flow().grad_velocity(x)
    }

    /// # Panics
    ///
    /// Panics if the singularity does not apply.
    pub fn pressure(&self, x: &Point<T, D>) -> T {
        self.applicable_flow().pressure(x)
    }

    fn applicable_flow(&self) -> &F {
        match &self.flow {
            Some(flow) => flow,
            None => panic!("Cannot evaluate a singularity that does not apply"),
        }
    }
}

/// Provides the singularity of a particle pair.
pub trait SingularFieldSupplier<T: Scalar, S, const D: usize> {
    type Flow: SingularFlow<T, D>;

    fn singularity(&self, p1: &Particle<T, S, D>, p2: &Particle<T, S, D>) -> Singularity<T, Self::Flow, D>;
}

/// Supplies singularities for pairs of particles of the same kind whose surfaces are closer than
/// the cutoff distance. Touching particles qualify, overlapping ones do not.
///
/// The singular flow of a qualifying pair is built by the `model` closure.
#[derive(Debug, Clone)]
pub struct NearContactSupplier<T, M> {
    scale: usize,
    cutoff: T,
    model: M,
}

impl<T: Real, M> NearContactSupplier<T, M> {
    /// # Panics
    ///
    /// Panics if `scale` is zero or `cutoff` is not strictly positive.
    pub fn new(scale: usize, cutoff: T, model: M) -> Self {
        assert!(scale > 0, "Singularity scale must be positive");
        assert!(cutoff > T::zero(), "Cutoff distance must be strictly positive");
        Self { scale, cutoff, model }
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    pub fn cutoff(&self) -> T {
        self.cutoff
    }
}

impl<T, S, F, M, const D: usize> SingularFieldSupplier<T, S, D> for NearContactSupplier<T, M>
where
    T: Real,
    S: Shape<T, D>,
    F: SingularFlow<T, D>,
    M: Fn(&Particle<T, S, D>, &Particle<T, S, D>) -> F,
{
    type Flow = F;

    fn singularity(&self, p1: &Particle<T, S, D>, p2: &Particle<T, S, D>) -> Singularity<T, F, D> {
        if p1.kind() != p2.kind() {
            debug!("No singular field known for a {:?}-{:?} pair", p1.kind(), p2.kind());
            return Singularity::not_applicable();
        }

        let gap = p1.surface_gap(p2);
        if gap < T::zero() {
            warn!(
                "Particles at {:?} and {:?} overlap (gap {}), skipping singularity",
                p1.center(),
                p2.center(),
                gap
            );
            Singularity::not_applicable()
        } else if gap < self.cutoff {
            Singularity::new(self.scale, self.cutoff, (self.model)(p1, p2))
        } else {
            Singularity::not_applicable()
        }
    }
}
