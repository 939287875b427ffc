//! Matrix-free finite element operators on uniform structured grids, and near-contact
//! singularity corrections for rigid particles immersed in a Stokes fluid.
//!
//! Velocities are discretized with Q1 elements on a fine grid, pressures with Q1 elements on a
//! grid twice as coarse. Operators are never assembled: precomputed element stencils are applied
//! cell by cell to ghosted vector views, and the partial sums are merged by an additive reduction.
pub mod context;
pub mod correction;
pub mod element;
pub mod grid;
pub mod operators;
pub mod particle;
pub mod quadrature;
pub mod singularity;
pub mod stencil;
pub mod vector;

pub mod geometry {
    pub use stokes_grid_geometry::*;
}

pub use stokes_grid_traits::Real;

pub extern crate nalgebra;
