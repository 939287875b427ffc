//! Axis-aligned box primitives on structured grids.
//!
//! The same types are used in physical space (real coordinates) and in index space (integer
//! grid coordinates). Boxes are allowed to be *inverted*, i.e. have `bottom_left[i] > upper_right[i]`
//! on some axis, which is what e.g. [`overlap_box`] produces for disjoint inputs. Such boxes are
//! treated as empty regions by consumers rather than being rejected.
use nalgebra::{Point, Scalar};

mod grid_box;
pub use grid_box::*;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate nalgebra;

/// A `D`-dimensional coordinate tuple.
///
/// Used both for physical coordinates (`Position<f64, D>`) and grid indices
/// (`Position<isize, D>`).
pub type Position<T, const D: usize> = Point<T, D>;

/// Index-space position.
pub type IndexPosition<const D: usize> = Position<isize, D>;

/// Index-space box.
pub type IndexBox<const D: usize> = GridBox<isize, D>;

/// Constructs a position from its components.
pub fn position<T: Scalar, const D: usize>(coords: [T; D]) -> Position<T, D> {
    Position::from(coords)
}
