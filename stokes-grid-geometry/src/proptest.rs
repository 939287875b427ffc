//! Proptest strategies for positions and boxes.
use crate::{GridBox, IndexBox, Position};
use proptest::collection::vec;
use proptest::prelude::*;
use std::ops::Range;

/// Strategy for real positions with every coordinate drawn from `range`.
pub fn position<const D: usize>(range: Range<f64>) -> impl Strategy<Value = Position<f64, D>> {
    vec(range, D).prop_map(|coords| Position::from(to_array(coords)))
}

/// Strategy for valid real boxes with corners drawn from `range`.
///
/// Degenerate boxes (zero length along some axis) are included.
pub fn grid_box<const D: usize>(range: Range<f64>) -> impl Strategy<Value = GridBox<f64, D>> {
    (position::<D>(range.clone()), position::<D>(range)).prop_map(|(a, b)| sorted_box(a, b))
}

/// Strategy for valid index boxes with corners drawn from `range`.
pub fn index_box<const D: usize>(range: Range<isize>) -> impl Strategy<Value = IndexBox<D>> {
    (vec(range.clone(), D), vec(range, D))
        .prop_map(|(a, b)| sorted_box(Position::from(to_array(a)), Position::from(to_array(b))))
}

fn sorted_box<T, const D: usize>(a: Position<T, D>, b: Position<T, D>) -> GridBox<T, D>
where
    T: nalgebra::Scalar + Copy + PartialOrd,
{
    let mut bottom_left = a;
    let mut upper_right = b;
    for i in 0..D {
        if bottom_left[i] > upper_right[i] {
            std::mem::swap(&mut bottom_left[i], &mut upper_right[i]);
        }
    }
    GridBox::new(bottom_left, upper_right)
}

fn to_array<T: std::fmt::Debug, const D: usize>(coords: Vec<T>) -> [T; D] {
    <[T; D]>::try_from(coords).expect("Strategy always produces exactly D coordinates")
}
