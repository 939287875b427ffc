use crate::Position;
use nalgebra::Scalar;
use num::Num;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// An axis-aligned box given by its bottom left and upper right corners.
///
/// The box is *valid* if `bottom_left[i] <= upper_right[i]` for every axis `i`. Invalid
/// (inverted) boxes are representable and are interpreted as empty regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound(
    serialize = "Position<T, D>: Serialize",
    deserialize = "Position<T, D>: Deserialize<'de>"
))]
pub struct GridBox<T: Scalar, const D: usize> {
    pub bottom_left: Position<T, D>,
    pub upper_right: Position<T, D>,
}

impl<T, const D: usize> GridBox<T, D>
where
    T: Scalar + Copy + PartialOrd,
{
    pub fn new(bottom_left: Position<T, D>, upper_right: Position<T, D>) -> Self {
        Self {
            bottom_left,
            upper_right,
        }
    }

    pub fn from_corners(bottom_left: [T; D], upper_right: [T; D]) -> Self {
        Self::new(Position::from(bottom_left), Position::from(upper_right))
    }

    /// Returns `true` if `bottom_left[i] <= upper_right[i]` on every axis.
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self.bottom_left[i] <= self.upper_right[i])
    }

    /// Returns the `2^D` corners of the box.
    ///
    /// The corners are enumerated in lexicographic order with the first axis varying fastest.
    /// In 2D this gives
    ///
    /// ```text
    /// (x_bl, y_bl), (x_ur, y_bl), (x_bl, y_ur), (x_ur, y_ur)
    /// ```
    pub fn box_points(&self) -> Vec<Position<T, D>> {
        (0..1usize << D)
            .map(|corner| {
                let coords = std::array::from_fn(|d| {
                    if (corner >> d) & 1 == 0 {
                        self.bottom_left[d]
                    } else {
                        self.upper_right[d]
                    }
                });
                Position::from(coords)
            })
            .collect()
    }
}

impl<T, const D: usize> GridBox<T, D>
where
    T: Scalar + Copy + PartialOrd + Num,
{
    /// The box `[center - half_extent, center + half_extent]` on every axis.
    pub fn from_center_and_half_extent(center: &Position<T, D>, half_extent: T) -> Self {
        let bottom_left = Position::from(std::array::from_fn(|i| center[i] - half_extent));
        let upper_right = Position::from(std::array::from_fn(|i| center[i] + half_extent));
        Self::new(bottom_left, upper_right)
    }

    /// The length of the box along axis `i`.
    pub fn length(&self, i: usize) -> T {
        let (a, b) = (self.bottom_left[i], self.upper_right[i]);
        if b >= a {
            b - a
        } else {
            a - b
        }
    }

    /// The product of the side lengths.
    pub fn volume(&self) -> T {
        (0..D).fold(T::one(), |acc, i| acc * self.length(i))
    }
}

impl<T, const D: usize> Display for GridBox<T, D>
where
    T: Scalar + Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "box : ( ")?;
        for i in 0..D {
            write!(f, "{} ", self.bottom_left[i])?;
        }
        write!(f, "), ( ")?;
        for i in 0..D {
            write!(f, "{} ", self.upper_right[i])?;
        }
        write!(f, ")")
    }
}

/// Returns `true` if the two boxes have a non-empty intersection.
///
/// Boxes that only touch along a face, edge or corner are considered intersecting.
pub fn intersect<T, const D: usize>(b1: &GridBox<T, D>, b2: &GridBox<T, D>) -> bool
where
    T: Scalar + Copy + PartialOrd,
{
    (0..D).all(|i| b1.bottom_left[i] <= b2.upper_right[i] && b1.upper_right[i] >= b2.bottom_left[i])
}

/// The overlapping region of two boxes.
///
/// If the boxes do not [`intersect`], the result is an inverted box.
pub fn overlap_box<T, const D: usize>(b1: &GridBox<T, D>, b2: &GridBox<T, D>) -> GridBox<T, D>
where
    T: Scalar + Copy + PartialOrd,
{
    let bottom_left = std::array::from_fn(|i| max(b1.bottom_left[i], b2.bottom_left[i]));
    let upper_right = std::array::from_fn(|i| min(b1.upper_right[i], b2.upper_right[i]));
    GridBox::from_corners(bottom_left, upper_right)
}

/// The smallest box containing both boxes.
pub fn union_box<T, const D: usize>(b1: &GridBox<T, D>, b2: &GridBox<T, D>) -> GridBox<T, D>
where
    T: Scalar + Copy + PartialOrd,
{
    let bottom_left = std::array::from_fn(|i| min(b1.bottom_left[i], b2.bottom_left[i]));
    let upper_right = std::array::from_fn(|i| max(b1.upper_right[i], b2.upper_right[i]));
    GridBox::from_corners(bottom_left, upper_right)
}

/// Shrinks `b1` so that none of its sides exceed the corresponding sides of `b2`.
///
/// Each side is clamped individually. Sides of `b1` that already lie inside `b2` are kept as is,
/// so this is a directional shrink of `b1` rather than a symmetric intersection.
pub fn box_inside<T, const D: usize>(b1: &GridBox<T, D>, b2: &GridBox<T, D>) -> GridBox<T, D>
where
    T: Scalar + Copy + PartialOrd,
{
    let mut out = *b1;
    for i in 0..D {
        if b2.bottom_left[i] > b1.bottom_left[i] {
            out.bottom_left[i] = b2.bottom_left[i];
        }
        if b2.upper_right[i] < b1.upper_right[i] {
            out.upper_right[i] = b2.upper_right[i];
        }
    }
    out
}

/// Half-open containment test: `bottom_left[i] <= p[i] < upper_right[i]` on every axis.
///
/// The upper side is excluded so that boxes tiling a domain never both claim a shared
/// boundary point.
pub fn point_inside<T, const D: usize>(b: &GridBox<T, D>, p: &Position<T, D>) -> bool
where
    T: Scalar + Copy + PartialOrd,
{
    (0..D).all(|i| p[i] >= b.bottom_left[i] && p[i] < b.upper_right[i])
}

/// Checks whether a part of `b2` lies inside `b1` by counting corner coordinates.
///
/// For every axis, each of the two coordinates of `b2` that falls inside the extent of `b1` on
/// that axis is counted, and the function returns `true` if the count is positive. This is a
/// heuristic: it can report `true` for boxes that are disjoint, and it does not look at whether
/// the counted coordinates belong to the same corner. Use [`intersect`] for an exact test.
pub fn check_box_inside<T, const D: usize>(b1: &GridBox<T, D>, b2: &GridBox<T, D>) -> bool
where
    T: Scalar + Copy + PartialOrd,
{
    let within = |i: usize, x: T| x >= b1.bottom_left[i] && x <= b1.upper_right[i];
    let count: usize = (0..D)
        .map(|i| within(i, b2.bottom_left[i]) as usize + within(i, b2.upper_right[i]) as usize)
        .sum();
    count > 0
}

fn max<T: PartialOrd>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

fn min<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}
