//! Rigid particles and their shapes.
use nalgebra::{Point, Point2, Point3, Scalar};
use serde::{Deserialize, Serialize};
use stokes_grid_traits::Real;

/// Tag identifying the kind of a shape.
///
/// Singular near-contact fields are only known for pairs of particles of the same kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Circle,
    Sphere,
    Ellipse,
}

/// The shape of a rigid particle, described relative to the particle center.
pub trait Shape<T: Scalar, const D: usize> {
    fn kind(&self) -> ShapeKind;

    /// Whether `point` lies inside the shape (boundary included) when centered at `center`.
    fn contains(&self, center: &Point<T, D>, point: &Point<T, D>) -> bool;

    /// Radius of the smallest centered ball enclosing the shape.
    fn radius_bound(&self) -> T;
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle<T> {
    pub radius: T,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sphere<T> {
    pub radius: T,
}

/// An axis-aligned ellipse with the given semi-axes.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse<T> {
    pub semi_axes: [T; 2],
}

impl<T: Real> Shape<T, 2> for Circle<T> {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Circle
    }

    fn contains(&self, center: &Point2<T>, point: &Point2<T>) -> bool {
        (point - center).norm_squared() <= self.radius * self.radius
    }

    fn radius_bound(&self) -> T {
        self.radius
    }
}

impl<T: Real> Shape<T, 3> for Sphere<T> {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Sphere
    }

    fn contains(&self, center: &Point3<T>, point: &Point3<T>) -> bool {
        (point - center).norm_squared() <= self.radius * self.radius
    }

    fn radius_bound(&self) -> T {
        self.radius
    }
}

impl<T: Real> Shape<T, 2> for Ellipse<T> {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Ellipse
    }

    fn contains(&self, center: &Point2<T>, point: &Point2<T>) -> bool {
        let r = point - center;
        let [a, b] = self.semi_axes;
        (r.x * r.x) / (a * a) + (r.y * r.y) / (b * b) <= T::one()
    }

    fn radius_bound(&self) -> T {
        self.semi_axes[0].max(self.semi_axes[1])
    }
}

/// A rigid particle: a shape placed at a center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "S: Serialize, Point<T, D>: Serialize",
    deserialize = "S: Deserialize<'de>, Point<T, D>: Deserialize<'de>"
))]
pub struct Particle<T: Scalar, S, const D: usize> {
    shape: S,
    center: Point<T, D>,
}

impl<T, S, const D: usize> Particle<T, S, D>
where
    T: Real,
    S: Shape<T, D>,
{
    pub fn new(shape: S, center: Point<T, D>) -> Self {
        Self { shape, center }
    }

    pub fn center(&self) -> &Point<T, D> {
        &self.center
    }

    pub fn shape(&self) -> &S {
        &self.shape
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    pub fn contains(&self, point: &Point<T, D>) -> bool {
        self.shape.contains(&self.center, point)
    }

    /// Distance between the centers minus the radius bounds of both shapes.
    ///
    /// Exact for circles and spheres, a lower bound of the true gap for other shapes. Negative
    /// values indicate overlapping particles.
    pub fn surface_gap(&self, other: &Self) -> T {
        (other.center - self.center).norm() - self.shape.radius_bound() - other.shape.radius_bound()
    }
}
