use matrixcompare::assert_scalar_eq;
use nalgebra::{point, Point2};
use stokes_grid::particle::{Circle, Ellipse, Particle, Shape, ShapeKind, Sphere};

#[test]
fn circle_contains_boundary() {
    let particle = Particle::new(Circle { radius: 0.5 }, point![1.0, 1.0]);
    assert_eq!(particle.kind(), ShapeKind::Circle);
    assert!(particle.contains(&point![1.0, 1.0]));
    assert!(particle.contains(&point![1.5, 1.0]));
    assert!(particle.contains(&point![1.2, 1.3]));
    assert!(!particle.contains(&point![1.4, 1.4]));
    assert!(!particle.contains(&point![0.0, 0.0]));
}

#[test]
fn sphere_contains() {
    let particle = Particle::new(Sphere { radius: 1.0 }, point![0.0, 0.0, 0.0]);
    assert_eq!(particle.kind(), ShapeKind::Sphere);
    assert!(particle.contains(&point![0.0, 0.0, 1.0]));
    assert!(particle.contains(&point![0.5, 0.5, 0.5]));
    assert!(!particle.contains(&point![0.6, 0.6, 0.6]));
}

#[test]
fn ellipse_contains_and_bound() {
    let ellipse = Ellipse { semi_axes: [2.0, 0.5] };
    let particle = Particle::new(ellipse, Point2::origin());
    assert_eq!(particle.kind(), ShapeKind::Ellipse);
    assert_eq!(ellipse.radius_bound(), 2.0);
    assert!(particle.contains(&point![2.0, 0.0]));
    assert!(particle.contains(&point![0.0, -0.5]));
    assert!(particle.contains(&point![1.0, 0.25]));
    assert!(!particle.contains(&point![0.0, 0.6]));
    assert!(!particle.contains(&point![1.9, 0.4]));
}

#[test]
fn surface_gap() {
    let p1 = Particle::new(Circle { radius: 0.25 }, point![0.0, 0.0]);
    let p2 = Particle::new(Circle { radius: 0.5 }, point![3.0, 4.0]);
    assert_scalar_eq!(p1.surface_gap(&p2), 4.25, comp = abs, tol = 1e-14);
    assert_scalar_eq!(p2.surface_gap(&p1), 4.25, comp = abs, tol = 1e-14);

    let p3 = Particle::new(Circle { radius: 1.0 }, point![0.5, 0.0]);
    assert!(p1.surface_gap(&p3) < 0.0);
}

#[test]
fn particle_serialization() {
    let particle = Particle::new(Circle { radius: 0.5 }, point![1.0, 2.0]);
    let json = serde_json::to_string(&particle).unwrap();
    let deserialized: Particle<f64, Circle<f64>, 2> = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, particle);

    let kind: ShapeKind = serde_json::from_str("\"Ellipse\"").unwrap();
    assert_eq!(kind, ShapeKind::Ellipse);
}
