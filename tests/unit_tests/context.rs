use crate::random_field;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::point;
use stokes_grid::context::{SolveContext, StokesSettings, ViscousOperator};
use stokes_grid::correction::{CorrectionFlags, CorrectionSettings};
use stokes_grid::grid::StructuredGrid;
use stokes_grid::particle::{Circle, Particle};
use stokes_grid::singularity::{ClosureFlow, NearContactSupplier};
use stokes_grid::vector::{GlobalVector, SaddlePointVector};

fn context(parts: [usize; 2], viscous_operator: ViscousOperator) -> SolveContext<f64, 2> {
    let pressure_grid = StructuredGrid::new([5, 4], [1.0, 0.75]).decompose(parts);
    let settings = StokesSettings {
        viscous_operator,
        ..Default::default()
    };
    SolveContext::new(pressure_grid, settings)
}

fn random_saddle_point_vector(context: &SolveContext<f64, 2>, seed: u64) -> SaddlePointVector<f64> {
    SaddlePointVector {
        velocity: random_field(context.velocity_grid(), 2, seed),
        pressure: random_field(context.pressure_grid(), 1, seed + 1),
    }
}

#[test]
fn settings_deserialization() {
    let settings: StokesSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings, StokesSettings::default());
    assert_eq!(settings.viscous_operator, ViscousOperator::Laplacian);
    assert_eq!(settings.correction.flags, CorrectionFlags::default());

    let json = r#"{ "viscous_operator": "strain_tensor", "correction": { "parallel": true } }"#;
    let settings: StokesSettings = serde_json::from_str(json).unwrap();
    assert_eq!(settings.viscous_operator, ViscousOperator::StrainTensor);
    assert!(settings.correction.parallel);
    assert!(settings.correction.flags.stokes);
}

#[test]
fn context_grids() {
    let context = context([2, 2], ViscousOperator::Laplacian);
    assert_eq!(context.num_ranks(), 4);
    assert_eq!(context.velocity_grid().nodes(), &[9, 7]);
    assert_eq!(context.velocity_grid().num_ranks(), 4);
    assert_eq!(context.stencils().laplacian.num_basis(), 4);

    let zero = context.zero_vector();
    assert_eq!(zero.velocity.num_nodes(), 63);
    assert_eq!(zero.velocity.dof(), 2);
    assert_eq!(zero.pressure.num_nodes(), 20);
    assert_eq!(zero.pressure.dof(), 1);
}

#[test]
fn stokes_operator_is_independent_of_decomposition() {
    for viscous_operator in [ViscousOperator::Laplacian, ViscousOperator::StrainTensor] {
        let single = context([1, 1], viscous_operator);
        let decomposed = context([2, 2], viscous_operator);
        let x = random_saddle_point_vector(&single, 5);

        let mut y_single = single.zero_vector();
        let mut y_decomposed = decomposed.zero_vector();
        single.apply_stokes_all(&x, &mut y_single).unwrap();
        decomposed.apply_stokes_all(&x, &mut y_decomposed).unwrap();

        let tol = 1e-12;
        assert_matrix_eq!(y_single.velocity.to_dvector(), y_decomposed.velocity.to_dvector(), comp = abs, tol = tol);
        assert_matrix_eq!(y_single.pressure.to_dvector(), y_decomposed.pressure.to_dvector(), comp = abs, tol = tol);
    }
}

#[test]
fn stokes_operator_blocks() {
    let context = context([2, 1], ViscousOperator::Laplacian);
    let x = random_saddle_point_vector(&context, 11);

    // The velocity block of [u, 0] is the viscous operator
    let u_only = SaddlePointVector {
        velocity: x.velocity.clone(),
        pressure: GlobalVector::for_grid(context.pressure_grid(), 1),
    };
    let mut y = context.zero_vector();
    context.apply_stokes_all(&u_only, &mut y).unwrap();
    let mut a_u = GlobalVector::for_grid(context.velocity_grid(), 2);
    context.apply_viscous_all(&x.velocity, &mut a_u).unwrap();
    assert_matrix_eq!(y.velocity.to_dvector(), a_u.to_dvector(), comp = abs, tol = 1e-13);

    // The Stokes operator is antisymmetric in its off-diagonal blocks, so <K x, x> = <A u, u>
    let mut y = context.zero_vector();
    context.apply_stokes_all(&x, &mut y).unwrap();
    assert_scalar_eq!(y.dot(&x), a_u.dot(&x.velocity), comp = abs, tol = 1e-12);
}

#[test]
fn diagonal_matches_operator() {
    for viscous_operator in [ViscousOperator::Laplacian, ViscousOperator::StrainTensor] {
        let context = context([2, 2], viscous_operator);
        let mut diagonal = GlobalVector::for_grid(context.velocity_grid(), 2);
        context.assemble_diagonal_all(&mut diagonal).unwrap();

        // The Laplacian diagonal is used for both viscous operators
        let laplacian = self::context([2, 2], ViscousOperator::Laplacian);
        for index in [0, 17, 40, 125] {
            let mut unit = GlobalVector::for_grid(context.velocity_grid(), 2);
            unit.values_mut()[index] = 1.0;
            let mut column = GlobalVector::for_grid(context.velocity_grid(), 2);
            laplacian.apply_viscous_all(&unit, &mut column).unwrap();
            assert_scalar_eq!(diagonal.values()[index], column.values()[index], comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn corrections_are_added_to_velocity() {
    let pressure_grid = StructuredGrid::new([6, 6], [1.0, 1.0]).decompose([2, 2]);
    let model = |_: &Particle<f64, Circle<f64>, 2>, _: &Particle<f64, Circle<f64>, 2>| {
        ClosureFlow::new(
            |x: &nalgebra::Point2<f64>| nalgebra::Matrix2::new(x.y, 0.0, 0.0, x.x),
            |x: &nalgebra::Point2<f64>| 1.0 + x.x,
        )
    };
    let supplier = NearContactSupplier::new(2, 0.3, model);
    let particles = vec![
        Particle::new(Circle { radius: 0.05 }, point![0.4, 0.5]),
        Particle::new(Circle { radius: 0.05 }, point![0.62, 0.5]),
    ];

    let serial = SolveContext::new(pressure_grid.clone(), StokesSettings::default());
    let mut from_zero = GlobalVector::for_grid(serial.velocity_grid(), 2);
    let report = serial
        .apply_corrections_all(&particles, &mut from_zero, &supplier)
        .unwrap();
    assert_eq!(report.pairs_visited, 4);
    assert!(report.cells_visited > 0);
    assert!(from_zero.values().iter().any(|&v| v != 0.0));

    let initial = random_field(serial.velocity_grid(), 2, 99);
    let mut corrected = initial.clone();
    serial
        .apply_corrections_all(&particles, &mut corrected, &supplier)
        .unwrap();
    for ((&c, &i), &z) in corrected.values().iter().zip(initial.values()).zip(from_zero.values()) {
        assert_scalar_eq!(c - i, z, comp = abs, tol = 1e-12);
    }

    let settings = StokesSettings {
        correction: CorrectionSettings {
            parallel: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let parallel = SolveContext::new(pressure_grid, settings);
    let mut from_zero_parallel = GlobalVector::for_grid(parallel.velocity_grid(), 2);
    let parallel_report = parallel
        .apply_corrections_all(&particles, &mut from_zero_parallel, &supplier)
        .unwrap();
    assert_eq!(parallel_report, report);
    assert_eq!(from_zero_parallel, from_zero);
}
