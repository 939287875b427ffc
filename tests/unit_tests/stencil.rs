use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use stokes_grid::stencil::{
    laplacian_stencil, mass_stencil, pressure_coupling_stencil, strain_rate_stencil, StencilSet,
};
use util::assert_panics;

#[test]
fn laplacian_stencil_unit_square() {
    let stencil = laplacian_stencil(&[1.0, 1.0]);
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(4, 4, &[
         4.0, -1.0, -1.0, -2.0,
        -1.0,  4.0, -2.0, -1.0,
        -1.0, -2.0,  4.0, -1.0,
        -2.0, -1.0, -1.0,  4.0,
    ]) / 6.0;
    assert_eq!(stencil.num_basis(), 4);
    assert_matrix_eq!(stencil.as_matrix().clone(), expected, comp = abs, tol = 1e-14);
}

#[test]
fn mass_stencil_unit_square() {
    let stencil = mass_stencil(&[1.0, 1.0]);
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(4, 4, &[
        4.0, 2.0, 2.0, 1.0,
        2.0, 4.0, 1.0, 2.0,
        2.0, 1.0, 4.0, 2.0,
        1.0, 2.0, 2.0, 4.0,
    ]) / 36.0;
    assert_matrix_eq!(stencil.as_matrix().clone(), expected, comp = abs, tol = 1e-14);
}

#[test]
fn laplacian_stencil_1d() {
    let stencil = laplacian_stencil(&[0.25]);
    let expected = DMatrix::from_row_slice(2, 2, &[4.0, -4.0, -4.0, 4.0]);
    assert_matrix_eq!(stencil.as_matrix().clone(), expected, comp = abs, tol = 1e-13);
}

#[test]
fn stencils_reject_non_positive_spacing() {
    assert_panics!(laplacian_stencil(&[1.0, 0.0]));
    assert_panics!(mass_stencil(&[-1.0, 1.0]));
    assert_panics!(strain_rate_stencil(&[0.0, 1.0, 1.0]));
    assert_panics!(pressure_coupling_stencil(&[1.0, -0.5]));
}

#[test]
fn stencil_set_sizes() {
    let stencils = StencilSet::new(&[0.1, 0.2, 0.3]);
    assert_eq!(stencils.laplacian.num_basis(), 8);
    assert_eq!(stencils.mass.num_basis(), 8);
    assert_eq!(stencils.strain_rate.num_basis(), 8);
    assert_eq!(stencils.strain_rate.dim(), 3);
    assert_eq!(stencils.pressure_coupling.num_pressure_basis(), 8);
    assert_eq!(stencils.pressure_coupling.num_velocity_basis(), 27);
    assert_eq!(stencils.pressure_coupling.dim(), 3);
}

/// Nodal values of the rigid rotation u = (-y, x) on the corners of a cell.
fn rotation_2d(h: [f64; 2]) -> DVector<f64> {
    let mut u = DVector::zeros(8);
    for k in 0..4 {
        let x = (k & 1) as f64 * h[0];
        let y = ((k >> 1) & 1) as f64 * h[1];
        u[2 * k] = -y;
        u[2 * k + 1] = x;
    }
    u
}

#[test]
fn strain_rate_stencil_entries() {
    let stencil = strain_rate_stencil(&[1.0, 1.0]);
    let laplacian = laplacian_stencil(&[1.0, 1.0]);
    // On the diagonal blocks, the strain-rate stencil is the Laplacian plus the squared derivative
    // along the component direction, which is 1/3 on the unit square
    for k in 0..4 {
        for d in 0..2 {
            let expected = laplacian.get(k, k) + 1.0 / 3.0;
            assert_scalar_eq!(stencil.get(k, k, d, d), expected, comp = abs, tol = 1e-14);
        }
    }
}

proptest! {
    #[test]
    fn laplacian_and_mass_stencils_properties_3d(hx in 0.05..2.0f64, hy in 0.05..2.0f64, hz in 0.05..2.0f64) {
        let h = [hx, hy, hz];
        let laplacian = laplacian_stencil(&h);
        let mass = mass_stencil(&h);
        let scale = laplacian.as_matrix().amax();

        let l = laplacian.as_matrix();
        prop_assert!((l - l.transpose()).amax() <= 1e-12 * scale);
        for row in l.row_iter() {
            prop_assert!(row.sum().abs() <= 1e-12 * scale);
        }

        let m = mass.as_matrix();
        prop_assert!((m - m.transpose()).amax() <= 1e-14);
        prop_assert!((m.sum() - hx * hy * hz).abs() <= 1e-12 * hx * hy * hz);
        prop_assert!(m.iter().all(|&entry| entry > 0.0));
    }

    #[test]
    fn strain_rate_stencil_annihilates_rigid_motions_2d(hx in 0.05..2.0f64, hy in 0.05..2.0f64) {
        let stencil = strain_rate_stencil(&[hx, hy]);
        let s = stencil.as_matrix();
        let scale = s.amax();
        prop_assert!((s - s.transpose()).amax() <= 1e-12 * scale);

        let translation_x = DVector::from_fn(8, |i, _| if i % 2 == 0 { 1.0 } else { 0.0 });
        let translation_y = DVector::from_fn(8, |i, _| if i % 2 == 1 { 1.0 } else { 0.0 });
        let rotation = rotation_2d([hx, hy]);
        prop_assert!((s * translation_x).amax() <= 1e-12 * scale);
        prop_assert!((s * translation_y).amax() <= 1e-12 * scale);
        prop_assert!((s * rotation).amax() <= 1e-12 * scale * (hx + hy));
    }

    #[test]
    fn pressure_coupling_stencil_properties_2d(hx in 0.05..2.0f64, hy in 0.05..2.0f64) {
        let h = [hx, hy];
        let stencil = pressure_coupling_stencil(&h);
        prop_assert_eq!(stencil.num_pressure_basis(), 4);
        prop_assert_eq!(stencil.num_velocity_basis(), 9);

        // Fine basis functions sum to one, so their derivatives sum to zero
        for p in 0..4 {
            for d in 0..2 {
                let sum: f64 = (0..9).map(|v| stencil.get(p, v, d)).sum();
                prop_assert!(sum.abs() <= 1e-12);
            }
        }

        // Coarse basis functions sum to one: sum_p S[p][v][d] = -int d_d phi_v
        let coarse_volume = 4.0 * hx * hy;
        for v in 0..9 {
            let offset = [v % 3, v / 3];
            for d in 0..2 {
                let sum: f64 = (0..4).map(|p| stencil.get(p, v, d)).sum();
                // The integral of d_d phi_v is the integral over the face of the fine support
                // with outward normal in direction d, which vanishes in the interior
                let other = 1 - d;
                let face_length = if offset[other] == 1 { 2.0 } else { 1.0 } * h[other];
                let expected = match offset[d] {
                    0 => face_length / 2.0,
                    2 => -face_length / 2.0,
                    _ => 0.0,
                };
                prop_assert!((sum - expected).abs() <= 1e-12 * (1.0 + coarse_volume));
            }
        }
    }

    #[test]
    fn pressure_coupling_stencil_divergence_of_linear_field(hx in 0.05..2.0f64, hy in 0.05..2.0f64) {
        // u = (x, 0) has unit divergence, so S u = -int psi_p = -|K| / 4
        let stencil = pressure_coupling_stencil(&[hx, hy]);
        let mut u = DVector::zeros(18);
        for v in 0..9 {
            u[2 * v] = (v % 3) as f64 * hx;
        }
        let divergence = stencil.as_matrix() * u;
        let expected = -(2.0 * hx) * (2.0 * hy) / 4.0;
        for p in 0..4 {
            prop_assert!((divergence[p] - expected).abs() <= 1e-12 * (1.0 + expected.abs()));
        }
    }
}
