use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used throughout `stokes-grid`.
///
/// A trait alias for `RealField + Copy`, so that generic numerical routines can pass scalars
/// around by value.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Converts an `f64` constant into the scalar type.
///
/// # Panics
///
/// Panics if the value cannot be represented by `T`, which never happens for the built-in
/// floating point types.
pub fn real<T: Real>(value: f64) -> T {
    T::from_f64(value).expect("Constant must be representable by the scalar type")
}

/// Converts a count or index into the scalar type.
///
/// # Panics
///
/// Panics if the value cannot be represented by `T`.
pub fn real_from_usize<T: Real>(value: usize) -> T {
    T::from_usize(value).expect("Integer must be representable by the scalar type")
}
