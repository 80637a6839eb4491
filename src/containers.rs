//! Collections of acquisitions or images that behave as vectors.
//!
//! Iterative solvers only ever see the [`DataContainer`] contract, so
//! file-backed acquisitions, in-memory acquisitions and images can be
//! swapped for one another without the solver knowing.

pub mod acquisitions;
pub mod images;

pub use acquisitions::{
    Acquisitions,
    AcquisitionsContainer,
    AcquisitionsFile,
    AcquisitionsVector,
    StorageScheme,
};
pub use images::ImagesVector;

use num_complex::Complex32;

use crate::error::MrResult;

/// The vector-space contract every container satisfies.
///
/// Elements flagged as "to be ignored" are skipped by every operation,
/// and pairing between two containers is by logical position among the
/// elements that are not skipped.
pub trait DataContainer : Sized {
    /// Number of elements, skipped ones included.
    fn items(&self) -> MrResult<usize>;

    /// Square root of the sum of every element's squared norm.
    fn norm(&self) -> MrResult<f32>;

    /// `sum(conj(other_j) * self_i)` over paired elements. Pairing stops
    /// at the shorter of the two containers.
    ///
    /// ## Errors
    ///
    /// * `MrError::DimensionMismatch` - if two paired elements have
    /// different shapes
    fn dot(&self, other : &Self) -> MrResult<Complex32>;

    /// Appends `a * x_i + b * y_i` for every pair of elements of `x`
    /// and `y` to `self`. With `b` equal to zero only `x` is read, so
    /// `y` may be anything.
    fn axpby(&mut self, a : Complex32, x : &Self, b : Complex32, y : &Self) -> MrResult<()>;

    /// An empty container of the same kind, ready to receive
    /// [`DataContainer::axpby`] results.
    fn new_like(&self) -> MrResult<Self>;

    /// `a * x + b * y` as a new container of the same kind as `x`.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let one = Complex32::new(1.0, 0.0);
    /// let residual = Acquisitions::linear_combination(one, &measured, -one, &simulated)?;
    /// println!("residual norm {}", residual.norm()?);
    /// ```
    fn linear_combination(a : Complex32, x : &Self, b : Complex32, y : &Self) -> MrResult<Self> {
        let mut out = x.new_like()?;
        out.axpby(a, x, b, y)?;
        Ok(out)
    }
}
