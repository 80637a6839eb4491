//! Per-slice multi-channel complex arrays: the coil images produced
//! from k-space and the sensitivity maps estimated from them share
//! this one layout.

use ndarray::prelude::*;
use num_complex::Complex32;

use crate::error::{MrError, MrResult};

/// A `[channel, y, x]` complex array for one slice.
#[derive(Debug, Clone, PartialEq)]
pub struct CoilData {
    data : Array3<Complex32>,
}

impl CoilData {
    pub fn zeros(nx : usize, ny : usize, nc : usize) -> Self {
        CoilData { data : Array3::zeros((nc, ny, nx)) }
    }

    /// Wraps a `[channel, y, x]` array.
    pub fn from_array(data : Array3<Complex32>) -> Self {
        CoilData { data }
    }

    /// Builds coil data from values laid out x fastest, then y, then
    /// channel.
    pub fn from_vec(nx : usize, ny : usize, nc : usize, values : Vec<Complex32>) -> MrResult<Self> {
        if values.len() != nx * ny * nc {
            return Err(MrError::mismatch(nx * ny * nc, values.len()));
        }
        let data = Array3::from_shape_vec((nc, ny, nx), values)
            .map_err(|err| MrError::Format(err.to_string()))?;
        Ok(CoilData { data })
    }

    pub fn nx(&self) -> usize {
        self.data.dim().2
    }

    pub fn ny(&self) -> usize {
        self.data.dim().1
    }

    pub fn nc(&self) -> usize {
        self.data.dim().0
    }

    /// `[nx, ny, nz, nc]`, with a single z plane.
    pub fn dimensions(&self) -> [usize; 4] {
        [self.nx(), self.ny(), 1, self.nc()]
    }

    pub fn array(&self) -> ArrayView3<Complex32> {
        self.data.view()
    }

    pub fn array_mut(&mut self) -> ArrayViewMut3<Complex32> {
        self.data.view_mut()
    }

    pub fn into_array(self) -> Array3<Complex32> {
        self.data
    }

    /// Values x fastest, then y, then channel.
    pub fn to_vec(&self) -> Vec<Complex32> {
        self.data.iter().copied().collect()
    }

    /// Element-wise magnitude, same layout as [`CoilData::to_vec`].
    pub fn abs(&self) -> Vec<f32> {
        self.data.iter().map(|z| z.norm()).collect()
    }

    /// Root-sum-of-squares combination over channels, `[y, x]`.
    pub fn magnitude(&self) -> Array2<f32> {
        self.data
            .map(|z| z.norm_sqr())
            .sum_axis(Axis(0))
            .mapv(f32::sqrt)
    }
}
