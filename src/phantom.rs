//! Synthetic multi-coil acquisitions.
//!
//! A disk-shaped object seen by `nc` receive coils placed around it,
//! each with a smooth complex sensitivity profile. Used by the tests,
//! the benchmarks and for trying out the command-line tool without a
//! scanner file.

use std::f32::consts::PI;

use ndarray::prelude::*;
use num_complex::Complex32;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    containers::{AcquisitionsContainer, AcquisitionsVector},
    data::{Acquisition, AcquisitionFlag},
    error::MrResult,
    fft::fft2c,
    header::{AcquisitionsInfo, Encoding},
    storage::Storage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phantom {
    /// Samples per readout, at least `nx`.
    pub readout : usize,
    /// Reconstructed field of view.
    pub nx : usize,
    pub ny : usize,
    pub nc : usize,
    pub slices : usize,
}

impl Phantom {
    /// A phantom without readout oversampling.
    pub fn new(nx : usize, ny : usize, nc : usize, slices : usize) -> Self {
        Phantom { readout : nx, nx, ny, nc, slices }
    }

    /// Samples `readout` points per line instead of `nx`.
    pub fn with_readout(mut self, readout : usize) -> Self {
        self.readout = readout.max(self.nx);
        self
    }

    pub fn encoding(&self) -> Encoding {
        let mut encoding = Encoding::new(self.nx as u16, self.ny as u16);
        encoding.encoded_space.matrix_size.x = self.readout as u16;
        encoding
    }

    pub fn info(&self) -> MrResult<AcquisitionsInfo> {
        AcquisitionsInfo::from_encoding(self.encoding())
    }

    /// Object intensity, `[y, x]` over the full readout.
    pub fn object(&self, slice : usize) -> Array2<f32> {
        let (cy, cx) = (self.ny as f32 / 2.0, self.readout as f32 / 2.0);
        let radius = self.nx.min(self.ny) as f32 / 3.0;
        let level = 1.0 + 0.1 * slice as f32;
        Array2::from_shape_fn((self.ny, self.readout), |(y, x)| {
            let (dy, dx) = (y as f32 - cy, x as f32 - cx);
            if (dy * dy + dx * dx).sqrt() <= radius { level } else { 0.0 }
        })
    }

    /// The true coil sensitivities, `[channel, y, x]` over the full
    /// readout.
    pub fn sensitivities(&self) -> Array3<Complex32> {
        let (hy, hx) = (self.ny as f32 / 2.0, self.readout as f32 / 2.0);
        Array3::from_shape_fn((self.nc, self.ny, self.readout), |(c, y, x)| {
            let theta = 2.0 * PI * c as f32 / self.nc as f32;
            let (dy, dx) = ((y as f32 - hy) / hy, (x as f32 - hx) / hx);
            let (py, px) = (0.7 * theta.sin(), 0.7 * theta.cos());
            let magnitude = (-((dy - py).powi(2) + (dx - px).powi(2))).exp();
            Complex32::from_polar(magnitude, theta + 0.5 * dx)
        })
    }

    /// Object times sensitivity for every channel of one slice.
    pub fn coil_images(&self, slice : usize) -> Array3<Complex32> {
        let object = self.object(slice);
        let mut images = self.sensitivities();
        for mut channel in images.outer_iter_mut() {
            channel.zip_mut_with(&object, |v, &o| *v *= o);
        }
        images
    }

    /// Every readout of every slice, in acquisition order.
    pub fn acquisitions(&self) -> Vec<Acquisition> {
        let mut acqs = Vec::with_capacity(self.slices * self.ny);
        for slice in 0..self.slices {
            let mut kspace = self.coil_images(slice);
            fft2c(&mut kspace);
            for y in 0..self.ny {
                let mut acq = Acquisition::zeros(self.readout as u16, self.nc as u16);
                acq.data_mut().assign(&kspace.slice(s![.., y, ..]));
                acq.head_mut().scan_counter = (slice * self.ny + y) as u32;
                acq.idx_mut().slice = slice as u16;
                acq.idx_mut().kspace_encode_step_1 = y as u16;
                if y == 0 {
                    acq.set_flag(AcquisitionFlag::FirstInSlice);
                }
                if y + 1 == self.ny {
                    acq.set_flag(AcquisitionFlag::LastInSlice);
                }
                acqs.push(acq);
            }
        }
        acqs
    }

    /// The readouts in a reproducible random order.
    pub fn shuffled_acquisitions(&self, seed : u64) -> Vec<Acquisition> {
        let mut acqs = self.acquisitions();
        acqs.shuffle(&mut StdRng::seed_from_u64(seed));
        acqs
    }

    /// An in-memory container in acquisition order, marked ordered.
    pub fn vector(&self) -> MrResult<AcquisitionsVector> {
        let mut acqs = AcquisitionsVector::from_acquisitions(self.info()?, self.acquisitions());
        acqs.set_ordered(true);
        Ok(acqs)
    }

    /// Writes the header and every readout to `storage`.
    pub fn write(&self, storage : &dyn Storage) -> MrResult<()> {
        storage.write_header(self.info()?.as_str())?;
        self.acquisitions().iter().try_for_each(|acq| storage.append_acquisition(acq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readouts_carry_flags_and_counters() {
        let phantom = Phantom::new(16, 8, 4, 2).with_readout(32);
        let acqs = phantom.acquisitions();
        assert_eq!(acqs.len(), 16);
        assert_eq!(acqs[0].shape(), (32, 4));
        assert!(acqs[8].is_flag_set(AcquisitionFlag::FirstInSlice));
        assert!(acqs[15].is_flag_set(AcquisitionFlag::LastInSlice));
        assert_eq!(acqs[9].idx().slice, 1);
        assert_eq!(acqs[9].idx().kspace_encode_step_1, 1);
        assert_eq!(phantom.encoding().encoded_space.matrix_size.x, 32);
        assert_eq!(phantom.encoding().recon_space.matrix_size.x, 16);
    }

    #[test]
    fn shuffle_is_a_reproducible_permutation() {
        let phantom = Phantom::new(8, 8, 2, 2);
        let a = phantom.shuffled_acquisitions(7);
        let b = phantom.shuffled_acquisitions(7);
        assert_eq!(a, b);
        let mut counters : Vec<u32> = a.iter().map(|acq| acq.head().scan_counter).collect();
        counters.sort();
        assert_eq!(counters, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn object_sits_in_the_centre() {
        let object = Phantom::new(16, 16, 1, 1).object(0);
        assert_eq!(object[[8, 8]], 1.0);
        assert_eq!(object[[0, 0]], 0.0);
    }
}
