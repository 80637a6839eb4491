//! Centered, orthonormal 2D Fourier transforms over the two trailing
//! axes of a `[channel, y, x]` array.
//!
//! "Centered" means the zero frequency sits at index `n / 2` on both
//! sides of the transform, so each axis is `fftshift(F(ifftshift(v)))`.
//! Both directions are scaled by `1 / sqrt(ny * nx)`, which keeps norms
//! unchanged.

use std::sync::Arc;

use ndarray::prelude::*;
use num_complex::Complex32;
use rustfft::{Fft, FftDirection, FftPlanner};

fn transform_axis(
    data : &mut Array3<Complex32>,
    axis : usize,
    fft : &Arc<dyn Fft<f32>>,
    scale : f32,
) {
    let n = data.len_of(Axis(axis));
    if n == 0 {
        return;
    }
    let mut buffer = vec![Complex32::new(0.0, 0.0); n];
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    for mut lane in data.lanes_mut(Axis(axis)) {
        buffer.iter_mut().zip(lane.iter()).for_each(|(b, v)| *b = *v);
        buffer.rotate_left(n / 2);
        fft.process_with_scratch(&mut buffer, &mut scratch);
        buffer.rotate_right(n / 2);
        lane.iter_mut().zip(buffer.iter()).for_each(|(v, b)| *v = b * scale);
    }
}

fn fft2c_in_place(data : &mut Array3<Complex32>, direction : FftDirection) {
    let (_, ny, nx) = data.dim();
    if ny == 0 || nx == 0 {
        return;
    }
    let mut planner = FftPlanner::<f32>::new();
    let along_y = planner.plan_fft(ny, direction);
    let along_x = planner.plan_fft(nx, direction);
    transform_axis(data, 2, &along_x, 1.0 / (nx as f32).sqrt());
    transform_axis(data, 1, &along_y, 1.0 / (ny as f32).sqrt());
}

/// Centered inverse 2D transform of every channel: k-space to image.
pub fn ifft2c(data : &mut Array3<Complex32>) {
    fft2c_in_place(data, FftDirection::Inverse)
}

/// Centered forward 2D transform of every channel: image to k-space.
pub fn fft2c(data : &mut Array3<Complex32>) {
    fft2c_in_place(data, FftDirection::Forward)
}
