//! Pixel-level steps of sensitivity estimation: the noise threshold,
//! the object mask and its cleanup, and masked smoothing.
//!
//! All 2D arrays here are `[y, x]`; coil arrays are `[channel, y, x]`.

use ndarray::prelude::*;
use num_complex::Complex32;

/// Side of the corner patch assumed to hold only noise.
pub const NOISE_PATCH : usize = 5;

/// Fraction of the image maximum added to the noise level, so that an
/// all-zero corner still yields a positive threshold.
pub const NOISE_FLOOR : f32 = 1e-6;

/// Region sizes removed by the successive cleanup passes.
pub const CLEANUP_SIZES : [usize; 3] = [2, 3, 4];

fn max_abs<'a, I : IntoIterator<Item = &'a f32>>(values : I) -> f32 {
    values.into_iter().fold(0.0f32, |r, v| r.max(v.abs()))
}

/// Largest magnitude in the `NOISE_PATCH` x `NOISE_PATCH` corner at the
/// origin, plus `NOISE_FLOOR` times the largest magnitude overall.
pub fn noise_threshold(magnitude : &ArrayView2<f32>) -> f32 {
    let (ny, nx) = magnitude.dim();
    let corner = magnitude.slice(s![..NOISE_PATCH.min(ny), ..NOISE_PATCH.min(nx)]);
    max_abs(corner.iter()) + NOISE_FLOOR * max_abs(magnitude.iter())
}

/// True where the magnitude exceeds `noise`.
pub fn object_mask(magnitude : &ArrayView2<f32>, noise : f32) -> Array2<bool> {
    magnitude.mapv(|v| v.abs() > noise)
}

/// Removes small isolated regions from `mask`.
///
/// Each foreground pixel seeds a search list. While the list is shorter
/// than `min_size`, the next listed pixel is expanded: every foreground
/// pixel within a square window of half-width `list length + extra`
/// joins the list. If the list is exhausted before reaching `min_size`,
/// the seed pixel is cleared. The window grows with the list, so a
/// pixel that belongs to a large object always finds enough company.
///
/// Pixels are visited in row-major order and cleared in place, so
/// later seeds see earlier removals.
pub fn cleanup_mask(mask : &mut Array2<bool>, min_size : usize, extra : usize) {
    let (ny, nx) = mask.dim();
    let mut listed = Array2::from_elem((ny, nx), false);
    let mut list : Vec<(usize, usize)> = Vec::with_capacity(min_size.max(1) * 4);

    for iy in 0..ny {
        for ix in 0..nx {
            if !mask[[iy, ix]] {
                continue;
            }
            list.clear();
            list.push((iy, ix));
            listed[[iy, ix]] = true;
            let mut il = 0;
            while il < list.len() && list.len() < min_size {
                let (ly, lx) = list[il];
                let l = list.len() + extra;
                for ky in ly.saturating_sub(l)..=(ly + l).min(ny - 1) {
                    for kx in lx.saturating_sub(l)..=(lx + l).min(nx - 1) {
                        if listed[[ky, kx]] || !mask[[ky, kx]] {
                            continue;
                        }
                        list.push((ky, kx));
                        listed[[ky, kx]] = true;
                    }
                }
                il += 1;
            }
            if il == list.len() {
                mask[[iy, ix]] = false;
            }
            list.iter().for_each(|&p| listed[p] = false);
        }
    }
}

/// The full cleanup sequence: one [`cleanup_mask`] pass for each of
/// [`CLEANUP_SIZES`].
pub fn clean_object_mask(mask : &mut Array2<bool>) {
    CLEANUP_SIZES.iter().for_each(|&size| cleanup_mask(mask, size, 0));
}

/// One smoothing pass over every channel of `data`.
///
/// Each pixel inside `mask` becomes the mean of itself and those of its
/// 8 neighbours that are also inside `mask`; pixels outside the mask
/// are left alone. All new values are computed from the old ones.
pub fn smoothen(data : &mut Array3<Complex32>, mask : &ArrayView2<bool>) {
    let (_, ny, nx) = data.dim();
    let old = data.clone();
    for ((c, y, x), v) in data.indexed_iter_mut() {
        if !mask[[y, x]] {
            continue;
        }
        let mut sum = old[[c, y, x]];
        let mut n = 1usize;
        for ky in y.saturating_sub(1)..=(y + 1).min(ny - 1) {
            for kx in x.saturating_sub(1)..=(x + 1).min(nx - 1) {
                if (ky, kx) == (y, x) || !mask[[ky, kx]] {
                    continue;
                }
                sum += old[[c, ky, kx]];
                n += 1;
            }
        }
        *v = sum / n as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(n : usize, radius : f32) -> Array2<bool> {
        let center = (n / 2) as f32;
        Array2::from_shape_fn((n, n), |(y, x)| {
            let (dy, dx) = (y as f32 - center, x as f32 - center);
            (dy * dy + dx * dx).sqrt() <= radius
        })
    }

    #[test]
    fn isolated_pixel_goes_in_first_pass() {
        let mut mask = Array2::from_elem((9, 9), false);
        mask[[4, 4]] = true;
        cleanup_mask(&mut mask, 2, 0);
        assert!(mask.iter().all(|&m| !m));
    }

    #[test]
    fn pair_survives_first_pass_only() {
        let mut mask = Array2::from_elem((9, 9), false);
        mask[[4, 4]] = true;
        mask[[4, 5]] = true;
        cleanup_mask(&mut mask, 2, 0);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 2);
        cleanup_mask(&mut mask, 3, 0);
        assert!(mask.iter().all(|&m| !m));
    }

    #[test]
    fn disk_interior_survives_all_passes() {
        let original = disk(21, 5.0);
        let mut mask = original.clone();
        mask[[0, 20]] = true;
        clean_object_mask(&mut mask);
        assert!(!mask[[0, 20]]);
        assert_eq!(mask, original);
    }

    #[test]
    fn threshold_uses_corner_and_floor() {
        let mut mag = Array2::<f32>::zeros((10, 10));
        mag[[2, 3]] = 0.5;
        mag[[7, 7]] = 100.0;
        mag[[0, 8]] = 50.0;
        let noise = noise_threshold(&mag.view());
        assert!((noise - (0.5 + 1e-4)).abs() < 1e-6);

        let zero_corner = Array2::from_shape_fn((8, 8), |(y, x)| if y > 5 && x > 5 { 2.0 } else { 0.0 });
        let noise = noise_threshold(&zero_corner.view());
        assert!(noise > 0.0);
        let mask = object_mask(&zero_corner.view(), noise);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 4);
    }

    #[test]
    fn smoothing_averages_masked_neighbours_only() {
        let mut data = Array3::<Complex32>::zeros((1, 3, 3));
        data[[0, 1, 1]] = Complex32::new(3.0, 0.0);
        data[[0, 0, 0]] = Complex32::new(9.0, 9.0);
        let mut mask = Array2::from_elem((3, 3), false);
        mask[[1, 1]] = true;
        mask[[1, 2]] = true;
        smoothen(&mut data, &mask.view());
        assert_eq!(data[[0, 1, 1]], Complex32::new(1.5, 0.0));
        assert_eq!(data[[0, 1, 2]], Complex32::new(1.5, 0.0));
        assert_eq!(data[[0, 0, 0]], Complex32::new(9.0, 9.0));
    }

    #[test]
    fn lone_masked_pixel_is_unchanged() {
        let mut data = Array3::from_elem((2, 3, 3), Complex32::new(1.0, 0.0));
        data[[1, 1, 1]] = Complex32::new(4.0, -2.0);
        let mut mask = Array2::from_elem((3, 3), false);
        mask[[1, 1]] = true;
        smoothen(&mut data, &mask.view());
        assert_eq!(data[[1, 1, 1]], Complex32::new(4.0, -2.0));
    }
}
