use ndarray::prelude::*;
use num_complex::Complex32;
use rayon::prelude::*;

use crate::{
    containers::AcquisitionsContainer,
    data::{Acquisition, AcquisitionFlag, CoilData},
    error::{MrError, MrResult},
    fft::ifft2c,
    header::Encoding,
    utils::report,
};

/// Whether a readout belongs in the coil-image grid. Under parallel
/// imaging only calibration readouts do.
fn fills_grid(acq : &Acquisition, parallel : bool) -> bool {
    !acq.is_flag_set(AcquisitionFlag::IsNoiseMeasurement)
        && (!parallel
            || acq.is_flag_set(AcquisitionFlag::IsParallelCalibration)
            || acq.is_flag_set(AcquisitionFlag::IsParallelCalibrationAndImaging))
}

/// Per-slice aliased coil images, one [`CoilData`] of shape
/// `[channel, line, readout sample]` per slice.
#[derive(Debug, Clone, Default)]
pub struct CoilImages {
    encoding : Option<Encoding>,
    images : Vec<CoilData>,
    verbose : bool,
}

impl CoilImages {
    pub fn new() -> Self {
        CoilImages::default()
    }

    pub fn with_verbose(mut self, verbose : bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builds one coil image per slice of `acqs` (in logical order,
    /// so the container should be ordered first), replacing anything
    /// computed before.
    ///
    /// Each slice opens at a first-in-slice readout and closes at a
    /// last-in-slice readout or the end of the data. Its readouts are
    /// written into a zero-filled `[channel, ny, samples]` k-space grid
    /// at the row given by their phase-encode step, `ny` being the
    /// reconstructed matrix height from the header. The grid is then
    /// inverse transformed with [`ifft2c`]. Slices are transformed in
    /// parallel.
    ///
    /// ## Errors
    ///
    /// * `MrError::Header` / `MrError::NotFound` - the header does not
    /// describe an encoding
    /// * `MrError::DimensionMismatch` - a readout's phase-encode step lies
    /// outside the grid, or its shape differs from the first readout
    /// that opened a slice, which fixes the grid of every slice
    pub fn compute<A : AcquisitionsContainer + ?Sized>(&mut self, acqs : &A) -> MrResult<()> {
        let encoding = acqs.acquisitions_info().encoding()?;
        let parallel = encoding.parallel();
        let ny = encoding.recon_space.matrix_size.y as usize;
        let na = acqs.number()?;

        let mut grids : Vec<Array3<Complex32>> = Vec::new();
        let mut shape : Option<(usize, usize)> = None;
        let mut grid : Option<Array3<Complex32>> = None;

        for a in 0..na {
            let acq = acqs.get_acquisition(a)?;
            if grid.is_none() {
                if !acq.is_flag_set(AcquisitionFlag::FirstInSlice) {
                    continue;
                }
                let (ns, nc) = *shape.get_or_insert(acq.shape());
                grid = Some(Array3::zeros((nc, ny, ns)));
            }
            let last = acq.is_flag_set(AcquisitionFlag::LastInSlice);
            if let (Some(k), Some((ns, nc))) = (grid.as_mut(), shape) {
                if fills_grid(&acq, parallel) {
                    if acq.shape() != (ns, nc) {
                        return Err(MrError::mismatch(
                            format!("{:?} (samples, channels)", (ns, nc)),
                            format!("{:?} at acquisition {}", acq.shape(), a),
                        ));
                    }
                    let y = acq.idx().kspace_encode_step_1 as usize;
                    if y >= ny {
                        return Err(MrError::mismatch(
                            format!("phase-encode step below {}", ny),
                            format!("{} at acquisition {}", y, a),
                        ));
                    }
                    k.slice_mut(s![.., y, ..]).assign(&acq.data());
                }
            }
            if last {
                grids.extend(grid.take());
            }
        }
        grids.extend(grid.take());

        report!(self.verbose, "coil images", "transforming {} slices", grids.len());
        self.images = grids.into_par_iter()
            .map(|mut k| {
                ifft2c(&mut k);
                CoilData::from_array(k)
            })
            .collect();
        self.encoding = Some(encoding);
        Ok(())
    }

    /// The encoding read by the last [`CoilImages::compute`].
    pub fn encoding(&self) -> MrResult<&Encoding> {
        self.encoding.as_ref()
            .ok_or_else(|| MrError::NotFound("encoding of uncomputed coil images".to_string()))
    }

    pub fn items(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[CoilData] {
        &self.images
    }

    pub fn data(&self, num : usize) -> MrResult<&CoilData> {
        self.images.get(num).ok_or_else(|| MrError::NotFound(
            format!("coil image {} of {}", num, self.images.len())
        ))
    }

    /// `[readout, ny, 1, nc]` of image `num`.
    pub fn dimensions(&self, num : usize) -> MrResult<[usize; 4]> {
        Ok(self.data(num)?.dimensions())
    }

    pub fn data_abs(&self, num : usize) -> MrResult<Vec<f32>> {
        Ok(self.data(num)?.abs())
    }
}
