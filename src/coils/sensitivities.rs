use ndarray::prelude::*;
use num_complex::Complex32;
use rayon::prelude::*;

use super::{
    coil_images::CoilImages,
    mask::{clean_object_mask, noise_threshold, object_mask, smoothen},
};
use crate::{
    containers::AcquisitionsContainer,
    data::{CoilData, Image, ImageData},
    error::{MrError, MrResult},
    storage::Storage,
    utils::report,
};

/// Image tag under which sensitivity maps are stored.
pub const CSM_TAG : &str = "csm";

/// Estimates the sensitivity maps of one slice.
///
/// ## Arguments
///
/// * `coil_image` - `[channel, y, readout]` aliased coil image
///
/// * `nx` - Width of the reconstructed field of view. The readout is
/// cropped to its centre `nx` samples.
///
/// * `smoothness` - Number of smoothing passes
///
/// ## Returns
///
/// `[channel, y, nx]` weights whose squared magnitudes sum to one over
/// the channels at every pixel with signal, and are zero elsewhere.
pub fn estimate_csm(coil_image : &CoilData, nx : usize, smoothness : u32) -> MrResult<CoilData> {
    let readout = coil_image.nx();
    if nx > readout || nx == 0 {
        return Err(MrError::mismatch(
            format!("field of view width between 1 and {}", readout),
            nx,
        ));
    }
    let x0 = (readout - nx) / 2;
    let mut maps = coil_image.array().slice(s![.., .., x0..x0 + nx]).to_owned();

    let magnitude = CoilData::from_array(maps.clone()).magnitude();
    let noise = noise_threshold(&magnitude.view());
    let mut mask = object_mask(&magnitude.view(), noise);
    clean_object_mask(&mut mask);

    for _ in 0..smoothness {
        smoothen(&mut maps, &mask.view());
    }

    let mut maps = CoilData::from_array(maps);
    let magnitude = maps.magnitude();
    for mut channel in maps.array_mut().outer_iter_mut() {
        channel.zip_mut_with(&magnitude, |v, &r| {
            *v = if r != 0.0 { *v * (1.0 / r) } else { Complex32::new(0.0, 0.0) };
        });
    }
    Ok(maps)
}

/// Coil sensitivity maps, one [`CoilData`] of shape `[channel, y, x]`
/// per slice.
#[derive(Debug, Clone, Default)]
pub struct CoilSensitivities {
    smoothness : u32,
    maps : Vec<CoilData>,
    verbose : bool,
}

impl CoilSensitivities {
    pub fn new(smoothness : u32) -> Self {
        CoilSensitivities { smoothness, ..Default::default() }
    }

    pub fn with_verbose(mut self, verbose : bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn smoothness(&self) -> u32 {
        self.smoothness
    }

    pub fn set_smoothness(&mut self, smoothness : u32) {
        self.smoothness = smoothness;
    }

    /// Reads every map stored under the `csm` tag.
    pub fn from_storage(storage : &dyn Storage) -> MrResult<Self> {
        let mut csms = CoilSensitivities::new(0);
        for i in 0..storage.image_count(CSM_TAG)? {
            let image = storage.read_image(CSM_TAG, i)?;
            csms.maps.push(coil_data_from_image(&image)?);
        }
        Ok(csms)
    }

    /// Appends every map to `storage` under the `csm` tag.
    pub fn write(&self, storage : &dyn Storage) -> MrResult<()> {
        self.maps.iter().try_for_each(|map| storage.write_image(CSM_TAG, &image_from_coil_data(map)?))
    }

    /// Estimates one map per coil image, replacing anything computed
    /// before. Slices are processed in parallel.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let mut cis = CoilImages::new();
    /// cis.compute(&acqs)?;
    /// let mut csms = CoilSensitivities::new(config.csm_smoothness);
    /// csms.compute(&cis)?;
    /// ```
    pub fn compute(&mut self, coil_images : &CoilImages) -> MrResult<()> {
        let nx = coil_images.encoding()?.recon_space.matrix_size.x as usize;
        let smoothness = self.smoothness;
        report!(
            self.verbose, "coil sensitivities",
            "estimating {} maps, smoothness {}", coil_images.items(), smoothness
        );
        self.maps = coil_images.images()
            .par_iter()
            .map(|ci| estimate_csm(ci, nx, smoothness))
            .collect::<MrResult<Vec<_>>>()?;
        Ok(())
    }

    /// Coil images then maps, in one call.
    pub fn compute_from_acquisitions<A : AcquisitionsContainer + ?Sized>(
        &mut self,
        acqs : &A,
    ) -> MrResult<()> {
        let mut coil_images = CoilImages::new().with_verbose(self.verbose);
        coil_images.compute(acqs)?;
        self.compute(&coil_images)
    }

    /// Appends a map computed elsewhere, laid out x fastest, then y,
    /// then channel.
    pub fn append_csm(&mut self, nx : usize, ny : usize, nc : usize, data : &[Complex32]) -> MrResult<()> {
        self.maps.push(CoilData::from_vec(nx, ny, nc, data.to_vec())?);
        Ok(())
    }

    pub fn items(&self) -> usize {
        self.maps.len()
    }

    pub fn maps(&self) -> &[CoilData] {
        &self.maps
    }

    pub fn data(&self, num : usize) -> MrResult<&CoilData> {
        self.maps.get(num).ok_or_else(|| MrError::NotFound(
            format!("coil sensitivity map {} of {}", num, self.maps.len())
        ))
    }

    /// `[nx, ny, 1, nc]` of map `num`.
    pub fn dimensions(&self, num : usize) -> MrResult<[usize; 4]> {
        Ok(self.data(num)?.dimensions())
    }

    pub fn data_abs(&self, num : usize) -> MrResult<Vec<f32>> {
        Ok(self.data(num)?.abs())
    }
}

/// Stored maps are complex images of shape `[channel, z = 1, y, x]`.
fn image_from_coil_data(map : &CoilData) -> MrResult<Image> {
    let shape = IxDyn(&[map.nc(), 1, map.ny(), map.nx()]);
    let data = ArrayD::from_shape_vec(shape, map.to_vec())
        .map_err(|err| MrError::Format(err.to_string()))?;
    Ok(Image::new(ImageData::Complex32(data)))
}

fn coil_data_from_image(image : &Image) -> MrResult<CoilData> {
    let (nc, ny, nx) = match *image.shape() {
        [nc, 1, ny, nx] | [nc, ny, nx] => (nc, ny, nx),
        _ => return Err(MrError::Format(format!(
            "coil sensitivity image of shape {:?}", image.shape()
        ))),
    };
    CoilData::from_vec(nx, ny, nc, image.to_complex_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_of_squares(map : &CoilData) -> Array2<f32> {
        map.array().map(|z| z.norm_sqr()).sum_axis(Axis(0))
    }

    /// Two channels with different smooth profiles over a square
    /// object, and exact zeros elsewhere.
    fn square_object(readout : usize, ny : usize) -> CoilData {
        let data = Array3::from_shape_fn((2, ny, readout), |(c, y, x)| {
            let inside = (6..ny - 6).contains(&y) && (readout / 2 - 5..readout / 2 + 5).contains(&x);
            if !inside {
                return Complex32::new(0.0, 0.0);
            }
            match c {
                0 => Complex32::new(1.0 + 0.1 * x as f32, 0.0),
                _ => Complex32::new(0.0, 2.0 - 0.05 * y as f32),
            }
        });
        CoilData::from_array(data)
    }

    #[test]
    fn unit_norm_where_there_is_signal() {
        let ci = square_object(24, 20);
        for smoothness in [0, 1, 4] {
            let map = estimate_csm(&ci, 16, smoothness).unwrap();
            assert_eq!(map.dimensions(), [16, 20, 1, 2]);
            let cropped = ci.array().slice(s![.., .., 4..20]).to_owned();
            let signal = CoilData::from_array(cropped).magnitude();
            let ss = sum_of_squares(&map);
            ss.indexed_iter().for_each(|(ix, &v)| {
                if signal[ix] > 0.0 {
                    assert!((v - 1.0).abs() < 1e-5, "pixel {:?}: {}", ix, v);
                } else {
                    assert_eq!(v, 0.0);
                }
            });
        }
    }

    #[test]
    fn zero_smoothness_is_plain_normalisation() {
        let ci = square_object(16, 20);
        let map = estimate_csm(&ci, 16, 0).unwrap();
        let magnitude = ci.magnitude();
        map.array().indexed_iter().for_each(|((c, y, x), z)| {
            let r = magnitude[[y, x]];
            let expected = if r != 0.0 { ci.array()[[c, y, x]] * (1.0 / r) } else { Complex32::new(0.0, 0.0) };
            assert_eq!(*z, expected);
        });
    }

    #[test]
    fn field_of_view_wider_than_readout_is_rejected() {
        let ci = CoilData::zeros(8, 8, 1);
        assert!(matches!(estimate_csm(&ci, 9, 0), Err(MrError::DimensionMismatch { .. })));
    }

    #[test]
    fn append_and_query() {
        let mut csms = CoilSensitivities::new(2);
        let data : Vec<_> = (0..12).map(|i| Complex32::new(i as f32, 0.0)).collect();
        csms.append_csm(3, 2, 2, &data).unwrap();
        assert_eq!(csms.items(), 1);
        assert_eq!(csms.dimensions(0).unwrap(), [3, 2, 1, 2]);
        assert_eq!(csms.data(0).unwrap().to_vec(), data);
        assert_eq!(csms.data_abs(0).unwrap()[5], 5.0);
        assert!(csms.append_csm(3, 3, 2, &data).is_err());
        assert!(matches!(csms.data(1), Err(MrError::NotFound(_))));
    }

    #[test]
    fn stored_image_layout() {
        let map = CoilData::from_vec(3, 2, 2, (0..12).map(|i| Complex32::new(0.0, i as f32)).collect()).unwrap();
        let image = image_from_coil_data(&map).unwrap();
        assert_eq!(image.shape(), &[2, 1, 2, 3]);
        assert_eq!(coil_data_from_image(&image).unwrap(), map);
        let flat = Image::new(ImageData::zeros(crate::data::ImageKind::Complex32, &[4]));
        assert!(matches!(coil_data_from_image(&flat), Err(MrError::Format(_))));
    }
}
