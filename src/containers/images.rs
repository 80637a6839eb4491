//! `ImagesVector`
//!
//! A list of reconstructed images that satisfies the same
//! [`DataContainer`] contract as the acquisition containers. Images are
//! paired by position; none are ever skipped.

use num_complex::{Complex32, Complex64};

use crate::{
    containers::DataContainer,
    data::Image,
    error::{MrError, MrResult},
    storage::Storage,
};

fn widen(z : Complex32) -> Complex64 {
    Complex64::new(z.re as f64, z.im as f64)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagesVector {
    images : Vec<Image>,
}

impl ImagesVector {
    pub fn new() -> Self {
        ImagesVector::default()
    }

    pub fn from_images(images : Vec<Image>) -> Self {
        ImagesVector { images }
    }

    pub fn append(&mut self, image : Image) {
        self.images.push(image);
    }

    pub fn image(&self, num : usize) -> MrResult<&Image> {
        self.images.get(num).ok_or_else(|| MrError::NotFound(
            format!("image {} of {}", num, self.images.len())
        ))
    }

    pub fn image_mut(&mut self, num : usize) -> MrResult<&mut Image> {
        let n = self.images.len();
        self.images.get_mut(num).ok_or_else(|| MrError::NotFound(
            format!("image {} of {}", num, n)
        ))
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Shape of image `num`.
    pub fn dimensions(&self, num : usize) -> MrResult<Vec<usize>> {
        Ok(self.image(num)?.shape().to_vec())
    }

    /// The images whose attribute `attr` equals `target`, ignoring
    /// ASCII case. Images without the attribute never match a
    /// non-empty target.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let magnitudes = images.select("image_type", "MAGNITUDE");
    /// ```
    pub fn select(&self, attr : &str, target : &str) -> ImagesVector {
        self.images.iter()
            .filter(|img| img.attribute(attr).unwrap_or("").eq_ignore_ascii_case(target))
            .cloned()
            .collect()
    }

    /// Every `inc`-th image starting from image `off`.
    ///
    /// ## Errors
    ///
    /// * `MrError::Setup` - if `inc` is zero
    pub fn subset(&self, inc : usize, off : usize) -> MrResult<ImagesVector> {
        if inc == 0 {
            return Err(MrError::Setup("image subset step must be positive".to_string()));
        }
        Ok(self.images.iter().skip(off).step_by(inc).cloned().collect())
    }

    /// Reads every image stored under `tag`.
    pub fn read(storage : &dyn Storage, tag : &str) -> MrResult<Self> {
        (0..storage.image_count(tag)?)
            .map(|i| storage.read_image(tag, i))
            .collect::<MrResult<ImagesVector>>()
    }

    /// Appends every image to `storage` under `tag`. Nothing is written
    /// for an empty list.
    pub fn write(&self, storage : &dyn Storage, tag : &str) -> MrResult<()> {
        self.images.iter().try_for_each(|img| storage.write_image(tag, img))
    }

    /// All pixels as complex values, image after image.
    pub fn to_complex_vec(&self) -> Vec<Complex32> {
        self.images.iter().flat_map(|img| img.to_complex_vec()).collect()
    }

    /// All pixels as reals (magnitudes for complex images), image after
    /// image.
    pub fn to_real_vec(&self) -> Vec<f32> {
        self.images.iter().flat_map(|img| img.to_real_vec()).collect()
    }

    /// Overwrites all pixels, image after image, from `values`.
    ///
    /// ## Errors
    ///
    /// * `MrError::DimensionMismatch` - `values` does not hold exactly
    /// as many values as the images have pixels
    pub fn set_complex_data(&mut self, values : &[Complex32]) -> MrResult<()> {
        let total : usize = self.images.iter().map(Image::len).sum();
        if values.len() != total {
            return Err(MrError::mismatch(total, values.len()));
        }
        let mut offset = 0;
        for img in self.images.iter_mut() {
            let n = img.len();
            img.set_complex_data(&values[offset..offset + n])?;
            offset += n;
        }
        Ok(())
    }
}

impl FromIterator<Image> for ImagesVector {
    fn from_iter<I : IntoIterator<Item = Image>>(iter : I) -> Self {
        ImagesVector { images : iter.into_iter().collect() }
    }
}

impl DataContainer for ImagesVector {
    fn items(&self) -> MrResult<usize> {
        Ok(self.images.len())
    }

    fn norm(&self) -> MrResult<f32> {
        Ok(self.images.iter()
            .map(|img| img.norm().powi(2))
            .sum::<f64>()
            .sqrt() as f32)
    }

    fn dot(&self, other : &Self) -> MrResult<Complex32> {
        let mut z = Complex64::new(0.0, 0.0);
        for (u, v) in self.images.iter().zip(other.images.iter()) {
            z += u.dot(v)?;
        }
        Ok(Complex32::new(z.re as f32, z.im as f32))
    }

    fn axpby(&mut self, a : Complex32, x : &Self, b : Complex32, y : &Self) -> MrResult<()> {
        let (a, b) = (widen(a), widen(b));
        if b == Complex64::new(0.0, 0.0) {
            for u in x.images.iter() {
                self.images.push(Image::axpby(a, u, b, u)?);
            }
            return Ok(());
        }
        for (u, v) in x.images.iter().zip(y.images.iter()) {
            self.images.push(Image::axpby(a, u, b, v)?);
        }
        Ok(())
    }

    fn new_like(&self) -> MrResult<Self> {
        Ok(ImagesVector::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ImageData, ImageKind};
    use ndarray::{ArrayD, IxDyn};

    fn image(value : f32, kind : &str) -> Image {
        let arr = ArrayD::from_shape_fn(IxDyn(&[3, 2]), |ix| {
            Complex32::new(value + ix[0] as f32, ix[1] as f32)
        });
        Image::new(ImageData::Complex32(arr)).with_attribute("image_type", kind)
    }

    fn list() -> ImagesVector {
        ImagesVector::from_images(vec![
            image(0.0, "magnitude"),
            image(1.0, "Phase"),
            image(2.0, "MAGNITUDE"),
            image(3.0, "phase"),
            image(4.0, "magnitude"),
        ])
    }

    #[test]
    fn select_ignores_case() {
        let images = list();
        let mags = images.select("image_type", "Magnitude");
        assert_eq!(mags.items().unwrap(), 3);
        assert_eq!(images.select("image_type", "PHASE").items().unwrap(), 2);
        assert_eq!(images.select("missing", "x").items().unwrap(), 0);
    }

    #[test]
    fn subset_steps_from_offset() {
        let images = list();
        let sub = images.subset(2, 1).unwrap();
        assert_eq!(sub.images(), &[images.images()[1].clone(), images.images()[3].clone()]);
        assert_eq!(images.subset(1, 5).unwrap().items().unwrap(), 0);
        assert!(images.subset(0, 0).is_err());
    }

    #[test]
    fn norm_is_sqrt_of_self_dot() {
        let images = list();
        let dot = images.dot(&images).unwrap();
        assert!((images.norm().unwrap() - dot.re.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn axpby_with_zero_b_copies_x() {
        let x = list();
        let y = ImagesVector::new();
        let z = ImagesVector::linear_combination(
            Complex32::new(1.0, 0.0), &x, Complex32::new(0.0, 0.0), &y
        ).unwrap();
        assert_eq!(z, x);
    }

    #[test]
    fn axpby_pairs_up_to_the_shorter() {
        let x = list();
        let y = x.subset(1, 3).unwrap();
        let z = ImagesVector::linear_combination(
            Complex32::new(1.0, 0.0), &x, Complex32::new(-1.0, 0.0), &y
        ).unwrap();
        assert_eq!(z.items().unwrap(), 2);
        assert!((z.image(0).unwrap().norm() - (3.0f64 * 2.0 * 9.0).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn complex_data_round_trip() {
        let mut images = ImagesVector::from_images(vec![
            Image::new(ImageData::zeros(ImageKind::Complex32, &[2, 2])),
            Image::new(ImageData::zeros(ImageKind::Real32, &[3])),
        ]);
        let values : Vec<_> = (0..7).map(|i| Complex32::new(i as f32, 0.0)).collect();
        images.set_complex_data(&values).unwrap();
        assert_eq!(images.to_complex_vec(), values);
        assert_eq!(images.to_real_vec(), (0..7).map(|i| i as f32).collect::<Vec<_>>());
        assert_eq!(images.dimensions(1).unwrap(), vec![3]);
        assert!(images.set_complex_data(&values[..6]).is_err());
    }
}
