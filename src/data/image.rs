//! `Image`
//!
//! A reconstructed N-dimensional image whose element type is one of a
//! small fixed set of numeric kinds. Linear-algebra code works on any
//! kind through [`ImageData`] and never needs the concrete element type.

use std::collections::BTreeMap;

use ndarray::{ArrayD, IxDyn};
use num_complex::{Complex32, Complex64};
use num_traits::Zero;

use crate::error::{MrError, MrResult};

/// The element kinds an image can hold. The discriminant is the kind
/// code used in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageKind {
    Real32 = 1,
    Real64 = 2,
    Complex32 = 3,
    Complex64 = 4,
}

impl ImageKind {
    pub fn from_code(code : u8) -> Option<Self> {
        match code {
            1 => Some(ImageKind::Real32),
            2 => Some(ImageKind::Real64),
            3 => Some(ImageKind::Complex32),
            4 => Some(ImageKind::Complex64),
            _ => None,
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, ImageKind::Complex32 | ImageKind::Complex64)
    }
}

/// Element types that can live in an [`ImageData`]. Every kind is
/// promoted to `Complex64` for arithmetic; converting back to a real
/// kind keeps the real part.
pub trait ImageElement : Copy + Zero + Send + Sync + 'static {
    fn to_c64(self) -> Complex64;
    fn from_c64(z : Complex64) -> Self;
}

impl ImageElement for f32 {
    fn to_c64(self) -> Complex64 { Complex64::new(self as f64, 0.0) }
    fn from_c64(z : Complex64) -> Self { z.re as f32 }
}

impl ImageElement for f64 {
    fn to_c64(self) -> Complex64 { Complex64::new(self, 0.0) }
    fn from_c64(z : Complex64) -> Self { z.re }
}

impl ImageElement for Complex32 {
    fn to_c64(self) -> Complex64 { Complex64::new(self.re as f64, self.im as f64) }
    fn from_c64(z : Complex64) -> Self { Complex32::new(z.re as f32, z.im as f32) }
}

impl ImageElement for Complex64 {
    fn to_c64(self) -> Complex64 { self }
    fn from_c64(z : Complex64) -> Self { z }
}

/// Pixel data of an image, one variant per [`ImageKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    Real32(ArrayD<f32>),
    Real64(ArrayD<f64>),
    Complex32(ArrayD<Complex32>),
    Complex64(ArrayD<Complex64>),
}

/// `with_data!(data, arr => expr)` evaluates `expr` with `arr` bound
/// to the inner array of whichever variant `data` holds.
macro_rules! with_data {
    ($data : expr, $arr : ident => $body : expr) => {
        match $data {
            ImageData::Real32($arr) => $body,
            ImageData::Real64($arr) => $body,
            ImageData::Complex32($arr) => $body,
            ImageData::Complex64($arr) => $body,
        }
    };
}

fn norm_sqr_of<T : ImageElement>(a : &ArrayD<T>) -> f64 {
    a.iter().map(|v| v.to_c64().norm_sqr()).sum()
}

fn dot_of<T : ImageElement>(a : &ArrayD<T>, other : &ImageData) -> Complex64 {
    a.iter()
        .zip(other.values())
        .fold(Complex64::zero(), |z, (u, v)| z + v.conj() * u.to_c64())
}

fn axpby_of<T : ImageElement>(out : &mut ArrayD<T>, a : Complex64, b : Complex64, y : &ImageData) {
    if b.is_zero() {
        out.mapv_inplace(|v| T::from_c64(a * v.to_c64()));
    } else {
        out.iter_mut().zip(y.values()).for_each(|(v, w)| {
            *v = T::from_c64(a * v.to_c64() + b * w);
        });
    }
}

fn overwrite_of<T : ImageElement>(out : &mut ArrayD<T>, values : &[Complex32]) {
    out.iter_mut().zip(values.iter()).for_each(|(v, z)| {
        *v = T::from_c64(z.to_c64());
    });
}

impl ImageData {
    pub fn zeros(kind : ImageKind, shape : &[usize]) -> Self {
        let dim = IxDyn(shape);
        match kind {
            ImageKind::Real32 => ImageData::Real32(ArrayD::zeros(dim)),
            ImageKind::Real64 => ImageData::Real64(ArrayD::zeros(dim)),
            ImageKind::Complex32 => ImageData::Complex32(ArrayD::zeros(dim)),
            ImageKind::Complex64 => ImageData::Complex64(ArrayD::zeros(dim)),
        }
    }

    pub fn kind(&self) -> ImageKind {
        match self {
            ImageData::Real32(_) => ImageKind::Real32,
            ImageData::Real64(_) => ImageKind::Real64,
            ImageData::Complex32(_) => ImageKind::Complex32,
            ImageData::Complex64(_) => ImageKind::Complex64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_data!(self, a => a.shape())
    }

    pub fn len(&self) -> usize {
        with_data!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every element promoted to `Complex64`, in logical order.
    pub fn values(&self) -> Box<dyn Iterator<Item = Complex64> + '_> {
        with_data!(self, a => Box::new(a.iter().map(|v| v.to_c64())))
    }
}

/// An image: pixel data plus free-form string attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub data : ImageData,
    pub attributes : BTreeMap<String, String>,
}

impl Image {
    pub fn new(data : ImageData) -> Self {
        Image { data, attributes : BTreeMap::new() }
    }

    pub fn with_attribute(mut self, key : &str, value : &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attribute(&self, key : &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn kind(&self) -> ImageKind {
        self.data.kind()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_shape(&self, other : &Image) -> MrResult<()> {
        if self.shape() != other.shape() {
            return Err(MrError::mismatch(
                format!("{:?}", self.shape()),
                format!("{:?}", other.shape()),
            ));
        }
        Ok(())
    }

    pub fn norm(&self) -> f64 {
        with_data!(&self.data, a => norm_sqr_of(a)).sqrt()
    }

    /// Conjugate-linear inner product `sum(conj(other) * self)`.
    /// The two images may hold different element kinds.
    pub fn dot(&self, other : &Image) -> MrResult<Complex64> {
        self.check_shape(other)?;
        Ok(with_data!(&self.data, a => dot_of(a, &other.data)))
    }

    /// `a * x + b * y` with the element kind and attributes of `x`.
    /// When `b` is zero the pixels of `y` are never read.
    pub fn axpby(a : Complex64, x : &Image, b : Complex64, y : &Image) -> MrResult<Image> {
        if !b.is_zero() {
            x.check_shape(y)?;
        }
        let mut out = x.clone();
        with_data!(&mut out.data, arr => axpby_of(arr, a, b, &y.data));
        Ok(out)
    }

    /// Pixels as single-precision complex values.
    pub fn to_complex_vec(&self) -> Vec<Complex32> {
        self.data.values().map(Complex32::from_c64).collect()
    }

    /// Pixels as single-precision reals: the value itself for real
    /// kinds and the magnitude for complex kinds.
    pub fn to_real_vec(&self) -> Vec<f32> {
        match &self.data {
            ImageData::Real32(a) => a.iter().copied().collect(),
            ImageData::Real64(a) => a.iter().map(|&v| v as f32).collect(),
            data => data.values().map(|z| z.norm() as f32).collect(),
        }
    }

    /// Overwrites the pixels from complex values (real kinds keep the
    /// real part).
    ///
    /// ## Errors
    ///
    /// * `MrError::DimensionMismatch` - if `values` is shorter than the image
    pub fn set_complex_data(&mut self, values : &[Complex32]) -> MrResult<()> {
        if values.len() < self.len() {
            return Err(MrError::mismatch(self.len(), values.len()));
        }
        with_data!(&mut self.data, a => overwrite_of(a, values));
        Ok(())
    }
}
