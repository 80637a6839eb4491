//! On-disk records of a dataset file.
//!
//! A dataset file is a [`Preamble`] followed by any number of
//! records. Every record is a [`RecordHeader`] (kind and payload length)
//! followed by its payload, so a reader can skip records it does not
//! need. All values are little-endian.

use std::collections::BTreeMap;

use binrw::binrw;
use ndarray::{ArrayD, IxDyn};
use num_complex::{Complex32, Complex64};

use crate::{
    data::{Acquisition, AcquisitionHeader, Image, ImageData, ImageKind},
    error::{MrError, MrResult},
};

pub const FORMAT_VERSION : u16 = 1;

#[binrw]
#[brw(little, magic = b"MRCD")]
#[derive(Debug)]
pub struct Preamble {
    pub version : u16,
}

/// What a record's payload holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Header = 1,
    Acquisition = 2,
    Image = 3,
}

impl RecordKind {
    pub fn from_code(code : u8) -> Option<Self> {
        match code {
            1 => Some(RecordKind::Header),
            2 => Some(RecordKind::Acquisition),
            3 => Some(RecordKind::Image),
            _ => None,
        }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
pub struct RecordHeader {
    pub kind : u8,
    pub length : u64,
}

/// Size in bytes of a serialized [`RecordHeader`].
pub const RECORD_HEADER_SIZE : u64 = 9;

#[binrw]
#[brw(little)]
pub struct HeaderRecord {
    #[br(temp)]
    #[bw(calc = text.len() as u64)]
    len : u64,
    #[br(count = len)]
    pub text : Vec<u8>,
}

#[binrw]
#[brw(little)]
pub struct AcquisitionRecord {
    pub head : AcquisitionHeader,
    /// Interleaved real/imaginary parts, channel-major.
    #[br(count = 2 * head.number_of_samples as usize * head.active_channels as usize)]
    pub samples : Vec<f32>,
}

impl From<&Acquisition> for AcquisitionRecord {
    fn from(acq : &Acquisition) -> Self {
        AcquisitionRecord {
            head : *acq.head(),
            samples : bytemuck::cast_slice::<Complex32, f32>(&acq.samples()).to_vec(),
        }
    }
}

impl TryFrom<AcquisitionRecord> for Acquisition {
    type Error = MrError;

    fn try_from(record : AcquisitionRecord) -> MrResult<Self> {
        let samples = bytemuck::pod_collect_to_vec::<f32, Complex32>(&record.samples);
        Acquisition::from_samples(record.head, samples)
    }
}

/// The leading fields of an [`ImageRecord`]: enough to index images
/// by tag without reading their pixels.
#[binrw]
#[brw(little)]
pub struct ImageTag {
    #[br(temp)]
    #[bw(calc = tag.len() as u16)]
    tag_len : u16,
    #[br(count = tag_len)]
    pub tag : Vec<u8>,
}

#[binrw]
#[brw(little)]
pub struct ImageRecord {
    #[br(temp)]
    #[bw(calc = tag.len() as u16)]
    tag_len : u16,
    #[br(count = tag_len)]
    pub tag : Vec<u8>,
    pub kind : u8,
    #[br(temp)]
    #[bw(calc = dims.len() as u16)]
    ndim : u16,
    #[br(count = ndim)]
    pub dims : Vec<u64>,
    #[br(temp)]
    #[bw(calc = attributes.len() as u32)]
    attributes_len : u32,
    /// JSON object of string attributes.
    #[br(count = attributes_len)]
    pub attributes : Vec<u8>,
    #[br(temp)]
    #[bw(calc = values.len() as u64)]
    value_count : u64,
    /// Pixels widened to `f64`; complex kinds are interleaved.
    #[br(count = value_count)]
    pub values : Vec<f64>,
}

impl ImageRecord {
    pub fn from_image(tag : &str, image : &Image) -> MrResult<Self> {
        let values : Vec<f64> = match &image.data {
            ImageData::Real32(a) => a.iter().map(|&v| v as f64).collect(),
            ImageData::Real64(a) => a.iter().copied().collect(),
            ImageData::Complex32(a) => a.iter().flat_map(|z| [z.re as f64, z.im as f64]).collect(),
            ImageData::Complex64(a) => {
                let pixels : Vec<Complex64> = a.iter().copied().collect();
                bytemuck::cast_slice::<Complex64, f64>(&pixels).to_vec()
            },
        };
        Ok(ImageRecord {
            tag : tag.as_bytes().to_vec(),
            kind : image.kind() as u8,
            dims : image.shape().iter().map(|&d| d as u64).collect(),
            attributes : serde_json::to_vec(&image.attributes)?,
            values,
        })
    }

    pub fn into_image(self) -> MrResult<Image> {
        let kind = ImageKind::from_code(self.kind)
            .ok_or_else(|| MrError::Format(format!("unknown image kind {}", self.kind)))?;
        let shape = IxDyn(&self.dims.iter().map(|&d| d as usize).collect::<Vec<_>>());
        let bad_shape = |err : ndarray::ShapeError| MrError::Format(err.to_string());
        let data = match kind {
            ImageKind::Real32 => ImageData::Real32(
                ArrayD::from_shape_vec(shape, self.values.iter().map(|&v| v as f32).collect())
                    .map_err(bad_shape)?
            ),
            ImageKind::Real64 => ImageData::Real64(
                ArrayD::from_shape_vec(shape, self.values).map_err(bad_shape)?
            ),
            ImageKind::Complex32 => ImageData::Complex32(
                ArrayD::from_shape_vec(
                    shape,
                    self.values.chunks_exact(2)
                        .map(|p| Complex32::new(p[0] as f32, p[1] as f32))
                        .collect(),
                ).map_err(bad_shape)?
            ),
            ImageKind::Complex64 => ImageData::Complex64(
                ArrayD::from_shape_vec(
                    shape,
                    bytemuck::pod_collect_to_vec::<f64, Complex64>(&self.values),
                ).map_err(bad_shape)?
            ),
        };
        let attributes : BTreeMap<String, String> = if self.attributes.is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_slice(&self.attributes)?
        };
        Ok(Image { data, attributes })
    }
}
