//! The acquisition header: a text document stored alongside the
//! readouts that describes the acquisition geometry.
//!
//! The text is JSON. It is kept verbatim in [`AcquisitionsInfo`] so that
//! containers can pass it around and write it back without loss, and is
//! parsed on demand into [`Header`] when a geometry value is needed.

use serde::{Deserialize, Serialize};

use crate::error::{MrError, MrResult};

fn one() -> u16 {
    1
}

/// Matrix size of an encoding space, in voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixSize {
    pub x : u16,
    pub y : u16,
    #[serde(default = "one")]
    pub z : u16,
}

/// Field of view of an encoding space, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldOfView {
    pub x : f32,
    pub y : f32,
    pub z : f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodingSpace {
    pub matrix_size : MatrixSize,
    #[serde(default)]
    pub field_of_view_mm : FieldOfView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelerationFactor {
    pub kspace_encoding_step_1 : u16,
    #[serde(default = "one")]
    pub kspace_encoding_step_2 : u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelImaging {
    pub acceleration_factor : AccelerationFactor,
}

/// One encoding of the acquisition. Only the first encoding of a
/// header is ever used for reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    pub encoded_space : EncodingSpace,
    pub recon_space : EncodingSpace,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_imaging : Option<ParallelImaging>,
}

impl Encoding {
    /// Encoding with identical encoded and reconstructed matrices and
    /// no parallel imaging.
    pub fn new(nx : u16, ny : u16) -> Self {
        let space = EncodingSpace {
            matrix_size : MatrixSize { x : nx, y : ny, z : 1 },
            field_of_view_mm : FieldOfView::default(),
        };
        Encoding {
            encoded_space : space,
            recon_space : space,
            parallel_imaging : None,
        }
    }

    /// Sets the phase-encode acceleration factor, builder style.
    pub fn with_acceleration(mut self, factor : u16) -> Self {
        self.parallel_imaging = Some(ParallelImaging {
            acceleration_factor : AccelerationFactor {
                kspace_encoding_step_1 : factor,
                kspace_encoding_step_2 : 1,
            },
        });
        self
    }

    /// Whether the phase-encode direction is accelerated, i.e.
    /// the parallel-imaging acceleration factor exceeds 1.
    pub fn parallel(&self) -> bool {
        self.parallel_imaging
            .map(|p| p.acceleration_factor.kspace_encoding_step_1 > 1)
            .unwrap_or(false)
    }
}

/// Parsed acquisition header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub encoding : Vec<Encoding>,
}

/// The verbatim header text of an acquisition collection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcquisitionsInfo(String);

impl AcquisitionsInfo {
    pub fn new(text : impl Into<String>) -> Self {
        AcquisitionsInfo(text.into())
    }

    /// Serializes a parsed header.
    pub fn from_header(header : &Header) -> MrResult<Self> {
        Ok(AcquisitionsInfo(serde_json::to_string(header)?))
    }

    /// Header holding a single encoding.
    pub fn from_encoding(encoding : Encoding) -> MrResult<Self> {
        Self::from_header(&Header { encoding : vec![encoding] })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn header(&self) -> MrResult<Header> {
        Ok(serde_json::from_str(&self.0)?)
    }

    /// The first encoding of the header.
    ///
    /// ## Errors
    ///
    /// * `MrError::Header` - the text is not a valid header
    /// * `MrError::NotFound` - the header lists no encoding
    pub fn encoding(&self) -> MrResult<Encoding> {
        self.header()?
            .encoding
            .into_iter()
            .next()
            .ok_or_else(|| MrError::NotFound("encoding in acquisition header".to_string()))
    }

    /// True if the header declares a phase-encode acceleration factor
    /// greater than 1.
    pub fn undersampled(&self) -> MrResult<bool> {
        Ok(self.encoding()?.parallel())
    }
}

impl From<String> for AcquisitionsInfo {
    fn from(value : String) -> Self {
        AcquisitionsInfo(value)
    }
}

impl std::fmt::Display for AcquisitionsInfo {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_survives_text_form() {
        let enc = Encoding::new(128, 96).with_acceleration(2);
        let info = AcquisitionsInfo::from_encoding(enc).unwrap();
        assert_eq!(info.encoding().unwrap(), enc);
        assert!(info.undersampled().unwrap());
    }

    #[test]
    fn acceleration_of_one_is_not_undersampled() {
        let enc = Encoding::new(64, 64).with_acceleration(1);
        let info = AcquisitionsInfo::from_encoding(enc).unwrap();
        assert!(!info.undersampled().unwrap());
    }

    #[test]
    fn minimal_hand_written_header() {
        let info = AcquisitionsInfo::new(
            r#"{"encoding":[{
                "encoded_space":{"matrix_size":{"x":256,"y":128}},
                "recon_space":{"matrix_size":{"x":128,"y":128}}
            }]}"#,
        );
        let enc = info.encoding().unwrap();
        assert_eq!(enc.recon_space.matrix_size.x, 128);
        assert_eq!(enc.encoded_space.matrix_size.z, 1);
        assert!(!info.undersampled().unwrap());
    }

    #[test]
    fn missing_encoding_is_not_found() {
        let info = AcquisitionsInfo::new(r#"{"encoding":[]}"#);
        assert!(matches!(info.encoding(), Err(MrError::NotFound(_))));
        let info = AcquisitionsInfo::new("<xml/>");
        assert!(matches!(info.encoding(), Err(MrError::Header(_))));
    }
}
