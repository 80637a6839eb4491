//! Element types: single readouts, reconstructed images, per-slice
//! coil arrays, and the grid-shape inference over readouts.

pub mod acquisition;
pub mod coil;
pub mod dimensions;
pub mod image;

pub use acquisition::{
    Acquisition,
    AcquisitionFlag,
    AcquisitionFlags,
    AcquisitionHeader,
    EncodingCounters,
};
pub use coil::CoilData;
pub use dimensions::{AcquisitionsDimensions, infer_dimensions};
pub use image::{Image, ImageData, ImageElement, ImageKind};
