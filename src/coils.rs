//! From acquisitions to coil sensitivity maps.
//!
//! [`CoilImages`] turns each slice of k-space into aliased per-channel
//! images; [`CoilSensitivities`] turns those into normalized channel
//! weights, using an object mask and masked smoothing from [`mask`].

mod coil_images;
pub mod mask;
mod sensitivities;

pub use coil_images::CoilImages;
pub use sensitivities::{estimate_csm, CoilSensitivities, CSM_TAG};
