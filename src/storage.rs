//! This module contains the storage collaborator: reading and writing
//! of the raw measurement/image store. It knows about readouts and
//! images as records, not about ordering, algebra or coils.
//!
//! Every [`Storage`] implementation owns its own lock and holds it for
//! exactly one call, so a single store can be shared between containers
//! (and threads) through an `Arc`.

mod dataset;
mod records;

pub use dataset::DatasetFile;

use crate::{
    data::{Acquisition, Image},
    error::MrResult,
};

/// The narrow read/write contract of a measurement/image store.
/// All calls may fail with an I/O error.
pub trait Storage : Send + Sync {
    /// Returns the current header text (empty if none was written).
    fn read_header(&self) -> MrResult<String>;

    /// Replaces the header text.
    fn write_header(&self, header : &str) -> MrResult<()>;

    fn acquisition_count(&self) -> MrResult<usize>;

    /// Reads the acquisition at physical position `index`.
    fn read_acquisition(&self, index : usize) -> MrResult<Acquisition>;

    fn append_acquisition(&self, acq : &Acquisition) -> MrResult<()>;

    fn image_count(&self, tag : &str) -> MrResult<usize>;

    /// Reads the `index`-th image stored under `tag`.
    fn read_image(&self, tag : &str, index : usize) -> MrResult<Image>;

    fn write_image(&self, tag : &str, image : &Image) -> MrResult<()>;
}
