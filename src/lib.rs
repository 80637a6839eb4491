//! `mrcoils`
//!
//! Multi-coil MR k-space containers that behave as vectors for
//! iterative solvers, plus coil image and coil sensitivity map
//! estimation from them.
//!
//! The usual path is: open acquisitions, order them, build coil images
//! slice by slice, estimate sensitivity maps from those images.

use std::path::Path;

pub mod coils;
pub mod config;
pub mod containers;
pub mod data;
pub mod error;
pub mod fft;
pub mod header;
pub mod phantom;
pub mod storage;
mod utils;

pub use coils::{CoilImages, CoilSensitivities};
pub use config::{ReconConfig, StorageScheme};
pub use containers::{
    Acquisitions,
    AcquisitionsContainer,
    AcquisitionsFile,
    AcquisitionsVector,
    DataContainer,
    ImagesVector,
};
pub use error::{MrError, MrResult};
pub use header::AcquisitionsInfo;
pub use storage::{DatasetFile, Storage};
pub use utils::scratch_file_name;

use utils::report;

/// `open_acquisitions(path, config)` opens a dataset file as the kind of
/// container `config` asks for and puts its readouts in acquisition
/// order.
///
/// ## Arguments
///
/// * `path` - Path to an existing dataset file
///
/// * `config` - Selects memory or file storage and verbosity
///
/// ## Example
///
/// ```rust, ignore
/// let acqs = open_acquisitions("scan.mrd", &ReconConfig::default())?;
/// println!("{:?}", acqs.get_acquisitions_dimensions()?);
/// ```
pub fn open_acquisitions<P : AsRef<Path>>(path : P, config : &ReconConfig) -> MrResult<Acquisitions> {
    let mut acqs = Acquisitions::open(path, config)?;
    acqs.order()?;
    Ok(acqs)
}

/// `compute_csm(acqs, config)` estimates coil sensitivity maps from
/// ordered acquisitions with the smoothness given in `config`.
///
/// ## Example
///
/// ```rust, ignore
/// let csms = compute_csm(&open_acquisitions("scan.mrd", &config)?, &config)?;
/// for i in 0..csms.items() {
///     println!("{:?}", csms.dimensions(i)?);
/// }
/// ```
pub fn compute_csm<A : AcquisitionsContainer + ?Sized>(
    acqs : &A,
    config : &ReconConfig,
) -> MrResult<CoilSensitivities> {
    let mut coil_images = CoilImages::new().with_verbose(config.verbose);
    coil_images.compute(acqs)?;
    report!(config.verbose, "mrcoils", "{} coil images", coil_images.items());

    let mut csms = CoilSensitivities::new(config.csm_smoothness).with_verbose(config.verbose);
    csms.compute(&coil_images)?;
    Ok(csms)
}

/// `compute_csm_file(input, output, config)` reads a dataset file,
/// estimates its coil sensitivity maps and writes them to a new
/// dataset file at `output` (replacing it), under the `csm` tag.
/// The acquisition header is copied along.
///
/// ## Returns
///
/// The number of maps written.
pub fn compute_csm_file<P : AsRef<Path>, Q : AsRef<Path>>(
    input : P,
    output : Q,
    config : &ReconConfig,
) -> MrResult<usize> {
    let acqs = open_acquisitions(input, config)?;
    let csms = compute_csm(&acqs, config)?;
    let dataset = DatasetFile::open(output, true)?;
    dataset.write_header(acqs.acquisitions_info().as_str())?;
    csms.write(&dataset)?;
    report!(config.verbose, "mrcoils", "wrote {} maps to {}", csms.items(), dataset.path().display());
    Ok(csms.items())
}
