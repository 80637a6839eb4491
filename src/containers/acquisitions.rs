//! Acquisition containers: ordering, grid-shape inference, raw data
//! access and the vector-space operations over readouts.
//!
//! Everything that only needs "the i-th acquisition in logical order"
//! lives as a provided method of [`AcquisitionsContainer`], so the
//! in-memory and file-backed kinds share one implementation. The
//! closed set of kinds is [`Acquisitions`].

mod file;
mod vector;

pub use file::AcquisitionsFile;
pub use vector::AcquisitionsVector;
pub use crate::config::StorageScheme;

use std::path::Path;

use itertools::Itertools;
use num_complex::Complex32;

use crate::{
    config::ReconConfig,
    containers::DataContainer,
    data::{
        infer_dimensions,
        Acquisition,
        AcquisitionFlag,
        AcquisitionFlags,
        AcquisitionsDimensions,
    },
    error::{MrError, MrResult},
    header::AcquisitionsInfo,
    storage::Storage,
    utils::report,
};

/// The capability shared by every acquisition container.
///
/// Implementors supply physical storage access and the ordering state;
/// logical access, ordering, inference and algebra come for free.
///
/// Logical position `i` maps to physical position `index()[i]` when an
/// index is present, and to `i` itself otherwise.
pub trait AcquisitionsContainer {
    fn acquisitions_info(&self) -> &AcquisitionsInfo;

    /// Replaces the header (and writes it through, for stored kinds).
    fn set_acquisitions_info(&mut self, info : AcquisitionsInfo) -> MrResult<()>;

    /// Number of acquisitions, ignored ones included.
    fn number(&self) -> MrResult<usize>;

    /// The acquisition at physical position `num`.
    fn read_physical(&self, num : usize) -> MrResult<Acquisition>;

    /// Appends at the physical end. An ordering index is extended with
    /// the new position, so the new acquisition comes last logically.
    fn append_acquisition(&mut self, acq : &Acquisition) -> MrResult<()>;

    fn ordered(&self) -> bool;

    fn set_ordered(&mut self, ordered : bool);

    fn index(&self) -> Option<&[usize]>;

    fn set_index(&mut self, index : Option<Vec<usize>>);

    fn verbose(&self) -> bool;

    /// Overwrites the samples of the acquisitions in logical order from
    /// `data`, which holds `na` readouts of `nc` channels by `ns`
    /// samples (channel-major, samples fastest). Ignored acquisitions
    /// are left untouched when the container holds more than `na`.
    ///
    /// ## Errors
    ///
    /// * `MrError::DimensionMismatch` - if an acquisition to overwrite has
    /// a different shape, or `data` runs out
    fn set_acquisitions_data(
        &mut self,
        na : usize,
        nc : usize,
        ns : usize,
        data : &[Complex32],
    ) -> MrResult<()>;

    /// Maps logical position `num` to its physical position. Without an
    /// index the two coincide.
    fn physical_index(&self, num : usize) -> MrResult<usize> {
        match self.index() {
            None => Ok(num),
            Some(index) => index.get(num).copied().ok_or_else(|| MrError::NotFound(
                format!("acquisition {} of {} ordered", num, index.len())
            )),
        }
    }

    /// The acquisition at logical position `num`.
    fn get_acquisition(&self, num : usize) -> MrResult<Acquisition> {
        self.read_physical(self.physical_index(num)?)
    }

    /// Sorts the acquisitions by (repetition, slice, phase-encode step)
    /// with a stable sort and stores the result as the ordering index.
    ///
    /// The sort keys are always read in physical order, so ordering an
    /// ordered container again yields the same index.
    fn order(&mut self) -> MrResult<()> {
        let na = self.number()?;
        let keys = (0..na)
            .map(|i| self.read_physical(i).map(|acq| {
                let idx = acq.idx();
                (idx.repetition, idx.slice, idx.kspace_encode_step_1)
            }))
            .collect::<MrResult<Vec<_>>>()?;
        let index = (0..na).sorted_by_key(|&i| keys[i]).collect();
        report!(self.verbose(), "acquisitions", "ordered {} acquisitions", na);
        self.set_index(Some(index));
        self.set_ordered(true);
        Ok(())
    }

    /// True if the header declares parallel-imaging undersampling.
    fn undersampled(&self) -> MrResult<bool> {
        self.acquisitions_info().undersampled()
    }

    /// Infers the regular grid shape of the data, see
    /// [`AcquisitionsDimensions`].
    fn get_acquisitions_dimensions(&self) -> MrResult<AcquisitionsDimensions> {
        let na = self.number()?;
        let ordered = self.ordered();
        itertools::process_results(
            (0..na).map(|i| self.get_acquisition(i)),
            |acqs| infer_dimensions(acqs, ordered),
        )
    }

    /// Flags of the acquisitions in logical order. Ignored acquisitions
    /// are left out when `n` is smaller than the container.
    fn get_acquisitions_flags(&self, n : usize) -> MrResult<Vec<AcquisitionFlags>> {
        let na = self.number()?;
        let mut flags = Vec::with_capacity(na.min(n));
        for a in 0..na {
            let acq = self.get_acquisition(a)?;
            if acq.to_be_ignored() && n < na {
                report!(self.verbose(), "acquisitions", "ignoring acquisition {}", a);
                continue;
            }
            flags.push(acq.flags());
        }
        Ok(flags)
    }

    /// Raw samples, channel-major with samples fastest per readout.
    ///
    /// ## Arguments
    ///
    /// * `slice` - `None` for every regular acquisition in logical
    /// order. `Some(s)` for the readouts of the `s`-th slice (as
    /// delimited by the first/last-in-slice flags), laid out
    /// `[channel, line, sample]`.
    ///
    /// ## Returns
    ///
    /// The number of readouts and their samples.
    ///
    /// ## Errors
    ///
    /// * `MrError::NotFound` - the slice does not exist
    /// * `MrError::DimensionMismatch` - the slice's readouts differ in shape
    fn get_acquisitions_data(&self, slice : Option<usize>) -> MrResult<(usize, Vec<Complex32>)> {
        let Some(slice) = slice else {
            let mut count = 0;
            let mut samples = Vec::new();
            for acq in regular_acquisitions(self)? {
                samples.extend(acq?.samples());
                count += 1;
            }
            return Ok((count, samples));
        };

        let lines = slice_acquisitions(self, slice)?;
        let (ns, nc) = lines[0].shape();
        if let Some(odd) = lines.iter().find(|acq| acq.shape() != (ns, nc)) {
            return Err(MrError::mismatch(
                format!("{:?} (samples, channels)", (ns, nc)),
                format!("{:?}", odd.shape()),
            ));
        }
        let ny = lines.len();
        let mut samples = vec![Complex32::new(0.0, 0.0); nc * ny * ns];
        for (y, acq) in lines.iter().enumerate() {
            for ((c, s), v) in acq.data().indexed_iter() {
                samples[s + ns * (y + ny * c)] = *v;
            }
        }
        Ok((ny, samples))
    }

    /// Root mean square of the per-acquisition residual metric
    /// [`Acquisition::diff`] over acquisitions at equal logical
    /// positions (nothing is skipped). Zero if either side is empty.
    fn diff<C : AcquisitionsContainer + ?Sized>(&self, other : &C) -> MrResult<f32>
        where Self : Sized {
        let n = self.number()?.min(other.number()?);
        if n == 0 {
            return Ok(0.0);
        }
        let mut sum = 0.0f32;
        for i in 0..n {
            let s = self.get_acquisition(i)?.diff(&other.get_acquisition(i)?);
            sum += s * s;
        }
        Ok((sum / n as f32).sqrt())
    }
}

/// Acquisitions in logical order, skipping the ones to be ignored.
pub(crate) fn regular_acquisitions<'a, A : AcquisitionsContainer + ?Sized>(
    acqs : &'a A,
) -> MrResult<impl Iterator<Item = MrResult<Acquisition>> + 'a> {
    let na = acqs.number()?;
    Ok((0..na).filter_map(move |i| match acqs.get_acquisition(i) {
        Ok(acq) if acq.to_be_ignored() => {
            report!(acqs.verbose(), "acquisitions", "ignoring acquisition {}", i);
            None
        },
        other => Some(other),
    }))
}

/// The regular readouts of slice number `slice`. Slices open on a
/// first-in-slice flag and close on a last-in-slice flag (or at the
/// end of the data).
fn slice_acquisitions<A : AcquisitionsContainer + ?Sized>(
    acqs : &A,
    slice : usize,
) -> MrResult<Vec<Acquisition>> {
    let na = acqs.number()?;
    let mut current : Option<usize> = None;
    let mut in_slice = false;
    let mut lines = Vec::new();
    for a in 0..na {
        let acq = acqs.get_acquisition(a)?;
        if acq.is_flag_set(AcquisitionFlag::FirstInSlice) {
            current = Some(current.map_or(0, |s| s + 1));
            in_slice = true;
        }
        if !in_slice || current != Some(slice) || acq.to_be_ignored() {
            continue;
        }
        let last = acq.is_flag_set(AcquisitionFlag::LastInSlice);
        lines.push(acq);
        if last {
            break;
        }
    }
    if lines.is_empty() {
        return Err(MrError::NotFound(format!("slice {} among {} acquisitions", slice, na)));
    }
    Ok(lines)
}

/// Every acquisition in logical order, with the samples of the ones
/// selected by the `na` rule of
/// [`AcquisitionsContainer::set_acquisitions_data`] replaced from
/// `data`.
pub(crate) fn rewritten_acquisitions<A : AcquisitionsContainer + ?Sized>(
    acqs : &A,
    na : usize,
    nc : usize,
    ns : usize,
    data : &[Complex32],
) -> MrResult<Vec<Acquisition>> {
    if data.len() < na * nc * ns {
        return Err(MrError::mismatch(
            format!("{} values ({} x {} x {})", na * nc * ns, na, nc, ns),
            data.len(),
        ));
    }
    let ma = acqs.number()?;
    let mut chunks = data[..na * nc * ns].chunks_exact((nc * ns).max(1));
    let mut out = Vec::with_capacity(ma);
    for a in 0..ma {
        let acq = acqs.get_acquisition(a)?;
        if acq.to_be_ignored() && ma > na {
            report!(acqs.verbose(), "acquisitions", "ignoring acquisition {}", a);
            out.push(acq);
            continue;
        }
        if acq.shape() != (ns, nc) {
            return Err(MrError::mismatch(
                format!("{:?} (samples, channels)", (ns, nc)),
                format!("{:?} at acquisition {}", acq.shape(), a),
            ));
        }
        let values = chunks.next().ok_or_else(|| MrError::mismatch(
            format!("{} readouts", na),
            format!("more than {} acquisitions to overwrite", na),
        ))?;
        out.push(Acquisition::from_samples(*acq.head(), values.to_vec())?);
    }
    Ok(out)
}

fn norm_of<A : AcquisitionsContainer + ?Sized>(acqs : &A) -> MrResult<f32> {
    let mut r = 0.0f32;
    for acq in regular_acquisitions(acqs)? {
        let s = acq?.norm();
        r += s * s;
    }
    Ok(r.sqrt())
}

fn dot_of<A, B>(this : &A, other : &B) -> MrResult<Complex32>
    where A : AcquisitionsContainer + ?Sized, B : AcquisitionsContainer + ?Sized {
    let mut z = Complex32::new(0.0, 0.0);
    for (a, b) in regular_acquisitions(this)?.zip(regular_acquisitions(other)?) {
        z += a?.dot(&b?)?;
    }
    Ok(z)
}

fn axpby_into<O, X, Y>(out : &mut O, a : Complex32, x : &X, b : Complex32, y : &Y) -> MrResult<()>
    where O : AcquisitionsContainer + ?Sized,
    X : AcquisitionsContainer + ?Sized,
    Y : AcquisitionsContainer + ?Sized {
    if b == Complex32::new(0.0, 0.0) {
        for acq in regular_acquisitions(x)? {
            let acq = acq?;
            out.append_acquisition(&Acquisition::axpby(a, &acq, b, &acq)?)?;
        }
        return Ok(());
    }
    for (u, v) in regular_acquisitions(x)?.zip(regular_acquisitions(y)?) {
        out.append_acquisition(&Acquisition::axpby(a, &u?, b, &v?)?)?;
    }
    Ok(())
}

macro_rules! acquisitions_data_container {
    ($kind : ty) => {
        impl DataContainer for $kind {
            fn items(&self) -> MrResult<usize> {
                self.number()
            }

            fn norm(&self) -> MrResult<f32> {
                norm_of(self)
            }

            fn dot(&self, other : &Self) -> MrResult<Complex32> {
                dot_of(self, other)
            }

            fn axpby(&mut self, a : Complex32, x : &Self, b : Complex32, y : &Self) -> MrResult<()> {
                axpby_into(self, a, x, b, y)
            }

            fn new_like(&self) -> MrResult<Self> {
                self.new_acquisitions_container()
            }
        }
    };
}

acquisitions_data_container!(AcquisitionsVector);
acquisitions_data_container!(AcquisitionsFile);
acquisitions_data_container!(Acquisitions);

/// One of the concrete acquisition container kinds, chosen at
/// construction by a [`StorageScheme`].
pub enum Acquisitions {
    Memory(AcquisitionsVector),
    File(AcquisitionsFile),
}

/// `with_kind!(acqs, inner => expr)` evaluates `expr` with `inner`
/// bound to whichever container `acqs` holds.
macro_rules! with_kind {
    ($acqs : expr, $inner : ident => $body : expr) => {
        match $acqs {
            Acquisitions::Memory($inner) => $body,
            Acquisitions::File($inner) => $body,
        }
    };
}

impl Acquisitions {
    /// An empty container of the kind selected by `config`.
    pub fn new(config : &ReconConfig, info : AcquisitionsInfo) -> MrResult<Self> {
        Ok(match config.storage_scheme {
            StorageScheme::Memory => Acquisitions::Memory(
                AcquisitionsVector::new(info).with_verbose(config.verbose)
            ),
            StorageScheme::File => Acquisitions::File(
                AcquisitionsFile::scratch(info, config.scratch_dir.as_deref())?
                    .with_verbose(config.verbose)
            ),
        })
    }

    /// Opens the dataset file at `path`. With the memory scheme every
    /// acquisition is read in at once; with the file scheme the file
    /// is read on demand and left in place when the container drops.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let mut acqs = Acquisitions::open("scan.mrd", &ReconConfig::default())?;
    /// acqs.order()?;
    /// let dims = acqs.get_acquisitions_dimensions()?;
    /// ```
    pub fn open<P : AsRef<Path>>(path : P, config : &ReconConfig) -> MrResult<Self> {
        let file = AcquisitionsFile::open(path, config.scratch_dir.as_deref())?
            .with_verbose(config.verbose);
        Ok(match config.storage_scheme {
            StorageScheme::File => Acquisitions::File(file),
            StorageScheme::Memory => Acquisitions::Memory(
                AcquisitionsVector::from_container(&file)?.with_verbose(config.verbose)
            ),
        })
    }

    pub fn scheme(&self) -> StorageScheme {
        match self {
            Acquisitions::Memory(_) => StorageScheme::Memory,
            Acquisitions::File(_) => StorageScheme::File,
        }
    }

    pub fn new_acquisitions_container(&self) -> MrResult<Self> {
        Ok(match self {
            Acquisitions::Memory(v) => Acquisitions::Memory(v.new_acquisitions_container()?),
            Acquisitions::File(f) => Acquisitions::File(f.new_acquisitions_container()?),
        })
    }

    /// Writes the header and every acquisition, in logical order, to
    /// `storage`.
    pub fn write(&self, storage : &dyn Storage) -> MrResult<()> {
        write_container(self, storage)
    }
}

/// Copies a container into a storage in logical order.
pub(crate) fn write_container<A : AcquisitionsContainer + ?Sized>(
    acqs : &A,
    storage : &dyn Storage,
) -> MrResult<()> {
    storage.write_header(acqs.acquisitions_info().as_str())?;
    for a in 0..acqs.number()? {
        storage.append_acquisition(&acqs.get_acquisition(a)?)?;
    }
    Ok(())
}

impl From<AcquisitionsVector> for Acquisitions {
    fn from(value : AcquisitionsVector) -> Self {
        Acquisitions::Memory(value)
    }
}

impl From<AcquisitionsFile> for Acquisitions {
    fn from(value : AcquisitionsFile) -> Self {
        Acquisitions::File(value)
    }
}

impl AcquisitionsContainer for Acquisitions {
    fn acquisitions_info(&self) -> &AcquisitionsInfo {
        with_kind!(self, acqs => acqs.acquisitions_info())
    }

    fn set_acquisitions_info(&mut self, info : AcquisitionsInfo) -> MrResult<()> {
        with_kind!(self, acqs => acqs.set_acquisitions_info(info))
    }

    fn number(&self) -> MrResult<usize> {
        with_kind!(self, acqs => acqs.number())
    }

    fn read_physical(&self, num : usize) -> MrResult<Acquisition> {
        with_kind!(self, acqs => acqs.read_physical(num))
    }

    fn append_acquisition(&mut self, acq : &Acquisition) -> MrResult<()> {
        with_kind!(self, acqs => acqs.append_acquisition(acq))
    }

    fn ordered(&self) -> bool {
        with_kind!(self, acqs => acqs.ordered())
    }

    fn set_ordered(&mut self, ordered : bool) {
        with_kind!(self, acqs => acqs.set_ordered(ordered))
    }

    fn index(&self) -> Option<&[usize]> {
        with_kind!(self, acqs => acqs.index())
    }

    fn set_index(&mut self, index : Option<Vec<usize>>) {
        with_kind!(self, acqs => acqs.set_index(index))
    }

    fn verbose(&self) -> bool {
        with_kind!(self, acqs => acqs.verbose())
    }

    fn set_acquisitions_data(
        &mut self,
        na : usize,
        nc : usize,
        ns : usize,
        data : &[Complex32],
    ) -> MrResult<()> {
        with_kind!(self, acqs => acqs.set_acquisitions_data(na, nc, ns, data))
    }
}
