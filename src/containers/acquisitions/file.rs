use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use num_complex::Complex32;

use super::{rewritten_acquisitions, write_container, AcquisitionsContainer};
use crate::{
    data::Acquisition,
    error::{MrError, MrResult},
    header::AcquisitionsInfo,
    storage::{DatasetFile, Storage},
    utils::{report, scratch_file_name},
};

/// Acquisitions kept in a dataset file and read on demand.
///
/// A container that created its own scratch file owns it and removes
/// it when dropped; one opened on an existing (or user-named) file
/// never deletes it. Ownership moves with [`AcquisitionsFile::take_over`].
pub struct AcquisitionsFile {
    info : AcquisitionsInfo,
    storage : Arc<dyn Storage>,
    path : PathBuf,
    own_file : bool,
    scratch_dir : Option<PathBuf>,
    index : Option<Vec<usize>>,
    ordered : bool,
    verbose : bool,
}

impl AcquisitionsFile {
    fn from_parts(
        info : AcquisitionsInfo,
        storage : Arc<dyn Storage>,
        path : PathBuf,
        own_file : bool,
        scratch_dir : Option<&Path>,
    ) -> Self {
        AcquisitionsFile {
            info,
            storage,
            path,
            own_file,
            scratch_dir : scratch_dir.map(Path::to_path_buf),
            index : None,
            ordered : false,
            verbose : false,
        }
    }

    /// Opens an existing dataset file and reads its header.
    ///
    /// ## Arguments
    ///
    /// * `path` - The dataset file
    ///
    /// * `scratch_dir` - Where containers derived from this one put
    /// their temporary files (`None` for the OS temp dir)
    pub fn open<P : AsRef<Path>>(path : P, scratch_dir : Option<&Path>) -> MrResult<Self> {
        let dataset = DatasetFile::open(&path, false)?;
        let info = AcquisitionsInfo::new(dataset.read_header()?);
        Ok(Self::from_parts(info, Arc::new(dataset), path.as_ref().to_path_buf(), false, scratch_dir))
    }

    /// Creates a dataset file at `path` holding only `info`. The file
    /// outlives the container.
    pub fn create<P : AsRef<Path>>(path : P, info : AcquisitionsInfo) -> MrResult<Self> {
        let dataset = DatasetFile::open(&path, true)?;
        dataset.write_header(info.as_str())?;
        let scratch_dir = path.as_ref().parent().map(Path::to_path_buf);
        Ok(Self::from_parts(
            info, Arc::new(dataset), path.as_ref().to_path_buf(), false, scratch_dir.as_deref()
        ))
    }

    /// Creates a temporary dataset file in `dir` (or the OS temp dir),
    /// owned by the container.
    pub fn scratch(info : AcquisitionsInfo, dir : Option<&Path>) -> MrResult<Self> {
        let path = scratch_file_name(dir);
        let dataset = DatasetFile::open(&path, true)?;
        dataset.write_header(info.as_str())?;
        Ok(Self::from_parts(info, Arc::new(dataset), path, true, dir))
    }

    pub fn with_verbose(mut self, verbose : bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owns_file(&self) -> bool {
        self.own_file
    }

    /// An empty scratch container with the same header.
    pub fn new_acquisitions_container(&self) -> MrResult<Self> {
        Ok(Self::scratch(self.info.clone(), self.scratch_dir.as_deref())?.with_verbose(self.verbose))
    }

    /// Adopts the storage, header and ordering of `donor`.
    ///
    /// If this container owned its file, that file is removed first.
    /// Ownership of the donor's file moves here and the donor is left
    /// non-owning, so only one of the two will ever delete it.
    pub fn take_over(&mut self, donor : &mut AcquisitionsFile) {
        self.info = donor.info.clone();
        self.ordered = donor.ordered;
        self.index = if donor.ordered { donor.index.clone() } else { None };
        self.storage = Arc::clone(&donor.storage);
        if self.own_file {
            self.remove_file();
        }
        self.path = donor.path.clone();
        self.own_file = donor.own_file;
        donor.own_file = false;
    }

    fn remove_file(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => report!(self.verbose, "acquisitions", "removed {}", self.path.display()),
            Err(err) => report!(
                self.verbose, "acquisitions", "could not remove {}: {}", self.path.display(), err
            ),
        }
    }

    /// Writes the header and the acquisitions in logical order.
    pub fn write(&self, storage : &dyn Storage) -> MrResult<()> {
        write_container(self, storage)
    }
}

impl Drop for AcquisitionsFile {
    fn drop(&mut self) {
        if self.own_file {
            self.remove_file();
        }
    }
}

impl AcquisitionsContainer for AcquisitionsFile {
    fn acquisitions_info(&self) -> &AcquisitionsInfo {
        &self.info
    }

    fn set_acquisitions_info(&mut self, info : AcquisitionsInfo) -> MrResult<()> {
        self.storage.write_header(info.as_str())?;
        self.info = info;
        Ok(())
    }

    fn number(&self) -> MrResult<usize> {
        self.storage.acquisition_count()
    }

    fn read_physical(&self, num : usize) -> MrResult<Acquisition> {
        self.storage.read_acquisition(num)
    }

    fn append_acquisition(&mut self, acq : &Acquisition) -> MrResult<()> {
        let n = self.storage.acquisition_count()?;
        self.storage.append_acquisition(acq)?;
        if let Some(index) = self.index.as_mut() {
            index.push(n);
        }
        Ok(())
    }

    fn ordered(&self) -> bool {
        self.ordered
    }

    fn set_ordered(&mut self, ordered : bool) {
        self.ordered = ordered;
    }

    fn index(&self) -> Option<&[usize]> {
        self.index.as_deref()
    }

    fn set_index(&mut self, index : Option<Vec<usize>>) {
        self.index = index;
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    /// Writes the rewritten acquisitions, in logical order, to a fresh
    /// scratch file and takes it over.
    fn set_acquisitions_data(
        &mut self,
        na : usize,
        nc : usize,
        ns : usize,
        data : &[Complex32],
    ) -> MrResult<()> {
        let rewritten = rewritten_acquisitions(self, na, nc, ns, data)?;
        let mut fresh = self.new_acquisitions_container()?;
        for acq in rewritten.iter() {
            fresh.append_acquisition(acq)?;
        }
        fresh.set_ordered(self.ordered);
        if fresh.number()? != rewritten.len() {
            return Err(MrError::Format(format!(
                "scratch file {} holds {} of {} acquisitions",
                fresh.path.display(), fresh.number()?, rewritten.len()
            )));
        }
        self.take_over(&mut fresh);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::DataContainer;
    use crate::data::AcquisitionFlag;

    fn filled(info : AcquisitionsInfo, n : u16) -> AcquisitionsFile {
        let mut acqs = AcquisitionsFile::scratch(info, None).unwrap();
        for y in (0..n).rev() {
            let mut acq = Acquisition::zeros(4, 2);
            acq.idx_mut().kspace_encode_step_1 = y;
            acq.data_mut().fill(Complex32::new(y as f32, 1.0));
            acqs.append_acquisition(&acq).unwrap();
        }
        acqs
    }

    #[test]
    fn scratch_file_is_removed_on_drop() {
        let acqs = filled(AcquisitionsInfo::new("hdr"), 2);
        let path = acqs.path().to_path_buf();
        assert!(path.exists());
        assert!(acqs.owns_file());
        drop(acqs);
        assert!(!path.exists());
    }

    #[test]
    fn created_file_is_kept() {
        let path = scratch_file_name(None);
        {
            let mut acqs = AcquisitionsFile::create(&path, AcquisitionsInfo::new("hdr")).unwrap();
            acqs.append_acquisition(&Acquisition::zeros(2, 1)).unwrap();
        }
        let acqs = AcquisitionsFile::open(&path, None).unwrap();
        assert_eq!(acqs.acquisitions_info().as_str(), "hdr");
        assert_eq!(acqs.number().unwrap(), 1);
        drop(acqs);
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn take_over_moves_ownership() {
        let mut a = filled(AcquisitionsInfo::new("a"), 2);
        let mut b = filled(AcquisitionsInfo::new("b"), 3);
        b.order().unwrap();
        let (a_path, b_path) = (a.path().to_path_buf(), b.path().to_path_buf());

        a.take_over(&mut b);
        assert!(!a_path.exists());
        assert_eq!(a.path(), b_path.as_path());
        assert!(a.owns_file());
        assert!(!b.owns_file());
        assert_eq!(a.acquisitions_info().as_str(), "b");
        assert_eq!(a.index(), Some(&[2usize, 1, 0][..]));

        drop(b);
        assert!(b_path.exists());
        assert_eq!(a.get_acquisition(0).unwrap().idx().kspace_encode_step_1, 0);
        drop(a);
        assert!(!b_path.exists());
    }

    #[test]
    fn append_after_order_keeps_the_order() {
        let mut acqs = filled(AcquisitionsInfo::new("hdr"), 3);
        acqs.order().unwrap();
        let mut late = Acquisition::zeros(4, 2);
        late.idx_mut().kspace_encode_step_1 = 9;
        acqs.append_acquisition(&late).unwrap();

        assert!(acqs.ordered());
        assert_eq!(acqs.index(), Some(&[2usize, 1, 0, 3][..]));
        assert_eq!(acqs.get_acquisition(0).unwrap().idx().kspace_encode_step_1, 0);
        assert_eq!(acqs.get_acquisition(3).unwrap().idx().kspace_encode_step_1, 9);
    }

    #[test]
    fn set_data_replaces_the_file() {
        let mut acqs = filled(AcquisitionsInfo::new("hdr"), 3);
        let mut noise = Acquisition::zeros(4, 2);
        noise.set_flag(AcquisitionFlag::IsNoiseMeasurement);
        acqs.append_acquisition(&noise).unwrap();
        acqs.order().unwrap();
        let old_path = acqs.path().to_path_buf();

        let data : Vec<_> = (0..24).map(|i| Complex32::new(i as f32, -1.0)).collect();
        acqs.set_acquisitions_data(3, 2, 4, &data).unwrap();

        assert!(!old_path.exists());
        assert!(acqs.owns_file());
        assert!(acqs.ordered());
        assert_eq!(acqs.number().unwrap(), 4);
        assert_eq!(acqs.acquisitions_info().as_str(), "hdr");
        let (n, back) = acqs.get_acquisitions_data(None).unwrap();
        assert_eq!(n, 3);
        assert_eq!(back, data);
    }

    #[test]
    fn new_like_is_an_empty_scratch_file() {
        let acqs = filled(AcquisitionsInfo::new("hdr"), 1);
        let like = acqs.new_like().unwrap();
        assert_eq!(like.items().unwrap(), 0);
        assert!(like.owns_file());
        assert_ne!(like.path(), acqs.path());
        assert_eq!(like.acquisitions_info().as_str(), "hdr");
    }
}
