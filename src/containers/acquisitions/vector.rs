use num_complex::Complex32;

use super::{rewritten_acquisitions, write_container, AcquisitionsContainer};
use crate::{
    data::Acquisition,
    error::{MrError, MrResult},
    header::AcquisitionsInfo,
    storage::Storage,
};

/// Acquisitions held in memory, in the order they were appended.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionsVector {
    info : AcquisitionsInfo,
    acqs : Vec<Acquisition>,
    index : Option<Vec<usize>>,
    ordered : bool,
    verbose : bool,
}

impl AcquisitionsVector {
    pub fn new(info : AcquisitionsInfo) -> Self {
        AcquisitionsVector { info, ..Default::default() }
    }

    pub fn from_acquisitions(info : AcquisitionsInfo, acqs : Vec<Acquisition>) -> Self {
        AcquisitionsVector { info, acqs, ..Default::default() }
    }

    pub fn with_verbose(mut self, verbose : bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Reads the header and every acquisition of `storage`.
    pub fn from_storage(storage : &dyn Storage) -> MrResult<Self> {
        let info = AcquisitionsInfo::new(storage.read_header()?);
        let acqs = (0..storage.acquisition_count()?)
            .map(|a| storage.read_acquisition(a))
            .collect::<MrResult<Vec<_>>>()?;
        Ok(AcquisitionsVector::from_acquisitions(info, acqs))
    }

    /// Copies any container into memory, in its logical order. The
    /// copy keeps the ordered flag but needs no index.
    pub fn from_container<A : AcquisitionsContainer + ?Sized>(other : &A) -> MrResult<Self> {
        let acqs = (0..other.number()?)
            .map(|a| other.get_acquisition(a))
            .collect::<MrResult<Vec<_>>>()?;
        let mut copy = AcquisitionsVector::from_acquisitions(other.acquisitions_info().clone(), acqs);
        copy.ordered = other.ordered();
        copy.verbose = other.verbose();
        Ok(copy)
    }

    /// An empty container with the same header.
    pub fn new_acquisitions_container(&self) -> MrResult<Self> {
        Ok(AcquisitionsVector::new(self.info.clone()).with_verbose(self.verbose))
    }

    /// Writes the header and the acquisitions in logical order.
    pub fn write(&self, storage : &dyn Storage) -> MrResult<()> {
        write_container(self, storage)
    }
}

impl AcquisitionsContainer for AcquisitionsVector {
    fn acquisitions_info(&self) -> &AcquisitionsInfo {
        &self.info
    }

    fn set_acquisitions_info(&mut self, info : AcquisitionsInfo) -> MrResult<()> {
        self.info = info;
        Ok(())
    }

    fn number(&self) -> MrResult<usize> {
        Ok(self.acqs.len())
    }

    fn read_physical(&self, num : usize) -> MrResult<Acquisition> {
        self.acqs.get(num).cloned().ok_or_else(|| MrError::NotFound(
            format!("acquisition {} of {}", num, self.acqs.len())
        ))
    }

    fn append_acquisition(&mut self, acq : &Acquisition) -> MrResult<()> {
        if let Some(index) = self.index.as_mut() {
            index.push(self.acqs.len());
        }
        self.acqs.push(acq.clone());
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

    fn set_acquisitions_data(
        &mut self,
        na : usize,
        nc : usize,
        ns : usize,
        data : &[Complex32],
    ) -> MrResult<()> {
        let rewritten = rewritten_acquisitions(self, na, nc, ns, data)?;
        for (a, acq) in rewritten.into_iter().enumerate() {
            let p = self.physical_index(a)?;
            self.acqs[p] = acq;
        }
        Ok(())
    }
}
