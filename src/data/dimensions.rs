//! Code in this submodule deals strictly with the regular grid shape
//! of a collection of readouts and with how that shape degrades when
//! the readouts are not regular.

use std::borrow::Borrow;

use crate::data::acquisition::{Acquisition, AcquisitionFlag};

/// `AcquisitionsDimensions` is the inferred grid shape of a collection
/// of acquisitions.
///
/// `rank` counts the leading dimensions that are regular across
/// slices, in the fixed order samples, channels, lines-per-slice.
/// `dims` holds those `rank` sizes followed by one trailing count: how
/// many regular groups of that size fit into the regular readout data.
///
/// A rank below 3 is how irregular data is reported; it is never an
/// error.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct AcquisitionsDimensions {
    pub rank : usize,
    pub dims : Vec<usize>,
}

impl AcquisitionsDimensions {
    /// The regular dimensions, without the trailing count.
    pub fn regular(&self) -> &[usize] {
        &self.dims[..self.rank]
    }

    /// The trailing "how many groups" count.
    pub fn groups(&self) -> usize {
        self.dims[self.rank]
    }

    pub fn is_fully_regular(&self) -> bool {
        self.rank == 3
    }
}

/// Accumulates readouts slice by slice and applies the
/// rank-degradation policy.
///
/// Start optimistic at 3 (or 2 when slices cannot be told apart).
/// Any sample-count change drops to at most 2, any channel-count change
/// to at most 1, and a lines-per-slice change drops 3 to 2.
#[derive(Debug)]
pub(crate) struct DimensionsScan {
    rank : usize,
    regular_units : usize,
    slice : usize,
    first : Option<(usize, usize)>,
    lines_first : usize,
    lines : usize,
}

impl DimensionsScan {
    pub fn new(ordered : bool) -> Self {
        DimensionsScan {
            rank : if ordered { 3 } else { 2 },
            regular_units : 0,
            slice : 0,
            first : None,
            lines_first : 0,
            lines : 0,
        }
    }

    /// Records one regular readout of the current slice.
    pub fn readout(&mut self, ns : usize, nc : usize) {
        self.regular_units += ns * nc;
        if self.slice == 0 {
            self.first = Some((ns, nc));
        } else if let Some((ms, mc)) = self.first {
            if ms != ns {
                self.rank = self.rank.min(2);
            }
            if mc != nc {
                self.rank = self.rank.min(1);
            }
        }
        self.lines += 1;
    }

    /// Closes the current slice.
    pub fn end_slice(&mut self) {
        if self.slice == 0 {
            self.lines_first = self.lines;
        } else if self.lines != self.lines_first && self.rank > 2 {
            self.rank = 2;
        }
        self.lines = 0;
        self.slice += 1;
    }

    pub fn finish(self) -> AcquisitionsDimensions {
        let (ms, mc) = self.first.unwrap_or((0, 0));
        let regular = [ms, mc, self.lines_first];
        let mut dims : Vec<usize> = regular[..self.rank].to_vec();
        let reg_size : usize = dims.iter().product();
        dims.push(if reg_size == 0 { 0 } else { self.regular_units / reg_size });
        AcquisitionsDimensions { rank : self.rank, dims }
    }
}

/// Infers the grid shape of `acqs` (already in logical order).
///
/// When `ordered` is true, slices are delimited by the first/last-in-slice
/// flags: readouts before a first-in-slice flag are skipped and a
/// last-in-slice flag closes the slice. Otherwise the whole collection
/// is a single slice. Ignored readouts never count.
pub fn infer_dimensions<I>(acqs : I, ordered : bool) -> AcquisitionsDimensions
    where I : IntoIterator,
    I::Item : Borrow<Acquisition> {
    let mut scan = DimensionsScan::new(ordered);
    let mut in_slice = !ordered;
    let mut open = false;
    for acq in acqs {
        let acq : &Acquisition = acq.borrow();
        if !in_slice {
            if !acq.is_flag_set(AcquisitionFlag::FirstInSlice) {
                continue;
            }
            in_slice = true;
        }
        open = true;
        if acq.to_be_ignored() {
            continue;
        }
        scan.readout(acq.number_of_samples(), acq.active_channels());
        if ordered && acq.is_flag_set(AcquisitionFlag::LastInSlice) {
            scan.end_slice();
            in_slice = false;
            open = false;
        }
    }
    if open {
        scan.end_slice();
    }
    scan.finish()
}
