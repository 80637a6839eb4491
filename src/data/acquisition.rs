//! A single k-space readout across all active receive channels.
//!
//! The header layout mirrors the standard raw-data acquisition header
//! closely enough that flag numbers and encoding counters carry the same
//! meaning, and it is what gets written to storage by `binrw`.

use binrw::binrw;
use ndarray::prelude::*;
use num_complex::Complex32;

use crate::error::{MrError, MrResult};

/// Acquisition flags, numbered the usual way: flag `n` lives in
/// bit `n - 1` of the 64-bit flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AcquisitionFlag {
    FirstInEncodeStep1 = 1,
    LastInEncodeStep1 = 2,
    FirstInEncodeStep2 = 3,
    LastInEncodeStep2 = 4,
    FirstInAverage = 5,
    LastInAverage = 6,
    FirstInSlice = 7,
    LastInSlice = 8,
    FirstInContrast = 9,
    LastInContrast = 10,
    FirstInPhase = 11,
    LastInPhase = 12,
    FirstInRepetition = 13,
    LastInRepetition = 14,
    FirstInSet = 15,
    LastInSet = 16,
    FirstInSegment = 17,
    LastInSegment = 18,
    IsNoiseMeasurement = 19,
    IsParallelCalibration = 20,
    IsParallelCalibrationAndImaging = 21,
    IsReverse = 22,
    IsNavigationData = 23,
    IsPhasecorrData = 24,
    LastInMeasurement = 25,
    IsHpFeedbackData = 26,
    IsDummyscanData = 27,
    IsRtFeedbackData = 28,
    IsSurfaceCoilCorrectionScanData = 29,
}

impl AcquisitionFlag {
    pub fn bit(self) -> u64 {
        1u64 << (self as u8 - 1)
    }
}

/// Set of [`AcquisitionFlag`]s stored as the raw flags word.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquisitionFlags(u64);

impl AcquisitionFlags {
    pub fn from_bits(bits : u64) -> Self {
        AcquisitionFlags(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn is_set(&self, flag : AcquisitionFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn set(&mut self, flag : AcquisitionFlag) {
        self.0 |= flag.bit();
    }

    pub fn clear(&mut self, flag : AcquisitionFlag) {
        self.0 &= !flag.bit();
    }

    pub fn clear_all(&mut self) {
        self.0 = 0;
    }
}

impl FromIterator<AcquisitionFlag> for AcquisitionFlags {
    fn from_iter<I : IntoIterator<Item = AcquisitionFlag>>(iter : I) -> Self {
        let mut flags = AcquisitionFlags::default();
        iter.into_iter().for_each(|flag| flags.set(flag));
        flags
    }
}

/// Position of a readout within the acquisition loops.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodingCounters {
    pub kspace_encode_step_1 : u16,
    pub kspace_encode_step_2 : u16,
    pub average : u16,
    pub slice : u16,
    pub contrast : u16,
    pub phase : u16,
    pub repetition : u16,
    pub set : u16,
    pub segment : u16,
}

/// Fixed-size metadata of an acquisition.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquisitionHeader {
    pub version : u16,
    pub flags : AcquisitionFlags,
    pub scan_counter : u32,
    pub number_of_samples : u16,
    pub active_channels : u16,
    pub center_sample : u16,
    pub idx : EncodingCounters,
}

/// One readout: `number_of_samples` complex samples for each of
/// `active_channels` channels, held as a `[channel, sample]` array.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    head : AcquisitionHeader,
    data : Array2<Complex32>,
}

impl Acquisition {
    /// A zero-filled acquisition with the given shape.
    pub fn zeros(number_of_samples : u16, active_channels : u16) -> Self {
        let head = AcquisitionHeader {
            number_of_samples,
            active_channels,
            center_sample : number_of_samples / 2,
            ..Default::default()
        };
        Acquisition {
            head,
            data : Array2::zeros((active_channels as usize, number_of_samples as usize)),
        }
    }

    /// Builds an acquisition from a header and its samples laid out
    /// channel-major (samples fastest).
    ///
    /// ## Errors
    ///
    /// * `MrError::DimensionMismatch` - if `samples` does not hold
    /// exactly `number_of_samples * active_channels` values
    pub fn from_samples(head : AcquisitionHeader, samples : Vec<Complex32>) -> MrResult<Self> {
        let shape = (head.active_channels as usize, head.number_of_samples as usize);
        if samples.len() != shape.0 * shape.1 {
            return Err(MrError::mismatch(shape.0 * shape.1, samples.len()));
        }
        let data = Array2::from_shape_vec(shape, samples)
            .map_err(|err| MrError::Format(err.to_string()))?;
        Ok(Acquisition { head, data })
    }

    pub fn head(&self) -> &AcquisitionHeader {
        &self.head
    }

    pub fn head_mut(&mut self) -> &mut AcquisitionHeader {
        &mut self.head
    }

    pub fn number_of_samples(&self) -> usize {
        self.head.number_of_samples as usize
    }

    pub fn active_channels(&self) -> usize {
        self.head.active_channels as usize
    }

    /// `(samples, channels)`
    pub fn shape(&self) -> (usize, usize) {
        (self.number_of_samples(), self.active_channels())
    }

    pub fn flags(&self) -> AcquisitionFlags {
        self.head.flags
    }

    pub fn is_flag_set(&self, flag : AcquisitionFlag) -> bool {
        self.head.flags.is_set(flag)
    }

    pub fn set_flag(&mut self, flag : AcquisitionFlag) {
        self.head.flags.set(flag);
    }

    pub fn idx(&self) -> &EncodingCounters {
        &self.head.idx
    }

    pub fn idx_mut(&mut self) -> &mut EncodingCounters {
        &mut self.head.idx
    }

    /// Sample `s` of channel `c`.
    pub fn sample(&self, s : usize, c : usize) -> Complex32 {
        self.data[[c, s]]
    }

    /// `[channel, sample]` view of the readout.
    pub fn data(&self) -> ArrayView2<Complex32> {
        self.data.view()
    }

    pub fn data_mut(&mut self) -> ArrayViewMut2<Complex32> {
        self.data.view_mut()
    }

    /// Samples in storage order: channel-major, samples fastest.
    pub fn samples(&self) -> Vec<Complex32> {
        self.data.iter().copied().collect()
    }

    /// True for readouts that are not regular imaging data (noise,
    /// navigators, calibration-only, ...), which all vector-space
    /// operations skip. Calibration readouts that are also used for
    /// imaging are kept.
    pub fn to_be_ignored(&self) -> bool {
        !self.is_flag_set(AcquisitionFlag::IsParallelCalibrationAndImaging)
            && self.head.flags.bits() >= AcquisitionFlag::IsNoiseMeasurement.bit()
    }

    fn check_shape(&self, other : &Acquisition) -> MrResult<()> {
        if self.shape() != other.shape() {
            return Err(MrError::mismatch(
                format!("{:?} (samples, channels)", self.shape()),
                format!("{:?}", other.shape()),
            ));
        }
        Ok(())
    }

    /// Conjugate-linear inner product `sum(conj(other) * self)`.
    pub fn dot(&self, other : &Acquisition) -> MrResult<Complex32> {
        self.check_shape(other)?;
        Ok(self.data.iter()
            .zip(other.data.iter())
            .fold(Complex32::new(0.0, 0.0), |z, (a, b)| z + b.conj() * a))
    }

    pub fn norm(&self) -> f32 {
        self.data.iter().map(|z| z.norm_sqr()).sum::<f32>().sqrt()
    }

    /// `a * x + b * y`, keeping the header of `x`. When `b` is zero
    /// the samples of `y` are never read.
    pub fn axpby(a : Complex32, x : &Acquisition, b : Complex32, y : &Acquisition)
        -> MrResult<Acquisition> {
        let mut out = x.clone();
        if b == Complex32::new(0.0, 0.0) {
            out.data.mapv_inplace(|v| a * v);
        } else {
            x.check_shape(y)?;
            out.data.zip_mut_with(&y.data, |v, w| *v = a * *v + b * *w);
        }
        Ok(out)
    }

    /// Relative residual of `self` after removing its best complex
    /// multiple of `other`:
    /// `|self - z * other| / |self|`, with `z = <self, other> / |other|^2`.
    pub fn diff(&self, other : &Acquisition) -> f32 {
        let (mut sa, mut sb) = (0.0f32, 0.0f32);
        let mut z = Complex32::new(0.0, 0.0);
        self.data.iter().zip(other.data.iter()).for_each(|(a, b)| {
            sa += a.norm_sqr();
            sb += b.norm_sqr();
            z += b.conj() * a;
        });
        z /= sb;
        let s = self.data.iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b * z).norm_sqr())
            .sum::<f32>()
            .sqrt();
        s / sa.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(ns : u16, nc : u16, scale : f32) -> Acquisition {
        let mut acq = Acquisition::zeros(ns, nc);
        acq.data_mut().indexed_iter_mut().for_each(|((c, s), v)| {
            *v = Complex32::new(scale * (s as f32 + 1.0), c as f32);
        });
        acq
    }

    #[test]
    fn flag_numbering() {
        let mut flags = AcquisitionFlags::default();
        flags.set(AcquisitionFlag::FirstInSlice);
        assert_eq!(flags.bits(), 1 << 6);
        assert!(flags.is_set(AcquisitionFlag::FirstInSlice));
        assert!(!flags.is_set(AcquisitionFlag::LastInSlice));
        flags.clear(AcquisitionFlag::FirstInSlice);
        assert_eq!(flags.bits(), 0);
    }

    #[test]
    fn ignore_rule() {
        let mut acq = Acquisition::zeros(4, 2);
        acq.set_flag(AcquisitionFlag::LastInSlice);
        assert!(!acq.to_be_ignored());

        acq.set_flag(AcquisitionFlag::IsNoiseMeasurement);
        assert!(acq.to_be_ignored());

        let mut calib = Acquisition::zeros(4, 2);
        calib.set_flag(AcquisitionFlag::IsParallelCalibration);
        assert!(calib.to_be_ignored());
        calib.set_flag(AcquisitionFlag::IsParallelCalibrationAndImaging);
        assert!(!calib.to_be_ignored());
    }

    #[test]
    fn samples_are_channel_major() {
        let acq = ramp(3, 2, 1.0);
        let samples = acq.samples();
        assert_eq!(samples.len(), 6);
        assert_eq!(samples[1], acq.sample(1, 0));
        assert_eq!(samples[4], acq.sample(1, 1));
        let back = Acquisition::from_samples(*acq.head(), samples).unwrap();
        assert_eq!(back, acq);
    }

    #[test]
    fn from_samples_checks_length() {
        let head = *Acquisition::zeros(3, 2).head();
        let err = Acquisition::from_samples(head, vec![Complex32::new(0.0, 0.0); 5]);
        assert!(matches!(err, Err(MrError::DimensionMismatch { .. })));
    }

    #[test]
    fn norm_matches_dot() {
        let acq = ramp(8, 4, 0.5);
        let dot = acq.dot(&acq).unwrap();
        assert!((acq.norm() - dot.re.sqrt()).abs() < 1e-4);
        assert!(dot.im.abs() < 1e-4);
    }

    #[test]
    fn dot_rejects_other_shapes() {
        let a = ramp(8, 4, 1.0);
        let b = ramp(8, 2, 1.0);
        assert!(matches!(a.dot(&b), Err(MrError::DimensionMismatch { .. })));
    }

    #[test]
    fn axpby_with_zero_b_ignores_y() {
        let x = ramp(4, 2, 1.0);
        let mut y = Acquisition::zeros(3, 1);
        y.data_mut().fill(Complex32::new(f32::NAN, f32::NAN));
        let z = Acquisition::axpby(
            Complex32::new(1.0, 0.0), &x, Complex32::new(0.0, 0.0), &y
        ).unwrap();
        assert_eq!(z, x);
    }

    #[test]
    fn axpby_combines() {
        let x = ramp(4, 2, 1.0);
        let y = ramp(4, 2, 2.0);
        let z = Acquisition::axpby(
            Complex32::new(2.0, 0.0), &x, Complex32::new(-1.0, 0.0), &y
        ).unwrap();
        z.data().indexed_iter().for_each(|((c, _), v)| {
            assert!(v.re.abs() < 1e-6);
            assert!((v.im - c as f32).abs() < 1e-6);
        });
    }

    #[test]
    fn diff_of_scaled_copy_is_zero() {
        let x = ramp(8, 2, 1.0);
        let mut y = x.clone();
        y.data_mut().mapv_inplace(|v| v * Complex32::new(0.0, 3.0));
        assert!(x.diff(&y) < 1e-5);
    }
}
