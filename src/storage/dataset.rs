//! `DatasetFile`: an append-only record file implementing [`Storage`].
//!
//! On open the record headers are scanned once to index acquisitions
//! and images; payloads are only read on request. Rewriting the header
//! appends a new header record, and the last one wins.

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Cursor, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use binrw::{BinRead, BinWrite};

use super::{
    records::{
        AcquisitionRecord,
        HeaderRecord,
        ImageRecord,
        ImageTag,
        Preamble,
        RecordHeader,
        RecordKind,
        FORMAT_VERSION,
        RECORD_HEADER_SIZE,
    },
    Storage,
};
use crate::{
    data::{Acquisition, Image},
    error::{MrError, MrResult},
};

/// Offsets of everything in the file, plus the open handle. Existing
/// files are opened read-only until the first write.
struct DatasetIndex {
    file : File,
    writable : bool,
    header : String,
    acquisitions : Vec<u64>,
    images : HashMap<String, Vec<u64>>,
    end : u64,
}

impl DatasetIndex {
    /// Reads the preamble and every record header.
    fn scan(mut file : File, writable : bool) -> MrResult<Self> {
        let len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        let preamble = Preamble::read(&mut file)?;
        if preamble.version != FORMAT_VERSION {
            return Err(MrError::Format(
                format!("unsupported dataset version {}", preamble.version)
            ));
        }

        let mut index = DatasetIndex {
            header : String::new(),
            acquisitions : Vec::new(),
            images : HashMap::new(),
            end : 0,
            file,
            writable,
        };

        let mut pos = index.file.stream_position()?;
        while pos + RECORD_HEADER_SIZE <= len {
            let record = RecordHeader::read(&mut index.file)?;
            let payload = pos + RECORD_HEADER_SIZE;
            let end = payload.checked_add(record.length)
                .filter(|&end| end <= len)
                .ok_or_else(|| MrError::Format(
                    format!("record at byte {} runs past the end of the file", pos)
                ))?;
            match RecordKind::from_code(record.kind) {
                Some(RecordKind::Header) => {
                    let text = HeaderRecord::read(&mut index.file)?.text;
                    index.header = String::from_utf8(text)
                        .map_err(|err| MrError::Format(err.to_string()))?;
                },
                Some(RecordKind::Acquisition) => index.acquisitions.push(payload),
                Some(RecordKind::Image) => {
                    let tag = ImageTag::read(&mut index.file)?.tag;
                    let tag = String::from_utf8(tag)
                        .map_err(|err| MrError::Format(err.to_string()))?;
                    index.images.entry(tag).or_default().push(payload);
                },
                None => {
                    return Err(MrError::Format(
                        format!("unknown record kind {} at byte {}", record.kind, pos)
                    ));
                },
            }
            pos = end;
            index.file.seek(SeekFrom::Start(pos))?;
        }
        index.end = pos;
        Ok(index)
    }

    /// Swaps the read-only handle for a read-write one.
    fn make_writable(&mut self, path : &Path) -> MrResult<()> {
        if !self.writable {
            self.file = OpenOptions::new().read(true).write(true).open(path)?;
            self.writable = true;
        }
        Ok(())
    }

    /// Serializes `payload` and appends it as one record.
    fn append<T>(&mut self, path : &Path, kind : RecordKind, payload : &T) -> MrResult<u64>
        where T : for<'a> BinWrite<Args<'a> = ()> + binrw::meta::WriteEndian {
        self.make_writable(path)?;
        let mut buffer = Cursor::new(Vec::new());
        payload.write(&mut buffer)?;
        let bytes = buffer.into_inner();

        self.file.seek(SeekFrom::Start(self.end))?;
        RecordHeader { kind : kind as u8, length : bytes.len() as u64 }.write(&mut self.file)?;
        std::io::Write::write_all(&mut self.file, &bytes)?;

        let payload_pos = self.end + RECORD_HEADER_SIZE;
        self.end = payload_pos + bytes.len() as u64;
        Ok(payload_pos)
    }

    fn read_at<T>(&mut self, pos : u64) -> MrResult<T>
        where T : for<'a> BinRead<Args<'a> = ()> + binrw::meta::ReadEndian {
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(T::read(&mut self.file)?)
    }
}

/// A dataset file on disk. Each call takes the dataset's own lock for
/// its whole duration.
pub struct DatasetFile {
    path : PathBuf,
    index : Mutex<DatasetIndex>,
}

impl DatasetFile {
    /// Opens a dataset file
    ///
    /// ## Arguments
    ///
    /// * `path` - Where the file lives
    ///
    /// * `create` - If true, a new empty dataset is created (replacing
    /// any file at `path`); otherwise an existing dataset is opened
    /// read-only, and reopened for writing on the first write.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let dataset = DatasetFile::open("scan.mrd", false)?;
    /// println!("{} readouts", dataset.acquisition_count()?);
    /// ```
    pub fn open<P : AsRef<Path>>(path : P, create : bool) -> MrResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = if create {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            Preamble { version : FORMAT_VERSION }.write(&mut file)?;
            file
        } else {
            OpenOptions::new().read(true).open(&path)
                .map_err(|err| match err.kind() {
                    std::io::ErrorKind::NotFound => MrError::NotFound(
                        format!("dataset file {}", path.display())
                    ),
                    _ => MrError::Io(err),
                })?
        };
        Ok(DatasetFile {
            index : Mutex::new(DatasetIndex::scan(file, create)?),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MrResult<MutexGuard<'_, DatasetIndex>> {
        Ok(self.index.lock()?)
    }

    /// Every image tag present in the file.
    pub fn image_tags(&self) -> MrResult<Vec<String>> {
        let mut tags : Vec<String> = self.lock()?.images.keys().cloned().collect();
        tags.sort();
        Ok(tags)
    }
}

impl Storage for DatasetFile {
    fn read_header(&self) -> MrResult<String> {
        Ok(self.lock()?.header.clone())
    }

    fn write_header(&self, header : &str) -> MrResult<()> {
        let mut index = self.lock()?;
        index.append(&self.path, RecordKind::Header, &HeaderRecord { text : header.as_bytes().to_vec() })?;
        index.header = header.to_string();
        Ok(())
    }

    fn acquisition_count(&self) -> MrResult<usize> {
        Ok(self.lock()?.acquisitions.len())
    }

    fn read_acquisition(&self, num : usize) -> MrResult<Acquisition> {
        let mut index = self.lock()?;
        let pos = *index.acquisitions.get(num).ok_or_else(|| MrError::NotFound(
            format!("acquisition {} of {} in {}", num, index.acquisitions.len(), self.path.display())
        ))?;
        index.read_at::<AcquisitionRecord>(pos)?.try_into()
    }

    fn append_acquisition(&self, acq : &Acquisition) -> MrResult<()> {
        let mut index = self.lock()?;
        let pos = index.append(&self.path, RecordKind::Acquisition, &AcquisitionRecord::from(acq))?;
        index.acquisitions.push(pos);
        Ok(())
    }

    fn image_count(&self, tag : &str) -> MrResult<usize> {
        Ok(self.lock()?.images.get(tag).map(Vec::len).unwrap_or(0))
    }

    fn read_image(&self, tag : &str, num : usize) -> MrResult<Image> {
        let mut index = self.lock()?;
        let pos = index.images.get(tag)
            .and_then(|positions| positions.get(num).copied())
            .ok_or_else(|| MrError::NotFound(format!("image {} with tag '{}'", num, tag)))?;
        index.read_at::<ImageRecord>(pos)?.into_image()
    }

    fn write_image(&self, tag : &str, image : &Image) -> MrResult<()> {
        let record = ImageRecord::from_image(tag, image)?;
        let mut index = self.lock()?;
        let pos = index.append(&self.path, RecordKind::Image, &record)?;
        index.images.entry(tag.to_string()).or_default().push(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AcquisitionFlag, ImageData, ImageKind};
    use crate::utils::scratch_file_name;
    use num_complex::Complex32;

    struct Scratch(PathBuf);

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let path = scratch_file_name(None);
        assert!(matches!(DatasetFile::open(&path, false), Err(MrError::NotFound(_))));
    }

    #[test]
    fn reopen_sees_everything() {
        let scratch = Scratch(scratch_file_name(None));
        {
            let dataset = DatasetFile::open(&scratch.0, true).unwrap();
            dataset.write_header("first").unwrap();
            for i in 0..3 {
                let mut acq = Acquisition::zeros(4, 2);
                acq.idx_mut().kspace_encode_step_1 = i;
                acq.data_mut().fill(Complex32::new(i as f32, 1.0));
                dataset.append_acquisition(&acq).unwrap();
            }
            dataset.write_header("second").unwrap();
            let img = Image::new(ImageData::zeros(ImageKind::Real64, &[3, 3]));
            dataset.write_image("csm", &img).unwrap();
            dataset.write_image("other", &img).unwrap();
            dataset.write_image("csm", &img).unwrap();
        }

        let dataset = DatasetFile::open(&scratch.0, false).unwrap();
        assert_eq!(dataset.read_header().unwrap(), "second");
        assert_eq!(dataset.acquisition_count().unwrap(), 3);
        let acq = dataset.read_acquisition(2).unwrap();
        assert_eq!(acq.idx().kspace_encode_step_1, 2);
        assert_eq!(acq.sample(3, 1), Complex32::new(2.0, 1.0));
        assert_eq!(dataset.image_count("csm").unwrap(), 2);
        assert_eq!(dataset.image_count("missing").unwrap(), 0);
        assert_eq!(dataset.image_tags().unwrap(), vec!["csm".to_string(), "other".to_string()]);
        assert_eq!(dataset.read_image("other", 0).unwrap().shape(), &[3, 3]);
    }

    #[test]
    fn out_of_range_reads_are_not_found() {
        let scratch = Scratch(scratch_file_name(None));
        let dataset = DatasetFile::open(&scratch.0, true).unwrap();
        let mut acq = Acquisition::zeros(2, 1);
        acq.set_flag(AcquisitionFlag::LastInSlice);
        dataset.append_acquisition(&acq).unwrap();
        assert!(matches!(dataset.read_acquisition(1), Err(MrError::NotFound(_))));
        assert!(matches!(dataset.read_image("csm", 0), Err(MrError::NotFound(_))));
        assert_eq!(dataset.read_acquisition(0).unwrap(), acq);
    }

    #[test]
    fn read_only_file_opens_and_reads() {
        let scratch = Scratch(scratch_file_name(None));
        {
            let dataset = DatasetFile::open(&scratch.0, true).unwrap();
            dataset.write_header("archived").unwrap();
            dataset.append_acquisition(&Acquisition::zeros(4, 2)).unwrap();
        }
        let mut perms = std::fs::metadata(&scratch.0).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&scratch.0, perms.clone()).unwrap();

        let opened = DatasetFile::open(&scratch.0, false);
        perms.set_readonly(false);
        std::fs::set_permissions(&scratch.0, perms).unwrap();

        let dataset = opened.unwrap();
        assert_eq!(dataset.read_header().unwrap(), "archived");
        assert_eq!(dataset.read_acquisition(0).unwrap(), Acquisition::zeros(4, 2));
    }

    #[test]
    fn first_write_reopens_for_writing() {
        let scratch = Scratch(scratch_file_name(None));
        drop(DatasetFile::open(&scratch.0, true).unwrap());

        let dataset = DatasetFile::open(&scratch.0, false).unwrap();
        dataset.write_header("later").unwrap();
        dataset.append_acquisition(&Acquisition::zeros(2, 1)).unwrap();
        assert_eq!(dataset.acquisition_count().unwrap(), 1);
        drop(dataset);

        let dataset = DatasetFile::open(&scratch.0, false).unwrap();
        assert_eq!(dataset.read_header().unwrap(), "later");
        assert_eq!(dataset.acquisition_count().unwrap(), 1);
    }

    #[test]
    fn huge_record_length_is_format_error() {
        let scratch = Scratch(scratch_file_name(None));
        {
            let mut file = File::create(&scratch.0).unwrap();
            Preamble { version : FORMAT_VERSION }.write(&mut file).unwrap();
            RecordHeader { kind : RecordKind::Acquisition as u8, length : u64::MAX }
                .write(&mut file).unwrap();
        }
        assert!(matches!(DatasetFile::open(&scratch.0, false), Err(MrError::Format(_))));
    }

    #[test]
    fn shared_between_threads() {
        let scratch = Scratch(scratch_file_name(None));
        let dataset = std::sync::Arc::new(DatasetFile::open(&scratch.0, true).unwrap());
        let (threads, per_thread) = (4u32, 25u32);

        let workers : Vec<_> = (0..threads).map(|t| {
            let dataset = std::sync::Arc::clone(&dataset);
            std::thread::spawn(move || {
                for i in 0..per_thread {
                    let counter = t * per_thread + i;
                    let mut acq = Acquisition::zeros(8, 2);
                    acq.head_mut().scan_counter = counter;
                    acq.data_mut().fill(Complex32::new(counter as f32, -(t as f32)));
                    dataset.append_acquisition(&acq).unwrap();
                    let seen = dataset.acquisition_count().unwrap();
                    dataset.read_acquisition(seen - 1).unwrap();
                }
            })
        }).collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let total = (threads * per_thread) as usize;
        assert_eq!(dataset.acquisition_count().unwrap(), total);
        let mut counters : Vec<u32> = (0..total).map(|a| {
            let acq = dataset.read_acquisition(a).unwrap();
            let counter = acq.head().scan_counter;
            let t = counter / per_thread;
            assert!(acq.data().iter().all(|&v| v == Complex32::new(counter as f32, -(t as f32))));
            counter
        }).collect();
        counters.sort();
        assert_eq!(counters, (0..threads * per_thread).collect::<Vec<_>>());

        drop(dataset);
        assert_eq!(DatasetFile::open(&scratch.0, false).unwrap().acquisition_count().unwrap(), total);
    }

    #[test]
    fn truncated_file_is_format_error() {
        let scratch = Scratch(scratch_file_name(None));
        {
            let dataset = DatasetFile::open(&scratch.0, true).unwrap();
            dataset.append_acquisition(&Acquisition::zeros(8, 2)).unwrap();
        }
        let len = std::fs::metadata(&scratch.0).unwrap().len();
        let file = OpenOptions::new().write(true).open(&scratch.0).unwrap();
        file.set_len(len - 4).unwrap();
        drop(file);
        assert!(matches!(DatasetFile::open(&scratch.0, false), Err(MrError::Format(_))));
    }
}
