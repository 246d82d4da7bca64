//! A `std::fs::File`-backed [`ByteSource`], the one concrete worked example
//! of the read-side I/O contract (§6). Mirrors the split the teacher draws
//! between `base-io-traits` (the trait) and `base-fs`/`base-io` (a concrete
//! filesystem implementation) — this crate plays the latter role for
//! `archive-device-traits::ByteSource`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use archive_device_traits::ByteSource;

/// Reads archive bytes from a single open file handle, guarded by a mutex
/// since `ByteSource::read` takes `&self` but `File` needs `&mut` to seek.
pub struct FileByteSource {
    file: Mutex<File>,
    size: u64,
}

impl FileByteSource {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(FileByteSource {
            file: Mutex::new(file),
            size,
        })
    }
}

impl ByteSource for FileByteSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_back_bytes_written_at_offset() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 16]).unwrap();
        tmp.write_all(b"hello").unwrap();
        tmp.flush().unwrap();

        let source = FileByteSource::open(tmp.path()).unwrap();
        assert_eq!(source.size(), 21);

        let mut buf = [0u8; 5];
        source.read(16, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn read_past_end_of_file_errors() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let source = FileByteSource::open(tmp.path()).unwrap();
        let mut buf = [0u8; 4];
        assert!(source.read(0, &mut buf).is_err());
    }
}
