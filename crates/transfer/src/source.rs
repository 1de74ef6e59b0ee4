use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::TransferError;

trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// A seekable, readable, sized byte source for one file item.
///
/// The capability probe (seek to end, measure, rewind) runs once, when the
/// handle is created, so a non-compliant reader is rejected at declaration
/// time rather than mid-upload. Clones share the same cursor.
#[derive(Clone)]
pub struct SourceHandle {
    inner: Arc<Mutex<Box<dyn ReadSeek>>>,
    size: u64,
}

impl SourceHandle {
    /// Wraps any `Read + Seek` value after probing it.
    pub fn new<R>(reader: R) -> Result<Self, TransferError>
    where
        R: Read + Seek + Send + 'static,
    {
        let mut boxed: Box<dyn ReadSeek> = Box::new(reader);
        let size = probe(boxed.as_mut())
            .map_err(|e| TransferError::IoCompliance(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(boxed)),
            size,
        })
    }

    /// Opens a file on disk.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TransferError::NotFound(path.display().to_string()),
            _ => TransferError::Io(e),
        })?;
        if !file.metadata()?.is_file() {
            return Err(TransferError::IoCompliance(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        Self::new(file)
    }

    /// Size measured when the handle was created.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Re-measures the underlying source, leaving the cursor at the start.
    pub fn measure(&self) -> Result<u64, TransferError> {
        let mut inner = self.lock();
        Ok(probe(&mut **inner)?)
    }

    /// Moves the cursor back to the first byte.
    pub fn rewind(&self) -> Result<(), TransferError> {
        self.lock().seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Moves the cursor to `offset`.
    pub fn seek_to(&self, offset: u64) -> Result<(), TransferError> {
        self.lock().seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Reads up to `len` bytes, stopping early only at end of stream.
    ///
    /// Blocking; callers on an async runtime should run this on the
    /// blocking pool.
    pub fn read_up_to(&self, len: usize) -> Result<Vec<u8>, TransferError> {
        let mut inner = self.lock();
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn ReadSeek>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

fn probe(reader: &mut dyn ReadSeek) -> io::Result<u64> {
    let size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    /// A reader whose seek always fails, like a pipe.
    struct Unseekable;

    impl Read for Unseekable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Seek for Unseekable {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "illegal seek"))
        }
    }

    #[test]
    fn cursor_size_is_measured() {
        let src = SourceHandle::new(Cursor::new(b"0123456789".to_vec())).unwrap();
        assert_eq!(src.size(), 10);
        assert_eq!(src.read_up_to(4).unwrap(), b"0123");
    }

    #[test]
    fn unseekable_reader_rejected() {
        let err = SourceHandle::new(Unseekable).unwrap_err();
        assert!(matches!(err, TransferError::IoCompliance(_)));
    }

    #[test]
    fn open_missing_file() {
        let err = SourceHandle::open(Path::new("/nonexistent/courier/file.bin")).unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)));
    }

    #[test]
    fn open_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let err = SourceHandle::open(dir.path()).unwrap_err();
        assert!(matches!(err, TransferError::IoCompliance(_)));
    }

    #[test]
    fn open_file_reports_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[7u8; 1234])
            .unwrap();
        let src = SourceHandle::open(&path).unwrap();
        assert_eq!(src.size(), 1234);
        assert_eq!(src.measure().unwrap(), 1234);
    }

    #[test]
    fn rewind_restarts_reading() {
        let src = SourceHandle::new(Cursor::new(b"abcdef".to_vec())).unwrap();
        assert_eq!(src.read_up_to(3).unwrap(), b"abc");
        src.rewind().unwrap();
        assert_eq!(src.read_up_to(6).unwrap(), b"abcdef");
    }

    #[test]
    fn short_read_at_end_of_stream() {
        let src = SourceHandle::new(Cursor::new(b"xyz".to_vec())).unwrap();
        assert_eq!(src.read_up_to(10).unwrap(), b"xyz");
        assert!(src.read_up_to(10).unwrap().is_empty());
    }

    #[test]
    fn clones_share_cursor() {
        let a = SourceHandle::new(Cursor::new(b"abcdef".to_vec())).unwrap();
        let b = a.clone();
        assert_eq!(a.read_up_to(2).unwrap(), b"ab");
        assert_eq!(b.read_up_to(2).unwrap(), b"cd");
    }
}
