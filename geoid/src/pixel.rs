//! Positioned reads of raster samples from an open geoid file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{GeoidError, Result};
use crate::header::{GeoidHeader, PixelFormat};

/// The raster of an open geoid file.
///
/// Every read seeks to the sample's byte offset, so a file that changes on
/// disk after opening is reported as a read error rather than served stale.
#[derive(Debug)]
pub(crate) struct PixelFile {
    path: PathBuf,
    file: File,
    data_start: u64,
    /// Samples per row.
    stride: u64,
    format: PixelFormat,
}

impl PixelFile {
    pub(crate) fn new(path: &Path, file: File, header: &GeoidHeader) -> Self {
        Self {
            path: path.to_path_buf(),
            file,
            data_start: header.data_start,
            stride: header.width as u64,
            format: header.format,
        }
    }

    fn offset(&self, ix: usize, iy: usize) -> u64 {
        self.data_start + self.format.size() as u64 * (iy as u64 * self.stride + ix as u64)
    }

    fn read_error(&self, source: std::io::Error) -> GeoidError {
        GeoidError::Read {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the sample at column `ix`, row `iy`. Both must already be
    /// inside the grid.
    pub(crate) fn read(&mut self, ix: usize, iy: usize) -> Result<u32> {
        let mut buf = [0u8; 4];
        let size = self.format.size();
        let offset = self.offset(ix, iy);
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut buf[..size]))
            .map_err(|e| self.read_error(e))?;
        Ok(self.format.decode(&buf[..size]))
    }

    /// Read `out.len()` consecutive samples of row `iy` starting at column
    /// `ix`. The run must not cross the end of the row.
    pub(crate) fn read_run(&mut self, ix: usize, iy: usize, out: &mut [u32]) -> Result<()> {
        let size = self.format.size();
        let mut bytes = vec![0u8; out.len() * size];
        let offset = self.offset(ix, iy);
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut bytes))
            .map_err(|e| self.read_error(e))?;
        for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(size)) {
            *value = self.format.decode(chunk);
        }
        Ok(())
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}
