//! Byte sources the container reader pulls from
//!
//! A source is read front to back in chunks. The only repositioning the
//! analyzer ever needs is "start over", used when restarting a session.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

/// A readable byte stream that can be reopened from its beginning
pub trait ByteSource: Read {
    /// Reposition the source at its first byte
    fn reopen(&mut self) -> Result<()>;

    /// Human-readable name used in logs and titles
    fn name(&self) -> String {
        "<memory>".to_string()
    }
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    fn reopen(&mut self) -> Result<()> {
        self.set_position(0);
        Ok(())
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn reopen(&mut self) -> Result<()> {
        (**self).reopen()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// File-backed byte source
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
}

impl FileSource {
    /// Open a file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            Error::invalid_input(format!("Could not open '{}': {}", path.display(), e))
        })?;
        Ok(FileSource { path, file })
    }

    /// Path this source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl ByteSource for FileSource {
    fn reopen(&mut self) -> Result<()> {
        self.file = File::open(&self.path)?;
        Ok(())
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}
