//! Positional whole-page reads and writes, plus the small adapter the
//! free-list chain uses to read and write its own structural pages.

use crate::errors::DiskError;
use freelist::{FreeListError, FreeListResult, PageIo};
use page::{Page, PageId, PAGE_SIZE};
use std::fs::File;

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

#[inline]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    #[cfg(unix)]
    {
        file.read_at(buf, offset)
    }
    #[cfg(windows)]
    {
        file.seek_read(buf, offset)
    }
}

#[inline]
fn write_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    #[cfg(unix)]
    {
        file.write_at(buf, offset)
    }
    #[cfg(windows)]
    {
        file.seek_write(buf, offset)
    }
}

/// Reads exactly one page's worth of bytes at `id`'s offset. A short read
/// (file not yet grown to cover this offset) is tolerated by
/// [`Page::deserialize`], which treats it as a fresh empty `Data` page.
pub fn read_page_at(file: &File, id: PageId) -> Result<Page, DiskError> {
    let offset = id.byte_offset(PAGE_SIZE);
    let mut buf = vec![0u8; PAGE_SIZE];
    let n = read_at(file, &mut buf, offset)?;
    buf.truncate(n);
    Ok(Page::deserialize(&buf, id)?)
}

/// Writes a full page at its own id's offset, retrying until all
/// [`PAGE_SIZE`] bytes have landed.
pub fn write_page_at(file: &File, page: &Page) -> Result<(), DiskError> {
    let bytes = page.serialize();
    let offset = page.id().byte_offset(PAGE_SIZE);
    let mut written = 0usize;
    while written < PAGE_SIZE {
        let n = write_at(file, &bytes[written..], offset + written as u64)?;
        if n == 0 {
            return Err(DiskError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "disk write returned 0 bytes",
            )));
        }
        written += n;
    }
    Ok(())
}

/// Adapts a plain [`File`] to the free-list chain's narrow I/O trait.
pub struct FileIo<'a> {
    pub file: &'a File,
}

impl PageIo for FileIo<'_> {
    fn read_raw(&self, id: PageId) -> FreeListResult<Page> {
        read_page_at(self.file, id).map_err(|e| FreeListError::Io(e.to_string()))
    }

    fn write_raw(&self, page: &Page) -> FreeListResult<()> {
        write_page_at(self.file, page).map_err(|e| FreeListError::Io(e.to_string()))
    }
}
