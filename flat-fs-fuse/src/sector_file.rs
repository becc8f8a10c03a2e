use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use sector_dev::{DiskError, SectorDevice, SectorId, SECTOR_SIZE};
use send_wrapper::SendWrapper;

/// Disk image backed by a host file, one sector per [`SECTOR_SIZE`] slice.
#[derive(Debug)]
pub struct SectorFile {
    inner: SendWrapper<RefCell<File>>,
    sectors: usize,
}

impl SectorFile {
    pub fn new(fd: File) -> std::io::Result<Self> {
        let sectors = fd.metadata()?.len() as usize / SECTOR_SIZE;
        Ok(Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            sectors,
        })
    }
}

impl SectorDevice for SectorFile {
    fn read_sector(&self, sector: SectorId, buf: &mut [u8]) -> Result<(), DiskError> {
        if sector.raw() >= self.sectors {
            return Err(DiskError::OutOfRange);
        }
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((sector.raw() * SECTOR_SIZE) as u64))
            .map_err(|_| DiskError::Io)?;
        file.read_exact(buf).map_err(|_| DiskError::Io)
    }

    fn write_sector(&self, sector: SectorId, buf: &[u8]) -> Result<(), DiskError> {
        if sector.raw() >= self.sectors {
            return Err(DiskError::OutOfRange);
        }
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((sector.raw() * SECTOR_SIZE) as u64))
            .map_err(|_| DiskError::Io)?;
        file.write_all(buf).map_err(|_| DiskError::Io)
    }

    fn sector_count(&self) -> usize {
        self.sectors
    }
}
