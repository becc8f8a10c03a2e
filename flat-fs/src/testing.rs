//! 测试用的内存扇区设备

use alloc::vec;
use alloc::vec::Vec;

use sector_dev::{DiskError, SectorDevice, SectorId, SECTOR_SIZE};
use spin::Mutex;

pub(crate) struct RamDisk {
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(sectors: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; sectors * SECTOR_SIZE]),
        }
    }
}

impl SectorDevice for RamDisk {
    fn read_sector(&self, sector: SectorId, buf: &mut [u8]) -> Result<(), DiskError> {
        let start = sector.raw() * SECTOR_SIZE;
        let data = self.data.lock();
        if start + SECTOR_SIZE > data.len() {
            return Err(DiskError::OutOfRange);
        }
        buf.copy_from_slice(&data[start..start + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&self, sector: SectorId, buf: &[u8]) -> Result<(), DiskError> {
        let start = sector.raw() * SECTOR_SIZE;
        let mut data = self.data.lock();
        if start + SECTOR_SIZE > data.len() {
            return Err(DiskError::OutOfRange);
        }
        data[start..start + SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn sector_count(&self) -> usize {
        self.data.lock().len() / SECTOR_SIZE
    }
}
