//! # 索引节点存储层
//!
//! 定长 inode 记录表，紧跟在超级块扇区之后：
//! 扇区 `1..=8` 连续存放 [`MAX_INODES`] 条 64 字节记录，
//! 记录按**从 1 起**的编号寻址，1 号保留给根目录。
//!
//! ## 记录的磁盘布局
//!
//! 所有多字节整数均为**小端**：
//!
//! | 偏移 | 字段 |
//! |------|------|
//! | 0    | kind (u8)，0 = 空闲 |
//! | 4    | links (u32)，硬链接个数 |
//! | 8    | entries (u32)，目录的存活项个数 |
//! | 12   | size (u32)，内容字节数 |
//! | 16   | block_count (u32)，块表的有效长度 |
//! | 20   | direct (u32 × 10)，数据块编号表 |
//! | 60   | 保留 |
//!
//! 块表只有直接指针，容量即单文件的块数上限；
//! 记录内容之外的语义（位图、目录编码）由上层负责。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::vec::Vec;

use sector_dev::{DiskError, SectorDevice, SectorId, SECTOR_SIZE};

/// 单条 inode 记录的字节数
pub const INODE_SIZE: usize = 64;
/// 每扇区的记录条数
pub const INODES_PER_SECTOR: usize = SECTOR_SIZE / INODE_SIZE;
/// 记录总数，编号 `1..=MAX_INODES`
pub const MAX_INODES: u32 = 64;
/// inode 表的首扇区（0 号扇区是超级块）
pub const TABLE_FIRST_SECTOR: usize = 1;
/// inode 表占据的扇区数
pub const TABLE_SECTORS: usize = MAX_INODES as usize / INODES_PER_SECTOR;
/// 保留头部的扇区总数：超级块 + inode 表
pub const RESERVED_SECTORS: usize = TABLE_FIRST_SECTOR + TABLE_SECTORS;
/// 直接块指针个数
pub const NUM_DIRECT: usize = 10;

/// 根目录的 inode 编号
pub const ROOT_INODE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    Disk(DiskError),
    /// 编号越界或指向空闲记录
    BadInode,
    NoFreeInode,
    /// 直接块表已满
    BlockListFull,
}

impl From<DiskError> for StoreError {
    fn from(e: DiskError) -> Self {
        Self::Disk(e)
    }
}

pub type Result<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum InodeKind {
    #[default]
    Free = 0,
    Regular = 1,
    Directory = 2,
}

/// 一条驻留内存的 inode 记录；
/// 修改后必须经 [`save`] 写回才算生效。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    number: u32,
    pub kind: InodeKind,
    pub links: u32,
    /// 目录的存活项个数，与 `links` 分立（普通文件恒为 0）
    pub entries: u32,
    pub size: u32,
    block_count: u32,
    direct: [u32; NUM_DIRECT],
}

impl Inode {
    pub fn new(number: u32, kind: InodeKind) -> Self {
        Self {
            number,
            kind,
            links: 1,
            entries: 0,
            size: 0,
            block_count: 0,
            direct: [0; NUM_DIRECT],
        }
    }

    #[inline]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count as usize
    }

    /// 追加一个数据块到块表尾部，返回其表内索引
    pub fn add_block(&mut self, block: u32) -> Result<usize> {
        let index = self.block_count as usize;
        if index == NUM_DIRECT {
            return Err(StoreError::BlockListFull);
        }
        self.direct[index] = block;
        self.block_count += 1;
        Ok(index)
    }

    /// 把块表内索引解析为绝对块编号
    #[inline]
    pub fn block_at(&self, index: usize) -> Option<u32> {
        (index < self.block_count as usize).then(|| self.direct[index])
    }

    pub fn blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.direct[..self.block_count as usize].iter().copied()
    }

    /// 清空记录并交出原先占用的数据块，供上层归还位图
    pub fn clear(&mut self) -> Vec<u32> {
        let freed = self.direct[..self.block_count as usize].to_vec();
        *self = Self {
            number: self.number,
            kind: InodeKind::Free,
            links: 0,
            entries: 0,
            size: 0,
            block_count: 0,
            direct: [0; NUM_DIRECT],
        };
        freed
    }

    fn decode(number: u32, raw: &[u8]) -> Self {
        let u32_at = |off: usize| u32::from_le_bytes(raw[off..off + 4].try_into().unwrap());
        let kind = match raw[0] {
            1 => InodeKind::Regular,
            2 => InodeKind::Directory,
            _ => InodeKind::Free,
        };
        let mut direct = [0u32; NUM_DIRECT];
        for (i, block) in direct.iter_mut().enumerate() {
            *block = u32_at(20 + i * 4);
        }
        Self {
            number,
            kind,
            links: u32_at(4),
            entries: u32_at(8),
            size: u32_at(12),
            block_count: u32_at(16).min(NUM_DIRECT as u32),
            direct,
        }
    }

    fn encode(&self, raw: &mut [u8]) {
        raw[..INODE_SIZE].fill(0);
        raw[0] = self.kind as u8;
        raw[4..8].copy_from_slice(&self.links.to_le_bytes());
        raw[8..12].copy_from_slice(&self.entries.to_le_bytes());
        raw[12..16].copy_from_slice(&self.size.to_le_bytes());
        raw[16..20].copy_from_slice(&self.block_count.to_le_bytes());
        for (i, block) in self.direct.iter().enumerate() {
            raw[20 + i * 4..24 + i * 4].copy_from_slice(&block.to_le_bytes());
        }
    }
}

/// 编号到（扇区，扇区内偏移）的映射
fn locate(number: u32) -> Result<(SectorId, usize)> {
    if number == 0 || number > MAX_INODES {
        return Err(StoreError::BadInode);
    }
    let index = (number - 1) as usize;
    let sector = SectorId::new(TABLE_FIRST_SECTOR + index / INODES_PER_SECTOR);
    Ok((sector, index % INODES_PER_SECTOR * INODE_SIZE))
}

/// 把整张 inode 表清零（格式化时调用一次）
pub fn create_all(dev: &dyn SectorDevice) -> Result<()> {
    let zeros = [0u8; SECTOR_SIZE];
    for sector in TABLE_FIRST_SECTOR..TABLE_FIRST_SECTOR + TABLE_SECTORS {
        dev.write_sector(SectorId::new(sector), &zeros)?;
    }
    Ok(())
}

pub fn load(dev: &dyn SectorDevice, number: u32) -> Result<Inode> {
    let (sector, offset) = locate(number)?;
    let mut buf = [0u8; SECTOR_SIZE];
    dev.read_sector(sector, &mut buf)?;
    Ok(Inode::decode(number, &buf[offset..offset + INODE_SIZE]))
}

pub fn save(dev: &dyn SectorDevice, inode: &Inode) -> Result<()> {
    let (sector, offset) = locate(inode.number)?;
    let mut buf = [0u8; SECTOR_SIZE];
    dev.read_sector(sector, &mut buf)?;
    inode.encode(&mut buf[offset..offset + INODE_SIZE]);
    dev.write_sector(sector, &buf)
        .map_err(StoreError::from)
}

/// 从 `start` 号起寻找第一条空闲记录
pub fn find_free(dev: &dyn SectorDevice, start: u32) -> Result<u32> {
    for number in start.max(1)..=MAX_INODES {
        if load(dev, number)?.kind == InodeKind::Free {
            return Ok(number);
        }
    }
    Err(StoreError::NoFreeInode)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RamDisk {
        sectors: Mutex<Vec<u8>>,
    }

    impl RamDisk {
        fn new(count: usize) -> Self {
            Self {
                sectors: Mutex::new(vec![0; count * SECTOR_SIZE]),
            }
        }
    }

    impl SectorDevice for RamDisk {
        fn read_sector(&self, sector: SectorId, buf: &mut [u8]) -> core::result::Result<(), DiskError> {
            let start = sector.raw() * SECTOR_SIZE;
            let data = self.sectors.lock().unwrap();
            if start + SECTOR_SIZE > data.len() {
                return Err(DiskError::OutOfRange);
            }
            buf.copy_from_slice(&data[start..start + SECTOR_SIZE]);
            Ok(())
        }

        fn write_sector(&self, sector: SectorId, buf: &[u8]) -> core::result::Result<(), DiskError> {
            let start = sector.raw() * SECTOR_SIZE;
            let mut data = self.sectors.lock().unwrap();
            if start + SECTOR_SIZE > data.len() {
                return Err(DiskError::OutOfRange);
            }
            data[start..start + SECTOR_SIZE].copy_from_slice(buf);
            Ok(())
        }

        fn sector_count(&self) -> usize {
            self.sectors.lock().unwrap().len() / SECTOR_SIZE
        }
    }

    #[test]
    fn record_codec_roundtrip() {
        let mut inode = Inode::new(3, InodeKind::Regular);
        inode.size = 4097;
        inode.links = 2;
        inode.add_block(17).unwrap();
        inode.add_block(42).unwrap();

        let mut raw = [0u8; INODE_SIZE];
        inode.encode(&mut raw);
        assert_eq!(Inode::decode(3, &raw), inode);
    }

    #[test]
    fn block_list_append_and_resolve() {
        let mut inode = Inode::new(2, InodeKind::Regular);
        for i in 0..NUM_DIRECT as u32 {
            assert_eq!(inode.add_block(100 + i).unwrap(), i as usize);
        }
        assert_eq!(inode.add_block(999), Err(StoreError::BlockListFull));
        assert_eq!(inode.block_at(0), Some(100));
        assert_eq!(inode.block_at(NUM_DIRECT - 1), Some(109));
        assert_eq!(inode.block_at(NUM_DIRECT), None);
    }

    #[test]
    fn table_load_save_find_free() {
        let disk = RamDisk::new(RESERVED_SECTORS + 1);
        create_all(&disk).unwrap();

        assert_eq!(find_free(&disk, 1).unwrap(), 1);

        let root = Inode::new(ROOT_INODE, InodeKind::Directory);
        save(&disk, &root).unwrap();
        assert_eq!(load(&disk, ROOT_INODE).unwrap(), root);
        assert_eq!(find_free(&disk, 2).unwrap(), 2);

        // 占满全部记录后再找就失败
        for number in 2..=MAX_INODES {
            save(&disk, &Inode::new(number, InodeKind::Regular)).unwrap();
        }
        assert_eq!(find_free(&disk, 1), Err(StoreError::NoFreeInode));
    }

    #[test]
    fn clear_returns_owned_blocks() {
        let mut inode = Inode::new(5, InodeKind::Regular);
        inode.size = 9000;
        inode.add_block(7).unwrap();
        inode.add_block(8).unwrap();

        assert_eq!(inode.clear(), vec![7, 8]);
        assert_eq!(inode.kind, InodeKind::Free);
        assert_eq!(inode.size, 0);
        assert_eq!(inode.block_count(), 0);
    }

    #[test]
    fn bad_numbers_rejected() {
        let disk = RamDisk::new(RESERVED_SECTORS);
        assert_eq!(load(&disk, 0), Err(StoreError::BadInode));
        assert_eq!(load(&disk, MAX_INODES + 1), Err(StoreError::BadInode));
    }
}
