use inode_store::RESERVED_SECTORS;
use sector_dev::{SectorDevice, SectorId, SECTOR_SIZE};

use super::Bitmap;
use crate::{FsError, Result};

/// 位图前的定长字段所占字节数
const BITMAP_OFFSET: usize = 20;
/// 位图尾部必须装进 0 号扇区，这就是可跟踪数据块数的上限
pub const BITMAP_CAP: usize = SECTOR_SIZE - BITMAP_OFFSET;

/// 超级块：
/// - 全局布局参数的唯一权威；
/// - 尾部内嵌数据块位图。
///
/// 0 号扇区的布局，所有整数均为**小端** u32：
///
/// | 偏移 | 字段 |
/// |------|------|
/// | 0    | total_blocks |
/// | 4    | block_size |
/// | 8    | sector_init，目录数据的首扇区 |
/// | 12   | bitmap_size |
/// | 16   | root_block，目录内容所在的首个数据块 |
/// | 20   | bitmap，每块一字节 |
///
/// 不变式：`bitmap_size == total_blocks - root_block`，
/// 其中 `root_block` 即保留区（超级块 + inode 表）折算的块数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// 文件系统占据的总块数
    pub total_blocks: u32,
    /// 块大小（字节），必须是扇区大小的整倍数
    pub block_size: u32,
    /// 目录数据的首扇区（= `root_block * 每块扇区数`）
    pub sector_init: u32,
    /// 目录内容所在的块
    pub root_block: u32,
    pub bitmap: Bitmap,
}

impl SuperBlock {
    /// 格式化时按设备容量与块大小推导布局
    pub fn format_layout(device_bytes: u64, block_size: u32) -> Result<Self> {
        if block_size == 0 || block_size as usize % SECTOR_SIZE != 0 {
            return Err(FsError::BadGeometry);
        }
        let sectors_per_block = block_size / SECTOR_SIZE as u32;
        let total_blocks = (device_bytes / u64::from(block_size)) as u32;
        // 保留区 = 超级块 + inode 表，折算成整块
        let reserved_blocks = (RESERVED_SECTORS as u32).div_ceil(sectors_per_block);
        if total_blocks <= reserved_blocks {
            return Err(FsError::BadGeometry);
        }
        let bitmap_size = total_blocks - reserved_blocks;
        if bitmap_size as usize > BITMAP_CAP {
            return Err(FsError::BadGeometry);
        }

        let root_block = reserved_blocks;
        let mut bitmap = Bitmap::new(root_block, bitmap_size as usize);
        // 目录锚块在格式化时即占用
        bitmap.mark_allocated(root_block)?;

        Ok(Self {
            total_blocks,
            block_size,
            sector_init: root_block * sectors_per_block,
            root_block,
            bitmap,
        })
    }

    #[inline]
    pub fn sectors_per_block(&self) -> usize {
        self.block_size as usize / SECTOR_SIZE
    }

    /// 块的首扇区
    #[inline]
    pub fn block_first_sector(&self, block: u32) -> SectorId {
        SectorId::new(block as usize * self.sectors_per_block())
    }

    pub fn decode(raw: &[u8; SECTOR_SIZE]) -> Result<Self> {
        if raw.iter().all(|&b| b == 0) {
            return Err(FsError::NotFormatted);
        }

        let u32_at = |off: usize| u32::from_le_bytes(raw[off..off + 4].try_into().unwrap());
        let total_blocks = u32_at(0);
        let block_size = u32_at(4);
        let sector_init = u32_at(8);
        let bitmap_size = u32_at(12);
        let root_block = u32_at(16);

        // 结构校验：任何一条不满足都视为未格式化
        if block_size == 0 || block_size as usize % SECTOR_SIZE != 0 {
            return Err(FsError::NotFormatted);
        }
        let sectors_per_block = block_size / SECTOR_SIZE as u32;
        if bitmap_size == 0
            || bitmap_size as usize > BITMAP_CAP
            || root_block == 0
            || bitmap_size != total_blocks.wrapping_sub(root_block)
            || sector_init != root_block * sectors_per_block
        {
            return Err(FsError::NotFormatted);
        }

        let bitmap = Bitmap::from_bytes(
            root_block,
            &raw[BITMAP_OFFSET..BITMAP_OFFSET + bitmap_size as usize],
        );
        // 锚块必须在位
        if !bitmap.is_allocated(root_block)? {
            return Err(FsError::NotFormatted);
        }

        Ok(Self {
            total_blocks,
            block_size,
            sector_init,
            root_block,
            bitmap,
        })
    }

    pub fn encode(&self, raw: &mut [u8; SECTOR_SIZE]) {
        raw.fill(0);
        raw[0..4].copy_from_slice(&self.total_blocks.to_le_bytes());
        raw[4..8].copy_from_slice(&self.block_size.to_le_bytes());
        raw[8..12].copy_from_slice(&self.sector_init.to_le_bytes());
        raw[12..16].copy_from_slice(&(self.bitmap.len() as u32).to_le_bytes());
        raw[16..20].copy_from_slice(&self.root_block.to_le_bytes());
        raw[BITMAP_OFFSET..BITMAP_OFFSET + self.bitmap.len()]
            .copy_from_slice(self.bitmap.as_bytes());
    }

    pub fn load(dev: &dyn SectorDevice) -> Result<Self> {
        let mut raw = [0u8; SECTOR_SIZE];
        dev.read_sector(SectorId::new(0), &mut raw)?;
        Self::decode(&raw)
    }

    /// 每次结构性修改（分配、释放、目录增长）之后都要调用，
    /// 写穿而非写回：本格式没有日志可恢复脏位图。
    pub fn persist(&self, dev: &dyn SectorDevice) -> Result<()> {
        let mut raw = [0u8; SECTOR_SIZE];
        self.encode(&mut raw);
        dev.write_sector(SectorId::new(0), &raw)?;
        Ok(())
    }
}
