//! # 会话层
//!
//! [`FlatFs`] 是一台设备的全部易变状态：
//! 超级块与位图的内存缓存、根目录表、打开文件表。
//! 缓存首次访问时惰性建立（格式化或第一次打开），
//! 之后不再隐式重读磁盘，外部改动只能通过 [`FlatFs::remount`] 观察到。
//!
//! 持久化纪律：结构性修改（分配、释放、目录增长）在
//! 同一次调用内写穿到盘面；一旦某条路径上写穿失败，
//! 整个缓存作废，下次操作从盘面重建，内存状态绝不领先磁盘
//! 跨过调用边界。

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;

use inode_store::{Inode, InodeKind, ROOT_INODE};
use sector_dev::{SectorDevice, SectorId, SECTOR_SIZE};

use crate::dir::Directory;
use crate::fd::{DescKind, FdTable, FileDesc, ModeFlag};
use crate::layout::{validate_name, DirEntry, SuperBlock};
use crate::{FsError, Result};

pub struct FlatFs {
    dev: Arc<dyn SectorDevice>,
    mounted: Option<Mounted>,
    fds: FdTable,
}

/// 挂载后驻留内存的磁盘状态
#[derive(Debug)]
struct Mounted {
    sb: SuperBlock,
    dir: Directory,
}

impl FlatFs {
    pub fn new(dev: Arc<dyn SectorDevice>) -> Self {
        Self {
            dev,
            mounted: None,
            fds: FdTable::default(),
        }
    }

    /// 格式化：清空设备、推导布局、建 inode 表与空根目录，
    /// 最后把组装好的超级块写进 0 号扇区。
    /// 成功返回总块数。
    pub fn format(&mut self, block_size: u32) -> Result<u32> {
        let dev = self.dev.clone();

        let zeros = [0u8; SECTOR_SIZE];
        for sector in 0..dev.sector_count() {
            dev.write_sector(SectorId::new(sector), &zeros)?;
        }

        let mut sb = SuperBlock::format_layout(dev.byte_size(), block_size)?;
        inode_store::create_all(&*dev)?;

        // 根目录：1 号 inode，目录锚块就是它的首个数据块
        let mut root = Inode::new(ROOT_INODE, InodeKind::Directory);
        root.add_block(sb.root_block)?;
        inode_store::save(&*dev, &root)?;

        sb.persist(&*dev)?;
        log::debug!("formatted: {} blocks * {} B", sb.total_blocks, block_size);

        let total = sb.total_blocks;
        // 旧描述符指向的都是被抹掉的世界
        self.fds = FdTable::default();
        self.mounted = Some(Mounted {
            sb,
            dir: Directory::empty(),
        });
        Ok(total)
    }

    /// 惰性挂载：读超级块，再经根 inode 的块表取回目录流
    fn ensure_mounted(&mut self) -> Result<()> {
        if self.mounted.is_some() {
            return Ok(());
        }

        let dev = self.dev.clone();
        let sb = SuperBlock::load(&*dev)?;
        let root = inode_store::load(&*dev, ROOT_INODE)?;
        if root.kind != InodeKind::Directory {
            return Err(FsError::CorruptDirectory);
        }
        let mut raw = vec![0u8; root.size as usize];
        read_at(&*dev, &sb, &root, 0, &mut raw)?;
        let dir = Directory::decode_stream(&raw, root.entries)?;

        log::debug!(
            "mounted: {} entries, {}/{} blocks free",
            dir.len(),
            sb.bitmap.free_count(),
            sb.bitmap.len()
        );
        self.mounted = Some(Mounted { sb, dir });
        Ok(())
    }

    /// 丢弃缓存并从盘面重建
    pub fn remount(&mut self) -> Result<()> {
        self.mounted = None;
        self.ensure_mounted()
    }

    pub fn is_idle(&self) -> bool {
        self.fds.is_idle()
    }

    pub fn superblock(&self) -> Option<&SuperBlock> {
        self.mounted.as_ref().map(|m| &m.sb)
    }

    /// 打开（不存在则创建）一个普通文件，返回描述符
    pub fn open(&mut self, path: &str) -> Result<i32> {
        self.ensure_mounted()?;
        let name = basename(path)?;
        let canonical = format!("/{name}");
        if self.fds.is_open(&canonical) {
            return Err(FsError::AlreadyOpen);
        }
        // 槽位先行检查，免得建完文件才发现表满
        if !self.fds.has_free_slot() {
            return Err(FsError::TooManyOpenFiles);
        }

        let dev = self.dev.clone();
        let number = match self.mounted.as_ref().unwrap().dir.lookup(name) {
            Some(number) => {
                let node = inode_store::load(&*dev, number)?;
                match node.kind {
                    InodeKind::Regular => number,
                    InodeKind::Directory => return Err(FsError::IsDirectory),
                    InodeKind::Free => return Err(FsError::CorruptDirectory),
                }
            }
            None => {
                validate_name(name)?;
                let number = inode_store::find_free(&*dev, 2)?;
                inode_store::save(&*dev, &Inode::new(number, InodeKind::Regular))?;
                self.mounted
                    .as_mut()
                    .unwrap()
                    .dir
                    .insert(DirEntry::new(number, name)?)?;
                if let Err(e) = self.flush_dir() {
                    // 目录没写穿：作废缓存，顺手收回刚建的 inode
                    self.mounted = None;
                    if let Ok(mut node) = inode_store::load(&*dev, number) {
                        node.clear();
                        let _ = inode_store::save(&*dev, &node);
                    }
                    return Err(e);
                }
                log::debug!("created {canonical} as inode {number}");
                number
            }
        };

        self.fds.open(FileDesc {
            path: canonical,
            inode: number,
            mode: ModeFlag::Read | ModeFlag::Write,
            kind: DescKind::File,
            cursor: 0,
        })
    }

    /// 从描述符游标处顺序读，至多 `buf.len()` 字节，
    /// 绝不越过文件的实际存储长度
    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize> {
        self.ensure_mounted()?;
        let (number, cursor) = {
            let desc = self.fds.get(fd, DescKind::File)?;
            (desc.inode, desc.cursor)
        };

        let dev = self.dev.clone();
        let node = inode_store::load(&*dev, number)?;
        let n = read_at(&*dev, &self.mounted.as_ref().unwrap().sb, &node, cursor, buf)?;
        self.fds.get(fd, DescKind::File)?.cursor += n;
        Ok(n)
    }

    /// 从描述符游标处顺序写，按需经位图扩展块表；
    /// 返回实际持久化的字节数
    pub fn write(&mut self, fd: i32, buf: &[u8]) -> Result<usize> {
        self.ensure_mounted()?;
        let (number, cursor) = {
            let desc = self.fds.get(fd, DescKind::File)?;
            (desc.inode, desc.cursor)
        };

        let dev = self.dev.clone();
        let mut node = inode_store::load(&*dev, number)?;
        let m = self.mounted.as_mut().unwrap();
        let result = write_at(&*dev, &mut m.sb, &mut node, cursor, buf).and_then(|n| {
            inode_store::save(&*dev, &node)?;
            m.sb.persist(&*dev)?;
            Ok(n)
        });
        match result {
            Ok(n) => {
                self.fds.get(fd, DescKind::File)?.cursor += n;
                Ok(n)
            }
            Err(e) => {
                // 位图缓存可能已领先盘面，作废待重建
                self.mounted = None;
                Err(e)
            }
        }
    }

    pub fn close(&mut self, fd: i32) -> Result<()> {
        self.fds.close(fd, DescKind::File).map(drop)
    }

    /// 打开目录。扁平结构里只有根目录可开。
    pub fn open_dir(&mut self, path: &str) -> Result<i32> {
        self.ensure_mounted()?;
        let rest = path.strip_prefix('/').unwrap_or(path);
        if !rest.is_empty() {
            return Err(match self.mounted.as_ref().unwrap().dir.lookup(rest) {
                Some(_) => FsError::NotDirectory,
                None => FsError::NotFound,
            });
        }

        self.fds.open(FileDesc {
            path: String::from("/"),
            inode: ROOT_INODE,
            mode: ModeFlag::Read | ModeFlag::Write,
            kind: DescKind::Directory,
            cursor: 0,
        })
    }

    /// 读出游标处的目录项并前进；目录走完返回空
    pub fn read_dir(&mut self, fd: i32) -> Result<Option<vfs::DirEntry>> {
        self.ensure_mounted()?;
        let m = self.mounted.as_ref().unwrap();
        let desc = self.fds.get(fd, DescKind::Directory)?;
        match m.dir.get(desc.cursor) {
            Some(entry) => {
                desc.cursor += 1;
                Ok(Some(vfs::DirEntry {
                    inode: entry.inode,
                    name: entry.name.clone(),
                }))
            }
            None => Ok(None),
        }
    }

    /// 在打开的目录下为既有 inode 添一个名字（硬链接）
    pub fn link(&mut self, fd: i32, name: &str, inode: u32) -> Result<()> {
        self.ensure_mounted()?;
        self.fds.get(fd, DescKind::Directory)?;
        validate_name(name)?;

        let dev = self.dev.clone();
        let mut target = inode_store::load(&*dev, inode)?;
        match target.kind {
            InodeKind::Regular => {}
            InodeKind::Directory => return Err(FsError::IsDirectory),
            InodeKind::Free => return Err(FsError::NotFound),
        }

        self.mounted
            .as_mut()
            .unwrap()
            .dir
            .insert(DirEntry::new(inode, name)?)?;
        if let Err(e) = self.flush_dir() {
            self.mounted = None;
            return Err(e);
        }

        target.links += 1;
        inode_store::save(&*dev, &target)?;
        Ok(())
    }

    /// 从打开的目录下摘除一个名字；链接数归零时
    /// 归还数据块并抹掉 inode 记录
    pub fn unlink(&mut self, fd: i32, name: &str) -> Result<()> {
        self.ensure_mounted()?;
        self.fds.get(fd, DescKind::Directory)?;
        // 打开中的路径不许解除链接，否则描述符会悬空
        if self.fds.is_open(&format!("/{name}")) {
            return Err(FsError::AlreadyOpen);
        }

        let entry = self.mounted.as_mut().unwrap().dir.remove(name)?;
        if let Err(e) = self.flush_dir() {
            self.mounted = None;
            return Err(e);
        }

        if let Err(e) = self.release_link(entry.inode) {
            self.mounted = None;
            return Err(e);
        }
        Ok(())
    }

    pub fn close_dir(&mut self, fd: i32) -> Result<()> {
        self.fds.close(fd, DescKind::Directory).map(drop)
    }

    /// 目录表写穿：整条记录序列重写回根 inode 的数据区。
    /// 编码没有可安全局部覆盖的定界，只能整体重写。
    fn flush_dir(&mut self) -> Result<()> {
        let dev = self.dev.clone();
        let m = self.mounted.as_mut().unwrap();
        let raw = m.dir.serialize();

        let mut root = inode_store::load(&*dev, ROOT_INODE)?;
        let written = write_at(&*dev, &mut m.sb, &mut root, 0, &raw)?;
        if written < raw.len() {
            return Err(FsError::NoSpace);
        }
        // 删除后回缩到精确长度
        root.size = raw.len() as u32;
        root.entries = m.dir.len() as u32;
        // 先落位图再落根 inode：中途失败至多泄漏块，不会悬空表项
        m.sb.persist(&*dev)?;
        inode_store::save(&*dev, &root)?;
        Ok(())
    }

    fn release_link(&mut self, number: u32) -> Result<()> {
        let dev = self.dev.clone();
        let mut target = inode_store::load(&*dev, number)?;
        target.links = target.links.saturating_sub(1);
        if target.links > 0 {
            return inode_store::save(&*dev, &target).map_err(Into::into);
        }

        let m = self.mounted.as_mut().unwrap();
        for block in target.clear() {
            m.sb.bitmap.mark_free(block)?;
            // 释放即抹零，复用时无需再清
            zero_block(&*dev, &m.sb, block)?;
        }
        inode_store::save(&*dev, &target)?;
        m.sb.persist(&*dev)?;
        Ok(())
    }
}

/// 扁平路径 `/名字` 的规范化
fn basename(path: &str) -> Result<&str> {
    let name = path.strip_prefix('/').unwrap_or(path);
    if name.is_empty() {
        // 根目录本身不是普通文件
        return Err(FsError::IsDirectory);
    }
    if name.contains('/') {
        // 没有多级目录可言
        return Err(FsError::NotFound);
    }
    Ok(name)
}

/// 从 `offset` 起读入 `buf`，截断到 `inode.size`，返回读出的字节数
fn read_at(
    dev: &dyn SectorDevice,
    sb: &SuperBlock,
    inode: &Inode,
    offset: usize,
    buf: &mut [u8],
) -> Result<usize> {
    let end = (offset + buf.len()).min(inode.size as usize);
    if offset >= end {
        return Ok(0);
    }

    let block_size = sb.block_size as usize;
    let mut tmp = [0u8; SECTOR_SIZE];
    let mut pos = offset;
    while pos < end {
        let block = inode
            .block_at(pos / block_size)
            .ok_or(FsError::CorruptDirectory)?;
        let in_block = pos % block_size;
        let sector = sb.block_first_sector(block) + SectorId::new(in_block / SECTOR_SIZE);
        let in_sector = in_block % SECTOR_SIZE;
        let n = (SECTOR_SIZE - in_sector).min(end - pos);

        dev.read_sector(sector, &mut tmp)?;
        buf[pos - offset..pos - offset + n].copy_from_slice(&tmp[in_sector..in_sector + n]);
        pos += n;
    }

    Ok(end - offset)
}

/// 从 `offset` 起写入 `buf`，按需从位图领取新块补进块表。
/// 空间不足时落下能容纳的前缀并返回其长度；
/// 一个字节都容纳不下才报错。
///
/// 只改内存里的 `sb`/`inode`，写穿由调用方负责。
fn write_at(
    dev: &dyn SectorDevice,
    sb: &mut SuperBlock,
    inode: &mut Inode,
    offset: usize,
    buf: &[u8],
) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }

    let block_size = sb.block_size as usize;
    let wanted = offset + buf.len();

    // 补齐块表
    let mut grow_err = None;
    while inode.block_count() < wanted.div_ceil(block_size) {
        let block = match sb.bitmap.find_free() {
            Ok(block) => block,
            Err(e) => {
                grow_err = Some(e);
                break;
            }
        };
        if inode.add_block(block).is_err() {
            grow_err = Some(FsError::FileTooLarge);
            break;
        }
        sb.bitmap.mark_allocated(block)?;
    }

    // 只写进已持有的块
    let end = wanted.min(inode.block_count() * block_size);
    if end <= offset {
        return Err(grow_err.unwrap_or(FsError::NoSpace));
    }

    let mut tmp = [0u8; SECTOR_SIZE];
    let mut pos = offset;
    while pos < end {
        let block = inode
            .block_at(pos / block_size)
            .ok_or(FsError::CorruptDirectory)?;
        let in_block = pos % block_size;
        let sector = sb.block_first_sector(block) + SectorId::new(in_block / SECTOR_SIZE);
        let in_sector = in_block % SECTOR_SIZE;
        let n = (SECTOR_SIZE - in_sector).min(end - pos);

        // 非整扇区覆盖要先读后改
        if n < SECTOR_SIZE {
            dev.read_sector(sector, &mut tmp)?;
        }
        tmp[in_sector..in_sector + n].copy_from_slice(&buf[pos - offset..pos - offset + n]);
        dev.write_sector(sector, &tmp)?;
        pos += n;
    }

    if end as u32 > inode.size {
        inode.size = end as u32;
    }
    Ok(end - offset)
}

fn zero_block(dev: &dyn SectorDevice, sb: &SuperBlock, block: u32) -> Result<()> {
    let zeros = [0u8; SECTOR_SIZE];
    let first = sb.block_first_sector(block);
    for i in 0..sb.sectors_per_block() {
        dev.write_sector(first + SectorId::new(i), &zeros)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RamDisk;

    /// 1 MiB 的内存盘
    fn fresh_fs() -> FlatFs {
        let mut fs = FlatFs::new(Arc::new(RamDisk::new(2048)));
        assert_eq!(fs.format(4096).unwrap(), 256);
        fs
    }

    #[test]
    fn mount_twice_without_mutation_is_identical() {
        let mut fs = fresh_fs();
        let fd = fs.open("/a.txt").unwrap();
        fs.write(fd, b"hello").unwrap();
        fs.close(fd).unwrap();

        fs.remount().unwrap();
        let first = fs.superblock().unwrap().clone();
        let listing_a = listing(&mut fs);

        fs.remount().unwrap();
        assert_eq!(fs.superblock().unwrap(), &first);
        assert_eq!(listing(&mut fs), listing_a);
    }

    #[test]
    fn reopen_binds_the_same_inode() {
        let mut fs = fresh_fs();
        let fd = fs.open("/a.txt").unwrap();
        assert_eq!(fd, 1);
        assert_eq!(fs.open("/a.txt"), Err(FsError::AlreadyOpen));

        fs.close(fd).unwrap();
        let before = listing(&mut fs);
        let fd = fs.open("/a.txt").unwrap();
        fs.close(fd).unwrap();
        // 表项既有，重开不再分配 inode
        assert_eq!(listing(&mut fs), before);
    }

    #[test]
    fn cursor_read_write_roundtrip_across_blocks() {
        let mut fs = fresh_fs();
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let fd = fs.open("/big.bin").unwrap();
        assert_eq!(fs.write(fd, &payload).unwrap(), payload.len());
        fs.close(fd).unwrap();

        let fd = fs.open("/big.bin").unwrap();
        let mut back = vec![0u8; payload.len() + 100];
        // 截断到实际长度，绝不越过末尾
        assert_eq!(fs.read(fd, &mut back).unwrap(), payload.len());
        assert_eq!(&back[..payload.len()], &payload[..]);
        assert_eq!(fs.read(fd, &mut back).unwrap(), 0);
        fs.close(fd).unwrap();
    }

    #[test]
    fn unlink_to_zero_links_returns_blocks() {
        let mut fs = fresh_fs();
        let free0 = fs.superblock().unwrap().bitmap.free_count();

        let fd = fs.open("/tmp.bin").unwrap();
        fs.write(fd, &[7u8; 9000]).unwrap();
        fs.close(fd).unwrap();
        assert!(fs.superblock().unwrap().bitmap.free_count() < free0);

        let dir = fs.open_dir("/").unwrap();
        fs.unlink(dir, "tmp.bin").unwrap();
        fs.close_dir(dir).unwrap();
        assert_eq!(fs.superblock().unwrap().bitmap.free_count(), free0);
    }

    #[test]
    fn link_shares_the_inode() {
        let mut fs = fresh_fs();
        let fd = fs.open("/orig").unwrap();
        fs.write(fd, b"shared").unwrap();
        fs.close(fd).unwrap();

        let dir = fs.open_dir("/").unwrap();
        let orig = fs.read_dir(dir).unwrap().unwrap();
        fs.link(dir, "alias", orig.inode).unwrap();
        fs.close_dir(dir).unwrap();

        let fd = fs.open("/alias").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], b"shared");
        fs.close(fd).unwrap();

        // 还有一个名字，块不能回收
        let dir = fs.open_dir("/").unwrap();
        fs.unlink(dir, "orig").unwrap();
        fs.close_dir(dir).unwrap();
        let fd = fs.open("/alias").unwrap();
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 6);
        fs.close(fd).unwrap();
    }

    #[test]
    fn open_paths_cannot_be_unlinked() {
        let mut fs = fresh_fs();
        let fd = fs.open("/busy").unwrap();
        let dir = fs.open_dir("/").unwrap();
        assert_eq!(fs.unlink(dir, "busy"), Err(FsError::AlreadyOpen));
        fs.close(fd).unwrap();
        fs.unlink(dir, "busy").unwrap();
        fs.close_dir(dir).unwrap();
    }

    fn listing(fs: &mut FlatFs) -> Vec<vfs::DirEntry> {
        let dir = fs.open_dir("/").unwrap();
        let mut out = Vec::new();
        while let Some(entry) = fs.read_dir(dir).unwrap() {
            out.push(entry);
        }
        fs.close_dir(dir).unwrap();
        out
    }
}
