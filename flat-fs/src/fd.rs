//! # 打开文件表
//!
//! 描述符从 `1` 起（`槽位 + 1`），`0` 与负数保留作错误哨兵。
//! 同一路径任意时刻至多被一个槽位占用。

use alloc::string::String;

use enumflags2::{bitflags, BitFlags};

use crate::{FsError, Result, MAX_OPEN_FILES};

/// 描述符的读写属性
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlag {
    Read = 0b01,
    Write = 0b10,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescKind {
    File,
    Directory,
}

#[derive(Debug)]
pub struct FileDesc {
    /// 规范化路径（`/名字`，目录为 `/`）
    pub path: String,
    pub inode: u32,
    pub mode: BitFlags<ModeFlag>,
    pub kind: DescKind,
    /// 文件内字节偏移；目录描述符下是表项索引
    pub cursor: usize,
}

#[derive(Debug, Default)]
pub struct FdTable {
    slots: [Option<FileDesc>; MAX_OPEN_FILES],
}

impl FdTable {
    /// 绑定描述符：路径查重后取编号最小的空槽
    pub fn open(&mut self, desc: FileDesc) -> Result<i32> {
        if self.is_open(&desc.path) {
            return Err(FsError::AlreadyOpen);
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)?;
        self.slots[slot] = Some(desc);
        Ok(slot as i32 + 1)
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|desc| desc.path == path)
    }

    /// 取出描述符并校验其种类
    pub fn get(&mut self, fd: i32, kind: DescKind) -> Result<&mut FileDesc> {
        let desc = self
            .slot(fd)?
            .as_mut()
            .ok_or(FsError::NotOpen)?;
        match (desc.kind, kind) {
            (DescKind::File, DescKind::Directory) => Err(FsError::NotDirectory),
            (DescKind::Directory, DescKind::File) => Err(FsError::IsDirectory),
            _ => Ok(desc),
        }
    }

    /// 清空槽位使其可复用
    pub fn close(&mut self, fd: i32, kind: DescKind) -> Result<FileDesc> {
        // 先做种类校验再取走
        self.get(fd, kind)?;
        Ok(self.slot(fd)?.take().unwrap())
    }

    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn slot(&mut self, fd: i32) -> Result<&mut Option<FileDesc>> {
        if fd < 1 || fd as usize > MAX_OPEN_FILES {
            return Err(FsError::BadDescriptor);
        }
        Ok(&mut self.slots[fd as usize - 1])
    }
}
