//! # flat-fs
//!
//! 位于扇区设备之上、虚拟文件系统分发层之下的扁平单目录文件系统。
//!
//! 磁盘线性布局：
//! 超级块（0 号扇区，尾部内嵌数据块位图）| inode 表 | 数据块区域
//!
//! 自上而下的分层：
//!
//! 1. 分发门面：操作表注册与 `-1` 哨兵边界      | `facade`
//! 2. 会话层：挂载缓存、打开文件表、读写编排    | `session`
//! 3. 目录层：根目录的内存表与长度前缀编码      | `dir`
//! 4. 磁盘数据结构层：超级块、位图、目录项      | `layout`
//! 5. 索引节点存储层：定长记录表                | `inode-store`
//! 6. 扇区设备驱动层                            | `sector-dev`

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// 根目录的内存表
mod dir;

mod error;

// 分发层门面
mod facade;

// 打开文件表
mod fd;

// 磁盘数据结构层
mod layout;

// 会话层
mod session;

pub use self::{
    error::{FsError, Result},
    facade::FlatFsHandle,
    fd::{DescKind, ModeFlag},
    layout::{Bitmap, DirEntry, SuperBlock},
    session::FlatFs,
};
pub use inode_store::{InodeKind, MAX_INODES, ROOT_INODE};

/// 打开文件表的槽位数，描述符取值 `1..=MAX_OPEN_FILES`
pub const MAX_OPEN_FILES: usize = 16;

/// 目录项名字的最大长度（字节）
pub const NAME_MAX: usize = 255;

#[cfg(test)]
pub(crate) mod testing;
