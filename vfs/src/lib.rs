//! # 虚拟文件系统分发层
//!
//! 具体文件系统通过 [`register`] 把自己的操作表挂进槽位表，
//! 调用方按槽位或 `fsid` 找到操作表再分发请求。
//!
//! 边界约定：所有操作跨过本层时只以整数汇报结果，
//! 任何内部错误都坍缩为 `-1`，原因只能通过日志旁路观察。

#![no_std]

extern crate alloc;

mod dirent;
mod ops;

pub use self::{
    dirent::DirEntry,
    ops::{register, registered, FileSystemOps, MAX_FILESYSTEMS},
};
