//! # 分发门面
//!
//! [`FlatFsHandle`] 把一个会话接到虚拟文件系统分发层上。
//! 内部的结构化错误到这里全部坍缩成 `-1` 哨兵，
//! 失败原因只通过 `log::error!` 旁路汇报——这是边界契约的
//! 刻意简化，不是内部分类的简化。

use alloc::string::String;
use alloc::sync::Arc;

use spin::Mutex;

use crate::FlatFs;

pub struct FlatFsHandle {
    fsid: u8,
    name: String,
    session: Arc<Mutex<FlatFs>>,
}

impl FlatFsHandle {
    pub fn new(fsid: u8, name: &str, session: FlatFs) -> Self {
        Self {
            fsid,
            name: String::from(name),
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// 注册进分发层，返回槽位
    pub fn install(self) -> Option<usize> {
        vfs::register(Arc::new(self))
    }

    pub fn session(&self) -> Arc<Mutex<FlatFs>> {
        self.session.clone()
    }
}

impl vfs::FileSystemOps for FlatFsHandle {
    fn fsid(&self) -> u8 {
        self.fsid
    }

    fn fsname(&self) -> &str {
        &self.name
    }

    fn is_idle(&self) -> bool {
        self.session.lock().is_idle()
    }

    fn format(&self, block_size: u32) -> i32 {
        match self.session.lock().format(block_size) {
            Ok(total) => total as i32,
            Err(e) => {
                log::error!("format({block_size}): {e:?}");
                -1
            }
        }
    }

    fn open(&self, path: &str) -> i32 {
        match self.session.lock().open(path) {
            Ok(fd) => fd,
            Err(e) => {
                log::error!("open({path}): {e:?}");
                -1
            }
        }
    }

    fn read(&self, fd: i32, buf: &mut [u8]) -> i32 {
        match self.session.lock().read(fd, buf) {
            Ok(n) => n as i32,
            Err(e) => {
                log::error!("read({fd}): {e:?}");
                -1
            }
        }
    }

    fn write(&self, fd: i32, buf: &[u8]) -> i32 {
        match self.session.lock().write(fd, buf) {
            Ok(n) => n as i32,
            Err(e) => {
                log::error!("write({fd}): {e:?}");
                -1
            }
        }
    }

    fn close(&self, fd: i32) -> i32 {
        match self.session.lock().close(fd) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("close({fd}): {e:?}");
                -1
            }
        }
    }

    fn open_dir(&self, path: &str) -> i32 {
        match self.session.lock().open_dir(path) {
            Ok(fd) => fd,
            Err(e) => {
                log::error!("open_dir({path}): {e:?}");
                -1
            }
        }
    }

    fn read_dir(&self, fd: i32, entry: &mut vfs::DirEntry) -> i32 {
        match self.session.lock().read_dir(fd) {
            Ok(Some(read)) => {
                *entry = read;
                1
            }
            Ok(None) => 0,
            Err(e) => {
                log::error!("read_dir({fd}): {e:?}");
                -1
            }
        }
    }

    fn link(&self, fd: i32, name: &str, inode: u32) -> i32 {
        match self.session.lock().link(fd, name, inode) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("link({fd}, {name}, {inode}): {e:?}");
                -1
            }
        }
    }

    fn unlink(&self, fd: i32, name: &str) -> i32 {
        match self.session.lock().unlink(fd, name) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("unlink({fd}, {name}): {e:?}");
                -1
            }
        }
    }

    fn close_dir(&self, fd: i32) -> i32 {
        match self.session.lock().close_dir(fd) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("close_dir({fd}): {e:?}");
                -1
            }
        }
    }
}
