use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::DirEntry;

/// 可注册的文件系统个数上限
pub const MAX_FILESYSTEMS: usize = 8;

static REGISTRY: Mutex<Vec<Arc<dyn FileSystemOps>>> = Mutex::new(Vec::new());

/// 文件系统操作表。
///
/// 镜像原生分发接口的形状：描述符与结果都是小整数，
/// `0`/负数保留作错误哨兵，文件描述符从 `1` 起。
pub trait FileSystemOps: Send + Sync {
    /// 文件系统标识字节
    fn fsid(&self) -> u8;

    fn fsname(&self) -> &str;

    /// 当前是否没有任何打开的描述符
    fn is_idle(&self) -> bool;

    /// 格式化，成功返回总块数，失败返回 `-1`
    fn format(&self, block_size: u32) -> i32;

    /// 打开（不存在则创建），成功返回描述符(>=1)，失败返回 `-1`
    fn open(&self, path: &str) -> i32;

    /// 成功返回读出的字节数，失败返回 `-1`
    fn read(&self, fd: i32, buf: &mut [u8]) -> i32;

    /// 成功返回写入的字节数，失败返回 `-1`
    fn write(&self, fd: i32, buf: &[u8]) -> i32;

    /// 成功返回 `0`，失败返回 `-1`
    fn close(&self, fd: i32) -> i32;

    /// 打开目录，成功返回描述符(>=1)，失败返回 `-1`
    fn open_dir(&self, path: &str) -> i32;

    /// 读出游标处的一个目录项并前进游标。
    /// 读到返回 `1`，目录结束返回 `0`，失败返回 `-1`。
    fn read_dir(&self, fd: i32, entry: &mut DirEntry) -> i32;

    /// 在描述符指向的目录里为既有 inode 添加一个名字，
    /// 成功返回 `0`，失败返回 `-1`
    fn link(&self, fd: i32, name: &str, inode: u32) -> i32;

    /// 从描述符指向的目录里移除一个名字，
    /// 成功返回 `0`，失败返回 `-1`
    fn unlink(&self, fd: i32, name: &str) -> i32;

    /// 成功返回 `0`，失败返回 `-1`
    fn close_dir(&self, fd: i32) -> i32;
}

/// 注册一个文件系统，返回其槽位；槽位用尽或 `fsid` 冲突时返回空。
pub fn register(fs: Arc<dyn FileSystemOps>) -> Option<usize> {
    let mut registry = REGISTRY.lock();
    if registry.len() == MAX_FILESYSTEMS || registry.iter().any(|r| r.fsid() == fs.fsid()) {
        return None;
    }
    registry.push(fs);
    Some(registry.len() - 1)
}

/// 按 `fsid` 取回已注册的文件系统
pub fn registered(fsid: u8) -> Option<Arc<dyn FileSystemOps>> {
    REGISTRY.lock().iter().find(|r| r.fsid() == fsid).cloned()
}
