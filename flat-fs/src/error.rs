use inode_store::StoreError;
use sector_dev::DiskError;

/// 内部错误分类。
///
/// 每一类都原样返回给直接调用者，绝不自动重试；
/// 只有跨过分发层边界时才坍缩为 `-1`（见 [`crate::facade`]）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// 设备读写失败，当前操作立即终止
    Io,
    /// 0 号扇区全零或字段自相矛盾
    NotFormatted,
    /// 目录流解码与记录的元信息不符
    CorruptDirectory,
    /// 数据块位图耗尽
    NoSpace,
    NoFreeInode,
    AlreadyExists,
    /// 同一路径已被其它描述符打开
    AlreadyOpen,
    NotFound,
    /// 描述符越界或从未打开
    BadDescriptor,
    /// 槽位存在但已关闭
    NotOpen,
    /// 名字为空、超长或含有保留分隔符
    InvalidName,
    TooManyOpenFiles,
    /// 直接块表已满，文件无法继续增长
    FileTooLarge,
    NotDirectory,
    IsDirectory,
    /// 块编号越界，或企图释放目录锚块
    BadGeometry,
}

pub type Result<T> = core::result::Result<T, FsError>;

impl From<DiskError> for FsError {
    fn from(_: DiskError) -> Self {
        Self::Io
    }
}

impl From<StoreError> for FsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Disk(_) => Self::Io,
            StoreError::BadInode => Self::CorruptDirectory,
            StoreError::NoFreeInode => Self::NoFreeInode,
            StoreError::BlockListFull => Self::FileTooLarge,
        }
    }
}
