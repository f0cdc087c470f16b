use block_dev::DeviceError;
use derive_more::Display;

/// 所有公开操作的错误
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[display(fmt = "{} table is full", _0)]
    TableFull(Table),

    #[display(fmt = "no such file")]
    NotFound,

    #[display(fmt = "file descriptor is already closed")]
    AlreadyClosed,

    /// 位图已无空闲块，或间接索引块的槽位用尽
    #[display(fmt = "no block left to allocate")]
    AllocationExhausted,

    /// 句柄越界、未打开或其文件已被删除
    #[display(fmt = "invalid file descriptor")]
    InvalidHandle,

    #[display(fmt = "file name is too long")]
    NameTooLong,

    /// 空文件名或含有 \0 的文件名
    #[display(fmt = "invalid file name")]
    InvalidName,

    #[display(fmt = "file already exists")]
    AlreadyExists,

    /// 超级块的魔数或块大小不对
    #[display(fmt = "not an sfs volume")]
    InvalidVolume,

    #[display(fmt = "device error: {}", _0)]
    Device(DeviceError),
}

/// 容量固定的表
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    #[display(fmt = "open-file")]
    OpenFile,
    #[display(fmt = "inode")]
    Inode,
    #[display(fmt = "directory")]
    Directory,
}

impl From<DeviceError> for FsError {
    #[inline]
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}

impl core::error::Error for FsError {}

pub type Result<T> = core::result::Result<T, FsError>;
