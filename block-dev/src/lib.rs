//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，实现了此特质的类型称为**块设备驱动**。
//!
//! [`Disk`] 额外描述了卷的创建与重新打开，文件系统的格式化与挂载都经由它完成。

#![no_std]

use core::any::Any;

use derive_more::Display;

/// 块设备驱动特质
///
/// 一次传输必须是整块的：`buf.len()` 恒等于 `count * block_size()`。
pub trait BlockDevice: Send + Sync + Any {
    /// 每块的字节数
    fn block_size(&self) -> usize;

    /// 设备的总块数
    fn block_count(&self) -> usize;

    /// 从 `start` 开始读出 `count` 块，返回读到的块数
    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// 从 `start` 开始写入 `count` 块，返回写入的块数
    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> Result<usize, DeviceError>;

    /// 检查一次传输是否落在设备内且缓冲区大小正确
    fn check_transfer(&self, start: usize, count: usize, buf_len: usize) -> Result<(), DeviceError> {
        if start.checked_add(count).is_none_or(|end| end > self.block_count()) {
            return Err(DeviceError::OutOfRange { start, count });
        }

        let expected = count * self.block_size();
        if buf_len != expected {
            return Err(DeviceError::BadBuffer {
                expected,
                actual: buf_len,
            });
        }

        Ok(())
    }
}

/// 可以被创建或重新打开的卷
pub trait Disk: BlockDevice + Sized {
    /// 创建一张全新的卷，已有的同名卷会被覆盖
    fn init_fresh(name: &str, block_size: usize, block_count: usize) -> Result<Self, DeviceError>;

    /// 打开一张已存在的卷
    fn init_existing(name: &str, block_size: usize, block_count: usize)
    -> Result<Self, DeviceError>;
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[display(fmt = "{} block(s) from block {} are out of range", count, start)]
    OutOfRange { start: usize, count: usize },

    #[display(fmt = "buffer holds {} bytes, expected {}", actual, expected)]
    BadBuffer { expected: usize, actual: usize },

    /// 已有卷的几何参数与请求的不符
    #[display(fmt = "volume geometry mismatch")]
    Geometry,

    #[display(fmt = "I/O error on the backing store")]
    Io,
}

impl core::error::Error for DeviceError {}
