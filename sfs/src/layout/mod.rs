//! # 磁盘数据结构层
//!
//! sfs 的磁盘布局：
//! 超级块 | 索引节点表 | 目录表 | 数据块区域 | 空闲位图
//!
//! 除数据块区域外，每个区域在内存中都有一份完整的副本，
//! 修改后按区域整体写回。

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::{mem, slice};

use block_dev::BlockDevice;
use enumflags2::bitflags;

use crate::config::*;
use crate::{BLOCK_SIZE, Result};

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{DiskInode, IndirectBlock, InodeTable, UNASSIGNED, indirect_blocks, to_block_id};

/// 文件项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirEntry, validate_name};

/// 卷上位置固定的元数据区域
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    SuperBlock = 0b0001,
    InodeTable = 0b0010,
    Directory = 0b0100,
    Bitmap = 0b1000,
}

impl Region {
    #[inline]
    pub const fn start(self) -> usize {
        match self {
            Region::SuperBlock => SUPER_BLOCK_ID,
            Region::InodeTable => INODE_TABLE_START,
            Region::Directory => DIRECTORY_START,
            Region::Bitmap => BITMAP_START,
        }
    }

    #[inline]
    pub const fn blocks(self) -> usize {
        match self {
            Region::SuperBlock => 1,
            Region::InodeTable => INODE_TABLE_BLOCKS,
            Region::Directory => DIRECTORY_BLOCKS,
            Region::Bitmap => BITMAP_BLOCKS,
        }
    }

    /// 读出整个区域
    pub fn load(self, block_device: &Arc<dyn BlockDevice>) -> Result<Vec<u8>> {
        let mut buf = vec![0; self.blocks() * BLOCK_SIZE];
        block_device.read_blocks(self.start(), self.blocks(), &mut buf)?;
        Ok(buf)
    }

    /// 写回整个区域，`bytes` 之后的部分补零
    pub fn store(self, bytes: &[u8], block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        let mut buf = vec![0; self.blocks() * BLOCK_SIZE];
        assert!(bytes.len() <= buf.len(), "{self:?} overflows its region");
        buf[..bytes.len()].copy_from_slice(bytes);

        log::trace!("flush {self:?}: blocks {}..{}", self.start(), self.start() + self.blocks());
        block_device.write_blocks(self.start(), self.blocks(), &buf)?;
        Ok(())
    }
}

/// 可以与磁盘字节直接互转的纯数据
///
/// # Safety
///
/// 实现者必须是 `#[repr(C)]` 且不含隐式填充，任意位模式都是合法值。
pub unsafe trait Plain: Copy {}

unsafe impl Plain for u64 {}
unsafe impl Plain for i32 {}

#[inline]
pub fn as_bytes<T: Plain>(items: &[T]) -> &[u8] {
    unsafe { slice::from_raw_parts(items.as_ptr().cast(), mem::size_of_val(items)) }
}

#[inline]
pub fn as_bytes_mut<T: Plain>(items: &mut [T]) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(items.as_mut_ptr().cast(), mem::size_of_val(items)) }
}
