use crate::config::*;
use crate::{BLOCK_SIZE, MAGIC};

use super::Plain;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 记录卷的几何参数
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u32,
    pub block_size: u32,
    /// 文件系统占据块数
    pub total_blocks: u32,
    pub inode_table_blocks: u32,
    /// 根目录的 inode ID
    pub root_inode: u32,
}

unsafe impl Plain for SuperBlock {}

impl SuperBlock {
    #[inline]
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            block_size: BLOCK_SIZE as u32,
            total_blocks: TOTAL_BLOCKS as u32,
            inode_table_blocks: INODE_TABLE_BLOCKS as u32,
            root_inode: ROOT_INODE_ID,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && self.block_size == BLOCK_SIZE as u32
    }
}
