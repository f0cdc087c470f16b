//! 卷的几何参数与运行时选项
//!
//! ```text
//! | 超级块 | 索引节点表 | 目录表 | 数据块区域 | 空闲位图 |
//! 0        1            8        11           26910
//! ```

use crate::BLOCK_SIZE;

/// 卷的总块数
pub const TOTAL_BLOCKS: usize = 26938;

pub const SUPER_BLOCK_ID: usize = 0;

pub const INODE_TABLE_START: usize = 1;
pub const INODE_TABLE_BLOCKS: usize = 7;

pub const DIRECTORY_START: usize = 8;
pub const DIRECTORY_BLOCKS: usize = 3;

pub const DATA_START: usize = 11;
pub const DATA_BLOCKS: usize = 26899;

pub const BITMAP_START: usize = 26910;
pub const BITMAP_BLOCKS: usize = 27;

/// 位图从目录区域开始编号，一直覆盖到数据区域末尾
pub const BITMAP_BITS: usize = DIRECTORY_BLOCKS + DATA_BLOCKS;

/// 索引节点个数，0 号留给根目录
pub const INODE_COUNT: usize = 101;
pub const ROOT_INODE_ID: u32 = 0;

pub const DIRECTORY_ENTRIES: usize = 100;
/// 文件名的最大字节数，名字字段的最后一字节留给 \0
pub const NAME_MAX_LEN: usize = 15;

pub const DIRECT_COUNT: usize = 12;
/// 间接索引块的编号容量
pub const INDIRECT_COUNT: usize = BLOCK_SIZE / 4;
/// 单个文件最多能拥有的数据块
pub const MAX_FILE_BLOCKS: usize = DIRECT_COUNT + INDIRECT_COUNT;

pub const DEFAULT_MAX_OPEN_FILES: usize = 100;

/// 挂载时可调整的选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// 打开文件表的槽位数
    pub max_open_files: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }
}

impl Options {
    #[inline]
    pub fn max_open_files(mut self, slots: usize) -> Self {
        self.max_open_files = slots;
        self
    }
}
