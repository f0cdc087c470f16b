//! 索引节点与间接索引块
//!
//! - 直接索引：inode 内的 [`DIRECT_COUNT`] 个块编号，各指向一个**数据块**
//! - 一级间接索引：整个块连续存储**块编号**，每个编号都指向一个**数据块**
//!
//! 逻辑块号小于 [`DIRECT_COUNT`] 时走直接索引，
//! 减去 [`DIRECT_COUNT`] 后即为间接索引块内的槽位。

use alloc::vec;
use alloc::vec::Vec;

use crate::config::*;

use super::{Plain, as_bytes, as_bytes_mut};

/// 未分配的块编号
pub const UNASSIGNED: i32 = -1;

/// 间接索引块
pub type IndirectBlock = [i32; INDIRECT_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct DiskInode {
    /// 0 为空闲，1 为使用中
    pub mode: u32,
    /// 硬链接个数
    pub links: u32,
    // 不用usize是为了严控布局
    pub size: u32,
    direct: [i32; DIRECT_COUNT],
    indirect: i32,
}

unsafe impl Plain for DiskInode {}

impl DiskInode {
    pub const FREE: u32 = 0;
    pub const USED: u32 = 1;

    pub const EMPTY: Self = Self {
        mode: Self::FREE,
        links: 0,
        size: 0,
        direct: [UNASSIGNED; DIRECT_COUNT],
        indirect: UNASSIGNED,
    };

    /// 新建文件时的 inode
    #[inline]
    pub fn init(&mut self) {
        *self = Self {
            mode: Self::USED,
            links: 1,
            ..Self::EMPTY
        }
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.mode == Self::USED
    }

    #[inline]
    pub fn direct(&self, index: usize) -> Option<u32> {
        to_block_id(self.direct[index])
    }

    #[inline]
    pub fn set_direct(&mut self, index: usize, block_id: u32) {
        self.direct[index] = block_id as i32;
    }

    #[inline]
    pub fn indirect(&self) -> Option<u32> {
        to_block_id(self.indirect)
    }

    #[inline]
    pub fn set_indirect(&mut self, block_id: u32) {
        self.indirect = block_id as i32;
    }

    /// 所有已分配的直接索引
    pub fn direct_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.direct.iter().filter_map(|&ptr| to_block_id(ptr))
    }
}

/// 间接索引块内已分配的编号
pub fn indirect_blocks(block: &IndirectBlock) -> impl Iterator<Item = u32> + '_ {
    block.iter().filter_map(|&ptr| to_block_id(ptr))
}

#[inline]
pub fn to_block_id(ptr: i32) -> Option<u32> {
    (ptr >= 0).then_some(ptr as u32)
}

/// 索引节点表在内存中的副本
#[derive(Debug, Clone)]
pub struct InodeTable {
    inodes: Vec<DiskInode>,
}

impl InodeTable {
    /// 新卷的索引节点表：0 号为根目录，指向目录区域的各块
    pub fn new() -> Self {
        let mut inodes = vec![DiskInode::EMPTY; INODE_COUNT];

        let root = &mut inodes[ROOT_INODE_ID as usize];
        root.init();
        root.size = (DIRECTORY_ENTRIES * super::DirEntry::SIZE) as u32;
        for i in 0..DIRECTORY_BLOCKS {
            root.set_direct(i, (DIRECTORY_START + i) as u32);
        }

        Self { inodes }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut inodes = vec![DiskInode::EMPTY; INODE_COUNT];
        let image = as_bytes_mut(&mut inodes);
        let len = image.len();
        image.copy_from_slice(&bytes[..len]);

        Self { inodes }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        as_bytes(&self.inodes)
    }

    #[inline]
    pub fn get(&self, inode_id: u32) -> &DiskInode {
        &self.inodes[inode_id as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, inode_id: u32) -> &mut DiskInode {
        &mut self.inodes[inode_id as usize]
    }

    /// 在表内分配空闲的 inode 并返回其ID，根目录之外的 inode 才参与分配
    pub fn alloc(&mut self) -> Option<u32> {
        let inode_id = self
            .inodes
            .iter()
            .enumerate()
            .skip(ROOT_INODE_ID as usize + 1)
            .find_map(|(id, inode)| (!inode.is_used()).then_some(id as u32))?;

        self.inodes[inode_id as usize].init();
        Some(inode_id)
    }

    /// 把 inode 重置为空闲状态，块的回收由调用者负责
    #[inline]
    pub fn dealloc(&mut self, inode_id: u32) {
        self.inodes[inode_id as usize] = DiskInode::EMPTY;
    }

    /// 使用中的 inode 及其ID
    pub fn iter_used(&self) -> impl Iterator<Item = (u32, &DiskInode)> {
        self.inodes
            .iter()
            .enumerate()
            .filter(|(_, inode)| inode.is_used())
            .map(|(id, inode)| (id as u32, inode))
    }
}
