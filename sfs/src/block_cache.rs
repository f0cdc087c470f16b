//! # 索引块缓存
//!
//! 读写文件时每跨过一块都要查一次间接索引块，
//! 因此在内存中保留最近用到的几个索引块，避免反复读盘。
//!
//! 缓存是**写穿**的：修改索引块时立即写回块设备，
//! 缓存里的副本永远与磁盘一致，淘汰时无需同步。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::Result;
use crate::config::INDIRECT_COUNT;
use crate::layout::{IndirectBlock, UNASSIGNED, as_bytes, as_bytes_mut};

/// 间接索引块的缓存，由文件系统上下文独占
#[derive(Debug, Default)]
pub struct BlockCache {
    queue: Vec<(u32, Box<IndirectBlock>)>,
}

impl BlockCache {
    /// 块缓存个数的上限
    const CAPACITY: usize = 16;

    pub const fn new() -> Self {
        Self { queue: Vec::new() }
    }

    /// 读取索引块并处理
    pub fn map<V>(
        &mut self,
        block_id: u32,
        block_device: &Arc<dyn BlockDevice>,
        f: impl FnOnce(&IndirectBlock) -> V,
    ) -> Result<V> {
        let index = self.get(block_id, block_device)?;
        Ok(f(&*self.queue[index].1))
    }

    /// 修改索引块，并立即写回。
    ///
    /// 修改作用在副本上，写回成功后才替换缓存，缓存里不会留下磁盘上没有的槽位。
    pub fn map_mut<V>(
        &mut self,
        block_id: u32,
        block_device: &Arc<dyn BlockDevice>,
        f: impl FnOnce(&mut IndirectBlock) -> V,
    ) -> Result<V> {
        let index = self.get(block_id, block_device)?;
        let mut block = self.queue[index].1.clone();
        let value = f(&mut *block);
        block_device.write_blocks(block_id as usize, 1, as_bytes(block.as_slice()))?;
        self.queue[index].1 = block;
        Ok(value)
    }

    /// 把新分配的块初始化为空索引块：所有槽位都未分配
    pub fn init(&mut self, block_id: u32, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        self.evict(block_id);
        let block = Box::new([UNASSIGNED; INDIRECT_COUNT]);
        block_device.write_blocks(block_id as usize, 1, as_bytes(block.as_slice()))?;
        self.push(block_id, block);
        Ok(())
    }

    /// 块被释放时丢弃其副本
    pub fn evict(&mut self, block_id: u32) {
        self.queue.retain(|(id, _)| *id != block_id);
    }

    // 块缓存调度策略：踢走最早进入的块
    fn get(&mut self, block_id: u32, block_device: &Arc<dyn BlockDevice>) -> Result<usize> {
        // 尝试从缓冲区中读取块
        if let Some(index) = self.queue.iter().position(|(id, _)| *id == block_id) {
            return Ok(index);
        }

        let mut block = Box::new([UNASSIGNED; INDIRECT_COUNT]);
        block_device.read_blocks(block_id as usize, 1, as_bytes_mut(block.as_mut_slice()))?;
        Ok(self.push(block_id, block))
    }

    fn push(&mut self, block_id: u32, block: Box<IndirectBlock>) -> usize {
        // 触及上限，丢掉一个块；写穿的缓存不必写回
        if self.queue.len() == Self::CAPACITY {
            self.queue.remove(0);
        }
        self.queue.push((block_id, block));
        self.queue.len() - 1
    }
}
