//! # 文件系统上下文
//!
//! 构建出磁盘的布局并使用：格式化、挂载、空闲块的分配与回收，
//! 以及 inode 块指针的解析与指派。
//!
//! 索引节点表、目录表、空闲位图与打开文件表都由 [`SimpleFileSystem`] 独占，
//! 每个操作结束前把它改动过的区域写回块设备。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::slice;

use block_dev::{BlockDevice, DeviceError, Disk};
use enumflags2::BitFlags;
use log::{debug, error, warn};
use spin::Mutex;

use crate::block_cache::BlockCache;
use crate::config::*;
use crate::directory::Directory;
use crate::fd_table::FdTable;
use crate::layout::*;
use crate::{BLOCK_SIZE, DataBlock, FsError, Options, Result};

/// 需要跨线程共用时，用一把锁串行化全部操作
pub type SharedFileSystem = Arc<Mutex<SimpleFileSystem>>;

/// 分配块的操作：先落盘位图，再落盘引用它的 inode
pub(crate) const GROW_ORDER: [Region; 3] = [Region::Bitmap, Region::InodeTable, Region::Directory];
/// 释放块的操作：先解除引用，最后才把块还给位图
pub(crate) const SHRINK_ORDER: [Region; 3] =
    [Region::Directory, Region::InodeTable, Region::Bitmap];

pub struct SimpleFileSystem {
    pub(crate) block_device: Arc<dyn BlockDevice>,
    pub(crate) inodes: InodeTable,
    pub(crate) directory: Directory,
    pub(crate) bitmap: Bitmap,
    pub(crate) fd_table: FdTable,
    pub(crate) cache: BlockCache,
    /// 内存中改动过、尚未写回的区域
    pub(crate) dirty: BitFlags<Region>,
    /// `next_filename` 的遍历位置
    pub(crate) dir_cursor: usize,
}

impl SimpleFileSystem {
    /// 通过块设备驱动创建名为 `name` 的新卷并格式化
    pub fn format<D: Disk>(name: &str) -> Result<Self> {
        let disk = D::init_fresh(name, BLOCK_SIZE, TOTAL_BLOCKS)?;
        Self::format_on(Arc::new(disk))
    }

    /// 在已有的块设备上格式化，设备上原有的元数据全部作废
    pub fn format_on(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        check_geometry(&block_device)?;

        let super_block = SuperBlock::new();
        Region::SuperBlock.store(as_bytes(slice::from_ref(&super_block)), &block_device)?;

        let mut fs = Self::with_tables(
            block_device,
            InodeTable::new(),
            Directory::new(),
            Bitmap::new(),
        );
        fs.dirty = Region::Directory | Region::InodeTable | Region::Bitmap;
        fs.flush(&[Region::Directory, Region::InodeTable, Region::Bitmap])?;

        debug!("formatted: {TOTAL_BLOCKS} blocks, {} free", fs.bitmap.count_free());
        Ok(fs)
    }

    /// 通过块设备驱动打开名为 `name` 的已有卷并挂载
    pub fn mount<D: Disk>(name: &str) -> Result<Self> {
        let disk = D::init_existing(name, BLOCK_SIZE, TOTAL_BLOCKS)?;
        Self::mount_on(Arc::new(disk))
    }

    /// 读入索引节点表、目录表与空闲位图，信任磁盘上的内容
    pub fn mount_on(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        check_geometry(&block_device)?;

        let mut super_block = [SuperBlock::new()];
        let bytes = Region::SuperBlock.load(&block_device)?;
        let image = as_bytes_mut(&mut super_block);
        let len = image.len();
        image.copy_from_slice(&bytes[..len]);
        if !super_block[0].is_valid() {
            error!("bad super block: {:?}", super_block[0]);
            return Err(FsError::InvalidVolume);
        }

        let inodes = InodeTable::from_bytes(&Region::InodeTable.load(&block_device)?);
        let directory = Directory::from_bytes(&Region::Directory.load(&block_device)?);
        let bitmap = Bitmap::from_bytes(&Region::Bitmap.load(&block_device)?);

        let files = directory.iter().count();
        // 根 inode 不对应目录项
        let used_inodes = inodes.iter_used().count().saturating_sub(1);
        if used_inodes != files {
            warn!("{used_inodes} inodes in use but {files} directory entries");
        }

        let fs = Self::with_tables(block_device, inodes, directory, bitmap);
        debug!(
            "mounted: {files} files, {} free blocks",
            fs.bitmap.count_free()
        );
        Ok(fs)
    }

    /// 按选项重建打开文件表，已打开的句柄全部作废
    pub fn with_options(mut self, options: Options) -> Self {
        self.fd_table = FdTable::new(options.max_open_files);
        self
    }

    #[inline]
    pub fn shared(self) -> SharedFileSystem {
        Arc::new(Mutex::new(self))
    }

    /// 把仍未写回的区域全部写回，通常只在上一次写回失败后才有事可做
    pub fn sync(&mut self) -> Result<()> {
        self.flush(&GROW_ORDER)
    }

    fn with_tables(
        block_device: Arc<dyn BlockDevice>,
        inodes: InodeTable,
        directory: Directory,
        bitmap: Bitmap,
    ) -> Self {
        Self {
            block_device,
            inodes,
            directory,
            bitmap,
            fd_table: FdTable::new(DEFAULT_MAX_OPEN_FILES),
            cache: BlockCache::new(),
            dirty: BitFlags::empty(),
            dir_cursor: 0,
        }
    }
}

/* 空闲块分配 */
impl SimpleFileSystem {
    /// 在磁盘上分配新的数据块并返回其ID
    pub(crate) fn allocate_block(&mut self) -> Result<u32> {
        let bit = self.bitmap.alloc().ok_or(FsError::AllocationExhausted)?;
        self.dirty |= Region::Bitmap;

        let block_id = (DIRECTORY_START + bit) as u32;
        debug!("allocate block {block_id}");
        Ok(block_id)
    }

    /// 把数据块还给位图，已空闲的块原样忽略
    pub(crate) fn release_block(&mut self, block_id: u32) {
        let block_id_usize = block_id as usize;
        if !(DATA_START..DATA_START + DATA_BLOCKS).contains(&block_id_usize) {
            warn!("refuse to release block {block_id} outside the data region");
            return;
        }

        self.cache.evict(block_id);
        if self.bitmap.dealloc(block_id_usize - DIRECTORY_START) {
            self.dirty |= Region::Bitmap;
            debug!("release block {block_id}");
        } else {
            debug!("block {block_id} is already free");
        }
    }

    pub fn free_blocks(&self) -> usize {
        self.bitmap.count_free()
    }

    /// 位图中被占用的块，不含目录区域
    pub fn allocated_blocks(&self) -> Vec<u32> {
        self.bitmap
            .iter_set()
            .filter(|&bit| bit >= DIRECTORY_BLOCKS)
            .map(|bit| (DIRECTORY_START + bit) as u32)
            .collect()
    }
}

/* 块指针管理 */
impl SimpleFileSystem {
    /// 逻辑上 inode 指向一系列数据块，此处传入的是这些数据块的索引（逻辑块号），
    /// 返回对应的物理块号；未分配时返回空
    pub(crate) fn resolve_block(&mut self, inode_id: u32, block_index: usize) -> Result<Option<u32>> {
        let inode = self.inodes.get(inode_id);
        if block_index < DIRECT_COUNT {
            return Ok(inode.direct(block_index));
        }

        // 剔去直接索引的部分
        let slot = block_index - DIRECT_COUNT;
        if slot >= INDIRECT_COUNT {
            return Ok(None);
        }
        let Some(indirect) = inode.indirect() else {
            return Ok(None);
        };

        self.cache
            .map(indirect, &self.block_device, |indirect_block| to_block_id(indirect_block[slot]))
    }

    /// 让 inode 的第 `block_index` 个逻辑块指向 `block_id`，
    /// 必要时先分配间接索引块
    pub(crate) fn assign_block(
        &mut self,
        inode_id: u32,
        block_index: usize,
        block_id: u32,
    ) -> Result<()> {
        if block_index < DIRECT_COUNT {
            self.inodes.get_mut(inode_id).set_direct(block_index, block_id);
        } else {
            let slot = block_index - DIRECT_COUNT;
            if slot >= INDIRECT_COUNT {
                return Err(FsError::AllocationExhausted);
            }

            let indirect = match self.inodes.get(inode_id).indirect() {
                Some(indirect) => indirect,
                None => {
                    let indirect = self.allocate_block()?;
                    if let Err(err) = self.cache.init(indirect, &self.block_device) {
                        self.release_block(indirect);
                        return Err(err);
                    }
                    self.inodes.get_mut(inode_id).set_indirect(indirect);
                    debug!("inode {inode_id}: indirect block {indirect}");
                    indirect
                }
            };

            self.cache.map_mut(indirect, &self.block_device, |indirect_block| {
                indirect_block[slot] = block_id as i32;
            })?;
        }

        self.dirty |= Region::InodeTable;
        debug!("inode {inode_id}: block #{block_index} -> {block_id}");
        Ok(())
    }

    /// 为 inode 的第 `block_index` 个逻辑块分配新数据块，内容为 `data`。
    ///
    /// 先写数据再挂上指针：任何一步失败都归还该块，inode 不会指向内容未知的块。
    pub(crate) fn grow(&mut self, inode_id: u32, block_index: usize, data: &DataBlock) -> Result<u32> {
        if block_index >= MAX_FILE_BLOCKS {
            return Err(FsError::AllocationExhausted);
        }

        let block_id = self.allocate_block()?;
        let result = self
            .block_device
            .write_blocks(block_id as usize, 1, data)
            .map_err(FsError::from)
            .and_then(|_| self.assign_block(inode_id, block_index, block_id));
        if let Err(err) = result {
            self.release_block(block_id);
            return Err(err);
        }
        Ok(block_id)
    }

    /// inode 持有的全部块：先数据块，间接索引块本身排在最后
    pub(crate) fn held_blocks(&mut self, inode_id: u32) -> Result<Vec<u32>> {
        let inode = *self.inodes.get(inode_id);
        let mut blocks: Vec<u32> = inode.direct_blocks().collect();

        if let Some(indirect) = inode.indirect() {
            self.cache.map(indirect, &self.block_device, |indirect_block| {
                blocks.extend(indirect_blocks(indirect_block));
            })?;
            blocks.push(indirect);
        }

        Ok(blocks)
    }
}

/* 元数据写回 */
impl SimpleFileSystem {
    /// 按给定顺序写回脏区域；写回失败的区域保持为脏
    pub(crate) fn flush(&mut self, order: &[Region]) -> Result<()> {
        for &region in order {
            if !self.dirty.contains(region) {
                continue;
            }

            let bytes = match region {
                Region::InodeTable => self.inodes.as_bytes(),
                Region::Directory => self.directory.as_bytes(),
                Region::Bitmap => self.bitmap.as_bytes(),
                // 超级块只在格式化时写一次
                Region::SuperBlock => continue,
            };
            if let Err(err) = region.store(bytes, &self.block_device) {
                error!("failed to flush {region:?}: {err}");
                return Err(err);
            }
            self.dirty.remove(region);
        }

        Ok(())
    }
}

fn check_geometry(block_device: &Arc<dyn BlockDevice>) -> Result<()> {
    if block_device.block_size() != BLOCK_SIZE || block_device.block_count() < TOTAL_BLOCKS {
        error!(
            "device geometry {}x{} doesn't fit {BLOCK_SIZE}x{TOTAL_BLOCKS}",
            block_device.block_size(),
            block_device.block_count()
        );
        return Err(DeviceError::Geometry.into());
    }
    Ok(())
}
