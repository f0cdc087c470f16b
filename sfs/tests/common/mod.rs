//! 测试用的内存块设备

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use sfs::{BLOCK_SIZE, BlockDevice, DeviceError, Disk, SimpleFileSystem};

/// 按名字登记的卷，`init_existing` 从这里找回同一块内存
static VOLUMES: LazyLock<Mutex<HashMap<String, RamDisk>>> = LazyLock::new(Default::default);

/// 稀疏的内存磁盘：没写过的块读出全零
#[derive(Clone)]
pub struct RamDisk {
    blocks: Arc<Mutex<HashMap<usize, Box<[u8]>>>>,
    block_size: usize,
    block_count: usize,
    /// 置位后所有写入都失败
    broken: Arc<AtomicBool>,
    /// 写到这一块的传输失败，`usize::MAX` 表示不设
    bad_block: Arc<AtomicUsize>,
}

impl RamDisk {
    pub fn new(block_size: usize, block_count: usize) -> Self {
        Self {
            blocks: Arc::default(),
            block_size,
            block_count,
            broken: Arc::default(),
            bad_block: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// 只让写到 `block_id` 的传输失败
    pub fn set_bad_block(&self, block_id: Option<u32>) {
        let block_id = block_id.map_or(usize::MAX, |id| id as usize);
        self.bad_block.store(block_id, Ordering::SeqCst);
    }

    /// 取回格式化时登记的卷
    pub fn volume(name: &str) -> Self {
        VOLUMES.lock().unwrap()[name].clone()
    }
}

impl BlockDevice for RamDisk {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.check_transfer(start, count, buf.len())?;
        let blocks = self.blocks.lock().unwrap();
        for (block_id, chunk) in (start..start + count).zip(buf.chunks_mut(self.block_size)) {
            match blocks.get(&block_id) {
                Some(data) => chunk.copy_from_slice(data),
                None => chunk.fill(0),
            }
        }
        Ok(count)
    }

    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> Result<usize, DeviceError> {
        self.check_transfer(start, count, buf.len())?;
        let bad_block = self.bad_block.load(Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) || (start..start + count).contains(&bad_block) {
            return Err(DeviceError::Io);
        }
        let mut blocks = self.blocks.lock().unwrap();
        for (block_id, chunk) in (start..start + count).zip(buf.chunks(self.block_size)) {
            blocks.insert(block_id, chunk.into());
        }
        Ok(count)
    }
}

impl Disk for RamDisk {
    fn init_fresh(name: &str, block_size: usize, block_count: usize) -> Result<Self, DeviceError> {
        let disk = Self::new(block_size, block_count);
        VOLUMES.lock().unwrap().insert(name.to_owned(), disk.clone());
        Ok(disk)
    }

    fn init_existing(name: &str, block_size: usize, block_count: usize) -> Result<Self, DeviceError> {
        let disk = VOLUMES.lock().unwrap().get(name).cloned().ok_or(DeviceError::Io)?;
        if disk.block_size != block_size || disk.block_count != block_count {
            return Err(DeviceError::Geometry);
        }
        Ok(disk)
    }
}

/// 以测试名作为卷名格式化，各测试互不干扰
pub fn fresh(name: &str) -> SimpleFileSystem {
    SimpleFileSystem::format::<RamDisk>(name).unwrap()
}

pub fn remount(name: &str) -> SimpleFileSystem {
    SimpleFileSystem::mount::<RamDisk>(name).unwrap()
}

/// 可辨认的内容：每个字节由其偏移量决定
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}
