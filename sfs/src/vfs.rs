//! # 文件操作层
//!
//! 对外的文件接口：通过目录把名字解析为 inode，通过打开文件表把句柄解析为
//! (inode, 读写指针)，再沿 inode 的块指针读写数据块。
//! 每个会修改元数据的操作都在返回前写回它改动过的区域。

use alloc::borrow::ToOwned;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use log::{debug, warn};

use crate::control::{GROW_ORDER, SHRINK_ORDER};
use crate::layout::{Region, validate_name};
use crate::{BLOCK_SIZE, DataBlock, FsError, Result, SimpleFileSystem, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub inode: u32,
    /// 文件大小(字节)
    pub size: usize,
    pub links: u32,
    /// 占用的块数，包括间接索引块
    pub blocks: usize,
}

impl SimpleFileSystem {
    /// 打开文件，读写指针位于文件末尾；文件不存在时创建它，读写指针位于开头
    pub fn open(&mut self, name: &str) -> Result<usize> {
        validate_name(name)?;

        if let Some(inode_id) = self.directory.lookup(name) {
            let size = self.inodes.get(inode_id).size as usize;
            let fd = self.fd_table.alloc(inode_id, size)?;
            debug!("open {name:?}: fd={fd}, inode={inode_id}, cursor={size}");
            return Ok(fd);
        }

        // 三张表各自检查容量，任何一张满了都不留下痕迹
        self.fd_table.free_slot()?;
        let inode_id = self.inodes.alloc().ok_or(FsError::TableFull(Table::Inode))?;
        if let Err(err) = self.directory.create_entry(name, inode_id) {
            warn!("create {name:?} failed ({err}), roll back inode {inode_id}");
            self.inodes.dealloc(inode_id);
            return Err(err);
        }
        self.dirty |= Region::InodeTable | Region::Directory;
        self.flush(&GROW_ORDER)?;

        let fd = self.fd_table.alloc(inode_id, 0)?;
        debug!("create {name:?}: fd={fd}, inode={inode_id}");
        Ok(fd)
    }

    pub fn close(&mut self, fd: usize) -> Result<()> {
        self.fd_table.dealloc(fd)?;
        debug!("close fd={fd}");
        Ok(())
    }

    /// 从读写指针处写入 `buf`，返回写入的字节数。
    ///
    /// 空间耗尽时若已写入部分数据，返回这部分的长度。
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        let (inode_id, cursor) = self.fd_table.get(fd)?;

        let mut written = 0;
        let result = self.write_blocks(inode_id, cursor, buf, &mut written);

        if written > 0 {
            let inode = self.inodes.get_mut(inode_id);
            inode.size = inode.size.max((cursor + written) as u32);
            self.dirty |= Region::InodeTable;
            self.fd_table.set_cursor(fd, cursor + written)?;
        }
        self.flush(&GROW_ORDER)?;

        debug!("write fd={fd}: {written}/{} bytes at {cursor}", buf.len());
        match result {
            Ok(()) => Ok(written),
            Err(FsError::AllocationExhausted) if written > 0 => {
                warn!("fd={fd}: out of space, short write of {written} bytes");
                Ok(written)
            }
            Err(err) => Err(err),
        }
    }

    /// 从读写指针处读出至多 `max_len` 字节
    pub fn read(&mut self, fd: usize, max_len: usize) -> Result<Vec<u8>> {
        let (inode_id, cursor) = self.fd_table.get(fd)?;
        let size = self.inodes.get(inode_id).size as usize;
        let mut buf = vec![0; max_len.min(size.saturating_sub(cursor))];

        let len = self.read_into(fd, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// 从读写指针处读出数据填充`buf`，不越过文件末尾，返回读到的字节数。
    ///
    /// 文件中间未分配的块读出全零。
    pub fn read_into(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let (inode_id, cursor) = self.fd_table.get(fd)?;
        let size = self.inodes.get(inode_id).size as usize;
        let end = cursor.saturating_add(buf.len()).min(size);
        if cursor >= end {
            return Ok(0);
        }

        let mut start = cursor;
        let mut data: DataBlock = [0; BLOCK_SIZE];
        while start < end {
            let block_index = start / BLOCK_SIZE;
            let block_offset = start % BLOCK_SIZE;
            let block_read_size = (BLOCK_SIZE - block_offset).min(end - start);
            let dest = &mut buf[start - cursor..start - cursor + block_read_size];

            match self.resolve_block(inode_id, block_index)? {
                Some(block_id) => {
                    self.block_device.read_blocks(block_id as usize, 1, &mut data)?;
                    dest.copy_from_slice(&data[block_offset..block_offset + block_read_size]);
                }
                None => dest.fill(0),
            }

            start += block_read_size;
        }

        self.fd_table.set_cursor(fd, end)?;
        debug!("read fd={fd}: {} bytes at {cursor}", end - cursor);
        Ok(end - cursor)
    }

    /// 移动读写指针，允许越过文件末尾
    pub fn seek(&mut self, fd: usize, offset: usize) -> Result<()> {
        self.fd_table.set_cursor(fd, offset)?;
        debug!("seek fd={fd}: {offset}");
        Ok(())
    }

    /// 删除文件并回收它的全部块，仍指向它的句柄随之失效
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let inode_id = self.directory.lookup(name).ok_or(FsError::NotFound)?;
        // 先读完索引块，再动元数据
        let blocks = self.held_blocks(inode_id)?;

        self.directory.remove_entry(name)?;
        self.inodes.dealloc(inode_id);
        for &block_id in &blocks {
            self.release_block(block_id);
        }
        let dangling = self.fd_table.invalidate(inode_id);
        self.dirty |= Region::Directory | Region::InodeTable | Region::Bitmap;
        self.flush(&SHRINK_ORDER)?;

        debug!(
            "remove {name:?}: inode={inode_id}, {} blocks released, {dangling} fd(s) dangling",
            blocks.len()
        );
        Ok(())
    }

    /// 逐个返回目录中的文件名，遍历完后返回一次空，然后从头开始
    pub fn next_filename(&mut self) -> Option<String> {
        match self.directory.next_used(self.dir_cursor) {
            Some((slot, entry)) => {
                self.dir_cursor = slot + 1;
                Some(entry.name().to_owned())
            }
            None => {
                self.dir_cursor = 0;
                None
            }
        }
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.directory.iter().map(|entry| entry.name())
    }

    pub fn file_size(&self, name: &str) -> Result<usize> {
        let inode_id = self.directory.lookup(name).ok_or(FsError::NotFound)?;
        Ok(self.inodes.get(inode_id).size as usize)
    }

    pub fn stat(&mut self, name: &str) -> Result<Stat> {
        let inode_id = self.directory.lookup(name).ok_or(FsError::NotFound)?;
        let blocks = self.held_blocks(inode_id)?.len();
        let inode = self.inodes.get(inode_id);

        Ok(Stat {
            inode: inode_id,
            size: inode.size as usize,
            links: inode.links,
            blocks,
        })
    }

    /// 文件持有的全部物理块，间接索引块排在最后
    pub fn block_map(&mut self, name: &str) -> Result<Vec<u32>> {
        let inode_id = self.directory.lookup(name).ok_or(FsError::NotFound)?;
        self.held_blocks(inode_id)
    }

    fn write_blocks(
        &mut self,
        inode_id: u32,
        cursor: usize,
        buf: &[u8],
        written: &mut usize,
    ) -> Result<()> {
        let mut data: DataBlock = [0; BLOCK_SIZE];
        while *written < buf.len() {
            let start = cursor + *written;
            let block_index = start / BLOCK_SIZE;
            let block_offset = start % BLOCK_SIZE;
            let block_write_size = (BLOCK_SIZE - block_offset).min(buf.len() - *written);

            let src = &buf[*written..*written + block_write_size];
            match self.resolve_block(inode_id, block_index)? {
                Some(block_id) => {
                    // 只写块的一部分时，保留块内其余字节
                    if block_write_size == BLOCK_SIZE {
                        data.fill(0);
                    } else {
                        self.block_device.read_blocks(block_id as usize, 1, &mut data)?;
                    }
                    data[block_offset..block_offset + block_write_size].copy_from_slice(src);
                    self.block_device.write_blocks(block_id as usize, 1, &data)?;
                }
                None => {
                    // 新块从全零开始
                    data.fill(0);
                    data[block_offset..block_offset + block_write_size].copy_from_slice(src);
                    self.grow(inode_id, block_index, &data)?;
                }
            }

            *written += block_write_size;
        }

        Ok(())
    }
}
