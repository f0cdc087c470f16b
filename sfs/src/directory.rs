//! # 目录层
//!
//! 整个卷只有一个扁平的目录：固定容量的目录项表，
//! 记录文件名到 inode ID 的映射，按槽位线性查找。

use alloc::vec;
use alloc::vec::Vec;

use crate::config::DIRECTORY_ENTRIES;
use crate::error::Table;
use crate::layout::{DirEntry, as_bytes, as_bytes_mut};
use crate::{FsError, Result};

#[derive(Debug, Clone)]
pub struct Directory {
    entries: Vec<DirEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: vec![DirEntry::EMPTY; DIRECTORY_ENTRIES],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut entries = vec![DirEntry::EMPTY; DIRECTORY_ENTRIES];
        let image = as_bytes_mut(&mut entries);
        let len = image.len();
        image.copy_from_slice(&bytes[..len]);

        Self { entries }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        as_bytes(&self.entries)
    }

    /// 通过名字获取目录项的 inode ID，大小写敏感
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.find(name).and_then(|slot| self.entries[slot].inode_id())
    }

    /// 占用第一个空槽位，返回槽位号
    pub fn create_entry(&mut self, name: &str, inode_id: u32) -> Result<usize> {
        let entry = DirEntry::new(name, inode_id)?;
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }

        let slot = self
            .entries
            .iter()
            .position(|entry| !entry.is_used())
            .ok_or(FsError::TableFull(Table::Directory))?;
        self.entries[slot] = entry;

        Ok(slot)
    }

    /// 清空名字对应的目录项，返回其 inode ID
    pub fn remove_entry(&mut self, name: &str) -> Result<u32> {
        let slot = self.find(name).ok_or(FsError::NotFound)?;
        let inode_id = self.entries[slot].inode_id().ok_or(FsError::NotFound)?;
        self.entries[slot] = DirEntry::EMPTY;

        Ok(inode_id)
    }

    /// 使用中的目录项
    pub fn iter(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|entry| entry.is_used())
    }

    /// 从槽位 `from` 开始的第一个使用中的目录项及其槽位号
    pub fn next_used(&self, from: usize) -> Option<(usize, &DirEntry)> {
        self.entries
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, entry)| entry.is_used())
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.is_used() && entry.name() == name)
    }
}
