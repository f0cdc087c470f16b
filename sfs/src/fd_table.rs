//! # 打开文件表
//!
//! 句柄就是表内的槽位号。每个槽位的状态：
//!
//! ```text
//! Closed --open--> Open --close--> Closed
//!                   |
//!                remove
//!                   v
//!               Dangling --close--> Closed
//! ```
//!
//! 文件被删除后，仍指向它的句柄进入 `Dangling`，此后的读写与定位都会失败。

use alloc::vec;
use alloc::vec::Vec;

use crate::error::Table;
use crate::{FsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFile {
    Closed,
    Open {
        inode_id: u32,
        /// **文件**内的偏移量
        cursor: usize,
    },
    Dangling,
}

#[derive(Debug, Clone)]
pub struct FdTable {
    slots: Vec<OpenFile>,
}

impl FdTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![OpenFile::Closed; capacity],
        }
    }

    /// 占用第一个空槽位
    pub fn alloc(&mut self, inode_id: u32, cursor: usize) -> Result<usize> {
        let fd = self.free_slot()?;
        self.slots[fd] = OpenFile::Open { inode_id, cursor };
        Ok(fd)
    }

    /// 第一个空槽位，不占用
    pub fn free_slot(&self) -> Result<usize> {
        self.slots
            .iter()
            .position(|slot| *slot == OpenFile::Closed)
            .ok_or(FsError::TableFull(Table::OpenFile))
    }

    pub fn dealloc(&mut self, fd: usize) -> Result<()> {
        match self.slots.get(fd) {
            None => Err(FsError::InvalidHandle),
            Some(OpenFile::Closed) => Err(FsError::AlreadyClosed),
            Some(_) => {
                self.slots[fd] = OpenFile::Closed;
                Ok(())
            }
        }
    }

    /// 句柄所绑定的 inode ID 与读写指针
    pub fn get(&self, fd: usize) -> Result<(u32, usize)> {
        match self.slots.get(fd) {
            Some(&OpenFile::Open { inode_id, cursor }) => Ok((inode_id, cursor)),
            _ => Err(FsError::InvalidHandle),
        }
    }

    pub fn set_cursor(&mut self, fd: usize, offset: usize) -> Result<()> {
        match self.slots.get_mut(fd) {
            Some(OpenFile::Open { cursor, .. }) => {
                *cursor = offset;
                Ok(())
            }
            _ => Err(FsError::InvalidHandle),
        }
    }

    /// 使指向 `inode_id` 的句柄全部失效，返回失效的个数
    pub fn invalidate(&mut self, inode_id: u32) -> usize {
        let mut count = 0;
        for slot in &mut self.slots {
            if matches!(slot, OpenFile::Open { inode_id: id, .. } if *id == inode_id) {
                *slot = OpenFile::Dangling;
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_cycle() {
        let mut table = FdTable::new(2);
        let fd = table.alloc(3, 10).unwrap();
        assert_eq!(table.get(fd), Ok((3, 10)));

        table.set_cursor(fd, 42).unwrap();
        assert_eq!(table.get(fd), Ok((3, 42)));

        assert_eq!(table.dealloc(fd), Ok(()));
        assert_eq!(table.dealloc(fd), Err(FsError::AlreadyClosed));
        assert_eq!(table.get(fd), Err(FsError::InvalidHandle));
        assert_eq!(table.dealloc(7), Err(FsError::InvalidHandle));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut table = FdTable::new(2);
        table.alloc(1, 0).unwrap();
        table.alloc(1, 0).unwrap();
        assert_eq!(table.alloc(2, 0), Err(FsError::TableFull(Table::OpenFile)));
    }

    #[test]
    fn invalidated_handles_dangle() {
        let mut table = FdTable::new(4);
        let a = table.alloc(5, 0).unwrap();
        let b = table.alloc(5, 8).unwrap();
        let c = table.alloc(6, 0).unwrap();

        assert_eq!(table.invalidate(5), 2);
        assert_eq!(table.get(a), Err(FsError::InvalidHandle));
        assert_eq!(table.set_cursor(b, 0), Err(FsError::InvalidHandle));
        assert_eq!(table.get(c), Ok((6, 0)));

        // 悬空句柄仍占着槽位，关闭后才释放
        assert_eq!(table.dealloc(a), Ok(()));
        assert_eq!(table.alloc(7, 0), Ok(a));
    }
}
