use core::{mem, str};

use crate::config::NAME_MAX_LEN;
use crate::{FsError, Result};

use super::Plain;
use super::inode::UNASSIGNED;

/// 目录表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct DirEntry {
    used: u8,
    _pad: [u8; 3],
    inode_id: i32,
    // 最后一字节留给 \0
    name: [u8; NAME_MAX_LEN + 1],
}

unsafe impl Plain for DirEntry {}

impl DirEntry {
    /// 元信息大小恒为24字节
    pub const SIZE: usize = mem::size_of::<Self>();

    pub const EMPTY: Self = Self {
        used: 0,
        _pad: [0; 3],
        inode_id: UNASSIGNED,
        name: [0; NAME_MAX_LEN + 1],
    };

    #[inline]
    pub fn new(name: &str, inode_id: u32) -> Result<Self> {
        let bytes = validate_name(name)?;
        let mut entry = Self {
            used: 1,
            inode_id: inode_id as i32,
            ..Self::EMPTY
        };
        entry.name[..bytes.len()].copy_from_slice(bytes);

        Ok(entry)
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.used != 0
    }

    /// 名字字段在第一个 \0 处截断；磁盘上的非 UTF-8 名字视为空
    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.name.len());
        str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    #[inline]
    pub fn inode_id(&self) -> Option<u32> {
        (self.inode_id >= 0).then_some(self.inode_id as u32)
    }
}

/// 文件名不能为空、不能含 \0，且至多 [`NAME_MAX_LEN`] 字节
pub fn validate_name(name: &str) -> Result<&[u8]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.contains(&0) {
        return Err(FsError::InvalidName);
    }
    if bytes.len() > NAME_MAX_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(bytes)
}
