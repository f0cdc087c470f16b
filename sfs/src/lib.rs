#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* sfs 的整体架构，自上而下 */

// 文件操作层：打开、读写、定位、删除
mod vfs;

// 文件系统上下文：格式化、挂载、空闲块分配与块指针管理
mod control;

// 打开文件表：句柄到 (inode, 读写指针) 的映射
mod fd_table;

// 目录层：扁平的文件名表
mod directory;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
mod layout;

// 索引块缓存：内存上的间接索引块副本
mod block_cache;

mod error;

pub mod config;

pub use self::{
    config::Options,
    error::{FsError, Result, Table},
    control::{SharedFileSystem, SimpleFileSystem},
    vfs::Stat,
};
pub use block_dev::{BlockDevice, DeviceError, Disk};

pub const MAGIC: u32 = 0x5346_5321;
pub const BLOCK_SIZE: usize = 1024;

type DataBlock = [u8; BLOCK_SIZE];
