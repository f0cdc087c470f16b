//! 用宿主机上的普通文件模拟块设备

#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use block_dev::{BlockDevice, DeviceError, Disk};

/// 镜像文件，第 `i` 块位于偏移 `i * block_size` 处
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    block_size: usize,
    block_count: usize,
}

impl BlockFile {
    /// 创建或截断镜像文件，并扩展到卷的大小；新文件的内容全为零
    pub fn create(path: impl AsRef<Path>, block_size: usize, block_count: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((block_size * block_count) as u64)?;

        Ok(Self::new(file, block_size, block_count))
    }

    /// 打开已有的镜像文件，其大小必须恰好容纳整个卷
    pub fn open(path: impl AsRef<Path>, block_size: usize, block_count: usize) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len != (block_size * block_count) as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image holds {len} bytes, expected {block_count} blocks of {block_size}"),
            ));
        }

        Ok(Self::new(file, block_size, block_count))
    }

    fn new(file: File, block_size: usize, block_count: usize) -> Self {
        Self {
            file: Mutex::new(file),
            block_size,
            block_count,
        }
    }

    fn seek_to(&self, file: &mut File, block_id: usize) -> io::Result<u64> {
        file.seek(SeekFrom::Start((block_id * self.block_size) as u64))
    }
}

impl BlockDevice for BlockFile {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_blocks(&self, start: usize, count: usize, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.check_transfer(start, count, buf.len())?;
        let mut file = self.file.lock().map_err(|_| DeviceError::Io)?;
        self.seek_to(&mut file, start)
            .and_then(|_| file.read_exact(buf))
            .map_err(|err| io_error("read", start, err))?;
        Ok(count)
    }

    fn write_blocks(&self, start: usize, count: usize, buf: &[u8]) -> Result<usize, DeviceError> {
        self.check_transfer(start, count, buf.len())?;
        let mut file = self.file.lock().map_err(|_| DeviceError::Io)?;
        self.seek_to(&mut file, start)
            .and_then(|_| file.write_all(buf))
            .map_err(|err| io_error("write", start, err))?;
        Ok(count)
    }
}

impl Disk for BlockFile {
    fn init_fresh(name: &str, block_size: usize, block_count: usize) -> Result<Self, DeviceError> {
        Self::create(name, block_size, block_count).map_err(|err| {
            log::error!("failed to create image {name:?}: {err}");
            DeviceError::Io
        })
    }

    fn init_existing(name: &str, block_size: usize, block_count: usize) -> Result<Self, DeviceError> {
        Self::open(name, block_size, block_count).map_err(|err| {
            log::error!("failed to open image {name:?}: {err}");
            match err.kind() {
                io::ErrorKind::InvalidData => DeviceError::Geometry,
                _ => DeviceError::Io,
            }
        })
    }
}

fn io_error(op: &str, block_id: usize, err: io::Error) -> DeviceError {
    log::error!("{op} at block {block_id}: {err}");
    DeviceError::Io
}
