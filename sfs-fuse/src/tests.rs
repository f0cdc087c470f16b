use std::env;
use std::fs;
use std::path::PathBuf;

use sfs::config::TOTAL_BLOCKS;
use sfs::{BLOCK_SIZE, DeviceError, FsError, SimpleFileSystem};

use super::*;

fn image(name: &str) -> PathBuf {
    env::temp_dir().join(format!("sfs-fuse-{name}-{}.img", std::process::id()))
}

#[test]
fn image_size() {
    let path = image("size");
    let file = BlockFile::create(&path, BLOCK_SIZE, TOTAL_BLOCKS).unwrap();
    assert_eq!(file.block_count(), TOTAL_BLOCKS);
    assert_eq!(
        fs::metadata(&path).unwrap().len(),
        (BLOCK_SIZE * TOTAL_BLOCKS) as u64
    );

    let mut buf = vec![0xFF; BLOCK_SIZE];
    file.read_blocks(TOTAL_BLOCKS - 1, 1, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));
    assert_eq!(
        file.read_blocks(TOTAL_BLOCKS, 1, &mut buf),
        Err(DeviceError::OutOfRange {
            start: TOTAL_BLOCKS,
            count: 1
        })
    );

    fs::remove_file(path).unwrap();
}

#[test]
fn format_then_mount() {
    let path = image("mount");
    let name = path.to_str().unwrap();

    let mut volume = SimpleFileSystem::format::<BlockFile>(name).unwrap();
    let fd = volume.open("hello.txt").unwrap();
    volume.write(fd, b"hello, sfs").unwrap();
    drop(volume);

    let mut volume = SimpleFileSystem::mount::<BlockFile>(name).unwrap();
    let fd = volume.open("hello.txt").unwrap();
    volume.seek(fd, 0).unwrap();
    assert_eq!(volume.read(fd, 64).unwrap(), b"hello, sfs");

    fs::remove_file(path).unwrap();
}

#[test]
fn truncated_image() {
    let path = image("truncated");
    let name = path.to_str().unwrap();
    BlockFile::create(&path, BLOCK_SIZE, TOTAL_BLOCKS - 1).unwrap();

    assert_eq!(
        SimpleFileSystem::mount::<BlockFile>(name).err(),
        Some(FsError::Device(DeviceError::Geometry))
    );

    fs::remove_file(path).unwrap();
}
