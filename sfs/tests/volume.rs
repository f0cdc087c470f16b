mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use sfs::config::{DIRECTORY_ENTRIES, DIRECTORY_START, TOTAL_BLOCKS};
use sfs::{BLOCK_SIZE, BlockDevice, DeviceError, FsError, SimpleFileSystem, Table};

use common::{RamDisk, fresh, pattern, remount};

#[test]
fn survives_remount() {
    let name = "survives_remount";
    let mut fs = fresh(name);
    let big = pattern(30 * BLOCK_SIZE);

    let fd = fs.open("big").unwrap();
    fs.write(fd, &big).unwrap();
    let fd = fs.open("small").unwrap();
    fs.write(fd, b"tiny").unwrap();
    fs.open("empty").unwrap();
    fs.open("gone").unwrap();
    fs.remove("gone").unwrap();
    let free = fs.free_blocks();
    let allocated = fs.allocated_blocks();
    drop(fs);

    let mut fs = remount(name);
    assert_eq!(fs.filenames().collect::<Vec<_>>(), ["big", "small", "empty"]);
    assert_eq!(fs.file_size("big"), Ok(big.len()));
    assert_eq!(fs.file_size("empty"), Ok(0));
    assert_eq!(fs.file_size("gone"), Err(FsError::NotFound));
    assert_eq!(fs.free_blocks(), free);
    assert_eq!(fs.allocated_blocks(), allocated);

    // 打开文件表不落盘，挂载后从空表开始
    let fd = fs.open("big").unwrap();
    assert_eq!(fd, 0);
    fs.seek(fd, 0).unwrap();
    assert_eq!(fs.read(fd, big.len()).unwrap(), big);
}

#[test]
fn reformat_wipes() {
    let name = "reformat_wipes";
    let mut fs = fresh(name);
    fs.open("old").unwrap();
    drop(fs);

    let fs = fresh(name);
    assert_eq!(fs.filenames().count(), 0);
}

#[test]
fn rejects_foreign_volume() {
    let blank: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(BLOCK_SIZE, TOTAL_BLOCKS));
    assert_eq!(
        SimpleFileSystem::mount_on(blank).err(),
        Some(FsError::InvalidVolume)
    );
}

#[test]
fn rejects_wrong_geometry() {
    let small: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(BLOCK_SIZE, TOTAL_BLOCKS - 1));
    assert_eq!(
        SimpleFileSystem::format_on(small).err(),
        Some(FsError::Device(DeviceError::Geometry))
    );

    let sectors: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(512, 2 * TOTAL_BLOCKS));
    assert_eq!(
        SimpleFileSystem::format_on(sectors).err(),
        Some(FsError::Device(DeviceError::Geometry))
    );

    assert_eq!(
        SimpleFileSystem::mount::<RamDisk>("never formatted").err(),
        Some(FsError::Device(DeviceError::Io))
    );
}

#[test]
fn failed_flush_is_retried() {
    let name = "failed_flush_is_retried";
    let mut fs = fresh(name);
    let disk = RamDisk::volume(name);

    disk.set_broken(true);
    assert_eq!(fs.open("pending"), Err(FsError::Device(DeviceError::Io)));
    // 内存中的表已经更新，只是还没落盘
    assert_eq!(fs.file_size("pending"), Ok(0));
    assert_eq!(fs.sync(), Err(FsError::Device(DeviceError::Io)));

    disk.set_broken(false);
    assert_eq!(fs.sync(), Ok(()));
    assert_eq!(remount(name).file_size("pending"), Ok(0));
}

#[test]
fn failed_pointer_write_keeps_blocks_unshared() {
    let name = "failed_pointer_write_keeps_blocks_unshared";
    let mut fs = fresh(name);
    let disk = RamDisk::volume(name);

    let fd = fs.open("a").unwrap();
    fs.write(fd, &pattern(13 * BLOCK_SIZE)).unwrap();
    let before = fs.block_map("a").unwrap();
    let indirect = *before.last().unwrap();

    // 数据块写成功，间接索引块写失败
    disk.set_bad_block(Some(indirect));
    assert_eq!(
        fs.write(fd, &pattern(BLOCK_SIZE)),
        Err(FsError::Device(DeviceError::Io))
    );
    disk.set_bad_block(None);
    fs.sync().unwrap();
    assert_eq!(fs.block_map("a").unwrap(), before);
    assert_eq!(fs.file_size("a"), Ok(13 * BLOCK_SIZE));

    let fd = fs.open("b").unwrap();
    fs.write(fd, &pattern(BLOCK_SIZE)).unwrap();

    let a: BTreeSet<u32> = fs.block_map("a").unwrap().into_iter().collect();
    let b: BTreeSet<u32> = fs.block_map("b").unwrap().into_iter().collect();
    assert!(a.is_disjoint(&b), "blocks shared: {:?}", a.intersection(&b));
    let allocated: BTreeSet<u32> = fs.allocated_blocks().into_iter().collect();
    assert_eq!(&a | &b, allocated);
}

#[test]
fn failed_data_write_leaves_hole() {
    let name = "failed_data_write_leaves_hole";
    let mut fs = fresh(name);
    let disk = RamDisk::volume(name);

    // 让下一次分配拿到一块写过旧内容的块
    let fd = fs.open("old").unwrap();
    fs.write(fd, &[0xAA; BLOCK_SIZE]).unwrap();
    fs.remove("old").unwrap();

    let fd = fs.open("a").unwrap();
    fs.seek(fd, BLOCK_SIZE).unwrap();
    disk.set_broken(true);
    assert_eq!(fs.write(fd, b"lost"), Err(FsError::Device(DeviceError::Io)));
    disk.set_broken(false);

    assert_eq!(fs.stat("a").unwrap().blocks, 0);
    assert!(fs.allocated_blocks().is_empty());

    fs.seek(fd, 3 * BLOCK_SIZE).unwrap();
    fs.write(fd, b"end").unwrap();
    fs.seek(fd, 0).unwrap();
    let content = fs.read(fd, 4 * BLOCK_SIZE).unwrap();
    assert!(content[..3 * BLOCK_SIZE].iter().all(|&b| b == 0));
    assert_eq!(&content[3 * BLOCK_SIZE..], b"end");
}

#[test]
fn full_directory_rolls_back_inode() {
    let name = "full_directory_rolls_back_inode";
    fresh(name);
    let disk = RamDisk::volume(name);

    // 直接改写目录区域：占满全部目录项，而索引节点表保持为空
    let mut raw = vec![0u8; 3 * BLOCK_SIZE];
    for (slot, entry) in raw.chunks_mut(24).take(DIRECTORY_ENTRIES).enumerate() {
        entry[0] = 1;
        entry[4..8].copy_from_slice(&(slot as i32 + 1).to_ne_bytes());
        let file_name = format!("ghost{slot}");
        entry[8..8 + file_name.len()].copy_from_slice(file_name.as_bytes());
    }
    disk.write_blocks(DIRECTORY_START, 3, &raw).unwrap();

    let mut fs = remount(name);
    assert_eq!(fs.filenames().count(), DIRECTORY_ENTRIES);

    // 若 inode 没有回滚，索引节点表会在 100 次之后先满
    for i in 0..150 {
        assert_eq!(
            fs.open(&format!("new{i}")),
            Err(FsError::TableFull(Table::Directory))
        );
    }
}

#[test]
fn shared_across_threads() {
    let fs = fresh("shared_across_threads").shared();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let name = format!("worker{i}");
                let data = pattern(5 * BLOCK_SIZE + i);
                for chunk in data.chunks(300) {
                    let mut fs = fs.lock();
                    let fd = fs.open(&name).unwrap();
                    assert_eq!(fs.write(fd, chunk), Ok(chunk.len()));
                    fs.close(fd).unwrap();
                }
                data
            })
        })
        .collect();

    for (i, worker) in workers.into_iter().enumerate() {
        let data = worker.join().unwrap();
        let mut fs = fs.lock();
        let fd = fs.open(&format!("worker{i}")).unwrap();
        fs.seek(fd, 0).unwrap();
        assert_eq!(fs.read(fd, data.len() + 1).unwrap(), data);
    }
}
