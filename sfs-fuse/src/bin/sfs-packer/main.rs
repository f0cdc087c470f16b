mod cli;

use std::error::Error;
use std::fs;

use clap::Parser;
use cli::Cli;
use sfs::{FsError, SimpleFileSystem};
use sfs_fuse::BlockFile;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}\nimage={:?}", cli.source, cli.image);

    let image = cli.image.to_str().ok_or("image path isn't valid UTF-8")?;
    let mut volume = if cli.append {
        SimpleFileSystem::mount::<BlockFile>(image)?
    } else {
        SimpleFileSystem::format::<BlockFile>(image)?
    };

    for entry in fs::read_dir(&cli.source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            log::warn!("skip {:?}: name isn't valid UTF-8", entry.file_name());
            continue;
        };

        let data = fs::read(entry.path())?;
        if volume.file_size(&name).is_ok() {
            // 同名文件整体替换
            volume.remove(&name)?;
        }
        let fd = match volume.open(&name) {
            Ok(fd) => fd,
            Err(err @ (FsError::NameTooLong | FsError::InvalidName)) => {
                log::warn!("skip {name:?}: {err}");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let written = volume.write(fd, &data)?;
        volume.close(fd)?;

        if written < data.len() {
            log::warn!("{name:?}: only {written} of {} bytes fit", data.len());
        }
        log::info!("file={name:?}, size={written}");
    }

    let names: Vec<String> = volume.filenames().map(str::to_owned).collect();
    for name in names {
        let stat = volume.stat(&name)?;
        println!("{name:<16} {:>8} bytes {:>4} blocks", stat.size, stat.blocks);
    }
    println!("{} blocks free", volume.free_blocks());

    Ok(())
}
