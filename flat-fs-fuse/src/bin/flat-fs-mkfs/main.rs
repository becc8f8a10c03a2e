mod cli;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::sync::Arc;

use clap::Parser;
use flat_fs::FlatFs;
use flat_fs_fuse::SectorFile;

use self::cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.image)?;
    fd.set_len(cli.size.0)?;

    let dev = Arc::new(SectorFile::new(fd)?);
    let mut fs = FlatFs::new(dev);
    let total = fs.format(cli.block_size).expect("format failed");
    println!(
        "{}: {} ({total} blocks * {} B)",
        cli.image.display(),
        cli.size,
        cli.block_size
    );

    if let Some(source) = &cli.source {
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry
                .file_name()
                .into_string()
                .expect("source file name isn't UTF-8");

            let mut data = Vec::new();
            File::open(entry.path())?.read_to_end(&mut data)?;

            let fd = fs.open(&format!("/{name}")).expect("create failed");
            let mut done = 0;
            while done < data.len() {
                done += fs.write(fd, &data[done..]).expect("write failed");
            }
            fs.close(fd).expect("close failed");
            log::info!("packed {name}: {} B", data.len());
        }
    }

    let dir = fs.open_dir("/").expect("open_dir failed");
    while let Some(entry) = fs.read_dir(dir).expect("read_dir failed") {
        println!("inode {:>2}  {}", entry.inode, entry.name);
    }
    fs.close_dir(dir).expect("close_dir failed");

    Ok(())
}
