use std::path::PathBuf;

use clap::Parser;
use typed_bytesize::ByteSizeIec;

#[derive(Parser)]
pub struct Cli {
    /// Disk image to create
    pub image: PathBuf,

    /// Device size, e.g. `1MiB`
    #[arg(long, default_value = "1MiB")]
    pub size: ByteSizeIec,

    /// Filesystem block size in bytes
    #[arg(long, default_value_t = 4096)]
    pub block_size: u32,

    /// Host directory whose regular files get packed into the root directory
    #[arg(long, short)]
    pub source: Option<PathBuf>,
}
