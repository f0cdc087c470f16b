use clap::Parser;
use std::path::PathBuf;

/// Pack host files into an sfs volume image
#[derive(Parser)]
pub struct Cli {
    /// Directory whose regular files are copied into the volume
    #[arg(long, short)]
    pub source: PathBuf,

    /// Volume image file
    #[arg(long, short)]
    pub image: PathBuf,

    /// Add files to an existing image instead of formatting a new one
    #[arg(long, short)]
    pub append: bool,
}
