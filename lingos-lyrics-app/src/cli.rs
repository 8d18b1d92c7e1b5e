use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lingos-lyrics", version, about)]
pub struct Args {
    /// Config file (defaults to ~/.config/lingos-lyrics/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Play the built-in mock song instead of reading host events
    #[arg(long, short = 'm')]
    pub mock: bool,

    /// Use this LRC file for every song instead of fetching lyrics
    #[arg(long)]
    pub lrc: Option<PathBuf>,

    /// Print the default config.toml to stdout
    #[arg(long)]
    pub generate_config: bool,
}
