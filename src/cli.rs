use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Artifact fetch, download and extraction for perf-test harnesses")]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Fill `{platform}` / `{x64}` placeholders in a file name
    Platform {
        template: String,

        /// Platform identifier (win, mac, linux, ...); defaults to the host
        #[arg(long)]
        platform: Option<String>,

        /// Processor architecture; defaults to the host when --platform is not given
        #[arg(long)]
        processor: Option<String>,
    },
    /// Fetch artifacts described by a tooltool manifest
    Fetch {
        #[arg(long, short = 'm')]
        manifest: PathBuf,

        /// Local run: do not use the shared tooltool cache
        #[arg(long)]
        local: bool,

        /// Directory to fetch into
        #[arg(long, default_value = ".")]
        cwd: PathBuf,
    },
    /// Download a URL to a local path (Exit 0 = present, 1 = not)
    Download {
        url: String,
        dest: PathBuf,

        /// Extract the downloaded archive next to it
        #[arg(long)]
        extract: bool,
    },
    /// Extract a .tar[.bz2|.gz|.xz|.zst] or .zip archive
    Extract {
        archive: PathBuf,

        /// Destination directory; defaults to the archive's directory
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Archive kind (tar or zip); detected from the file name when omitted
        #[arg(long)]
        kind: Option<String>,
    },
    /// List compression codecs and whether this build supports them
    Codecs,
}
