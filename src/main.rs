mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use harness_fetch::{
    ArchiveKind, Compression, Downloader, Extractor, HarnessConfig, archive_type, host_platform,
    tooltool_download, transform_platform,
};
use log::{error, info};

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    match real_main() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the command reached its post-condition.
fn real_main() -> Result<bool> {
    let args = cli::Args::parse();
    let config = HarnessConfig::load(args.config.as_deref()).context("Failed to load config")?;

    match args.sub {
        cli::Cmd::Platform {
            template,
            platform,
            processor,
        } => {
            let (platform, processor) = match platform {
                Some(platform) => (platform, processor),
                None => {
                    let (host, arch) = host_platform();
                    (host.to_string(), processor.or_else(|| Some(arch.to_string())))
                }
            };
            println!(
                "{}",
                transform_platform(&template, &platform, processor.as_deref())
            );
            Ok(true)
        }
        cli::Cmd::Fetch {
            manifest,
            local,
            cwd,
        } => {
            let status = tooltool_download(&config, &manifest, local, &cwd);
            Ok(status.is_some_and(|s| s.success()))
        }
        cli::Cmd::Download { url, dest, extract } => {
            let downloader =
                Downloader::from_config(&config).context("Failed to build HTTP client")?;
            let ok = downloader
                .download_file_from_url(&url, &dest, extract)
                .with_context(|| format!("Failed to download {url}"))?;
            if !ok {
                error!("{} is not available as requested", dest.display());
            }
            Ok(ok)
        }
        cli::Cmd::Extract {
            archive,
            dest,
            kind,
        } => {
            let kind = match kind {
                Some(kind) => kind.parse::<ArchiveKind>()?,
                None => archive_type(&archive)
                    .ok_or_else(|| anyhow!("Cannot tell archive type of {}", archive.display()))?,
            };
            let dest = dest.unwrap_or_else(|| default_dest(&archive));
            Extractor::from_config(&config)
                .extract(&archive, &dest, kind)
                .with_context(|| format!("Failed to extract {}", archive.display()))?;
            Ok(true)
        }
        cli::Cmd::Codecs => {
            for codec in Compression::ALL {
                let state = if codec.is_available() {
                    "available"
                } else {
                    "unavailable"
                };
                println!("{:<6} {}", codec.name(), state);
            }
            info!(
                "Using tar={} unzip={}",
                config.tar_program.display(),
                config.unzip_program.display()
            );
            Ok(true)
        }
    }
}

fn default_dest(archive: &Path) -> PathBuf {
    match archive.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
