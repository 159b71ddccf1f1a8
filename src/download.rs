//! Blocking file download with optional extraction

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use log::info;
use reqwest::blocking::Client;
use url::Url;

use crate::archive::archive_type;
use crate::config::HarnessConfig;
use crate::error::DownloadError;
use crate::extract::Extractor;

/// Network layer used by [`Downloader`].
pub trait HttpFetch {
    /// Save the body at `url` to `dest`, replacing any existing file.
    fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// `reqwest`-backed fetcher; also accepts `file://` URLs.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(config: &HarnessConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.as_str())
            // No overall deadline: large artifacts may take a long time.
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let parsed = Url::parse(url).map_err(|source| DownloadError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        // Write next to the destination and rename, so an interrupted
        // download never looks like a finished one.
        let dir = parent_dir(dest);
        let mut partial = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(dir)?;

        if parsed.scheme() == "file" {
            let source = parsed.to_file_path().map_err(|()| DownloadError::InvalidUrl {
                url: url.to_string(),
                source: url::ParseError::RelativeUrlWithoutBase,
            })?;
            io::copy(&mut File::open(source)?, partial.as_file_mut())?;
        } else {
            let mut response = self.client.get(parsed).send()?;
            if !response.status().is_success() {
                return Err(DownloadError::Status {
                    url: url.to_string(),
                    status: response.status(),
                });
            }
            response.copy_to(partial.as_file_mut())?;
        }

        partial.persist(dest).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Downloads files and optionally unpacks them next to themselves.
pub struct Downloader<F = ReqwestFetcher> {
    fetcher: F,
    extractor: Extractor,
}

impl Downloader<ReqwestFetcher> {
    pub fn from_config(config: &HarnessConfig) -> Result<Self, DownloadError> {
        Ok(Self::with_fetcher(
            ReqwestFetcher::new(config)?,
            Extractor::from_config(config),
        ))
    }
}

impl<F: HttpFetch> Downloader<F> {
    pub fn with_fetcher(fetcher: F, extractor: Extractor) -> Self {
        Self { fetcher, extractor }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Make sure `local_dest` holds the content of `url`, extracting it when asked.
    ///
    /// An existing `local_dest` is trusted as-is and never re-downloaded. With
    /// `extract` the archive is unpacked into the directory containing
    /// `local_dest`; `Ok(false)` means the file is not a recognized archive.
    pub fn download_file_from_url(
        &self,
        url: &str,
        local_dest: &Path,
        extract: bool,
    ) -> Result<bool, DownloadError> {
        if local_dest.exists() {
            info!("file already exists at: {}", local_dest.display());
            if !extract {
                return Ok(true);
            }
        } else {
            info!("downloading: {} to {}", url, local_dest.display());
            self.fetcher.fetch_to(url, local_dest)?;
        }

        if !extract {
            return Ok(local_dest.exists());
        }

        let Some(kind) = archive_type(local_dest) else {
            return Ok(false);
        };

        self.extractor
            .extract(local_dest, parent_dir(local_dest), kind)?;
        Ok(true)
    }
}

/// Download `url` to `local_dest` with default settings.
pub fn download_file_from_url(
    url: &str,
    local_dest: impl AsRef<Path>,
    extract: bool,
) -> Result<bool, DownloadError> {
    Downloader::from_config(&HarnessConfig::default())?.download_file_from_url(
        url,
        local_dest.as_ref(),
        extract,
    )
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
