//! Support utilities for browser performance-test harnesses
//!
//! Each helper is independent and blocking:
//!
//! - [`transform_platform`] fills `{platform}` / `{x64}` placeholders in file names
//! - [`tooltool_download`] fetches manifest-described artifacts with the external tooltool client
//! - [`archive_type`] and [`extract_archive`] detect and unpack `.tar*` / `.zip` archives
//! - [`Downloader::download_file_from_url`] downloads a file and optionally extracts it
//!
//! Configuration lives in [`HarnessConfig`], resolved once at startup and passed
//! down explicitly.

pub mod archive;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod platform;
pub mod tooltool;

pub use archive::{ArchiveKind, Compression, archive_type, available_codecs};
pub use config::HarnessConfig;
pub use download::{Downloader, HttpFetch, ReqwestFetcher, download_file_from_url};
pub use error::{ConfigError, DownloadError, ExtractError};
pub use extract::{Extractor, extract_archive};
pub use platform::{host_platform, transform_platform};
pub use tooltool::tooltool_download;
