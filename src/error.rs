//! Error types for extraction, download and configuration

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while extracting an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive needs a codec this build was compiled without.
    #[error("{0} decompression support is not available in this build")]
    UnavailableFeature(&'static str),

    /// Archive kind or compression suffix is not recognized.
    #[error("unknown archive format: {0}")]
    UnsupportedFormat(String),

    /// The extraction subprocess exited unsuccessfully.
    #[error("{}", exit_message(.command, *.code))]
    ExtractionFailed { command: String, code: Option<i32> },

    /// Reading the decompressed stream failed before the subprocess finished.
    #[error("failed to decompress {}: {source}", .path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_message(command: &str, code: Option<i32>) -> String {
    match code {
        Some(code) => format!("{command:?} exited {code}"),
        None => format!("{command:?} was terminated by a signal"),
    }
}

/// Errors raised while downloading a file.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("failed to download {url}: HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid download url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
