//! Archive kind and compression detection from a path's suffix chain

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ExtractError;

/// Container format of an archive, independent of its compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    Zip,
}

impl ArchiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Tar => "tar",
            ArchiveKind::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tar" => Ok(ArchiveKind::Tar),
            "zip" => Ok(ArchiveKind::Zip),
            other => Err(ExtractError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Infer the archive kind from up to two levels of extension.
///
/// When the name has two extensions the inner one decides, so
/// `foo.tar.gz` is a tar; otherwise the only extension is used.
/// Returns `None` for anything that is not a tar or zip.
pub fn archive_type(path: impl AsRef<Path>) -> Option<ArchiveKind> {
    let path = path.as_ref();
    let outer = path.extension()?;
    let inner = path.file_stem().map(Path::new).and_then(Path::extension);

    match inner.unwrap_or(outer).to_str()? {
        "tar" => Some(ArchiveKind::Tar),
        "zip" => Some(ArchiveKind::Zip),
        _ => None,
    }
}

/// Compression applied on top of a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Bzip2,
    Gzip,
    Xz,
    Zstd,
}

impl Compression {
    pub const ALL: [Compression; 5] = [
        Compression::None,
        Compression::Bzip2,
        Compression::Gzip,
        Compression::Xz,
        Compression::Zstd,
    ];

    /// Select the codec from the final suffix of a tar archive path.
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bz2") => Ok(Compression::Bzip2),
            Some("gz") => Ok(Compression::Gzip),
            Some("xz") => Ok(Compression::Xz),
            Some("zst") => Ok(Compression::Zstd),
            Some("tar") => Ok(Compression::None),
            _ => Err(ExtractError::UnsupportedFormat(format!(
                "unknown archive format for tar file: {}",
                path.display()
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Bzip2 => "bz2",
            Compression::Gzip => "gzip",
            Compression::Xz => "xz",
            Compression::Zstd => "zstd",
        }
    }

    /// Whether this build can decode the codec.
    pub fn is_available(&self) -> bool {
        match self {
            Compression::None | Compression::Bzip2 | Compression::Gzip => true,
            Compression::Xz => cfg!(feature = "xz"),
            Compression::Zstd => cfg!(feature = "zstd"),
        }
    }
}

/// Codecs this build can decode.
pub fn available_codecs() -> Vec<Compression> {
    Compression::ALL
        .into_iter()
        .filter(Compression::is_available)
        .collect()
}
