//! Archive extraction through the system `tar` / `unzip`
//!
//! Tar archives are decompressed in-process and streamed into `tar xf -` in
//! fixed-size chunks, so codecs the system tar does not know about still work
//! and memory use stays flat regardless of archive size. Zip archives are
//! handed to `unzip` by path because it cannot read from a pipe reliably.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, ExitStatus, Stdio};
use std::time::Instant;

use log::info;

use crate::archive::{ArchiveKind, Compression};
use crate::config::HarnessConfig;
use crate::error::ExtractError;

/// Chunk size used when feeding the tar subprocess.
pub const PIPE_CHUNK_SIZE: usize = 128 * 1024;

/// Decompressed tar byte stream.
enum TarStream {
    Plain(BufReader<File>),
    Bzip2(bzip2::read::MultiBzDecoder<BufReader<File>>),
    Gzip(flate2::read::MultiGzDecoder<BufReader<File>>),
    #[cfg(feature = "xz")]
    Xz(xz2::read::XzDecoder<BufReader<File>>),
    #[cfg(feature = "zstd")]
    Zstd(zstd::stream::read::Decoder<'static, BufReader<File>>),
}

impl TarStream {
    /// Open `path` with the decoder for `compression`.
    ///
    /// Codec availability is checked before the file is touched.
    fn open(path: &Path, compression: Compression) -> Result<Self, ExtractError> {
        if !compression.is_available() {
            return Err(ExtractError::UnavailableFeature(compression.name()));
        }

        let file = File::open(path)?;
        let stream = match compression {
            Compression::None => TarStream::Plain(BufReader::new(file)),
            Compression::Bzip2 => {
                TarStream::Bzip2(bzip2::read::MultiBzDecoder::new(BufReader::new(file)))
            }
            Compression::Gzip => {
                TarStream::Gzip(flate2::read::MultiGzDecoder::new(BufReader::new(file)))
            }
            #[cfg(feature = "xz")]
            Compression::Xz => {
                TarStream::Xz(xz2::read::XzDecoder::new_multi_decoder(BufReader::new(file)))
            }
            #[cfg(feature = "zstd")]
            Compression::Zstd => TarStream::Zstd(zstd::stream::read::Decoder::new(file)?),
            #[allow(unreachable_patterns)]
            other => return Err(ExtractError::UnavailableFeature(other.name())),
        };
        Ok(stream)
    }
}

impl Read for TarStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TarStream::Plain(reader) => reader.read(buf),
            TarStream::Bzip2(reader) => reader.read(buf),
            TarStream::Gzip(reader) => reader.read(buf),
            #[cfg(feature = "xz")]
            TarStream::Xz(reader) => reader.read(buf),
            #[cfg(feature = "zstd")]
            TarStream::Zstd(reader) => reader.read(buf),
        }
    }
}

/// Why the copy loop stopped early.
enum PipeError {
    Read(io::Error),
    Write(io::Error),
}

/// Copy `reader` into the subprocess stdin in `PIPE_CHUNK_SIZE` chunks.
fn pipe_into(reader: &mut impl Read, stdin: &mut ChildStdin) -> Result<u64, PipeError> {
    let mut buf = vec![0u8; PIPE_CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(written),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(PipeError::Read(e)),
        };
        stdin.write_all(&buf[..n]).map_err(PipeError::Write)?;
        written += n as u64;
    }
}

/// Runs the external extraction tools.
#[derive(Debug, Clone)]
pub struct Extractor {
    tar_program: PathBuf,
    unzip_program: PathBuf,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::from_config(&HarnessConfig::default())
    }
}

impl Extractor {
    pub fn new(tar_program: impl Into<PathBuf>, unzip_program: impl Into<PathBuf>) -> Self {
        Self {
            tar_program: tar_program.into(),
            unzip_program: unzip_program.into(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(&config.tar_program, &config.unzip_program)
    }

    /// Extract `path` into `dest_dir`, which becomes the subprocess working directory.
    pub fn extract(
        &self,
        path: &Path,
        dest_dir: &Path,
        kind: ArchiveKind,
    ) -> Result<(), ExtractError> {
        let path = std::path::absolute(path)?;
        let dest_dir = std::path::absolute(dest_dir)?;

        // Everything that can reject the archive happens before spawning.
        let (program, args, stream): (&PathBuf, Vec<OsString>, Option<TarStream>) = match kind {
            ArchiveKind::Tar => {
                let compression = Compression::from_path(&path)?;
                let stream = TarStream::open(&path, compression)?;
                (&self.tar_program, vec!["xf".into(), "-".into()], Some(stream))
            }
            ArchiveKind::Zip => (
                &self.unzip_program,
                vec!["-o".into(), path.clone().into_os_string()],
                None,
            ),
        };

        std::fs::create_dir_all(&dest_dir)?;

        let command = render_command(program, &args);
        info!(
            "Extracting {} to {} using {:?}",
            path.display(),
            dest_dir.display(),
            command
        );
        let started = Instant::now();

        let mut child = Command::new(program)
            .args(&args)
            .current_dir(&dest_dir)
            .stdin(if stream.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .spawn()?;

        let piped = match (stream, child.stdin.take()) {
            (Some(mut stream), Some(mut stdin)) => {
                let result = pipe_into(&mut stream, &mut stdin);
                // Closing stdin signals end of archive to tar.
                drop(stdin);
                result.map(Some)
            }
            _ => Ok(None),
        };

        let status = child.wait()?;
        settle(piped, status, &path, command)?;

        info!(
            "{} extracted in {:.3}s",
            path.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

/// Combine the outcome of feeding the subprocess with its exit status.
///
/// A decoder failure always wins. A write failure only surfaces on its own
/// when the subprocess claims success; a broken pipe never does.
fn settle(
    piped: Result<Option<u64>, PipeError>,
    status: ExitStatus,
    path: &Path,
    command: String,
) -> Result<(), ExtractError> {
    match piped {
        Err(PipeError::Read(source)) => {
            return Err(ExtractError::Decompress {
                path: path.to_path_buf(),
                source,
            });
        }
        // tar closed its end early; its exit status carries the real error.
        Err(PipeError::Write(e)) if e.kind() == ErrorKind::BrokenPipe => {}
        Err(PipeError::Write(e)) if status.success() => return Err(e.into()),
        Err(PipeError::Write(_)) | Ok(_) => {}
    }

    if !status.success() {
        return Err(ExtractError::ExtractionFailed {
            command,
            code: status.code(),
        });
    }
    Ok(())
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(|a| a.as_os_str()))
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract `path` into `dest_dir` with the default `tar` / `unzip` programs.
pub fn extract_archive(
    path: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
    kind: ArchiveKind,
) -> Result<(), ExtractError> {
    Extractor::default().extract(path.as_ref(), dest_dir.as_ref(), kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_tar_suffix_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.tgz");
        std::fs::write(&archive, b"not really").unwrap();

        // A program that cannot exist; reaching spawn would surface as Io.
        let extractor = Extractor::new(dir.path().join("no-such-tar"), "unzip");
        let err = extractor
            .extract(&archive, dir.path(), ArchiveKind::Tar)
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)), "{err:?}");
    }

    #[test]
    fn missing_archive_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_archive(dir.path().join("gone.tar.gz"), dir.path(), ArchiveKind::Tar)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io(ref e) if e.kind() == ErrorKind::NotFound));
    }

    #[cfg(not(feature = "xz"))]
    #[test]
    fn xz_without_feature_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.tar.xz");
        std::fs::write(&archive, b"").unwrap();
        let err = extract_archive(&archive, dir.path(), ArchiveKind::Tar).unwrap_err();
        assert!(matches!(err, ExtractError::UnavailableFeature("xz")));
    }

    #[test]
    fn command_is_rendered_for_errors_and_logs() {
        let args = vec!["xf".into(), "-".into()];
        assert_eq!(render_command(Path::new("tar"), &args), "tar xf -");
    }

    #[test]
    fn pipe_copies_everything_in_chunks() {
        use std::process::Command;

        if which::which("wc").is_err() {
            return;
        }
        let data = vec![7u8; PIPE_CHUNK_SIZE * 2 + 17];
        let mut child = Command::new("wc")
            .arg("-c")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let mut stdin = child.stdin.take().unwrap();
        let written = match pipe_into(&mut data.as_slice(), &mut stdin) {
            Ok(n) => n,
            Err(_) => panic!("pipe failed"),
        };
        drop(stdin);
        let output = child.wait_with_output().unwrap();
        assert_eq!(written, data.len() as u64);
        let counted: u64 = String::from_utf8_lossy(&output.stdout).trim().parse().unwrap();
        assert_eq!(counted, data.len() as u64);
    }

    #[cfg(unix)]
    mod outcome {
        use super::*;
        use std::os::unix::process::ExitStatusExt;

        const OK: i32 = 0;
        const EXIT_3: i32 = 3 << 8;

        fn run(piped: Result<Option<u64>, PipeError>, raw: i32) -> Result<(), ExtractError> {
            settle(
                piped,
                ExitStatus::from_raw(raw),
                Path::new("/tmp/a.tar.gz"),
                "tar xf -".to_string(),
            )
        }

        #[test]
        fn decoder_error_wins_over_exit_status() {
            let read = || PipeError::Read(io::Error::new(ErrorKind::InvalidData, "bad block"));
            assert!(matches!(run(Err(read()), OK), Err(ExtractError::Decompress { .. })));
            assert!(matches!(run(Err(read()), EXIT_3), Err(ExtractError::Decompress { .. })));
        }

        #[test]
        fn broken_pipe_defers_to_exit_status() {
            let broken = || PipeError::Write(io::Error::from(ErrorKind::BrokenPipe));
            assert!(run(Err(broken()), OK).is_ok());
            assert!(matches!(
                run(Err(broken()), EXIT_3),
                Err(ExtractError::ExtractionFailed { code: Some(3), .. })
            ));
        }

        #[test]
        fn other_write_error_is_io_unless_tar_failed() {
            let write = || PipeError::Write(io::Error::other("disk on fire"));
            assert!(matches!(run(Err(write()), OK), Err(ExtractError::Io(_))));
            assert!(matches!(
                run(Err(write()), EXIT_3),
                Err(ExtractError::ExtractionFailed { code: Some(3), .. })
            ));
        }
    }
}
