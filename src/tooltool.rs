//! Manifest-driven artifact fetch through the external tooltool client
//!
//! Best effort: nothing here returns an error. Failures are logged and the
//! caller is expected to check that the files it needs actually arrived.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use log::{error, info, warn};

use crate::config::HarnessConfig;

/// Command line for fetching `manifest`.
///
/// Local runs skip the shared cache; automation passes `-c <cache>` so
/// repeated runs reuse earlier downloads.
pub fn fetch_command(config: &HarnessConfig, manifest: &Path, run_local: bool) -> Vec<OsString> {
    let tool = config.tooltool_path();
    let mut command = Vec::with_capacity(8);

    if tool.extension().and_then(|e| e.to_str()) == Some("py") {
        command.push(python_interpreter(config).into_os_string());
    }
    command.push(tool.into_os_string());
    command.extend(["fetch", "-o", "-m"].map(OsString::from));
    command.push(manifest.as_os_str().to_owned());

    if !run_local {
        command.push("-c".into());
        command.push(config.tooltool_cache.as_os_str().to_owned());
    }
    command
}

fn python_interpreter(config: &HarnessConfig) -> PathBuf {
    if let Some(python) = &config.python {
        return python.clone();
    }
    which::which("python3")
        .or_else(|_| which::which("python"))
        .unwrap_or_else(|_| PathBuf::from("python3"))
}

/// Fetch the artifacts described by `manifest` into `cwd`.
///
/// Output of the tool is forwarded to the log line by line. Returns the exit
/// status when one could be obtained; a failed fetch is never an error.
pub fn tooltool_download(
    config: &HarnessConfig,
    manifest: &Path,
    run_local: bool,
    cwd: &Path,
) -> Option<ExitStatus> {
    let command = fetch_command(config, manifest, run_local);
    let (program, args) = command.split_first()?;

    info!("Running {:?} in {}", command, cwd.display());
    let mut child = match Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!("Failed to launch {}: {}", program.to_string_lossy(), e);
            return None;
        }
    };

    let stderr = child
        .stderr
        .take()
        .map(|stderr| thread::spawn(move || forward_lines(stderr)));
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout);
    }
    if let Some(handle) = stderr
        && handle.join().is_err()
    {
        warn!("tooltool stderr forwarder panicked");
    }

    match child.wait() {
        Ok(status) => {
            if !status.success() {
                warn!("tooltool fetch of {} exited with {}", manifest.display(), status);
            }
            Some(status)
        }
        Err(e) => {
            error!("Failed waiting for tooltool: {}", e);
            terminate_if_running(&mut child);
            None
        }
    }
}

/// Log `stream` line by line until EOF.
///
/// Lines need not be UTF-8. The pipe is drained to the end so the tool
/// never sees its output closed underneath it.
fn forward_lines(stream: impl Read) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                info!("{}", text.trim_end_matches(['\n', '\r']));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Stopped reading tooltool output: {}", e);
                break;
            }
        }
    }
}

/// Terminate `child` unless it has already exited.
fn terminate_if_running(child: &mut Child) {
    if !matches!(child.try_wait(), Ok(None)) {
        return;
    }

    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Err(e) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
            warn!("Failed to terminate tooltool (pid {}): {}", child.id(), e);
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = child.kill() {
            warn!("Failed to terminate tooltool (pid {}): {}", child.id(), e);
        }
    }
}
