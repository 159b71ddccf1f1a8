//! Platform-name templating for manifest and artifact filenames
//!
//! Harness configs name their artifacts with placeholders, e.g.
//! `mitmproxy-rel-bin-{platform}.manifest` or `hostutils{x64}.manifest`.

use std::borrow::Cow;

const PLATFORM_TOKEN: &str = "{platform}";
const X64_TOKEN: &str = "{x64}";

/// Substitute `{platform}` and `{x64}` in `template`.
///
/// `{platform}` becomes `win` for any platform containing "win", `osx` for
/// "mac" and `linux64` for everything else. `{x64}` becomes `_x64` when the
/// processor mentions `x86_64` and the empty string otherwise; with no
/// processor at all it is left in place.
pub fn transform_platform<'a>(
    template: &'a str,
    platform: &str,
    processor: Option<&str>,
) -> Cow<'a, str> {
    if !template.contains(PLATFORM_TOKEN) && !template.contains(X64_TOKEN) {
        return Cow::Borrowed(template);
    }

    let mut out = template.replace(PLATFORM_TOKEN, platform_id(platform));

    if let Some(processor) = processor {
        let x64 = if processor.contains("x86_64") { "_x64" } else { "" };
        out = out.replace(X64_TOKEN, x64);
    }

    Cow::Owned(out)
}

fn platform_id(platform: &str) -> &'static str {
    if platform.contains("win") {
        "win"
    } else if platform == "mac" {
        "osx"
    } else {
        "linux64"
    }
}

/// Platform descriptor of the running host, in harness vocabulary.
///
/// Returns `("win" | "mac" | "linux" | <os>, <arch>)`.
pub fn host_platform() -> (&'static str, &'static str) {
    let platform = match std::env::consts::OS {
        "windows" => "win",
        "macos" => "mac",
        "linux" => "linux",
        other => other,
    };
    (platform, std::env::consts::ARCH)
}
