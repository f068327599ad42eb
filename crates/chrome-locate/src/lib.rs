//! # chrome-locate
//!
//! Locate the pinned [Chrome for Testing](https://googlechromelabs.github.io/chrome-for-testing/)
//! `chrome-headless-shell` build that md2pdf prefers over whatever Chrome
//! happens to be installed on the host.
//!
//! ## How it works
//!
//! 1. `MD2PDF_CHROME_PATH` — an explicit binary; used as-is when it exists.
//! 2. `{cache}/md2pdf/chrome-headless-shell-{VERSION}/chrome-headless-shell-{platform}/`
//!    — the per-version install location for the current platform.
//!
//! Nothing here downloads. When the pinned build is missing, callers fall
//! back to a generically discovered Chrome; [`download_url`] tells users
//! where to fetch the archive that unpacks into [`chrome_cache_dir`].
//!
//! ## Platform support
//!
//! | OS      | Arch    | Platform    | Binary                        |
//! |---------|---------|-------------|-------------------------------|
//! | macOS   | arm64   | `mac-arm64` | `chrome-headless-shell`       |
//! | macOS   | x86_64  | `mac-x64`   | `chrome-headless-shell`       |
//! | Linux   | x86_64  | `linux64`   | `chrome-headless-shell`       |
//! | Windows | x86_64  | `win64`     | `chrome-headless-shell.exe`   |
//! | Windows | x86     | `win32`     | `chrome-headless-shell.exe`   |
//!
//! ## Environment variable overrides
//!
//! - `MD2PDF_CHROME_PATH` — path to an existing Chrome/Chromium binary.
//! - `MD2PDF_CHROME_CACHE_DIR` — override the default cache directory.

use std::path::PathBuf;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// The Chrome for Testing release md2pdf is validated against.
pub const CHROME_VERSION: &str = "131.0.6778.204";

/// Chrome for Testing download bucket.
const BASE_URL: &str = "https://storage.googleapis.com/chrome-for-testing-public";

/// Explicit binary override.
pub const CHROME_PATH_ENV: &str = "MD2PDF_CHROME_PATH";

/// Cache directory override.
pub const CACHE_DIR_ENV: &str = "MD2PDF_CHROME_CACHE_DIR";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by chrome-locate operations.
#[derive(Error, Debug)]
pub enum ChromeLocateError {
    /// Chrome for Testing publishes no build for this OS/architecture.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// The pinned build is not installed.
    #[error("Pinned chrome-headless-shell {version} not found at '{path}'")]
    NotInstalled { version: &'static str, path: PathBuf },
}

// ── Platform metadata ────────────────────────────────────────────────────────

/// Chrome for Testing naming for one host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Platform slug used in release asset names, e.g. `linux64`.
    pub platform: &'static str,
    /// Executable filename inside the extracted archive.
    pub binary_name: &'static str,
}

impl PlatformInfo {
    /// Directory the release archive extracts to, e.g. `chrome-headless-shell-linux64`.
    pub fn archive_dir(&self) -> String {
        format!("chrome-headless-shell-{}", self.platform)
    }
}

/// Detect the Chrome for Testing platform for the running host.
pub fn detect_platform() -> Result<PlatformInfo, ChromeLocateError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

fn platform_for(os: &str, arch: &str) -> Result<PlatformInfo, ChromeLocateError> {
    match (os, arch) {
        ("macos", "aarch64") => Ok(PlatformInfo {
            platform: "mac-arm64",
            binary_name: "chrome-headless-shell",
        }),
        ("macos", "x86_64") => Ok(PlatformInfo {
            platform: "mac-x64",
            binary_name: "chrome-headless-shell",
        }),
        ("linux", "x86_64") => Ok(PlatformInfo {
            platform: "linux64",
            binary_name: "chrome-headless-shell",
        }),
        ("windows", "x86_64") => Ok(PlatformInfo {
            platform: "win64",
            binary_name: "chrome-headless-shell.exe",
        }),
        ("windows", "x86") => Ok(PlatformInfo {
            platform: "win32",
            binary_name: "chrome-headless-shell.exe",
        }),
        (os, arch) => Err(ChromeLocateError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the per-version install directory for the pinned build.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/md2pdf/chrome-headless-shell-{VERSION}/`
/// - **Linux**: `~/.cache/md2pdf/chrome-headless-shell-{VERSION}/`
/// - **Windows**: `%LOCALAPPDATA%\md2pdf\chrome-headless-shell-{VERSION}\`
///
/// Override by setting `MD2PDF_CHROME_CACHE_DIR`.
pub fn chrome_cache_dir() -> PathBuf {
    let leaf = format!("chrome-headless-shell-{CHROME_VERSION}");
    if let Ok(override_dir) = std::env::var(CACHE_DIR_ENV) {
        if !override_dir.is_empty() {
            return PathBuf::from(override_dir).join(leaf);
        }
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("md2pdf").join(leaf)
}

/// Where the pinned binary lives for the current platform, whether or not it
/// is installed.
pub fn pinned_binary_path() -> Result<PathBuf, ChromeLocateError> {
    let info = detect_platform()?;
    Ok(chrome_cache_dir()
        .join(info.archive_dir())
        .join(info.binary_name))
}

/// Release archive URL for the pinned build on the current platform.
pub fn download_url() -> Result<String, ChromeLocateError> {
    let info = detect_platform()?;
    Ok(format!(
        "{BASE_URL}/{CHROME_VERSION}/{platform}/{dir}.zip",
        platform = info.platform,
        dir = info.archive_dir()
    ))
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` if a pinned binary is available without any discovery.
///
/// Also returns `true` when `MD2PDF_CHROME_PATH` points to an existing file.
pub fn is_chrome_cached() -> bool {
    cached_chrome_path().is_some()
}

/// Returns the on-disk path to the pinned binary, or `None` if not installed.
pub fn cached_chrome_path() -> Option<PathBuf> {
    locate_pinned().ok()
}

/// Resolve the pinned binary, reporting where it was expected when missing.
pub fn locate_pinned() -> Result<PathBuf, ChromeLocateError> {
    if let Ok(p) = std::env::var(CHROME_PATH_ENV) {
        let pb = PathBuf::from(p);
        if pb.is_file() {
            return Ok(pb);
        }
    }

    let path = pinned_binary_path()?;
    if path.is_file() {
        Ok(path)
    } else {
        Err(ChromeLocateError::NotInstalled {
            version: CHROME_VERSION,
            path,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
