//! Supported host platforms and their pinned `clo` downloads.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pinned `clo` release.
pub const CLO_VERSION: &str = "1.3.63";

/// Host operating systems with a published `clo` build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
}

/// Archive container used by a platform's release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Flags passed to `tar` to extract this format.
    pub fn tar_flags(&self) -> &'static str {
        match self {
            Self::Zip => "-xf",
            Self::TarGz => "-xzf",
        }
    }
}

/// Where to fetch `clo` for one platform and what the download contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub download_url: &'static str,
    pub archive_name: &'static str,
    pub executable_name: &'static str,
    pub format: ArchiveFormat,
}

static WINDOWS_PROFILE: PlatformProfile = PlatformProfile {
    platform: Platform::Windows,
    download_url: "https://cloudpub.ru/download/stable/clo-1.3.63-stable-windows-x86_64.zip",
    archive_name: "clo.zip",
    executable_name: "clo.exe",
    format: ArchiveFormat::Zip,
};

static LINUX_PROFILE: PlatformProfile = PlatformProfile {
    platform: Platform::Linux,
    download_url: "https://cloudpub.ru/download/stable/clo-1.3.63-stable-linux-x86_64.tar.gz",
    archive_name: "clo-1.3.63-stable-linux-x86_64.tar.gz",
    executable_name: "clo",
    format: ArchiveFormat::TarGz,
};

impl Platform {
    /// Resolve the platform this process is running on.
    pub fn current() -> Result<Self> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Resolve a platform from an OS name as reported by `std::env::consts::OS`.
    pub fn from_os_name(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(Error::UnsupportedPlatform(other.to_string())),
        }
    }

    /// The download profile for this platform.
    pub fn profile(&self) -> &'static PlatformProfile {
        match self {
            Self::Windows => &WINDOWS_PROFILE,
            Self::Linux => &LINUX_PROFILE,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Linux => write!(f, "linux"),
        }
    }
}
