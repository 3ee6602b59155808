//! Core types for ngsfw-build.
//!
//! This module defines the fundamental types used throughout the library:
//!
//! - [`BuildError`] - Error type for pipeline and tool failures
//! - [`Arch`] / [`Platform`] / [`TargetSlice`] - The architecture/platform
//!   pairs that make up the universal binary
//! - [`TARGETS`] - The default five-pair target table
//! - [`BuildConfig`] / [`BuildResult`] - Input and output of a build run

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Error type for ngsfw-build operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An external tool failed or a pipeline step could not proceed.
    ///
    /// Messages carry the failing command, its working directory, and the
    /// captured output streams.
    #[error("build error: {0}")]
    Build(String),

    /// An I/O error occurred.
    ///
    /// Common causes are missing files, permission issues, or disk space
    /// problems in the output directory.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration, such as an unknown target
    /// pair spelling or an empty target set.
    #[error("configuration error: {0}")]
    Config(String),
}

/// CPU architecture of one framework slice.
///
/// # Example
///
/// ```
/// use ngsfw_build::Arch;
///
/// assert_eq!(Arch::Arm64.as_str(), "arm64");
/// assert!(Arch::Arm64.wants_neon());
/// assert!(!Arch::X86_64.wants_neon());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    /// 32-bit ARM (older iPhones and iPads).
    Armv7,
    /// 32-bit ARM with extended instruction timing (iPhone 5 era).
    Armv7s,
    /// 64-bit ARM (all modern devices).
    Arm64,
    /// 32-bit Intel (simulator on older Macs).
    I386,
    /// 64-bit Intel (simulator).
    X86_64,
}

impl Arch {
    /// Returns the spelling used in build-tree names and toolchain flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Armv7 => "armv7",
            Arch::Armv7s => "armv7s",
            Arch::Arm64 => "arm64",
            Arch::I386 => "i386",
            Arch::X86_64 => "x86_64",
        }
    }

    /// ARM slices get NEON enabled at configure time.
    pub fn wants_neon(&self) -> bool {
        matches!(self, Arch::Armv7 | Arch::Armv7s | Arch::Arm64)
    }
}

impl FromStr for Arch {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "armv7" => Ok(Arch::Armv7),
            "armv7s" => Ok(Arch::Armv7s),
            "arm64" => Ok(Arch::Arm64),
            "i386" => Ok(Arch::I386),
            "x86_64" => Ok(Arch::X86_64),
            other => Err(BuildError::Config(format!(
                "unknown architecture '{}' (expected one of: armv7, armv7s, arm64, i386, x86_64)",
                other
            ))),
        }
    }
}

/// SDK platform of one framework slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Physical devices.
    IphoneOs,
    /// The iOS simulator.
    IphoneSimulator,
}

impl Platform {
    /// Returns the SDK spelling used in build-tree names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::IphoneOs => "iPhoneOS",
            Platform::IphoneSimulator => "iPhoneSimulator",
        }
    }

    /// Value passed as `-DIOS_PLATFORM` to the toolchain file.
    pub fn cmake_name(&self) -> &'static str {
        match self {
            Platform::IphoneOs => "OS",
            Platform::IphoneSimulator => "SIMULATOR",
        }
    }

    /// Whether this slice runs on physical hardware.
    pub fn is_device(&self) -> bool {
        matches!(self, Platform::IphoneOs)
    }
}

impl FromStr for Platform {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iPhoneOS" => Ok(Platform::IphoneOs),
            "iPhoneSimulator" => Ok(Platform::IphoneSimulator),
            other => Err(BuildError::Config(format!(
                "unknown platform '{}' (expected iPhoneOS or iPhoneSimulator)",
                other
            ))),
        }
    }
}

/// One architecture/platform pair with its own isolated build tree.
///
/// Pairs are spelled `<arch>-<platform>` wherever they appear on disk or
/// in configuration, e.g. `arm64-iPhoneOS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSlice {
    pub arch: Arch,
    pub platform: Platform,
}

impl TargetSlice {
    pub const fn new(arch: Arch, platform: Platform) -> Self {
        Self { arch, platform }
    }

    /// Directory name of the per-target build tree, e.g. `armv7-iPhoneOS`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.arch.as_str(), self.platform.as_str())
    }
}

impl fmt::Display for TargetSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch.as_str(), self.platform.as_str())
    }
}

impl FromStr for TargetSlice {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (arch, platform) = s.rsplit_once('-').ok_or_else(|| {
            BuildError::Config(format!(
                "invalid target pair '{}' (expected <arch>-<platform>, e.g. arm64-iPhoneOS)",
                s
            ))
        })?;
        Ok(Self::new(arch.parse()?, platform.parse()?))
    }
}

/// The five slices of the universal binary, in build order.
pub const TARGETS: [TargetSlice; 5] = [
    TargetSlice::new(Arch::Armv7, Platform::IphoneOs),
    TargetSlice::new(Arch::Armv7s, Platform::IphoneOs),
    TargetSlice::new(Arch::Arm64, Platform::IphoneOs),
    TargetSlice::new(Arch::I386, Platform::IphoneSimulator),
    TargetSlice::new(Arch::X86_64, Platform::IphoneSimulator),
];

/// Configuration for a framework build run.
///
/// # Example
///
/// ```
/// use ngsfw_build::{BuildConfig, TARGETS};
///
/// let config = BuildConfig::default();
/// assert_eq!(config.targets, TARGETS.to_vec());
/// assert!(config.jobs.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Target pairs to build. Defaults to [`TARGETS`].
    pub targets: Vec<TargetSlice>,
    /// Parallel job hint for each target's build step. `None` uses one
    /// job per host core. Targets themselves always build sequentially.
    pub jobs: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            targets: TARGETS.to_vec(),
            jobs: None,
        }
    }
}

/// Result of a successful build run.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Path to the assembled framework bundle.
    pub framework_dir: PathBuf,
    /// Target pairs contained in the universal binary.
    pub targets: Vec<TargetSlice>,
}
