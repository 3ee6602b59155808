//! Build automation for the universal `ngstore.framework` iOS bundle.
//!
//! This library drives a CMake-based cross-compilation toolchain to build
//! the store and visualisation support library once per target pair,
//! merges each pair's static archives, combines the merged archives into
//! a single universal binary, and assembles a framework bundle with
//! headers, resources, a module map, and the `Versions/Current` alias
//! symlinks.
//!
//! # Quick Start
//!
//! ```no_run
//! use ngsfw_build::{BuildConfig, FrameworkBuilder};
//!
//! let builder = FrameworkBuilder::new("/opt/src/ngstore");
//! let result = builder.build("/tmp/ngs-out", &BuildConfig::default())?;
//! println!("Framework at {}", result.framework_dir.display());
//! # Ok::<(), ngsfw_build::BuildError>(())
//! ```
//!
//! # External tools
//!
//! Everything platform-specific is delegated to external tools: `cmake`
//! (configure, build, install), `libtool` (archive merge), `lipo`
//! (universal binary), and `xcodebuild` (SDK version query). See
//! [`builders::Toolchain`] for overriding their locations.

#[cfg(not(unix))]
compile_error!(
    "ngsfw assembles Apple framework bundles with symbolic links and requires a Unix host."
);

pub mod builders;
pub mod types;

pub use builders::{FrameworkBuilder, Toolchain};
pub use types::{Arch, BuildConfig, BuildError, BuildResult, Platform, TARGETS, TargetSlice};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
