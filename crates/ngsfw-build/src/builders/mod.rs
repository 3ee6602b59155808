//! Build automation for the framework bundle.
//!
//! The pipeline lives in [`ios`]; [`common`] provides the subprocess and
//! filesystem helpers it is built on.
//!
//! ## Overview
//!
//! A full run performs, per architecture/platform pair:
//!
//! 1. **Configure** - Generate the build tree with the CMake toolchain
//! 2. **Build** - Compile with a parallel job hint
//! 3. **Install** - Stage headers and static archives under `install/`
//! 4. **Merge** - Fold the installed archives into one per-pair archive
//!
//! and then a single assembly step that combines the merged archives into
//! a universal binary and lays out the versioned bundle with its alias
//! symlinks.

pub mod common;
pub mod ios;

pub use common::Toolchain;
pub use ios::{FRAMEWORK_LINKS, FRAMEWORK_NAME, FrameworkBuilder, MERGED_ARCHIVE, MODULE_MAP};
