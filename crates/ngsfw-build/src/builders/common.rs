//! Shared helpers for the framework build pipeline.
//!
//! Every external tool is reached through a [`Toolchain`] table so callers
//! can pin concrete binaries (a Homebrew cmake, a stubbed toolchain in
//! tests) instead of taking whatever is first on `PATH`.
//!
//! All failure messages include what went wrong, where it happened
//! (command, working directory), and the captured tool output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::types::BuildError;

/// Locations of the external tools the pipeline shells out to.
///
/// The defaults resolve each tool by name on `PATH`, which is correct on
/// a stock macOS host with the Xcode command-line tools installed.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Build-system generator and build driver.
    pub cmake: PathBuf,
    /// Static-archive merge tool.
    pub libtool: PathBuf,
    /// Multi-architecture binary combination tool.
    pub lipo: PathBuf,
    /// Platform SDK version query tool.
    pub xcodebuild: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            cmake: PathBuf::from("cmake"),
            libtool: PathBuf::from("libtool"),
            lipo: PathBuf::from("lipo"),
            xcodebuild: PathBuf::from("xcodebuild"),
        }
    }
}

/// Runs an external command to completion, capturing its output.
///
/// # Arguments
/// * `cmd` - The command to execute
/// * `description` - Human-readable description of what the command does
///
/// # Returns
/// `Ok(())` if the command exits successfully, or a [`BuildError::Build`]
/// carrying the description, working directory, exit status, and both
/// output streams.
pub fn run_command(mut cmd: Command, description: &str) -> Result<(), BuildError> {
    let cwd = cmd
        .get_current_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let output = cmd.output().map_err(|e| {
        BuildError::Build(format!(
            "Failed to start {} in {}.\n\n\
             Error: {}\n\n\
             Ensure the tool is installed and available on PATH.",
            description,
            cwd.display(),
            e
        ))
    })?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BuildError::Build(format!(
            "{} failed in {}.\n\n\
             Exit status: {}\n\n\
             Stdout:\n{}\n\n\
             Stderr:\n{}",
            description,
            cwd.display(),
            output.status,
            stdout,
            stderr
        )));
    }
    Ok(())
}

/// Queries `xcodebuild -version` and returns the major version.
///
/// Returns 0 when the tool is unavailable or the output is unrecognized;
/// the version only gates optional configure flags, so an unanswerable
/// query leaves those flags off rather than failing the run.
pub fn xcode_major_version(toolchain: &Toolchain) -> u32 {
    let output = match Command::new(&toolchain.xcodebuild).arg("-version").output() {
        Ok(output) if output.status.success() => output,
        _ => return 0,
    };
    parse_xcode_major(&String::from_utf8_lossy(&output.stdout))
}

/// Extracts the major version from `xcodebuild -version` output
/// (`Xcode 15.2` -> 15). Matching is case-insensitive; anything else
/// parses to 0.
pub fn parse_xcode_major(output: &str) -> u32 {
    for line in output.lines() {
        let line = line.trim();
        let Some(prefix) = line.get(..5) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case("xcode") {
            continue;
        }
        let rest = line[5..].trim_start();
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(major) = digits.parse() {
            return major;
        }
    }
    0
}

/// Recursively copies a directory.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(dest).map_err(|e| {
        BuildError::Build(format!("Failed to create directory {}: {}", dest.display(), e))
    })?;

    let entries = fs::read_dir(src).map_err(|e| {
        BuildError::Build(format!("Failed to read directory {}: {}", src.display(), e))
    })?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if path.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path).map_err(|e| {
                BuildError::Build(format!(
                    "Failed to copy {} to {}: {}",
                    path.display(),
                    dest_path.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}
