//! iOS framework build pipeline.
//!
//! Drives the CMake toolchain once per architecture/platform pair, merges
//! each pair's installed static archives with `libtool`, combines the
//! merged archives into a universal binary with `lipo`, and assembles the
//! versioned `ngstore.framework` bundle with its alias symlinks.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;

use crate::builders::common::{Toolchain, copy_dir_recursive, run_command, xcode_major_version};
use crate::types::{BuildConfig, BuildError, BuildResult, TargetSlice};

/// Name of the framework bundle and of the binary inside it.
pub const FRAMEWORK_NAME: &str = "ngstore";

/// File name of the per-target merged static archive.
pub const MERGED_ARCHIVE: &str = "libngs_merged.a";

/// Device slices get bitcode embedded from this Xcode major on.
const EMBED_BITCODE_MIN_XCODE: u32 = 7;

/// Static module map shipped in the bundle.
pub const MODULE_MAP: &str = r#"framework module ngstore {
  header "api.h"
  header "codes.h"
  header "common.h"
}
"#;

/// The five alias symlinks of the bundle as `(link target, link path)`
/// pairs, both relative to the framework root, in creation order. They
/// implement the `Versions/Current` indirection: every top-level entry
/// resolves through the current version directory.
pub const FRAMEWORK_LINKS: [(&str, &str); 5] = [
    ("A", "Versions/Current"),
    ("Versions/Current/Headers", "Headers"),
    ("Versions/Current/Resources", "Resources"),
    ("Versions/Current/Modules", "Modules"),
    ("Versions/Current/ngstore", "ngstore"),
];

/// Builder for the universal framework bundle.
///
/// The per-target build trees under the output directory are kept across
/// runs so unchanged sources rebuild quickly; the framework directory
/// itself is erased and recreated on every successful run.
///
/// # Example
///
/// ```no_run
/// use ngsfw_build::{BuildConfig, FrameworkBuilder};
///
/// let builder = FrameworkBuilder::new("/opt/src/ngstore").verbose(true);
/// let result = builder.build("/tmp/ngs-out", &BuildConfig::default())?;
/// println!("Framework at {}", result.framework_dir.display());
/// # Ok::<(), ngsfw_build::BuildError>(())
/// ```
pub struct FrameworkBuilder {
    /// Library source tree (contains the top-level CMakeLists.txt).
    source_dir: PathBuf,
    /// External tool locations.
    toolchain: Toolchain,
    /// Whether to echo each external command before running it.
    verbose: bool,
}

impl FrameworkBuilder {
    /// Creates a builder for the library at `source_dir`.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            toolchain: Toolchain::default(),
            verbose: false,
        }
    }

    /// Enables command echoing.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Overrides the external tool locations.
    pub fn toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Builds every configured target pair and assembles the bundle.
    ///
    /// For each pair this configures the build tree, erases any previous
    /// install output, builds, installs, and merges the installed static
    /// archives. Once all pairs succeed the framework directory is
    /// recreated from scratch. Any failing step aborts the run before the
    /// bundle is touched.
    pub fn build(
        &self,
        out_dir: impl AsRef<Path>,
        config: &BuildConfig,
    ) -> Result<BuildResult, BuildError> {
        if config.targets.is_empty() {
            return Err(BuildError::Config("no target pairs configured".into()));
        }

        let out_dir = out_dir.as_ref();
        fs::create_dir_all(out_dir).map_err(|e| {
            BuildError::Build(format!(
                "Failed to create output directory {}: {}",
                out_dir.display(),
                e
            ))
        })?;
        let out_dir = out_dir.canonicalize()?;
        let source_dir = self.source_dir.canonicalize().map_err(|e| {
            BuildError::Build(format!(
                "Library source directory {} not accessible: {}",
                self.source_dir.display(),
                e
            ))
        })?;

        let xcode_major = xcode_major_version(&self.toolchain);
        if self.verbose {
            eprintln!("  Detected Xcode major version {}", xcode_major);
        }

        let mut build_dirs = Vec::with_capacity(config.targets.len());
        for target in &config.targets {
            println!("Building {}...", target.dir_name());
            let build_dir = out_dir.join(target.dir_name());
            fs::create_dir_all(&build_dir).map_err(|e| {
                BuildError::Build(format!(
                    "Failed to create build tree {}: {}",
                    build_dir.display(),
                    e
                ))
            })?;

            self.configure(*target, &build_dir, &source_dir, xcode_major)?;
            self.clean_install_output(&build_dir)?;
            self.compile(*target, &build_dir, config.jobs)?;
            self.install(*target, &build_dir)?;
            self.merge_archives(&build_dir)?;
            build_dirs.push(build_dir);
        }

        println!("Assembling {}.framework...", FRAMEWORK_NAME);
        let framework_dir = self.assemble_framework(&out_dir, &build_dirs)?;

        Ok(BuildResult {
            framework_dir,
            targets: config.targets.clone(),
        })
    }

    fn configure(
        &self,
        target: TargetSlice,
        build_dir: &Path,
        source_dir: &Path,
        xcode_major: u32,
    ) -> Result<(), BuildError> {
        let mut cmd = Command::new(&self.toolchain.cmake);
        cmd.args(configure_args(target, xcode_major));
        cmd.arg(source_dir);
        cmd.current_dir(build_dir);
        self.echo(&cmd);
        run_command(cmd, &format!("cmake configure for {}", target.dir_name()))
    }

    /// Removes the previous install output so the archive set never
    /// contains stale libraries. The build tree itself is kept.
    fn clean_install_output(&self, build_dir: &Path) -> Result<(), BuildError> {
        let install_dir = build_dir.join("install");
        if install_dir.is_dir() {
            fs::remove_dir_all(&install_dir).map_err(|e| {
                BuildError::Build(format!(
                    "Failed to remove stale install output {}: {}",
                    install_dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    fn compile(
        &self,
        target: TargetSlice,
        build_dir: &Path,
        jobs: Option<usize>,
    ) -> Result<(), BuildError> {
        let mut cmd = Command::new(&self.toolchain.cmake);
        cmd.args(build_args(jobs.unwrap_or_else(default_jobs)));
        cmd.current_dir(build_dir);
        self.echo(&cmd);
        run_command(cmd, &format!("cmake build for {}", target.dir_name()))
    }

    fn install(&self, target: TargetSlice, build_dir: &Path) -> Result<(), BuildError> {
        let mut cmd = Command::new(&self.toolchain.cmake);
        cmd.args(["--build", ".", "--target", "install"]);
        cmd.current_dir(build_dir);
        self.echo(&cmd);
        run_command(cmd, &format!("cmake install for {}", target.dir_name()))
    }

    /// Merges every installed static archive of one build tree into
    /// `install/lib/libngs_merged.a`.
    ///
    /// A previously merged archive is never an input: the install output
    /// is cleaned before each build, and the merged name is excluded from
    /// collection in case a tree is reused anyway.
    fn merge_archives(&self, build_dir: &Path) -> Result<PathBuf, BuildError> {
        let lib_dir = build_dir.join("install").join("lib");
        let merged = lib_dir.join(MERGED_ARCHIVE);

        let entries = fs::read_dir(&lib_dir).map_err(|e| {
            BuildError::Build(format!("No install output at {}: {}", lib_dir.display(), e))
        })?;
        let mut libs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("a")
                && path.file_name().and_then(|n| n.to_str()) != Some(MERGED_ARCHIVE)
            {
                libs.push(path);
            }
        }
        libs.sort();

        if libs.is_empty() {
            return Err(BuildError::Build(format!(
                "No static archives to merge in {}",
                lib_dir.display()
            )));
        }

        println!("Merging static archives:");
        for lib in &libs {
            println!("\t{}", lib.display());
        }

        let mut cmd = Command::new(&self.toolchain.libtool);
        cmd.arg("-static").arg("-o").arg(&merged).args(&libs);
        self.echo(&cmd);
        run_command(cmd, "libtool merge")?;
        Ok(merged)
    }

    /// Erases and recreates the framework bundle from the per-target
    /// build trees. Headers and the Info.plist come from the first tree;
    /// the binary is the `lipo` combination of every tree's merged
    /// archive.
    fn assemble_framework(
        &self,
        out_dir: &Path,
        build_dirs: &[PathBuf],
    ) -> Result<PathBuf, BuildError> {
        let first = build_dirs
            .first()
            .ok_or_else(|| BuildError::Config("no build trees to assemble".into()))?;

        let framework_dir = out_dir.join(format!("{}.framework", FRAMEWORK_NAME));
        if framework_dir.is_dir() {
            fs::remove_dir_all(&framework_dir).map_err(|e| {
                BuildError::Build(format!(
                    "Failed to remove old framework {}: {}",
                    framework_dir.display(),
                    e
                ))
            })?;
        }
        let version_dir = framework_dir.join("Versions").join("A");
        fs::create_dir_all(&version_dir)?;

        let headers_src = first.join("install").join("include").join(FRAMEWORK_NAME);
        copy_dir_recursive(&headers_src, &version_dir.join("Headers"))?;

        let libs: Vec<PathBuf> = build_dirs
            .iter()
            .map(|dir| dir.join("install").join("lib").join(MERGED_ARCHIVE))
            .collect();
        println!("Creating universal library from:");
        for lib in &libs {
            println!("\t{}", lib.display());
        }
        let mut cmd = Command::new(&self.toolchain.lipo);
        cmd.arg("-create")
            .args(&libs)
            .arg("-o")
            .arg(version_dir.join(FRAMEWORK_NAME));
        self.echo(&cmd);
        run_command(cmd, "lipo create")?;

        let resources_dir = version_dir.join("Resources");
        fs::create_dir_all(&resources_dir)?;
        let plist_src = first.join("ios").join("Info.plist");
        fs::copy(&plist_src, resources_dir.join("Info.plist")).map_err(|e| {
            BuildError::Build(format!(
                "Failed to copy Info.plist from {}: {}",
                plist_src.display(),
                e
            ))
        })?;

        let modules_dir = version_dir.join("Modules");
        fs::create_dir_all(&modules_dir)?;
        fs::write(modules_dir.join("module.modulemap"), MODULE_MAP)?;

        for (link_target, link_path) in FRAMEWORK_LINKS {
            symlink(link_target, framework_dir.join(link_path)).map_err(|e| {
                BuildError::Build(format!(
                    "Failed to link {} -> {}: {}",
                    link_path, link_target, e
                ))
            })?;
        }

        Ok(framework_dir)
    }

    fn echo(&self, cmd: &Command) {
        if self.verbose {
            eprintln!("  Running: {:?}", cmd);
        }
    }
}

/// CMake configure arguments for one target pair, excluding the trailing
/// source-directory argument.
pub fn configure_args(target: TargetSlice, xcode_major: u32) -> Vec<String> {
    let mut args = vec![
        "-GUnix Makefiles".to_string(),
        "-DBUILD_TARGET_PLATFORM=IOS".to_string(),
        "-DCMAKE_INSTALL_PREFIX=install".to_string(),
        "-DCMAKE_BUILD_TYPE=Release".to_string(),
        format!("-DIOS_ARCH={}", target.arch.as_str()),
        format!("-DIOS_PLATFORM={}", target.platform.cmake_name()),
    ];
    if target.arch.wants_neon() {
        args.push("-DENABLE_NEON=ON".to_string());
    }
    if target.platform.is_device() && xcode_major >= EMBED_BITCODE_MIN_XCODE {
        args.push("-DCMAKE_C_FLAGS=-fembed-bitcode".to_string());
        args.push("-DCMAKE_CXX_FLAGS=-fembed-bitcode".to_string());
    }
    args
}

/// Arguments for the parallel build step.
pub fn build_args(jobs: usize) -> Vec<String> {
    vec![
        "--build".to_string(),
        ".".to_string(),
        "--config".to_string(),
        "release".to_string(),
        "--".to_string(),
        "-j".to_string(),
        jobs.to_string(),
    ]
}

/// Parallel job hint when none is configured: one job per host core.
pub fn default_jobs() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Arch, Platform, TARGETS};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // Stand-ins for the real tools. The fake cmake populates the install
    // tree the way the library's install target would; the fake libtool
    // and lipo just concatenate or touch their outputs.
    fn stub_toolchain(dir: &Path) -> Toolchain {
        let cmake = write_stub(
            dir,
            "cmake",
            r#"if [ "$1" = "--build" ]; then
  if [ "$3" = "--target" ] && [ "$4" = "install" ]; then
    mkdir -p install/lib install/include/ngstore
    printf core > install/lib/libngscore.a
    printf util > install/lib/libngsutil.a
    printf api > install/include/ngstore/api.h
  fi
  exit 0
fi
mkdir -p ios
printf plist > ios/Info.plist
exit 0"#,
        );
        let libtool = write_stub(dir, "libtool", r#"out="$3"; shift 3; cat "$@" > "$out""#);
        let lipo = write_stub(
            dir,
            "lipo",
            r#"for arg in "$@"; do out="$arg"; done
printf fat > "$out""#,
        );
        let xcodebuild = write_stub(dir, "xcodebuild", r#"echo "Xcode 15.2""#);
        Toolchain {
            cmake,
            libtool,
            lipo,
            xcodebuild,
        }
    }

    fn fixture() -> (TempDir, FrameworkBuilder, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let tools = tmp.path().join("tools");
        fs::create_dir_all(&tools).unwrap();
        let toolchain = stub_toolchain(&tools);
        let source = tmp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        let out = tmp.path().join("out");
        let builder = FrameworkBuilder::new(&source).toolchain(toolchain);
        (tmp, builder, out)
    }

    #[test]
    fn test_build_assembles_framework_with_alias_links() {
        let (_tmp, builder, out) = fixture();
        let result = builder.build(&out, &BuildConfig::default()).unwrap();

        let fw = &result.framework_dir;
        assert!(fw.join("Versions/A").join(FRAMEWORK_NAME).is_file());
        assert!(fw.join("Versions/A/Headers/api.h").is_file());
        assert!(fw.join("Versions/A/Resources/Info.plist").is_file());
        assert_eq!(
            fs::read_to_string(fw.join("Versions/A/Modules/module.modulemap")).unwrap(),
            MODULE_MAP
        );

        for (link_target, link_path) in FRAMEWORK_LINKS {
            let found = fs::read_link(fw.join(link_path)).unwrap();
            assert_eq!(found, PathBuf::from(link_target), "link {}", link_path);
        }
        // The aliases resolve through Versions/Current.
        assert!(fw.join("Headers/api.h").exists());
        assert!(fw.join(FRAMEWORK_NAME).exists());
    }

    #[test]
    fn test_build_merges_one_archive_per_target() {
        let (_tmp, builder, out) = fixture();
        let result = builder.build(&out, &BuildConfig::default()).unwrap();
        assert_eq!(result.targets, TARGETS.to_vec());

        for target in TARGETS {
            let merged = out
                .join(target.dir_name())
                .join("install/lib")
                .join(MERGED_ARCHIVE);
            assert_eq!(fs::read_to_string(&merged).unwrap(), "coreutil");
        }
    }

    #[test]
    fn test_rebuild_succeeds_and_regenerates_bundle() {
        let (_tmp, builder, out) = fixture();
        builder.build(&out, &BuildConfig::default()).unwrap();

        // Leave a marker in the bundle; a clean rebuild must drop it.
        let fw = out.join(format!("{}.framework", FRAMEWORK_NAME));
        fs::write(fw.join("Versions/A/stale-marker"), "stale").unwrap();

        let result = builder.build(&out, &BuildConfig::default()).unwrap();
        assert!(!result.framework_dir.join("Versions/A/stale-marker").exists());
        for (link_target, link_path) in FRAMEWORK_LINKS {
            let found = fs::read_link(result.framework_dir.join(link_path)).unwrap();
            assert_eq!(found, PathBuf::from(link_target));
        }
    }

    #[test]
    fn test_failing_tool_aborts_run_without_bundle() {
        let (tmp, builder, out) = fixture();
        write_stub(&tmp.path().join("tools"), "cmake", "exit 1");

        let err = builder.build(&out, &BuildConfig::default()).unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("cmake configure for armv7-iPhoneOS"));
        assert!(!out.join(format!("{}.framework", FRAMEWORK_NAME)).exists());
        // Fail-fast: later targets were never started.
        assert!(!out.join("armv7s-iPhoneOS").exists());
    }

    #[test]
    fn test_build_creates_missing_output_directory() {
        let (_tmp, builder, out) = fixture();
        let nested = out.join("deeply/nested");
        assert!(!nested.exists());
        let result = builder.build(&nested, &BuildConfig::default()).unwrap();
        assert!(result.framework_dir.is_dir());
    }

    #[test]
    fn test_build_rejects_empty_target_set() {
        let (_tmp, builder, out) = fixture();
        let config = BuildConfig {
            targets: Vec::new(),
            jobs: None,
        };
        let err = builder.build(&out, &config).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn test_merge_requires_at_least_one_archive() {
        let (tmp, builder, _out) = fixture();
        let build_dir = tmp.path().join("empty-tree");
        fs::create_dir_all(build_dir.join("install/lib")).unwrap();
        let err = builder.merge_archives(&build_dir).unwrap_err();
        assert!(format!("{}", err).contains("No static archives to merge"));
    }

    #[test]
    fn test_merge_excludes_previous_merged_archive() {
        let (tmp, builder, _out) = fixture();
        let build_dir = tmp.path().join("reused-tree");
        let lib_dir = build_dir.join("install/lib");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(lib_dir.join("libngscore.a"), "core").unwrap();
        fs::write(lib_dir.join(MERGED_ARCHIVE), "stale").unwrap();

        let merged = builder.merge_archives(&build_dir).unwrap();
        assert_eq!(fs::read_to_string(&merged).unwrap(), "core");
    }

    #[test]
    fn test_configure_args_device_slice() {
        let target = TargetSlice::new(Arch::Arm64, Platform::IphoneOs);
        let args = configure_args(target, 15);
        assert!(args.contains(&"-GUnix Makefiles".to_string()));
        assert!(args.contains(&"-DBUILD_TARGET_PLATFORM=IOS".to_string()));
        assert!(args.contains(&"-DIOS_ARCH=arm64".to_string()));
        assert!(args.contains(&"-DIOS_PLATFORM=OS".to_string()));
        assert!(args.contains(&"-DENABLE_NEON=ON".to_string()));
        assert!(args.contains(&"-DCMAKE_C_FLAGS=-fembed-bitcode".to_string()));
        assert!(args.contains(&"-DCMAKE_CXX_FLAGS=-fembed-bitcode".to_string()));
    }

    #[test]
    fn test_configure_args_simulator_slice() {
        let target = TargetSlice::new(Arch::I386, Platform::IphoneSimulator);
        let args = configure_args(target, 15);
        assert!(args.contains(&"-DIOS_PLATFORM=SIMULATOR".to_string()));
        assert!(!args.iter().any(|a| a.contains("NEON")));
        assert!(!args.iter().any(|a| a.contains("bitcode")));
    }

    #[test]
    fn test_configure_args_old_xcode_skips_bitcode() {
        let target = TargetSlice::new(Arch::Armv7, Platform::IphoneOs);
        let args = configure_args(target, 6);
        assert!(!args.iter().any(|a| a.contains("bitcode")));
        // Unknown Xcode version parses as 0 and behaves the same.
        let args = configure_args(target, 0);
        assert!(!args.iter().any(|a| a.contains("bitcode")));
    }

    #[test]
    fn test_build_args_carry_job_hint() {
        assert_eq!(
            build_args(4),
            vec!["--build", ".", "--config", "release", "--", "-j", "4"]
        );
    }

    #[test]
    fn test_framework_builder_defaults() {
        let builder = FrameworkBuilder::new("/tmp/src");
        assert!(!builder.verbose);
        let builder = builder.verbose(true);
        assert!(builder.verbose);
    }
}
