use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};

use ngsfw_build::{BuildConfig, FrameworkBuilder, TARGETS, TargetSlice};

use config::NgsfwConfig;

mod config;

/// CLI orchestrator for building the universal `ngstore.framework` iOS
/// bundle.
///
/// By CMake conventions the output directory should not be a
/// subdirectory of the library source tree. It is created if missing,
/// along with one build tree per architecture/platform pair; the build
/// trees survive across runs so minor library updates rebuild quickly,
/// while the framework directory is erased and recreated on each run.
#[derive(Parser, Debug)]
#[command(
    name = "ngsfw",
    version,
    about = "Builds the universal ngstore.framework bundle for iOS",
    long_about = None
)]
struct Cli {
    /// Directory for per-target build trees and the built framework.
    #[arg(value_name = "OUTDIR")]
    out: PathBuf,

    /// Directory with the library sources (default: current directory).
    #[arg(long, value_name = "DIR")]
    repo: Option<PathBuf>,

    /// Parallel job hint for each target's build step.
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// Path to a config file (default: discover ngsfw.toml upwards).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Echo each external command before running it.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug)]
struct BuildSpec {
    source_dir: PathBuf,
    config: BuildConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => Some(NgsfwConfig::load_from_file(path)?),
        None => NgsfwConfig::discover()?.map(|(config, path)| {
            println!("Using config {}", path.display());
            config
        }),
    };

    let spec = resolve_build_spec(&cli, file_config.as_ref())?;
    validate_source_dir(&spec.source_dir)?;

    println!(
        "Building {} target pair(s) from {} into {}",
        spec.config.targets.len(),
        spec.source_dir.display(),
        cli.out.display()
    );

    let builder = FrameworkBuilder::new(&spec.source_dir).verbose(cli.verbose);
    let result = builder
        .build(&cli.out, &spec.config)
        .context("framework build failed")?;

    println!("\n✓ Framework assembled!");
    println!("  Path: {}", result.framework_dir.display());
    println!(
        "  Architectures: {}",
        result
            .targets
            .iter()
            .map(|t| t.arch.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

/// Resolves each option as CLI flag > config file > built-in default.
fn resolve_build_spec(cli: &Cli, file: Option<&NgsfwConfig>) -> Result<BuildSpec> {
    let source_dir = cli
        .repo
        .clone()
        .or_else(|| file.and_then(|f| f.project.source.clone()))
        .map_or_else(
            || std::env::current_dir().context("resolving current directory"),
            Ok,
        )?;

    let jobs = cli.jobs.or_else(|| file.and_then(|f| f.build.jobs));

    let targets = match file.and_then(|f| f.build.targets.as_ref()) {
        Some(names) => {
            let mut targets = Vec::with_capacity(names.len());
            for name in names {
                let target = name
                    .parse::<TargetSlice>()
                    .with_context(|| format!("invalid target pair {:?} in config", name))?;
                targets.push(target);
            }
            if targets.is_empty() {
                bail!("config lists an empty target set");
            }
            targets
        }
        None => TARGETS.to_vec(),
    };

    Ok(BuildSpec {
        source_dir,
        config: BuildConfig { targets, jobs },
    })
}

fn validate_source_dir(source_dir: &Path) -> Result<()> {
    if !source_dir.is_dir() {
        bail!(
            "library source directory does not exist: {}\n\n\
             Pass --repo or set [project] source in ngsfw.toml.",
            source_dir.display()
        );
    }
    if !source_dir.join("CMakeLists.txt").is_file() {
        bail!(
            "no CMakeLists.txt in {}; this does not look like the library source tree",
            source_dir.display()
        );
    }
    Ok(())
}
