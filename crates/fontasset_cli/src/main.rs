//! fontasset CLI: manage uploaded fonts and their generated atlas assets.
//!
//! Provides `fontasset fonts` for uploading and listing fonts,
//! `fontasset assets` for creating and reading asset sets, and
//! `fontasset sweep` for clearing leftovers of crashed generations.

#![warn(missing_docs)]

mod assets;
mod fonts;
mod service;
mod sweep;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use fontasset_cache::{AssetType, Fingerprint, FontId};
use tracing_subscriber::{fmt, EnvFilter};

/// Exit code for a request that completed, including a conflict.
pub const EXIT_OK: i32 = 0;
/// Exit code for a font or asset set that does not exist.
pub const EXIT_NOT_FOUND: i32 = 2;
/// Exit code when another caller kept the key reserved too long.
pub const EXIT_BUSY: i32 = 3;

/// Content-addressed font atlas asset cache.
#[derive(Parser, Debug)]
#[command(name = "fontasset", version, about = "Font atlas asset cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `fontasset.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload and inspect fonts.
    Fonts {
        /// The fonts action to run.
        #[command(subcommand)]
        action: FontsCommand,
    },
    /// Create and read generated asset sets.
    Assets {
        /// The assets action to run.
        #[command(subcommand)]
        action: AssetsCommand,
    },
    /// Remove reservations and trash left behind by crashed processes.
    Sweep(SweepArgs),
}

/// Actions of `fontasset fonts`.
#[derive(Subcommand, Debug)]
pub enum FontsCommand {
    /// List uploaded fonts.
    List,
    /// Upload a font file.
    Upload {
        /// The font file to upload.
        file: PathBuf,

        /// Identifier to store the font under (default: the file stem).
        #[arg(long)]
        identifier: Option<String>,

        /// Format suffix, including its dot (default: the file extension).
        #[arg(long)]
        format: Option<String>,
    },
    /// Show one uploaded font.
    Show {
        /// The font identifier, including its extension.
        font: FontId,
    },
}

/// Actions of `fontasset assets`.
#[derive(Subcommand, Debug)]
pub enum AssetsCommand {
    /// Generate the asset set for a parameter record, or return the
    /// existing one.
    Create(CreateArgs),
    /// Show a published asset set.
    Get {
        /// The font identifier.
        font: FontId,
        /// The asset set fingerprint.
        fingerprint: Fingerprint,
    },
    /// List the fingerprints of a font's asset sets.
    List {
        /// The font identifier.
        font: FontId,
    },
    /// Exit 0 if the asset set exists, 2 otherwise.
    Exists {
        /// The font identifier.
        font: FontId,
        /// The asset set fingerprint.
        fingerprint: Fingerprint,
    },
    /// Print the path of one generated file.
    Path {
        /// The font identifier.
        font: FontId,
        /// The asset set fingerprint.
        fingerprint: Fingerprint,
        /// `distance-field` or `font-description`.
        asset_type: AssetType,
    },
}

/// Arguments for `fontasset assets create`.
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// The font identifier.
    pub font: FontId,

    /// Parameter record as a JSON object, or `@path` to read it from a file.
    #[arg(long)]
    pub params: String,

    /// Regenerate even if the asset set already exists.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `fontasset sweep`.
#[derive(Parser, Debug)]
pub struct SweepArgs {
    /// Only remove leftovers at least this old.
    #[arg(long, default_value_t = 3600)]
    pub max_age_secs: u64,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a config file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Fonts { ref action } => fonts::run(action, &global),
        Command::Assets { ref action } => assets::run(action, &global),
        Command::Sweep(ref args) => sweep::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` applies unless a
/// verbosity flag was given.
fn init_logging(quiet: bool, verbose: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
