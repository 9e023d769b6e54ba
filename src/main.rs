use clap::{Parser, Subcommand};
use logiciel_images::manifest::ManifestStore;
use logiciel_images::process::{ConvertConfig, ConvertStats};
use logiciel_images::{config, copy, output, process};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that convert images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore the manifest and re-encode every image
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "logiciel-images")]
#[command(about = "Incremental WebP conversion for the site's image assets")]
#[command(long_about = "\
Incremental WebP conversion for the site's image assets

Source PNG/JPEG files are converted to size-capped derivatives in a cache
directory. A manifest of content hashes lets later runs skip every image
whose bytes have not changed.

Naming convention:

  public/images/
  ├── cover-acme.png        # cover-* → cover ceiling (default 1600px)
  ├── logo.jpg              # anything else → inline ceiling (default 800px)
  └── posts/images/foo.jpg  # subdirectories are mirrored in the output

Logging is controlled with RUST_LOG (default: info).

Run 'logiciel-images gen-config' to generate a documented images.toml.")]
#[command(version)]
struct Cli {
    /// Source image directory
    #[arg(long, default_value = "public/images", global = true)]
    source: PathBuf,

    /// Directory for converted images and the manifest
    #[arg(long, default_value = ".cache/images", global = true)]
    cache_dir: PathBuf,

    /// Manifest file [default: <cache-dir>/manifest.json]
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Publish directory the derivatives are copied into
    #[arg(long, default_value = "dist/images", global = true)]
    output: PathBuf,

    /// Pipeline config file (optional)
    #[arg(
        long,
        default_value = "images.toml",
        env = "LOGICIEL_IMAGES_CONFIG",
        global = true
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert changed and new images into the cache directory
    Convert(CacheArgs),
    /// Copy converted images into the publish directory
    Copy,
    /// Run the full pipeline: convert → copy
    Build(CacheArgs),
    /// Report which images would be converted, without writing anything
    Check,
    /// Print a stock images.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = match &cli.manifest {
        Some(path) => ManifestStore::new(path.clone()),
        None => ManifestStore::in_cache_dir(&cli.cache_dir),
    };

    match &cli.command {
        Command::Convert(cache_args) => {
            let config = load_convert_config(&cli.config)?;
            let stats = run_convert(&cli, &store, &config, cache_args)?;
            println!("Images: {}", stats);
        }
        Command::Copy => {
            let stats = copy::copy_outputs(&cli.cache_dir, &cli.output)?;
            println!("Copy: {}", stats);
        }
        Command::Build(cache_args) => {
            let config = load_convert_config(&cli.config)?;

            println!("==> Step 1: Converting {}", cli.source.display());
            let stats = run_convert(&cli, &store, &config, cache_args)?;
            println!("Images: {}", stats);

            println!("==> Step 2: Copying → {}", cli.output.display());
            let copied = copy::copy_outputs(&cli.cache_dir, &cli.output)?;
            println!("Copy: {}", copied);

            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Check => {
            let config = load_convert_config(&cli.config)?;
            let plans = process::check(&cli.source, &cli.cache_dir, &store.load(), &config)?;
            output::print_check_output(&plans);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_convert_config(path: &Path) -> Result<ConvertConfig, config::ConfigError> {
    let pipeline = config::load_config(path)?;
    Ok(ConvertConfig::from_pipeline_config(&pipeline))
}

/// Run the conversion step with a printer thread draining progress events.
fn run_convert(
    cli: &Cli,
    store: &ManifestStore,
    config: &ConvertConfig,
    cache_args: &CacheArgs,
) -> Result<ConvertStats, process::ProcessError> {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_convert_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::convert(
        &cli.source,
        &cli.cache_dir,
        store,
        !cache_args.no_cache,
        config,
        Some(tx),
    );
    // The sender is dropped inside `convert`, so the printer drains and exits.
    if printer.join().is_err() {
        tracing::warn!("progress printer panicked");
    }
    result
}
