use anyhow::{Error, Result};
use clap::Parser;
use fragmenter::config::Config;
use fragmenter::Fragmenter;
use log::info;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fragmenter")]
#[command(about = "Fragments RDF datasets into per-document files")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Path to the JSON configuration file
    config: PathBuf,
    /// Input files, replacing the ones listed in the configuration
    #[clap(long, short, num_args = 1..)]
    input: Vec<PathBuf>,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, default_value = "false")]
    verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, default_value = "false")]
    debug: bool,
    /// Print the configuration and exit without fragmenting
    #[clap(long, action, default_value = "false")]
    print_config: bool,
}

/// Lets FRAGMENTER_LOG override RUST_LOG.
pub fn init_logging() {
    if let Ok(log_level) = std::env::var("FRAGMENTER_LOG") {
        std::env::set_var("RUST_LOG", log_level);
    }
}

pub async fn run() -> Result<()> {
    init_logging();
    let cmd = Cli::parse();
    execute(cmd).await
}

pub async fn run_from_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    init_logging();
    let cmd = Cli::try_parse_from(args).map_err(Error::from)?;
    execute(cmd).await
}

async fn execute(cmd: Cli) -> Result<()> {
    // CLI flags for verbosity take precedence over RUST_LOG; default to "warn".
    if cmd.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if cmd.verbose {
        std::env::set_var("RUST_LOG", "info");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = env_logger::try_init();

    let mut config = Config::from_file(&cmd.config)?;
    if !cmd.input.is_empty() {
        config.input = cmd.input;
    }
    if cmd.print_config {
        config.print();
        return Ok(());
    }
    if config.input.is_empty() {
        return Err(anyhow::anyhow!(
            "No input files. List them in the configuration or pass --input."
        ));
    }

    info!(
        "Fragmenting {} input files from {}",
        config.input.len(),
        cmd.config.display()
    );
    Fragmenter::run_config(&config).await
}
