//! # custody CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use custody_cli::cid::{run_resolve_cid, ResolveCidArgs};
use custody_cli::document::{
    run_extract_meta, run_render_certificate, ExtractMetaArgs, RenderCertificateArgs,
};
use custody_cli::serial::{run_generate_serial, GenerateSerialArgs};

/// Custody Stack CLI
///
/// Offline tooling for custody documents: metadata extraction, serial
/// generation, CID normalization and local certificate rendering.
#[derive(Parser, Debug)]
#[command(name = "custody", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the SKU and serial embedded in a rendered document.
    ExtractMeta(ExtractMetaArgs),

    /// Generate fresh serial numbers.
    GenerateSerial(GenerateSerialArgs),

    /// Normalize an ipfs:// URI, gateway URL or bare CID to a gateway URL.
    ResolveCid(ResolveCidArgs),

    /// Render a certificate of registration without uploading it.
    RenderCertificate(RenderCertificateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    let result = match cli.command {
        Commands::ExtractMeta(args) => run_extract_meta(&args, &mut stdout),
        Commands::GenerateSerial(args) => run_generate_serial(&args, &mut stdout),
        Commands::ResolveCid(args) => run_resolve_cid(&args, &mut stdout),
        Commands::RenderCertificate(args) => run_render_certificate(&args, &mut stdout),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
