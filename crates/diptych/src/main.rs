//! # diptych
//!
//! Diptych - Split one TanStack Start source tree into client and server builds.
//!
//! ## Name Origin
//!
//! **Diptych** (/ˈdɪptɪk/) is a painting made of two hinged panels. The same
//! source file is compiled into two panels, one for the client and one for
//! the server, each showing only what belongs to it.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diptych")]
#[command(about = "Environment-split compiler for TanStack Start", long_about = None)]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Print version
    #[arg(short = 'v', short_alias = 'V', long, action = clap::ArgAction::Version)]
    version: (),
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile source files for one environment
    #[command(visible_alias = "atelier")]
    Compile(commands::compile::CompileArgs),

    /// Print the kinds a file may contain, without parsing it
    Detect(commands::detect::DetectArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("DIPTYCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Compile(args) => commands::compile::run(args),
        Commands::Detect(args) => commands::detect::run(args),
    };
    if !ok {
        std::process::exit(1);
    }
}
