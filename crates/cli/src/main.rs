mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{ProjectArgs, ServeOverrides, cmd_build, cmd_gc, cmd_info, cmd_serve};
use output::{OutputFormat, print_failure};

/// spabuild - build and serve single-page applications
#[derive(Parser)]
#[command(name = "spabuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Project directory (default: current directory)
  #[arg(short = 'C', long, global = true)]
  project: Option<PathBuf>,

  /// Config file (default: spabuild.toml in the project directory, if present)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every entry into the output directory
  Build {
    /// Skip minification
    #[arg(long)]
    no_minify: bool,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Run the development server with rebuild-on-change
  Serve {
    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Build once and do not watch the source tree
    #[arg(long)]
    no_watch: bool,
  },

  /// Remove stale artifacts from the output directory
  Gc {
    /// Show what would be removed without deleting
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show the resolved project configuration
  Info {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let args = ProjectArgs {
    project: cli.project,
    config: cli.config,
  };

  let result = match cli.command {
    Commands::Build { no_minify, output } => cmd_build(&args, no_minify, output),
    Commands::Serve { host, port, no_watch } => cmd_serve(&args, ServeOverrides { host, port, no_watch }),
    Commands::Gc { dry_run, output } => cmd_gc(&args, dry_run, output),
    Commands::Info { output } => cmd_info(&args, output.is_json()),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_failure(&e);
      ExitCode::FAILURE
    }
  }
}
