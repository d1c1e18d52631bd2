mod cmd;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use cmd::{BuildArgs, GenerateArgs};
use output::print_error;

/// Build Linux packages from upstream release archives with nfpm
#[derive(Parser)]
#[command(name = "nfpm-helper")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Log level (error, warn, info, debug, trace)
  #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
  log_level: Level,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build packages for one package directory
  Build(BuildArgs),

  /// Build the packages listed in a generator configuration
  Generate(GenerateArgs),
}

fn init_tracing(level: Level) {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::from_level(level).into())
    .from_env_lossy();

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.log_level);

  let result = match cli.command {
    Commands::Build(args) => cmd::cmd_build(args),
    Commands::Generate(args) => cmd::cmd_generate(args),
  };

  if let Err(err) = result {
    print_error(&format!("{err:#}"));
    return ExitCode::FAILURE;
  }

  ExitCode::SUCCESS
}
