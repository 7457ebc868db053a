mod cmd;
mod output;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use drvbuild_lib::action::Action;

use crate::cmd::RunArgs;
use crate::output::{OutputFormat, print_error};

/// driver-build - select and build the kernel's optional drivers
#[derive(Parser)]
#[command(name = "driver-build")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// What to do with the selected drivers
  #[arg(value_enum)]
  action: ActionArg,

  /// Kernel source directory holding the configuration and driver tree
  #[arg(short = 'C', long, default_value = ".")]
  directory: PathBuf,

  /// Configuration file [default: <DIRECTORY>/kernel.config]
  #[arg(long)]
  config: Option<PathBuf>,

  /// Driver tree [default: <DIRECTORY>/drivers]
  #[arg(long)]
  drivers: Option<PathBuf>,

  /// Descriptor written for built-in drivers [default: <DIRECTORY>/drivers.config]
  #[arg(long)]
  descriptor: Option<PathBuf>,

  /// Processing units shared by module sub-builds [default: available CPUs]
  #[arg(short, long)]
  jobs: Option<NonZeroUsize>,

  /// Build tool for module sub-builds [default: $MAKE or make]
  #[arg(long)]
  make: Option<String>,

  /// Cancel the remaining module sub-builds after the first failure
  #[arg(long)]
  fail_fast: bool,

  /// Only accept 'y', 'm' and 'n' as values of driver keys
  #[arg(long)]
  strict_markers: bool,

  /// Resolve and print the selection without building anything
  #[arg(long)]
  dry_run: bool,

  /// Output format
  #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ActionArg {
  /// Write the driver descriptor and build module drivers
  Build,
  /// Remove the driver descriptor and clean module drivers
  Clean,
}

impl From<ActionArg> for Action {
  fn from(arg: ActionArg) -> Self {
    match arg {
      ActionArg::Build => Action::Build,
      ActionArg::Clean => Action::Clean,
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  // Initialize logging
  let default_filter = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let args = RunArgs {
    action: cli.action.into(),
    directory: cli.directory,
    config: cli.config,
    drivers: cli.drivers,
    descriptor: cli.descriptor,
    jobs: cli.jobs,
    make: cli.make,
    fail_fast: cli.fail_fast,
    strict_markers: cli.strict_markers,
    dry_run: cli.dry_run,
  };

  match cmd::cmd_run(args, cli.output) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
