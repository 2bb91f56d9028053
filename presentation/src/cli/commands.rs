//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use devgate_domain::{CheckpointLabel, OutputFormat};
use std::path::PathBuf;

/// Output format flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    /// Human readable
    Text,
    /// One JSON document per command
    Json,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Text => OutputFormat::Text,
            OutputArg::Json => OutputFormat::Json,
        }
    }
}

/// CLI arguments for devgate
#[derive(Parser, Debug)]
#[command(name = "devgate")]
#[command(author, version, about = "Checkpoint gate for agent-reviewed development workflows")]
#[command(long_about = r#"
devgate walks a change through an ordered sequence of checkpoints and asks
specialist agents (architect, reviewer, troubleshooter) for a verdict at each
one. A checkpoint only advances when every required role approves.

Checkpoints, in order:
  0    Design approval          (architect)
  T-1  Test plan review         (architect)
  T    Test review              (reviewer)
  T+1  Implementation review    (reviewer)
  L-1  Final review             (reviewer)
  L    Documentation update     (architect)

Configuration files are loaded from (in priority order):
1. DEVGATE_* environment variables
2. --config <path>     Explicit config file
3. ./devgate.toml      Project-level config
4. ~/.config/devgate/config.toml   Global config

Exit codes: 0 advanced or completed, 2 held, 3 aborted, 1 error.

Example:
  devgate start --checkpoints 0,T,L
  git diff | devgate check 0 --context -
  devgate check T --revision $(git rev-parse HEAD)
  devgate consult troubleshooter --context "tests hang on CI only"
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Directory holding workflow state and logs (overrides [workflow] state_dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Output format (defaults to [output] format, then text)
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputArg>,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new workflow in this directory
    Start {
        /// Comma separated checkpoint sequence, e.g. "0,T,L"
        #[arg(long, value_name = "LABELS")]
        checkpoints: Option<String>,

        /// Replace a workflow that is still in progress
        #[arg(long)]
        force: bool,
    },

    /// Evaluate the current checkpoint
    Check {
        /// Checkpoint label (0, T-1, T, T+1, L-1, L)
        label: CheckpointLabel,

        /// Revision under review (commit id, artifact version)
        #[arg(short, long)]
        revision: Option<String>,

        /// Size of the change, for conditional checkpoints
        #[arg(long, value_name = "N")]
        changed_lines: Option<u32>,

        /// Context for the agents: a file path, or "-" for stdin
        #[arg(short, long, value_name = "FILE|-")]
        context: Option<String>,

        /// Pass a conditional checkpoint without consulting anyone
        #[arg(long)]
        skip: bool,
    },

    /// Consult an out-of-band role without moving the workflow
    Consult {
        /// Role identifier, e.g. troubleshooter
        role: String,

        /// Context text, a file path, or "-" for stdin
        #[arg(short, long, value_name = "TEXT|FILE|-")]
        context: Option<String>,
    },

    /// Show the workflow position, verdicts and conversations
    Status,

    /// Abort the workflow
    Abort {
        #[arg(long, default_value = "aborted by operator")]
        reason: String,

        /// Delete the saved state instead of keeping the aborted workflow
        #[arg(long)]
        discard: bool,
    },

    /// Forget the conversation with a role; the next consultation starts afresh
    ResetSession {
        role: String,
    },

    /// Delete the saved state of a completed or aborted workflow
    Finish,

    /// Show configuration sources, or validate the configuration
    Config {
        /// Validate and report every issue
        #[arg(long)]
        validate: bool,
    },
}
