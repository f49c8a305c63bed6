//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - timeline/compact/summary: project a JSONL history file
//! - import: append a history file to the store
//! - show/executions: read stored executions
//! - validate: check action arguments against the executor

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// flowlog - read models over durable workflow histories
#[derive(Parser, Debug)]
#[command(name = "flowlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print a SHA-256 digest of the JSON output instead of the output itself
    #[arg(short, long, global = true)]
    pub digest: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the event timeline of a JSONL history file
    Timeline {
        /// History file, one event per line
        file: PathBuf,
    },

    /// Print the compact per-action rows of a JSONL history file
    Compact {
        /// History file, one event per line
        file: PathBuf,
    },

    /// Print the execution summary of a JSONL history file
    Summary {
        /// History file, one event per line
        file: PathBuf,
    },

    /// Append a JSONL history file to the store
    Import {
        /// Execution id `<workflow_id>/exec-<suffix>`, or a bare workflow id
        execution_id: String,

        /// History file, one event per line
        file: PathBuf,
    },

    /// Read stored executions
    Show {
        /// Execution ids to read
        #[arg(required = true)]
        execution_ids: Vec<String>,

        /// One row per action instead of the full timeline
        #[arg(long)]
        compact: bool,
    },

    /// List stored executions
    Executions,

    /// Validate action arguments with the executor
    Validate {
        /// Action key, e.g. core.http_request
        action: String,

        /// Arguments as a JSON object
        args: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["flowlog"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["flowlog", "compact", "h.jsonl", "-v", "--digest"]).unwrap();
        assert!(cli.is_verbose());
        assert!(cli.digest);
        assert!(matches!(cli.command, Commands::Compact { ref file } if file == &PathBuf::from("h.jsonl")));
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["flowlog", "-c", "/path/to/flowlog.yml", "executions"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/flowlog.yml")));
        assert!(!cli.is_verbose());
    }

    #[test]
    fn test_import() {
        let cli = Cli::try_parse_from(["flowlog", "import", "wf-1/exec-1", "h.jsonl"]).unwrap();
        match cli.command {
            Commands::Import { execution_id, file } => {
                assert_eq!(execution_id, "wf-1/exec-1");
                assert_eq!(file, PathBuf::from("h.jsonl"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_show_many_compact() {
        let cli = Cli::try_parse_from(["flowlog", "show", "a/1", "b/2", "--compact"]).unwrap();
        match cli.command {
            Commands::Show { execution_ids, compact } => {
                assert_eq!(execution_ids, vec!["a/1".to_string(), "b/2".to_string()]);
                assert!(compact);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["flowlog", "show"]).is_err());
    }

    #[test]
    fn test_validate() {
        let cli = Cli::try_parse_from(["flowlog", "validate", "core.http_request", "{\"url\":\"x\"}"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate { ref action, .. } if action == "core.http_request"));
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
