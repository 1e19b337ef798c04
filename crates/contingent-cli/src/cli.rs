//! Command-line argument structures.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Build exposure/outcome contingency tables and test them for association
#[derive(Debug, Parser)]
#[command(name = "contingent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $CONTINGENT_CONFIG, then ./contingent.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Query the task API for the four cell counts, then run the configured tests
    Build {
        /// Concept code of the exposure (overrides query.exposure_code)
        #[arg(long)]
        exposure_code: Option<String>,

        /// Domain table of the exposure (overrides query.exposure_table)
        #[arg(long)]
        exposure_table: Option<String>,

        /// Concept code of the outcome (overrides query.outcome_code)
        #[arg(long)]
        outcome_code: Option<String>,

        /// Domain table of the outcome (overrides query.outcome_table)
        #[arg(long)]
        outcome_table: Option<String>,

        /// Collection to query (overrides task_api.collection_id)
        #[arg(long)]
        collection: Option<String>,

        /// Poll until every job reaches a terminal status
        #[arg(long)]
        wait_forever: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the statistics on known counts, without any network access
    #[command(allow_negative_numbers = true)]
    Analyze {
        /// Exposed with outcome
        a: i64,
        /// Exposed without outcome
        b: i64,
        /// Unexposed with outcome
        c: i64,
        /// Unexposed without outcome
        d: i64,

        /// two-sided, greater or less (overrides stats.alternative)
        #[arg(long)]
        alternative: Option<String>,

        /// Apply Yates' continuity correction to the chi-squared test
        #[arg(long)]
        yates: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from(["contingent", "analyze", "30", "70", "10", "90", "--json"]).unwrap();
        match cli.command {
            Commands::Analyze { a, d, json, yates, .. } => {
                assert_eq!((a, d), (30, 90));
                assert!(json);
                assert!(!yates);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_analyze_accepts_negative_for_validation() {
        let cli = Cli::try_parse_from(["contingent", "analyze", "1", "-2", "3", "4"]).unwrap();
        assert!(matches!(cli.command, Commands::Analyze { b: -2, .. }));
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "contingent",
            "--config",
            "alt.toml",
            "build",
            "--exposure-code",
            "8507",
            "--wait-forever",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        match cli.command {
            Commands::Build { exposure_code, wait_forever, json, .. } => {
                assert_eq!(exposure_code.as_deref(), Some("8507"));
                assert!(wait_forever);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
