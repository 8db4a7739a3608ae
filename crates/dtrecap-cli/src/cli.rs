//! CLI argument definitions for dtrecap.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Run one or all report pipelines over unprocessed DT files |
//! | `list` | Print the discovered DT file listing |
//! | `stats` | Run a pipeline and print cache statistics as JSON |

use clap::{Parser, Subcommand, ValueEnum};
use dtrecap_reports::ReportFamily;

/// dtrecap - derived report pipelines for daily transaction dumps
#[derive(Debug, Parser)]
#[command(
    name = "dtrecap",
    author,
    version,
    about = "Produce bid/ask and broker aggregate reports from daily DT files"
)]
pub struct Cli {
    /// Base URL of the object store holding DT files and report output.
    #[arg(long, global = true, default_value = "http://localhost:9000")]
    pub store_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run report pipelines over every unprocessed DT file.
    Run {
        /// Report family to run.
        #[arg(long, value_enum, default_value_t = FamilyArg::All)]
        report: FamilyArg,

        /// Cap on candidate files per run, newest dates first.
        #[arg(long)]
        max_files: Option<usize>,

        /// Files per batch (also the in-batch concurrency bound).
        #[arg(long, default_value_t = 4)]
        batch_size: usize,
    },
    /// Print the discovered DT file listing, newest date first.
    List,
    /// Run one pipeline and print cache statistics as JSON.
    Stats {
        #[arg(long, value_enum, default_value_t = FamilyArg::BidAsk)]
        report: FamilyArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyArg {
    All,
    BidAsk,
    BrokerBreakdown,
    BrokerSummary,
    BrokerTransaction,
    BrokerTransactionStock,
}

impl FamilyArg {
    /// Families selected by this argument, in run order.
    pub fn families(self) -> Vec<ReportFamily> {
        match self {
            Self::All => ReportFamily::ALL.to_vec(),
            Self::BidAsk => vec![ReportFamily::BidAsk],
            Self::BrokerBreakdown => vec![ReportFamily::BrokerBreakdown],
            Self::BrokerSummary => vec![ReportFamily::BrokerSummary],
            Self::BrokerTransaction => vec![ReportFamily::BrokerTransaction],
            Self::BrokerTransactionStock => vec![ReportFamily::BrokerTransactionStock],
        }
    }
}
