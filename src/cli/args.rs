//! Command-line argument parsing for epiguard
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// epiguard - epileptic seizure prediction service and dataset preparation
#[derive(Parser, Debug)]
#[command(name = "epiguard")]
#[command(version)]
#[command(about = "Serve per-patient seizure predictions and prepare training data", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the inference HTTP service
    Serve {
        /// Override listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Build train/test arrays and the patient file from the raw dataset
    Prepare {
        /// Raw labeled CSV
        #[arg(long)]
        raw: Option<PathBuf>,

        /// Directory for X_train/Y_train/X_test/Y_test
        #[arg(long)]
        out: Option<PathBuf>,

        /// Patient CSV to write
        #[arg(long)]
        patients: Option<PathBuf>,

        /// Random seed for sampling and splitting
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}
