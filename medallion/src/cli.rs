// medallion/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Parser, Subcommand};
use medallion_core::application::CleanTarget;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medallion")]
#[command(about = "Layered retail data pipeline: Raw -> Bronze -> Silver -> Gold", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🚀 Runs the whole pipeline (Ingest -> Quality -> Silver -> Gold)
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// 📥 Ingests raw files into the Bronze layer (with retries)
    Ingest {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// 🛡️ Runs the 7 quality checks on Bronze and writes the JSON report
    Quality {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// 🥈 Builds the Silver layer from Bronze
    Transform {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// 🥇 Builds the Gold star schema from Silver
    Assemble {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// 🧹 Removes derived layers (raw files are never touched)
    Clean {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// all | bronze | silver | gold
        #[arg(long, default_value = "all")]
        layer: CleanTarget,
    },

    /// ⚡ Runs a read-only SQL query against the Gold tables
    Query {
        query: String,

        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}
