use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use log::LevelFilter;

use strata_api::{constants::ENGINE_CONFIG_PATH, features::UsedFeaturesDependencyType};

use crate::STRATA_VERSION;

#[derive(Parser, Debug)]
#[clap(version = STRATA_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    /// Engine configuration file
    #[arg(global = true, short, long, default_value = ENGINE_CONFIG_PATH)]
    pub config: PathBuf,

    /// Directory the target system is mounted at, overrides the configuration
    #[arg(global = true, long)]
    pub rootprefix: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the actions that turn the probed devicegraph into the staging
    /// devicegraph
    Plan {
        /// Devicegraph of the system as it is
        #[clap(index = 1)]
        probed: PathBuf,

        /// Devicegraph of the system as it should be
        #[clap(index = 2)]
        staging: PathBuf,

        /// Also write the actiongraph in graphviz format
        #[clap(long)]
        graphviz: Option<PathBuf>,
    },

    /// Run the actions that turn the probed devicegraph into the staging
    /// devicegraph
    Commit {
        #[clap(index = 1)]
        probed: PathBuf,

        #[clap(index = 2)]
        staging: PathBuf,

        /// Mount filesystems read-write even when their options say `ro`
        #[clap(long)]
        force_rw: bool,

        /// Path to save an eventual fatal error
        #[clap(short, long)]
        error: Option<PathBuf>,
    },

    /// Print the features the staging devicegraph and the plan need
    Features {
        #[clap(index = 1)]
        probed: PathBuf,

        #[clap(index = 2)]
        staging: PathBuf,

        /// Which features of the staging devicegraph to report
        #[clap(long, value_enum, default_value_t = DependencyType::Suggested)]
        dependency_type: DependencyType,
    },

    /// Check a devicegraph file for consistency
    Check {
        #[clap(index = 1)]
        graph: PathBuf,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Plan { .. } => "plan",
            Commands::Commit { .. } => "commit",
            Commands::Features { .. } => "features",
            Commands::Check { .. } => "check",
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[derive(clap::ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum DependencyType {
    Required,
    Suggested,
}

impl From<DependencyType> for UsedFeaturesDependencyType {
    fn from(value: DependencyType) -> Self {
        match value {
            DependencyType::Required => UsedFeaturesDependencyType::Required,
            DependencyType::Suggested => UsedFeaturesDependencyType::Suggested,
        }
    }
}
