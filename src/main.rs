use std::{path::Path, process::ExitCode};

use anyhow::{Context, Error};
use clap::Parser;
use log::{error, info, warn, LevelFilter};

use osutils::runner::SystemRunner;
use strata::{
    cli::{Cli, Commands},
    compound_actions, logging, BackgroundLog, CommitCallbacks, CommitOptions, EngineConfig,
    MultiLogger, Storage, STRATA_VERSION,
};
use strata_api::{
    error::{StorageError, StorageResultExt},
    text::Tense,
    Devicegraph,
};

/// Reports commit progress through the log.
struct LogCallbacks;

impl CommitCallbacks for LogCallbacks {
    fn message(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str, error: &StorageError) -> bool {
        error!("{message}: {error:?}");
        false
    }
}

fn load_storage(
    config: EngineConfig,
    probed: &Path,
    staging: &Path,
) -> Result<Storage, StorageError> {
    let probed = Devicegraph::load(probed).message("Failed to load probed devicegraph")?;
    let staging = Devicegraph::load(staging).message("Failed to load staging devicegraph")?;
    Storage::with_staging(config, probed, staging)
}

fn plan(storage: &Storage, graphviz: Option<&Path>) -> Result<(), StorageError> {
    let ag = storage.calculate_actiongraph()?;
    if let Some(path) = graphviz {
        ag.write_graphviz(path)?;
        info!("Wrote actiongraph to '{}'", path.display());
    }

    if ag.is_empty() {
        println!("Nothing to do");
        return Ok(());
    }

    for compound in compound_actions(&ag)? {
        println!("{}", compound.sentence(Tense::Simple)?.render());
        for text in compound.texts(Tense::Simple)? {
            println!("    {}", text.render());
        }
    }
    Ok(())
}

fn commit(
    storage: &mut Storage,
    force_rw: bool,
    error_path: Option<&Path>,
) -> Result<(), StorageError> {
    let options = CommitOptions { force_rw };
    let res = storage
        .commit(&SystemRunner, &options, &LogCallbacks, None)
        .and_then(|report| {
            for index in &report.skipped {
                warn!("Skipped '{}'", report.planned[*index]);
            }
            report.into_result()
        });

    if let (Some(path), Err(e)) = (error_path, &res) {
        if let Err(e2) = std::fs::write(path, serde_yaml::to_string(&e).unwrap_or_default()) {
            error!("Failed to write error to file: {e2}");
        }
    }

    res.map(|report| info!("Committed {} actions", report.committed.len()))
}

fn run(args: &Cli, config: EngineConfig) -> Result<(), StorageError> {
    info!("Strata version: {STRATA_VERSION}");

    let res = match &args.command {
        Commands::Plan {
            probed,
            staging,
            graphviz,
        } => plan(&load_storage(config, probed, staging)?, graphviz.as_deref()),
        Commands::Commit {
            probed,
            staging,
            force_rw,
            error,
        } => commit(
            &mut load_storage(config, probed, staging)?,
            *force_rw,
            error.as_deref(),
        ),
        Commands::Features {
            probed,
            staging,
            dependency_type,
        } => {
            let storage = load_storage(config, probed, staging)?;
            let ag = storage.calculate_actiongraph()?;
            println!("staging: {}", storage.used_features((*dependency_type).into()));
            println!("plan: {}", ag.used_features());
            Ok(())
        }
        Commands::Check { graph } => Devicegraph::load(graph)
            .and_then(|graph| graph.check().map(|()| graph.devices().count()))
            .map(|count| println!("Devicegraph is consistent, {count} devices")),
    };

    res.message(format!("Failed to execute '{}' command", args.command))
}

fn setup_logging(args: &Cli, config: &EngineConfig) -> Result<(), Error> {
    let mut multilogger = MultiLogger::new()
        // Add regular env_logger to output to stderr
        .with_logger(Box::new(
            env_logger::builder()
                .format_timestamp(None)
                .filter_level(args.verbosity)
                .build(),
        ))
        .with_max_level(LevelFilter::Trace);

    // Only commits leave a background log behind
    if let (Commands::Commit { .. }, Some(path)) = (&args.command, &config.background_log_path) {
        multilogger.add_logger(
            BackgroundLog::new(path)
                .with_max_level(LevelFilter::Debug)
                .into_logger(),
        );
    }

    multilogger.init().context("Logger already registered")
}

fn setup_tracing(config: &EngineConfig) -> Result<(), Error> {
    use tracing_subscriber::{filter, layer::SubscriberExt, Layer};

    let Some(path) = &config.trace_path else {
        return Ok(());
    };

    let layer = logging::trace_file::layer(path)?.with_filter(filter::LevelFilter::INFO);
    tracing::subscriber::set_global_default(tracing_subscriber::Registry::default().with(layer))
        .context("Failed to set global default subscriber")
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    // The configuration decides where the logs go, so it is read before the
    // loggers exist
    let config = match EngineConfig::load(&args.config) {
        Ok(mut config) => {
            if let Some(rootprefix) = &args.rootprefix {
                config.rootprefix = rootprefix.clone();
            }
            config
        }
        Err(e) => {
            eprintln!("Failed to load configuration: {e:?}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = setup_logging(&args, &config) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = setup_tracing(&config) {
        error!("Failed to initialize tracing: {e:?}");
        return ExitCode::from(1);
    }

    if let Err(e) = run(&args, config) {
        error!("Strata failed: {e:?}");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
