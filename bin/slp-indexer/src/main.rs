//! SLP indexer binary entrypoint.

use std::sync::{atomic::AtomicBool, Arc};

use anyhow::{anyhow, Result};
use argh::from_env;
use slp_common::logging;
use slp_config::Config;
use tokio::runtime::{self, Handle};
use tracing::*;

use crate::{args::Args, errors::InitError, sync::SyncWorker};

mod args;
mod context;
mod errors;
mod sync;

fn main() -> Result<()> {
    let args: Args = from_env();

    // Load config early to initialize logging with config settings
    let config = context::load_config_early(&args)
        .map_err(|e| anyhow!("Failed to load configuration: {e}"))?;

    // Init runtime
    let rt = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("slp-indexer-rt")
        .build()
        .map_err(InitError::RuntimeBuild)?;

    init_logging(rt.handle(), &config)?;

    let res = rt.block_on(run(config));
    logging::finalize();
    res
}

async fn run(config: Config) -> Result<()> {
    let db = context::init_store(&config)
        .map_err(|e| anyhow!("Failed to initialize store: {e}"))?;
    let rpc = context::create_bitcoin_rpc_client(&config)?;
    let indexer = context::init_indexer(&config, db.clone(), rpc.clone())?;

    let stop = Arc::new(AtomicBool::new(false));
    let _signals = sync::spawn_signal_listener(stop.clone());

    let worker = SyncWorker::new(db, rpc, indexer, &config.indexer, stop);
    match worker.run().await {
        Ok(synced) => {
            info!(synced, "Exiting slp indexer");
            Ok(())
        }
        Err(err) if err.is_fatal() => {
            error!(%err, "indexing halted, restart to resume after the rollback");
            Err(err.into())
        }
        Err(err) => {
            error!(%err, "indexing failed");
            Err(err.into())
        }
    }
}

fn init_logging(rt: &Handle, config: &Config) -> Result<()> {
    // Need to set the runtime context for async OTLP setup
    let _g = rt.enter();
    logging::init_logging_from_config(logging::LoggingInitConfig {
        service_base_name: "slp-indexer",
        service_label: config.logging.service_label.as_deref(),
        service_version: Some(env!("CARGO_PKG_VERSION")),
        otlp_url: config.logging.otlp_url.as_deref(),
        log_dir: config.logging.log_dir.as_ref(),
        log_file_prefix: config.logging.log_file_prefix.as_deref(),
        json_format: config.logging.json_format,
    })?;
    Ok(())
}
