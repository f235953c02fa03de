use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::{Parser, error::ErrorKind};
use tracing::{error, info, warn};

use autosync_core::{
    ExitStatus, Mode, Shutdown, SyncEngine, TaskJournal, TaskOverride, Worker, dispatch, system,
};
use autosync_observe::logger_init;
use autosync_store::PgStore;

mod config;
use config::Config;

/// Startup misconfiguration.
const EXIT_STARTUP: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match Config::try_parse() {
        Ok(cfg) => cfg,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_STARTUP),
            };
        }
    };

    match run(cfg).await {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("autosync-agentd: {e:#}");
            ExitCode::from(EXIT_STARTUP)
        }
    }
}

async fn run(cfg: Config) -> anyhow::Result<ExitStatus> {
    // 1) Logger
    logger_init(&cfg.logger()).context("failed to initialise logging")?;

    // 2) Mode
    let task_override = TaskOverride::parse(&cfg.task_override)?;
    let mode = Mode::select(task_override, cfg.interval(), cfg.parity_days_back);
    info!(
        ?mode,
        pid = %system::pid(),
        host = system::host(),
        "autosync worker starting"
    );

    // 3) Liveness endpoint, up for the whole process lifetime
    let shutdown = Shutdown::new();
    let (addr, healthz) = autosync_api::serve(cfg.healthz_addr(), shutdown.token())
        .await
        .context("failed to start liveness endpoint")?;
    let healthz = tokio::spawn(async move {
        if let Err(e) = healthz.await {
            error!(error = %e, "liveness endpoint stopped");
        }
    });
    info!(%addr, "serving /healthz");

    // 4) Signals
    shutdown.listen_for_signals();

    // 5) Store + worker
    let store = Arc::new(PgStore::new(&cfg.store()).context("invalid store configuration")?);
    let retry = cfg.retry();
    let worker = Worker::new(
        TaskJournal::new(store.clone(), retry),
        SyncEngine::new(store, retry),
    )
    .with_cycle_timeout(cfg.cycle_timeout());

    match worker.engine().probe().await {
        Ok(()) => info!("store reachable"),
        Err(e) => warn!(error = %e, "store probe failed, starting anyway"),
    }

    // 6) Run
    let status = dispatch(&worker, mode, &shutdown).await;

    shutdown.trigger();
    if let Err(e) = healthz.await {
        warn!(error = %e, "liveness task ended abnormally");
    }
    info!(exit_code = status.code(), "autosync worker stopped");

    Ok(status)
}
