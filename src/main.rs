use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use classidb::ClassiDb;
use classidb::config::{Config, RuntimeProfile};
use classidb::server::ClassiServer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let config = Config::parse();
    let profile = RuntimeProfile::detect();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
    .worker_threads(profile.worker_threads)
    .enable_all()
    .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async_main(config, profile))
}

async fn async_main(config: Config, profile: RuntimeProfile) -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("info,classidb=info"));
    tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_level(true)
    .init();

    info!(
        cores = profile.logical_cores,
        workers = profile.worker_threads,
        undo_ttl_secs = config.undo_ttl().num_seconds(),
        "starting classidb"
    );

    let addr: SocketAddr = match config.addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(addr = %config.addr, error = %e, "invalid listen address");
            return ExitCode::FAILURE;
        }
    };

    let db = Arc::new(ClassiDb::new(config.undo_ttl()));

    // A broken seed file is not fatal: the API starts with an empty store.
    let _ = db.load_seed_file(&config.seed);

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("ctrl-c handler unavailable, running until killed");
            std::future::pending::<()>().await;
        }
        info!("shutting down");
    };

    let server = ClassiServer::new(db);
    match server.run(addr, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%addr, error = %e, "could not bind");
            ExitCode::FAILURE
        }
    }
}
