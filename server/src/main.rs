use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use todo_server::config::{Config, StoreBackend};
use todo_server::db::{self, Connector};
use todo_server::telemetry::{self, LogFormat};
use todo_server::{MemoryTodoStore, MongoTodoStore, TodoService, TodoStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init(LogFormat::from_env())?;
    let config = Config::from_env()?;

    let mut connector = None;
    let store: Arc<dyn TodoStore> = match config.backend {
        StoreBackend::Memory => {
            warn!("using in-memory store; data is lost on exit");
            Arc::new(MemoryTodoStore::new())
        }
        StoreBackend::Mongo => {
            if config.wait.enabled {
                info!(timeout_secs = config.wait.timeout.as_secs(), "waiting for store before startup");
                db::wait_until_ready(&config.mongo.uri, config.wait.timeout, config.wait.interval).await?;
            } else {
                info!("RUN_DB_WAIT=0, skipping store wait");
            }
            let shared = Arc::new(Connector::new(config.mongo.clone()));
            connector = Some(Arc::clone(&shared));
            Arc::new(MongoTodoStore::new(shared))
        }
    };

    let service = TodoService::new(store);
    service.ensure_ready().await;

    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");
    todo_server::run_until(listener, service, config.api, shutdown_signal()).await?;

    if let Some(connector) = connector {
        connector.close().await;
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
