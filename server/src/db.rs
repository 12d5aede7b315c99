//! Document store connector.
//!
//! # Responsibility
//! - Lazily open one pooled MongoDB client per `Connector` and hand out
//!   database/collection handles from it.
//! - Probe store liveness for the health endpoint.
//! - Block process startup until the store answers (`wait_until_ready`).
//!
//! # Invariants
//! - A failed first connect leaves the connector unconnected; the next call
//!   tries again.
//! - `wait_until_ready` never touches a `Connector`. It builds its own
//!   short-lived probe clients so it works before anything else is connected.

use std::time::{Duration, Instant};

use mongodb::bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, ConnectionString, HostInfo, ServerAddress};
use mongodb::{Client, Collection, Database};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::config::MongoConfig;
use crate::error::DbError;

const DEFAULT_MONGO_PORT: u16 = 27017;
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_RESOLVE_BACKOFF: Duration = Duration::from_millis(500);

/// Owns the pooled client for one store deployment.
#[derive(Debug)]
pub struct Connector {
    config: MongoConfig,
    client: OnceCell<Client>,
}

impl Connector {
    pub fn new(config: MongoConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Returns the configured database, connecting on first use.
    pub async fn database(&self) -> Result<Database, DbError> {
        let client = self.client.get_or_try_init(|| self.connect()).await?;
        Ok(client.database(&self.config.database))
    }

    pub async fn collection<T: Send + Sync>(&self, name: &str) -> Result<Collection<T>, DbError> {
        Ok(self.database().await?.collection(name))
    }

    async fn connect(&self) -> Result<Client, DbError> {
        let started_at = Instant::now();
        let mut options = ClientOptions::parse(self.config.uri.as_str())
            .await
            .map_err(DbError::InvalidUri)?;
        options.min_pool_size = Some(self.config.min_pool_size);
        options.max_pool_size = Some(self.config.max_pool_size);
        options.server_selection_timeout = Some(self.config.connect_timeout);
        options.connect_timeout = Some(self.config.connect_timeout);
        options.retry_writes = Some(false);

        let client = Client::with_options(options).map_err(DbError::InvalidUri)?;
        if let Err(err) = ping(&client).await {
            error!(
                database = %self.config.database,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "failed to connect to store"
            );
            return Err(DbError::Connection(err));
        }

        info!(
            database = %self.config.database,
            min_pool_size = self.config.min_pool_size,
            max_pool_size = self.config.max_pool_size,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "store connected"
        );
        Ok(client)
    }

    /// Pings the store. Never fails; problems are logged and reported as `false`.
    pub async fn health_check(&self) -> bool {
        let result = match self.database().await {
            Ok(db) => db
                .run_command(doc! { "ping": 1 })
                .await
                .map(drop)
                .map_err(DbError::Connection),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "store health check failed");
                false
            }
        }
    }

    /// Shuts down the pooled client if one was opened.
    pub async fn close(&self) {
        if let Some(client) = self.client.get() {
            client.clone().shutdown().await;
            info!("store connection closed");
        }
    }
}

async fn ping(client: &Client) -> Result<Document, mongodb::error::Error> {
    client.database("admin").run_command(doc! { "ping": 1 }).await
}

/// Blocks until the store at `uri` answers a ping, or `timeout` elapses.
///
/// Host resolution is attempted first and only logged; a host that does not
/// resolve does not end the wait. Each probe uses a fresh client with a one
/// second selection timeout, and failed probes are retried every `interval`.
pub async fn wait_until_ready(
    uri: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<(), DbError> {
    let started_at = Instant::now();
    info!(uri, timeout_secs = timeout.as_secs(), "waiting for store");

    log_host_resolution(uri, started_at, timeout, interval).await;

    loop {
        match probe(uri).await {
            Ok(()) => {
                info!(
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "store is available"
                );
                return Ok(());
            }
            Err(ProbeError::Fatal(err)) => {
                error!(uri, error = %err, "store uri rejected");
                return Err(DbError::InvalidUri(err));
            }
            Err(ProbeError::Retry(err)) => {
                if started_at.elapsed() >= timeout {
                    error!(
                        timeout_secs = timeout.as_secs(),
                        error = %err,
                        "timed out waiting for store"
                    );
                    return Err(DbError::Timeout {
                        waited: timeout,
                        last_error: err.to_string(),
                    });
                }
                debug!(
                    error = %err,
                    retry_in_ms = interval.as_millis() as u64,
                    "store not ready yet"
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}

enum ProbeError {
    Fatal(mongodb::error::Error),
    Retry(mongodb::error::Error),
}

async fn probe(uri: &str) -> Result<(), ProbeError> {
    let mut options = ClientOptions::parse(uri).await.map_err(|err| {
        if matches!(*err.kind, ErrorKind::InvalidArgument { .. }) {
            ProbeError::Fatal(err)
        } else {
            ProbeError::Retry(err)
        }
    })?;
    options.server_selection_timeout = Some(PROBE_TIMEOUT);
    options.connect_timeout = Some(PROBE_TIMEOUT);

    let client = Client::with_options(options).map_err(ProbeError::Fatal)?;
    let result = ping(&client).await;
    client.shutdown().await;
    result.map(drop).map_err(ProbeError::Retry)
}

async fn log_host_resolution(uri: &str, started_at: Instant, timeout: Duration, interval: Duration) {
    let Some((host, port)) = probe_host(uri) else {
        info!(uri, "host resolution check skipped");
        return;
    };

    let backoff = interval.min(MAX_RESOLVE_BACKOFF);
    while started_at.elapsed() < timeout {
        match tokio::net::lookup_host((host.as_str(), port)).await {
            Ok(mut addrs) => {
                if let Some(addr) = addrs.next() {
                    info!(host = %host, resolved = %addr.ip(), "resolved store host");
                    return;
                }
                debug!(host = %host, "store host resolved to no addresses");
            }
            Err(err) => debug!(host = %host, error = %err, "store host not resolved yet"),
        }
        tokio::time::sleep(backoff).await;
    }
    info!(host = %host, "store host resolution failed after retries");
}

/// First TCP `host:port` named by a connection URI, parsed by the driver.
///
/// `None` for URIs the driver rejects, SRV records and socket paths.
pub fn probe_host(uri: &str) -> Option<(String, u16)> {
    let HostInfo::HostIdentifiers(hosts) = ConnectionString::parse(uri).ok()?.host_info else {
        return None;
    };
    hosts.into_iter().find_map(|address| match address {
        ServerAddress::Tcp { host, port } => Some((host, port.unwrap_or(DEFAULT_MONGO_PORT))),
        _ => None,
    })
}
