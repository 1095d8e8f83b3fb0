// Composition root that wires adapters, the cache and the HTTP interface together

use anyhow::{Context, Result};
use gitpulse_core::ports::{EventSource, SnapshotStore, SystemClock};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::adapters::{github::GitHubEventSource, persistence::FileSnapshotStore};
use crate::config::Config;
use crate::interface;
use crate::lifecycle::{self, PersistOnShutdown};
use crate::services::stats_service::{SharedCache, StatsService};

/// How long blocking fetches may keep running once the server has stopped
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The main application struct that owns the single repository cache
pub struct GitPulseApp {
    config: Config,

    /// The statistics service (hexagonal core plus adapters)
    service: Arc<StatsService>,

    /// Writes the cache back to the snapshot on the way out
    persist: PersistOnShutdown,
}

impl GitPulseApp {
    /// Create the application from a validated config.
    /// This is the composition root - where dependency injection happens
    pub fn new(config: Config) -> Result<Self> {
        info!("Initializing gitpulse");

        let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::with_path(&config.snapshot_path));
        info!("Loading snapshot from {}", config.snapshot_path.display());
        let cache = lifecycle::load_cache(
            store.as_ref(),
            config.cache.max_repositories,
            config.cache.max_events,
        );
        let cache: SharedCache = Arc::new(Mutex::new(cache));

        let source: Arc<dyn EventSource> = Arc::new(
            GitHubEventSource::from_config(&config.source)
                .context("Failed to set up the GitHub event source")?,
        );

        let service = Arc::new(StatsService::new(
            cache.clone(),
            source,
            Arc::new(SystemClock),
            config.fetch_limits(),
            config.source.fetch_timeout(),
        ));
        let persist = PersistOnShutdown::new(cache, store);

        Ok(Self {
            config,
            service,
            persist,
        })
    }

    /// Serve until a shutdown signal arrives, then save the snapshot.
    ///
    /// The runtime is built here rather than in `main` so the blocking HTTP
    /// client is created and dropped outside of it.
    pub fn run(self) -> Result<()> {
        let GitPulseApp {
            config,
            service,
            persist,
        } = self;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start the async runtime")?;

        info!("Starting server interface on {}", config.bind_address);
        let served = runtime.block_on(interface::serve(
            config.bind_address.clone(),
            service.clone(),
            lifecycle::shutdown_signal(),
        ));
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

        if let Err(e) = &served {
            error!("Server interface stopped with an error: {}", e);
        }

        // Save even when the server failed
        let saved = persist.finish();
        drop(service);

        served.context("Error in HTTP interface.")?;
        saved
    }
}
