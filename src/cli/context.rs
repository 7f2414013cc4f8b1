//! Command execution context
//!
//! Loads config once, opens the cache and builds the data source so command
//! handlers only deal with their own logic.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, warn};

use crate::cache::{CacheStore, MemoryMedium, SqliteMedium};
use crate::cli::{GlobalOptions, OutputFormat};
use crate::client::{LeagueSource, RestSource};
use crate::config::{CacheSettings, Config};
use crate::error::{CacheError, Result};
use crate::fetch::Deduplicator;
use crate::prewarm::{PeriodResolver, Prewarmer, PublishedGameweek};
use crate::read_path::Revalidator;

/// Shared state for commands that talk to the backend.
pub struct CommandContext {
    pub config: Config,
    /// Cache store (durable unless `--no-cache` or disabled in config)
    pub store: Arc<CacheStore>,
    /// One deduplicator per process, shared by prewarm and reads
    pub dedup: Arc<Deduplicator>,
    pub source: Arc<dyn LeagueSource>,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load config from `--config` (or the default path), open the cache and
    /// build the REST source.
    ///
    /// # Errors
    /// Returns an error if the config is missing or has no backend section.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Config::load_at(opts.config_ref())?;
        let backend = config.backend()?;
        let url = opts.backend_url_ref().unwrap_or(&backend.url);

        let source = RestSource::new(
            url,
            backend.api_key.clone(),
            backend.access_token.clone(),
            config.preferences.rate_limit,
        )?;
        let store = open_store(&config.cache, opts.no_cache);

        Ok(Self {
            store: Arc::new(store),
            dedup: Arc::new(Deduplicator::new()),
            source: Arc::new(source),
            format: opts.format,
            config,
        })
    }

    /// How the current gameweek is picked for a viewer
    pub fn period_resolver(&self) -> Arc<dyn PeriodResolver> {
        Arc::new(PublishedGameweek::new(Arc::clone(&self.source)))
    }

    pub fn prewarmer(&self) -> Prewarmer {
        Prewarmer::new(
            Arc::clone(&self.source),
            self.period_resolver(),
            Arc::clone(&self.store),
            Arc::clone(&self.dedup),
            self.config.prewarm_options(),
        )
    }

    pub fn revalidator(&self) -> Revalidator {
        Revalidator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.dedup),
            self.config.retry_policy(),
        )
    }
}

/// Open the cache store for a run.
///
/// Falls back to an in-memory medium when the durable one cannot be opened;
/// a broken cache never stops a command.
pub fn open_store(settings: &CacheSettings, no_cache: bool) -> CacheStore {
    if no_cache || !settings.enabled {
        debug!("Using in-memory cache for this run");
        return CacheStore::new(Box::new(memory_medium(settings)));
    }

    match open_durable(settings) {
        Ok(medium) => CacheStore::new(Box::new(medium)),
        Err(e) => {
            warn!("Cache unavailable ({}); continuing with an in-memory cache", e);
            CacheStore::new(Box::new(memory_medium(settings)))
        }
    }
}

/// Open the on-disk medium honoring the configured directory and size cap.
pub fn open_durable(settings: &CacheSettings) -> std::result::Result<SqliteMedium, CacheError> {
    let medium = match &settings.dir {
        Some(dir) => SqliteMedium::open_at(dir)?,
        None => SqliteMedium::open()?,
    };
    Ok(match settings.max_bytes() {
        Some(limit) => medium.with_limit(limit),
        None => medium,
    })
}

/// Directory of the on-disk cache.
pub fn cache_dir(settings: &CacheSettings) -> std::result::Result<PathBuf, CacheError> {
    match &settings.dir {
        Some(dir) => Ok(dir.clone()),
        None => SqliteMedium::cache_dir(),
    }
}

fn memory_medium(settings: &CacheSettings) -> MemoryMedium {
    match settings.max_bytes() {
        Some(limit) => MemoryMedium::with_limit(limit),
        None => MemoryMedium::new(),
    }
}
