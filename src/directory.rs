use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::deconz::{Sensor, SensorId, Sensors};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on a single fetch from the [`SensorSource`].
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the directory loads sensor metadata from.
#[async_trait]
pub trait SensorSource: Send + Sync + 'static {
    async fn fetch_sensors(&self) -> anyhow::Result<Sensors>;
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("no such sensor: {0}")]
    NotFound(SensorId),

    #[error("failed to fetch sensors: {0:#}")]
    Fetch(anyhow::Error),
}

/// Read access to the current sensor snapshot.
pub trait SensorDirectory: Send + Sync {
    fn get(&self, id: SensorId) -> Result<Sensor, DirectoryError>;

    fn all(&self) -> Arc<Sensors>;
}

/// A [`SensorDirectory`] that caches the full sensor list and revalidates it
/// in the background once it is older than the refresh interval.
///
/// Readers always see one complete snapshot: a refresh builds a new map and
/// swaps it in. A failed refresh leaves the previous snapshot in place.
pub struct CachingDirectory<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    source: S,
    snapshot: ArcSwap<Snapshot>,
    refreshing: AtomicBool,
    refresh_interval: Duration,
}

struct Snapshot {
    sensors: Arc<Sensors>,
    fetched_at: Instant,
}

impl<S: SensorSource> CachingDirectory<S> {
    /// Performs the initial fetch. Fails if the source cannot be read.
    pub async fn new(source: S, refresh_interval: Duration) -> Result<Self, DirectoryError> {
        let sensors = fetch(&source).await.map_err(DirectoryError::Fetch)?;
        info!(count = sensors.len(), "sensor directory populated");

        Ok(Self {
            inner: Arc::new(Inner {
                source,
                snapshot: ArcSwap::from_pointee(Snapshot {
                    sensors: Arc::new(sensors),
                    fetched_at: Instant::now(),
                }),
                refreshing: AtomicBool::new(false),
                refresh_interval,
            }),
        })
    }

    /// Fetches the sensor list now and swaps it in.
    pub async fn refresh(&self) -> Result<(), DirectoryError> {
        self.inner.refresh().await.map_err(DirectoryError::Fetch)
    }

    fn revalidate_if_stale(&self) {
        if self.inner.snapshot.load().fetched_at.elapsed() < self.inner.refresh_interval {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            debug!("sensor directory is stale but no runtime is available to refresh it");
            return;
        };

        if self.inner.refreshing.swap(true, Ordering::AcqRel) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            if let Err(err) = inner.refresh().await {
                error!("failed to update sensor directory: {err:#}");
            }
            inner.refreshing.store(false, Ordering::Release);
        });
    }
}

impl<S: SensorSource> Inner<S> {
    async fn refresh(&self) -> anyhow::Result<()> {
        let sensors = fetch(&self.source).await?;
        let count = sensors.len();

        self.snapshot.store(Arc::new(Snapshot {
            sensors: Arc::new(sensors),
            fetched_at: Instant::now(),
        }));

        info!(count, "sensor directory updated");

        Ok(())
    }
}

async fn fetch<S: SensorSource>(source: &S) -> anyhow::Result<Sensors> {
    tokio::time::timeout(FETCH_TIMEOUT, source.fetch_sensors())
        .await
        .map_err(|_| anyhow::anyhow!("sensor fetch timed out after {FETCH_TIMEOUT:?}"))?
}

impl<S: SensorSource> SensorDirectory for CachingDirectory<S> {
    fn get(&self, id: SensorId) -> Result<Sensor, DirectoryError> {
        self.revalidate_if_stale();

        self.inner
            .snapshot
            .load()
            .sensors
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::NotFound(id))
    }

    fn all(&self) -> Arc<Sensors> {
        self.revalidate_if_stale();

        Arc::clone(&self.inner.snapshot.load().sensors)
    }
}
