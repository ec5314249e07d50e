use super::config::InterrogatorConfig;
use super::fetcher::SnapshotSource;
use super::snapshot_cache::{CacheStats, SnapshotCache};
use crate::bus::events::MetricsEvent;
use crate::bus::{MessageBridge, METRICS_SUBJECT};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

#[derive(Debug, Default)]
struct CollectionCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// One collection cycle's worth of collaborators.
///
/// Cloned into the periodic loop and into every forced update, so overlapping
/// collections never share anything but the cache.
#[derive(Clone)]
struct Collector {
    source: Arc<dyn SnapshotSource>,
    cache: Arc<SnapshotCache>,
    bridge: Option<Arc<MessageBridge>>,
    counters: Arc<CollectionCounters>,
    source_name: String,
}

impl Collector {
    /// Fetch, install, report. Returns whether the cache was updated.
    async fn collect(&self) -> bool {
        let start = Instant::now();
        info!("🔄 Collecting cluster data from {}...", self.source.name());

        let snapshot = match self.source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    "❌ Error collecting cluster data ({:.2}s): {}",
                    start.elapsed().as_secs_f64(),
                    e
                );
                return false;
            }
        };

        let metrics = MetricsEvent::new(
            snapshot.pod_count(),
            snapshot.deployment_count(),
            &self.source_name,
        );
        self.cache.update(snapshot);
        self.counters.succeeded.fetch_add(1, Ordering::Relaxed);

        if let Some(bridge) = &self.bridge {
            if !bridge.publish_async(METRICS_SUBJECT, &metrics).await {
                warn!("⚠️  Collection metrics were not published");
            }
        }

        info!(
            "✅ Cluster data collection completed in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        true
    }

    async fn run(
        self,
        mut shutdown_rx: mpsc::Receiver<()>,
        running: Arc<AtomicBool>,
        interval: Duration,
    ) {
        self.collect().await;

        while running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                () = sleep(interval) => {}
            }
            // stop() may have landed while we slept
            if running.load(Ordering::SeqCst) {
                self.collect().await;
            }
        }
        info!("🛑 ClusterInterrogator loop exited");
    }
}

struct LoopTask {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Keeps the snapshot cache filled from a `SnapshotSource`.
///
/// Runs one collection immediately on `start()` and then one per interval.
/// `force_update()` adds an out-of-band collection without moving the
/// periodic schedule. Overlapping collections are not serialized: each is an
/// independent full fetch and the cache keeps whichever `update` came last.
pub struct Interrogator {
    collector: Collector,
    config: InterrogatorConfig,
    running: Arc<AtomicBool>,
    task: Mutex<Option<LoopTask>>,
}

impl Interrogator {
    #[must_use]
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        cache: Arc<SnapshotCache>,
        bridge: Option<Arc<MessageBridge>>,
        config: InterrogatorConfig,
    ) -> Self {
        Self {
            collector: Collector {
                source,
                cache,
                bridge,
                counters: Arc::new(CollectionCounters::default()),
                source_name: config.source_name.clone(),
            },
            config,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the periodic loop on the current tokio runtime.
    /// A second call while running only logs.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("ClusterInterrogator already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(self.collector.clone().run(
            shutdown_rx,
            self.running.clone(),
            self.config.interval,
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(LoopTask { shutdown_tx, handle });

        info!(
            "🚀 ClusterInterrogator started with {}s interval",
            self.config.interval.as_secs()
        );
    }

    /// Stop the loop and wait for it up to `stop_timeout`.
    ///
    /// A collection already in progress is left to finish on its own if it
    /// outlives the wait. Calling this while stopped does nothing.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping ClusterInterrogator...");

        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(LoopTask { shutdown_tx, handle }) = task {
            let _ = shutdown_tx.try_send(());
            match timeout(self.config.stop_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("❌ ClusterInterrogator loop failed: {}", e),
                Err(_) => warn!(
                    "⚠️  ClusterInterrogator loop still busy after {}s, not waiting any longer",
                    self.config.stop_timeout.as_secs()
                ),
            }
        }
        info!("ClusterInterrogator stopped");
    }

    /// Run one extra collection in the background, returning its handle.
    pub fn force_update(&self) -> JoinHandle<bool> {
        let collector = self.collector.clone();
        let handle = tokio::spawn(async move { collector.collect().await });
        info!("⚡ Forced cluster data update triggered");
        handle
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.config.interval
    }

    #[must_use]
    pub fn status(&self) -> InterrogatorStatus {
        InterrogatorStatus {
            cache: self.collector.cache.stats(),
            interrogator_running: self.is_running(),
            interval_seconds: self.interval().as_secs(),
            collections_succeeded: self.collector.counters.succeeded.load(Ordering::Relaxed),
            collections_failed: self.collector.counters.failed.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Interrogator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrogator")
            .field("source", &self.collector.source.name())
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Cache stats merged with the interrogator's own state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterrogatorStatus {
    #[serde(flatten)]
    pub cache: CacheStats,
    pub interrogator_running: bool,
    pub interval_seconds: u64,
    pub collections_succeeded: u64,
    pub collections_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::k8s::cache::Snapshot;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for FlakySource {
        async fn fetch_snapshot(&self) -> Result<Snapshot> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Ok(Snapshot::new(vec![], vec![]))
            } else {
                Err(Error::Custom("api server unreachable".to_string()))
            }
        }
    }

    fn interrogator(source: Arc<dyn SnapshotSource>) -> Interrogator {
        Interrogator::new(
            source,
            Arc::new(SnapshotCache::new()),
            None,
            InterrogatorConfig::with_interval(Duration::from_secs(3600)),
        )
    }

    #[tokio::test]
    async fn test_counters_track_outcomes() {
        let interrogator = interrogator(Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        }));

        assert!(interrogator.force_update().await.unwrap());
        assert!(!interrogator.force_update().await.unwrap());

        let status = interrogator.status();
        assert_eq!(status.collections_succeeded, 1);
        assert_eq!(status.collections_failed, 1);
        assert!(status.cache.is_valid);
        assert!(!status.interrogator_running);
        assert_eq!(status.interval_seconds, 3600);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let interrogator = interrogator(Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        }));
        interrogator.stop().await;
        assert!(!interrogator.is_running());
    }
}
