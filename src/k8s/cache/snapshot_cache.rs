use super::guarded::GuardedCell;
use super::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The single slot of the cache.
///
/// A filled entry always carries its snapshot and both timestamps, so
/// "valid without data" cannot be represented.
#[derive(Debug, Clone, Default)]
enum CacheEntry {
    #[default]
    Empty,
    Filled {
        snapshot: Arc<Snapshot>,
        updated_at: Instant,
        updated_wall: DateTime<Utc>,
    },
}

/// A snapshot together with its age, taken under one read of the slot
#[derive(Debug, Clone)]
pub struct CacheView {
    pub snapshot: Arc<Snapshot>,
    pub age: Duration,
    /// Wall-clock time `snapshot` was installed
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: GuardedCell<CacheEntry>,
}

impl SnapshotCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: GuardedCell::new(CacheEntry::Empty),
        }
    }

    pub fn update(&self, snapshot: impl Into<Arc<Snapshot>>) {
        let snapshot = snapshot.into();
        let (pods, deployments) = (snapshot.pod_count(), snapshot.deployment_count());
        self.slot.replace(CacheEntry::Filled {
            snapshot,
            updated_at: Instant::now(),
            updated_wall: Utc::now(),
        });
        info!("💾 Cache updated with {} pods, {} deployments", pods, deployments);
    }

    #[must_use]
    pub fn read(&self) -> Option<Arc<Snapshot>> {
        self.slot.read_with(|entry| match entry {
            CacheEntry::Filled { snapshot, .. } => Some(snapshot.clone()),
            CacheEntry::Empty => None,
        })
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.slot
            .read_with(|entry| matches!(entry, CacheEntry::Filled { .. }))
    }

    /// Time since the last update, `None` when the cache holds nothing.
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        self.age_at(Instant::now())
    }

    /// True when the cache is empty or older than `max_age`.
    /// An entry exactly `max_age` old is still fresh.
    #[must_use]
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.is_stale_at(max_age, Instant::now())
    }

    /// The cached snapshot and its age, read together.
    #[must_use]
    pub fn view(&self) -> Option<CacheView> {
        let now = Instant::now();
        self.slot.read_with(|entry| match entry {
            CacheEntry::Filled {
                snapshot,
                updated_at,
                updated_wall,
            } => Some(CacheView {
                snapshot: snapshot.clone(),
                age: now.saturating_duration_since(*updated_at),
                last_updated: *updated_wall,
            }),
            CacheEntry::Empty => None,
        })
    }

    /// `view()`, but only if not older than `max_age`.
    #[must_use]
    pub fn read_fresh(&self, max_age: Duration) -> Option<CacheView> {
        match self.view() {
            Some(view) if view.age <= max_age => {
                debug!("🎯 Cache HIT (age {}ms)", view.age.as_millis());
                Some(view)
            }
            Some(_) => {
                debug!("🔄 Cache STALE");
                None
            }
            None => {
                debug!("❌ Cache MISS");
                None
            }
        }
    }

    pub fn invalidate(&self) {
        self.slot.replace(CacheEntry::Empty);
        info!("🗑️ Cache invalidated");
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        self.slot.read_with(|entry| match entry {
            CacheEntry::Filled {
                snapshot,
                updated_at,
                updated_wall,
            } => CacheStats {
                is_valid: true,
                entry_count: snapshot.entry_count(),
                last_updated_millis: updated_wall.timestamp_millis(),
                cache_age_millis: millis_i64(now.saturating_duration_since(*updated_at)),
            },
            CacheEntry::Empty => CacheStats::empty(),
        })
    }

    fn age_at(&self, now: Instant) -> Option<Duration> {
        self.slot.read_with(|entry| match entry {
            CacheEntry::Filled { updated_at, .. } => {
                Some(now.saturating_duration_since(*updated_at))
            }
            CacheEntry::Empty => None,
        })
    }

    fn is_stale_at(&self, max_age: Duration, now: Instant) -> bool {
        self.age_at(now).is_none_or(|age| age > max_age)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub is_valid: bool,
    pub entry_count: usize,
    /// Wall-clock time of the last update, 0 when empty
    pub last_updated_millis: i64,
    /// -1 when empty
    pub cache_age_millis: i64,
}

impl CacheStats {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            is_valid: false,
            entry_count: 0,
            last_updated_millis: 0,
            cache_age_millis: -1,
        }
    }
}

pub(crate) fn millis_i64(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
