//! Recovery point store
//!
//! Every point is written to two independent targets: a durable JSON file
//! (`recovery_points/recovery_point_<key>.json`) and, when configured, an
//! ephemeral cache whose TTL equals the retention window. A failed write to
//! one target never rolls back the other.
//!
//! Read policy: the file record is authoritative. Reads merge both targets
//! by key; when both hold a record the file wins, and cache-only records are
//! returned as-is (they cover a lost file write until the TTL expires).

use crate::error::{RecoveryError, Result};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Duration as ChronoDuration, Utc};
use lazarus_core::types::{RecoveryPoint, RetentionPolicy};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Prefix of recovery point file names
const RECORD_PREFIX: &str = "recovery_point_";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Fast, expiring key-value target for serialized points
#[async_trait]
pub trait CacheTarget: Send + Sync {
    fn name(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    async fn put(&self, key: &str, json: &str, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Every live serialized point
    async fn list(&self) -> Result<Vec<String>>;

    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Redis cache target.
///
/// Values live under `<prefix>recovery_point:<key>`; the set
/// `<prefix>recovery_points` indexes them. Index members whose value has
/// expired are pruned on listing.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisCache {
    pub async fn connect(url: &str, prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn value_key(&self, key: &str) -> String {
        format!("{}recovery_point:{}", self.prefix, key)
    }

    fn index_key(&self) -> String {
        format!("{}recovery_points", self.prefix)
    }
}

#[async_trait]
impl CacheTarget for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn put(&self, key: &str, json: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.value_key(key), json, ttl.as_secs().max(1))
            .await?;
        let _: () = conn.sadd(self.index_key(), key).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(self.value_key(key)).await?)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.smembers(self.index_key()).await?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value: Option<String> = conn.get(self.value_key(&key)).await?;
            match value {
                Some(json) => values.push(json),
                None => {
                    let _: () = conn.srem(self.index_key(), &key).await?;
                }
            }
        }
        Ok(values)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u32 = conn.del(self.value_key(key)).await?;
        let _: () = conn.srem(self.index_key(), key).await?;
        Ok(removed > 0)
    }
}

/// In-process cache target with TTL semantics
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheTarget for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, key: &str, json: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), (json.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(json, _)| json.clone()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, (_, expires)| *expires > now);
        Ok(entries.values().map(|(json, _)| json.clone()).collect())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }
}

/// What a cleanup pass removed (or would remove, in a dry run)
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CleanupReport {
    /// Keys of points older than the retention window
    pub expired_points: Vec<String>,
    /// Keys of points beyond the per-version count limit
    pub excess_points: Vec<String>,
    /// Artifact files deleted
    pub artifacts_removed: usize,
    /// Operation records deleted
    pub operations_removed: Vec<String>,
    pub dry_run: bool,
}

impl CleanupReport {
    pub fn points_removed(&self) -> usize {
        self.expired_points.len() + self.excess_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points_removed() == 0 && self.operations_removed.is_empty()
    }
}

/// Durable store of recovery point records
pub struct RecoveryPointStore {
    dir: Utf8PathBuf,
    cache: Option<Arc<dyn CacheTarget>>,
    retention: RetentionPolicy,
}

impl RecoveryPointStore {
    pub fn new(
        dir: impl Into<Utf8PathBuf>,
        cache: Option<Arc<dyn CacheTarget>>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            dir: dir.into(),
            cache,
            retention,
        }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn cache_name(&self) -> Option<&'static str> {
        self.cache.as_ref().map(|c| c.name())
    }

    /// Ping the cache target; `None` when none is configured
    pub async fn ping_cache(&self) -> Option<Result<()>> {
        match &self.cache {
            Some(cache) => Some(cache.ping().await),
            None => None,
        }
    }

    fn record_path(&self, key: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}{}.json", RECORD_PREFIX, key))
    }

    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention.days).max(1) * SECONDS_PER_DAY)
    }

    /// Write a point to every target.
    ///
    /// Succeeds when at least one target accepted the record; failures of the
    /// other targets are logged.
    pub async fn store(&self, point: &RecoveryPoint) -> Result<()> {
        let key = point.key();
        let json = serde_json::to_string_pretty(point)?;

        let file_result = self.write_file(&key, &json).await;
        if let Err(e) = &file_result {
            warn!("Recovery point {} not written to file store: {}", key, e);
        }

        let cache_result = match &self.cache {
            Some(cache) => {
                let result = cache.put(&key, &json, self.cache_ttl()).await;
                if let Err(e) = &result {
                    warn!("Recovery point {} not written to {} cache: {}", key, cache.name(), e);
                }
                Some(result)
            }
            None => None,
        };

        match (file_result, cache_result) {
            (Ok(()), _) | (Err(_), Some(Ok(()))) => {
                info!("Stored recovery point {} ({})", key, point.deployment_version);
                Ok(())
            }
            (Err(file_err), None) => Err(file_err),
            (Err(file_err), Some(Err(cache_err))) => Err(RecoveryError::Store(format!(
                "all targets failed for {}: file: {}; cache: {}",
                key, file_err, cache_err
            ))),
        }
    }

    async fn write_file(&self, key: &str, json: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.record_path(key);
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(RecoveryError::PointExists {
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Fetch one point by key
    pub async fn get(&self, key: &str) -> Result<Option<RecoveryPoint>> {
        match tokio::fs::read_to_string(self.record_path(key)).await {
            Ok(content) => return Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(cache) = &self.cache {
            if let Some(json) = cache.get(key).await? {
                return Ok(Some(serde_json::from_str(&json)?));
            }
        }
        Ok(None)
    }

    /// Every known point, newest first
    pub async fn list_all(&self) -> Result<Vec<RecoveryPoint>> {
        let mut merged: BTreeMap<String, RecoveryPoint> = BTreeMap::new();

        if let Some(cache) = &self.cache {
            match cache.list().await {
                Ok(values) => {
                    for json in values {
                        match serde_json::from_str::<RecoveryPoint>(&json) {
                            Ok(point) => {
                                merged.insert(point.key(), point);
                            }
                            Err(e) => warn!("Skipping malformed cached recovery point: {}", e),
                        }
                    }
                }
                Err(e) => warn!("Cache unavailable, listing file records only: {}", e),
            }
        }

        // File records overwrite cache entries with the same key
        for point in self.read_files().await? {
            merged.insert(point.key(), point);
        }

        let mut points: Vec<RecoveryPoint> = merged.into_values().collect();
        points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(points)
    }

    async fn read_files(&self) -> Result<Vec<RecoveryPoint>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut points = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(RECORD_PREFIX) && n.ends_with(".json"));
            if !is_record {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<RecoveryPoint>(&content) {
                Ok(point) => points.push(point),
                Err(e) => warn!("Skipping malformed recovery point {}: {}", path.display(), e),
            }
        }
        Ok(points)
    }

    /// Points created within the last `days_back` days, newest first
    pub async fn list_since(&self, days_back: u32) -> Result<Vec<RecoveryPoint>> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days_back));
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|p| p.timestamp >= cutoff)
            .collect())
    }

    /// Newest point of any version
    pub async fn latest(&self) -> Result<Option<RecoveryPoint>> {
        Ok(self.list_all().await?.into_iter().next())
    }

    /// Newest point matching `predicate`
    pub async fn latest_matching<F>(&self, predicate: F) -> Result<Option<RecoveryPoint>>
    where
        F: Fn(&RecoveryPoint) -> bool,
    {
        Ok(self.list_all().await?.into_iter().find(|p| predicate(p)))
    }

    /// Newest point recorded for `version`
    pub async fn latest_for_version(&self, version: &str) -> Result<Option<RecoveryPoint>> {
        self.latest_matching(|p| p.deployment_version == version)
            .await
    }

    /// Delete points older than `retention_days`, and points beyond the
    /// per-version limit, together with their artifacts, from every target.
    ///
    /// Idempotent: a second pass with nothing new to delete removes nothing.
    pub async fn cleanup(&self, retention_days: u32, dry_run: bool) -> Result<CleanupReport> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));
        let points = self.list_all().await?;

        let mut report = CleanupReport {
            dry_run,
            ..Default::default()
        };
        let mut doomed = Vec::new();
        let mut kept_per_version: HashMap<&str, usize> = HashMap::new();

        // Newest first, so the per-version limit keeps the most recent points
        for point in &points {
            if point.timestamp < cutoff {
                report.expired_points.push(point.key());
                doomed.push(point);
                continue;
            }
            let kept = kept_per_version
                .entry(point.deployment_version.as_str())
                .or_insert(0);
            if *kept >= self.retention.versions {
                report.excess_points.push(point.key());
                doomed.push(point);
            } else {
                *kept += 1;
            }
        }

        if dry_run {
            return Ok(report);
        }

        for point in doomed {
            report.artifacts_removed += self.delete_point(point).await?;
        }

        if report.points_removed() > 0 {
            info!(
                "Cleanup removed {} recovery points and {} artifacts",
                report.points_removed(),
                report.artifacts_removed
            );
        } else {
            debug!("Cleanup found nothing to remove");
        }
        Ok(report)
    }

    /// Remove a point's artifacts and records; returns artifacts deleted
    async fn delete_point(&self, point: &RecoveryPoint) -> Result<usize> {
        let key = point.key();
        let mut artifacts = 0;

        for reference in point.artifact_refs() {
            let path = Utf8PathBuf::from(reference);
            match tokio::task::spawn_blocking(move || lazarus_backup::remove_artifact(&path)).await
            {
                Ok(Ok(true)) => artifacts += 1,
                Ok(Ok(false)) => {}
                Ok(Err(e)) => warn!("Failed to delete artifact {}: {}", reference, e),
                Err(e) => warn!("Artifact deletion task failed for {}: {}", reference, e),
            }
        }

        match tokio::fs::remove_file(self.record_path(&key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&key).await {
                warn!("Failed to delete cached recovery point {}: {}", key, e);
            }
        }

        info!("Deleted recovery point {} ({})", key, point.deployment_version);
        Ok(artifacts)
    }
}
