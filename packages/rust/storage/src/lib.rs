//! Fingerprint storage for research-source deduplication.
//!
//! The [`FingerprintStore`] trait is the injected seam the scheduler and
//! router depend on. Two implementations live here:
//! - [`LibsqlFingerprintStore`] — libSQL-backed, the production store.
//!   Reservation atomicity rests on the `url_hash` primary key, not on
//!   in-process locks, so it stays correct across process instances.
//! - [`MemoryFingerprintStore`] — mutex-guarded map with identical
//!   semantics, for tests.

mod migrations;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use url::Url;

use rivet_shared::{Result, RivetError, SourceFingerprint, SourceKind};

// ---------------------------------------------------------------------------
// URL normalization and hashing
// ---------------------------------------------------------------------------

/// Normalize a URL for deduplication: strip the fragment, drop tracking
/// query parameters (`utm_*`, `ref`), and trim the trailing slash except
/// on the root path. The `url` crate already lowercases scheme and host.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let kept: Vec<(String, String)> = normalized
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && k != "ref")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        normalized.set_query(None);
    } else {
        normalized.query_pairs_mut().clear().extend_pairs(kept);
    }

    let mut s = normalized.to_string();
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}

/// Hex SHA-256 of the normalized URL — the persisted unique key.
pub fn url_hash(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// FingerprintStore trait
// ---------------------------------------------------------------------------

/// Deduplication store for candidate research URLs.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Attempt to reserve a URL for ingestion.
    ///
    /// Returns `true` iff this call performed the reservation — either the
    /// first ever for this hash, or a reclaim of a stale incomplete one.
    /// `false` means another caller already holds it; that is expected
    /// and benign, never an error.
    async fn reserve(&self, url: &Url, kind: SourceKind) -> Result<bool>;

    /// Mark a reserved URL as ingested. Idempotent — completing an
    /// already-completed or unknown fingerprint is a no-op.
    async fn complete(&self, url: &Url) -> Result<()>;

    /// Look up the fingerprint for a URL.
    async fn get(&self, url: &Url) -> Result<Option<SourceFingerprint>>;

    /// Incomplete fingerprints reserved before `cutoff` — reclaimable by
    /// the next `reserve`, listed here for operator visibility.
    async fn stale_fingerprints(&self, cutoff: DateTime<Utc>) -> Result<Vec<SourceFingerprint>>;
}

// ---------------------------------------------------------------------------
// libSQL implementation
// ---------------------------------------------------------------------------

/// libSQL-backed fingerprint store.
pub struct LibsqlFingerprintStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    ttl: Duration,
}

impl LibsqlFingerprintStore {
    /// Open or create a database at `path` and apply migrations.
    ///
    /// `ttl_hours` controls when an incomplete reservation becomes stale
    /// and eligible for re-reservation.
    pub async fn open(path: &Path, ttl_hours: i64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RivetError::Storage(format!("create {}: {e}", parent.display())))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| RivetError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| RivetError::Storage(e.to_string()))?;

        let store = Self {
            db,
            conn,
            ttl: Duration::hours(ttl_hours),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    RivetError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Rewrite `created_at` for a hash. Test support for TTL scenarios.
    #[cfg(test)]
    async fn backdate(&self, url: &Url, created_at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "UPDATE source_fingerprints SET created_at = ?1 WHERE url_hash = ?2",
                params![created_at.to_rfc3339(), url_hash(url)],
            )
            .await
            .map_err(|e| RivetError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl FingerprintStore for LibsqlFingerprintStore {
    async fn reserve(&self, url: &Url, kind: SourceKind) -> Result<bool> {
        let now = Utc::now();
        let stale_cutoff = now - self.ttl;

        // Single statement so reservation is atomic at the storage layer:
        // fresh hashes insert; stale incomplete ones are reclaimed by the
        // conflict clause; everything else changes zero rows.
        let affected = self
            .conn
            .execute(
                "INSERT INTO source_fingerprints
                     (url_hash, url, source_type, created_at, queued, completed_at)
                 VALUES (?1, ?2, ?3, ?4, 1, NULL)
                 ON CONFLICT(url_hash) DO UPDATE SET
                     created_at = excluded.created_at,
                     queued = 1
                 WHERE source_fingerprints.completed_at IS NULL
                   AND source_fingerprints.created_at < ?5",
                params![
                    url_hash(url),
                    url.as_str(),
                    kind.as_str(),
                    now.to_rfc3339(),
                    stale_cutoff.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| RivetError::Storage(e.to_string()))?;

        let reserved = affected > 0;
        if reserved {
            tracing::debug!(url = %url, hash = %url_hash(url), "fingerprint reserved");
        }
        Ok(reserved)
    }

    async fn complete(&self, url: &Url) -> Result<()> {
        self.conn
            .execute(
                "UPDATE source_fingerprints SET completed_at = ?1
                 WHERE url_hash = ?2 AND completed_at IS NULL",
                params![Utc::now().to_rfc3339(), url_hash(url)],
            )
            .await
            .map_err(|e| RivetError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, url: &Url) -> Result<Option<SourceFingerprint>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url_hash, url, source_type, created_at, queued, completed_at
                 FROM source_fingerprints WHERE url_hash = ?1",
                params![url_hash(url)],
            )
            .await
            .map_err(|e| RivetError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_fingerprint(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(RivetError::Storage(e.to_string())),
        }
    }

    async fn stale_fingerprints(&self, cutoff: DateTime<Utc>) -> Result<Vec<SourceFingerprint>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url_hash, url, source_type, created_at, queued, completed_at
                 FROM source_fingerprints
                 WHERE completed_at IS NULL AND created_at < ?1
                 ORDER BY created_at",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(|e| RivetError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_fingerprint(&row)?);
        }
        Ok(results)
    }
}

/// Convert a database row to a [`SourceFingerprint`].
fn row_to_fingerprint(row: &libsql::Row) -> Result<SourceFingerprint> {
    let parse_ts = |s: String| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RivetError::Storage(format!("invalid date: {e}")))
    };

    Ok(SourceFingerprint {
        url_hash: row
            .get::<String>(0)
            .map_err(|e| RivetError::Storage(e.to_string()))?,
        url: row
            .get::<String>(1)
            .map_err(|e| RivetError::Storage(e.to_string()))?,
        source_type: SourceKind::from_str_lossy(
            &row.get::<String>(2)
                .map_err(|e| RivetError::Storage(e.to_string()))?,
        ),
        created_at: parse_ts(
            row.get::<String>(3)
                .map_err(|e| RivetError::Storage(e.to_string()))?,
        )?,
        queued: row
            .get::<i64>(4)
            .map_err(|e| RivetError::Storage(e.to_string()))?
            != 0,
        completed_at: match row.get::<String>(5) {
            Ok(s) => Some(parse_ts(s)?),
            Err(_) => None,
        },
    })
}

// ---------------------------------------------------------------------------
// In-memory implementation (test fake)
// ---------------------------------------------------------------------------

/// Mutex-guarded map with the same reserve/complete semantics as the
/// libSQL store. Intended for unit tests of the scheduler and router.
pub struct MemoryFingerprintStore {
    entries: Mutex<HashMap<String, SourceFingerprint>>,
    ttl: Duration,
}

impl MemoryFingerprintStore {
    /// Create a store with the default 24h TTL.
    pub fn new() -> Self {
        Self::with_ttl_hours(24)
    }

    /// Create a store with an explicit TTL.
    pub fn with_ttl_hours(ttl_hours: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Rewrite `created_at` for a URL. Test support for TTL scenarios.
    pub fn backdate(&self, url: &Url, created_at: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("fingerprint map poisoned");
        if let Some(fp) = entries.get_mut(&url_hash(url)) {
            fp.created_at = created_at;
        }
    }

    /// Number of fingerprints held.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("fingerprint map poisoned").len()
    }

    /// True when no fingerprint has been reserved yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryFingerprintStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FingerprintStore for MemoryFingerprintStore {
    async fn reserve(&self, url: &Url, kind: SourceKind) -> Result<bool> {
        let hash = url_hash(url);
        let now = Utc::now();
        let stale_cutoff = now - self.ttl;

        let mut entries = self.entries.lock().expect("fingerprint map poisoned");
        match entries.get_mut(&hash) {
            Some(existing) => {
                // Reclaim only stale incomplete reservations.
                if existing.completed_at.is_none() && existing.created_at < stale_cutoff {
                    existing.created_at = now;
                    existing.queued = true;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => {
                entries.insert(
                    hash.clone(),
                    SourceFingerprint {
                        url_hash: hash,
                        url: url.to_string(),
                        source_type: kind,
                        created_at: now,
                        queued: true,
                        completed_at: None,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn complete(&self, url: &Url) -> Result<()> {
        let mut entries = self.entries.lock().expect("fingerprint map poisoned");
        if let Some(fp) = entries.get_mut(&url_hash(url)) {
            if fp.completed_at.is_none() {
                fp.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn get(&self, url: &Url) -> Result<Option<SourceFingerprint>> {
        let entries = self.entries.lock().expect("fingerprint map poisoned");
        Ok(entries.get(&url_hash(url)).cloned())
    }

    async fn stale_fingerprints(&self, cutoff: DateTime<Utc>) -> Result<Vec<SourceFingerprint>> {
        let entries = self.entries.lock().expect("fingerprint map poisoned");
        let mut stale: Vec<SourceFingerprint> = entries
            .values()
            .filter(|fp| fp.completed_at.is_none() && fp.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|fp| fp.created_at);
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn test_url(path: &str) -> Url {
        Url::parse(&format!("https://forum.example.com/{path}")).expect("test url")
    }

    async fn test_store() -> LibsqlFingerprintStore {
        let tmp = std::env::temp_dir().join(format!("rivet_test_{}.db", Uuid::now_v7()));
        LibsqlFingerprintStore::open(&tmp, 24).await.expect("open test db")
    }

    #[test]
    fn normalize_strips_fragment_and_tracking() {
        let url =
            Url::parse("https://Forum.Example.com/t/f0003?utm_source=x&page=2#post-7").unwrap();
        let normalized = normalize_url(&url);
        assert!(!normalized.contains('#'));
        assert!(!normalized.contains("utm_source"));
        assert!(normalized.contains("page=2"));
        assert!(normalized.starts_with("https://forum.example.com/"));
    }

    #[test]
    fn normalize_trims_trailing_slash() {
        let url = Url::parse("https://example.com/docs/drives/").unwrap();
        assert_eq!(normalize_url(&url), "https://example.com/docs/drives");

        // Root path keeps its slash
        let root = Url::parse("https://example.com/").unwrap();
        assert_eq!(normalize_url(&root), "https://example.com/");
    }

    #[test]
    fn hash_is_stable_across_variants() {
        let a = Url::parse("https://example.com/manual?utm_campaign=x#s2").unwrap();
        let b = Url::parse("https://example.com/manual").unwrap();
        assert_eq!(url_hash(&a), url_hash(&b));
        assert_eq!(url_hash(&a).len(), 64);
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("rivet_test_{}.db", Uuid::now_v7()));
        let s1 = LibsqlFingerprintStore::open(&tmp, 24).await.expect("first open");
        drop(s1);
        let s2 = LibsqlFingerprintStore::open(&tmp, 24).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn reserve_then_duplicate() {
        let store = test_store().await;
        let url = test_url("t/fault-f0003");

        assert!(store.reserve(&url, SourceKind::Forum).await.unwrap());
        assert!(!store.reserve(&url, SourceKind::Forum).await.unwrap());

        let fp = store.get(&url).await.unwrap().expect("fingerprint exists");
        assert!(fp.queued);
        assert!(fp.completed_at.is_none());
        assert_eq!(fp.source_type, SourceKind::Forum);
    }

    #[tokio::test]
    async fn url_variants_share_one_reservation() {
        let store = test_store().await;
        let a = Url::parse("https://example.com/manual?utm_source=mail#top").unwrap();
        let b = Url::parse("https://example.com/manual").unwrap();

        assert!(store.reserve(&a, SourceKind::Manual).await.unwrap());
        assert!(!store.reserve(&b, SourceKind::Manual).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_reserves_yield_one_winner() {
        let store = Arc::new(test_store().await);
        let url = test_url("t/concurrent");

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                store.reserve(&url, SourceKind::Forum).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let store = test_store().await;
        let url = test_url("t/complete");

        store.reserve(&url, SourceKind::Forum).await.unwrap();
        store.complete(&url).await.unwrap();

        let first = store.get(&url).await.unwrap().unwrap().completed_at;
        assert!(first.is_some());

        // Second completion keeps the original timestamp
        store.complete(&url).await.unwrap();
        let second = store.get(&url).await.unwrap().unwrap().completed_at;
        assert_eq!(first, second);

        // Completing an unknown URL is a no-op, not an error
        store.complete(&test_url("t/never-reserved")).await.unwrap();
    }

    #[tokio::test]
    async fn stale_incomplete_fingerprint_is_reservable_again() {
        let store = test_store().await;
        let url = test_url("t/stale");

        assert!(store.reserve(&url, SourceKind::Forum).await.unwrap());
        assert!(!store.reserve(&url, SourceKind::Forum).await.unwrap());

        // Simulate a reservation from 25 hours ago (TTL is 24h)
        store
            .backdate(&url, Utc::now() - Duration::hours(25))
            .await
            .unwrap();

        let stale = store.stale_fingerprints(Utc::now()).await.unwrap();
        assert_eq!(stale.len(), 1);

        assert!(store.reserve(&url, SourceKind::Forum).await.unwrap());
    }

    #[tokio::test]
    async fn completed_fingerprint_is_never_reclaimed() {
        let store = test_store().await;
        let url = test_url("t/done");

        store.reserve(&url, SourceKind::Forum).await.unwrap();
        store.complete(&url).await.unwrap();
        store
            .backdate(&url, Utc::now() - Duration::hours(48))
            .await
            .unwrap();

        assert!(!store.reserve(&url, SourceKind::Forum).await.unwrap());
        assert!(store.stale_fingerprints(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_matches_libsql_semantics() {
        let store = MemoryFingerprintStore::new();
        let url = test_url("t/memory");

        assert!(store.reserve(&url, SourceKind::Forum).await.unwrap());
        assert!(!store.reserve(&url, SourceKind::Forum).await.unwrap());

        store.complete(&url).await.unwrap();
        let fp = store.get(&url).await.unwrap().unwrap();
        assert!(fp.completed_at.is_some());

        // Completed entries stay completed even past the TTL
        store.backdate(&url, Utc::now() - Duration::hours(48));
        assert!(!store.reserve(&url, SourceKind::Forum).await.unwrap());

        // A stale incomplete entry is reclaimable
        let stale_url = test_url("t/memory-stale");
        store.reserve(&stale_url, SourceKind::Forum).await.unwrap();
        store.backdate(&stale_url, Utc::now() - Duration::hours(48));
        assert_eq!(store.stale_fingerprints(Utc::now()).await.unwrap().len(), 1);
        assert!(store.reserve(&stale_url, SourceKind::Forum).await.unwrap());
    }
}
