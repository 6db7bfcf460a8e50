use super::{Clock, LinkError, TemporaryLink};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory token → link map with expiry and a size cap
///
/// Expired entries are evicted lazily on access, by [`LinkStore::purge_expired`],
/// and when an insert would grow the store past its capacity.
pub struct LinkStore {
    links: RwLock<HashMap<String, TemporaryLink>>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl LinkStore {
    /// Create an empty store holding at most `max_entries` links
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, max_entries: usize) -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
            clock,
            max_entries: max_entries.max(1),
        }
    }

    /// Current instant according to the store's clock
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Maximum number of entries kept
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Record a link.
    ///
    /// Returns `false` without touching the store if the token is already held
    /// by a live entry. An expired holder of the same token is replaced.
    pub async fn insert(&self, link: TemporaryLink) -> bool {
        let now = self.clock.now();
        let mut links = self.links.write().await;

        if links
            .get(&link.token)
            .is_some_and(|existing| !existing.is_expired_at(now))
        {
            return false;
        }

        if !links.contains_key(&link.token) && links.len() >= self.max_entries {
            let purged = purge_locked(&mut links, now);
            if purged > 0 {
                debug!(purged, "Purged expired links to make room");
            }
            while links.len() >= self.max_entries {
                let Some(oldest) = links
                    .values()
                    .min_by_key(|l| l.expires_at)
                    .map(|l| l.token.clone())
                else {
                    break;
                };
                links.remove(&oldest);
                debug!(token = %oldest, "Evicted link at capacity");
            }
        }

        links.insert(link.token.clone(), link);
        true
    }

    /// Resolve a token to its target URL.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotFound`] for unknown tokens and
    /// [`LinkError::Expired`] (after evicting the entry) for expired ones.
    pub async fn resolve(&self, token: &str) -> Result<String, LinkError> {
        let now = self.clock.now();
        {
            let links = self.links.read().await;
            match links.get(token) {
                None => return Err(LinkError::NotFound),
                Some(link) if !link.is_expired_at(now) => return Ok(link.target_url.clone()),
                Some(_) => {}
            }
        }

        let mut links = self.links.write().await;
        // Re-check under the write lock: the entry may have been replaced meanwhile
        match links.get(token) {
            None => Err(LinkError::NotFound),
            Some(link) if !link.is_expired_at(now) => Ok(link.target_url.clone()),
            Some(_) => {
                links.remove(token);
                debug!(token, "Evicted expired link on access");
                Err(LinkError::Expired)
            }
        }
    }

    /// Returns true if the token is held by an unexpired entry
    pub async fn contains_live(&self, token: &str) -> bool {
        let now = self.clock.now();
        self.links
            .read()
            .await
            .get(token)
            .is_some_and(|link| !link.is_expired_at(now))
    }

    /// Remove every expired entry, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut links = self.links.write().await;
        purge_locked(&mut links, now)
    }

    /// Number of stored entries, expired ones not yet purged included
    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    /// Returns true if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.links.read().await.is_empty()
    }
}

fn purge_locked(links: &mut HashMap<String, TemporaryLink>, now: DateTime<Utc>) -> usize {
    let before = links.len();
    links.retain(|_, link| !link.is_expired_at(now));
    before - links.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::ManualClock;
    use chrono::Duration;

    fn link(token: &str, url: &str, expires_at: DateTime<Utc>) -> TemporaryLink {
        TemporaryLink {
            token: token.to_string(),
            target_url: url.to_string(),
            expires_at,
        }
    }

    fn setup(max: usize) -> (Arc<ManualClock>, LinkStore) {
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let store = LinkStore::new(clock.clone(), max);
        (clock, store)
    }

    #[tokio::test]
    async fn test_resolve_unknown_token() {
        let (_, store) = setup(10);
        assert_eq!(store.resolve("nope").await, Err(LinkError::NotFound));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent_before_expiry() {
        let (clock, store) = setup(10);
        let expires = clock.now() + Duration::seconds(60);
        assert!(store.insert(link("t1", "https://cdn/a.mkv", expires)).await);

        assert_eq!(store.resolve("t1").await.as_deref(), Ok("https://cdn/a.mkv"));
        assert_eq!(store.resolve("t1").await.as_deref(), Ok("https://cdn/a.mkv"));
    }

    #[tokio::test]
    async fn test_expired_link_is_evicted_and_not_leaked() {
        let (clock, store) = setup(10);
        let expires = clock.now() + Duration::seconds(60);
        store.insert(link("t1", "https://cdn/a.mkv", expires)).await;

        clock.advance(Duration::seconds(60));
        assert_eq!(store.resolve("t1").await, Err(LinkError::Expired));
        assert_eq!(store.resolve("t1").await, Err(LinkError::NotFound));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_refuses_live_duplicate() {
        let (clock, store) = setup(10);
        let expires = clock.now() + Duration::seconds(60);
        assert!(store.insert(link("t1", "https://a", expires)).await);
        assert!(!store.insert(link("t1", "https://b", expires)).await);
        assert_eq!(store.resolve("t1").await.as_deref(), Ok("https://a"));

        clock.advance(Duration::seconds(61));
        assert!(store.insert(link("t1", "https://b", clock.now() + Duration::seconds(5))).await);
        assert_eq!(store.resolve("t1").await.as_deref(), Ok("https://b"));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (clock, store) = setup(10);
        let now = clock.now();
        store.insert(link("short", "https://a", now + Duration::seconds(10))).await;
        store.insert(link("long", "https://b", now + Duration::seconds(100))).await;

        clock.advance(Duration::seconds(30));
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.contains_live("long").await);
        assert!(!store.contains_live("short").await);
    }

    #[tokio::test]
    async fn test_capacity_prefers_purging_expired() {
        let (clock, store) = setup(2);
        let now = clock.now();
        store.insert(link("a", "https://a", now + Duration::seconds(5))).await;
        store.insert(link("b", "https://b", now + Duration::seconds(500))).await;

        clock.advance(Duration::seconds(10));
        store.insert(link("c", "https://c", clock.now() + Duration::seconds(50))).await;

        assert_eq!(store.len().await, 2);
        assert!(store.contains_live("b").await);
        assert!(store.contains_live("c").await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_soonest_expiring() {
        let (clock, store) = setup(2);
        let now = clock.now();
        store.insert(link("a", "https://a", now + Duration::seconds(500))).await;
        store.insert(link("b", "https://b", now + Duration::seconds(50))).await;
        store.insert(link("c", "https://c", now + Duration::seconds(300))).await;

        assert_eq!(store.len().await, store.capacity());
        assert_eq!(store.resolve("b").await, Err(LinkError::NotFound));
        assert!(store.contains_live("a").await);
        assert!(store.contains_live("c").await);
    }
}
