use super::{LinkStore, TemporaryLink};
use crate::web::{REDIRECT_PATH, TOKEN_PARAM};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Mints tokens, records links and builds public redirect URLs
pub struct LinkIssuer {
    store: Arc<LinkStore>,
    base_url: String,
    last_token: AtomicI64,
}

impl LinkIssuer {
    /// Create an issuer writing into `store` and building URLs on `base_url`
    /// (scheme and host, e.g. `https://bot.example.app`).
    #[must_use]
    pub fn new(store: Arc<LinkStore>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            last_token: AtomicI64::new(0),
        }
    }

    /// The store links are recorded in
    #[must_use]
    pub const fn store(&self) -> &Arc<LinkStore> {
        &self.store
    }

    /// Issue a link to `target_url` valid for `ttl_secs` seconds and return
    /// its public redirect URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use filmlink_bot::links::{LinkIssuer, LinkStore, SystemClock};
    /// use std::sync::Arc;
    ///
    /// # async fn example() {
    /// let store = Arc::new(LinkStore::new(Arc::new(SystemClock), 100));
    /// let issuer = LinkIssuer::new(store, "https://bot.example.app");
    /// let url = issuer.issue("https://cdn.example/movie.mkv", 600).await;
    /// assert!(url.starts_with("https://bot.example.app/go?f="));
    /// # }
    /// ```
    pub async fn issue(&self, target_url: &str, ttl_secs: u64) -> String {
        let now = self.store.now();
        let expires_at = expiry(now, ttl_secs);

        let token = loop {
            let token = self.next_token(now.timestamp_millis()).to_string();
            let link = TemporaryLink {
                token: token.clone(),
                target_url: target_url.to_string(),
                expires_at,
            };
            if self.store.insert(link).await {
                break token;
            }
        };

        info!(token = %token, ttl_secs, "Issued temporary link");
        self.public_url(&token)
    }

    /// Public redirect URL for a token
    #[must_use]
    pub fn public_url(&self, token: &str) -> String {
        format!("{}{REDIRECT_PATH}?{TOKEN_PARAM}={token}", self.base_url)
    }

    /// Millisecond timestamp, bumped past the previous token when issues collide
    fn next_token(&self, now_millis: i64) -> i64 {
        let mut last = self.last_token.load(Ordering::SeqCst);
        loop {
            let next = now_millis.max(last + 1);
            match self
                .last_token
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

fn expiry(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    let ttl = i64::try_from(ttl_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);
    now.checked_add_signed(ttl)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
