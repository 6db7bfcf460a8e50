//! Temporary redirect links
//!
//! A link maps an opaque token to a real download URL until it expires. The
//! [`LinkStore`] is shared between the [`LinkIssuer`] (bot side), the redirect
//! endpoint and the periodic [`run_sweeper`] task.

mod clock;
mod issuer;
mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use issuer::LinkIssuer;
pub use store::LinkStore;
pub use sweeper::run_sweeper;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A short-lived mapping from a token to a destination URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryLink {
    /// Opaque identifier embedded in the public redirect URL
    pub token: String,
    /// Real destination URL
    pub target_url: String,
    /// Instant from which the link is no longer usable
    pub expires_at: DateTime<Utc>,
}

impl TemporaryLink {
    /// Returns true once `now` has reached the expiry instant
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Reasons a token cannot be resolved
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Token was never issued or has already been evicted
    #[error("link not found")]
    NotFound,
    /// Token existed but its lifetime has elapsed; the entry is evicted
    #[error("link expired")]
    Expired,
}
