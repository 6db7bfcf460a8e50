//! Channel membership gate
//!
//! Users must belong to every configured channel before the bot serves them.
//! Lookups are never cached and any failure denies access.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, UserId};
use tracing::{debug, warn};

/// Membership status of a user in a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// Channel creator
    Owner,
    /// Channel administrator
    Administrator,
    /// Regular member
    Member,
    /// Member with restrictions
    Restricted,
    /// Not (or no longer) in the channel
    Left,
    /// Removed and banned
    Banned,
}

impl MemberStatus {
    /// Statuses that satisfy the gate
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator | Self::Member)
    }
}

impl From<ChatMemberStatus> for MemberStatus {
    fn from(status: ChatMemberStatus) -> Self {
        match status {
            ChatMemberStatus::Owner => Self::Owner,
            ChatMemberStatus::Administrator => Self::Administrator,
            ChatMemberStatus::Member => Self::Member,
            ChatMemberStatus::Restricted => Self::Restricted,
            ChatMemberStatus::Left => Self::Left,
            ChatMemberStatus::Banned => Self::Banned,
        }
    }
}

/// Source of channel membership information
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    /// Status of `user_id` in `channel_id`
    async fn member_status(&self, channel_id: i64, user_id: u64) -> Result<MemberStatus>;
}

/// Membership lookup through the Telegram `getChatMember` method
pub struct TelegramMembershipLookup {
    bot: Bot,
}

impl TelegramMembershipLookup {
    /// Create a lookup using `bot`; the bot must be an admin of each channel
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipLookup for TelegramMembershipLookup {
    async fn member_status(&self, channel_id: i64, user_id: u64) -> Result<MemberStatus> {
        let member = self
            .bot
            .get_chat_member(ChatId(channel_id), UserId(user_id))
            .await?;
        Ok(member.kind.status().into())
    }
}

/// Allow/deny predicate over the configured channels
pub struct MembershipGate {
    lookup: Arc<dyn MembershipLookup>,
    channels: Vec<i64>,
}

impl MembershipGate {
    /// Create a gate requiring membership in every channel of `channels`
    #[must_use]
    pub fn new(lookup: Arc<dyn MembershipLookup>, channels: Vec<i64>) -> Self {
        Self { lookup, channels }
    }

    /// Channels a user must belong to
    #[must_use]
    pub fn channels(&self) -> &[i64] {
        &self.channels
    }

    /// Returns true only if the user is an active member of every channel.
    ///
    /// Lookup failures count as "not a member".
    pub async fn is_member(&self, user_id: u64) -> bool {
        for &channel_id in &self.channels {
            match self.lookup.member_status(channel_id, user_id).await {
                Ok(status) if status.is_active() => {}
                Ok(status) => {
                    debug!(user_id, channel_id, ?status, "User is not an active channel member");
                    return false;
                }
                Err(e) => {
                    warn!(user_id, channel_id, "Membership lookup failed, denying: {e}");
                    return false;
                }
            }
        }
        true
    }
}
