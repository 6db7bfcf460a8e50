//! Search conversation logic, independent of the Telegram transport
//!
//! Free text → membership gate → catalog search → result buttons.
//! Selection → details → poster/caption → scrape → temporary link.

use crate::bot::membership::MembershipGate;
use crate::bot::state::State;
use crate::bot::views::{BotView, DefaultBotView};
use crate::catalog::{Catalog, SearchHit};
use crate::links::LinkIssuer;
use crate::scrape::DownloadFinder;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outbound side of one chat
#[async_trait]
pub trait ChatReplier: Send + Sync {
    /// Send a plain text message
    async fn send_text(&self, text: &str) -> Result<()>;
    /// Send a photo by URL with a caption
    async fn send_photo(&self, photo_url: &str, caption: &str) -> Result<()>;
    /// Send `text` with one selectable button per hit (at most `limit`)
    async fn send_results(&self, text: &str, hits: &[SearchHit], limit: usize) -> Result<()>;
}

/// Tunables for the conversation
#[derive(Debug, Clone, Copy)]
pub struct FlowOptions {
    /// Lifetime of issued download links in seconds
    pub link_ttl_secs: u64,
    /// Maximum number of results offered
    pub result_limit: usize,
}

/// Orchestrates the gate, catalog, scraper and link issuer for one update
pub struct ConversationFlow {
    gate: MembershipGate,
    catalog: Arc<dyn Catalog>,
    finder: Arc<dyn DownloadFinder>,
    issuer: Arc<LinkIssuer>,
    options: FlowOptions,
}

impl ConversationFlow {
    /// Create a flow over the given collaborators
    #[must_use]
    pub fn new(
        gate: MembershipGate,
        catalog: Arc<dyn Catalog>,
        finder: Arc<dyn DownloadFinder>,
        issuer: Arc<LinkIssuer>,
        options: FlowOptions,
    ) -> Self {
        Self {
            gate,
            catalog,
            finder,
            issuer,
            options,
        }
    }

    /// Handle a free-text query and return the next dialogue state.
    ///
    /// # Errors
    ///
    /// Returns an error only if a reply cannot be delivered.
    pub async fn handle_query<R: ChatReplier + ?Sized>(
        &self,
        replier: &R,
        user_id: u64,
        text: &str,
    ) -> Result<State> {
        if !self.gate.is_member(user_id).await {
            info!(user_id, "Membership check failed, sending join instructions");
            replier
                .send_text(&DefaultBotView::join_instructions(self.gate.channels()))
                .await?;
            return Ok(State::AwaitingQuery);
        }

        let query = text.trim();
        if query.is_empty() {
            replier.send_text(DefaultBotView::text_only_hint()).await?;
            return Ok(State::AwaitingQuery);
        }

        info!(user_id, query, "Searching catalog");
        replier.send_text(DefaultBotView::searching()).await?;

        let hits = match self.catalog.search(query).await {
            Ok(hits) => hits,
            Err(e) => {
                error!(query, "Catalog search failed: {e}");
                replier.send_text(DefaultBotView::search_failed()).await?;
                return Ok(State::AwaitingQuery);
            }
        };

        if hits.is_empty() {
            replier.send_text(DefaultBotView::nothing_found()).await?;
            return Ok(State::AwaitingQuery);
        }

        replier
            .send_results(
                DefaultBotView::results_header(),
                &hits,
                self.options.result_limit,
            )
            .await?;
        Ok(State::ShowingResults)
    }

    /// Handle a result selection and return the next dialogue state.
    ///
    /// # Errors
    ///
    /// Returns an error only if a text reply cannot be delivered.
    pub async fn handle_selection<R: ChatReplier + ?Sized>(
        &self,
        replier: &R,
        user_id: u64,
        catalog_id: &str,
    ) -> Result<State> {
        info!(user_id, catalog_id, "Result selected");

        let details = match self.catalog.details(catalog_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(catalog_id, "Catalog details failed: {e}");
                replier.send_text(DefaultBotView::details_failed()).await?;
                return Ok(State::AwaitingQuery);
            }
        };

        let caption = DefaultBotView::caption(&details);
        match details.poster_url.as_deref() {
            Some(poster) => {
                if let Err(e) = replier.send_photo(poster, &caption).await {
                    warn!(catalog_id, "Poster send failed, falling back to text: {e}");
                    replier.send_text(&caption).await?;
                }
            }
            None => replier.send_text(&caption).await?,
        }

        let download_url = match self.finder.find_download_link(&details.title).await {
            Ok(url) => url,
            Err(e) => {
                warn!(title = %details.title, "Download link scrape failed: {e}");
                None
            }
        };

        match download_url {
            Some(url) => {
                let link = self.issuer.issue(&url, self.options.link_ttl_secs).await;
                replier.send_text(&DefaultBotView::download_link(&link)).await?;
            }
            None => {
                info!(title = %details.title, "No download link found");
                replier.send_text(DefaultBotView::no_download_link()).await?;
            }
        }

        Ok(State::AwaitingQuery)
    }
}
