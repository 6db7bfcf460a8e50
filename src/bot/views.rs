//! Bot UI components
//!
//! Contains keyboards, text messages, and formatters shown to users.

use crate::catalog::{MovieDetails, SearchHit};
use crate::utils::truncate_utf16;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Prefix of the callback data bound to a search result button
pub const SELECT_CALLBACK_PREFIX: &str = "select|";

/// Telegram's limit on photo captions, in UTF-16 code units
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for bot UI view rendering
///
/// Provides all text messages shown during the search conversation.
pub trait BotView {
    /// Greeting for /start and /help
    fn welcome_message() -> &'static str;

    /// Reply to messages that carry no text
    fn text_only_hint() -> &'static str;

    /// Header listing the channels a user must join
    fn join_required_header() -> &'static str;

    /// Notice sent while the catalog is queried
    fn searching() -> &'static str;

    /// Catalog returned nothing for the query
    fn nothing_found() -> &'static str;

    /// Catalog search failed
    fn search_failed() -> &'static str;

    /// Text above the result buttons
    fn results_header() -> &'static str;

    /// Details for the selected title could not be fetched
    fn details_failed() -> &'static str;

    /// Placeholder for a missing plot
    fn no_plot() -> &'static str;

    /// No download URL was found for the title
    fn no_download_link() -> &'static str;

    /// Message carrying the temporary download link
    fn download_link(url: &str) -> String;

    /// Join instructions, one line per channel
    fn join_instructions(channels: &[i64]) -> String {
        let lines = channels
            .iter()
            .map(|cid| format!("🔗 کانال: {cid}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n{lines}", Self::join_required_header())
    }

    /// Poster caption (or plain text when there is no poster)
    fn caption(details: &MovieDetails) -> String {
        let plot = details.plot.as_deref().unwrap_or_else(|| Self::no_plot());
        let text = format!("🎬 {}\n\n{plot}", title_label(&details.title, &details.year));
        truncate_utf16(&text, TELEGRAM_CAPTION_LIMIT)
    }
}

/// Default (Persian) implementation of [`BotView`]
pub struct DefaultBotView;

impl BotView for DefaultBotView {
    fn welcome_message() -> &'static str {
        "🎬 سلام! اسم فیلم رو بفرست تا برات پیدا کنم."
    }

    fn text_only_hint() -> &'static str {
        "✍️ فقط اسم فیلم رو به صورت متن بفرست."
    }

    fn join_required_header() -> &'static str {
        "🔒 باید عضو همه کانال‌ها بشی:"
    }

    fn searching() -> &'static str {
        "⏳ در حال جستجو..."
    }

    fn nothing_found() -> &'static str {
        "❌ نتیجه‌ای پیدا نشد. اسم دقیق‌تر وارد کن."
    }

    fn search_failed() -> &'static str {
        "❌ خطا در جستجو. کمی بعد دوباره امتحان کن."
    }

    fn results_header() -> &'static str {
        "🎬 نتایج پیدا شد، یکی رو انتخاب کن:"
    }

    fn details_failed() -> &'static str {
        "❌ خطا در دریافت اطلاعات."
    }

    fn no_plot() -> &'static str {
        "بدون توضیح"
    }

    fn no_download_link() -> &'static str {
        "❌ لینک دانلود پیدا نشد."
    }

    fn download_link(url: &str) -> String {
        format!("🔗 لینک امن دانلود:\n{url}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards and callback data
// ─────────────────────────────────────────────────────────────────────────────

/// `Title (Year)`, or just the title when the year is unknown
#[must_use]
pub fn title_label(title: &str, year: &str) -> String {
    if year.is_empty() {
        title.to_string()
    } else {
        format!("{title} ({year})")
    }
}

/// Callback data selecting a catalog id
#[must_use]
pub fn selection_callback(id: &str) -> String {
    format!("{SELECT_CALLBACK_PREFIX}{id}")
}

/// Extract the catalog id from selection callback data
///
/// # Examples
///
/// ```
/// use filmlink_bot::bot::views::parse_selection;
/// assert_eq!(parse_selection("select|tt1375666"), Some("tt1375666"));
/// assert_eq!(parse_selection("retry"), None);
/// ```
#[must_use]
pub fn parse_selection(data: &str) -> Option<&str> {
    data.strip_prefix(SELECT_CALLBACK_PREFIX)
        .and_then(|rest| rest.split('|').next())
        .filter(|id| !id.is_empty())
}

/// One button per result, at most `limit` buttons
#[must_use]
pub fn results_keyboard(hits: &[SearchHit], limit: usize) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(hits.iter().take(limit).map(|hit| {
        vec![InlineKeyboardButton::callback(
            title_label(&hit.title, &hit.year),
            selection_callback(&hit.id),
        )]
    }))
}
