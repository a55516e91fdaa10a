//! Quote bank: the fixed corpus of persona lines loaded once at startup.
//!
//! Loading never fails. A missing, unreadable, malformed, or empty quotes file degrades to a
//! bank holding only [`DEFAULT_QUOTE`], and the degradation is logged.

use rand::seq::SliceRandom;
use std::path::Path;

/// Used when the quotes file cannot provide at least one line.
pub const DEFAULT_QUOTE: &str = "做就對了！";

/// Character budget for the style context handed to the persona prompt.
pub const STYLE_CONTEXT_BUDGET: usize = 1500;

const ELLIPSIS: char = '…';

/// Immutable, never-empty sequence of quotes plus the capped style context derived from it.
#[derive(Debug, Clone)]
pub struct QuoteBank {
    quotes: Vec<String>,
    style_context: String,
}

impl QuoteBank {
    /// Build from an in-memory list. Blank entries are dropped; an empty result falls back to the default quote.
    pub fn from_quotes(quotes: Vec<String>) -> Self {
        let mut quotes: Vec<String> = quotes
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if quotes.is_empty() {
            quotes.push(DEFAULT_QUOTE.to_string());
        }
        let style_context = cap_style_context(&quotes.join("\n"));
        Self {
            quotes,
            style_context,
        }
    }

    /// Bank containing only the default quote.
    pub fn fallback() -> Self {
        Self::from_quotes(Vec::new())
    }

    /// Load a JSON array of strings from `path`.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                log::warn!(
                    "quotes: cannot read {} ({}), using default quote",
                    path.display(),
                    e
                );
                return Self::fallback();
            }
        };
        let quotes: Vec<String> = match serde_json::from_str(&raw) {
            Ok(q) => q,
            Err(e) => {
                log::warn!(
                    "quotes: {} is not a JSON array of strings ({}), using default quote",
                    path.display(),
                    e
                );
                return Self::fallback();
            }
        };
        if quotes.iter().all(|q| q.trim().is_empty()) {
            log::warn!("quotes: {} has no usable quotes, using default quote", path.display());
            return Self::fallback();
        }
        let bank = Self::from_quotes(quotes);
        log::info!("quotes: loaded {} quote(s) from {}", bank.len(), path.display());
        bank
    }

    /// Uniform random pick.
    pub fn pick_random(&self) -> &str {
        self.quotes
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_QUOTE)
    }

    /// Newline-joined corpus capped at [`STYLE_CONTEXT_BUDGET`] characters.
    pub fn style_context(&self) -> &str {
        &self.style_context
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn contains(&self, quote: &str) -> bool {
        self.quotes.iter().any(|q| q == quote)
    }
}

fn cap_style_context(joined: &str) -> String {
    if joined.chars().count() <= STYLE_CONTEXT_BUDGET {
        return joined.to_string();
    }
    let mut out: String = joined.chars().take(STYLE_CONTEXT_BUDGET).collect();
    out.push(ELLIPSIS);
    out
}
