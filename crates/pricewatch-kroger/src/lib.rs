//! Kroger API access for the harvest pipeline: OAuth2 token management, a
//! retrying HTTP client, batch fetching and lenient payload normalization.

pub mod auth;
pub mod client;
pub mod error;
pub mod fetch;
pub mod normalize;
mod retry;
pub mod types;

pub use auth::TokenManager;
pub use client::KrogerClient;
pub use error::KrogerError;
pub use fetch::fetch_store_prices;
pub use normalize::{normalize_page, CoercedPrice, CURRENCY, PRICE_SOURCE};
pub use types::{BatchOutcome, RawResponse, StoreFetch, TokenStatus};

/// Truncates a string to at most `max_chars` characters, on a character
/// boundary. Used to cap body snippets kept in outcomes and errors.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn truncate_chars_leaves_short_strings_alone() {
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn truncate_chars_counts_characters_not_bytes() {
        // four multibyte characters, truncated to two
        assert_eq!(truncate_chars("éééé", 2), "éé");
    }
}
