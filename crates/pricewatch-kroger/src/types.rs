use pricewatch_core::PriceObservation;

/// Raw outcome of a products request once the retry budget is settled.
///
/// The retry loop consumes 429s, 5xx and transport failures; every other
/// status is handed back as a value so the fetch layer can apply its own
/// policy (notably the single forced-refresh retry on 401).
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: reqwest::StatusCode,
    pub body: String,
}

/// Outcome of one logical API call (one product batch), recorded for the
/// request log.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Final HTTP status, `None` when no response was received at all.
    pub status: Option<u16>,
    pub ok: bool,
    /// Products requested in this batch.
    pub requested: usize,
    /// Observations normalized out of the response.
    pub observations: usize,
    /// Body snippet or error text, capped for the log.
    pub message: String,
}

/// Everything harvested from one store: the observations plus one outcome
/// per logical call.
#[derive(Debug, Clone, Default)]
pub struct StoreFetch {
    pub observations: Vec<PriceObservation>,
    pub batches: Vec<BatchOutcome>,
}

impl StoreFetch {
    /// Returns `true` when at least one batch ran and none succeeded.
    #[must_use]
    pub fn all_batches_failed(&self) -> bool {
        !self.batches.is_empty() && self.batches.iter().all(|b| !b.ok)
    }
}

/// Token metadata for diagnostics; never carries the token itself.
#[derive(Debug, Clone)]
pub struct TokenStatus {
    pub token_type: String,
    pub expires_in_secs: u64,
}
