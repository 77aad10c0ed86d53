//! News articles (spec.md §3 NewsArticle). Generation itself is out of
//! scope (§1) — the core only consumes articles through `NewsSource`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub tick: u64,
    pub headline: String,
    pub content: String,
    pub category: String,
    pub sentiment: f64,
    pub symbols: Vec<String>,
    pub agent_ids: Vec<String>,
    pub is_breaking: bool,
}

/// Opaque injector for news events produced outside the core (spec.md §1).
pub trait NewsSource: Send + Sync {
    /// Returns any news articles that should be published this tick.
    fn poll(&self, tick: u64) -> Vec<NewsArticle>;
}

/// A `NewsSource` that never produces anything — the default for local runs
/// and tests; the core only needs to consume whatever a real injector would
/// supply.
pub struct NullNewsSource;

impl NewsSource for NullNewsSource {
    fn poll(&self, _tick: u64) -> Vec<NewsArticle> {
        Vec::new()
    }
}
