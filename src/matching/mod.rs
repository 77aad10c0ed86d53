//! Matching engine (C5): per-symbol limit order books behind a registry,
//! spec.md §4.5.

pub mod book;
pub mod engine;

pub use book::{AffectedOrder, BestBidAsk, BookLevel, Depth, Fill, OrderBook, OrderBookSnapshot, SubmitOutcome};
pub use engine::{MatchingEngine, MatchingError};
