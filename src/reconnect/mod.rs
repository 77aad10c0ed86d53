//! Reconnection & replay (C10).

pub mod replay;

pub use replay::{build_replay, PortfolioSnapshot, ReplayError, ReplayPlan};
