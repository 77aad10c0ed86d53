//! World state evolution and regime policy (C11).

pub mod regime;

pub use regime::{DefaultRegimePolicy, RegimePolicy};
