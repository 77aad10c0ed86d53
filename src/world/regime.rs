//! Market regime transition policy (C11, Open Question (a)): pluggable so
//! an operator can swap in a different model without touching the tick
//! pipeline, with `DefaultRegimePolicy` as the shipped implementation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{MarketRegime, WorldState};

/// Decides the next tick's regime from the current state and a window of
/// recent per-tick price-change magnitudes (signed, as a fraction e.g.
/// `0.02` for +2%).
pub trait RegimePolicy: Send + Sync {
    fn next(&self, state: &WorldState, recent_changes: &[Decimal]) -> MarketRegime;
}

const CRASH_THRESHOLD: Decimal = dec!(-0.10);
const BUBBLE_THRESHOLD: Decimal = dec!(0.05);
const BULL_THRESHOLD: Decimal = dec!(0.02);
const BEAR_THRESHOLD: Decimal = dec!(-0.02);

/// Stays `Normal` unless the rolling mean absolute price-change magnitude
/// over the configured window crosses one of the fixed thresholds above.
pub struct DefaultRegimePolicy;

impl RegimePolicy for DefaultRegimePolicy {
    fn next(&self, _state: &WorldState, recent_changes: &[Decimal]) -> MarketRegime {
        if let Some(last) = recent_changes.last() {
            if *last <= CRASH_THRESHOLD {
                return MarketRegime::Crash;
            }
        }

        if recent_changes.is_empty() {
            return MarketRegime::Normal;
        }

        let sum: Decimal = recent_changes.iter().copied().sum();
        let mean = sum / Decimal::from(recent_changes.len());

        if mean > BUBBLE_THRESHOLD {
            MarketRegime::Bubble
        } else if mean >= BULL_THRESHOLD {
            MarketRegime::Bull
        } else if mean <= BEAR_THRESHOLD {
            MarketRegime::Bear
        } else {
            MarketRegime::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WorldState {
        WorldState::default()
    }

    #[test]
    fn single_tick_crash_overrides_everything() {
        let policy = DefaultRegimePolicy;
        let changes = vec![dec!(0.03), dec!(-0.15)];
        assert_eq!(policy.next(&state(), &changes), MarketRegime::Crash);
    }

    #[test]
    fn sustained_rally_becomes_bubble() {
        let policy = DefaultRegimePolicy;
        let changes = vec![dec!(0.06), dec!(0.07), dec!(0.05)];
        assert_eq!(policy.next(&state(), &changes), MarketRegime::Bubble);
    }

    #[test]
    fn moderate_rally_becomes_bull() {
        let policy = DefaultRegimePolicy;
        let changes = vec![dec!(0.02), dec!(0.03)];
        assert_eq!(policy.next(&state(), &changes), MarketRegime::Bull);
    }

    #[test]
    fn moderate_decline_becomes_bear() {
        let policy = DefaultRegimePolicy;
        let changes = vec![dec!(-0.02), dec!(-0.03)];
        assert_eq!(policy.next(&state(), &changes), MarketRegime::Bear);
    }

    #[test]
    fn flat_changes_stay_normal() {
        let policy = DefaultRegimePolicy;
        let changes = vec![dec!(0.001), dec!(-0.002)];
        assert_eq!(policy.next(&state(), &changes), MarketRegime::Normal);
    }

    #[test]
    fn empty_window_stays_normal() {
        let policy = DefaultRegimePolicy;
        assert_eq!(policy.next(&state(), &[]), MarketRegime::Normal);
    }
}
