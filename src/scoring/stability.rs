//! Stability score from quarter-over-quarter growth.
//!
//! Quarters whose growth stays within ±20% cost nothing. Beyond that each
//! excess percentage point costs two points, capped at 50 per quarter. When the
//! average penalty per growth-bearing quarter exceeds 25 the additive total is
//! replaced by a uniform 25 per quarter, and the result is clamped to 20..=100.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use crate::revenue::buckets::QuarterBucket;
use crate::revenue::round_half_up;

pub const STABILITY_FLOOR: u32 = 20;
pub const STABILITY_CEILING: u32 = 100;

/// Growth within ±this many percent is free.
const GROWTH_TOLERANCE_PCT: Decimal = dec!(20);
/// Points deducted per percentage point of growth beyond the tolerance.
const PENALTY_PER_EXCESS_PCT: Decimal = dec!(2);
const MAX_QUARTER_PENALTY: Decimal = dec!(50);
const MAX_AVG_PENALTY: Decimal = dec!(25);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StabilityResult {
    pub score: u32,
    /// One entry per growth-bearing quarter, in quarter order, rounded to one decimal.
    pub penalties: Vec<Decimal>,
}

/// Penalty for one quarter's growth.
pub fn quarter_penalty(growth: Decimal) -> Decimal {
    let g = growth.abs();
    if g > GROWTH_TOLERANCE_PCT {
        (g - GROWTH_TOLERANCE_PCT)
            .checked_mul(PENALTY_PER_EXCESS_PCT)
            .map_or(MAX_QUARTER_PENALTY, |p| p.min(MAX_QUARTER_PENALTY))
    } else {
        Decimal::ZERO
    }
}

pub fn stability_score(quarters: &[QuarterBucket]) -> StabilityResult {
    let mut base = dec!(100);
    let mut penalties = Vec::new();

    for quarter in quarters.iter().skip(1) {
        let Some(growth) = quarter.growth else {
            continue;
        };
        let penalty = quarter_penalty(growth);
        base -= penalty;
        penalties.push(round_half_up(penalty, 1));

        debug!(
            component = "stability",
            quarter = %quarter.quarter,
            growth = %growth,
            penalty = %penalty,
            base = %base,
            "Quarter penalty applied"
        );
    }

    let growth_quarters = penalties.len();
    if growth_quarters > 0 {
        let n = Decimal::from(growth_quarters as u64);
        let avg_penalty = (dec!(100) - base) / n;
        if avg_penalty > MAX_AVG_PENALTY {
            let rescaled = dec!(100) - MAX_AVG_PENALTY * n;
            debug!(
                component = "stability",
                avg_penalty = %avg_penalty,
                additive_base = %base,
                rescaled_base = %rescaled,
                "Average penalty above cap, rescaling"
            );
            base = rescaled;
        }
    }

    let clamped = round_half_up(base, 0).clamp(
        Decimal::from(STABILITY_FLOOR),
        Decimal::from(STABILITY_CEILING),
    );
    let score = clamped.to_u32().unwrap_or(STABILITY_FLOOR);

    debug!(component = "stability", score, growth_quarters, "Stability score computed");

    StabilityResult { score, penalties }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revenue::buckets::QuarterKey;

    fn with_growths(growths: &[Option<Decimal>]) -> Vec<QuarterBucket> {
        growths
            .iter()
            .enumerate()
            .map(|(i, g)| QuarterBucket {
                quarter: QuarterKey::new(2020 + (i as i32) / 4, (i as u32) % 4 + 1).unwrap(),
                revenue: dec!(100),
                growth: *g,
            })
            .collect()
    }

    #[test]
    fn test_quarter_penalty() {
        assert_eq!(quarter_penalty(dec!(20)), dec!(0));
        assert_eq!(quarter_penalty(dec!(-20)), dec!(0));
        assert_eq!(quarter_penalty(dec!(25)), dec!(10));
        assert_eq!(quarter_penalty(dec!(-32.5)), dec!(25));
        assert_eq!(quarter_penalty(dec!(400)), dec!(50));
        assert_eq!(quarter_penalty(Decimal::MAX), dec!(50));
        assert_eq!(quarter_penalty(Decimal::MIN), dec!(50));
    }

    #[test]
    fn test_no_quarters_is_perfect() {
        let r = stability_score(&[]);
        assert_eq!(r.score, 100);
        assert!(r.penalties.is_empty());
    }

    #[test]
    fn test_zero_penalties_are_recorded() {
        let r = stability_score(&with_growths(&[None, Some(dec!(5)), Some(dec!(-10))]));
        assert_eq!(r.score, 100);
        assert_eq!(r.penalties, vec![dec!(0), dec!(0)]);
    }

    #[test]
    fn test_undefined_growth_is_skipped() {
        let r = stability_score(&with_growths(&[None, None, Some(dec!(30))]));
        assert_eq!(r.penalties, vec![dec!(20)]);
        assert_eq!(r.score, 80);
    }

    #[test]
    fn test_additive_penalties_below_rescue_threshold() {
        // Penalties 10 + 30 + 0 = 40, avg 13.3
        let r = stability_score(&with_growths(&[None, Some(dec!(25)), Some(dec!(-35)), Some(dec!(0))]));
        assert_eq!(r.score, 60);
    }

    #[test]
    fn test_rescue_raises_heavily_penalized_history() {
        // Penalties 50 + 50 + 0: avg 33.3 > 25 → base = 100 - 75 = 25
        let r = stability_score(&with_growths(&[None, Some(dec!(90)), Some(dec!(-60)), Some(dec!(1))]));
        assert_eq!(r.score, 25);
    }

    #[test]
    fn test_penalty_record_rounds_to_one_decimal() {
        let r = stability_score(&with_growths(&[None, Some(dec!(21.33))]));
        assert_eq!(r.penalties, vec![dec!(2.7)]);
        // base = 100 - 2.66 = 97.34
        assert_eq!(r.score, 97);
    }

    #[test]
    fn test_score_bounds() {
        for growths in [
            vec![None, Some(dec!(1000)), Some(dec!(-99)), Some(dec!(1000)), Some(dec!(-99))],
            vec![None, Some(dec!(0))],
            vec![None, Some(dec!(44.9)), Some(dec!(-44.9))],
        ] {
            let r = stability_score(&with_growths(&growths));
            assert!((STABILITY_FLOOR..=STABILITY_CEILING).contains(&r.score));
        }
    }
}
