//! Quarter-over-quarter growth.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::revenue::buckets::QuarterBucket;
use crate::revenue::round_half_up;

/// Annotate each quarter with its growth over the previous one, in percent,
/// rounded to two decimals.
///
/// The first quarter never has growth, and neither does a quarter following
/// one with no revenue. Growth too large for a `Decimal` saturates at
/// `Decimal::MAX` (or `Decimal::MIN` for a fall).
pub fn with_growth(quarters: &[QuarterBucket]) -> Vec<QuarterBucket> {
    let mut out = Vec::with_capacity(quarters.len());
    let mut prev: Option<Decimal> = None;

    for quarter in quarters {
        let growth = match prev {
            Some(p) if p > Decimal::ZERO => Some(growth_pct(p, quarter.revenue)),
            _ => None,
        };
        out.push(QuarterBucket { growth, ..*quarter });
        prev = Some(quarter.revenue);
    }

    out
}

fn growth_pct(previous: Decimal, current: Decimal) -> Decimal {
    let pct = current
        .checked_sub(previous)
        .and_then(|delta| delta.checked_div(previous))
        .and_then(|ratio| ratio.checked_mul(dec!(100)));

    match pct {
        Some(pct) => round_half_up(pct, 2),
        None if current >= previous => Decimal::MAX,
        None => Decimal::MIN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revenue::buckets::QuarterKey;

    fn quarters(revenues: &[Decimal]) -> Vec<QuarterBucket> {
        revenues
            .iter()
            .enumerate()
            .map(|(i, r)| QuarterBucket {
                quarter: QuarterKey::new(2023 + (i as i32) / 4, (i as u32) % 4 + 1).unwrap(),
                revenue: *r,
                growth: None,
            })
            .collect()
    }

    #[test]
    fn test_first_quarter_has_no_growth() {
        let out = with_growth(&quarters(&[dec!(100)]));
        assert_eq!(out[0].growth, None);
        assert!(with_growth(&[]).is_empty());
    }

    #[test]
    fn test_growth_percentages() {
        let out = with_growth(&quarters(&[dec!(100), dec!(150), dec!(75), dec!(100)]));
        let growth: Vec<Option<Decimal>> = out.iter().map(|q| q.growth).collect();
        assert_eq!(
            growth,
            vec![None, Some(dec!(50)), Some(dec!(-50)), Some(dec!(33.33))]
        );
    }

    #[test]
    fn test_zero_previous_quarter_leaves_growth_unset() {
        let out = with_growth(&quarters(&[dec!(100), dec!(0), dec!(40)]));
        assert_eq!(out[1].growth, Some(dec!(-100)));
        assert_eq!(out[2].growth, None);
    }

    #[test]
    fn test_input_is_not_modified() {
        let input = quarters(&[dec!(1), dec!(2)]);
        let _ = with_growth(&input);
        assert!(input.iter().all(|q| q.growth.is_none()));
    }

    #[test]
    fn test_growth_after_dust_quarter_saturates() {
        let out = with_growth(&quarters(&[dec!(0.00000000000000000001), dec!(10000000)]));
        assert_eq!(out[1].growth, Some(Decimal::MAX));
    }
}
