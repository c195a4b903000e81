//! Quality Propagation.
//!
//! The produced stack inherits the quantity-weighted average tier of
//! everything consumed, rounded half up.

use anvil_domain::{ConsumedLot, QualityLevel};

/// Weighted average tier over consumed lots.
///
/// Returns `QualityLevel::Common` when nothing was consumed.
pub fn average_quality<'a>(lots: impl IntoIterator<Item = &'a ConsumedLot>) -> QualityLevel {
    let (weighted, total) = lots.into_iter().fold((0u128, 0u128), |(weighted, total), lot| {
        let qty = u128::from(lot.quantity);
        (weighted + u128::from(lot.quality_level.ordinal()) * qty, total + qty)
    });

    if total == 0 {
        return QualityLevel::default();
    }

    let rounded = (weighted + total / 2) / total;
    QualityLevel::from_ordinal(u64::try_from(rounded).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(quality_level: QualityLevel, quantity: u64) -> ConsumedLot {
        ConsumedLot { item_id: 1, quality_level, quantity }
    }

    #[test]
    fn test_empty_is_common() {
        assert_eq!(average_quality(std::iter::empty()), QualityLevel::Common);
    }

    #[test]
    fn test_single_tier_unchanged() {
        assert_eq!(average_quality(&[lot(QualityLevel::Epic, 9)]), QualityLevel::Epic);
        assert_eq!(average_quality(&[lot(QualityLevel::Cursed, 1)]), QualityLevel::Cursed);
    }

    #[test]
    fn test_weighted_average() {
        // (3*2 + 5*2) / 4 = 4 -> Uncommon
        let lots = [lot(QualityLevel::Common, 2), lot(QualityLevel::Rare, 2)];
        assert_eq!(average_quality(&lots), QualityLevel::Uncommon);

        // (3*3 + 7*1) / 4 = 4.0 -> Uncommon
        let lots = [lot(QualityLevel::Common, 3), lot(QualityLevel::Legendary, 1)];
        assert_eq!(average_quality(&lots), QualityLevel::Uncommon);
    }

    #[test]
    fn test_rounds_half_up() {
        // (3 + 4) / 2 = 3.5 -> 4
        let lots = [lot(QualityLevel::Common, 1), lot(QualityLevel::Uncommon, 1)];
        assert_eq!(average_quality(&lots), QualityLevel::Uncommon);

        // (2*2 + 3*1) / 3 = 2.33 -> 2
        let lots = [lot(QualityLevel::Poor, 2), lot(QualityLevel::Common, 1)];
        assert_eq!(average_quality(&lots), QualityLevel::Poor);
    }

    #[test]
    fn test_large_quantities_do_not_overflow() {
        let lots = [lot(QualityLevel::Legendary, u64::MAX), lot(QualityLevel::Legendary, u64::MAX)];
        assert_eq!(average_quality(&lots), QualityLevel::Legendary);
    }
}
