use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Sorted-sequence median; mean of the two central values for even lengths.
/// `None` for an empty slice or when the central pair overflows.
pub fn median(prices: &[Decimal]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }
    let mut sorted = prices.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        sorted[mid - 1].checked_add(sorted[mid]).map(|sum| sum / dec!(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_length_is_mean_of_middle_pair() {
        assert_eq!(median(&[dec!(1), dec!(2), dec!(3), dec!(4)]), Some(dec!(2.5)));
    }

    #[test]
    fn test_single_value() {
        assert_eq!(median(&[dec!(5)]), Some(dec!(5)));
    }

    #[test]
    fn test_unsorted_input() {
        assert_eq!(
            median(&[dec!(900), dec!(120.5), dec!(700), dec!(880), dec!(1000)]),
            Some(dec!(880))
        );
        assert_eq!(median(&[dec!(10), dec!(1), dec!(7), dec!(3)]), Some(dec!(5)));
    }

    #[test]
    fn test_duplicates() {
        assert_eq!(median(&[dec!(4), dec!(4), dec!(4), dec!(9)]), Some(dec!(4)));
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_overflowing_pair_is_none() {
        assert_eq!(median(&[Decimal::MAX, Decimal::MAX]), None);
        assert_eq!(median(&[Decimal::MAX]), Some(Decimal::MAX));
        assert_eq!(median(&[dec!(1), Decimal::MAX, Decimal::MAX]), Some(Decimal::MAX));
    }
}
