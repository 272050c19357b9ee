//! Amounts in whole cents
//!
//! Prices are kept to the cent. Totals are summed as integer cents, so a
//! sum does not depend on the order its amounts are added in, and a total
//! read back from a two-decimal table adds up exactly like the original.

pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Nearest whole-cent amount, halves away from zero.
pub fn round_to_cents(amount: f64) -> f64 {
    from_cents(to_cents(amount))
}

/// Sum of `amounts`, each taken to the cent.
pub fn sum_amounts(amounts: impl IntoIterator<Item = f64>) -> f64 {
    from_cents(amounts.into_iter().map(to_cents).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_cents() {
        assert_eq!(round_to_cents(0.125), 0.13);
        assert_eq!(round_to_cents(2.5), 2.5);
        assert_eq!(round_to_cents(0.1 * 3.0), 0.3);
    }

    #[test]
    fn test_sum_is_order_independent() {
        let amounts = [0.1, 0.2, 0.3, 1234.56, 0.07];
        let forward = sum_amounts(amounts);
        let backward = sum_amounts(amounts.iter().rev().copied());
        assert_eq!(forward, backward);
        assert_eq!(forward, 1235.23);
    }

    #[test]
    fn test_sum_of_parsed_table_values_matches() {
        let totals = [0.3000000000000001, 15.0, 4.999999999999999];
        let printed: Vec<f64> = totals
            .iter()
            .map(|t| format!("{:.2}", t).parse::<f64>().unwrap())
            .collect();
        assert_eq!(sum_amounts(totals), sum_amounts(printed));
    }
}
