//! Discount labels for sold lines

/// Tolerance, in percentage points, for recognising the common discounts
const DISCOUNT_TOLERANCE: f64 = 0.01;

const ROUND_DISCOUNTS: [f64; 3] = [50.0, 25.0, 75.0];

/// Label describing how `sold_price` relates to the item's `base_price`.
///
/// Returns `"Free"` for giveaways, an empty string when sold at full price
/// or when the base price is zero, and `"<n>% off"` otherwise.
pub fn classify(sold_price: f64, base_price: f64) -> String {
    if sold_price == 0.0 {
        return "Free".to_string();
    }
    if sold_price == base_price || base_price == 0.0 {
        return String::new();
    }

    let discount = (base_price - sold_price) / base_price * 100.0;
    for round in ROUND_DISCOUNTS {
        if (discount - round).abs() < DISCOUNT_TOLERANCE {
            return format!("{}% off", round as i64);
        }
    }

    format!("{:.2}% off", discount)
}

/// Item name with its price label appended, as printed on report lines.
pub fn labelled_name(item_name: &str, sold_price: f64, base_price: f64) -> String {
    let indicator = classify(sold_price, base_price);
    if indicator.is_empty() {
        item_name.to_string()
    } else {
        format!("{} {}", item_name, indicator)
    }
}
