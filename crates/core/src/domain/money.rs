use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to cents using half-up rounding.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Renders an amount as `$12.50`.
pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", round_cents(amount))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{format_money, round_cents};

    #[test]
    fn formats_with_two_decimals() {
        assert_eq!(format_money(Decimal::new(1_250, 2)), "$12.50");
        assert_eq!(format_money(Decimal::new(40, 0)), "$40.00");
    }

    #[test]
    fn rounds_half_cents_up() {
        assert_eq!(round_cents(Decimal::new(10_005, 3)), Decimal::new(1_001, 2));
    }
}
