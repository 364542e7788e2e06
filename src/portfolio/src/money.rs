//! Fixed-point money.
//!
//! Amounts are integer cents (`i64`) end to end: columns, JSON payloads and arithmetic.
//! The calculators never touch floating point, so repeated adjustments cannot drift.

/// An amount in minor currency units.
pub type Cents = i64;

/// Largest amount accepted as a cost or a value: one trillion currency units.
///
/// Anything a calculator derives from amounts in `0..=MAX_AMOUNT` stays far inside `i64`.
pub const MAX_AMOUNT: Cents = units(1_000_000_000_000);

/// Whether `c` is a storable cost or value.
pub fn in_range(c: Cents) -> bool {
    (0..=MAX_AMOUNT).contains(&c)
}

/// Whole currency units to cents (`1000` -> `100_000`).
pub const fn units(whole: i64) -> Cents {
    whole * 100
}

/// Render cents as a decimal string with two places, e.g. `220000` -> `"2200.00"`.
pub fn format_cents(c: Cents) -> String {
    let sign = if c < 0 { "-" } else { "" };
    let abs = c.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Render a signed adjustment with an explicit sign, e.g. `+2200.00`.
pub fn format_signed_cents(c: Cents) -> String {
    if c >= 0 {
        format!("+{}", format_cents(c))
    } else {
        format_cents(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimal_places() {
        assert_eq!(format_cents(220_000), "2200.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-40_050), "-400.50");
        assert_eq!(format_signed_cents(40_000), "+400.00");
        assert_eq!(format_signed_cents(-1), "-0.01");
    }

    #[test]
    fn units_to_cents() {
        assert_eq!(units(1000), 100_000);
    }

    #[test]
    fn range_excludes_negatives_and_huge_amounts() {
        assert!(in_range(0));
        assert!(in_range(MAX_AMOUNT));
        assert!(!in_range(-1));
        assert!(!in_range(MAX_AMOUNT + 1));
        assert!(!in_range(Cents::MAX));
    }
}
