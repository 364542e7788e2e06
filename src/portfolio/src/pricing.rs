//! Subscription price calculation.
//!
//! `price(plan, n) = base + max(0, n - 1) × per_property`
//!
//! The first property is included in the base price. Zero or negative counts clamp to
//! "no extra properties", so the function is total. Arithmetic saturates rather than
//! overflowing.

use crate::models::Plan;
use crate::money::Cents;

/// The two numbers of a plan that the price depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanPricing {
    /// Price including the first property.
    pub base_price_cents: Cents,
    /// Price of each additional property.
    pub price_per_property_cents: Cents,
}

impl From<&Plan> for PlanPricing {
    fn from(p: &Plan) -> Self {
        Self {
            base_price_cents: p.base_price_cents,
            price_per_property_cents: p.price_per_property_cents,
        }
    }
}

/// Monthly price for `property_count` properties on `plan`.
pub fn price(plan: PlanPricing, property_count: i64) -> Cents {
    let extra = property_count.saturating_sub(1).max(0);
    plan.base_price_cents
        .saturating_add(extra.saturating_mul(plan.price_per_property_cents))
}

/// Whether `property_count` properties fit inside the plan's allowance.
pub fn within_allowance(plan: &Plan, property_count: i64) -> bool {
    plan.max_properties
        .is_none_or(|max| property_count <= i64::from(max))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTER: PlanPricing = PlanPricing {
        base_price_cents: 1500,
        price_per_property_cents: 500,
    };

    #[test]
    fn three_properties_cost_base_plus_two() {
        assert_eq!(price(STARTER, 3), 2500);
    }

    #[test]
    fn first_property_is_included() {
        assert_eq!(price(STARTER, 1), 1500);
        assert_eq!(price(STARTER, 0), 1500);
        assert_eq!(price(STARTER, -4), 1500);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        assert_eq!(price(STARTER, i64::MAX), i64::MAX);
    }

    #[test]
    fn allowance() {
        let plan = Plan {
            code: "basic".into(),
            name: "Basic".into(),
            base_price_cents: 1500,
            price_per_property_cents: 500,
            max_properties: Some(2),
            features: "[]".into(),
        };
        assert!(within_allowance(&plan, 2));
        assert!(!within_allowance(&plan, 3));
        let unlimited = Plan { max_properties: None, ..plan };
        assert!(within_allowance(&unlimited, 10_000));
    }
}
