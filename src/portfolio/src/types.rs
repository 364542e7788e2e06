//! Closed vocabularies stored as TEXT columns.
//!
//! Each enum serializes (serde, snake_case) to exactly the string kept in the database and
//! enforced by the migration's CHECK constraints, so handlers can accept the enum directly
//! in JSON payloads while repositories keep plain `String` columns.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted code is not part of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownCode {
    /// Vocabulary name, e.g. "role".
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The code stored in the database.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($code => Ok($name::$variant),)+
                    _ => Err(UnknownCode { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

text_enum! {
    /// Account role. Admins bypass ownership checks.
    Role: "role" {
        /// Owns properties.
        Owner => "owner",
        /// Records maintenance work on properties.
        Tradesperson => "tradesperson",
        /// Tracks properties as investments.
        Investor => "investor",
        /// Full access.
        Admin => "admin",
    }
}

text_enum! {
    /// Kind of building.
    PropertyType: "property type" {
        /// Detached house.
        SingleFamily => "single_family",
        /// Condominium unit.
        Condominium => "condominium",
        /// Townhouse.
        Townhouse => "townhouse",
        /// Duplex and up.
        MultiFamily => "multi_family",
        /// Commercial building.
        Commercial => "commercial",
    }
}

text_enum! {
    /// Trade category of a maintenance record.
    MaintenanceCategory: "maintenance category" {
        /// Foundations, framing, load-bearing work.
        Structural => "structural",
        /// Remodels and additions.
        Renovation => "renovation",
        /// Plumbing.
        Plumbing => "plumbing",
        /// Electrical.
        Electrical => "electrical",
        /// Heating, ventilation, air conditioning.
        Hvac => "hvac",
        /// Roofing.
        Roofing => "roofing",
        /// Paint, finishes, fixtures.
        Cosmetic => "cosmetic",
        /// Grounds and gardens.
        Landscaping => "landscaping",
        /// Anything else.
        Other => "other",
    }
}

text_enum! {
    /// Where a valuation came from.
    ValuationMethod: "valuation method" {
        /// Appraiser report.
        Professional => "professional",
        /// Derived by the maintenance adjustment.
        Automated => "automated",
        /// Entered by hand (e.g. purchase price baseline).
        Manual => "manual",
        /// The owner's own estimate.
        OwnerEstimate => "owner_estimate",
    }
}

text_enum! {
    /// Billing state of a subscription.
    SubscriptionStatus: "subscription status" {
        /// Paid up.
        Active => "active",
        /// Ended by the user or the processor.
        Canceled => "canceled",
        /// Latest invoice failed.
        PastDue => "past_due",
        /// In a trial period.
        Trialing => "trialing",
        /// Retries exhausted.
        Unpaid => "unpaid",
    }
}

impl SubscriptionStatus {
    /// A subscription counts against "one per user" unless it has been canceled.
    pub fn is_live(self) -> bool {
        !matches!(self, SubscriptionStatus::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_through_from_str() {
        for c in MaintenanceCategory::ALL {
            assert_eq!(c.as_str().parse::<MaintenanceCategory>().unwrap(), *c);
        }
        for s in SubscriptionStatus::ALL {
            assert_eq!(s.as_str().parse::<SubscriptionStatus>().unwrap(), *s);
        }
    }

    #[test]
    fn parsing_is_case_insensitive_and_trims() {
        assert_eq!(" Owner_Estimate ".parse::<ValuationMethod>().unwrap(), ValuationMethod::OwnerEstimate);
    }

    #[test]
    fn unknown_codes_name_the_vocabulary() {
        let err = "castle".parse::<PropertyType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown property type 'castle'");
    }

    #[test]
    fn serde_matches_db_codes() {
        let json = serde_json::to_string(&PropertyType::MultiFamily).unwrap();
        assert_eq!(json, "\"multi_family\"");
        let r: Role = serde_json::from_str("\"tradesperson\"").unwrap();
        assert_eq!(r, Role::Tradesperson);
    }
}
