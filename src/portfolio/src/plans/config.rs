//! Plan catalog configuration: parsing, normalization, and loading.
//!
//! A catalog maps plan codes to pricing and features:
//!
//! ```toml
//! [plans.basic]
//! name = "Basic"
//! base_price_cents = 1500
//! price_per_property_cents = 500
//! max_properties = 5
//! features = ["Property tracking"]
//! ```
//!
//! Key behaviors:
//! - Normalization trims and lowercases plan codes, trims names and features, drops empty
//!   features and de-duplicates them while preserving order.
//! - Negative prices, a zero allowance, empty names and codes that collide after
//!   normalization are errors.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_plans_str`]
//! - Parse + normalize from a file path: [`load_plans_path`]

use std::{collections::HashSet, mem};

use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use toml::from_str;

use crate::models::Plan;

/// Top-level catalog mapping plan codes to their configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlanCatalog {
    /// Map of plan code -> configuration, in file order.
    pub plans: IndexMap<String, PlanCfg>,
}

/// One plan's configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlanCfg {
    /// Display name.
    pub name: String,
    /// Price including the first property, in cents.
    pub base_price_cents: i64,
    /// Price of each additional property, in cents.
    pub price_per_property_cents: i64,
    /// Property allowance; omitted means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u32>,
    /// Marketing feature list.
    #[serde(default)]
    pub features: Vec<String>,
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Plan codes that changed when lowercasing/trimming.
    pub codes_renamed: usize,
    /// Features removed as empty or duplicate.
    pub features_dropped: usize,
}

/// Normalize a catalog in-place.
///
/// Errors:
/// - Empty or duplicate plan codes after normalization
/// - Empty plan names
/// - Negative prices or `max_properties = 0`
pub fn normalize_plans(cat: &mut PlanCatalog) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();
    let mut rebuilt: IndexMap<String, PlanCfg> = IndexMap::new();

    for (raw_code, mut cfg) in mem::take(&mut cat.plans) {
        let code = raw_code.trim().to_lowercase();
        if code.is_empty() {
            bail!("plan code cannot be empty after trimming");
        }
        if code != raw_code {
            report.codes_renamed += 1;
        }
        if rebuilt.contains_key(&code) {
            bail!("duplicate plan code after normalization: {code}");
        }

        cfg.name = cfg.name.trim().to_string();
        if cfg.name.is_empty() {
            bail!("plan '{code}' has an empty name");
        }
        if cfg.base_price_cents < 0 || cfg.price_per_property_cents < 0 {
            bail!("plan '{code}' has a negative price");
        }
        if cfg.max_properties == Some(0) {
            bail!("plan '{code}' must allow at least one property");
        }

        let before = cfg.features.len();
        let mut seen = HashSet::new();
        cfg.features = mem::take(&mut cfg.features)
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty() && seen.insert(f.clone()))
            .collect();
        report.features_dropped += before - cfg.features.len();

        rebuilt.insert(code, cfg);
    }

    cat.plans = rebuilt;
    Ok(report)
}

impl PlanCatalog {
    /// Rows for the `plans` table, in catalog order.
    pub fn to_rows(&self) -> anyhow::Result<Vec<Plan>> {
        self.plans
            .iter()
            .map(|(code, cfg)| {
                Ok(Plan {
                    code: code.clone(),
                    name: cfg.name.clone(),
                    base_price_cents: cfg.base_price_cents,
                    price_per_property_cents: cfg.price_per_property_cents,
                    max_properties: cfg
                        .max_properties
                        .map(i32::try_from)
                        .transpose()
                        .with_context(|| format!("plan '{code}' max_properties too large"))?,
                    features: serde_json::to_string(&cfg.features)?,
                })
            })
            .collect()
    }
}

/// Parse and normalize a catalog from a TOML string.
pub fn load_plans_str(toml_str: &str) -> anyhow::Result<PlanCatalog> {
    let mut cat: PlanCatalog = from_str(toml_str).context("failed to parse plan catalog TOML")?;
    let report = normalize_plans(&mut cat).context("normalize_plans failed")?;
    tracing::debug!(?report, plans = cat.plans.len(), "plan catalog loaded");
    Ok(cat)
}

/// Read a catalog TOML file from disk, parse, and normalize it.
pub fn load_plans_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<PlanCatalog> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read plan catalog {}", path.as_ref().display()))?;
    load_plans_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_loads() {
        let cat = load_plans_str(crate::plans::DEFAULT_PLANS_TOML).unwrap();
        let codes: Vec<&str> = cat.plans.keys().map(String::as_str).collect();
        assert_eq!(codes, vec!["basic", "professional", "enterprise"]);
        assert_eq!(cat.plans["enterprise"].max_properties, None);
    }

    #[test]
    fn normalizes_codes_and_features() {
        let toml_str = r#"
            [plans." Basic "]
            name = "  Basic "
            base_price_cents = 1500
            price_per_property_cents = 500
            features = ["Tracking", " Tracking ", "", "Reports"]
        "#;
        let mut cat: PlanCatalog = toml::from_str(toml_str).unwrap();
        let report = normalize_plans(&mut cat).unwrap();

        assert_eq!(
            report,
            NormalizationReport {
                codes_renamed: 1,
                features_dropped: 2
            }
        );
        insta::assert_json_snapshot!(cat, @r#"
        {
          "plans": {
            "basic": {
              "name": "Basic",
              "base_price_cents": 1500,
              "price_per_property_cents": 500,
              "features": [
                "Tracking",
                "Reports"
              ]
            }
          }
        }
        "#);
    }

    #[test]
    fn colliding_codes_error() {
        let toml_str = r#"
            [plans.basic]
            name = "Basic"
            base_price_cents = 1500
            price_per_property_cents = 500
            [plans.BASIC]
            name = "Basic again"
            base_price_cents = 1
            price_per_property_cents = 1
        "#;
        let err = load_plans_str(toml_str).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate plan code"));
    }

    #[test]
    fn negative_prices_rejected() {
        let toml_str = r#"
            [plans.free]
            name = "Free"
            base_price_cents = -1
            price_per_property_cents = 0
        "#;
        let err = load_plans_str(toml_str).unwrap_err();
        assert!(format!("{err:#}").contains("negative price"));
    }

    #[test]
    fn unknown_fields_rejected() {
        let toml_str = r#"
            [plans.basic]
            name = "Basic"
            base_price_cents = 1500
            price_per_property_cents = 500
            trial_days = 14
        "#;
        assert!(load_plans_str(toml_str).is_err());
    }

    #[test]
    fn rows_encode_features_as_json() {
        let cat = load_plans_str(crate::plans::DEFAULT_PLANS_TOML).unwrap();
        let rows = cat.to_rows().unwrap();
        assert_eq!(rows[0].code, "basic");
        assert_eq!(rows[0].max_properties, Some(5));
        assert_eq!(rows[0].feature_list().len(), 3);
    }
}
