//! # Catalog Fixtures
//!
//! A catalog is a TOML document of records staff would otherwise create one
//! by one through the admin API:
//!
//! ```toml
//! [platform]
//! tagline = "PREMIUM WELLNESS PLATFORM"
//!
//! [[tiers]]
//! name = "basic"
//! display_name = "Basic"
//! monthly_price_cents = 9900
//! annual_price_cents = 99000
//!
//! [[categories]]
//! name = "fitness"
//!
//! [[services]]
//! name = "Appointment booking"
//! category = "scheduling"
//!
//! [[faqs]]
//! category = "general"
//! question = "What is VELORA?"
//! answer = "A premium wellness platform."
//! ```
//!
//! Loading is idempotent: records that already exist (same tier level,
//! category kind, service name, or FAQ question) are skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use velora_core::concierge::{self, ConciergeService, NewService};
use velora_core::platform::{self, Faq, NewFaq, PlatformUpdate};
use velora_core::specialists::{self, NewCategory, SpecialistCategory};
use velora_core::subscriptions::{self, NewTier};
use velora_core::{Reader, VeloraError, WriteTx};

/// Catalog shipped with the binary and loaded by `velora init`.
pub const DEFAULT_CATALOG: &str = r#"
[platform]
description = "Curated specialists, concierge support, and personalised wellness plans."

[[tiers]]
name = "basic"
display_name = "Basic"
description = "Concierge basics and one specialist."
monthly_price_cents = 9900
annual_price_cents = 99000
max_specialists = 1
max_wellness_plans = 2
concierge_support = true
features = ["Concierge requests", "Wellness plan tracking"]
sort_order = 1

[[tiers]]
name = "premium"
display_name = "Premium"
description = "More specialists and priority support."
monthly_price_cents = 29900
annual_price_cents = 299000
max_specialists = 3
max_wellness_plans = 5
concierge_support = true
priority_support = true
features = ["Priority support", "Premium specialists"]
sort_order = 2

[[tiers]]
name = "platinum"
display_name = "Platinum"
description = "AI coaching and a dedicated concierge."
monthly_price_cents = 59900
annual_price_cents = 599000
max_specialists = 5
max_wellness_plans = 10
concierge_support = true
priority_support = true
ai_coaching = true
features = ["AI coaching", "Dedicated concierge"]
sort_order = 3

[[tiers]]
name = "diamond"
display_name = "Diamond"
description = "Unlimited access to the full network."
monthly_price_cents = 99900
annual_price_cents = 999000
setup_fee_cents = 50000
max_specialists = 20
max_wellness_plans = 50
concierge_support = true
priority_support = true
ai_coaching = true
features = ["Full specialist network", "Wellness travel planning"]
perks = ["Annual longevity assessment"]
sort_order = 4
"#;

/// Parsed catalog document.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Catalog {
    pub platform: Option<PlatformUpdate>,
    pub tiers: Vec<NewTier>,
    pub categories: Vec<NewCategory>,
    pub services: Vec<NewService>,
    pub faqs: Vec<NewFaq>,
}

/// What a load created.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub platform_updated: bool,
    pub tiers: usize,
    pub categories: usize,
    pub services: usize,
    pub faqs: usize,
    pub skipped: usize,
}

impl Catalog {
    pub fn parse(text: &str) -> Result<Self, VeloraError> {
        toml::from_str(text).map_err(|e| VeloraError::invalid(format!("Invalid catalog: {}", e)))
    }

    /// Create every record not already present.
    pub fn apply(self, tx: &WriteTx, now: DateTime<Utc>) -> Result<SeedReport, VeloraError> {
        let mut report = SeedReport::default();

        if let Some(update) = self.platform {
            platform::update_settings(tx, update, now)?;
            report.platform_updated = true;
        }

        for tier in self.tiers {
            if subscriptions::tier_by_name(tx, tier.name)?.is_some() {
                report.skipped += 1;
            } else {
                subscriptions::create_tier(tx, tier, now)?;
                report.tiers += 1;
            }
        }

        for category in self.categories {
            let exists = tx
                .find::<SpecialistCategory>(|c| c.name == category.name)?
                .is_some();
            if exists {
                report.skipped += 1;
            } else {
                specialists::create_category(tx, category, now)?;
                report.categories += 1;
            }
        }

        for service in self.services {
            let exists = tx
                .find::<ConciergeService>(|s| s.name == service.name.trim())?
                .is_some();
            if exists {
                report.skipped += 1;
            } else {
                concierge::create_service(tx, service, now)?;
                report.services += 1;
            }
        }

        for faq in self.faqs {
            let exists = tx
                .find::<Faq>(|f| f.question == faq.question.trim())?
                .is_some();
            if exists {
                report.skipped += 1;
            } else {
                platform::create_faq(tx, faq, now)?;
                report.faqs += 1;
            }
        }

        Ok(report)
    }
}

// =============================================================================
// TESTS
// =============================================================================
