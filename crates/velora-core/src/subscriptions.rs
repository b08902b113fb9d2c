//! # Subscriptions
//!
//! Membership tiers, each user's subscription, and the entitlements a tier
//! grants. Prices are integer cents.
//!
//! A user has at most one subscription record. Subscribing for the first
//! time starts a trial; subscribing again switches tier or billing cycle and
//! starts a paid period.

use crate::primitives::{ANNUAL_PERIOD_DAYS, FREE_MAX_WELLNESS_PLANS, MONTHLY_PERIOD_DAYS};
use crate::storage::{Reader, WriteTx, impl_record};
use crate::types::{
    ActivityType, Attributes, BillingCycle, SubscriptionId, SubscriptionStatus, TierId, TierLevel,
    UserId, VeloraError,
};
use crate::{accounts, platform, validate};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// TIERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTier {
    pub id: TierId,
    pub name: TierLevel,
    pub display_name: String,
    pub description: String,
    pub monthly_price_cents: u64,
    pub annual_price_cents: u64,
    pub setup_fee_cents: u64,
    pub max_specialists: u32,
    pub max_wellness_plans: u32,
    pub concierge_support: bool,
    pub priority_support: bool,
    pub ai_coaching: bool,
    pub features: Vec<String>,
    pub perks: Vec<String>,
    pub is_active: bool,
    pub sort_order: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(SubscriptionTier, TierId, "Subscription tier", "subscription_tiers");

/// Input for [`create_tier`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewTier {
    pub name: TierLevel,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub monthly_price_cents: u64,
    pub annual_price_cents: u64,
    #[serde(default)]
    pub setup_fee_cents: u64,
    #[serde(default = "one")]
    pub max_specialists: u32,
    #[serde(default = "one")]
    pub max_wellness_plans: u32,
    #[serde(default)]
    pub concierge_support: bool,
    #[serde(default)]
    pub priority_support: bool,
    #[serde(default)]
    pub ai_coaching: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub perks: Vec<String>,
    #[serde(default = "one")]
    pub sort_order: u32,
}

const fn one() -> u32 {
    1
}

pub fn create_tier(
    tx: &WriteTx,
    new: NewTier,
    now: DateTime<Utc>,
) -> Result<SubscriptionTier, VeloraError> {
    if tier_by_name(tx, new.name)?.is_some() {
        return Err(VeloraError::Conflict(format!(
            "Subscription tier '{}' already exists",
            new.name
        )));
    }
    let mut tier = SubscriptionTier {
        id: TierId::default(),
        name: new.name,
        display_name: validate::bounded("Display name", &new.display_name, 100)?,
        description: new.description,
        monthly_price_cents: new.monthly_price_cents,
        annual_price_cents: new.annual_price_cents,
        setup_fee_cents: new.setup_fee_cents,
        max_specialists: new.max_specialists,
        max_wellness_plans: new.max_wellness_plans,
        concierge_support: new.concierge_support,
        priority_support: new.priority_support,
        ai_coaching: new.ai_coaching,
        features: new.features,
        perks: new.perks,
        is_active: true,
        sort_order: new.sort_order,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut tier)?;
    Ok(tier)
}

pub fn tier_by_name(
    tx: &impl Reader,
    name: TierLevel,
) -> Result<Option<SubscriptionTier>, VeloraError> {
    tx.find::<SubscriptionTier>(|t| t.name == name)
}

/// Active tiers in display order.
pub fn list_active_tiers(tx: &impl Reader) -> Result<Vec<SubscriptionTier>, VeloraError> {
    let mut tiers = tx.filter::<SubscriptionTier>(|t| t.is_active)?;
    tiers.sort_by_key(|t| (t.sort_order, t.id));
    Ok(tiers)
}

// =============================================================================
// USER SUBSCRIPTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: SubscriptionId,
    pub user: UserId,
    pub tier: TierId,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub specialists_used: u32,
    pub wellness_plans_used: u32,
    pub concierge_requests_used: u32,
    /// Reference at the payment processor, if any.
    pub payment_reference: String,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(UserSubscription, SubscriptionId, "Subscription", "user_subscriptions");

impl UserSubscription {
    /// Active or trialing, and not past its end date.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trial
        ) && self.end_date > now
    }
}

fn period(cycle: BillingCycle) -> Duration {
    match cycle {
        BillingCycle::Monthly => Duration::days(MONTHLY_PERIOD_DAYS),
        BillingCycle::Annual => Duration::days(ANNUAL_PERIOD_DAYS),
    }
}

/// The user's subscription record, whatever its state.
pub fn subscription_of(
    tx: &impl Reader,
    user: UserId,
) -> Result<Option<UserSubscription>, VeloraError> {
    tx.find::<UserSubscription>(|s| s.user == user)
}

/// The user's subscription and tier, if currently active.
pub fn active_subscription(
    tx: &impl Reader,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Option<(UserSubscription, SubscriptionTier)>, VeloraError> {
    match subscription_of(tx, user)? {
        Some(sub) if sub.is_active(now) => {
            let tier = tx.require::<SubscriptionTier>(sub.tier.0)?;
            Ok(Some((sub, tier)))
        }
        _ => Ok(None),
    }
}

/// Start or change a user's subscription.
pub fn subscribe(
    tx: &WriteTx,
    user: UserId,
    tier_name: TierLevel,
    cycle: BillingCycle,
    now: DateTime<Utc>,
) -> Result<UserSubscription, VeloraError> {
    accounts::get(tx, user)?;
    let tier = tier_by_name(tx, tier_name)?
        .filter(|t| t.is_active)
        .ok_or(VeloraError::NotFound("Subscription tier"))?;

    let subscription = match subscription_of(tx, user)? {
        Some(mut existing) => {
            existing.tier = tier.id;
            existing.billing_cycle = cycle;
            existing.status = SubscriptionStatus::Active;
            existing.end_date = now + period(cycle);
            existing.next_billing_date = Some(existing.end_date);
            existing.auto_renew = true;
            existing.updated_at = now;
            tx.put(&existing)?;
            existing
        }
        None => {
            let trial_days = platform::settings(tx)?.trial_period_days;
            let trial_end = now
                .checked_add_signed(Duration::days(i64::from(trial_days)))
                .ok_or_else(|| VeloraError::invalid("Trial period is out of range"))?;
            let mut fresh = UserSubscription {
                id: SubscriptionId::default(),
                user,
                tier: tier.id,
                status: SubscriptionStatus::Trial,
                billing_cycle: cycle,
                start_date: now,
                end_date: trial_end,
                trial_end_date: Some(trial_end),
                next_billing_date: Some(trial_end),
                specialists_used: 0,
                wellness_plans_used: 0,
                concierge_requests_used: 0,
                payment_reference: String::new(),
                auto_renew: true,
                created_at: now,
                updated_at: now,
            };
            tx.insert(&mut fresh)?;
            fresh
        }
    };

    let mut details = Attributes::new();
    details.insert("tier".to_string(), tier.name.to_string());
    details.insert("billing_cycle".to_string(), cycle.to_string());
    platform::record_activity(
        tx,
        user,
        ActivityType::SubscriptionChange,
        format!("Subscribed to {}", tier.display_name),
        details,
        now,
    )?;
    Ok(subscription)
}

/// Cancel a user's subscription. Entitlements drop immediately.
pub fn cancel(
    tx: &WriteTx,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<UserSubscription, VeloraError> {
    let mut subscription = subscription_of(tx, user)?.ok_or(VeloraError::NotFound("Subscription"))?;
    if subscription.status == SubscriptionStatus::Cancelled {
        return Err(VeloraError::invalid("Subscription is already cancelled"));
    }
    subscription.status = SubscriptionStatus::Cancelled;
    subscription.auto_renew = false;
    subscription.next_billing_date = None;
    subscription.updated_at = now;
    tx.put(&subscription)?;
    platform::record_activity(
        tx,
        user,
        ActivityType::SubscriptionChange,
        "Cancelled subscription",
        Attributes::new(),
        now,
    )?;
    Ok(subscription)
}

// =============================================================================
// ENTITLEMENTS & USAGE
// =============================================================================

/// What a user may do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entitlements {
    /// `None` when the user has no active subscription.
    pub tier: Option<TierLevel>,
    pub max_specialists: u32,
    pub max_wellness_plans: u32,
    pub concierge_support: bool,
    pub priority_support: bool,
    pub ai_coaching: bool,
}

impl Entitlements {
    /// Allowance for users without an active subscription.
    pub const FREE: Self = Self {
        tier: None,
        max_specialists: 0,
        max_wellness_plans: FREE_MAX_WELLNESS_PLANS,
        concierge_support: false,
        priority_support: false,
        ai_coaching: false,
    };

    pub fn for_user(
        tx: &impl Reader,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, VeloraError> {
        Ok(match active_subscription(tx, user, now)? {
            Some((_, tier)) => Self {
                tier: Some(tier.name),
                max_specialists: tier.max_specialists,
                max_wellness_plans: tier.max_wellness_plans,
                concierge_support: tier.concierge_support,
                priority_support: tier.priority_support,
                ai_coaching: tier.ai_coaching,
            },
            None => Self::FREE,
        })
    }

    /// Whether the user's tier is at least `required`.
    pub fn meets(&self, required: TierLevel) -> bool {
        self.tier.is_some_and(|tier| tier >= required)
    }
}

/// Counted feature usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Specialist,
    WellnessPlan,
    ConciergeRequest,
}

/// Bump a usage counter on the user's subscription, if they have one.
pub fn record_usage(
    tx: &WriteTx,
    user: UserId,
    usage: Usage,
    now: DateTime<Utc>,
) -> Result<(), VeloraError> {
    let Some(mut subscription) = subscription_of(tx, user)? else {
        return Ok(());
    };
    let counter = match usage {
        Usage::Specialist => &mut subscription.specialists_used,
        Usage::WellnessPlan => &mut subscription.wellness_plans_used,
        Usage::ConciergeRequest => &mut subscription.concierge_requests_used,
    };
    *counter = counter.saturating_add(1);
    subscription.updated_at = now;
    tx.put(&subscription)
}

// =============================================================================
// TESTS
// =============================================================================
