//! # Specialists
//!
//! The curated specialist directory: categories, specialist profiles,
//! client reviews, weekly availability slots, and booking.
//!
//! Booking is gated by subscription: the client's tier must be at least the
//! specialist's tier, and the tier's specialist allowance must not be used up.

use crate::accounts::{self, User};
use crate::platform::{self, NewNotification};
use crate::primitives::{DETAIL_REVIEW_LIMIT, MAX_TITLE_LENGTH};
use crate::storage::{Reader, WriteTx, impl_record};
use crate::subscriptions::{self, Entitlements, Usage};
use crate::types::{
    ActivityType, Attributes, AvailabilityId, CategoryId, NotificationType, ReviewId,
    SpecialistCategoryKind, SpecialistId, TierLevel, UserId, VeloraError, WeeklySchedule,
};
use crate::validate;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// CATEGORIES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistCategory {
    pub id: CategoryId,
    pub name: SpecialistCategoryKind,
    pub display_name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(SpecialistCategory, CategoryId, "Specialist category", "specialist_categories");

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: SpecialistCategoryKind,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
}

pub fn create_category(
    tx: &WriteTx,
    new: NewCategory,
    now: DateTime<Utc>,
) -> Result<SpecialistCategory, VeloraError> {
    if tx
        .find::<SpecialistCategory>(|c| c.name == new.name)?
        .is_some()
    {
        return Err(VeloraError::Conflict(format!(
            "Specialist category '{}' already exists",
            new.name
        )));
    }
    let display_name = match new.display_name {
        Some(name) => validate::bounded("Display name", &name, 100)?,
        None => new.name.display_name().to_string(),
    };
    let mut category = SpecialistCategory {
        id: CategoryId::default(),
        name: new.name,
        display_name,
        description: new.description,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut category)?;
    Ok(category)
}

pub fn list_active_categories(tx: &impl Reader) -> Result<Vec<SpecialistCategory>, VeloraError> {
    tx.filter::<SpecialistCategory>(|c| c.is_active)
}

// =============================================================================
// SPECIALISTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialist {
    pub id: SpecialistId,
    pub user: UserId,
    pub categories: Vec<CategoryId>,
    /// Honorific, e.g. "Dr."
    pub title: String,
    pub professional_summary: String,
    pub years_experience: u32,
    /// Minimum client tier.
    pub tier: TierLevel,
    pub certifications: String,
    pub education: String,
    pub specializations: String,
    pub hourly_rate_cents: u64,
    pub consultation_rate_cents: u64,
    pub available_hours: WeeklySchedule,
    pub timezone: String,
    pub total_clients: u32,
    /// Mean rating in hundredths (450 = 4.50).
    pub average_rating: u32,
    pub total_reviews: u32,
    /// Percent in hundredths.
    pub success_rate: u32,
    pub is_verified: bool,
    pub is_featured: bool,
    pub is_accepting_clients: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(Specialist, SpecialistId, "Specialist", "specialists");

impl Specialist {
    /// Title followed by the account's full name.
    pub fn full_name(&self, user: &User) -> String {
        format!("{} {}", self.title, user.full_name()).trim().to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSpecialist {
    pub user: UserId,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub title: String,
    pub professional_summary: String,
    #[serde(default)]
    pub years_experience: u32,
    #[serde(default = "default_specialist_tier")]
    pub tier: TierLevel,
    #[serde(default)]
    pub certifications: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub specializations: String,
    pub hourly_rate_cents: u64,
    pub consultation_rate_cents: u64,
    #[serde(default)]
    pub available_hours: WeeklySchedule,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_featured: bool,
}

const fn default_specialist_tier() -> TierLevel {
    TierLevel::Premium
}

pub(crate) fn default_timezone() -> String {
    "UTC".to_string()
}

pub fn create_specialist(
    tx: &WriteTx,
    new: NewSpecialist,
    now: DateTime<Utc>,
) -> Result<Specialist, VeloraError> {
    accounts::get(tx, new.user)?;
    if tx.find::<Specialist>(|s| s.user == new.user)?.is_some() {
        return Err(VeloraError::Conflict(
            "User already has a specialist profile".to_string(),
        ));
    }
    for category in &new.categories {
        tx.require::<SpecialistCategory>(category.0)?;
    }
    validate::max_len("Title", &new.title, 100)?;
    let mut specialist = Specialist {
        id: SpecialistId::default(),
        user: new.user,
        categories: new.categories,
        title: new.title.trim().to_string(),
        professional_summary: validate::required("Professional summary", &new.professional_summary)?,
        years_experience: new.years_experience,
        tier: new.tier,
        certifications: new.certifications,
        education: new.education,
        specializations: new.specializations,
        hourly_rate_cents: new.hourly_rate_cents,
        consultation_rate_cents: new.consultation_rate_cents,
        available_hours: new.available_hours,
        timezone: new.timezone,
        total_clients: 0,
        average_rating: 0,
        total_reviews: 0,
        success_rate: 0,
        is_verified: new.is_verified,
        is_featured: new.is_featured,
        is_accepting_clients: true,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut specialist)?;
    Ok(specialist)
}

pub fn get(tx: &impl Reader, id: SpecialistId) -> Result<Specialist, VeloraError> {
    tx.require(id.0)
}

/// Specialists currently taking clients.
pub fn list_accepting(tx: &impl Reader) -> Result<Vec<Specialist>, VeloraError> {
    tx.filter::<Specialist>(|s| s.is_accepting_clients)
}

/// A specialist and their most recent public reviews.
pub fn detail(
    tx: &impl Reader,
    id: SpecialistId,
) -> Result<(Specialist, Vec<SpecialistReview>), VeloraError> {
    let specialist = get(tx, id)?;
    let mut reviews = public_reviews(tx, id)?;
    reviews.truncate(DETAIL_REVIEW_LIMIT);
    Ok((specialist, reviews))
}

/// Specialists taking clients in a category. Unknown or inactive categories
/// yield an empty list together with `None`.
pub fn by_category(
    tx: &impl Reader,
    name: &str,
) -> Result<(Option<SpecialistCategory>, Vec<Specialist>), VeloraError> {
    let Ok(kind) = name.parse::<SpecialistCategoryKind>() else {
        return Ok((None, Vec::new()));
    };
    let Some(category) = tx.find::<SpecialistCategory>(|c| c.name == kind && c.is_active)? else {
        return Ok((None, Vec::new()));
    };
    let specialists = tx.filter::<Specialist>(|s| {
        s.is_accepting_clients && s.categories.contains(&category.id)
    })?;
    Ok((Some(category), specialists))
}

// =============================================================================
// BOOKING
// =============================================================================

/// Request a booking with a specialist.
pub fn book(
    tx: &WriteTx,
    client: UserId,
    id: SpecialistId,
    now: DateTime<Utc>,
) -> Result<Specialist, VeloraError> {
    let mut specialist = get(tx, id)?;
    if !specialist.is_accepting_clients {
        return Err(VeloraError::invalid(
            "This specialist is not accepting new clients",
        ));
    }
    if specialist.user == client {
        return Err(VeloraError::invalid("You cannot book yourself"));
    }
    let entitlements = Entitlements::for_user(tx, client, now)?;
    if !entitlements.meets(specialist.tier) {
        return Err(VeloraError::Forbidden(format!(
            "A {} subscription or higher is required to book this specialist",
            specialist.tier.display_name()
        )));
    }
    let used = subscriptions::subscription_of(tx, client)?
        .map(|s| s.specialists_used)
        .unwrap_or(0);
    if used >= entitlements.max_specialists {
        return Err(VeloraError::Forbidden(
            "Specialist limit reached for your subscription".to_string(),
        ));
    }

    subscriptions::record_usage(tx, client, Usage::Specialist, now)?;
    specialist.total_clients = specialist.total_clients.saturating_add(1);
    specialist.updated_at = now;
    tx.put(&specialist)?;

    let name = specialist.full_name(&accounts::get(tx, specialist.user)?);
    let mut details = Attributes::new();
    details.insert("specialist_id".to_string(), specialist.id.to_string());
    platform::record_activity(
        tx,
        client,
        ActivityType::SpecialistBooked,
        format!("Booked {}", name),
        details,
        now,
    )?;
    platform::notify(
        tx,
        NewNotification::simple(
            client,
            NotificationType::Success,
            "Booking requested",
            format!("Booking request sent to {}!", name),
        ),
        now,
    )?;
    Ok(specialist)
}

// =============================================================================
// REVIEWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistReview {
    pub id: ReviewId,
    pub specialist: SpecialistId,
    pub client: UserId,
    pub rating: u8,
    pub title: String,
    pub review_text: String,
    pub professionalism: u8,
    pub expertise: u8,
    pub communication: u8,
    pub results: u8,
    pub is_verified: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(SpecialistReview, ReviewId, "Review", "specialist_reviews");

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: u8,
    pub title: String,
    pub review_text: String,
    pub professionalism: u8,
    pub expertise: u8,
    pub communication: u8,
    pub results: u8,
    #[serde(default = "public_by_default")]
    pub is_public: bool,
}

const fn public_by_default() -> bool {
    true
}

/// Mean of ratings in hundredths, rounded half up.
pub(crate) fn average_hundredths(ratings: &[u8]) -> u32 {
    if ratings.is_empty() {
        return 0;
    }
    let count = ratings.len() as u32;
    let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
    (sum * 100 + count / 2) / count
}

/// Leave a review. One review per client and specialist.
pub fn submit_review(
    tx: &WriteTx,
    client: UserId,
    id: SpecialistId,
    new: NewReview,
    now: DateTime<Utc>,
) -> Result<SpecialistReview, VeloraError> {
    let mut specialist = get(tx, id)?;
    if specialist.user == client {
        return Err(VeloraError::Forbidden(
            "You cannot review yourself".to_string(),
        ));
    }
    if tx
        .find::<SpecialistReview>(|r| r.specialist == id && r.client == client)?
        .is_some()
    {
        return Err(VeloraError::Conflict(
            "You have already reviewed this specialist".to_string(),
        ));
    }
    let mut review = SpecialistReview {
        id: ReviewId::default(),
        specialist: id,
        client,
        rating: validate::rating("Rating", new.rating)?,
        title: validate::bounded("Title", &new.title, MAX_TITLE_LENGTH)?,
        review_text: validate::required("Review text", &new.review_text)?,
        professionalism: validate::rating("Professionalism", new.professionalism)?,
        expertise: validate::rating("Expertise", new.expertise)?,
        communication: validate::rating("Communication", new.communication)?,
        results: validate::rating("Results", new.results)?,
        is_verified: false,
        is_public: new.is_public,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut review)?;

    let ratings: Vec<u8> = tx
        .filter::<SpecialistReview>(|r| r.specialist == id)?
        .iter()
        .map(|r| r.rating)
        .collect();
    specialist.average_rating = average_hundredths(&ratings);
    specialist.total_reviews = ratings.len() as u32;
    specialist.updated_at = now;
    tx.put(&specialist)?;

    let mut details = Attributes::new();
    details.insert("specialist_id".to_string(), id.to_string());
    details.insert("rating".to_string(), review.rating.to_string());
    platform::record_activity(
        tx,
        client,
        ActivityType::ReviewSubmitted,
        format!("Reviewed specialist #{}", id),
        details,
        now,
    )?;
    Ok(review)
}

/// Public reviews of a specialist, newest first.
pub fn public_reviews(
    tx: &impl Reader,
    id: SpecialistId,
) -> Result<Vec<SpecialistReview>, VeloraError> {
    let mut reviews = tx.filter::<SpecialistReview>(|r| r.specialist == id && r.is_public)?;
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(reviews)
}

// =============================================================================
// AVAILABILITY
// =============================================================================

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Weekday name for 0 (Monday) through 6 (Sunday).
pub fn weekday_name(day: u8) -> Option<&'static str> {
    WEEKDAYS.get(usize::from(day)).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistAvailability {
    pub id: AvailabilityId,
    pub specialist: SpecialistId,
    /// 0 = Monday.
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(SpecialistAvailability, AvailabilityId, "Availability slot", "specialist_availability");

#[derive(Debug, Clone, Deserialize)]
pub struct NewAvailability {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Add a weekly slot. Slots are unique per (day, start time).
pub fn add_availability(
    tx: &WriteTx,
    id: SpecialistId,
    new: NewAvailability,
    now: DateTime<Utc>,
) -> Result<SpecialistAvailability, VeloraError> {
    get(tx, id)?;
    if weekday_name(new.day_of_week).is_none() {
        return Err(VeloraError::invalid(
            "Day of week must be between 0 (Monday) and 6 (Sunday)",
        ));
    }
    if new.start_time >= new.end_time {
        return Err(VeloraError::invalid("Start time must be before end time"));
    }
    let clash = tx.find::<SpecialistAvailability>(|slot| {
        slot.specialist == id
            && slot.day_of_week == new.day_of_week
            && slot.start_time == new.start_time
    })?;
    if clash.is_some() {
        return Err(VeloraError::Conflict(
            "A slot already starts at this time on this day".to_string(),
        ));
    }
    let mut slot = SpecialistAvailability {
        id: AvailabilityId::default(),
        specialist: id,
        day_of_week: new.day_of_week,
        start_time: new.start_time,
        end_time: new.end_time,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut slot)?;
    Ok(slot)
}

/// Active slots, by day then start time.
pub fn availability_for(
    tx: &impl Reader,
    id: SpecialistId,
) -> Result<Vec<SpecialistAvailability>, VeloraError> {
    get(tx, id)?;
    let mut slots =
        tx.filter::<SpecialistAvailability>(|slot| slot.specialist == id && slot.is_active)?;
    slots.sort_by_key(|slot| (slot.day_of_week, slot.start_time));
    Ok(slots)
}

// =============================================================================
// TESTS
// =============================================================================
