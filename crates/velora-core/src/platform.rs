//! # Platform
//!
//! Site-wide settings, user notifications, the FAQ, and the activity log.

use crate::primitives::{MAX_TITLE_LENGTH, MAX_TRIAL_PERIOD_DAYS};
use crate::storage::{Reader, Record, RecordTable, WriteTx, impl_record};
use crate::types::{
    ActivityId, ActivityType, Attributes, FaqCategory, FaqId, NotificationId, NotificationType,
    UserId, VeloraError,
};
use crate::{accounts, validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// PLATFORM SETTINGS
// =============================================================================

/// Platform-wide settings. A single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub support_email: String,
    pub support_phone: String,
    pub emergency_contact: String,
    pub social_links: Attributes,
    pub total_users: u32,
    pub total_specialists: u32,
    pub total_wellness_plans: u32,
    pub success_stories: u32,
    pub maintenance_mode: bool,
    pub new_user_registrations: bool,
    pub trial_period_days: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

const PLATFORM_KEY: u64 = 1;

impl Record for Platform {
    const KIND: &'static str = "Platform";
    const TABLE: RecordTable = redb::TableDefinition::new("platform");

    fn key(&self) -> u64 {
        PLATFORM_KEY
    }

    fn assign_key(&mut self, _key: u64) {}
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            name: "VELORA".to_string(),
            tagline: "PREMIUM WELLNESS PLATFORM".to_string(),
            description: String::new(),
            primary_color: "#000000".to_string(),
            secondary_color: "#ffffff".to_string(),
            support_email: "support@velora.com".to_string(),
            support_phone: String::new(),
            emergency_contact: String::new(),
            social_links: Attributes::new(),
            total_users: 0,
            total_specialists: 0,
            total_wellness_plans: 0,
            success_stories: 0,
            maintenance_mode: false,
            new_user_registrations: true,
            trial_period_days: 14,
            updated_at: None,
        }
    }
}

/// Current settings, or the defaults if none were saved.
pub fn settings(tx: &impl Reader) -> Result<Platform, VeloraError> {
    Ok(tx.get(PLATFORM_KEY)?.unwrap_or_default())
}

/// Partial settings update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlatformUpdate {
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub support_email: Option<String>,
    pub support_phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub social_links: Option<Attributes>,
    pub success_stories: Option<u32>,
    pub maintenance_mode: Option<bool>,
    pub new_user_registrations: Option<bool>,
    pub trial_period_days: Option<u32>,
}

fn hex_color(field: &str, value: &str) -> Result<(), VeloraError> {
    let ok = value.len() == 7
        && value.starts_with('#')
        && value.chars().skip(1).all(|c| c.is_ascii_hexdigit());
    if ok {
        Ok(())
    } else {
        Err(VeloraError::invalid(format!(
            "{} must be a color like #1a2b3c",
            field
        )))
    }
}

/// Apply a settings update.
pub fn update_settings(
    tx: &WriteTx,
    update: PlatformUpdate,
    now: DateTime<Utc>,
) -> Result<Platform, VeloraError> {
    let mut platform = settings(tx)?;
    if let Some(name) = update.name {
        platform.name = validate::bounded("Name", &name, 100)?;
    }
    if let Some(tagline) = update.tagline {
        platform.tagline = validate::bounded("Tagline", &tagline, MAX_TITLE_LENGTH)?;
    }
    if let Some(description) = update.description {
        platform.description = description;
    }
    if let Some(color) = update.primary_color {
        hex_color("Primary color", &color)?;
        platform.primary_color = color;
    }
    if let Some(color) = update.secondary_color {
        hex_color("Secondary color", &color)?;
        platform.secondary_color = color;
    }
    if let Some(email) = update.support_email {
        platform.support_email = validate::email(&email)?;
    }
    if let Some(phone) = update.support_phone {
        validate::max_len("Support phone", &phone, 20)?;
        platform.support_phone = phone;
    }
    if let Some(contact) = update.emergency_contact {
        validate::max_len("Emergency contact", &contact, 20)?;
        platform.emergency_contact = contact;
    }
    if let Some(links) = update.social_links {
        platform.social_links = links;
    }
    platform.success_stories = update.success_stories.unwrap_or(platform.success_stories);
    platform.maintenance_mode = update.maintenance_mode.unwrap_or(platform.maintenance_mode);
    platform.new_user_registrations = update
        .new_user_registrations
        .unwrap_or(platform.new_user_registrations);
    if let Some(days) = update.trial_period_days {
        if days > MAX_TRIAL_PERIOD_DAYS {
            return Err(VeloraError::invalid(format!(
                "Trial period must be at most {} days",
                MAX_TRIAL_PERIOD_DAYS
            )));
        }
        platform.trial_period_days = days;
    }
    platform.updated_at = Some(now);
    tx.put(&platform)?;
    Ok(platform)
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub action_url: String,
    pub action_text: String,
    pub is_read: bool,
    pub is_important: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl_record!(Notification, NotificationId, "Notification", "notifications");

impl Notification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Input for [`notify`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub user: UserId,
    pub title: String,
    pub message: String,
    #[serde(default = "default_notification_type")]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub action_url: String,
    #[serde(default)]
    pub action_text: String,
    #[serde(default)]
    pub is_important: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

const fn default_notification_type() -> NotificationType {
    NotificationType::Info
}

impl NewNotification {
    /// A plain notification without action or expiry.
    pub fn simple(
        user: UserId,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user,
            title: title.into(),
            message: message.into(),
            notification_type,
            action_url: String::new(),
            action_text: String::new(),
            is_important: false,
            expires_at: None,
        }
    }
}

/// Send a notification to a user.
pub fn notify(
    tx: &WriteTx,
    new: NewNotification,
    now: DateTime<Utc>,
) -> Result<Notification, VeloraError> {
    accounts::get(tx, new.user)?;
    let mut notification = Notification {
        id: NotificationId::default(),
        user: new.user,
        title: validate::bounded("Title", &new.title, MAX_TITLE_LENGTH)?,
        message: validate::required("Message", &new.message)?,
        notification_type: new.notification_type,
        action_url: new.action_url,
        action_text: {
            validate::max_len("Action text", &new.action_text, 50)?;
            new.action_text
        },
        is_read: false,
        is_important: new.is_important,
        expires_at: new.expires_at,
        created_at: now,
        read_at: None,
    };
    tx.insert(&mut notification)?;
    Ok(notification)
}

/// A user's unexpired notifications, newest first.
pub fn notifications_for(
    tx: &impl Reader,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<Notification>, VeloraError> {
    let mut list = tx.filter::<Notification>(|n| n.user == user && !n.is_expired(now))?;
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(list)
}

/// Number of unread, unexpired notifications.
pub fn unread_count(
    tx: &impl Reader,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<usize, VeloraError> {
    Ok(tx
        .filter::<Notification>(|n| n.user == user && !n.is_read && !n.is_expired(now))?
        .len())
}

/// Which notifications to mark as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkRead {
    All,
    Ids(Vec<NotificationId>),
}

/// Mark a user's notifications as read. Ids owned by other users are ignored.
///
/// Returns how many notifications changed.
pub fn mark_read(
    tx: &WriteTx,
    user: UserId,
    which: MarkRead,
    now: DateTime<Utc>,
) -> Result<usize, VeloraError> {
    let wanted: Option<BTreeSet<NotificationId>> = match which {
        MarkRead::All => None,
        MarkRead::Ids(ids) => Some(ids.into_iter().collect()),
    };
    let targets = tx.filter::<Notification>(|n| {
        n.user == user && !n.is_read && wanted.as_ref().is_none_or(|ids| ids.contains(&n.id))
    })?;
    for mut notification in targets.iter().cloned() {
        notification.is_read = true;
        notification.read_at = Some(now);
        tx.put(&notification)?;
    }
    Ok(targets.len())
}

// =============================================================================
// FAQ
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub id: FaqId,
    pub category: FaqCategory,
    pub question: String,
    pub answer: String,
    pub is_featured: bool,
    pub is_published: bool,
    pub view_count: u32,
    pub helpful_count: u32,
    pub sort_order: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(Faq, FaqId, "FAQ", "faqs");

/// Input for [`create_faq`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewFaq {
    pub category: FaqCategory,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "published_by_default")]
    pub is_published: bool,
    #[serde(default = "first_position")]
    pub sort_order: u32,
}

const fn published_by_default() -> bool {
    true
}

const fn first_position() -> u32 {
    1
}

pub fn create_faq(tx: &WriteTx, new: NewFaq, now: DateTime<Utc>) -> Result<Faq, VeloraError> {
    let mut faq = Faq {
        id: FaqId::default(),
        category: new.category,
        question: validate::bounded("Question", &new.question, MAX_TITLE_LENGTH)?,
        answer: validate::required("Answer", &new.answer)?,
        is_featured: new.is_featured,
        is_published: new.is_published,
        view_count: 0,
        helpful_count: 0,
        sort_order: new.sort_order,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut faq)?;
    Ok(faq)
}

/// Published entries grouped by category, in category order then `sort_order`.
///
/// Categories without entries are left out.
pub fn faq_by_category(tx: &impl Reader) -> Result<Vec<(FaqCategory, Vec<Faq>)>, VeloraError> {
    let mut published = tx.filter::<Faq>(|f| f.is_published)?;
    published.sort_by_key(|f| (f.category, f.sort_order, f.id));
    let mut groups: Vec<(FaqCategory, Vec<Faq>)> = Vec::new();
    for faq in published {
        match groups.last_mut() {
            Some((category, entries)) if *category == faq.category => entries.push(faq),
            _ => groups.push((faq.category, vec![faq])),
        }
    }
    Ok(groups)
}

// =============================================================================
// ACTIVITY LOG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub id: ActivityId,
    pub user: UserId,
    pub activity_type: ActivityType,
    pub description: String,
    pub details: Attributes,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl_record!(UserActivity, ActivityId, "Activity", "user_activities");

/// Append an entry to a user's activity log.
pub fn record_activity(
    tx: &WriteTx,
    user: UserId,
    activity_type: ActivityType,
    description: impl Into<String>,
    details: Attributes,
    now: DateTime<Utc>,
) -> Result<UserActivity, VeloraError> {
    let description: String = description.into();
    let description = description.chars().take(MAX_TITLE_LENGTH).collect();
    let mut activity = UserActivity {
        id: ActivityId::default(),
        user,
        activity_type,
        description,
        details,
        ip_address: None,
        user_agent: String::new(),
        created_at: now,
    };
    tx.insert(&mut activity)?;
    Ok(activity)
}

/// A user's most recent activity, newest first.
pub fn activities_for(
    tx: &impl Reader,
    user: UserId,
    limit: usize,
) -> Result<Vec<UserActivity>, VeloraError> {
    let mut list = tx.filter::<UserActivity>(|a| a.user == user)?;
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    list.truncate(limit);
    Ok(list)
}

// =============================================================================
// TESTS
// =============================================================================
