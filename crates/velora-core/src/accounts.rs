//! # Accounts
//!
//! Platform users and their extended wellness profiles.
//!
//! Emails are stored lower-cased and are unique, as are usernames. Usernames
//! are derived from the email's local part; clients never pick them.
//! Passwords are hashed with Argon2id and never leave this module.

use crate::primitives::{
    DEMO_EMAIL, DEMO_USERNAME, MAX_BIO_LENGTH, MAX_NAME_LENGTH, MAX_PHONE_LENGTH,
};
use crate::storage::{Index, Reader, Record, RecordTable, WriteTx, impl_record};
use crate::types::{ActivityLevel, FitnessLevel, Gender, PrimaryGoal, UserId, VeloraError};
use crate::validate;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

// =============================================================================
// RECORDS
// =============================================================================

/// A platform account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    /// PHC string; empty for accounts that cannot log in with a password.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub bio: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub fitness_level: Option<FitnessLevel>,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub email_verified: bool,
    pub onboarded: bool,
    pub is_active: bool,
    pub is_staff: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(User, UserId, "User", "users");

impl User {
    /// "First Last", trimmed; empty when neither name is set.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Age in whole years on `today`, if the date of birth is known.
    pub fn age(&self, today: NaiveDate) -> Option<i32> {
        let born = self.date_of_birth?;
        let before_birthday = (today.month(), today.day()) < (born.month(), born.day());
        Some(today.year() - born.year() - i32::from(before_birthday))
    }
}

/// Goals and medical context kept next to the account. Keyed by the user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: UserId,
    pub primary_goal: Option<PrimaryGoal>,
    pub target_weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub medical_conditions: String,
    pub medications: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for UserProfile {
    const KIND: &'static str = "User profile";
    const TABLE: RecordTable = redb::TableDefinition::new("user_profiles");

    fn key(&self) -> u64 {
        self.user.0
    }

    fn assign_key(&mut self, key: u64) {
        self.user = UserId(key);
    }
}

impl UserProfile {
    fn empty(user: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user,
            primary_goal: None,
            target_weight_kg: None,
            activity_level: None,
            medical_conditions: String::new(),
            medications: String::new(),
            emergency_contact_name: String::new(),
            emergency_contact_phone: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// PASSWORDS
// =============================================================================

fn hash_password(password: &str) -> Result<String, VeloraError> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| VeloraError::Internal(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| VeloraError::Internal(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    if stored.is_empty() {
        return false;
    }
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// =============================================================================
// LOOKUPS
// =============================================================================

/// Fetch a user by id.
pub fn get(tx: &impl Reader, id: UserId) -> Result<User, VeloraError> {
    tx.require(id.0)
}

/// Find a user by email (case-insensitive).
pub fn find_by_email(tx: &impl Reader, email: &str) -> Result<Option<User>, VeloraError> {
    let key = email.trim().to_lowercase();
    match tx.index_get(Index::UserEmail, &key)? {
        Some(id) => tx.get(id),
        None => Ok(None),
    }
}

/// Find a user by username.
pub fn find_by_username(tx: &impl Reader, username: &str) -> Result<Option<User>, VeloraError> {
    match tx.index_get(Index::Username, username)? {
        Some(id) => tx.get(id),
        None => Ok(None),
    }
}

/// Whether an account already uses this email.
pub fn email_taken(tx: &impl Reader, email: &str) -> Result<bool, VeloraError> {
    Ok(tx
        .index_get(Index::UserEmail, &email.trim().to_lowercase())?
        .is_some())
}

/// The user's profile.
pub fn profile_of(tx: &impl Reader, user: UserId) -> Result<UserProfile, VeloraError> {
    tx.require(user.0)
}

// =============================================================================
// CREATION
// =============================================================================

/// Input for [`create_user`].
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub is_staff: bool,
}

/// Base username for an email: the local part, restricted to `[a-z0-9._-]`.
fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

/// First free username: `base`, then `base1`, `base2`, ...
///
/// The demo account's username is never handed out.
fn unique_username(tx: &impl Reader, base: &str) -> Result<String, VeloraError> {
    let free = |candidate: &str| -> Result<bool, VeloraError> {
        Ok(candidate != DEMO_USERNAME && tx.index_get(Index::Username, candidate)?.is_none())
    };
    if free(base)? {
        return Ok(base.to_string());
    }
    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{}{}", base, counter);
        if free(&candidate)? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

fn insert_user(
    tx: &WriteTx,
    email: String,
    username: String,
    password_hash: String,
    new: &NewUser,
    now: DateTime<Utc>,
) -> Result<User, VeloraError> {
    let mut user = User {
        id: UserId::default(),
        email,
        username,
        password_hash,
        first_name: new.first_name.trim().to_string(),
        last_name: new.last_name.trim().to_string(),
        phone_number: None,
        date_of_birth: None,
        gender: None,
        bio: String::new(),
        height_cm: None,
        weight_kg: None,
        fitness_level: None,
        email_notifications: true,
        sms_notifications: false,
        email_verified: new.email_verified,
        onboarded: false,
        is_active: true,
        is_staff: new.is_staff,
        last_login: None,
        created_at: now,
        updated_at: now,
    };
    let id = tx.insert(&mut user)?;
    tx.index_put(Index::UserEmail, &user.email, id)?;
    tx.index_put(Index::Username, &user.username, id)?;
    tx.put(&UserProfile::empty(user.id, now))?;
    Ok(user)
}

/// Create an account and its empty profile.
pub fn create_user(tx: &WriteTx, new: NewUser, now: DateTime<Utc>) -> Result<User, VeloraError> {
    let email = validate::email(&new.email)?;
    if email_taken(tx, &email)? {
        return Err(VeloraError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }
    validate::max_len("First name", &new.first_name, MAX_NAME_LENGTH)?;
    validate::max_len("Last name", &new.last_name, MAX_NAME_LENGTH)?;
    let username = unique_username(tx, &username_base(&email))?;
    let password_hash = hash_password(&new.password)?;
    insert_user(tx, email, username, password_hash, &new, now)
}

/// Fetch or create the development demo account.
///
/// The demo account is keyed by its email and has no usable password. An
/// account holding that email with a password is a real user and is never
/// handed out.
pub fn demo_user(tx: &WriteTx, now: DateTime<Utc>) -> Result<User, VeloraError> {
    if let Some(user) = find_by_email(tx, DEMO_EMAIL)? {
        if !user.password_hash.is_empty() {
            return Err(VeloraError::Conflict(
                "Demo account email belongs to a registered user".to_string(),
            ));
        }
        return Ok(user);
    }
    let new = NewUser {
        email: DEMO_EMAIL.to_string(),
        first_name: "Demo".to_string(),
        last_name: "User".to_string(),
        email_verified: true,
        ..NewUser::default()
    };
    let username = match find_by_username(tx, DEMO_USERNAME)? {
        None => DEMO_USERNAME.to_string(),
        Some(_) => unique_username(tx, DEMO_USERNAME)?,
    };
    insert_user(tx, DEMO_EMAIL.to_string(), username, String::new(), &new, now)
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Check an email/password pair and record the login.
pub fn authenticate(
    tx: &WriteTx,
    email: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<User, VeloraError> {
    let invalid = || VeloraError::Unauthorized("Invalid email or password".to_string());
    let mut user = find_by_email(tx, email)?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password_hash) {
        return Err(invalid());
    }
    ensure_active(&user)?;
    user.last_login = Some(now);
    tx.put(&user)?;
    Ok(user)
}

/// Record a login performed without a password (OTP, demo).
pub fn touch_login(tx: &WriteTx, user: &mut User, now: DateTime<Utc>) -> Result<(), VeloraError> {
    ensure_active(user)?;
    user.last_login = Some(now);
    tx.put(user)
}

/// Reject deactivated accounts.
pub fn ensure_active(user: &User) -> Result<(), VeloraError> {
    if user.is_active {
        Ok(())
    } else {
        Err(VeloraError::Unauthorized("Account is inactive".to_string()))
    }
}

// =============================================================================
// PROFILE UPDATES
// =============================================================================

/// Partial update of a user's account and profile fields.
///
/// `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub bio: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub fitness_level: Option<FitnessLevel>,
    pub email_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
    pub primary_goal: Option<PrimaryGoal>,
    pub target_weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub medical_conditions: Option<String>,
    pub medications: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

fn non_negative(field: &str, value: Option<f64>) -> Result<(), VeloraError> {
    match value {
        Some(v) if !v.is_finite() || v.is_sign_negative() => Err(VeloraError::invalid(format!(
            "{} must be a positive number",
            field
        ))),
        _ => Ok(()),
    }
}

/// Apply a partial update to the user and their profile.
pub fn update_profile(
    tx: &WriteTx,
    id: UserId,
    update: ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<(User, UserProfile), VeloraError> {
    let mut user = get(tx, id)?;
    let mut profile = tx
        .get::<UserProfile>(id.0)?
        .unwrap_or_else(|| UserProfile::empty(id, now));

    if let Some(first) = update.first_name {
        validate::max_len("First name", &first, MAX_NAME_LENGTH)?;
        user.first_name = first.trim().to_string();
    }
    if let Some(last) = update.last_name {
        validate::max_len("Last name", &last, MAX_NAME_LENGTH)?;
        user.last_name = last.trim().to_string();
    }
    if let Some(raw) = update.email {
        let email = validate::email(&raw)?;
        if email != user.email {
            if email_taken(tx, &email)? {
                return Err(VeloraError::Conflict(
                    "User with this email already exists".to_string(),
                ));
            }
            tx.index_remove(Index::UserEmail, &user.email)?;
            tx.index_put(Index::UserEmail, &email, id.0)?;
            user.email = email;
        }
    }
    if let Some(phone) = update.phone_number {
        validate::max_len("Phone number", &phone, MAX_PHONE_LENGTH)?;
        let phone = phone.trim().to_string();
        user.phone_number = if phone.is_empty() { None } else { Some(phone) };
    }
    if let Some(bio) = update.bio {
        validate::max_len("Bio", &bio, MAX_BIO_LENGTH)?;
        user.bio = bio;
    }
    non_negative("Height", update.height_cm)?;
    non_negative("Weight", update.weight_kg)?;
    non_negative("Target weight", update.target_weight_kg)?;
    if let Some(phone) = &update.emergency_contact_phone {
        validate::max_len("Emergency contact phone", phone, MAX_PHONE_LENGTH)?;
    }

    user.date_of_birth = update.date_of_birth.or(user.date_of_birth);
    user.gender = update.gender.or(user.gender);
    user.height_cm = update.height_cm.or(user.height_cm);
    user.weight_kg = update.weight_kg.or(user.weight_kg);
    user.fitness_level = update.fitness_level.or(user.fitness_level);
    user.email_notifications = update
        .email_notifications
        .unwrap_or(user.email_notifications);
    user.sms_notifications = update.sms_notifications.unwrap_or(user.sms_notifications);
    user.updated_at = now;

    profile.primary_goal = update.primary_goal.or(profile.primary_goal);
    profile.target_weight_kg = update.target_weight_kg.or(profile.target_weight_kg);
    profile.activity_level = update.activity_level.or(profile.activity_level);
    if let Some(conditions) = update.medical_conditions {
        profile.medical_conditions = conditions;
    }
    if let Some(medications) = update.medications {
        profile.medications = medications;
    }
    if let Some(name) = update.emergency_contact_name {
        profile.emergency_contact_name = name.trim().to_string();
    }
    if let Some(phone) = update.emergency_contact_phone {
        profile.emergency_contact_phone = phone.trim().to_string();
    }
    profile.updated_at = now;

    tx.put(&user)?;
    tx.put(&profile)?;
    Ok((user, profile))
}

/// Mark the onboarding flow as finished.
pub fn complete_onboarding(
    tx: &WriteTx,
    id: UserId,
    now: DateTime<Utc>,
) -> Result<User, VeloraError> {
    let mut user = get(tx, id)?;
    user.onboarded = true;
    user.updated_at = now;
    tx.put(&user)?;
    Ok(user)
}

// =============================================================================
// TESTS
// =============================================================================
