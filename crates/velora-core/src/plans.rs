//! # Wellness Plans
//!
//! Personalized multi-week plans made of modules and scheduled sessions,
//! with dated progress check-ins.
//!
//! Every operation is scoped to the plan's owner: plans belonging to someone
//! else are reported as not found.
//!
//! ## Status Flow
//!
//! ```text
//! draft ──► active ◄──► paused
//!   │         │           │
//!   │         ▼           │
//!   │     completed       │
//!   └──► cancelled ◄──────┘
//! ```

use crate::primitives::{
    DEFAULT_AI_MODEL_VERSION, MAX_PLAN_WEEKS, MAX_SESSIONS_PER_WEEK, MAX_TITLE_LENGTH,
    PROGRESS_HISTORY_LIMIT,
};
use crate::storage::{Reader, WriteTx, impl_record};
use crate::subscriptions::{self, Entitlements, Usage};
use crate::types::{
    ActivityType, Attributes, DifficultyLevel, Metrics, ModuleId, ModuleType, PlanId,
    PlanSessionId, PlanStatus, PlanType, ProgressId, SessionStatus, SpecialistId, UserId,
    VeloraError,
};
use crate::{platform, specialists, validate};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// PLANS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessPlan {
    pub id: PlanId,
    pub user: UserId,
    pub specialists: Vec<SpecialistId>,
    pub title: String,
    pub description: String,
    pub plan_type: PlanType,
    pub difficulty_level: DifficultyLevel,
    pub status: PlanStatus,
    pub duration_weeks: u32,
    pub sessions_per_week: u32,
    /// Minutes per session.
    pub estimated_time_per_session: u32,
    pub primary_goals: Vec<String>,
    pub target_metrics: Metrics,
    pub success_criteria: String,
    pub ai_model_version: String,
    pub personalization_factors: Attributes,
    pub adaptation_rules: Attributes,
    pub current_week: u32,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(WellnessPlan, PlanId, "Wellness plan", "wellness_plans");

impl WellnessPlan {
    /// Share of weeks reached, capped at 100.
    pub fn progress_percentage(&self) -> u32 {
        if self.duration_weeks == 0 {
            return 0;
        }
        (self.current_week.saturating_mul(100) / self.duration_weeks).min(100)
    }

    /// Still counts against the user's plan allowance.
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            PlanStatus::Draft | PlanStatus::Active | PlanStatus::Paused
        )
    }
}

/// Whether a plan may move from `from` to `to`.
pub fn can_transition(from: PlanStatus, to: PlanStatus) -> bool {
    use PlanStatus::{Active, Cancelled, Completed, Draft, Paused};
    from == to
        || matches!(
            (from, to),
            (Draft, Active | Cancelled)
                | (Active, Paused | Completed | Cancelled)
                | (Paused, Active | Cancelled)
        )
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub plan_type: PlanType,
    pub difficulty_level: DifficultyLevel,
    pub duration_weeks: u32,
    pub sessions_per_week: u32,
    pub estimated_time_per_session: u32,
    #[serde(default)]
    pub primary_goals: Vec<String>,
    #[serde(default)]
    pub target_metrics: Metrics,
    #[serde(default)]
    pub success_criteria: String,
    #[serde(default)]
    pub personalization_factors: Attributes,
    #[serde(default)]
    pub specialists: Vec<SpecialistId>,
    /// Defaults to the creation day.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// A plan's owner-visible contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDetail {
    pub plan: WellnessPlan,
    pub modules: Vec<PlanModule>,
    pub sessions: Vec<PlanSession>,
}

fn owned_plan(tx: &impl Reader, user: UserId, id: PlanId) -> Result<WellnessPlan, VeloraError> {
    match tx.get::<WellnessPlan>(id.0)? {
        Some(plan) if plan.user == user => Ok(plan),
        _ => Err(VeloraError::NotFound("Wellness plan")),
    }
}

pub fn create_plan(
    tx: &WriteTx,
    user: UserId,
    new: NewPlan,
    now: DateTime<Utc>,
) -> Result<WellnessPlan, VeloraError> {
    let title = validate::bounded("Title", &new.title, MAX_TITLE_LENGTH)?;
    let duration_weeks = validate::positive("Duration weeks", new.duration_weeks)?;
    if duration_weeks > MAX_PLAN_WEEKS {
        return Err(VeloraError::invalid(format!(
            "Duration weeks must be at most {}",
            MAX_PLAN_WEEKS
        )));
    }
    let sessions_per_week = validate::positive("Sessions per week", new.sessions_per_week)?;
    if sessions_per_week > MAX_SESSIONS_PER_WEEK {
        return Err(VeloraError::invalid(format!(
            "Sessions per week must be at most {}",
            MAX_SESSIONS_PER_WEEK
        )));
    }
    let minutes = validate::positive("Estimated time per session", new.estimated_time_per_session)?;
    for specialist in &new.specialists {
        specialists::get(tx, *specialist)?;
    }

    let allowance = Entitlements::for_user(tx, user, now)?.max_wellness_plans;
    let open = tx
        .filter::<WellnessPlan>(|p| p.user == user && p.is_open())?
        .len();
    if open >= allowance as usize {
        return Err(VeloraError::Forbidden(
            "Wellness plan limit reached for your subscription".to_string(),
        ));
    }

    let start_date = new.start_date.unwrap_or_else(|| now.date_naive());
    let end_date = start_date
        .checked_add_days(Days::new(7 * u64::from(duration_weeks)))
        .ok_or_else(|| VeloraError::invalid("Start date is out of range"))?;
    let mut plan = WellnessPlan {
        id: PlanId::default(),
        user,
        specialists: new.specialists,
        title,
        description: new.description,
        plan_type: new.plan_type,
        difficulty_level: new.difficulty_level,
        status: PlanStatus::Draft,
        duration_weeks,
        sessions_per_week,
        estimated_time_per_session: minutes,
        primary_goals: new.primary_goals,
        target_metrics: new.target_metrics,
        success_criteria: new.success_criteria,
        ai_model_version: DEFAULT_AI_MODEL_VERSION.to_string(),
        personalization_factors: new.personalization_factors,
        adaptation_rules: Attributes::new(),
        current_week: 1,
        last_activity_date: None,
        start_date,
        end_date,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut plan)?;

    subscriptions::record_usage(tx, user, Usage::WellnessPlan, now)?;
    let mut details = Attributes::new();
    details.insert("plan_id".to_string(), plan.id.to_string());
    details.insert("plan_type".to_string(), plan.plan_type.to_string());
    platform::record_activity(
        tx,
        user,
        ActivityType::PlanCreated,
        format!("Created wellness plan: {}", plan.title),
        details,
        now,
    )?;
    Ok(plan)
}

/// A user's plans, newest first.
pub fn list_for_user(tx: &impl Reader, user: UserId) -> Result<Vec<WellnessPlan>, VeloraError> {
    let mut plans = tx.filter::<WellnessPlan>(|p| p.user == user)?;
    plans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(plans)
}

pub fn detail(tx: &impl Reader, user: UserId, id: PlanId) -> Result<PlanDetail, VeloraError> {
    let plan = owned_plan(tx, user, id)?;
    Ok(PlanDetail {
        modules: modules_for(tx, id)?,
        sessions: sessions_of(tx, id)?,
        plan,
    })
}

/// Partial plan update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlanUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<PlanStatus>,
    pub difficulty_level: Option<DifficultyLevel>,
    pub current_week: Option<u32>,
    pub success_criteria: Option<String>,
    pub primary_goals: Option<Vec<String>>,
    pub target_metrics: Option<Metrics>,
    pub adaptation_rules: Option<Attributes>,
}

pub fn update_plan(
    tx: &WriteTx,
    user: UserId,
    id: PlanId,
    update: PlanUpdate,
    now: DateTime<Utc>,
) -> Result<WellnessPlan, VeloraError> {
    let mut plan = owned_plan(tx, user, id)?;
    if let Some(title) = update.title {
        plan.title = validate::bounded("Title", &title, MAX_TITLE_LENGTH)?;
    }
    if let Some(status) = update.status {
        if !can_transition(plan.status, status) {
            return Err(VeloraError::invalid(format!(
                "Cannot change plan status from {} to {}",
                plan.status, status
            )));
        }
        plan.status = status;
    }
    if let Some(week) = update.current_week {
        if week == 0 || week > plan.duration_weeks {
            return Err(VeloraError::invalid(format!(
                "Current week must be between 1 and {}",
                plan.duration_weeks
            )));
        }
        plan.current_week = week;
    }
    if let Some(description) = update.description {
        plan.description = description;
    }
    if let Some(criteria) = update.success_criteria {
        plan.success_criteria = criteria;
    }
    if let Some(goals) = update.primary_goals {
        plan.primary_goals = goals;
    }
    if let Some(metrics) = update.target_metrics {
        plan.target_metrics = metrics;
    }
    if let Some(rules) = update.adaptation_rules {
        plan.adaptation_rules = rules;
    }
    plan.difficulty_level = update.difficulty_level.unwrap_or(plan.difficulty_level);
    plan.updated_at = now;
    tx.put(&plan)?;
    Ok(plan)
}

/// Delete a plan together with its modules, sessions, and progress entries.
pub fn delete_plan(tx: &WriteTx, user: UserId, id: PlanId) -> Result<(), VeloraError> {
    owned_plan(tx, user, id)?;
    tx.delete_where::<PlanSession>(|s| s.plan == id)?;
    tx.delete_where::<PlanModule>(|m| m.plan == id)?;
    tx.delete_where::<PlanProgress>(|p| p.plan == id)?;
    tx.delete::<WellnessPlan>(id.0)?;
    Ok(())
}

// =============================================================================
// MODULES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanModule {
    pub id: ModuleId,
    pub plan: PlanId,
    pub title: String,
    pub description: String,
    pub module_type: ModuleType,
    pub order: u32,
    pub is_mandatory: bool,
    pub is_active: bool,
    /// Hundredths (100 = 1.00x).
    pub difficulty_multiplier: u32,
    pub instructions: String,
    pub resources: Vec<String>,
    pub exercises: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(PlanModule, ModuleId, "Plan module", "plan_modules");

#[derive(Debug, Clone, Deserialize)]
pub struct NewModule {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub module_type: ModuleType,
    #[serde(default = "first")]
    pub order: u32,
    #[serde(default = "yes")]
    pub is_mandatory: bool,
    #[serde(default = "unit_multiplier")]
    pub difficulty_multiplier: u32,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub exercises: Vec<String>,
}

const fn first() -> u32 {
    1
}

const fn yes() -> bool {
    true
}

const fn unit_multiplier() -> u32 {
    100
}

pub fn add_module(
    tx: &WriteTx,
    user: UserId,
    plan: PlanId,
    new: NewModule,
    now: DateTime<Utc>,
) -> Result<PlanModule, VeloraError> {
    owned_plan(tx, user, plan)?;
    if new.difficulty_multiplier == 0 || new.difficulty_multiplier > 999 {
        return Err(VeloraError::invalid(
            "Difficulty multiplier must be between 0.01 and 9.99",
        ));
    }
    let mut module = PlanModule {
        id: ModuleId::default(),
        plan,
        title: validate::bounded("Title", &new.title, MAX_TITLE_LENGTH)?,
        description: new.description,
        module_type: new.module_type,
        order: new.order,
        is_mandatory: new.is_mandatory,
        is_active: true,
        difficulty_multiplier: new.difficulty_multiplier,
        instructions: new.instructions,
        resources: new.resources,
        exercises: new.exercises,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut module)?;
    Ok(module)
}

/// A plan's modules by `order`.
pub fn modules_for(tx: &impl Reader, plan: PlanId) -> Result<Vec<PlanModule>, VeloraError> {
    let mut modules = tx.filter::<PlanModule>(|m| m.plan == plan)?;
    modules.sort_by_key(|m| (m.order, m.id));
    Ok(modules)
}

// =============================================================================
// SESSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSession {
    pub id: PlanSessionId,
    pub plan: PlanId,
    pub module: ModuleId,
    pub title: String,
    pub description: String,
    pub week_number: u32,
    pub session_number: u32,
    pub status: SessionStatus,
    pub scheduled_date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub instructions: String,
    pub exercises: Vec<String>,
    pub materials_needed: Vec<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_notes: String,
    pub user_rating: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(PlanSession, PlanSessionId, "Session", "plan_sessions");

#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub module: ModuleId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub week_number: u32,
    pub session_number: u32,
    pub scheduled_date: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub exercises: Vec<String>,
    #[serde(default)]
    pub materials_needed: Vec<String>,
}

pub fn add_session(
    tx: &WriteTx,
    user: UserId,
    plan_id: PlanId,
    new: NewSession,
    now: DateTime<Utc>,
) -> Result<PlanSession, VeloraError> {
    let plan = owned_plan(tx, user, plan_id)?;
    match tx.get::<PlanModule>(new.module.0)? {
        Some(module) if module.plan == plan_id => {}
        _ => return Err(VeloraError::invalid("Module does not belong to this plan")),
    }
    if new.week_number == 0 || new.week_number > plan.duration_weeks {
        return Err(VeloraError::invalid(format!(
            "Week number must be between 1 and {}",
            plan.duration_weeks
        )));
    }
    let session_number = validate::positive("Session number", new.session_number)?;
    let clash = tx.find::<PlanSession>(|s| {
        s.plan == plan_id && s.week_number == new.week_number && s.session_number == session_number
    })?;
    if clash.is_some() {
        return Err(VeloraError::Conflict(format!(
            "Week {} already has a session {}",
            new.week_number, session_number
        )));
    }
    let mut session = PlanSession {
        id: PlanSessionId::default(),
        plan: plan_id,
        module: new.module,
        title: validate::bounded("Title", &new.title, MAX_TITLE_LENGTH)?,
        description: new.description,
        week_number: new.week_number,
        session_number,
        status: SessionStatus::Scheduled,
        scheduled_date: new.scheduled_date,
        duration_minutes: validate::positive("Duration minutes", new.duration_minutes)?,
        instructions: new.instructions,
        exercises: new.exercises,
        materials_needed: new.materials_needed,
        completed_at: None,
        completion_notes: String::new(),
        user_rating: None,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut session)?;
    Ok(session)
}

fn sessions_of(tx: &impl Reader, plan: PlanId) -> Result<Vec<PlanSession>, VeloraError> {
    let mut sessions = tx.filter::<PlanSession>(|s| s.plan == plan)?;
    sessions.sort_by_key(|s| (s.week_number, s.session_number));
    Ok(sessions)
}

/// A plan's sessions by week, then session number.
pub fn sessions_for(
    tx: &impl Reader,
    user: UserId,
    plan: PlanId,
) -> Result<Vec<PlanSession>, VeloraError> {
    owned_plan(tx, user, plan)?;
    sessions_of(tx, plan)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionCompletion {
    pub notes: String,
    pub rating: Option<u8>,
}

/// Mark a session done.
pub fn complete_session(
    tx: &WriteTx,
    user: UserId,
    id: PlanSessionId,
    completion: SessionCompletion,
    now: DateTime<Utc>,
) -> Result<PlanSession, VeloraError> {
    let mut session = tx
        .get::<PlanSession>(id.0)?
        .ok_or(VeloraError::NotFound("Session"))?;
    let mut plan = owned_plan(tx, user, session.plan).map_err(|_| VeloraError::NotFound("Session"))?;
    match session.status {
        SessionStatus::Completed => {
            return Err(VeloraError::invalid("Session is already completed"));
        }
        SessionStatus::Cancelled | SessionStatus::Skipped => {
            return Err(VeloraError::invalid(format!(
                "A {} session cannot be completed",
                session.status.display_name().to_lowercase()
            )));
        }
        SessionStatus::Scheduled | SessionStatus::InProgress => {}
    }
    if let Some(rating) = completion.rating {
        validate::rating("Rating", rating)?;
    }
    session.status = SessionStatus::Completed;
    session.completed_at = Some(now);
    session.completion_notes = completion.notes;
    session.user_rating = completion.rating;
    session.updated_at = now;
    tx.put(&session)?;

    plan.last_activity_date = Some(now);
    plan.updated_at = now;
    tx.put(&plan)?;

    let mut details = Attributes::new();
    details.insert("plan_id".to_string(), plan.id.to_string());
    details.insert("session_id".to_string(), session.id.to_string());
    platform::record_activity(
        tx,
        user,
        ActivityType::SessionCompleted,
        format!("Completed session: {}", session.title),
        details,
        now,
    )?;
    Ok(session)
}

// =============================================================================
// PROGRESS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub id: ProgressId,
    pub plan: PlanId,
    pub date: NaiveDate,
    pub week_number: u32,
    pub weight_kg: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub muscle_mass_kg: Option<f64>,
    pub strength_metrics: Metrics,
    pub endurance_metrics: Metrics,
    pub flexibility_metrics: Metrics,
    pub energy_level: Option<u8>,
    pub sleep_quality: Option<u8>,
    pub stress_level: Option<u8>,
    pub mood_rating: Option<u8>,
    pub notes: String,
    pub achievements: Vec<String>,
    pub challenges: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(PlanProgress, ProgressId, "Progress entry", "plan_progress");

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewProgress {
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    /// Defaults to the plan's current week.
    pub week_number: Option<u32>,
    pub weight_kg: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub muscle_mass_kg: Option<f64>,
    pub strength_metrics: Metrics,
    pub endurance_metrics: Metrics,
    pub flexibility_metrics: Metrics,
    pub energy_level: Option<u8>,
    pub sleep_quality: Option<u8>,
    pub stress_level: Option<u8>,
    pub mood_rating: Option<u8>,
    pub notes: String,
    pub achievements: Vec<String>,
    pub challenges: Vec<String>,
}

/// Record a check-in. One entry per plan and date.
pub fn record_progress(
    tx: &WriteTx,
    user: UserId,
    plan_id: PlanId,
    new: NewProgress,
    now: DateTime<Utc>,
) -> Result<PlanProgress, VeloraError> {
    let plan = owned_plan(tx, user, plan_id)?;
    let date = new.date.unwrap_or_else(|| now.date_naive());
    if tx
        .find::<PlanProgress>(|p| p.plan == plan_id && p.date == date)?
        .is_some()
    {
        return Err(VeloraError::Conflict(format!(
            "Progress already recorded for {}",
            date
        )));
    }
    let week_number = new.week_number.unwrap_or(plan.current_week);
    if week_number == 0 || week_number > plan.duration_weeks {
        return Err(VeloraError::invalid(format!(
            "Week number must be between 1 and {}",
            plan.duration_weeks
        )));
    }
    let mut entry = PlanProgress {
        id: ProgressId::default(),
        plan: plan_id,
        date,
        week_number,
        weight_kg: new.weight_kg,
        body_fat_percentage: new.body_fat_percentage,
        muscle_mass_kg: new.muscle_mass_kg,
        strength_metrics: new.strength_metrics,
        endurance_metrics: new.endurance_metrics,
        flexibility_metrics: new.flexibility_metrics,
        energy_level: validate::wellness_scale("Energy level", new.energy_level)?,
        sleep_quality: validate::wellness_scale("Sleep quality", new.sleep_quality)?,
        stress_level: validate::wellness_scale("Stress level", new.stress_level)?,
        mood_rating: validate::wellness_scale("Mood rating", new.mood_rating)?,
        notes: new.notes,
        achievements: new.achievements,
        challenges: new.challenges,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut entry)?;
    Ok(entry)
}

/// The most recent check-ins, newest date first.
pub fn progress_for(
    tx: &impl Reader,
    user: UserId,
    plan: PlanId,
) -> Result<Vec<PlanProgress>, VeloraError> {
    owned_plan(tx, user, plan)?;
    let mut entries = tx.filter::<PlanProgress>(|p| p.plan == plan)?;
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.truncate(PROGRESS_HISTORY_LIMIT);
    Ok(entries)
}

// =============================================================================
// TESTS
// =============================================================================
