//! # Concierge
//!
//! Agents, the service catalog, client requests, appointments, and agent
//! notes.
//!
//! Client-facing reads are scoped to the calling client; records owned by
//! someone else are reported as not found. Agent-side operations (assigning,
//! status changes, notes, scheduling) are performed by staff.
//!
//! ## Request Lifecycle
//!
//! ```text
//! submitted ──► assigned ──► in_progress ──► pending_approval
//!     │            │  ▲           │  ▲               │
//!     │            ▼  │           ▼  │               ▼
//!     │          on_hold ◄────────┘  └─────────── completed
//!     ▼
//! cancelled (from any open state)
//! ```

use crate::plans::WellnessPlan;
use crate::platform::{self, NewNotification};
use crate::primitives::{DASHBOARD_LIMIT, MAX_BUDGET_RANGE_LENGTH, MAX_TITLE_LENGTH};
use crate::specialists::{self, average_hundredths, default_timezone};
use crate::storage::{Reader, WriteTx, impl_record};
use crate::subscriptions::{self, Entitlements, Usage};
use crate::types::{
    ActivityType, AgentId, AppointmentId, AppointmentStatus, AppointmentType, Attributes, NoteId,
    NoteType, NotificationType, PlanId, Priority, RequestId, RequestStatus, ServiceCategory,
    ServiceId, SpecialistId, TierLevel, UserId, VeloraError, WeeklySchedule,
};
use crate::{accounts, validate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// AGENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConciergeAgent {
    pub id: AgentId,
    pub user: UserId,
    pub employee_id: String,
    pub department: String,
    pub specializations: Vec<String>,
    pub languages: Vec<String>,
    pub total_clients: u32,
    /// Mean client rating in hundredths.
    pub client_satisfaction_rating: u32,
    pub total_requests_handled: u32,
    pub is_active: bool,
    pub max_concurrent_clients: u32,
    pub working_hours: WeeklySchedule,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(ConciergeAgent, AgentId, "Concierge agent", "concierge_agents");

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub user: UserId,
    pub employee_id: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_max_clients")]
    pub max_concurrent_clients: u32,
    #[serde(default)]
    pub working_hours: WeeklySchedule,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_languages() -> Vec<String> {
    vec!["English".to_string()]
}

const fn default_max_clients() -> u32 {
    20
}

pub fn create_agent(
    tx: &WriteTx,
    new: NewAgent,
    now: DateTime<Utc>,
) -> Result<ConciergeAgent, VeloraError> {
    accounts::get(tx, new.user)?;
    let employee_id = validate::bounded("Employee ID", &new.employee_id, 20)?;
    if tx.find::<ConciergeAgent>(|a| a.user == new.user)?.is_some() {
        return Err(VeloraError::Conflict(
            "User already has a concierge agent profile".to_string(),
        ));
    }
    if tx
        .find::<ConciergeAgent>(|a| a.employee_id == employee_id)?
        .is_some()
    {
        return Err(VeloraError::Conflict(format!(
            "Employee ID '{}' is already in use",
            employee_id
        )));
    }
    let mut agent = ConciergeAgent {
        id: AgentId::default(),
        user: new.user,
        employee_id,
        department: new.department,
        specializations: new.specializations,
        languages: new.languages,
        total_clients: 0,
        client_satisfaction_rating: 0,
        total_requests_handled: 0,
        is_active: true,
        max_concurrent_clients: validate::positive(
            "Max concurrent clients",
            new.max_concurrent_clients,
        )?,
        working_hours: new.working_hours,
        timezone: new.timezone,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut agent)?;
    Ok(agent)
}

pub fn get_agent(tx: &impl Reader, id: AgentId) -> Result<ConciergeAgent, VeloraError> {
    tx.require(id.0)
}

fn active_agent(tx: &impl Reader, id: AgentId) -> Result<ConciergeAgent, VeloraError> {
    let agent = get_agent(tx, id)?;
    if !agent.is_active {
        return Err(VeloraError::invalid("This concierge agent is not active"));
    }
    Ok(agent)
}

// =============================================================================
// SERVICES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConciergeService {
    pub id: ServiceId,
    pub name: String,
    pub description: String,
    pub category: ServiceCategory,
    pub minimum_tier: TierLevel,
    pub base_price_cents: u64,
    pub is_complimentary: bool,
    pub estimated_completion_minutes: Option<u32>,
    pub requires_specialist: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(ConciergeService, ServiceId, "Concierge service", "concierge_services");

#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: ServiceCategory,
    #[serde(default = "basic_tier")]
    pub minimum_tier: TierLevel,
    #[serde(default)]
    pub base_price_cents: u64,
    #[serde(default)]
    pub is_complimentary: bool,
    #[serde(default)]
    pub estimated_completion_minutes: Option<u32>,
    #[serde(default)]
    pub requires_specialist: bool,
}

const fn basic_tier() -> TierLevel {
    TierLevel::Basic
}

pub fn create_service(
    tx: &WriteTx,
    new: NewService,
    now: DateTime<Utc>,
) -> Result<ConciergeService, VeloraError> {
    let mut service = ConciergeService {
        id: ServiceId::default(),
        name: validate::bounded("Name", &new.name, MAX_TITLE_LENGTH)?,
        description: new.description,
        category: new.category,
        minimum_tier: new.minimum_tier,
        base_price_cents: new.base_price_cents,
        is_complimentary: new.is_complimentary,
        estimated_completion_minutes: new.estimated_completion_minutes,
        requires_specialist: new.requires_specialist,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut service)?;
    Ok(service)
}

/// Active services by category, then name.
pub fn list_active_services(tx: &impl Reader) -> Result<Vec<ConciergeService>, VeloraError> {
    let mut services = tx.filter::<ConciergeService>(|s| s.is_active)?;
    services.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
    Ok(services)
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConciergeRequest {
    pub id: RequestId,
    pub client: UserId,
    pub agent: Option<AgentId>,
    pub service: ServiceId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: RequestStatus,
    pub preferred_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub special_instructions: String,
    pub budget_range: String,
    pub location_preferences: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_notes: String,
    pub client_rating: Option<u8>,
    pub client_feedback: String,
    pub estimated_cost_cents: Option<u64>,
    pub actual_cost_cents: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(ConciergeRequest, RequestId, "Concierge request", "concierge_requests");

impl ConciergeRequest {
    pub fn is_closed(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Completed | RequestStatus::Cancelled
        )
    }
}

/// Whether a request may move from `from` to `to` through a status update.
pub fn can_transition(from: RequestStatus, to: RequestStatus) -> bool {
    use RequestStatus::{
        Assigned, Cancelled, Completed, InProgress, OnHold, PendingApproval, Submitted,
    };
    matches!(
        (from, to),
        (Submitted, Assigned | OnHold | Cancelled)
            | (Assigned, InProgress | OnHold | Cancelled)
            | (InProgress, PendingApproval | Completed | OnHold | Cancelled)
            | (PendingApproval, InProgress | Completed | Cancelled)
            | (OnHold, Assigned | InProgress | Cancelled)
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub service: ServiceId,
    pub title: String,
    pub description: String,
    #[serde(default = "normal_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub preferred_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub special_instructions: String,
    #[serde(default)]
    pub budget_range: String,
    #[serde(default)]
    pub location_preferences: String,
}

const fn normal_priority() -> Priority {
    Priority::Normal
}

/// A client-visible request with its service and non-private notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDetail {
    pub request: ConciergeRequest,
    pub service: ConciergeService,
    pub notes: Vec<ConciergeNote>,
}

pub fn create_request(
    tx: &WriteTx,
    client: UserId,
    new: NewRequest,
    now: DateTime<Utc>,
) -> Result<ConciergeRequest, VeloraError> {
    let service = match tx.get::<ConciergeService>(new.service.0)? {
        Some(service) if service.is_active => service,
        _ => return Err(VeloraError::NotFound("Concierge service")),
    };
    if !Entitlements::for_user(tx, client, now)?.meets(service.minimum_tier) {
        return Err(VeloraError::Forbidden(format!(
            "A {} subscription or higher is required for this service",
            service.minimum_tier.display_name()
        )));
    }
    let title = validate::bounded("Title", &new.title, MAX_TITLE_LENGTH)?;
    let description = validate::required("Description", &new.description)?;
    validate::max_len("Budget range", &new.budget_range, MAX_BUDGET_RANGE_LENGTH)?;
    if let (Some(preferred), Some(deadline)) = (new.preferred_date, new.deadline) {
        if deadline < preferred {
            return Err(VeloraError::invalid(
                "Deadline cannot be before the preferred date",
            ));
        }
    }

    let mut request = ConciergeRequest {
        id: RequestId::default(),
        client,
        agent: None,
        service: service.id,
        title,
        description,
        priority: new.priority,
        status: RequestStatus::Submitted,
        preferred_date: new.preferred_date,
        deadline: new.deadline,
        estimated_completion: None,
        special_instructions: new.special_instructions,
        budget_range: new.budget_range.trim().to_string(),
        location_preferences: new.location_preferences,
        completed_at: None,
        completion_notes: String::new(),
        client_rating: None,
        client_feedback: String::new(),
        estimated_cost_cents: (!service.is_complimentary).then_some(service.base_price_cents),
        actual_cost_cents: None,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut request)?;

    subscriptions::record_usage(tx, client, Usage::ConciergeRequest, now)?;
    let mut details = Attributes::new();
    details.insert("request_id".to_string(), request.id.to_string());
    details.insert("service".to_string(), service.name.clone());
    platform::record_activity(
        tx,
        client,
        ActivityType::ConciergeRequest,
        format!("Submitted concierge request: {}", request.title),
        details,
        now,
    )?;
    Ok(request)
}

/// A client's requests, newest first.
pub fn list_for_client(
    tx: &impl Reader,
    client: UserId,
) -> Result<Vec<ConciergeRequest>, VeloraError> {
    let mut requests = tx.filter::<ConciergeRequest>(|r| r.client == client)?;
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(requests)
}

fn owned_request(
    tx: &impl Reader,
    client: UserId,
    id: RequestId,
) -> Result<ConciergeRequest, VeloraError> {
    match tx.get::<ConciergeRequest>(id.0)? {
        Some(request) if request.client == client => Ok(request),
        _ => Err(VeloraError::NotFound("Concierge request")),
    }
}

pub fn detail(
    tx: &impl Reader,
    client: UserId,
    id: RequestId,
) -> Result<RequestDetail, VeloraError> {
    let request = owned_request(tx, client, id)?;
    Ok(RequestDetail {
        service: tx.require(request.service.0)?,
        notes: notes_for_request(tx, client, id)?,
        request,
    })
}

/// Hand a request to an agent.
pub fn assign(
    tx: &WriteTx,
    id: RequestId,
    agent: AgentId,
    now: DateTime<Utc>,
) -> Result<ConciergeRequest, VeloraError> {
    let mut request: ConciergeRequest = tx.require(id.0)?;
    let mut agent = active_agent(tx, agent)?;
    if !matches!(
        request.status,
        RequestStatus::Submitted | RequestStatus::Assigned | RequestStatus::OnHold
    ) {
        return Err(VeloraError::invalid(format!(
            "A request that is {} cannot be assigned",
            request.status.display_name().to_lowercase()
        )));
    }

    let new_client = tx
        .find::<ConciergeRequest>(|r| r.agent == Some(agent.id) && r.client == request.client)?
        .is_none();
    if new_client {
        agent.total_clients = agent.total_clients.saturating_add(1);
        agent.updated_at = now;
        tx.put(&agent)?;
    }

    request.agent = Some(agent.id);
    request.status = RequestStatus::Assigned;
    request.updated_at = now;
    tx.put(&request)?;

    platform::notify(
        tx,
        NewNotification::simple(
            request.client,
            NotificationType::Update,
            "Concierge request assigned",
            format!("An agent is now handling \"{}\".", request.title),
        ),
        now,
    )?;
    Ok(request)
}

/// Staff-side status change.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: RequestStatus,
    #[serde(default)]
    pub completion_notes: Option<String>,
    #[serde(default)]
    pub actual_cost_cents: Option<u64>,
    #[serde(default)]
    pub estimated_completion: Option<DateTime<Utc>>,
}

pub fn update_status(
    tx: &WriteTx,
    id: RequestId,
    update: StatusUpdate,
    now: DateTime<Utc>,
) -> Result<ConciergeRequest, VeloraError> {
    let mut request: ConciergeRequest = tx.require(id.0)?;
    if !can_transition(request.status, update.status) {
        return Err(VeloraError::invalid(format!(
            "Cannot change request status from {} to {}",
            request.status, update.status
        )));
    }
    if update.status == RequestStatus::Assigned && request.agent.is_none() {
        return Err(VeloraError::invalid(
            "Assign an agent before marking the request assigned",
        ));
    }
    if let Some(estimate) = update.estimated_completion {
        request.estimated_completion = Some(estimate);
    }

    if update.status == RequestStatus::Completed {
        request.completed_at = Some(now);
        if let Some(notes) = update.completion_notes {
            request.completion_notes = notes;
        }
        request.actual_cost_cents = update.actual_cost_cents.or(request.estimated_cost_cents);
        if let Some(agent_id) = request.agent {
            let mut agent = get_agent(tx, agent_id)?;
            agent.total_requests_handled = agent.total_requests_handled.saturating_add(1);
            agent.updated_at = now;
            tx.put(&agent)?;
        }
        platform::notify(
            tx,
            NewNotification::simple(
                request.client,
                NotificationType::Success,
                "Concierge request completed",
                format!("\"{}\" has been completed.", request.title),
            ),
            now,
        )?;
    }

    request.status = update.status;
    request.updated_at = now;
    tx.put(&request)?;
    Ok(request)
}

/// Client-side cancellation.
pub fn cancel(
    tx: &WriteTx,
    client: UserId,
    id: RequestId,
    now: DateTime<Utc>,
) -> Result<ConciergeRequest, VeloraError> {
    let mut request = owned_request(tx, client, id)?;
    if request.is_closed() {
        return Err(VeloraError::invalid(format!(
            "This request is already {}",
            request.status.display_name().to_lowercase()
        )));
    }
    request.status = RequestStatus::Cancelled;
    request.updated_at = now;
    tx.put(&request)?;
    Ok(request)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestRating {
    pub rating: u8,
    #[serde(default)]
    pub feedback: String,
}

/// Rate a completed request. Updates the handling agent's satisfaction score.
pub fn rate(
    tx: &WriteTx,
    client: UserId,
    id: RequestId,
    rating: RequestRating,
    now: DateTime<Utc>,
) -> Result<ConciergeRequest, VeloraError> {
    let mut request = owned_request(tx, client, id)?;
    if request.status != RequestStatus::Completed {
        return Err(VeloraError::invalid("Only completed requests can be rated"));
    }
    if request.client_rating.is_some() {
        return Err(VeloraError::Conflict(
            "This request has already been rated".to_string(),
        ));
    }
    request.client_rating = Some(validate::rating("Rating", rating.rating)?);
    request.client_feedback = rating.feedback;
    request.updated_at = now;
    tx.put(&request)?;

    if let Some(agent_id) = request.agent {
        let mut agent = get_agent(tx, agent_id)?;
        let ratings: Vec<u8> = tx
            .filter::<ConciergeRequest>(|r| r.agent == Some(agent_id))?
            .iter()
            .filter_map(|r| r.client_rating)
            .collect();
        agent.client_satisfaction_rating = average_hundredths(&ratings);
        agent.updated_at = now;
        tx.put(&agent)?;
    }
    Ok(request)
}

// =============================================================================
// APPOINTMENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConciergeAppointment {
    pub id: AppointmentId,
    pub client: UserId,
    pub agent: AgentId,
    pub specialist: Option<SpecialistId>,
    pub wellness_plan: Option<PlanId>,
    pub request: Option<RequestId>,
    pub title: String,
    pub description: String,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub scheduled_datetime: DateTime<Utc>,
    pub duration_minutes: u32,
    pub timezone: String,
    pub is_virtual: bool,
    pub meeting_link: String,
    pub location: String,
    pub preparation_instructions: String,
    pub post_appointment_notes: String,
    pub follow_up_required: bool,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub reminder_sent: bool,
    pub confirmation_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(ConciergeAppointment, AppointmentId, "Appointment", "concierge_appointments");

#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub client: UserId,
    pub agent: AgentId,
    #[serde(default)]
    pub specialist: Option<SpecialistId>,
    #[serde(default)]
    pub wellness_plan: Option<PlanId>,
    #[serde(default)]
    pub request: Option<RequestId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub appointment_type: AppointmentType,
    pub scheduled_datetime: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub meeting_link: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub preparation_instructions: String,
}

const fn default_duration() -> u32 {
    60
}

/// Book an appointment for a client. Linked records must belong to the client.
pub fn schedule(
    tx: &WriteTx,
    new: NewAppointment,
    now: DateTime<Utc>,
) -> Result<ConciergeAppointment, VeloraError> {
    accounts::get(tx, new.client)?;
    let agent = active_agent(tx, new.agent)?;
    if let Some(specialist) = new.specialist {
        specialists::get(tx, specialist)?;
    }
    if let Some(plan) = new.wellness_plan {
        match tx.get::<WellnessPlan>(plan.0)? {
            Some(plan) if plan.user == new.client => {}
            _ => return Err(VeloraError::NotFound("Wellness plan")),
        }
    }
    if let Some(request) = new.request {
        owned_request(tx, new.client, request)?;
    }
    let title = validate::bounded("Title", &new.title, MAX_TITLE_LENGTH)?;
    let mut appointment = ConciergeAppointment {
        id: AppointmentId::default(),
        client: new.client,
        agent: agent.id,
        specialist: new.specialist,
        wellness_plan: new.wellness_plan,
        request: new.request,
        title,
        description: new.description,
        appointment_type: new.appointment_type,
        status: AppointmentStatus::Scheduled,
        scheduled_datetime: new.scheduled_datetime,
        duration_minutes: validate::positive("Duration minutes", new.duration_minutes)?,
        timezone: new.timezone,
        is_virtual: new.is_virtual,
        meeting_link: new.meeting_link,
        location: new.location,
        preparation_instructions: new.preparation_instructions,
        post_appointment_notes: String::new(),
        follow_up_required: false,
        follow_up_date: None,
        reminder_sent: false,
        confirmation_sent: false,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut appointment)?;

    platform::notify(
        tx,
        NewNotification::simple(
            appointment.client,
            NotificationType::Reminder,
            "Appointment scheduled",
            format!(
                "{} on {}",
                appointment.title,
                appointment.scheduled_datetime.format("%Y-%m-%d %H:%M UTC")
            ),
        ),
        now,
    )?;
    Ok(appointment)
}

/// Staff-side appointment status change.
pub fn set_appointment_status(
    tx: &WriteTx,
    id: AppointmentId,
    status: AppointmentStatus,
    now: DateTime<Utc>,
) -> Result<ConciergeAppointment, VeloraError> {
    let mut appointment: ConciergeAppointment = tx.require(id.0)?;
    if matches!(
        appointment.status,
        AppointmentStatus::Completed | AppointmentStatus::Cancelled
    ) {
        return Err(VeloraError::invalid(format!(
            "This appointment is already {}",
            appointment.status.display_name().to_lowercase()
        )));
    }
    if status == AppointmentStatus::Confirmed {
        appointment.confirmation_sent = true;
    }
    appointment.status = status;
    appointment.updated_at = now;
    tx.put(&appointment)?;
    Ok(appointment)
}

/// A client's appointments, latest scheduled first.
pub fn appointments_for(
    tx: &impl Reader,
    client: UserId,
) -> Result<Vec<ConciergeAppointment>, VeloraError> {
    let mut list = tx.filter::<ConciergeAppointment>(|a| a.client == client)?;
    list.sort_by(|a, b| b.scheduled_datetime.cmp(&a.scheduled_datetime));
    Ok(list)
}

/// Confirmed appointments from `now` on, soonest first.
pub fn upcoming_confirmed(
    tx: &impl Reader,
    client: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<ConciergeAppointment>, VeloraError> {
    let mut list = tx.filter::<ConciergeAppointment>(|a| {
        a.client == client
            && a.status == AppointmentStatus::Confirmed
            && a.scheduled_datetime >= now
    })?;
    list.sort_by_key(|a| a.scheduled_datetime);
    Ok(list)
}

// =============================================================================
// NOTES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConciergeNote {
    pub id: NoteId,
    pub agent: AgentId,
    pub client: UserId,
    pub request: Option<RequestId>,
    pub note_type: NoteType,
    pub title: String,
    pub content: String,
    /// Hidden from the client.
    pub is_private: bool,
    pub requires_action: bool,
    pub action_due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_record!(ConciergeNote, NoteId, "Note", "concierge_notes");

#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub agent: AgentId,
    pub client: UserId,
    #[serde(default)]
    pub request: Option<RequestId>,
    #[serde(default = "general_note")]
    pub note_type: NoteType,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub requires_action: bool,
    #[serde(default)]
    pub action_due_date: Option<NaiveDate>,
}

const fn general_note() -> NoteType {
    NoteType::General
}

pub fn add_note(tx: &WriteTx, new: NewNote, now: DateTime<Utc>) -> Result<ConciergeNote, VeloraError> {
    get_agent(tx, new.agent)?;
    accounts::get(tx, new.client)?;
    if let Some(request) = new.request {
        owned_request(tx, new.client, request)?;
    }
    if new.requires_action && new.action_due_date.is_none() {
        return Err(VeloraError::invalid(
            "Notes that require action need a due date",
        ));
    }
    let mut note = ConciergeNote {
        id: NoteId::default(),
        agent: new.agent,
        client: new.client,
        request: new.request,
        note_type: new.note_type,
        title: validate::bounded("Title", &new.title, MAX_TITLE_LENGTH)?,
        content: validate::required("Content", &new.content)?,
        is_private: new.is_private,
        requires_action: new.requires_action,
        action_due_date: new.action_due_date,
        created_at: now,
        updated_at: now,
    };
    tx.insert(&mut note)?;
    Ok(note)
}

/// Notes on a client's request that the client may see, newest first.
pub fn notes_for_request(
    tx: &impl Reader,
    client: UserId,
    request: RequestId,
) -> Result<Vec<ConciergeNote>, VeloraError> {
    let mut notes = tx.filter::<ConciergeNote>(|n| {
        n.client == client && n.request == Some(request) && !n.is_private
    })?;
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(notes)
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub recent_requests: Vec<ConciergeRequest>,
    pub upcoming_appointments: Vec<ConciergeAppointment>,
}

pub fn dashboard(
    tx: &impl Reader,
    client: UserId,
    now: DateTime<Utc>,
) -> Result<Dashboard, VeloraError> {
    let mut recent_requests = list_for_client(tx, client)?;
    recent_requests.truncate(DASHBOARD_LIMIT);
    let mut upcoming_appointments = upcoming_confirmed(tx, client, now)?;
    upcoming_appointments.truncate(DASHBOARD_LIMIT);
    Ok(Dashboard {
        recent_requests,
        upcoming_appointments,
    })
}

// =============================================================================
// TESTS
// =============================================================================
