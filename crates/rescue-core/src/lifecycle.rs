//! Call lifecycle machine.
//!
//! The only code that writes a call's `status` and `timestamps`. Every
//! status change goes through [`validate_advance`], [`validate_dispatch`],
//! or [`validate_cancel`] before [`enter`] commits it.
//!
//! # Chain
//!
//! ```text
//! RECEIVED -> DISPATCHED -> EN_ROUTE -> ON_SCENE -> TRANSPORTING -> AT_HOSPITAL -> CLOSED
//!     \__________\___________\___________\______________\______________\--> CANCELLED
//! ```
//!
//! `DISPATCHED` is entered only through [`dispatch`], which the assignment
//! coordinator calls while it holds the vehicle binding. `CANCELLED` is
//! entered only through [`cancel`]. Neither can be reached by [`advance`].
//!
//! # Storage
//!
//! [`CallBook`] is the call table: a map of per-call mutexes. The map lock
//! is held only for lookup and insert, so work on different calls never
//! contends.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rescue_types::{
    Call, CallId, CallStatus, DispatcherId, NewCall, PatientInfo, ResponderId, VehicleId,
};
use tokio::sync::{Mutex, RwLock};

use crate::error::{DispatchError, Result};
use crate::query::CallFilter;

/// Shared handle to one call's mutex.
pub(crate) type CallHandle = Arc<Mutex<Call>>;

/// Field updates a crew may submit together with a status change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDetails {
    /// Patient name.
    pub patient_name: Option<String>,
    /// Patient age in years.
    pub patient_age: Option<u32>,
    /// Condition assessment.
    pub patient_condition: Option<String>,
    /// Receiving facility.
    pub hospital_destination: Option<String>,
}

/// The binding recorded on a call when it is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The bound vehicle.
    pub vehicle: VehicleId,
    /// The bound responder, if any.
    pub responder: Option<ResponderId>,
    /// The dispatcher who authorized the assignment.
    pub dispatcher: DispatcherId,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check that `to` is a legal crew-initiated transition for `call`.
///
/// Rejects terminal calls with [`DispatchError::TerminalState`], and any
/// target that is not the immediate successor, `DISPATCHED`, or
/// `CANCELLED` with [`DispatchError::InvalidTransition`].
pub fn validate_advance(call: &Call, to: CallStatus) -> Result<()> {
    let from = call.status;
    if from.is_terminal() {
        return Err(DispatchError::TerminalState {
            call: call.id,
            status: from,
        });
    }
    let reserved = matches!(to, CallStatus::Dispatched | CallStatus::Cancelled);
    if reserved || from.successor() != Some(to) {
        return Err(DispatchError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Check that `call` can be dispatched. A call is dispatched exactly once,
/// from `RECEIVED`.
pub fn validate_dispatch(call: &Call) -> Result<()> {
    let from = call.status;
    if from.is_terminal() {
        return Err(DispatchError::TerminalState {
            call: call.id,
            status: from,
        });
    }
    if from != CallStatus::Received {
        return Err(DispatchError::InvalidTransition {
            from,
            to: CallStatus::Dispatched,
        });
    }
    Ok(())
}

/// Check that `call` can be cancelled.
pub fn validate_cancel(call: &Call) -> Result<()> {
    if call.status.is_terminal() {
        return Err(DispatchError::TerminalState {
            call: call.id,
            status: call.status,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// Build a freshly received call.
pub(crate) fn open(intake: NewCall, now: DateTime<Utc>) -> Call {
    let id = CallId::new();
    let mut timestamps = BTreeMap::new();
    timestamps.insert(CallStatus::Received, now);
    Call {
        id,
        reference: id.reference(),
        status: CallStatus::Received,
        priority: intake.priority.unwrap_or_default(),
        category: intake.category,
        caller_name: intake.caller_name,
        caller_phone: intake.caller_phone,
        description: intake.description,
        location: intake.location,
        timestamps,
        vehicle: None,
        responder: None,
        dispatcher: None,
        patient: PatientInfo::default(),
        hospital_destination: None,
        revision: 1,
        created_at: now,
        updated_at: now,
    }
}

/// Enter `status`, stamping it if this is the first entry.
///
/// The stamp is never earlier than any existing stamp, so timestamps stay
/// non-decreasing along the chain even if the wall clock steps backwards.
fn enter(call: &mut Call, status: CallStatus, now: DateTime<Utc>) {
    let stamp = call
        .timestamps
        .values()
        .max()
        .map_or(now, |latest| now.max(*latest));
    call.timestamps.entry(status).or_insert(stamp);
    call.status = status;
    call.revision = call.revision.saturating_add(1);
    call.updated_at = stamp;
}

/// Advance `call` to `to` and apply the crew's field updates.
pub(crate) fn advance(
    call: &mut Call,
    to: CallStatus,
    details: StatusDetails,
    now: DateTime<Utc>,
) -> Result<()> {
    validate_advance(call, to)?;
    if let Some(name) = details.patient_name {
        call.patient.name = Some(name);
    }
    if let Some(age) = details.patient_age {
        call.patient.age = Some(age);
    }
    if let Some(condition) = details.patient_condition {
        call.patient.condition = Some(condition);
    }
    if let Some(destination) = details.hospital_destination {
        call.hospital_destination = Some(destination);
    }
    enter(call, to, now);
    Ok(())
}

/// Record the binding and enter `DISPATCHED`.
pub(crate) fn dispatch(call: &mut Call, binding: Binding, now: DateTime<Utc>) -> Result<()> {
    validate_dispatch(call)?;
    call.vehicle = Some(binding.vehicle);
    call.responder = binding.responder;
    call.dispatcher = Some(binding.dispatcher);
    enter(call, CallStatus::Dispatched, now);
    Ok(())
}

/// Enter `CANCELLED`.
pub(crate) fn cancel(call: &mut Call, now: DateTime<Utc>) -> Result<()> {
    validate_cancel(call)?;
    enter(call, CallStatus::Cancelled, now);
    Ok(())
}

// ---------------------------------------------------------------------------
// Call table
// ---------------------------------------------------------------------------

/// The call table.
#[derive(Debug, Default)]
pub struct CallBook {
    calls: RwLock<BTreeMap<CallId, CallHandle>>,
}

impl CallBook {
    /// Create an empty call table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new call and return its handle.
    pub(crate) async fn insert(&self, call: Call) -> CallHandle {
        let id = call.id;
        let handle = Arc::new(Mutex::new(call));
        self.calls.write().await.insert(id, Arc::clone(&handle));
        handle
    }

    /// Look up a call's handle.
    pub(crate) async fn handle(&self, id: CallId) -> Result<CallHandle> {
        self.calls
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DispatchError::CallNotFound(id))
    }

    /// Current state of one call.
    pub async fn get(&self, id: CallId) -> Result<Call> {
        let handle = self.handle(id).await?;
        let call = handle.lock().await.clone();
        Ok(call)
    }

    /// Calls matching `filter`, newest first.
    pub async fn list(&self, filter: CallFilter) -> Vec<Call> {
        let handles: Vec<CallHandle> = self.calls.read().await.values().cloned().collect();
        let mut calls = Vec::with_capacity(handles.len());
        for handle in handles {
            let call = handle.lock().await;
            if filter.matches(call.status) {
                calls.push(call.clone());
            }
        }
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        calls
    }

    /// Number of calls ever opened.
    pub(crate) async fn len(&self) -> usize {
        self.calls.read().await.len()
    }
}
